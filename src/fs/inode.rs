//! 内存文件系统
//!
//! # Overview
//! - 根目录是一张 “文件名 -> `Inode`” 表，不支持子目录
//! - `Inode` 保存文件内容，被所有打开它的 `OSInode` 共享
//! - `OSInode` 是一次打开：读写权限 + 独立的读写位置
//!
//! 调用者负责用 `FILESYS_LOCK` 串行化文件操作。

use super::File;
use crate::sync::UPIntrFreeCell;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use lazy_static::lazy_static;

/// 文件内容
pub struct Inode {
    data: UPIntrFreeCell<Vec<u8>>,
}

impl Inode {
    fn new() -> Self {
        Self {
            data: unsafe { UPIntrFreeCell::new(Vec::new()) },
        }
    }

    pub fn size(&self) -> usize {
        self.data.exclusive_access().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.data.exclusive_access();
        if offset >= data.len() {
            return 0;
        }
        let len = buf.len().min(data.len() - offset);
        buf[..len].copy_from_slice(&data[offset..offset + len]);
        len
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        let mut data = self.data.exclusive_access();
        if data.len() < offset + buf.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        buf.len()
    }

    fn clear(&self) {
        self.data.exclusive_access().clear();
    }
}

/// 一次打开
pub struct OSInode {
    readable: bool,
    writable: bool,
    offset: UPIntrFreeCell<usize>,
    inode: Arc<Inode>,
}

impl OSInode {
    pub fn new(readable: bool, writable: bool, inode: Arc<Inode>) -> Self {
        Self {
            readable,
            writable,
            offset: unsafe { UPIntrFreeCell::new(0) },
            inode,
        }
    }

    /// 从当前位置读到文件末尾
    pub fn read_all(&self) -> Vec<u8> {
        let mut buffer = [0u8; 512];
        let mut v: Vec<u8> = Vec::new();
        loop {
            let len = self.read(&mut buffer);
            if len == 0 {
                break;
            }
            v.extend_from_slice(&buffer[..len]);
        }
        v
    }
}

impl File for OSInode {
    fn readable(&self) -> bool {
        self.readable
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        if !self.readable {
            return 0;
        }
        let mut offset = self.offset.exclusive_access();
        let len = self.inode.read_at(*offset, buf);
        *offset += len;
        len
    }

    fn write(&self, buf: &[u8]) -> usize {
        if !self.writable {
            return 0;
        }
        let mut offset = self.offset.exclusive_access();
        let len = self.inode.write_at(*offset, buf);
        *offset += len;
        len
    }

    fn duplicate(&self) -> Arc<dyn File> {
        let offset = *self.offset.exclusive_access();
        Arc::new(OSInode {
            readable: self.readable,
            writable: self.writable,
            offset: unsafe { UPIntrFreeCell::new(offset) },
            inode: Arc::clone(&self.inode),
        })
    }

    fn size(&self) -> usize {
        self.inode.size()
    }
}

lazy_static! {
    static ref ROOT_DIR: UPIntrFreeCell<BTreeMap<String, Arc<Inode>>> =
        unsafe { UPIntrFreeCell::new(BTreeMap::new()) };
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct OpenFlags: u32 {
        // 只读
        const RDONLY = 0;
        // 只写
        const WRONLY = 1 << 0;
        // 读写
        const RDWR = 1 << 1;
        // 创建
        const CREATE = 1 << 6;
        // 截断（若存在则以可写方式打开，但是长度清空为0）
        const TRUNC = 1 << 10;
    }
}

impl OpenFlags {
    pub fn read_write(&self) -> (bool, bool) {
        if self.contains(Self::WRONLY) {
            (false, true)
        } else if self.contains(Self::RDWR) {
            (true, true)
        } else {
            (true, false)
        }
    }
}

/// 在根目录创建空文件，已存在时返回 `false`
pub fn create_file(name: &str) -> bool {
    let mut root = ROOT_DIR.exclusive_access();
    if root.contains_key(name) {
        return false;
    }
    root.insert(String::from(name), Arc::new(Inode::new()));
    true
}

/// 从根目录删除文件；已打开的实例仍可继续读写
pub fn remove_file(name: &str) -> bool {
    ROOT_DIR.exclusive_access().remove(name).is_some()
}

/// 打开根目录下的文件
pub fn open_file(name: &str, flags: OpenFlags) -> Option<Arc<OSInode>> {
    let (readable, writable) = flags.read_write();
    let inode = {
        let mut root = ROOT_DIR.exclusive_access();
        match root.get(name) {
            Some(inode) => {
                let inode = Arc::clone(inode);
                if flags.contains(OpenFlags::TRUNC) {
                    inode.clear();
                }
                inode
            }
            None if flags.contains(OpenFlags::CREATE) => {
                let inode = Arc::new(Inode::new());
                root.insert(String::from(name), Arc::clone(&inode));
                inode
            }
            None => return None,
        }
    };
    Some(Arc::new(OSInode::new(readable, writable, inode)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_shares_data_with_independent_offset() {
        let _serial = crate::serial_guard();
        let file = open_file("inode-dup", OpenFlags::RDWR | OpenFlags::CREATE).unwrap();
        assert_eq!(file.write(b"abcdef"), 6);
        let copy = file.duplicate();
        assert_eq!(copy.write(b"XY"), 2);
        let reader = open_file("inode-dup", OpenFlags::RDONLY).unwrap();
        assert_eq!(reader.read_all(), b"abcdefXY");
        assert_eq!(file.write(b"z"), 1);
        assert_eq!(reader.size(), 8);
        assert!(remove_file("inode-dup"));
    }

    #[test]
    fn open_respects_flags() {
        let _serial = crate::serial_guard();
        assert!(open_file("inode-missing", OpenFlags::RDONLY).is_none());
        assert!(create_file("inode-flags"));
        assert!(!create_file("inode-flags"));
        let writer = open_file("inode-flags", OpenFlags::WRONLY).unwrap();
        assert_eq!(writer.write(b"data"), 4);
        let mut buf = [0u8; 4];
        assert_eq!(writer.read(&mut buf), 0);
        let truncated = open_file("inode-flags", OpenFlags::RDWR | OpenFlags::TRUNC).unwrap();
        assert_eq!(truncated.size(), 0);
        assert!(remove_file("inode-flags"));
    }
}
