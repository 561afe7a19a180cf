//! 文件相关系统调用
//!
//! 用户缓冲区先整体复制到内核再交给文件（或反之），复制时只持有当前任务的内部借用；
//! 文件本身的读写在 `FILESYS_LOCK` 下进行。

use super::to_ret;
use crate::error::ProcessError;
use crate::fs::{create_file, open_file, remove_file, OpenFlags, FILESYS_LOCK};
use crate::task::{close, dup2, get_file, open, with_memory_set};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// 用户缓冲区 `[ptr, ptr + len)` 在当前地址空间中完整可访问
///
/// 按长度分配内核缓冲区之前必须先通过这一检查。
fn check_user(ptr: usize, len: usize, writable: bool) -> Result<(), ProcessError> {
    with_memory_set(|space| space.check_range(ptr, len, writable))??;
    Ok(())
}

/// 用户地址空间中 `[ptr, ptr + len)` 的内容
fn copy_from_user(ptr: usize, len: usize) -> Result<Vec<u8>, ProcessError> {
    check_user(ptr, len, false)?;
    let mut buf = vec![0u8; len];
    with_memory_set(|space| space.read_bytes(ptr, &mut buf))??;
    Ok(buf)
}

fn copy_to_user(ptr: usize, data: &[u8]) -> Result<(), ProcessError> {
    with_memory_set(|space| space.write_bytes(ptr, data))??;
    Ok(())
}

fn user_str(ptr: usize, len: usize) -> Result<String, ProcessError> {
    let bytes = copy_from_user(ptr, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn sys_create(path: usize, len: usize) -> isize {
    let name = match user_str(path, len) {
        Ok(name) => name,
        Err(_) => return -1,
    };
    FILESYS_LOCK.acquire();
    let created = create_file(&name);
    FILESYS_LOCK.release();
    if created {
        0
    } else {
        -1
    }
}

pub fn sys_remove(path: usize, len: usize) -> isize {
    let name = match user_str(path, len) {
        Ok(name) => name,
        Err(_) => return -1,
    };
    FILESYS_LOCK.acquire();
    let removed = remove_file(&name);
    FILESYS_LOCK.release();
    if removed {
        0
    } else {
        -1
    }
}

pub fn sys_open(path: usize, len: usize, flags: u32) -> isize {
    let Some(flags) = OpenFlags::from_bits(flags) else {
        return -1;
    };
    let name = match user_str(path, len) {
        Ok(name) => name,
        Err(_) => return -1,
    };
    FILESYS_LOCK.acquire();
    let inode = open_file(&name, flags);
    FILESYS_LOCK.release();
    match inode {
        Some(inode) => to_ret(open(inode)),
        None => -1,
    }
}

pub fn sys_filesize(fd: usize) -> isize {
    let Some(file) = get_file(fd) else {
        return -1;
    };
    FILESYS_LOCK.acquire();
    let size = file.size();
    FILESYS_LOCK.release();
    size as isize
}

pub fn sys_read(fd: usize, buf: usize, len: usize) -> isize {
    let Some(file) = get_file(fd) else {
        return -1;
    };
    if !file.readable() || check_user(buf, len, true).is_err() {
        return -1;
    }
    let mut data = vec![0u8; len];
    FILESYS_LOCK.acquire();
    let n = file.read(&mut data);
    FILESYS_LOCK.release();
    to_ret(copy_to_user(buf, &data[..n]).map(|()| n))
}

pub fn sys_write(fd: usize, buf: usize, len: usize) -> isize {
    let Some(file) = get_file(fd) else {
        return -1;
    };
    if !file.writable() {
        return -1;
    }
    let data = match copy_from_user(buf, len) {
        Ok(data) => data,
        Err(_) => return -1,
    };
    FILESYS_LOCK.acquire();
    let n = file.write(&data);
    FILESYS_LOCK.release();
    n as isize
}

pub fn sys_close(fd: usize) -> isize {
    to_ret(close(fd).map(|()| 0))
}

pub fn sys_dup2(old_fd: usize, new_fd: usize) -> isize {
    to_ret(dup2(old_fd, new_fd))
}
