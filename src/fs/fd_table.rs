//! 打开文件表：固定大小的 “描述符 -> 打开文件” 映射
//!
//! 新表的 0、1 号描述符分别是标准输入与标准输出。
//! 每个表项只会被释放一次：`remove` / `dup2` / `take_all` 把它交给调用者 drop。

use super::{File, Stdin, Stdout};
use crate::config::FD_TABLE_SIZE;
use crate::error::ProcessError;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct FdTable {
    slots: Vec<Option<Arc<dyn File>>>,
}

impl FdTable {
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.slots[0] = Some(Arc::new(Stdin));
        table.slots[1] = Some(Arc::new(Stdout));
        table
    }

    fn empty() -> Self {
        let mut slots = Vec::with_capacity(FD_TABLE_SIZE);
        slots.resize_with(FD_TABLE_SIZE, || None);
        Self { slots }
    }

    /// 放入最小的空闲描述符
    pub fn alloc(&mut self, file: Arc<dyn File>) -> Result<usize, ProcessError> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ProcessError::TooManyFiles)?;
        self.slots[fd] = Some(file);
        Ok(fd)
    }

    pub fn get(&self, fd: usize) -> Option<Arc<dyn File>> {
        self.slots.get(fd).and_then(|slot| slot.clone())
    }

    /// 取出描述符 `fd` 的文件
    pub fn remove(&mut self, fd: usize) -> Result<Arc<dyn File>, ProcessError> {
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(ProcessError::BadFd(fd))
    }

    /// 让 `new_fd` 指向 `old_fd` 的文件，返回被替换的文件。
    /// `old_fd == new_fd` 时什么也不做。
    pub fn dup2(
        &mut self,
        old_fd: usize,
        new_fd: usize,
    ) -> Result<Option<Arc<dyn File>>, ProcessError> {
        let file = self.get(old_fd).ok_or(ProcessError::BadFd(old_fd))?;
        if new_fd >= FD_TABLE_SIZE {
            return Err(ProcessError::BadFd(new_fd));
        }
        if old_fd == new_fd {
            return Ok(None);
        }
        Ok(self.slots[new_fd].replace(file))
    }

    /// fork 用：逐项复制。同一个打开文件出现在多个描述符上时，副本之间仍然共享。
    pub fn duplicate(&self) -> Self {
        let mut copies: Vec<(Arc<dyn File>, Arc<dyn File>)> = Vec::new();
        let mut table = Self::empty();
        for (fd, slot) in self.slots.iter().enumerate() {
            let Some(file) = slot else {
                continue;
            };
            let copy = match copies.iter().find(|(orig, _)| Arc::ptr_eq(orig, file)) {
                Some((_, copy)) => Arc::clone(copy),
                None => {
                    let copy = file.duplicate();
                    copies.push((Arc::clone(file), Arc::clone(&copy)));
                    copy
                }
            };
            table.slots[fd] = Some(copy);
        }
        table
    }

    /// 按描述符从小到大取出全部文件
    pub fn take_all(&mut self) -> Vec<Arc<dyn File>> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// 已打开的描述符数
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
