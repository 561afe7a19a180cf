//! 物理页帧分配器
//!
//! 栈式分配：优先复用回收的页号，否则从 `current` 向上分配，直到 `MEMORY_FRAMES`。
//! 每个 `FrameTracker` 独占一页内容，drop 时自动归还页号。

use super::address::PhysPageNum;
use crate::config::MEMORY_FRAMES;
use crate::hal::PAGE_SIZE;
use crate::sync::UPIntrFreeCell;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{self, Debug, Formatter};
use lazy_static::lazy_static;

/// 一个已分配的页帧
pub struct FrameTracker {
    pub ppn: PhysPageNum,
    data: Box<[u8; PAGE_SIZE]>,
}

impl FrameTracker {
    fn new(ppn: PhysPageNum) -> Self {
        Self {
            ppn,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    pub fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}

impl Debug for FrameTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("FrameTracker:PPN={:#x}", self.ppn.0))
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        frame_dealloc(self.ppn);
    }
}

trait FrameAllocator {
    fn alloc(&mut self) -> Option<PhysPageNum>;
    fn dealloc(&mut self, ppn: PhysPageNum);
}

pub struct StackFrameAllocator {
    current: usize,
    end: usize,
    recycled: Vec<usize>,
}

impl StackFrameAllocator {
    pub fn new(frames: usize) -> Self {
        Self {
            current: 0,
            end: frames,
            recycled: Vec::new(),
        }
    }

    /// 剩余可分配的页帧数
    pub fn available(&self) -> usize {
        self.end - self.current + self.recycled.len()
    }
}

impl FrameAllocator for StackFrameAllocator {
    fn alloc(&mut self) -> Option<PhysPageNum> {
        if let Some(ppn) = self.recycled.pop() {
            Some(PhysPageNum(ppn))
        } else if self.current == self.end {
            None
        } else {
            self.current += 1;
            Some(PhysPageNum(self.current - 1))
        }
    }

    fn dealloc(&mut self, ppn: PhysPageNum) {
        let ppn = ppn.0;
        if ppn >= self.current || self.recycled.contains(&ppn) {
            panic!("Frame ppn={:#x} has not been allocated!", ppn);
        }
        self.recycled.push(ppn);
    }
}

lazy_static! {
    pub static ref FRAME_ALLOCATOR: UPIntrFreeCell<StackFrameAllocator> =
        unsafe { UPIntrFreeCell::new(StackFrameAllocator::new(MEMORY_FRAMES)) };
}

/// 分配一个清零的页帧，耗尽时返回 `None`
pub fn frame_alloc() -> Option<FrameTracker> {
    FRAME_ALLOCATOR
        .exclusive_access()
        .alloc()
        .map(FrameTracker::new)
}

fn frame_dealloc(ppn: PhysPageNum) {
    FRAME_ALLOCATOR.exclusive_access().dealloc(ppn);
}

/// 剩余可分配的页帧数
pub fn frames_available() -> usize {
    FRAME_ALLOCATOR.exclusive_access().available()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_frames_are_reused_first() {
        let mut allocator = StackFrameAllocator::new(2);
        let a = allocator.alloc().unwrap();
        let b = allocator.alloc().unwrap();
        assert!(allocator.alloc().is_none());
        allocator.dealloc(a);
        assert_eq!(allocator.available(), 1);
        assert_eq!(allocator.alloc(), Some(a));
        allocator.dealloc(b);
        allocator.dealloc(a);
        assert_eq!(allocator.available(), 2);
    }

    #[test]
    #[should_panic(expected = "has not been allocated")]
    fn double_free_is_fatal() {
        let mut allocator = StackFrameAllocator::new(1);
        let a = allocator.alloc().unwrap();
        allocator.dealloc(a);
        allocator.dealloc(a);
    }

    #[test]
    fn tracker_returns_frame_on_drop() {
        let _serial = crate::serial_guard();
        let before = frames_available();
        let frame = frame_alloc().unwrap();
        assert!(frame.bytes().iter().all(|b| *b == 0));
        assert_eq!(frames_available(), before - 1);
        drop(frame);
        assert_eq!(frames_available(), before);
    }
}
