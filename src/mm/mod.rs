//! 内存管理：页帧分配与地址空间

pub mod address;
mod frame_allocator;
mod memory_set;

pub use address::{PhysPageNum, VPNRange, VirtAddr, VirtPageNum};
pub use frame_allocator::{frame_alloc, frames_available, FrameTracker};
pub use memory_set::{MapArea, MapPermission, MemorySet};
