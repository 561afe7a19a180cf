//! 虚拟地址与页号
//!
//! # Overview
//! - `VirtAddr` / `VirtPageNum`：用户地址空间中的地址与页号
//! - `PhysPageNum`：页帧分配器发放的页帧号
//! - `VPNRange`：`[start, end)` 页号范围
//!
//! 构造 `VirtAddr` 时截断到 `VA_WIDTH` 位；非页对齐地址用 `floor` / `ceil` 取页号。

use crate::hal::{PAGE_SIZE, PAGE_SIZE_BITS};
use core::fmt::{self, Debug, Formatter};
use core::ops::Range;

/// 用户虚拟地址宽度
const VA_WIDTH: usize = 39;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtAddr(pub usize);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtPageNum(pub usize);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct PhysPageNum(pub usize);

impl Debug for VirtAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VA:{:#x}", self.0)
    }
}

impl Debug for VirtPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VPN:{:#x}", self.0)
    }
}

impl Debug for PhysPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PPN:{:#x}", self.0)
    }
}

impl From<usize> for VirtAddr {
    fn from(v: usize) -> Self {
        Self(v & ((1 << VA_WIDTH) - 1))
    }
}

impl From<VirtPageNum> for VirtAddr {
    fn from(vpn: VirtPageNum) -> Self {
        Self(vpn.0 << PAGE_SIZE_BITS)
    }
}

impl VirtAddr {
    /// 超出 `VA_WIDTH` 位的地址不截断，返回 `None`
    pub fn checked(v: usize) -> Option<Self> {
        (v >> VA_WIDTH == 0).then_some(Self(v))
    }

    /// 地址所在页
    pub fn floor(self) -> VirtPageNum {
        VirtPageNum(self.0 >> PAGE_SIZE_BITS)
    }

    /// 第一个不早于该地址开始的页
    pub fn ceil(self) -> VirtPageNum {
        VirtPageNum(self.0.div_ceil(PAGE_SIZE))
    }

    pub fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    pub fn aligned(self) -> bool {
        self.page_offset() == 0
    }
}

/// `[start, end)` 页号范围
#[derive(Clone, Debug)]
pub struct VPNRange(Range<usize>);

impl VPNRange {
    pub fn new(start: VirtPageNum, end: VirtPageNum) -> Self {
        assert!(start <= end, "VPNRange: start {:?} > end {:?}", start, end);
        Self(start.0..end.0)
    }

    pub fn start(&self) -> VirtPageNum {
        VirtPageNum(self.0.start)
    }

    pub fn contains(&self, vpn: VirtPageNum) -> bool {
        self.0.contains(&vpn.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = VirtPageNum> {
        self.0.clone().map(VirtPageNum)
    }
}
