//! 地址空间
//!
//! # Overview
//! 一个 `MemorySet` 由若干互不重叠的逻辑段（`MapArea`）组成，每段按页持有独立的页帧。
//! 地址空间由 `token` 标识，`hal::activate(Some(token))` 使其成为当前地址空间。
//!
//! # Behavior
//! - `from_existed_user` 逐页复制另一个地址空间；页帧不足时返回错误，已复制的部分随之释放
//! - `write_bytes` 只能写入带 `W` 权限的逻辑段
//! - drop 时释放全部页帧

use super::address::{VPNRange, VirtAddr, VirtPageNum};
use super::frame_allocator::{frame_alloc, FrameTracker};
use crate::error::MmError;
use crate::hal::PAGE_SIZE;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 0 保留给内核地址空间
static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);

/// 地址空间
pub struct MemorySet {
    token: usize,
    areas: Vec<MapArea>,
}

impl MemorySet {
    /// 创建一个空的地址空间
    pub fn new_bare() -> Self {
        Self {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            areas: Vec::new(),
        }
    }

    pub fn token(&self) -> usize {
        self.token
    }

    /// 映射 `[start_va, end_va)` 覆盖的所有页
    pub fn insert_framed_area(
        &mut self,
        start_va: VirtAddr,
        end_va: VirtAddr,
        permission: MapPermission,
    ) -> Result<(), MmError> {
        let mut area = MapArea::new(start_va, end_va, permission);
        if let Some(vpn) = area
            .vpn_range
            .iter()
            .find(|vpn| self.translate(*vpn).is_some())
        {
            return Err(MmError::AlreadyMapped(vpn.0));
        }
        area.map()?;
        self.areas.push(area);
        Ok(())
    }

    /// 移除起始页为 `start_vpn` 的逻辑段
    pub fn remove_area_with_start_vpn(&mut self, start_vpn: VirtPageNum) -> Result<(), MmError> {
        let idx = self
            .areas
            .iter()
            .position(|area| area.vpn_range.start() == start_vpn)
            .ok_or(MmError::Unmapped(VirtAddr::from(start_vpn).0))?;
        self.areas.remove(idx);
        Ok(())
    }

    /// 逐页复制另一个地址空间
    pub fn from_existed_user(user_space: &MemorySet) -> Result<MemorySet, MmError> {
        let mut memory_set = Self::new_bare();
        for area in user_space.areas.iter() {
            let mut new_area = MapArea::from_another(area);
            new_area.map()?;
            for (vpn, src) in area.data_frames.iter() {
                if let Some(dst) = new_area.data_frames.get_mut(vpn) {
                    dst.bytes_mut().copy_from_slice(src.bytes());
                }
            }
            memory_set.areas.push(new_area);
        }
        Ok(memory_set)
    }

    /// 虚拟页号对应的页帧
    pub fn translate(&self, vpn: VirtPageNum) -> Option<&FrameTracker> {
        self.areas
            .iter()
            .find(|area| area.vpn_range.contains(vpn))
            .and_then(|area| area.data_frames.get(&vpn))
    }

    /// 可写的页帧
    fn translate_writable(&mut self, va: VirtAddr) -> Result<&mut FrameTracker, MmError> {
        let vpn = va.floor();
        let area = self
            .areas
            .iter_mut()
            .find(|area| area.vpn_range.contains(vpn))
            .ok_or(MmError::Unmapped(va.0))?;
        if !area.permission().contains(MapPermission::W) {
            return Err(MmError::ReadOnly(va.0));
        }
        area.data_frames.get_mut(&vpn).ok_or(MmError::Unmapped(va.0))
    }

    /// 检查 `[va, va + len)` 中每一页都已映射，`writable` 时还要求可写
    pub fn check_range(&self, va: usize, len: usize, writable: bool) -> Result<(), MmError> {
        if len == 0 {
            return Ok(());
        }
        let end = va.checked_add(len).ok_or(MmError::Unmapped(va))?;
        let mut cur = va;
        while cur < end {
            let addr = VirtAddr::checked(cur).ok_or(MmError::Unmapped(cur))?;
            let vpn = addr.floor();
            let area = self
                .areas
                .iter()
                .find(|area| area.vpn_range.contains(vpn))
                .ok_or(MmError::Unmapped(cur))?;
            if writable && !area.permission().contains(MapPermission::W) {
                return Err(MmError::ReadOnly(cur));
            }
            if !area.data_frames.contains_key(&vpn) {
                return Err(MmError::Unmapped(cur));
            }
            cur = VirtAddr::from(VirtPageNum(vpn.0 + 1)).0;
        }
        Ok(())
    }

    /// 从 `va` 开始读满 `buf`
    pub fn read_bytes(&self, va: usize, buf: &mut [u8]) -> Result<(), MmError> {
        let mut copied = 0;
        while copied < buf.len() {
            let addr = user_addr(va, copied)?;
            let frame = self
                .translate(addr.floor())
                .ok_or(MmError::Unmapped(addr.0))?;
            let offset = addr.page_offset();
            let len = (PAGE_SIZE - offset).min(buf.len() - copied);
            buf[copied..copied + len].copy_from_slice(&frame.bytes()[offset..offset + len]);
            copied += len;
        }
        Ok(())
    }

    /// 把 `data` 写到 `va` 开始的位置
    pub fn write_bytes(&mut self, va: usize, data: &[u8]) -> Result<(), MmError> {
        let mut copied = 0;
        while copied < data.len() {
            let addr = user_addr(va, copied)?;
            let frame = self.translate_writable(addr)?;
            let offset = addr.page_offset();
            let len = (PAGE_SIZE - offset).min(data.len() - copied);
            frame.bytes_mut()[offset..offset + len].copy_from_slice(&data[copied..copied + len]);
            copied += len;
        }
        Ok(())
    }

    /// 已映射的页数
    pub fn page_count(&self) -> usize {
        self.areas.iter().map(|area| area.data_frames.len()).sum()
    }
}

/// `va + offset` 处的用户地址；溢出或超出地址宽度视为未映射
fn user_addr(va: usize, offset: usize) -> Result<VirtAddr, MmError> {
    va.checked_add(offset)
        .and_then(VirtAddr::checked)
        .ok_or(MmError::Unmapped(va.wrapping_add(offset)))
}

/// 连续虚拟页构成的逻辑段
pub struct MapArea {
    vpn_range: VPNRange,
    data_frames: BTreeMap<VirtPageNum, FrameTracker>,
    map_perm: MapPermission,
}

impl MapArea {
    pub fn new(start_va: VirtAddr, end_va: VirtAddr, map_perm: MapPermission) -> Self {
        Self {
            vpn_range: VPNRange::new(start_va.floor(), end_va.ceil()),
            data_frames: BTreeMap::new(),
            map_perm,
        }
    }

    /// 同样的范围与权限，尚未分配页帧
    pub fn from_another(another: &MapArea) -> Self {
        Self {
            vpn_range: another.vpn_range.clone(),
            data_frames: BTreeMap::new(),
            map_perm: another.map_perm,
        }
    }

    fn map(&mut self) -> Result<(), MmError> {
        for vpn in self.vpn_range.iter() {
            let frame = frame_alloc().ok_or(MmError::OutOfFrames)?;
            self.data_frames.insert(vpn, frame);
        }
        Ok(())
    }

    pub fn permission(&self) -> MapPermission {
        self.map_perm
    }
}

bitflags! {
    /// 页映射权限
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct MapPermission: u8 {
        /// 可读
        const R = 1 << 1;
        /// 可写
        const W = 1 << 2;
        /// 可执行
        const X = 1 << 3;
        /// 用户态可访问
        const U = 1 << 4;
    }
}
