//! 单核内部可变性单元
//!
//! # Overview
//! - `UPSafeCellRaw`：不做任何检查的裸单元，只用于中断屏蔽计数本身
//! - `UPIntrFreeCell`：借用期间屏蔽中断的 `RefCell`，内核全局状态都放在其中
//!
//! # Invariants
//! - 借用 `UPIntrFreeCell` 期间中断关闭，借用结束后恢复借用前的中断级别
//! - 借用不得跨越上下文切换；重复借用是内核 bug，直接 panic

use crate::hal::{intr_enable, INTR_MASKING_INFO};
use core::cell::{RefCell, RefMut, UnsafeCell};
use core::ops::{Deref, DerefMut};

pub struct UPSafeCellRaw<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T> Sync for UPSafeCellRaw<T> {}

impl<T> UPSafeCellRaw<T> {
    /// # Safety
    /// 调用方保证只在单核、无并发的前提下访问
    pub unsafe fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn get_mut(&self) -> &mut T {
        // SAFETY: 单核，且返回的引用不跨越上下文切换
        unsafe { &mut (*self.inner.get()) }
    }
}

pub struct UPIntrFreeCell<T> {
    inner: RefCell<T>,
}

unsafe impl<T> Sync for UPIntrFreeCell<T> {}

pub struct UPIntrRefMut<'a, T>(Option<RefMut<'a, T>>);

impl<T> UPIntrFreeCell<T> {
    /// # Safety
    /// 调用方保证只在单核、无并发的前提下访问
    pub unsafe fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// 屏蔽中断并独占借用
    pub fn exclusive_access(&self) -> UPIntrRefMut<'_, T> {
        INTR_MASKING_INFO.get_mut().enter();
        UPIntrRefMut(Some(self.inner.borrow_mut()))
    }

    /// 在独占借用下执行 `f`
    pub fn exclusive_session<F, V>(&self, f: F) -> V
    where
        F: FnOnce(&mut T) -> V,
    {
        let mut inner = self.exclusive_access();
        f(inner.deref_mut())
    }
}

impl<'a, T> Drop for UPIntrRefMut<'a, T> {
    fn drop(&mut self) {
        // 先释放借用，再恢复中断：开中断可能投递挂起中断并切换上下文
        self.0 = None;
        if INTR_MASKING_INFO.get_mut().exit() {
            intr_enable();
        }
    }
}

impl<'a, T> Deref for UPIntrRefMut<'a, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref().unwrap().deref()
    }
}

impl<'a, T> DerefMut for UPIntrRefMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut().unwrap().deref_mut()
    }
}
