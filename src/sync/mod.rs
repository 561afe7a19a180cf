//! 同步原语：中断屏蔽单元、信号量、带优先级捐赠的锁、条件变量

mod condvar;
mod mutex;
mod semaphore;
mod up;

pub use condvar::Condvar;
pub use mutex::{refresh_priority, Lock, LockCore};
pub use semaphore::{Semaphore, SemaphoreInner};
pub use up::{UPIntrFreeCell, UPIntrRefMut, UPSafeCellRaw};
