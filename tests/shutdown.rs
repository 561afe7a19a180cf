//! 关机系统调用：停机后不再执行任何作业

use taskcore::boot::run;
use taskcore::config::PRI_DEFAULT;
use taskcore::syscall::{syscall, SyscallId};

#[test]
#[should_panic(expected = "kernel halted: power off")]
fn halt_syscall_powers_off() {
    assert_eq!(run("before", PRI_DEFAULT, || 1), 1);
    run("halter", PRI_DEFAULT, || {
        syscall(SyscallId::Halt as usize, [0; 3]);
        0
    });
}
