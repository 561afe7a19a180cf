//! 系统调用层：调用号分发、用户缓冲区复制、文件读写与错误码

mod common;

use common::{status, Trace};
use taskcore::boot::{console_output, push_console_input, run};
use taskcore::config::PRI_DEFAULT;
use taskcore::fs::OpenFlags;
use taskcore::hal::active_token;
use taskcore::mm::{MapPermission, VirtAddr};
use taskcore::syscall::{syscall, sys_fork, SyscallId};
use taskcore::task::{new_address_space, spawn, wait, with_memory_set};

const BUF: usize = 0x4000;

fn call(id: SyscallId, args: [usize; 3]) -> isize {
    syscall(id as usize, args)
}

/// 建立一个两页的用户地址空间，并把 `data` 放在 `BUF` 处
fn user_space_with(data: &[u8]) {
    new_address_space();
    let perm = MapPermission::R | MapPermission::W | MapPermission::U;
    with_memory_set(|ms| {
        ms.insert_framed_area(VirtAddr(BUF), VirtAddr(BUF + 0x2000), perm)
            .and_then(|()| ms.write_bytes(BUF, data))
    })
    .unwrap()
    .unwrap();
}

fn user_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    with_memory_set(|ms| ms.read_bytes(BUF, &mut buf))
        .unwrap()
        .unwrap();
    buf
}

#[test]
fn new_address_space_becomes_active() {
    let result = run("space", PRI_DEFAULT, || {
        let before = active_token();
        new_address_space();
        let token = with_memory_set(|ms| ms.token()).unwrap();
        status(before.is_none() && active_token() == Some(token))
    });
    assert_eq!(result, 0);
}

#[test]
fn write_to_stdout_reaches_console() {
    let written = run("writer", PRI_DEFAULT, || {
        user_space_with(b"hello from user space\n");
        call(SyscallId::Write, [1, BUF, 22]) as i32
    });
    assert_eq!(written, 22);
    assert!(console_output().contains("hello from user space\n"));
}

#[test]
fn file_create_write_read_round_trip() {
    let trace = Trace::new();
    let t = trace.clone();
    run("files", PRI_DEFAULT, move || {
        user_space_with(b"notes.txt");
        t.push(format!("create {}", call(SyscallId::Create, [BUF, 9, 0])));
        t.push(format!("again {}", call(SyscallId::Create, [BUF, 9, 0])));
        let flags = OpenFlags::RDWR.bits() as usize;
        let fd = call(SyscallId::Open, [BUF, 9, flags]);
        t.push(format!("fd {}", fd));
        with_memory_set(|ms| ms.write_bytes(BUF, b"payload"))
            .unwrap()
            .unwrap();
        t.push(format!("write {}", call(SyscallId::Write, [fd as usize, BUF, 7])));
        t.push(format!("size {}", call(SyscallId::Filesize, [fd as usize, 0, 0])));
        with_memory_set(|ms| ms.write_bytes(BUF, b"notes.txt"))
            .unwrap()
            .unwrap();
        let reader = call(SyscallId::Open, [BUF, 9, OpenFlags::RDONLY.bits() as usize]);
        t.push(format!("read {}", call(SyscallId::Read, [reader as usize, BUF, 64])));
        t.push(String::from_utf8_lossy(&user_bytes(7)).into_owned());
        t.push(format!("read-only write {}", call(SyscallId::Write, [reader as usize, BUF, 1])));
        t.push(format!("close {}", call(SyscallId::Close, [reader as usize, 0, 0])));
        t.push(format!("close again {}", call(SyscallId::Close, [reader as usize, 0, 0])));
        with_memory_set(|ms| ms.write_bytes(BUF, b"notes.txt"))
            .unwrap()
            .unwrap();
        t.push(format!("remove {}", call(SyscallId::Remove, [BUF, 9, 0])));
        0
    });
    assert_eq!(
        trace.events(),
        [
            "create 0",
            "again -1",
            "fd 2",
            "write 7",
            "size 7",
            "read 7",
            "payload",
            "read-only write -1",
            "close 0",
            "close again -1",
            "remove 0",
        ]
    );
}

#[test]
fn read_from_stdin_takes_pending_input() {
    let trace = Trace::new();
    let t = trace.clone();
    push_console_input(b"ok");
    run("reader", PRI_DEFAULT, move || {
        user_space_with(b"");
        t.push(format!("read {}", call(SyscallId::Read, [0, BUF, 8])));
        t.push(String::from_utf8_lossy(&user_bytes(2)).into_owned());
        t.push(format!("empty {}", call(SyscallId::Read, [0, BUF, 8])));
        0
    });
    assert_eq!(trace.events(), ["read 2", "ok", "empty 0"]);
}

#[test]
fn oversized_or_unmapped_buffers_are_rejected() {
    let trace = Trace::new();
    let t = trace.clone();
    let result = run("bounds", PRI_DEFAULT, move || {
        user_space_with(b"notes.txt");
        t.push(format!("huge read {}", call(SyscallId::Read, [0, BUF, usize::MAX])));
        t.push(format!("huge write {}", call(SyscallId::Write, [1, BUF, usize::MAX])));
        t.push(format!("huge name {}", call(SyscallId::Create, [BUF, usize::MAX / 2, 0])));
        t.push(format!("past end {}", call(SyscallId::Write, [1, BUF + 0x1000, 0x2000])));
        t.push(format!("wraps {}", call(SyscallId::Read, [0, usize::MAX - 1, 4])));
        0
    });
    assert_eq!(result, 0);
    assert_eq!(
        trace.events(),
        [
            "huge read -1",
            "huge write -1",
            "huge name -1",
            "past end -1",
            "wraps -1",
        ]
    );
}

#[test]
fn buffer_syscalls_need_an_address_space() {
    let result = run("kernel-only", PRI_DEFAULT, || {
        call(SyscallId::Write, [1, BUF, 4]) as i32
    });
    assert_eq!(result, -1);
}

#[test]
fn process_syscalls() {
    let trace = Trace::new();
    let t = trace.clone();
    run("procs", PRI_DEFAULT, move || {
        let tid = call(SyscallId::GetTid, [0; 3]);
        t.push(format!("tid positive {}", tid > 0));
        t.push(format!("priority {}", call(SyscallId::GetPriority, [0; 3])));
        t.push(format!("set {}", call(SyscallId::SetPriority, [45, 0, 0])));
        t.push(format!("priority {}", call(SyscallId::GetPriority, [0; 3])));
        t.push(format!("bad set {}", call(SyscallId::SetPriority, [1000, 0, 0])));
        t.push(format!("yield {}", call(SyscallId::Yield, [0; 3])));
        t.push(format!("sleep {}", call(SyscallId::Sleep, [3, 0, 0])));
        let child = spawn("exits", PRI_DEFAULT, || {
            call(SyscallId::Exit, [(-3isize) as usize, 0, 0]);
            0
        })
        .unwrap();
        t.push(format!("wait {}", call(SyscallId::Wait, [child, 0, 0])));
        t.push(format!("wait again {}", call(SyscallId::Wait, [child, 0, 0])));
        let forked = sys_fork("forked", || 12);
        t.push(format!("fork wait {}", call(SyscallId::Wait, [forked as usize, 0, 0])));
        0
    });
    assert_eq!(
        trace.events(),
        [
            "tid positive true",
            "priority 31",
            "set 0",
            "priority 45",
            "bad set -1",
            "yield 0",
            "sleep 0",
            "wait -3",
            "wait again -1",
            "fork wait 12",
        ]
    );
}

#[test]
fn unknown_syscall_kills_the_caller() {
    let status = run("bogus", PRI_DEFAULT, || {
        let child = spawn("bogus-child", PRI_DEFAULT, || {
            syscall(999, [0; 3]);
            0
        })
        .unwrap();
        wait(child).unwrap()
    });
    assert_eq!(status, -1);
}
