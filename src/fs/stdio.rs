use super::File;
use crate::hal::console_getchar;
use alloc::string::String;
use alloc::sync::Arc;

pub struct Stdin;
pub struct Stdout;

impl File for Stdin {
    fn readable(&self) -> bool {
        true
    }
    fn writable(&self) -> bool {
        false
    }
    /// 读取已到达的输入，没有输入时返回 0
    fn read(&self, buf: &mut [u8]) -> usize {
        let mut read = 0;
        for slot in buf.iter_mut() {
            // 无输入时控制台返回 usize::MAX
            let c = console_getchar();
            if c == usize::MAX {
                break;
            }
            *slot = c as u8;
            read += 1;
        }
        read
    }
    fn write(&self, _buf: &[u8]) -> usize {
        0
    }
    fn duplicate(&self) -> Arc<dyn File> {
        Arc::new(Stdin)
    }
}

impl File for Stdout {
    fn readable(&self) -> bool {
        false
    }
    fn writable(&self) -> bool {
        true
    }
    fn read(&self, _buf: &mut [u8]) -> usize {
        0
    }
    fn write(&self, buf: &[u8]) -> usize {
        print!("{}", String::from_utf8_lossy(buf));
        buf.len()
    }
    fn duplicate(&self) -> Arc<dyn File> {
        Arc::new(Stdout)
    }
}
