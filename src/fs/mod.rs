//! 文件：打开文件抽象、标准输入输出、内存文件系统与打开文件表

mod fd_table;
mod file;
mod inode;
mod stdio;

pub use fd_table::FdTable;
pub use file::File;
pub use inode::{create_file, open_file, remove_file, Inode, OSInode, OpenFlags};
pub use stdio::{Stdin, Stdout};

use crate::sync::Lock;
use lazy_static::lazy_static;

lazy_static! {
    /// 串行化所有文件读写
    pub static ref FILESYS_LOCK: Lock = Lock::new();
}
