use alloc::sync::Arc;

/// 打开的文件
///
/// 关闭即 drop 最后一个引用；实现者在 `Drop` 中释放底层资源。
pub trait File: Send + Sync {
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
    /// 从当前位置读到 `buf`，返回实际读取的字节数
    fn read(&self, buf: &mut [u8]) -> usize;
    /// 从当前位置写入 `buf`，返回实际写入的字节数
    fn write(&self, buf: &[u8]) -> usize;
    /// fork 时为子任务复制一个独立的打开文件（共享底层数据，位置独立）
    fn duplicate(&self) -> Arc<dyn File>;
    /// 文件大小，设备文件为 0
    fn size(&self) -> usize {
        0
    }
}
