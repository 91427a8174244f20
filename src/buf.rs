//! 帧缓冲区
//!
//! 定长容量的数据包缓冲区：逻辑长度可经 grow/shrink 调整，
//! 所有按偏移的读写都做边界检查并以定义好的错误快速失败。

use thiserror::Error;

/// 缓冲区访问错误
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufError {
    /// 越界访问
    #[error("out-of-bounds access: offset {off} len {len} exceeds frame end {end}")]
    OutOfBounds { off: usize, len: usize, end: usize },
    /// 尾部增长超过预留余量
    #[error("tail growth past reserved headroom: need {need} bytes, capacity {capacity}")]
    Headroom { need: usize, capacity: usize },
    /// 尾部收缩超过当前长度
    #[error("tail shrink of {by} bytes exceeds frame length {len}")]
    Underflow { by: usize, len: usize },
}

/// 数据包帧缓冲区。
///
/// 容量在构造时固定（帧内容 + 预留尾部余量）；`grow`/`shrink`
/// 只移动逻辑末尾，超出容量属于故障而非策略性丢弃。
#[derive(Debug, Clone)]
pub struct FrameBuf {
    data: Vec<u8>,
    len: usize,
}

impl FrameBuf {
    /// 从帧内容构造，并在尾部预留 `headroom` 字节的增长余量。
    pub fn with_headroom(frame: &[u8], headroom: usize) -> Self {
        let mut data = vec![0u8; frame.len() + headroom];
        data[..frame.len()].copy_from_slice(frame);
        Self {
            data,
            len: frame.len(),
        }
    }

    /// 当前逻辑帧长
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 固定总容量（帧长 + 剩余余量）
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// 当前逻辑帧内容
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// 尾部增长 `n` 字节，新字节清零。超过容量时缓冲不变。
    pub fn grow(&mut self, n: usize) -> Result<(), BufError> {
        let need = self.len.saturating_add(n);
        if need > self.data.len() {
            return Err(BufError::Headroom {
                need,
                capacity: self.data.len(),
            });
        }
        self.data[self.len..need].fill(0);
        self.len = need;
        Ok(())
    }

    /// 尾部收缩 `n` 字节。
    pub fn shrink(&mut self, n: usize) -> Result<(), BufError> {
        if n > self.len {
            return Err(BufError::Underflow { by: n, len: self.len });
        }
        self.len -= n;
        Ok(())
    }

    fn check(&self, off: usize, len: usize) -> Result<(), BufError> {
        if off.saturating_add(len) > self.len {
            return Err(BufError::OutOfBounds {
                off,
                len,
                end: self.len,
            });
        }
        Ok(())
    }

    /// 帧内 `[off, off+len)` 只读切片
    pub fn slice(&self, off: usize, len: usize) -> Result<&[u8], BufError> {
        self.check(off, len)?;
        Ok(&self.data[off..off + len])
    }

    pub fn read_u8(&self, off: usize) -> Result<u8, BufError> {
        self.check(off, 1)?;
        Ok(self.data[off])
    }

    /// 按网络序读取 16 位字段
    pub fn read_u16(&self, off: usize) -> Result<u16, BufError> {
        self.check(off, 2)?;
        Ok(u16::from_be_bytes([self.data[off], self.data[off + 1]]))
    }

    /// 按网络序读取 32 位字段
    pub fn read_u32(&self, off: usize) -> Result<u32, BufError> {
        self.check(off, 4)?;
        Ok(u32::from_be_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]))
    }

    pub fn write_u8(&mut self, off: usize, v: u8) -> Result<(), BufError> {
        self.check(off, 1)?;
        self.data[off] = v;
        Ok(())
    }

    /// 按网络序写入 16 位字段
    pub fn write_u16(&mut self, off: usize, v: u16) -> Result<(), BufError> {
        self.check(off, 2)?;
        self.data[off..off + 2].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// 按网络序写入 32 位字段
    pub fn write_u32(&mut self, off: usize, v: u32) -> Result<(), BufError> {
        self.check(off, 4)?;
        self.data[off..off + 4].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// 交换两段等长区间的内容（地址交换用）
    pub fn swap_ranges(&mut self, a: usize, b: usize, len: usize) -> Result<(), BufError> {
        self.check(a, len)?;
        self.check(b, len)?;
        for i in 0..len {
            self.data.swap(a + i, b + i);
        }
        Ok(())
    }

    /// 帧内搬移 `len` 字节（区间可重叠）
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> Result<(), BufError> {
        self.check(src, len)?;
        self.check(dst, len)?;
        self.data.copy_within(src..src + len, dst);
        Ok(())
    }
}
