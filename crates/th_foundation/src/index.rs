// crates/th_foundation/src/index.rs

//! 强类型索引
//!
//! 线性单元索引与归约工作组索引的 newtype 包装，
//! 防止行列号、线性索引与工作组编号之间的误用。

use serde::{Deserialize, Serialize};

/// 线性单元索引（行主序，`id = j * cols + i`）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct CellIndex(pub usize);

impl CellIndex {
    /// 获取底层索引值
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for CellIndex {
    #[inline]
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for CellIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cell({})", self.0)
    }
}

/// 归约工作组索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WorkGroupIndex(pub usize);

impl WorkGroupIndex {
    /// 获取底层索引值
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}
