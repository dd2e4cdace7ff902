// crates/th_foundation/src/error.rs

//! 基础错误类型
//!
//! 仅包含与基础设施相关的错误（IO、索引、尺寸、内部不变量），
//! 不引入网格、格式、设备等高层概念。高层错误通过转换为
//! [`ThError::Internal`] 或具体基础错误向下兼容。

use std::{fmt, io, path::PathBuf};

/// 统一结果类型别名
pub type ThResult<T> = Result<T, ThError>;

/// Foundation 层基础错误
#[derive(Debug)]
pub enum ThError {
    /// IO 操作失败
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误源
        source: Option<io::Error>,
    },

    /// 文件不存在
    FileNotFound {
        /// 未找到的文件路径
        path: PathBuf,
    },

    /// 数组大小不匹配
    SizeMismatch {
        /// 数据名称（用于调试）
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引访问越界
    IndexOutOfBounds {
        /// 索引类别（如 "Cell"）
        index_type: &'static str,
        /// 访问的索引值
        index: usize,
        /// 容器长度
        len: usize,
    },

    /// 输入数据验证失败
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 内部实现错误（不变量被破坏）
    Internal {
        /// 内部错误描述
        message: String,
    },

    /// 功能不受支持（如当前平台无可用 GPU 特性）
    Unsupported {
        /// 功能描述
        feature: String,
    },
}

impl ThError {
    /// 创建 IO 错误
    #[inline]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 创建文件未找到错误
    #[inline]
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 创建大小不匹配错误
    #[inline]
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 创建索引越界错误
    #[inline]
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 创建无效输入错误
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 创建不受支持错误
    #[inline]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// 验证数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> ThResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 验证索引是否在有效范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> ThResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

impl From<io::Error> for ThError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: "IO 操作失败".to_string(),
            source: Some(err),
        }
    }
}

impl fmt::Display for ThError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { message, .. } => write!(f, "IO错误: {}", message),
            Self::FileNotFound { path } => write!(f, "文件不存在: {}", path.display()),
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(f, "数组大小不匹配: {} 期望{}, 实际{}", name, expected, actual),
            Self::IndexOutOfBounds {
                index_type,
                index,
                len,
            } => write!(f, "索引越界: {} 索引{} 超出范围 0..{}", index_type, index, len),
            Self::InvalidInput { message } => write!(f, "无效的输入数据: {}", message),
            Self::Internal { message } => write!(f, "内部错误: {}", message),
            Self::Unsupported { feature } => write!(f, "功能不受支持: {}", feature),
        }
    }
}

impl std::error::Error for ThError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => source.as_ref().map(|e| e as _),
            _ => None,
        }
    }
}
