// crates/th_foundation/src/memory.rs

//! 对齐内存缓冲区
//!
//! 求解器的所有大型逐单元数组都通过 [`AlignedVec`] 分配：
//! 64 字节对齐满足 AVX-512 与缓存行要求，256 字节对齐用于
//! 需要整块拷贝到设备的暂存数据。支持 rayon 并行迭代与 serde。

use bytemuck::Pod;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// 对齐要求
pub trait Alignment: 'static {
    /// 请求的字节对齐
    const ALIGN: usize;
}

/// CPU 对齐（64 字节缓存行）
#[derive(Debug, Clone, Copy)]
pub struct CpuAlign;
impl Alignment for CpuAlign {
    const ALIGN: usize = 64;
}

/// 设备暂存对齐（256 字节，便于整块上传）
#[derive(Debug, Clone, Copy)]
pub struct StagingAlign;
impl Alignment for StagingAlign {
    const ALIGN: usize = 256;
}

/// 对齐的连续缓冲区
///
/// 固定长度语义：创建后长度只通过 [`AlignedVec::resize`] 改变，
/// 新增区域填零。
#[derive(Debug)]
pub struct AlignedVec<T: Pod + Default, A: Alignment = CpuAlign> {
    ptr: *mut T,
    len: usize,
    _align: PhantomData<A>,
}

unsafe impl<T: Pod + Default + Send, A: Alignment> Send for AlignedVec<T, A> {}
unsafe impl<T: Pod + Default + Sync, A: Alignment> Sync for AlignedVec<T, A> {}

impl<T: Pod + Default, A: Alignment> AlignedVec<T, A> {
    /// 创建长度为 len 的零初始化缓冲区
    pub fn zeros(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: std::ptr::null_mut(),
                len: 0,
                _align: PhantomData,
            };
        }

        let layout = Self::layout_for(len);
        let ptr = unsafe { alloc_zeroed(layout) as *mut T };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        debug_assert_eq!((ptr as usize) % layout.align(), 0);

        Self {
            ptr,
            len,
            _align: PhantomData,
        }
    }

    /// 从既有 Vec 重新对齐
    pub fn from_vec(vec: Vec<T>) -> Self {
        let mut aligned = Self::zeros(vec.len());
        aligned.as_mut_slice().copy_from_slice(&vec);
        aligned
    }

    /// 创建 len 个 value 的缓冲区
    pub fn splat(len: usize, value: T) -> Self {
        let mut aligned = Self::zeros(len);
        aligned.as_mut_slice().fill(value);
        aligned
    }

    /// 长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 只读切片视图
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// 可变切片视图
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.len == 0 {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    /// 调整长度；新增区域填零（整块重分配）
    pub fn resize(&mut self, new_len: usize) {
        if new_len == self.len {
            return;
        }
        let mut grown = Self::zeros(new_len);
        let keep = self.len.min(new_len);
        grown.as_mut_slice()[..keep].copy_from_slice(&self.as_slice()[..keep]);
        *self = grown;
    }

    /// 并行只读迭代器
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        self.as_slice().par_iter()
    }

    /// 并行可变迭代器
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T>
    where
        T: Send + Sync,
    {
        self.as_mut_slice().par_iter_mut()
    }

    #[inline]
    fn layout_for(len: usize) -> Layout {
        Layout::from_size_align(
            len * std::mem::size_of::<T>(),
            A::ALIGN.max(std::mem::align_of::<T>()),
        )
        .expect("invalid layout")
    }
}

impl<T: Pod + Default, A: Alignment> Deref for AlignedVec<T, A> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Pod + Default, A: Alignment> DerefMut for AlignedVec<T, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: Pod + Default, A: Alignment> Clone for AlignedVec<T, A> {
    fn clone(&self) -> Self {
        let mut copy = Self::zeros(self.len);
        copy.as_mut_slice().copy_from_slice(self.as_slice());
        copy
    }
}

impl<T: Pod + Default, A: Alignment> Default for AlignedVec<T, A> {
    fn default() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
            _align: PhantomData,
        }
    }
}

impl<T: Pod + Default, A: Alignment> Drop for AlignedVec<T, A> {
    fn drop(&mut self) {
        if self.ptr.is_null() || self.len == 0 {
            return;
        }
        let layout = Self::layout_for(self.len);
        unsafe { dealloc(self.ptr as *mut u8, layout) };
    }
}

impl<T: Pod + Default, A: Alignment> FromIterator<T> for AlignedVec<T, A> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Pod + Default + Serialize, A: Alignment> Serialize for AlignedVec<T, A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_slice().serialize(serializer)
    }
}

impl<'de, T: Pod + Default + Deserialize<'de>, A: Alignment> Deserialize<'de> for AlignedVec<T, A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_vec(vec))
    }
}
