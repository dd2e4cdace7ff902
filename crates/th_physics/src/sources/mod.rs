// crates/th_physics/src/sources/mod.rs

//! 源项处理
//!
//! 当前仅含点隐式曼宁摩擦；可按需在格式核内联或独立成核执行。

pub mod friction;

pub use friction::{apply_friction_field, friction_update};
