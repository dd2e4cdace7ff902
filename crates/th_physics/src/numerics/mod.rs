// crates/th_physics/src/numerics/mod.rs

//! 数值工具
//!
//! TVD 斜率限制器等与具体格式无关的数值构件。

pub mod limiter;

pub use limiter::minmod::MinmodLimiter;
