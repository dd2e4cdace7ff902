// crates/th_physics/src/schemes/mod.rs

//! 数值格式
//!
//! - [`reconstruction`]: 保深度正性的界面重构
//! - [`riemann`]: HLLC 近似黎曼求解器
//! - [`godunov`]: Godunov 一阶逐单元更新核
//! - [`inertial`]: 惯性简化逐单元更新核

pub mod godunov;
pub mod inertial;
pub mod reconstruction;
pub mod riemann;

pub use godunov::godunov_step;
pub use inertial::inertial_step;
pub use reconstruction::{reconstruct_interface, FaceInput, InterfaceSide, InterfaceStates};
pub use riemann::{hllc_flux, Flux};
