// crates/th_physics/src/engine/mod.rs

//! 引擎核心
//!
//! - [`timestep`]: 两级 CFL 归约与时间步控制核
//! - [`solver`]: 主机编排器（批次状态机、乒乓交换、回滚）

pub mod solver;
pub mod timestep;

pub use solver::{BatchStatus, QueueMode, Simulation};
pub use timestep::{
    advance_normal, reduce_wave_speeds, update_after_rollback, TimestepBlock,
};
