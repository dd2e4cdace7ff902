// crates/th_physics/src/lib.rs

//! TorrentHydro 求解器核心
//!
//! 在结构化笛卡尔地形上求解二维浅水方程的洪水演进核心，包括：
//! - 网格与单元状态 (grid, state)
//! - 界面重构与 HLLC 黎曼求解 (schemes)
//! - Godunov 一阶格式与惯性简化格式 (schemes)
//! - 点隐式曼宁摩擦 (sources)
//! - CFL 归约与时间步控制、批次状态机 (engine)
//! - 边界核：单元时间序列、均匀降雨、栅格强迫、简单压力管 (boundary)
//! - wgpu 计算后端与 WGSL 核 (gpu)
//!
//! 主机端参考后端以 f64 + rayon 实现，与设备核语义一致，
//! 是测试的语义基准；设备端以 f32 WGSL 运行。

pub mod boundary;
pub mod engine;
pub mod forcing;
pub mod gpu;
pub mod grid;
pub mod numerics;
pub mod schemes;
pub mod sources;
pub mod state;
pub mod types;

// 重导出常用类型
pub use engine::{
    advance_normal, reduce_wave_speeds, update_after_rollback, BatchStatus, QueueMode, Simulation,
    TimestepBlock,
};
pub use grid::{CartesianGrid, Direction};
pub use schemes::{
    godunov_step, inertial_step, hllc_flux, reconstruct_interface, Flux, InterfaceSide,
    InterfaceStates,
};
pub use sources::friction::{apply_friction_field, friction_update};
pub use state::{CellField, CellState, PingPongState, Terrain};
pub use types::{
    FrictionMode, NumericalParams, SchemeKind, SolverConfig, SolverConfigBuilder, TimestepMode,
    WaveSpeedForm,
};
