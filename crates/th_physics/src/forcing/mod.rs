// crates/th_physics/src/forcing/mod.rs

//! 外部强迫数据
//!
//! 边界核消费的时间序列表示与插值。

pub mod timeseries;

pub use timeseries::{ExtrapolationMode, TimeSeries, TimeSeriesCursor};
