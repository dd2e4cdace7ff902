// crates/th_physics/src/gpu/solver.rs

//! GPU 模拟编排器
//!
//! 每步按 FIFO 队列编码：边界核（就地） → 归约 → 时间步推进 →
//! 格式核（src→dst） → 独立摩擦核（可选），随后主机交换乒乓绑定。
//! 主机只在批次间读回时间步标量块；流式栅格边界在消费核入队前
//! 完成帧上载。
//!
//! 缓存变体（工作组瓦片装载）按 16×16 瓦片、14×14 内部计算调度；
//! 因外环只装载不写出，调度前整体复制 src→dst 以保证边界环与
//! 瓦片盲区的原样传递。

use log::{debug, info};
use th_foundation::constants::NODATA_SENTINEL;
use th_foundation::ThResult;

use super::backend::GpuContext;
use super::buffer::{DoubleBuffer, GpuBufferUsage, TypedBuffer};
use super::pipeline::{BindingConfig, ComputePipelineConfig, PipelineCache};
use super::shaders;
use super::GpuError;
use crate::boundary::{GridTransform, SimplePipeConfig};
use crate::engine::TimestepBlock;
use crate::grid::CartesianGrid;
use crate::state::{CellField, Terrain};
use crate::types::{FrictionMode, SchemeKind, SolverConfig};

// ============================================================
// 设备端 Pod 结构
// ============================================================

/// 设备端网格参数
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuParams {
    cols: u32,
    rows: u32,
    dx: f32,
    dy: f32,
    dx_inv: f32,
    dy_inv: f32,
    dt_fixed: f32,
    end_time: f32,
}

/// 设备端时间步标量块
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuTimestepBlock {
    time: f32,
    dt: f32,
    time_hydro: f32,
    sync_time: f32,
    batch_total: f32,
    successful: u32,
    skipped: u32,
    pad0: u32,
}

impl GpuTimestepBlock {
    fn to_host(self) -> TimestepBlock {
        TimestepBlock {
            time: self.time as f64,
            dt: self.dt as f64,
            time_hydro: self.time_hydro as f64,
            sync_time: self.sync_time as f64,
            batch_total: self.batch_total as f64,
            successful: self.successful,
            skipped: self.skipped,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuUniformBdyConfig {
    kind: u32,
    entry_count: u32,
    interval: f32,
    pad0: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuGriddedBdyConfig {
    kind: u32,
    grid_cols: u32,
    grid_rows: u32,
    frame_count: u32,
    origin_x: f32,
    origin_y: f32,
    resolution: f32,
    interval: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuCellBdyConfig {
    cell_count: u32,
    entry_count: u32,
    depth_mode: u32,
    discharge_mode: u32,
    interval: f32,
    pad0: f32,
    pad1: f32,
    pad2: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuPipeBdyConfig {
    diameter: f32,
    length: f32,
    roughness: f32,
    loss_coefficients: f32,
    invert_start: f32,
    invert_end: f32,
    start_cell: u32,
    end_cell: u32,
}

// ============================================================
// 边界调度描述
// ============================================================

/// 流式帧加载回调
pub type GpuFrameLoader = Box<dyn FnMut(usize) -> ThResult<Vec<f32>> + Send>;

struct GpuBoundary {
    name: String,
    pipeline: &'static str,
    /// 按绑定序排列的附加缓冲（config 及载荷）
    extra_buffers: Vec<wgpu::Buffer>,
    /// 一维调度的工作项总数（None 表示单工作项）
    work_items: Option<u32>,
    /// 流式帧状态
    streaming: Option<StreamingState>,
}

struct StreamingState {
    interval: f64,
    loaded_index: Option<usize>,
    loader: GpuFrameLoader,
    /// extra_buffers 中帧缓冲的下标
    frame_buffer: usize,
    frame_len: usize,
}

// ============================================================
// GPU 模拟
// ============================================================

/// GPU 模拟编排器
pub struct GpuSimulation {
    context: GpuContext,
    grid: CartesianGrid,
    config: SolverConfig,
    use_cached_scheme: bool,

    state: DoubleBuffer<[f32; 4]>,
    bed: TypedBuffer<f32>,
    manning: TypedBuffer<f32>,
    params_buf: TypedBuffer<GpuParams>,
    ts_buf: TypedBuffer<GpuTimestepBlock>,
    reduction: TypedBuffer<f32>,

    pipelines: PipelineCache,
    boundaries: Vec<GpuBoundary>,
}

impl GpuSimulation {
    /// 创建 GPU 模拟
    pub fn new(
        context: GpuContext,
        grid: CartesianGrid,
        terrain: &Terrain,
        initial: &CellField,
        config: SolverConfig,
    ) -> Result<Self, GpuError> {
        let n = grid.n_cells();
        if terrain.z_bed.len() != n || initial.n_cells() != n {
            return Err(GpuError::InvalidConfig(format!(
                "地形/初始状态大小与网格不一致: {}",
                n
            )));
        }

        let device = context.device();

        // 状态打包上载
        let packed: Vec<[f32; 4]> = (0..n)
            .map(|idx| {
                [
                    initial.eta[idx] as f32,
                    initial.eta_max[idx] as f32,
                    initial.qx[idx] as f32,
                    initial.qy[idx] as f32,
                ]
            })
            .collect();
        let state = DoubleBuffer::new(device, n, GpuBufferUsage::Storage, "cell_state");
        state.read_buffer().write(context.queue(), &packed);
        state.write_buffer().write(context.queue(), &packed);

        let bed_f32: Vec<f32> = terrain.z_bed.iter().map(|&z| z as f32).collect();
        let manning_f32: Vec<f32> = terrain.manning.iter().map(|&m| m as f32).collect();
        let bed = TypedBuffer::from_data(
            device,
            &bed_f32,
            GpuBufferUsage::StorageReadOnly,
            Some("bed"),
        );
        let manning = TypedBuffer::from_data(
            device,
            &manning_f32,
            GpuBufferUsage::StorageReadOnly,
            Some("manning"),
        );

        let params = GpuParams {
            cols: grid.cols() as u32,
            rows: grid.rows() as u32,
            dx: grid.dx() as f32,
            dy: grid.dy() as f32,
            dx_inv: grid.dx_inv() as f32,
            dy_inv: grid.dy_inv() as f32,
            dt_fixed: config.fixed_dt as f32,
            end_time: if config.end_time == f64::MAX {
                f32::MAX
            } else {
                config.end_time as f32
            },
        };
        let params_buf =
            TypedBuffer::from_data(device, &[params], GpuBufferUsage::Uniform, Some("params"));

        let ts = GpuTimestepBlock {
            sync_time: f32::MAX,
            ..Default::default()
        };
        let ts_buf =
            TypedBuffer::from_data(device, &[ts], GpuBufferUsage::Storage, Some("timestep"));

        let groups = config.reduction_groups.max(1);
        let reduction = TypedBuffer::new(
            device,
            groups,
            GpuBufferUsage::Storage,
            Some("reduction"),
        );

        let mut sim = Self {
            context,
            grid,
            config,
            use_cached_scheme: false,
            state,
            bed,
            manning,
            params_buf,
            ts_buf,
            reduction,
            pipelines: PipelineCache::new(),
            boundaries: Vec::new(),
        };
        sim.compile_pipelines();

        info!(
            "GPU simulation prepared on '{}': {} cells, scheme={}",
            sim.context.adapter_name(),
            n,
            sim.config.scheme
        );
        Ok(sim)
    }

    /// 选择缓存变体（工作组瓦片装载）
    pub fn set_cached_scheme(&mut self, enabled: bool) {
        self.use_cached_scheme = enabled;
    }

    fn compile_pipelines(&mut self) {
        let device = self.context.device();
        let config = &self.config;

        let scheme_bindings = vec![
            BindingConfig::uniform(0),
            BindingConfig::storage(1, true),
            BindingConfig::storage(2, false),
            BindingConfig::storage(3, true),
            BindingConfig::storage(4, true),
            BindingConfig::storage(5, true),
        ];
        let scheme_source = match config.scheme {
            SchemeKind::Godunov => shaders::SCHEME_GODUNOV,
            SchemeKind::Inertial => shaders::SCHEME_INERTIAL,
        };
        self.pipelines.get_or_create(
            device,
            "scheme",
            &ComputePipelineConfig {
                shader_source: shaders::assemble(scheme_source, config),
                entry_point: "main".to_string(),
                workgroup_size: (16, 16, 1),
                bindings: scheme_bindings.clone(),
            },
        );
        if config.scheme == SchemeKind::Godunov {
            self.pipelines.get_or_create(
                device,
                "scheme_cached",
                &ComputePipelineConfig {
                    shader_source: shaders::assemble(shaders::SCHEME_GODUNOV, config),
                    entry_point: "main_cached".to_string(),
                    workgroup_size: (16, 16, 1),
                    bindings: scheme_bindings,
                },
            );
        }

        self.pipelines.get_or_create(
            device,
            "friction",
            &ComputePipelineConfig {
                shader_source: shaders::assemble(shaders::FRICTION, config),
                entry_point: "main".to_string(),
                workgroup_size: (256, 1, 1),
                bindings: vec![
                    BindingConfig::uniform(0),
                    BindingConfig::storage(1, false),
                    BindingConfig::storage(2, true),
                    BindingConfig::storage(3, true),
                    BindingConfig::storage(4, true),
                ],
            },
        );

        self.pipelines.get_or_create(
            device,
            "reduce",
            &ComputePipelineConfig {
                shader_source: shaders::assemble(shaders::REDUCE, config),
                entry_point: "main".to_string(),
                workgroup_size: (256, 1, 1),
                bindings: vec![
                    BindingConfig::uniform(0),
                    BindingConfig::storage(1, true),
                    BindingConfig::storage(2, true),
                    BindingConfig::storage(3, false),
                ],
            },
        );

        let timestep_bindings = vec![
            BindingConfig::uniform(0),
            BindingConfig::storage(1, false),
            BindingConfig::storage(2, true),
        ];
        self.pipelines.get_or_create(
            device,
            "advance_normal",
            &ComputePipelineConfig {
                shader_source: shaders::assemble(shaders::TIMESTEP, config),
                entry_point: "advance_normal".to_string(),
                workgroup_size: (1, 1, 1),
                bindings: timestep_bindings.clone(),
            },
        );
        self.pipelines.get_or_create(
            device,
            "update_timestep",
            &ComputePipelineConfig {
                shader_source: shaders::assemble(shaders::TIMESTEP, config),
                entry_point: "update_timestep".to_string(),
                workgroup_size: (1, 1, 1),
                bindings: timestep_bindings,
            },
        );
    }

    fn ensure_boundary_pipeline(&mut self, name: &'static str, source: &str, extra: &[BindingConfig]) {
        if self.pipelines.contains(name) {
            return;
        }
        let mut bindings = vec![
            BindingConfig::uniform(0),
            BindingConfig::storage(1, false),
            BindingConfig::storage(2, true),
            BindingConfig::storage(3, true),
        ];
        bindings.extend_from_slice(extra);
        let workgroup = match name {
            "bdy_cell" => (64, 1, 1),
            "bdy_pipe" => (1, 1, 1),
            _ => (256, 1, 1),
        };
        self.pipelines.get_or_create(
            self.context.device(),
            name,
            &ComputePipelineConfig {
                shader_source: shaders::assemble(source, &self.config),
                entry_point: "main".to_string(),
                workgroup_size: workgroup,
                bindings,
            },
        );
    }

    /// 注册均匀降雨/损失边界（固定间隔序列，单位 mm/hr）
    pub fn add_uniform_boundary(
        &mut self,
        name: impl Into<String>,
        is_loss: bool,
        interval: f64,
        values: &[f32],
    ) {
        self.ensure_boundary_pipeline(
            "bdy_uniform",
            shaders::BDY_UNIFORM,
            &[BindingConfig::uniform(4), BindingConfig::storage(5, true)],
        );

        let device = self.context.device();
        let config = GpuUniformBdyConfig {
            kind: if is_loss { 1 } else { 0 },
            entry_count: values.len() as u32,
            interval: interval as f32,
            pad0: 0.0,
        };
        let config_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_uniform_config"),
                contents: bytemuck::bytes_of(&config),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let series_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_uniform_series"),
                contents: bytemuck::cast_slice(values),
                usage: wgpu::BufferUsages::STORAGE,
            },
        );

        self.boundaries.push(GpuBoundary {
            name: name.into(),
            pipeline: "bdy_uniform",
            extra_buffers: vec![config_buf, series_buf],
            work_items: Some(self.grid.n_cells() as u32),
            streaming: None,
        });
    }

    /// 注册常驻栅格强迫边界
    pub fn add_gridded_boundary(
        &mut self,
        name: impl Into<String>,
        is_mass_flux: bool,
        transform: &GridTransform,
        interval: f64,
        frames: &[f32],
        frame_count: usize,
    ) -> Result<(), GpuError> {
        let frame_size = transform.cols * transform.rows;
        if frames.len() != frame_size * frame_count || frame_count == 0 {
            return Err(GpuError::InvalidConfig("栅格帧数据大小不一致".to_string()));
        }

        self.ensure_boundary_pipeline(
            "bdy_gridded",
            shaders::BDY_GRIDDED,
            &[BindingConfig::uniform(4), BindingConfig::storage(5, true)],
        );

        let device = self.context.device();
        let config = GpuGriddedBdyConfig {
            kind: if is_mass_flux { 1 } else { 0 },
            grid_cols: transform.cols as u32,
            grid_rows: transform.rows as u32,
            frame_count: frame_count as u32,
            origin_x: transform.origin_x as f32,
            origin_y: transform.origin_y as f32,
            resolution: transform.resolution as f32,
            interval: interval as f32,
        };
        let config_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_gridded_config"),
                contents: bytemuck::bytes_of(&config),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let frames_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_gridded_frames"),
                contents: bytemuck::cast_slice(frames),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            },
        );

        self.boundaries.push(GpuBoundary {
            name: name.into(),
            pipeline: "bdy_gridded",
            extra_buffers: vec![config_buf, frames_buf],
            work_items: Some(self.grid.n_cells() as u32),
            streaming: None,
        });
        Ok(())
    }

    /// 注册流式栅格强迫边界（单帧驻留，主机按帧索引上载）
    pub fn add_streaming_gridded_boundary(
        &mut self,
        name: impl Into<String>,
        is_mass_flux: bool,
        transform: &GridTransform,
        interval: f64,
        loader: GpuFrameLoader,
    ) {
        self.ensure_boundary_pipeline(
            "bdy_gridded",
            shaders::BDY_GRIDDED,
            &[BindingConfig::uniform(4), BindingConfig::storage(5, true)],
        );

        let device = self.context.device();
        let frame_size = transform.cols * transform.rows;
        let config = GpuGriddedBdyConfig {
            kind: if is_mass_flux { 1 } else { 0 },
            grid_cols: transform.cols as u32,
            grid_rows: transform.rows as u32,
            frame_count: 1,
            origin_x: transform.origin_x as f32,
            origin_y: transform.origin_y as f32,
            resolution: transform.resolution as f32,
            interval: f32::MAX, // 单帧：核内时间索引恒为 0
        };
        let config_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_streaming_config"),
                contents: bytemuck::bytes_of(&config),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let frame_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bdy_streaming_frame"),
            size: (frame_size * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.boundaries.push(GpuBoundary {
            name: name.into(),
            pipeline: "bdy_gridded",
            extra_buffers: vec![config_buf, frame_buf],
            work_items: Some(self.grid.n_cells() as u32),
            streaming: Some(StreamingState {
                interval,
                loaded_index: None,
                loader,
                frame_buffer: 1,
                frame_len: frame_size,
            }),
        });
    }

    /// 注册单元时间序列边界
    ///
    /// `entries` 为固定间隔的 (时间, 水位, qx, qy) 条目。
    pub fn add_cell_boundary(
        &mut self,
        name: impl Into<String>,
        cells: &[u32],
        depth_mode: u32,
        discharge_mode: u32,
        interval: f64,
        entries: &[[f32; 4]],
    ) {
        self.ensure_boundary_pipeline(
            "bdy_cell",
            shaders::BDY_CELL,
            &[
                BindingConfig::uniform(4),
                BindingConfig::storage(5, true),
                BindingConfig::storage(6, true),
            ],
        );

        let device = self.context.device();
        let config = GpuCellBdyConfig {
            cell_count: cells.len() as u32,
            entry_count: entries.len() as u32,
            depth_mode,
            discharge_mode,
            interval: interval as f32,
            pad0: 0.0,
            pad1: 0.0,
            pad2: 0.0,
        };
        let config_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_cell_config"),
                contents: bytemuck::bytes_of(&config),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );
        let cells_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_cell_cells"),
                contents: bytemuck::cast_slice(cells),
                usage: wgpu::BufferUsages::STORAGE,
            },
        );
        let entries_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_cell_entries"),
                contents: bytemuck::cast_slice(entries),
                usage: wgpu::BufferUsages::STORAGE,
            },
        );

        self.boundaries.push(GpuBoundary {
            name: name.into(),
            pipeline: "bdy_cell",
            extra_buffers: vec![config_buf, cells_buf, entries_buf],
            work_items: Some(cells.len() as u32),
            streaming: None,
        });
    }

    /// 注册简单压力管边界
    pub fn add_pipe_boundary(&mut self, name: impl Into<String>, pipe: &SimplePipeConfig) {
        self.ensure_boundary_pipeline("bdy_pipe", shaders::BDY_PIPE, &[BindingConfig::uniform(4)]);

        let device = self.context.device();
        let config = GpuPipeBdyConfig {
            diameter: pipe.diameter as f32,
            length: pipe.length as f32,
            roughness: pipe.roughness as f32,
            loss_coefficients: pipe.loss_coefficients as f32,
            invert_start: pipe.invert_start as f32,
            invert_end: pipe.invert_end as f32,
            start_cell: pipe.start_cell.get() as u32,
            end_cell: pipe.end_cell.get() as u32,
        };
        let config_buf = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("bdy_pipe_config"),
                contents: bytemuck::bytes_of(&config),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );

        self.boundaries.push(GpuBoundary {
            name: name.into(),
            pipeline: "bdy_pipe",
            extra_buffers: vec![config_buf],
            work_items: None,
            streaming: None,
        });
    }

    /// 流式边界帧推进（上载先于消费核入队）
    fn stream_boundaries(&mut self, time: f64) -> ThResult<()> {
        for boundary in &mut self.boundaries {
            let Some(streaming) = &mut boundary.streaming else {
                continue;
            };
            let index = (time / streaming.interval) as usize;
            if streaming.loaded_index == Some(index) {
                continue;
            }
            let data = (streaming.loader)(index)?;
            if data.len() != streaming.frame_len {
                return Err(GpuError::InvalidConfig(format!(
                    "流式帧大小不一致: 期望 {}, 实际 {}",
                    streaming.frame_len,
                    data.len()
                ))
                .into());
            }
            self.context.queue().write_buffer(
                &boundary.extra_buffers[streaming.frame_buffer],
                0,
                bytemuck::cast_slice(&data),
            );
            streaming.loaded_index = Some(index);
            debug!("boundary '{}' streamed frame {}", boundary.name, index);
        }
        Ok(())
    }

    /// 执行一步（编码并提交整条核序列，随后交换乒乓绑定）
    pub fn step(&mut self, host_time_hint: f64) -> ThResult<()> {
        self.stream_boundaries(host_time_hint)?;

        let device = self.context.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("step"),
        });

        let src = self.state.read_buffer().buffer();
        let dst = self.state.write_buffer().buffer();
        let n = self.grid.n_cells() as u32;

        // 边界核（就地修改源缓冲）
        for boundary in &self.boundaries {
            let pipeline = self.pipelines.get(boundary.pipeline).unwrap();
            let mut buffers = vec![
                self.params_buf.buffer(),
                src,
                self.bed.buffer(),
                self.ts_buf.buffer(),
            ];
            for extra in &boundary.extra_buffers {
                buffers.push(extra);
            }
            let bind_group = pipeline.create_bind_group(device, &buffers, Some(&boundary.name));

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(boundary.pipeline),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            match boundary.work_items {
                Some(items) => pass.dispatch_workgroups(pipeline.dispatch_size(items), 1, 1),
                None => pass.dispatch_workgroups(1, 1, 1),
            }
        }

        // 第一级归约
        {
            let pipeline = self.pipelines.get("reduce").unwrap();
            let bind_group = pipeline.create_bind_group(
                device,
                &[
                    self.params_buf.buffer(),
                    src,
                    self.bed.buffer(),
                    self.reduction.buffer(),
                ],
                Some("reduce"),
            );
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("reduce"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(self.reduction.len() as u32, 1, 1);
        }

        // 第二级标量时间步核
        {
            let pipeline = self.pipelines.get("advance_normal").unwrap();
            let bind_group = pipeline.create_bind_group(
                device,
                &[
                    self.params_buf.buffer(),
                    self.ts_buf.buffer(),
                    self.reduction.buffer(),
                ],
                Some("advance_normal"),
            );
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("advance_normal"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }

        // 缓存变体的瓦片盲区由整体复制兜底
        if self.use_cached_scheme {
            encoder.copy_buffer_to_buffer(
                src,
                0,
                dst,
                0,
                self.state.read_buffer().size_bytes(),
            );
        }

        // 格式核 src → dst
        {
            let name = if self.use_cached_scheme && self.config.scheme == SchemeKind::Godunov {
                "scheme_cached"
            } else {
                "scheme"
            };
            let pipeline = self.pipelines.get(name).unwrap();
            let bind_group = pipeline.create_bind_group(
                device,
                &[
                    self.params_buf.buffer(),
                    src,
                    dst,
                    self.bed.buffer(),
                    self.manning.buffer(),
                    self.ts_buf.buffer(),
                ],
                Some(name),
            );
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(name),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            if self.use_cached_scheme && self.config.scheme == SchemeKind::Godunov {
                let inner = 14u32;
                let wx = (self.grid.cols() as u32).div_ceil(inner);
                let wy = (self.grid.rows() as u32).div_ceil(inner);
                pass.dispatch_workgroups(wx, wy, 1);
            } else {
                let wx = (self.grid.cols() as u32).div_ceil(16);
                let wy = (self.grid.rows() as u32).div_ceil(16);
                pass.dispatch_workgroups(wx, wy, 1);
            }
        }

        // 独立摩擦核作用于目标缓冲
        if self.config.friction == FrictionMode::Standalone {
            let pipeline = self.pipelines.get("friction").unwrap();
            let bind_group = pipeline.create_bind_group(
                device,
                &[
                    self.params_buf.buffer(),
                    dst,
                    self.bed.buffer(),
                    self.manning.buffer(),
                    self.ts_buf.buffer(),
                ],
                Some("friction"),
            );
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("friction"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline.pipeline());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(pipeline.dispatch_size(n), 1, 1);
        }

        self.context.queue().submit(std::iter::once(encoder.finish()));
        self.state.swap();
        Ok(())
    }

    /// 排队执行一个批次并读回时间步标量块
    ///
    /// 批次内不做主机读回；流式时间提示按上次读回值外推。
    pub fn run_batch(&mut self, steps: usize) -> ThResult<TimestepBlock> {
        let start = self.read_timestep()?;
        let mut time_hint = start.time;
        let dt_hint = start.dt.abs().max(1e-6);

        for _ in 0..steps {
            self.step(time_hint)?;
            time_hint += dt_hint;
        }

        let block = self.read_timestep()?;
        debug!(
            "GPU batch complete: t={:.6}s dt={:.3e}s ({} ok, {} skipped)",
            block.time, block.dt, block.successful, block.skipped
        );
        Ok(block)
    }

    /// 读回时间步标量块（批次间阻塞）
    pub fn read_timestep(&self) -> Result<TimestepBlock, GpuError> {
        let raw: Vec<GpuTimestepBlock> = self.context.read_buffer(self.ts_buf.buffer(), 1)?;
        Ok(raw[0].to_host())
    }

    /// 设置下一同步屏障（读-改-写标量块）
    pub fn set_sync_time(&self, t_sync: f64) -> Result<(), GpuError> {
        let mut raw: Vec<GpuTimestepBlock> = self.context.read_buffer(self.ts_buf.buffer(), 1)?;
        raw[0].sync_time = t_sync as f32;
        self.ts_buf.write(self.context.queue(), &raw);
        Ok(())
    }

    /// 同步点处理后复位时间步符号
    pub fn resume_after_sync(&self) -> Result<(), GpuError> {
        let mut raw: Vec<GpuTimestepBlock> = self.context.read_buffer(self.ts_buf.buffer(), 1)?;
        raw[0].dt = raw[0].dt.abs();
        self.ts_buf.write(self.context.queue(), &raw);
        Ok(())
    }

    /// 读回单元状态场
    pub fn read_state(&self) -> Result<CellField, GpuError> {
        let n = self.grid.n_cells();
        let packed: Vec<[f32; 4]> = self
            .context
            .read_buffer(self.state.read_buffer().buffer(), n)?;

        let mut field = CellField::new(n);
        for (idx, cell) in packed.iter().enumerate() {
            // NODATA 哨兵在 f32 转换后原样保留
            field.eta[idx] = if cell[0] <= NODATA_SENTINEL as f32 {
                NODATA_SENTINEL
            } else {
                cell[0] as f64
            };
            field.eta_max[idx] = if cell[1] <= NODATA_SENTINEL as f32 {
                NODATA_SENTINEL
            } else {
                cell[1] as f64
            };
            field.qx[idx] = cell[2] as f64;
            field.qy[idx] = cell[3] as f64;
        }
        Ok(field)
    }
}
