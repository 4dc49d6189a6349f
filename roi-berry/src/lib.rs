#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供医学影像 (2D 图像栈 / 3D 体数据) 上交互式 ROI
//! (圆 / 椭圆 / 矩形) 的绘制状态机, 以及物理标定后的统计量计算
//! (面积, 平均值, 最大值, 标准差).
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 渲染表面 (canvas), 矢量绘图原语, 持久化标注存储与分割子系统均为
//!   外部协作者, 本 crate 只通过 [`target`] 与 [`annotation`] 中的
//!   trait 缝合点与它们交互.
//! 2. 在非期望情况下 (违反内部不变量), 程序会直接 panic, 而不会导致
//!   内存错误. As what Rust promises. 可恢复的几何 / 标定异常一律
//!   就地降级, 不会抛出.
//!
//! # 功能总览
//!
//! ### 形状几何 ✅
//!
//! 圆 / 椭圆 / 矩形的 canvas 空间 handle 重建规则与世界空间成员谓词.
//!
//! 实现位于 `roi-berry/src/geometry`.
//!
//! ### 流式统计 ✅
//!
//! Welford 单遍 mean / stdDev, NaN 安全的最大最小值追踪, 可合并
//! (为 `rayon` 并行与多切片 union 服务).
//!
//! 实现位于 `roi-berry/src/stats.rs`.
//!
//! ### 标定解析 ✅
//!
//! 非标定像素, mm 间距, 超声 region 标定 (X/Y 独立物理增量) 与
//! 命名标定 (ERMF / User / Error / Proj) 的多级回退解析.
//!
//! 实现位于 `roi-berry/src/calibration`.
//!
//! ### 统计管线 ✅
//!
//! 以 `invalidated` 为唯一触发器的惰性缓存重算, 100ms 尾沿节流,
//! 越界降级与跨切片缓存清理.
//!
//! 实现位于 `roi-berry/src/pipeline`.
//!
//! ### 切片投影 ✅
//!
//! threshold 传播工具所需的主轴判定与沿视平面法向的 handle 点投影.
//!
//! 实现位于 `roi-berry/src/projector.rs`.
//!
//! ### 交互控制器 ✅
//!
//! 所有 ROI 工具共享的 draw / modify / drag / cancel 手势状态机,
//! 以 RAII token 管理 "正在交互" 标志.
//!
//! 实现位于 `roi-berry/src/controller`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维体素索引, 按 `(i, j, k)` 顺序分别对应世界 x / y / z 轴.
pub type Idx3d = (usize, usize, usize);

/// 世界空间 (物理 3D 坐标系) 中的点.
pub type Point3 = [f64; 3];

/// 世界空间中的向量.
pub type Vec3 = [f64; 3];

/// 单个显示表面的 2D canvas 坐标.
pub type Canvas2 = [f64; 2];

/// 带符号的三维体素索引. 越界判定在 `i64` 上进行.
type Idx3dI64 = (i64, i64, i64);

pub mod consts;

mod vecmath;

pub use vecmath::{
    add, cross, distance, dot, length, midpoint, normalize, scale, sub, view_right,
    world_width_height,
};

pub mod geometry;

pub use geometry::{EllipseWorld, ShapeKind};

mod stats;

pub use stats::StatsAccumulator;

pub mod calibration;

pub use calibration::{
    modality_unit, resolve_units, Calibration, CalibrationKind, Modality, PreScaling,
    ScaleResolution, UltrasoundRegion,
};

pub mod target;

pub use target::{Camera, DisplaySurface, GridVolume, PlaneSurface, VoxelTarget};

pub mod annotation;

pub use annotation::{
    Annotation, AnnotationId, AnnotationSnapshot, AnnotationStore, FrameMetadata, Handles,
    MemoryStore, StatsRecord,
};

pub mod pipeline;

pub use pipeline::{PipelineOptions, StatsPipeline, ThrottleGate};

pub mod projector;

pub use projector::{ProjectionError, ProjectionResult, SliceProjector, SliceRenderMode};

pub mod controller;

pub use controller::{
    AnnotationSketch, EditSession, PointerEvent, PropagationOptions, RoiTool, SketchMode,
    ToolEvent, ToolOptions,
};

pub mod prelude;
