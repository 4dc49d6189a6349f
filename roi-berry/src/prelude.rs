//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Canvas2, Idx2d, Idx3d, Point3, Vec3};

pub use crate::annotation::{
    Annotation, AnnotationId, AnnotationSnapshot, AnnotationStore, FrameMetadata, MemoryStore,
    StatsRecord,
};
pub use crate::calibration::{
    modality_unit, resolve_units, Calibration, CalibrationKind, Modality, PreScaling,
    ScaleResolution, UltrasoundRegion,
};
pub use crate::controller::{
    AnnotationSketch, PointerEvent, PropagationOptions, RoiTool, SketchMode, ToolEvent,
    ToolOptions,
};
pub use crate::geometry::{EllipseWorld, ShapeKind};
pub use crate::pipeline::{PipelineOptions, StatsPipeline};
pub use crate::projector::{ProjectionError, SliceProjector, SliceRenderMode};
pub use crate::stats::StatsAccumulator;
pub use crate::target::{Camera, DisplaySurface, GridVolume, PlaneSurface, VoxelTarget};

pub use crate::consts::units;
pub use crate::consts::{DEGENERATE_DISTANCE, ISOTROPY_EPSILON, THROTTLE_WINDOW_MS};
