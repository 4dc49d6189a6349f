//! 统计管线: 每 (标注 × 目标) 的失效驱动重算.
//!
//! `invalidated` 是唯一触发器. 从未成功计算过的记录
//! (`area_unit == None`, 例如导入后或越界降级) 同步重算以保证
//! 首帧正确; 其余失效经尾沿节流合并. 记录总是整体装配后一次
//! 写入缓存, 同一 tick 内的并发读者不会看到半成品.

mod throttle;

pub use throttle::ThrottleGate;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use itertools::iproduct;
use num::ToPrimitive;

use crate::annotation::{Annotation, AnnotationId, StatsRecord};
use crate::calibration::{modality_unit, resolve_units, ScaleResolution};
use crate::consts::THROTTLE_WINDOW_MS;
use crate::geometry::{EllipseWorld, ShapeKind};
use crate::target::{DisplaySurface, VoxelTarget};
use crate::vecmath::{add, midpoint, world_width_height};
use crate::{Canvas2, Idx3d, Idx3dI64, Point3, Vec3};

/// 管线配置.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// 是否捕获被访问体素的世界坐标.
    pub capture_points: bool,

    /// 节流窗口.
    pub window: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            capture_points: false,
            window: Duration::from_millis(THROTTLE_WINDOW_MS),
        }
    }
}

/// 统计管线. 每 (标注, 目标) 维护一个节流门.
#[derive(Debug, Default)]
pub struct StatsPipeline {
    options: PipelineOptions,
    gates: HashMap<(AnnotationId, String), ThrottleGate>,
}

impl StatsPipeline {
    /// 创建管线.
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            gates: HashMap::new(),
        }
    }

    /// 渲染 tick 入口: 保证标注在该目标上的统计最新.
    ///
    /// 返回本次调用是否发生了重算.
    pub fn ensure(
        &mut self,
        annotation: &mut Annotation,
        surface: &dyn DisplaySurface,
        target: &dyn VoxelTarget,
        now: Instant,
    ) -> bool {
        if self.due(annotation, target.id(), now) {
            self.recompute(annotation, surface, target);
            return true;
        }
        false
    }

    /// 带投影点集的 [`Self::ensure`] 变体, 供 threshold 传播工具的
    /// 渲染通道使用. 门控规则相同, 重算换成
    /// [`Self::recompute_projected`].
    pub fn ensure_projected(
        &mut self,
        annotation: &mut Annotation,
        surface: &dyn DisplaySurface,
        target: &dyn VoxelTarget,
        point_sets: &[Vec<Point3>],
        now: Instant,
    ) -> bool {
        if self.due(annotation, target.id(), now) {
            self.recompute_projected(annotation, surface, target, point_sets);
            return true;
        }
        false
    }

    /// 是否应当在本 tick 重算.
    ///
    /// 从未成功计算过的记录无条件同步重算 (渲染阻塞, 保证首帧正确);
    /// 已失效的记录经节流门放行. 失效按目标结算: 已追平最新修订的
    /// 目标不再重算, 其余目标各自过门.
    fn due(&mut self, annotation: &Annotation, target_id: &str, now: Instant) -> bool {
        let record = annotation.stats(target_id);
        if record.map_or(true, |r| r.area_unit.is_none()) {
            return true;
        }
        if !annotation.invalidated {
            return false;
        }
        if record.is_some_and(|r| r.revision == annotation.revision()) {
            return false;
        }

        let window = self.options.window;
        let gate = self
            .gates
            .entry((annotation.id(), target_id.to_owned()))
            .or_insert_with(|| ThrottleGate::new(window));
        gate.notify(now);
        gate.poll(now)
    }

    /// 立刻重算并整体写入缓存, 解除该目标的节流门.
    pub fn recompute(
        &mut self,
        annotation: &mut Annotation,
        surface: &dyn DisplaySurface,
        target: &dyn VoxelTarget,
    ) {
        let record = self.build_record(
            annotation.kind(),
            annotation.handles().points(),
            &[[0.0; 3]],
            surface,
            target,
        );
        annotation.put_stats(target.id(), record);
        self.gates.remove(&(annotation.id(), target.id().to_owned()));
    }

    /// threshold 传播: 对每个投影点集运行一次重算, 结果累入
    /// **同一条** 记录 —— 体积统计是所有切片被访问体素的 union,
    /// 而非每切片统计的平均.
    ///
    /// `point_sets` 来自 [`crate::projector::SliceProjector::project`],
    /// 第 0 个条目与标注 handle 点一致.
    pub fn recompute_projected(
        &mut self,
        annotation: &mut Annotation,
        surface: &dyn DisplaySurface,
        target: &dyn VoxelTarget,
        point_sets: &[Vec<Point3>],
    ) {
        assert!(!point_sets.is_empty(), "至少需要一个投影点集");
        // 位移相对标注自身的 handle 点计算: canvas 包围角总是落在
        // 当前视平面上, 只有这样平移才能落到正确的切片.
        let reference = annotation.handles().points()[0];
        let offsets: Vec<Vec3> = point_sets
            .iter()
            .map(|set| {
                debug_assert_eq!(set.len(), annotation.handles().points().len());
                crate::vecmath::sub(set[0], reference)
            })
            .collect();

        let record = self.build_record(
            annotation.kind(),
            annotation.handles().points(),
            &offsets,
            surface,
            target,
        );
        annotation.put_stats(target.id(), record);
        self.gates.remove(&(annotation.id(), target.id().to_owned()));
    }

    /// 体目标重算后的跨切片清理: 删除 (而非重算) 当前展示切片与
    /// 标注锚定 image 不一致的 2D 目标缓存, 使其重新展示时以
    /// 新鲜统计重建, 而不是显示陈旧的跨切片数据.
    pub fn purge_cross_slice(annotation: &mut Annotation, targets: &[&dyn VoxelTarget]) {
        let referenced = annotation.metadata().referenced_image.clone();
        let stale: Vec<String> = targets
            .iter()
            .filter(|t| !t.is_volume())
            .filter(|t| {
                t.displayed_image()
                    .map_or(false, |shown| referenced.as_deref() != Some(shown))
            })
            .map(|t| t.id().to_owned())
            .collect();
        for id in &stale {
            annotation.purge_stats(id);
        }
    }

    /// §4.4 步骤 3–5: 包围盒体素访问, 标定解析与记录装配.
    ///
    /// `offsets` 是每切片相对第 0 切片的世界位移 (单切片传 `[[0;3]]`);
    /// 完全越界的切片被跳过, 全部越界时降级为只携带模态的部分记录.
    fn build_record(
        &self,
        kind: ShapeKind,
        points: &[Point3],
        offsets: &[Vec3],
        surface: &dyn DisplaySurface,
        target: &dyn VoxelTarget,
    ) -> StatsRecord {
        let camera = surface.camera();
        let (c0, c1) = canvas_bounds(kind, points, surface);
        let w0 = surface.canvas_to_world(c0);
        let w1 = surface.canvas_to_world(c1);
        let (ww, wh) = world_width_height(w0, w1, camera.view_up, camera.view_plane_normal);
        let is_empty = ww == 0.0 && wh == 0.0;

        let modality = target.modality().clone();
        let mut acc = crate::StatsAccumulator::new(self.options.capture_points);
        let mut resolution: Option<ScaleResolution> = None;

        for offset in offsets {
            let s0 = add(w0, *offset);
            let s1 = add(w1, *offset);
            let Some((lo, hi)) = index_box(target, s0, s1) else {
                continue;
            };
            if resolution.is_none() {
                resolution = Some(resolve_units(
                    target.calibration(),
                    target.has_mm_spacing(),
                    (lo.0 as i64, lo.1 as i64),
                    (hi.0 as i64, hi.1 as i64),
                ));
            }

            let predicate = kind.has_membership_predicate().then(|| {
                EllipseWorld::new(
                    add(midpoint(w0, w1), *offset),
                    ww / 2.0,
                    wh / 2.0,
                    camera.view_right(),
                    camera.view_up,
                )
            });
            accumulate_box(target, lo, hi, predicate.as_ref(), &mut acc);
        }

        let Some(resolution) = resolution else {
            // 两个包围角 (所有切片) 均未落入网格.
            return StatsRecord::partial(modality);
        };

        let area = kind.area(ww, wh) / (resolution.scale * resolution.scale);
        StatsRecord {
            modality_unit: modality_unit(&modality, target.pre_scaling()),
            modality: Some(modality),
            area,
            area_unit: Some(resolution.area_unit),
            mean: acc.mean(),
            max: acc.max(),
            std_dev: acc.std_dev(),
            points_in_shape: acc.take_points(),
            is_empty_area: is_empty,
            is_handle_outside_image: false,
            epoch: 0,
            revision: 0,
        }
    }
}

/// 形状在 canvas 空间的两个包围角.
fn canvas_bounds(kind: ShapeKind, points: &[Point3], surface: &dyn DisplaySurface) -> (Canvas2, Canvas2) {
    let canvas: Vec<Canvas2> = points.iter().map(|p| surface.world_to_canvas(*p)).collect();
    match kind {
        ShapeKind::Probe => (canvas[0], canvas[0]),
        ShapeKind::Circle => {
            let [cx, cy] = canvas[0];
            let r = ((canvas[1][0] - cx).powi(2) + (canvas[1][1] - cy).powi(2)).sqrt();
            ([cx - r, cy - r], [cx + r, cy + r])
        }
        ShapeKind::Ellipse | ShapeKind::Rectangle => {
            let mut lo = [f64::INFINITY; 2];
            let mut hi = [f64::NEG_INFINITY; 2];
            for c in &canvas {
                for axis in 0..2 {
                    lo[axis] = lo[axis].min(c[axis]);
                    hi[axis] = hi[axis].max(c[axis]);
                }
            }
            (lo, hi)
        }
    }
}

/// 把两个世界包围角映射为网格内的整数盒.
///
/// 每轴独立向下取整 (朝低索引角截断). 任一角不在网格内时返回
/// `None` (越界降级, 不抛出).
fn index_box(target: &dyn VoxelTarget, a: Point3, b: Point3) -> Option<(Idx3d, Idx3d)> {
    let ia = floor3(target.world_to_index(a))?;
    let ib = floor3(target.world_to_index(b))?;

    let (nx, ny, nz) = target.dimensions();
    let dims = [nx as i64, ny as i64, nz as i64];
    let inside =
        |(x, y, z): Idx3dI64| [x, y, z].iter().zip(dims).all(|(p, d)| (0..d).contains(p));
    if !inside(ia) || !inside(ib) {
        return None;
    }

    let lo = (
        ia.0.min(ib.0) as usize,
        ia.1.min(ib.1) as usize,
        ia.2.min(ib.2) as usize,
    );
    let hi = (
        ia.0.max(ib.0) as usize,
        ia.1.max(ib.1) as usize,
        ia.2.max(ib.2) as usize,
    );
    Some((lo, hi))
}

/// 分数索引逐轴取整. 非有限分量 (病态变换) 视为越界.
#[inline]
fn floor3(frac: Vec3) -> Option<Idx3dI64> {
    Some((
        frac[0].floor().to_i64()?,
        frac[1].floor().to_i64()?,
        frac[2].floor().to_i64()?,
    ))
}

/// 同步遍历整数盒, 经成员谓词 (若有) 过滤后累加体素统计.
///
/// 该循环阻塞且不可中途取消; 需要有界延迟的调用方应自行限制
/// ROI 尺寸或移交 worker.
fn accumulate_box(
    target: &dyn VoxelTarget,
    lo: Idx3d,
    hi: Idx3d,
    predicate: Option<&EllipseWorld>,
    acc: &mut crate::StatsAccumulator,
) {
    for (k, j, i) in iproduct!(lo.2..=hi.2, lo.1..=hi.1, lo.0..=hi.0) {
        let p = target.index_to_world((i, j, k));
        if predicate.map_or(true, |e| e.contains(p)) {
            acc.push(target.value_at((i, j, k)) as f64, p);
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 按 k 切片并行累加整数盒内的体素统计,
        /// 以累加器合并归约. 语义与顺序版本一致.
        ///
        /// 注意并行只发生在单次重算的内层循环;
        /// 每标注的重算仍然是串行的 (见并发模型).
        pub fn par_accumulate_box<T>(
            target: &T,
            lo: Idx3d,
            hi: Idx3d,
            predicate: Option<&EllipseWorld>,
            capture_points: bool,
        ) -> crate::StatsAccumulator
        where
            T: VoxelTarget + Sync,
        {
            (lo.2..=hi.2)
                .into_par_iter()
                .map(|k| {
                    let mut acc = crate::StatsAccumulator::new(capture_points);
                    for (j, i) in iproduct!(lo.1..=hi.1, lo.0..=hi.0) {
                        let p = target.index_to_world((i, j, k));
                        if predicate.map_or(true, |e| e.contains(p)) {
                            acc.push(target.value_at((i, j, k)) as f64, p);
                        }
                    }
                    acc
                })
                .reduce(
                    || crate::StatsAccumulator::new(capture_points),
                    |mut a, b| {
                        a.merge(b);
                        a
                    },
                )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationId, FrameMetadata};
    use crate::calibration::Modality;
    use crate::target::{Camera, GridVolume, PlaneSurface};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn axial_surface(focal: Point3) -> PlaneSurface {
        PlaneSurface::new(
            "vp",
            "frame",
            Camera {
                view_plane_normal: [0.0, 0.0, 1.0],
                view_up: [0.0, 1.0, 0.0],
                focal_point: focal,
            },
        )
    }

    fn meta() -> FrameMetadata {
        FrameMetadata {
            frame_of_reference: "frame".to_owned(),
            referenced_image: Some("image-0".to_owned()),
            view_plane_normal: [0.0, 0.0, 1.0],
            view_up: [0.0, 1.0, 0.0],
        }
    }

    fn circle(id: u64, center: Point3, edge: Point3) -> Annotation {
        let mut a = Annotation::new(AnnotationId(id), ShapeKind::Circle, meta(), center);
        a.set_handle_points(&[center, edge]);
        a
    }

    /// 完全落在同质区域内的 ROI: mean == v 且 stdDev == 0.
    #[test]
    fn test_homogeneous_roi() {
        let vol = GridVolume::new("t", (32, 32, 1), [0.0; 3], [1.0; 3], 7.0)
            .with_modality(Modality::Ct);
        let surface = axial_surface([16.0, 16.0, 0.0]);
        let mut a = circle(1, [16.0, 16.0, 0.0], [20.0, 16.0, 0.0]);

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute(&mut a, &surface, &vol);

        let r = a.stats("t").unwrap();
        assert!(f64_eq(r.mean, 7.0));
        assert!(f64_eq(r.std_dev, 0.0));
        assert!(f64_eq(r.max, 7.0));
        assert_eq!(r.modality_unit, "HU");
        assert!(!a.invalidated);
    }

    /// 场景: 64×64 图像, 第 10–14 列为 255, 其余为 0, 未标定;
    /// 圆心索引 (12, 30), 边缘 (14, 32) → mean == 255 且不越界.
    #[test]
    fn test_bright_strip_circle() {
        let mut vol = GridVolume::new("t", (64, 64, 1), [0.0; 3], [1.0; 3], 0.0);
        for j in 0..64 {
            for i in 10..=14 {
                vol.set((i, j, 0), 255.0);
            }
        }
        let surface = axial_surface([32.0, 32.0, 0.0]);
        let mut a = circle(1, [12.0, 30.0, 0.0], [14.0, 32.0, 0.0]);

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute(&mut a, &surface, &vol);

        let r = a.stats("t").unwrap();
        assert!(!r.is_handle_outside_image);
        assert!(f64_eq(r.mean, 255.0));
        assert!(f64_eq(r.std_dev, 0.0));
        // 完成的在界重算后 area_unit 绝不为 None.
        assert!(r.area_unit.is_some());
        assert_eq!(r.area_unit.as_deref(), Some("px²"));
    }

    /// 矩形在 mm 网格上的面积.
    #[test]
    fn test_rectangle_area_mm() {
        let vol = GridVolume::new("t", (32, 32, 1), [0.0; 3], [1.0; 3], 1.0)
            .with_mm_spacing();
        let surface = axial_surface([16.0, 16.0, 0.0]);
        let mut a = Annotation::new(AnnotationId(1), ShapeKind::Rectangle, meta(), [4.0, 4.0, 0.0]);
        a.set_handle_points(&[
            [4.0, 4.0, 0.0],
            [8.0, 4.0, 0.0],
            [4.0, 7.0, 0.0],
            [8.0, 7.0, 0.0],
        ]);

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute(&mut a, &surface, &vol);

        let r = a.stats("t").unwrap();
        assert!(f64_eq(r.area, 12.0));
        assert_eq!(r.area_unit.as_deref(), Some("mm²"));
        assert!(!r.is_empty_area);
    }

    /// 越界 ROI: 只携带模态的部分记录, 不给出统计文本行.
    #[test]
    fn test_out_of_bounds_partial_record() {
        let vol = GridVolume::new("t", (16, 16, 1), [0.0; 3], [1.0; 3], 0.0)
            .with_modality(Modality::Ct);
        let surface = axial_surface([8.0, 8.0, 0.0]);
        let mut a = circle(1, [14.0, 8.0, 0.0], [20.0, 8.0, 0.0]);

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute(&mut a, &surface, &vol);

        let r = a.stats("t").unwrap();
        assert!(r.is_handle_outside_image);
        assert_eq!(r.modality, Some(Modality::Ct));
        assert!(r.area_unit.is_none());
        assert!(r.display_lines().is_empty());
    }

    /// 刚起笔的零尺寸绘制: is_empty_area, 占位文本.
    #[test]
    fn test_zero_size_is_empty_area() {
        let vol = GridVolume::new("t", (16, 16, 1), [0.0; 3], [1.0; 3], 5.0);
        let surface = axial_surface([8.0, 8.0, 0.0]);
        let mut a = Annotation::new(AnnotationId(1), ShapeKind::Ellipse, meta(), [8.0, 8.0, 0.0]);

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute(&mut a, &surface, &vol);

        let r = a.stats("t").unwrap();
        assert!(r.is_empty_area);
        assert_eq!(r.display_lines(), vec!["Oblique not supported".to_owned()]);
    }

    /// ensure: 缺失记录同步重算; 失效经尾沿节流合并.
    #[test]
    fn test_ensure_sync_then_throttled() {
        let vol = GridVolume::new("t", (32, 32, 1), [0.0; 3], [1.0; 3], 3.0);
        let surface = axial_surface([16.0, 16.0, 0.0]);
        let mut a = circle(1, [16.0, 16.0, 0.0], [18.0, 16.0, 0.0]);
        let mut pipeline = StatsPipeline::default();
        let t0 = Instant::now();

        // 首帧: 同步.
        assert!(pipeline.ensure(&mut a, &surface, &vol, t0));
        assert!(!pipeline.ensure(&mut a, &surface, &vol, t0));

        // 拖拽失效: 窗口内不重算.
        a.set_handle_points(&[[16.0, 16.0, 0.0], [20.0, 16.0, 0.0]]);
        let t1 = t0 + Duration::from_millis(10);
        assert!(!pipeline.ensure(&mut a, &surface, &vol, t1));
        assert!(a.invalidated);

        // 窗口后的 tick 放行一次.
        let t2 = t1 + Duration::from_millis(100);
        assert!(pipeline.ensure(&mut a, &surface, &vol, t2));
        assert!(!a.invalidated);
        assert!(!pipeline.ensure(&mut a, &surface, &vol, t2));
    }

    /// 拖拽失效后同一标注的每个目标各自重算:
    /// 第一个目标追平修订不会吞掉其余目标的失效.
    #[test]
    fn test_each_target_recomputes_after_drag() {
        let va = GridVolume::new("a", (32, 32, 1), [0.0; 3], [1.0; 3], 1.0);
        let vb = GridVolume::new("b", (32, 32, 1), [0.0; 3], [1.0; 3], 2.0);
        let surface = axial_surface([16.0, 16.0, 0.0]);
        let mut a = circle(1, [16.0, 16.0, 0.0], [18.0, 16.0, 0.0]);
        let mut pipeline = StatsPipeline::default();
        let t0 = Instant::now();

        // 首帧: 两个目标各同步一次.
        assert!(pipeline.ensure(&mut a, &surface, &va, t0));
        assert!(pipeline.ensure(&mut a, &surface, &vb, t0));
        assert!(f64_eq(a.stats("b").unwrap().area, 4.0 * std::f64::consts::PI));

        // 拖拽: 半径 2 → 6, 窗口内两个目标都不重算.
        a.set_handle_points(&[[16.0, 16.0, 0.0], [22.0, 16.0, 0.0]]);
        let t1 = t0 + Duration::from_millis(10);
        assert!(!pipeline.ensure(&mut a, &surface, &va, t1));
        assert!(!pipeline.ensure(&mut a, &surface, &vb, t1));

        // 窗口后的 tick: 两个目标各放行一次, 之后全部追平.
        let t2 = t1 + Duration::from_millis(100);
        assert!(pipeline.ensure(&mut a, &surface, &va, t2));
        assert!(a.invalidated, "目标 b 仍待重算");
        assert!(pipeline.ensure(&mut a, &surface, &vb, t2));
        assert!(!a.invalidated);
        assert!(!pipeline.ensure(&mut a, &surface, &va, t2));
        assert!(!pipeline.ensure(&mut a, &surface, &vb, t2));

        let rb = a.stats("b").unwrap();
        assert!(f64_eq(rb.area, 36.0 * std::f64::consts::PI));
        assert!(f64_eq(rb.mean, 2.0));
    }

    /// 跨切片清理: 展示其他切片的 2D 目标缓存被删除,
    /// 锚定切片与体目标的缓存保留.
    #[test]
    fn test_purge_cross_slice() {
        let volume = GridVolume::new("vol", (8, 8, 8), [0.0; 3], [1.0; 3], 0.0);
        let same = GridVolume::new("stack-same", (8, 8, 1), [0.0; 3], [1.0; 3], 0.0)
            .as_slice_target("image-0");
        let other = GridVolume::new("stack-other", (8, 8, 1), [0.0; 3], [1.0; 3], 0.0)
            .as_slice_target("image-3");

        let mut a = circle(1, [4.0, 4.0, 0.0], [5.0, 4.0, 0.0]);
        a.put_stats("vol", StatsRecord::default());
        a.put_stats("stack-same", StatsRecord::default());
        a.put_stats("stack-other", StatsRecord::default());

        StatsPipeline::purge_cross_slice(&mut a, &[&volume, &same, &other]);

        assert!(a.stats("vol").is_some());
        assert!(a.stats("stack-same").is_some());
        assert!(a.stats("stack-other").is_none());
    }

    /// 多切片 union: 三个切片上的同一圆, 统计覆盖全部被访问体素.
    #[test]
    fn test_projected_union_stats() {
        let mut vol = GridVolume::new("vol", (16, 16, 4), [0.0; 3], [1.0; 3], 0.0);
        // 第 0 层全 10, 第 1 层全 20, 第 2 层全 30.
        for k in 0..3 {
            for j in 0..16 {
                for i in 0..16 {
                    vol.set((i, j, k), (k as f32 + 1.0) * 10.0);
                }
            }
        }
        let surface = axial_surface([8.0, 8.0, 0.0]);
        let mut a = Annotation::new(AnnotationId(1), ShapeKind::Rectangle, meta(), [4.0, 4.0, 0.0]);
        a.set_handle_points(&[
            [4.0, 4.0, 0.0],
            [6.0, 4.0, 0.0],
            [4.0, 6.0, 0.0],
            [6.0, 6.0, 0.0],
        ]);

        let base: Vec<Point3> = a.handles().points().to_vec();
        let sets: Vec<Vec<Point3>> = (0..3)
            .map(|k| base.iter().map(|p| [p[0], p[1], p[2] + k as f64]).collect())
            .collect();

        let mut pipeline = StatsPipeline::default();
        pipeline.recompute_projected(&mut a, &surface, &vol, &sets);

        let r = a.stats("vol").unwrap();
        // 三层均匀值 10/20/30 的 union 平均为 20.
        assert!(f64_eq(r.mean, 20.0));
        assert!(f64_eq(r.max, 30.0));
        assert!(r.area_unit.is_some());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_accumulate_matches_sequential() {
        let mut vol = GridVolume::new("t", (8, 8, 4), [0.0; 3], [1.0; 3], 0.0);
        for k in 0..4 {
            for j in 0..8 {
                for i in 0..8 {
                    vol.set((i, j, k), (i + 2 * j + 3 * k) as f32);
                }
            }
        }
        let lo = (1, 1, 0);
        let hi = (6, 6, 3);

        let mut seq = crate::StatsAccumulator::new(false);
        accumulate_box(&vol, lo, hi, None, &mut seq);
        let par = par_accumulate_box(&vol, lo, hi, None, false);

        assert_eq!(seq.count(), par.count());
        assert!(f64_eq(seq.mean(), par.mean()));
        assert!(f64_eq(seq.std_dev(), par.std_dev()));
    }
}
