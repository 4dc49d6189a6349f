//! 外部协作者的缝合点: 显示表面与体素目标.
//!
//! 渲染器与数据加载均在本 crate 之外; 这里只声明核心所需的最小
//! trait 面, 并附带两个具体实现 ([`GridVolume`] 与 [`PlaneSurface`])
//! 供测试与嵌入方直接使用.

use std::cell::Cell;

use ndarray::{Array3, ArrayView3, ArrayViewMut3};

use crate::calibration::{Calibration, Modality, PreScaling};
use crate::{add, dot, scale, sub, vecmath, Canvas2, Idx3d, Point3, Vec3};

/// 相机参数.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    /// 视平面法向.
    pub view_plane_normal: Vec3,

    /// 视图 up 向量.
    pub view_up: Vec3,

    /// 焦点 (世界坐标).
    pub focal_point: Point3,
}

impl Camera {
    /// 视图右向量: `cross(viewUp, viewPlaneNormal)` 取反后单位化.
    ///
    /// up 与法向共线 (病态相机) 时返回零向量.
    #[inline]
    pub fn view_right(&self) -> Vec3 {
        vecmath::view_right(self.view_up, self.view_plane_normal).unwrap_or([0.0; 3])
    }
}

/// 一个可显示表面 (viewport). 暴露 world ↔ canvas 变换与相机.
pub trait DisplaySurface {
    /// 表面 id.
    fn id(&self) -> &str;

    /// 该表面展示数据所在的参考系 id.
    fn frame_of_reference(&self) -> &str;

    /// 2D 表面当前展示的 image id. 体视图返回 `None`.
    fn displayed_image(&self) -> Option<&str>;

    /// 当前相机.
    fn camera(&self) -> Camera;

    /// 世界坐标 → canvas 坐标.
    fn world_to_canvas(&self, p: Point3) -> Canvas2;

    /// canvas 坐标 → 世界坐标 (落在当前视平面上).
    fn canvas_to_world(&self, p: Canvas2) -> Point3;

    /// 表面是否仍然存活. 交互拆除竞态中可能在一帧内变为 `false`.
    fn is_alive(&self) -> bool {
        true
    }
}

/// 一个统计评估目标 (单张图像或体数据).
pub trait VoxelTarget {
    /// 目标 id, 作为统计缓存的键.
    fn id(&self) -> &str;

    /// 体素网格尺寸 `(nx, ny, nz)`.
    fn dimensions(&self) -> Idx3d;

    /// 体素间距 (通常为 mm), 按 x / y / z.
    fn spacing(&self) -> [f64; 3];

    /// 世界坐标 → 分数体素索引.
    fn world_to_index(&self, p: Point3) -> Vec3;

    /// 体素索引 → 世界坐标 (体素中心).
    fn index_to_world(&self, ijk: Idx3d) -> Point3;

    /// 读取体素值. 越界时 panic.
    fn value_at(&self, ijk: Idx3d) -> f32;

    /// 标定元数据.
    fn calibration(&self) -> &Calibration;

    /// 是否带一般 mm 间距 (标定解析第 3 级用).
    fn has_mm_spacing(&self) -> bool;

    /// 采集模态.
    fn modality(&self) -> &Modality;

    /// 强度预缩放信息.
    fn pre_scaling(&self) -> &PreScaling;

    /// 是否为体目标 (而非单切片 2D 目标).
    fn is_volume(&self) -> bool;

    /// 2D 目标当前展示的 image id.
    fn displayed_image(&self) -> Option<&str>;
}

/// 轴对齐的内存体素网格.
///
/// 数据按照 z-major (`(nz, ny, nx)`) 存储, 对外索引统一为
/// `(i, j, k)` 即 `(x, y, z)`.
#[derive(Clone, Debug)]
pub struct GridVolume {
    id: String,
    origin: Point3,
    spacing: [f64; 3],
    data: Array3<f32>,
    calibration: Calibration,
    modality: Modality,
    pre_scaling: PreScaling,
    mm_spacing: bool,
    volume: bool,
    displayed_image: Option<String>,
}

impl GridVolume {
    /// 创建以 `fill` 填充的网格.
    ///
    /// `shape` 为 `(nx, ny, nz)`; 体素个数为 0 时 panic.
    pub fn new(id: impl Into<String>, shape: Idx3d, origin: Point3, spacing: [f64; 3], fill: f32) -> Self {
        let (nx, ny, nz) = shape;
        assert!(nx * ny * nz > 0, "体素网格不能为空");
        assert!(spacing.iter().all(|s| *s > 0.0), "体素间距必须为正");
        Self {
            id: id.into(),
            origin,
            spacing,
            data: Array3::from_elem((nz, ny, nx), fill),
            calibration: Calibration::uncalibrated(),
            modality: Modality::Other(String::new()),
            pre_scaling: PreScaling::default(),
            mm_spacing: false,
            volume: nz > 1,
            displayed_image: None,
        }
    }

    /// 设置标定元数据.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// 设置模态.
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    /// 设置预缩放信息.
    pub fn with_pre_scaling(mut self, pre: PreScaling) -> Self {
        self.pre_scaling = pre;
        self
    }

    /// 标记带一般 mm 间距.
    pub fn with_mm_spacing(mut self) -> Self {
        self.mm_spacing = true;
        self
    }

    /// 声明为展示 `image` 的单切片 2D 目标.
    pub fn as_slice_target(mut self, image: impl Into<String>) -> Self {
        self.volume = false;
        self.displayed_image = Some(image.into());
        self
    }

    /// 写入体素值. 越界时 panic.
    #[inline]
    pub fn set(&mut self, (i, j, k): Idx3d, value: f32) {
        self.data[(k, j, i)] = value;
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }
}

impl VoxelTarget for GridVolume {
    #[inline]
    fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    fn dimensions(&self) -> Idx3d {
        let shape = self.data.shape();
        (shape[2], shape[1], shape[0])
    }

    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    fn world_to_index(&self, p: Point3) -> Vec3 {
        let d = sub(p, self.origin);
        [
            d[0] / self.spacing[0],
            d[1] / self.spacing[1],
            d[2] / self.spacing[2],
        ]
    }

    fn index_to_world(&self, (i, j, k): Idx3d) -> Point3 {
        [
            self.origin[0] + i as f64 * self.spacing[0],
            self.origin[1] + j as f64 * self.spacing[1],
            self.origin[2] + k as f64 * self.spacing[2],
        ]
    }

    #[inline]
    fn value_at(&self, (i, j, k): Idx3d) -> f32 {
        self.data[(k, j, i)]
    }

    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[inline]
    fn has_mm_spacing(&self) -> bool {
        self.mm_spacing
    }

    #[inline]
    fn modality(&self) -> &Modality {
        &self.modality
    }

    #[inline]
    fn pre_scaling(&self) -> &PreScaling {
        &self.pre_scaling
    }

    #[inline]
    fn is_volume(&self) -> bool {
        self.volume
    }

    #[inline]
    fn displayed_image(&self) -> Option<&str> {
        self.displayed_image.as_deref()
    }
}

/// 正交投影的平面显示表面.
///
/// canvas x 沿视图右向量, canvas y 沿 up 取反 (屏幕 y 向下惯例),
/// 原点位于相机焦点.
#[derive(Clone, Debug)]
pub struct PlaneSurface {
    id: String,
    frame_of_reference: String,
    camera: Camera,
    displayed_image: Option<String>,
    alive: Cell<bool>,
}

impl PlaneSurface {
    /// 创建表面.
    pub fn new(id: impl Into<String>, frame_of_reference: impl Into<String>, camera: Camera) -> Self {
        Self {
            id: id.into(),
            frame_of_reference: frame_of_reference.into(),
            camera,
            displayed_image: None,
            alive: Cell::new(true),
        }
    }

    /// 声明当前展示的 image id.
    pub fn showing(mut self, image: impl Into<String>) -> Self {
        self.displayed_image = Some(image.into());
        self
    }

    /// 模拟表面被拆除. 之后 `is_alive` 返回 `false`.
    #[inline]
    pub fn destroy(&self) {
        self.alive.set(false);
    }

    /// 移动相机焦点 (切换切片).
    #[inline]
    pub fn set_focal_point(&mut self, focal: Point3) {
        self.camera.focal_point = focal;
    }
}

impl DisplaySurface for PlaneSurface {
    #[inline]
    fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    fn frame_of_reference(&self) -> &str {
        &self.frame_of_reference
    }

    #[inline]
    fn displayed_image(&self) -> Option<&str> {
        self.displayed_image.as_deref()
    }

    #[inline]
    fn camera(&self) -> Camera {
        self.camera
    }

    fn world_to_canvas(&self, p: Point3) -> Canvas2 {
        let d = sub(p, self.camera.focal_point);
        [dot(d, self.camera.view_right()), -dot(d, self.camera.view_up)]
    }

    fn canvas_to_world(&self, [x, y]: Canvas2) -> Point3 {
        let right = scale(self.camera.view_right(), x);
        let up = scale(self.camera.view_up, -y);
        add(add(self.camera.focal_point, right), up)
    }

    #[inline]
    fn is_alive(&self) -> bool {
        self.alive.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axial_camera(focal: Point3) -> Camera {
        Camera {
            view_plane_normal: [0.0, 0.0, 1.0],
            view_up: [0.0, 1.0, 0.0],
            focal_point: focal,
        }
    }

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_camera_view_right() {
        let cam = axial_camera([0.0; 3]);
        // -cross(+y, +z) = -(+x) ... cross([0,1,0],[0,0,1]) = [1,0,0], 取反 = [-1,0,0].
        assert_eq!(cam.view_right(), [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_grid_index_world_roundtrip() {
        let vol = GridVolume::new("v", (8, 8, 4), [1.0, 2.0, 3.0], [0.5, 0.5, 2.0], 0.0);
        let p = vol.index_to_world((3, 5, 2));
        assert_eq!(p, [2.5, 4.5, 7.0]);
        let frac = vol.world_to_index(p);
        assert!(f64_eq(frac[0], 3.0) && f64_eq(frac[1], 5.0) && f64_eq(frac[2], 2.0));
    }

    #[test]
    fn test_grid_set_get() {
        let mut vol = GridVolume::new("v", (4, 4, 2), [0.0; 3], [1.0; 3], 0.0);
        vol.set((1, 2, 1), 7.5);
        assert_eq!(vol.value_at((1, 2, 1)), 7.5);
        assert_eq!(vol.value_at((2, 1, 1)), 0.0);
        assert_eq!(vol.dimensions(), (4, 4, 2));
        assert!(vol.is_volume());
    }

    #[test]
    fn test_slice_target_flags() {
        let vol = GridVolume::new("s", (4, 4, 1), [0.0; 3], [1.0; 3], 0.0)
            .as_slice_target("image-7");
        assert!(!vol.is_volume());
        assert_eq!(vol.displayed_image(), Some("image-7"));
    }

    #[test]
    fn test_plane_surface_roundtrip() {
        let surface = PlaneSurface::new("vp", "frame", axial_camera([10.0, 20.0, 5.0]));
        for p in [[10.0, 20.0, 5.0], [13.0, 18.0, 5.0], [7.5, 26.0, 5.0]] {
            let c = surface.world_to_canvas(p);
            let back = surface.canvas_to_world(c);
            for axis in 0..3 {
                assert!(f64_eq(back[axis], p[axis]));
            }
        }
    }

    #[test]
    fn test_plane_surface_destroy() {
        let surface = PlaneSurface::new("vp", "frame", axial_camera([0.0; 3]));
        assert!(surface.is_alive());
        surface.destroy();
        assert!(!surface.is_alive());
    }
}
