//! 标注数据模型与标注存储缝合点.
//!
//! 标注由外部存储拥有; 本 crate 只就地修改 handle 点,
//! 统计缓存与 `invalidated` 标志. 每目标的统计缓存携带显式的
//! 失效 epoch, 跨切片清理后残留的陈旧条目在读取时被视为缺失.

use std::collections::BTreeMap;

use crate::calibration::Modality;
use crate::consts::EMPTY_AREA_TEXT;
use crate::geometry::ShapeKind;
use crate::{add, Point3, Vec3};

/// 标注唯一 id.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationId(pub u64);

/// 标注创建时捕获的视图元数据.
#[derive(Clone, Debug)]
pub struct FrameMetadata {
    /// 参考系 id.
    pub frame_of_reference: String,

    /// 标注锚定的 image id (2D 栈视图; 体视图为 `None`).
    pub referenced_image: Option<String>,

    /// 创建时的视平面法向.
    pub view_plane_normal: Vec3,

    /// 创建时的 up 向量.
    pub view_up: Vec3,
}

/// 标注的 handle 点集. 点个数由形状固定, 创建后不再改变.
#[derive(Clone, Debug)]
pub struct Handles {
    points: Vec<Point3>,
    active: Option<usize>,
}

impl Handles {
    /// 创建初始 handle 集: 全部槽位重合在锚点.
    pub fn new(kind: ShapeKind, anchor: Point3) -> Self {
        Self {
            points: vec![anchor; kind.handle_count()],
            active: None,
        }
    }

    /// 全部 handle 点.
    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// 激活的 handle 槽位.
    #[inline]
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// 设置激活槽位. 越界时 panic.
    #[inline]
    pub fn set_active(&mut self, active: Option<usize>) {
        if let Some(i) = active {
            assert!(i < self.points.len(), "激活槽位越界");
        }
        self.active = active;
    }

    fn overwrite(&mut self, points: &[Point3]) {
        assert_eq!(points.len(), self.points.len(), "handle 个数不可变更");
        self.points.copy_from_slice(points);
    }
}

/// 一个目标上的统计记录. 惰性创建, 整体装配后一次写入缓存.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsRecord {
    /// 目标模态.
    pub modality: Option<Modality>,

    /// 标定后的面积.
    pub area: f64,

    /// 面积单位. `None` 表示从未成功计算过 (如导入后).
    pub area_unit: Option<String>,

    /// 体素值平均.
    pub mean: f64,

    /// 体素值最大.
    pub max: f64,

    /// 体素值总体标准差.
    pub std_dev: f64,

    /// 体素值单位标签.
    pub modality_unit: String,

    /// 被访问体素的世界坐标 (开启捕获时).
    pub points_in_shape: Option<Vec<Point3>>,

    /// 世界宽高均恰为零 (刚起笔的零尺寸绘制).
    pub is_empty_area: bool,

    /// 任一包围角落在目标网格之外.
    pub is_handle_outside_image: bool,

    /// 写入时的标注统计 epoch.
    pub epoch: u64,

    /// 写入时的 handle 修订号.
    pub revision: u64,
}

impl StatsRecord {
    /// 越界降级记录: 只携带模态.
    pub fn partial(modality: Modality) -> Self {
        Self {
            modality: Some(modality),
            is_handle_outside_image: true,
            ..Self::default()
        }
    }

    /// 下游展示的统计文本行.
    ///
    /// 越界 ROI 不给出统计行; 空面积 ROI 给出字面占位文本.
    pub fn display_lines(&self) -> Vec<String> {
        if self.is_handle_outside_image {
            return Vec::new();
        }
        if self.is_empty_area {
            return vec![EMPTY_AREA_TEXT.to_owned()];
        }
        let area_unit = self.area_unit.as_deref().unwrap_or("");
        vec![
            format!("Area: {:.2} {area_unit}", self.area),
            format!(
                "Mean: {:.2} {u}  Max: {:.2} {u}  StdDev: {:.2} {u}",
                self.mean,
                self.max,
                self.std_dev,
                u = self.modality_unit
            ),
        ]
    }
}

/// 会话开始前的标注快照, 供撤销历史与 cancel 恢复使用.
#[derive(Clone, Debug)]
pub struct AnnotationSnapshot {
    /// handle 点.
    pub points: Vec<Point3>,

    /// 激活槽位.
    pub active: Option<usize>,

    /// 文本框位置.
    pub text_box: Option<Point3>,

    /// 高亮标志.
    pub highlighted: bool,
}

/// 一条 ROI 标注.
#[derive(Clone, Debug)]
pub struct Annotation {
    id: AnnotationId,
    kind: ShapeKind,
    metadata: FrameMetadata,
    handles: Handles,
    label: String,
    text_box: Option<Point3>,
    cached_stats: BTreeMap<String, StatsRecord>,
    stats_epoch: u64,
    revision: u64,

    /// 高亮标志.
    pub highlighted: bool,

    /// 统计重算的唯一触发器. 任何 handle 修改都会置位.
    /// 标注可能同时在多个目标上求值, 因此只有全部缓存记录
    /// 追平最新修订后才清零, 见 [`Self::put_stats`].
    pub invalidated: bool,

    /// 锁定标志. 锁定的标注不可进入修改会话.
    pub locked: bool,

    /// 可见标志.
    pub visible: bool,
}

impl Annotation {
    /// 在锚点创建新标注, 全部 handle 重合.
    pub fn new(id: AnnotationId, kind: ShapeKind, metadata: FrameMetadata, anchor: Point3) -> Self {
        Self {
            id,
            kind,
            metadata,
            handles: Handles::new(kind, anchor),
            label: String::new(),
            text_box: None,
            cached_stats: BTreeMap::new(),
            stats_epoch: 0,
            revision: 0,
            highlighted: false,
            invalidated: true,
            locked: false,
            visible: true,
        }
    }

    /// 标注 id.
    #[inline]
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// 形状种类.
    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// 视图元数据.
    #[inline]
    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// handle 集.
    #[inline]
    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    /// 文本标签.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 设置文本标签.
    #[inline]
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// 浮动文本框的世界位置.
    #[inline]
    pub fn text_box(&self) -> Option<Point3> {
        self.text_box
    }

    /// 自由平移文本框 (永不重投影).
    pub fn translate_text_box(&mut self, delta: Vec3) {
        let current = self.text_box.unwrap_or_else(|| self.handles.points[0]);
        self.text_box = Some(add(current, delta));
    }

    /// 覆写全部 handle 点并置位 `invalidated`.
    pub fn set_handle_points(&mut self, points: &[Point3]) {
        self.handles.overwrite(points);
        self.revision += 1;
        self.invalidated = true;
    }

    /// 设置激活 handle 槽位.
    #[inline]
    pub fn set_active_handle(&mut self, active: Option<usize>) {
        self.handles.set_active(active);
    }

    /// 刚性平移全部 handle 点 (body 拖拽).
    pub fn translate(&mut self, delta: Vec3) {
        for p in &mut self.handles.points {
            *p = add(*p, delta);
        }
        self.revision += 1;
        self.invalidated = true;
    }

    /// 当前 handle 修订号. 每次 handle 修改递增.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 当前统计 epoch.
    #[inline]
    pub fn stats_epoch(&self) -> u64 {
        self.stats_epoch
    }

    /// 读取目标的统计记录. 陈旧 epoch 的条目视为缺失.
    pub fn stats(&self, target_id: &str) -> Option<&StatsRecord> {
        self.cached_stats
            .get(target_id)
            .filter(|r| r.epoch == self.stats_epoch)
    }

    /// 写入目标的统计记录 (整体一次写入).
    ///
    /// 只有当全部现行 (epoch 一致的) 缓存记录都追平最新修订时
    /// 才清零 `invalidated`; 否则其余目标仍待重算, 标志保持置位.
    pub fn put_stats(&mut self, target_id: impl Into<String>, mut record: StatsRecord) {
        record.epoch = self.stats_epoch;
        record.revision = self.revision;
        self.cached_stats.insert(target_id.into(), record);
        self.invalidated = self
            .cached_stats
            .values()
            .filter(|r| r.epoch == self.stats_epoch)
            .any(|r| r.revision != self.revision);
    }

    /// 清除单个目标的统计缓存.
    pub fn purge_stats(&mut self, target_id: &str) {
        self.cached_stats.remove(target_id);
    }

    /// 推进统计 epoch, 使所有残留缓存条目立即陈旧.
    #[inline]
    pub fn bump_stats_epoch(&mut self) {
        self.stats_epoch += 1;
    }

    /// 当前缓存了统计记录的目标 id 集.
    pub fn cached_target_ids(&self) -> impl Iterator<Item = &str> {
        self.cached_stats.keys().map(String::as_str)
    }

    /// 生成快照 (会话开始前调用一次).
    pub fn snapshot(&self) -> AnnotationSnapshot {
        AnnotationSnapshot {
            points: self.handles.points.clone(),
            active: self.handles.active,
            text_box: self.text_box,
            highlighted: self.highlighted,
        }
    }

    /// 从快照恢复交互状态 (高亮与激活槽位; handle 点不回滚).
    pub fn restore_interaction_state(&mut self, snapshot: &AnnotationSnapshot) {
        self.highlighted = snapshot.highlighted;
        self.handles.active = snapshot.active;
    }
}

/// 标注存储缝合点. 持久化由外部负责.
pub trait AnnotationStore {
    /// 分配下一个标注 id.
    fn next_id(&mut self) -> AnnotationId;

    /// 注册标注.
    fn add(&mut self, annotation: Annotation);

    /// 读取标注.
    fn get(&self, id: AnnotationId) -> Option<&Annotation>;

    /// 可变读取标注.
    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation>;

    /// 删除标注.
    fn remove(&mut self, id: AnnotationId) -> Option<Annotation>;

    /// 按工具与参考系检索标注 id (升序).
    fn for_surface(&self, kind: ShapeKind, frame_of_reference: &str) -> Vec<AnnotationId>;

    /// 标注是否被锁定. 不存在视为锁定.
    fn is_locked(&self, id: AnnotationId) -> bool {
        self.get(id).map_or(true, |a| a.locked)
    }

    /// 标注是否可见. 不存在视为不可见.
    fn is_visible(&self, id: AnnotationId) -> bool {
        self.get(id).is_some_and(|a| a.visible)
    }
}

/// 内存标注存储的参考实现.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: BTreeMap<AnnotationId, Annotation>,
    next: u64,
}

impl MemoryStore {
    /// 创建空存储.
    pub fn new() -> Self {
        Self::default()
    }

    /// 存储中的标注个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 存储是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl AnnotationStore for MemoryStore {
    fn next_id(&mut self) -> AnnotationId {
        self.next += 1;
        AnnotationId(self.next)
    }

    fn add(&mut self, annotation: Annotation) {
        self.items.insert(annotation.id(), annotation);
    }

    #[inline]
    fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.get(&id)
    }

    #[inline]
    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.items.get_mut(&id)
    }

    #[inline]
    fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        self.items.remove(&id)
    }

    fn for_surface(&self, kind: ShapeKind, frame_of_reference: &str) -> Vec<AnnotationId> {
        self.items
            .values()
            .filter(|a| a.kind() == kind && a.metadata().frame_of_reference == frame_of_reference)
            .map(Annotation::id)
            .collect()
    }
}
