//! 所有 ROI 工具共享的 draw / modify / cancel 手势状态机.
//!
//! 状态机: Idle → Drawing → Idle, Idle → Modifying → Idle;
//! cancel 是瞬态路径, 从任一会话态直接回到 Idle, 不单独成态.
//! 每个工具实例同一时刻至多一个会话, "正在交互" 标志由 RAII
//! 令牌管理, 包括 cancel 在内的所有退出路径都自动归还.
//!
//! 指针回调只改写标注的 handle 点并置位 `invalidated`;
//! 统计重算一律推迟到渲染通道 (见 [`crate::pipeline`]).

use std::cell::Cell;
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use crate::annotation::{
    Annotation, AnnotationId, AnnotationSnapshot, AnnotationStore, FrameMetadata,
};
use crate::geometry::{recompute_on_drag, ShapeKind};
use crate::pipeline::{PipelineOptions, StatsPipeline};
use crate::projector::{ProjectionResult, SliceProjector, SliceRenderMode};
use crate::target::{DisplaySurface, VoxelTarget};
use crate::{Canvas2, Point3, Vec3};

/// 一次指针回调携带的坐标信息. canvas 与世界坐标均由宿主换算好.
#[derive(Copy, Clone, Debug)]
pub struct PointerEvent {
    /// 指针的 canvas 坐标.
    pub canvas: Canvas2,

    /// 指针的世界坐标.
    pub world: Point3,

    /// 相对上一事件的 canvas 位移.
    pub canvas_delta: Canvas2,

    /// 相对上一事件的世界位移.
    pub world_delta: Vec3,
}

impl PointerEvent {
    /// 以绝对位置构造零位移事件 (pointer-down).
    pub fn at(canvas: Canvas2, world: Point3) -> Self {
        Self {
            canvas,
            world,
            canvas_delta: [0.0; 2],
            world_delta: [0.0; 3],
        }
    }
}

/// 工具对外发出的终结信号, 由调用方在帧末取走.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ToolEvent {
    /// 新标注完成. 成功收笔发一次; 新标注被 cancel 也发一次,
    /// 调用方总能看到终结信号.
    Completed(AnnotationId),

    /// 已有标注被修改 (收笔时会话内发生过移动).
    Modified(AnnotationId),

    /// 标注被删除 (越界拒绝).
    Removed(AnnotationId),
}

/// threshold 传播配置.
#[derive(Copy, Clone, Debug)]
pub struct PropagationOptions {
    /// 配置的切片数 N: 向后 ⌈N/2⌉ 片, 向前 ⌊N/2⌋ 片.
    pub slice_count: usize,

    /// 每切片各跑一遍统计并累入同一条记录 (体素 union 语义).
    pub per_slice_stats: bool,
}

/// 工具配置.
#[derive(Clone, Debug, Default)]
pub struct ToolOptions {
    /// 收笔时任一 handle 落在任一目标网格之外则删除标注.
    pub reject_outside_image: bool,

    /// 统计时捕获被访问体素的世界坐标.
    pub capture_points: bool,

    /// threshold 传播配置. `None` 为普通单切片工具.
    pub propagation: Option<PropagationOptions>,
}

/// "某个工具正在交互" 的作用域令牌.
///
/// 会话开始时获取, 随会话存活; Drop 时自动归还,
/// 任何退出路径 (包括 cancel) 都不需要手工清理.
#[derive(Debug)]
pub struct InteractionToken {
    flag: Rc<Cell<bool>>,
}

impl InteractionToken {
    fn acquire(flag: &Rc<Cell<bool>>) -> Self {
        assert!(!flag.get(), "同一工具不能同时打开两个会话");
        flag.set(true);
        Self {
            flag: Rc::clone(flag),
        }
    }
}

impl Drop for InteractionToken {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// 一次手势的短命会话. 手势开始时创建, 每次移动更新, 手势结束销毁.
#[derive(Debug)]
pub struct EditSession {
    /// 会话操作的标注.
    pub annotation: AnnotationId,

    /// 会话发起的显示表面 id. cancel 按它判定归属.
    pub surface: String,

    /// 会话期间需要重绘的表面 id, 至少包含发起表面.
    /// 宿主可经 [`RoiTool::link_render_surface`] 加入联动表面.
    pub render_surfaces: Vec<String>,

    /// 被抓取的 handle 槽位. `None` 为整体抓取 (body).
    pub handle: Option<usize>,

    /// 抓取的是浮动文本框.
    pub moving_text_box: bool,

    /// 会话由 [`RoiTool::add_new_annotation`] 打开.
    pub new_annotation: bool,

    /// 会话内是否发生过移动.
    pub has_moved: bool,

    anchor_canvas: Canvas2,
    memo: Option<AnnotationSnapshot>,
    _token: InteractionToken,
}

/// 手势状态机.
#[derive(Debug, Default)]
enum ToolState {
    #[default]
    Idle,
    Drawing(EditSession),
    Modifying(EditSession),
}

/// 草图的绘制方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SketchMode {
    /// 实线, handle 可编辑.
    Solid,

    /// 传播范围内的中间切片: 虚线, 无 handle.
    Dashed,
}

/// 渲染通道产出的一条可绘制草图. 矢量绘图由外部协作者完成.
#[derive(Clone, Debug)]
pub struct AnnotationSketch {
    /// 标注 id.
    pub annotation: AnnotationId,

    /// 形状种类.
    pub kind: ShapeKind,

    /// handle 点的 canvas 坐标.
    pub canvas_points: Vec<Canvas2>,

    /// 激活 handle 槽位. 虚线草图不暴露 handle.
    pub active_handle: Option<usize>,

    /// 高亮标志.
    pub highlighted: bool,

    /// 绘制方式.
    pub mode: SketchMode,

    /// 统计文本行 (取第一个有记录的目标).
    pub text_lines: Vec<String>,

    /// 文本框的 canvas 位置.
    pub text_box: Option<Canvas2>,
}

/// 一个 ROI 工具实例. 圆 / 椭圆 / 矩形 / probe 共用同一状态机,
/// 形状差异全部由 [`ShapeKind`] 的能力记录分发.
#[derive(Debug)]
pub struct RoiTool {
    kind: ShapeKind,
    options: ToolOptions,
    state: ToolState,
    pipeline: StatsPipeline,
    interacting: Rc<Cell<bool>>,
    events: Vec<ToolEvent>,
    undo_memos: Vec<(AnnotationId, AnnotationSnapshot)>,
}

impl RoiTool {
    /// 创建工具实例.
    pub fn new(kind: ShapeKind, options: ToolOptions) -> Self {
        let pipeline = StatsPipeline::new(PipelineOptions {
            capture_points: options.capture_points,
            ..PipelineOptions::default()
        });
        Self {
            kind,
            options,
            state: ToolState::Idle,
            pipeline,
            interacting: Rc::new(Cell::new(false)),
            events: Vec::new(),
            undo_memos: Vec::new(),
        }
    }

    /// 形状种类.
    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// 是否有打开的会话.
    #[inline]
    pub fn is_interacting(&self) -> bool {
        self.interacting.get()
    }

    /// pointer-down: 在指针的世界位置锚定新标注并进入 Drawing.
    ///
    /// 全部 handle 初始重合于锚点; 标注立即注册进外部存储.
    /// 已有打开的会话时 panic (结构性误用).
    pub fn add_new_annotation(
        &mut self,
        event: PointerEvent,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
    ) -> AnnotationId {
        assert!(matches!(self.state, ToolState::Idle), "已有打开的会话");

        let camera = surface.camera();
        let metadata = FrameMetadata {
            frame_of_reference: surface.frame_of_reference().to_owned(),
            referenced_image: surface.displayed_image().map(str::to_owned),
            view_plane_normal: camera.view_plane_normal,
            view_up: camera.view_up,
        };
        let id = store.next_id();
        let mut annotation = Annotation::new(id, self.kind, metadata, event.world);
        annotation.highlighted = true;
        annotation.set_active_handle(Some(self.kind.draw_handle()));
        store.add(annotation);

        self.state = ToolState::Drawing(EditSession {
            annotation: id,
            surface: surface.id().to_owned(),
            render_surfaces: vec![surface.id().to_owned()],
            handle: Some(self.kind.draw_handle()),
            moving_text_box: false,
            new_annotation: true,
            has_moved: false,
            anchor_canvas: event.canvas,
            memo: None,
            _token: InteractionToken::acquire(&self.interacting),
        });
        id
    }

    /// handle 选中回调: 抓取几何 handle 进入 Modifying.
    ///
    /// 锁定 / 不可见 / 不存在的标注拒绝开会话, 返回 `false`.
    pub fn select_handle(
        &mut self,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
        id: AnnotationId,
        handle: usize,
    ) -> bool {
        self.open_modify(surface, store, id, Some(handle), false)
    }

    /// 工具选中回调: 整体抓取 (body) 进入 Modifying.
    pub fn select_body(
        &mut self,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
        id: AnnotationId,
    ) -> bool {
        self.open_modify(surface, store, id, None, false)
    }

    /// 抓取浮动文本框进入 Modifying.
    pub fn select_text_box(
        &mut self,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
        id: AnnotationId,
    ) -> bool {
        self.open_modify(surface, store, id, None, true)
    }

    fn open_modify(
        &mut self,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
        id: AnnotationId,
        handle: Option<usize>,
        moving_text_box: bool,
    ) -> bool {
        assert!(matches!(self.state, ToolState::Idle), "已有打开的会话");
        if store.is_locked(id) || !store.is_visible(id) {
            return false;
        }
        let Some(annotation) = store.get_mut(id) else {
            return false;
        };

        // 首次变更前的快照, 供 cancel 恢复与撤销历史使用.
        let memo = annotation.snapshot();
        annotation.highlighted = true;
        annotation.set_active_handle(handle);

        self.state = ToolState::Modifying(EditSession {
            annotation: id,
            surface: surface.id().to_owned(),
            render_surfaces: vec![surface.id().to_owned()],
            handle,
            moving_text_box,
            new_annotation: false,
            has_moved: false,
            anchor_canvas: [0.0; 2],
            memo: Some(memo),
            _token: InteractionToken::acquire(&self.interacting),
        });
        true
    }

    /// 指针移动.
    ///
    /// Drawing: 以锚点与当前指针为纯函数重建全部 handle;
    /// Modifying: 文本框自由平移, body 刚性平移, handle 按形状
    /// 拖拽规则重建. 统计不在这里重算, 推迟到渲染通道.
    pub fn pointer_move(
        &mut self,
        event: PointerEvent,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
    ) {
        let kind = self.kind;
        match &mut self.state {
            ToolState::Idle => {}
            ToolState::Drawing(session) => {
                let Some(annotation) = store.get_mut(session.annotation) else {
                    return;
                };
                let canvas_points = kind.recompute_on_draw(session.anchor_canvas, event.canvas);
                let world: Vec<Point3> = canvas_points
                    .iter()
                    .map(|c| surface.canvas_to_world(*c))
                    .collect();
                annotation.set_handle_points(&world);
                session.has_moved = true;
            }
            ToolState::Modifying(session) => {
                let Some(annotation) = store.get_mut(session.annotation) else {
                    return;
                };
                if session.moving_text_box {
                    // 自由放置, 永不重投影, 统计不受影响.
                    annotation.translate_text_box(event.world_delta);
                } else if let Some(handle) = session.handle {
                    let canvas: Vec<Canvas2> = annotation
                        .handles()
                        .points()
                        .iter()
                        .map(|p| surface.world_to_canvas(*p))
                        .collect();
                    let moved = recompute_on_drag(kind, &canvas, handle, event.canvas_delta);
                    let world: Vec<Point3> = moved
                        .iter()
                        .map(|c| surface.canvas_to_world(*c))
                        .collect();
                    annotation.set_handle_points(&world);
                } else {
                    annotation.translate(event.world_delta);
                }
                session.has_moved = true;
            }
        }
    }

    /// 收笔. 依据会话类型发出终结信号并回到 Idle.
    ///
    /// 零尺寸的新标注被静默丢弃 (不留下持久标注, 不发信号);
    /// 配置了越界拒绝且任一 handle 落在任一目标之外时删除标注
    /// 并发出 [`ToolEvent::Removed`]; 否则成功收笔恰好发出一次
    /// [`ToolEvent::Completed`] / [`ToolEvent::Modified`].
    pub fn pointer_up(&mut self, store: &mut dyn AnnotationStore, targets: &[&dyn VoxelTarget]) {
        match mem::take(&mut self.state) {
            ToolState::Idle => {}
            ToolState::Drawing(session) => {
                let id = session.annotation;
                if !session.has_moved && session.new_annotation {
                    store.remove(id);
                    return;
                }
                let Some(annotation) = store.get_mut(id) else {
                    return;
                };
                annotation.set_active_handle(None);
                annotation.highlighted = false;

                if self.options.reject_outside_image && any_handle_outside(annotation, targets) {
                    store.remove(id);
                    self.events.push(ToolEvent::Removed(id));
                    return;
                }
                self.events.push(ToolEvent::Completed(id));
            }
            ToolState::Modifying(session) => {
                let id = session.annotation;
                if let Some(annotation) = store.get_mut(id) {
                    annotation.set_active_handle(None);
                    annotation.highlighted = false;
                }
                if session.has_moved {
                    if let Some(memo) = session.memo {
                        self.undo_memos.push((id, memo));
                    }
                    self.events.push(ToolEvent::Modified(id));
                }
            }
        }
    }

    /// 取消当前会话 (Esc / 视图切换).
    ///
    /// 仅在会话打开且属于给定表面时有效; 恢复拖拽前的高亮与激活
    /// handle 状态. 新标注仍发出一次 [`ToolEvent::Completed`],
    /// 保证调用方总能看到终结信号. 返回被取消的标注 id.
    pub fn cancel(
        &mut self,
        surface_id: &str,
        store: &mut dyn AnnotationStore,
    ) -> Option<AnnotationId> {
        let matches_surface = match &self.state {
            ToolState::Idle => false,
            ToolState::Drawing(s) | ToolState::Modifying(s) => s.surface == surface_id,
        };
        if !matches_surface {
            return None;
        }

        let session = match mem::take(&mut self.state) {
            ToolState::Drawing(s) | ToolState::Modifying(s) => s,
            ToolState::Idle => unreachable!(),
        };
        let id = session.annotation;
        if let Some(annotation) = store.get_mut(id) {
            match &session.memo {
                Some(memo) => annotation.restore_interaction_state(memo),
                None => {
                    annotation.set_active_handle(None);
                    annotation.highlighted = false;
                }
            }
        }
        if session.new_annotation {
            self.events.push(ToolEvent::Completed(id));
        }
        Some(id)
    }

    /// 渲染通道: 收集该表面上本工具的全部标注, 保证统计最新,
    /// 产出可绘制草图.
    ///
    /// 表面已被拆除时记一条日志并返回空 (交互拆除竞态下的预期
    /// 情况, 不抛出); 渲染前消失的标注跳过, 继续处理其余标注.
    /// 配置了 threshold 传播而采集为斜切时返回
    /// [`crate::ProjectionError::ObliqueView`] (结构性误用).
    pub fn render(
        &mut self,
        surface: &dyn DisplaySurface,
        store: &mut dyn AnnotationStore,
        targets: &[&dyn VoxelTarget],
        now: Instant,
    ) -> ProjectionResult<Vec<AnnotationSketch>> {
        if !surface.is_alive() {
            log::warn!("表面 {} 已被拆除, 本帧不渲染", surface.id());
            return Ok(Vec::new());
        }

        let ids = store.for_surface(self.kind, surface.frame_of_reference());
        let mut sketches = Vec::new();

        for id in ids {
            let Some(annotation) = store.get_mut(id) else {
                log::debug!("标注 {id:?} 在渲染前消失, 跳过");
                continue;
            };
            if !annotation.visible {
                continue;
            }

            let mut volume_recomputed = false;

            if let Some(prop) = self.options.propagation {
                if let Some(sketch) = self.render_propagated(
                    annotation,
                    surface,
                    targets,
                    prop,
                    now,
                    &mut volume_recomputed,
                )? {
                    sketches.push(sketch);
                }
            } else {
                for target in targets {
                    let recomputed = self.pipeline.ensure(annotation, surface, *target, now);
                    volume_recomputed |= recomputed && target.is_volume();
                }
                sketches.push(sketch(self.kind, annotation, surface, targets, SketchMode::Solid));
            }

            if volume_recomputed {
                StatsPipeline::purge_cross_slice(annotation, targets);
            }
        }
        Ok(sketches)
    }

    /// threshold 传播的渲染分支: 主导轴投影, 每切片统计 union,
    /// 以及按焦点坐标分类的草图样式.
    fn render_propagated(
        &mut self,
        annotation: &mut Annotation,
        surface: &dyn DisplaySurface,
        targets: &[&dyn VoxelTarget],
        prop: PropagationOptions,
        now: Instant,
        volume_recomputed: &mut bool,
    ) -> ProjectionResult<Option<AnnotationSketch>> {
        let Some(reference) = targets.iter().find(|t| t.is_volume()).or_else(|| targets.first())
        else {
            return Ok(None);
        };

        let normal = annotation.metadata().view_plane_normal;
        let projector = SliceProjector::from_spacing(normal, reference.spacing())?;
        let origin = projector.coordinate(annotation.handles().points()[0]);
        let (start, end) = projector.start_end(origin, prop.slice_count);
        let focal = projector.coordinate(surface.camera().focal_point);
        let mode = projector.classify(focal, origin, start, end);

        if prop.per_slice_stats {
            let sets = projector.project(annotation.handles().points(), start, end);
            for target in targets {
                let recomputed =
                    self.pipeline
                        .ensure_projected(annotation, surface, *target, &sets, now);
                *volume_recomputed |= recomputed && target.is_volume();
            }
        } else {
            for target in targets {
                let recomputed = self.pipeline.ensure(annotation, surface, *target, now);
                *volume_recomputed |= recomputed && target.is_volume();
            }
        }

        Ok(match mode {
            SliceRenderMode::Hidden => None,
            SliceRenderMode::Editable => {
                Some(sketch(self.kind, annotation, surface, targets, SketchMode::Solid))
            }
            SliceRenderMode::Dashed => {
                Some(sketch(self.kind, annotation, surface, targets, SketchMode::Dashed))
            }
        })
    }

    /// 当前会话需要重绘的表面 id. 无会话时为空.
    ///
    /// 宿主在指针回调后依据它安排本帧重绘, 而不是全量重绘.
    pub fn session_render_surfaces(&self) -> &[String] {
        match &self.state {
            ToolState::Idle => &[],
            ToolState::Drawing(s) | ToolState::Modifying(s) => &s.render_surfaces,
        }
    }

    /// 把联动表面 (如同参考系的其他视图) 加入当前会话的重绘集.
    /// 重复加入被忽略; 无会话时为空操作.
    pub fn link_render_surface(&mut self, surface_id: &str) {
        if let ToolState::Drawing(s) | ToolState::Modifying(s) = &mut self.state {
            if !s.render_surfaces.iter().any(|id| id == surface_id) {
                s.render_surfaces.push(surface_id.to_owned());
            }
        }
    }

    /// 取走积累的终结信号.
    pub fn take_events(&mut self) -> Vec<ToolEvent> {
        mem::take(&mut self.events)
    }

    /// 取走积累的撤销快照 (每个修改会话至多一条, 首次变更前拍摄).
    pub fn take_undo_memos(&mut self) -> Vec<(AnnotationId, AnnotationSnapshot)> {
        mem::take(&mut self.undo_memos)
    }
}

/// 是否有 handle 点落在任一目标的网格之外 (逐轴向下取整后判定).
fn any_handle_outside(annotation: &Annotation, targets: &[&dyn VoxelTarget]) -> bool {
    targets.iter().any(|target| {
        let (nx, ny, nz) = target.dimensions();
        let dims = [nx as f64, ny as f64, nz as f64];
        annotation.handles().points().iter().any(|p| {
            let frac = target.world_to_index(*p);
            (0..3).any(|axis| {
                let i = frac[axis].floor();
                !i.is_finite() || i < 0.0 || i >= dims[axis]
            })
        })
    })
}

fn sketch(
    kind: ShapeKind,
    annotation: &Annotation,
    surface: &dyn DisplaySurface,
    targets: &[&dyn VoxelTarget],
    mode: SketchMode,
) -> AnnotationSketch {
    let canvas_points = annotation
        .handles()
        .points()
        .iter()
        .map(|p| surface.world_to_canvas(*p))
        .collect();
    let text_lines = targets
        .iter()
        .find_map(|t| annotation.stats(t.id()))
        .map(|r| r.display_lines())
        .unwrap_or_default();
    AnnotationSketch {
        annotation: annotation.id(),
        kind,
        canvas_points,
        active_handle: match mode {
            SketchMode::Solid => annotation.handles().active(),
            SketchMode::Dashed => None,
        },
        highlighted: annotation.highlighted,
        mode,
        text_lines,
        text_box: annotation.text_box().map(|p| surface.world_to_canvas(p)),
    }
}
