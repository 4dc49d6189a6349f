//! 修改已有标注时的每形状 handle 拖拽规则.
//!
//! 所有规则在 canvas 空间工作, 输入为当前全部槽位与被拖槽位的
//! canvas 增量, 输出重建后的全部槽位.

use super::{rect_corners, ShapeKind};
use crate::Canvas2;

/// 按形状规则重算拖拽后的 handle 槽位.
///
/// - 圆: 拖圆心 (槽位 0) 刚性平移两点; 拖边缘点 (槽位 1) 圆心不动.
/// - 椭圆 (`[下, 上, 左, 右]`): 拖上/下端点时, 下与上关于固定中心的
///   y 重新对称, **同时** 左与右按拖拽的 x 增量外扩 —— 每个 handle
///   也耦合进正交方向的半轴, 并非按轴独立. 拖左/右为镜像情形.
/// - 矩形 (`[左下, 右下, 左上, 右上]`): 拖槽位 0 或 3 时固定对角
///   槽位, 重建其余两角保持轴对齐; 拖槽位 1 或 2 是另一条对角线上的
///   对称情形.
///
/// `handle` 越界或与形状的 handle 个数不符时 panic.
pub fn recompute_on_drag(
    kind: ShapeKind,
    points: &[Canvas2],
    handle: usize,
    delta: Canvas2,
) -> Vec<Canvas2> {
    assert_eq!(points.len(), kind.handle_count(), "handle 槽位个数不符");
    assert!(handle < points.len(), "handle 槽位越界");

    match kind {
        ShapeKind::Probe => vec![moved(points[0], delta)],
        ShapeKind::Circle => drag_circle(points, handle, delta),
        ShapeKind::Ellipse => drag_ellipse(points, handle, delta),
        ShapeKind::Rectangle => drag_rectangle(points, handle, delta),
    }
}

#[inline]
fn moved(p: Canvas2, d: Canvas2) -> Canvas2 {
    [p[0] + d[0], p[1] + d[1]]
}

fn drag_circle(points: &[Canvas2], handle: usize, delta: Canvas2) -> Vec<Canvas2> {
    match handle {
        // 圆心: 两点一起平移.
        0 => vec![moved(points[0], delta), moved(points[1], delta)],
        // 边缘点: 圆心固定.
        _ => vec![points[0], moved(points[1], delta)],
    }
}

fn drag_ellipse(points: &[Canvas2], handle: usize, delta: Canvas2) -> Vec<Canvas2> {
    let [bottom, top, left, right] = [points[0], points[1], points[2], points[3]];
    let cx = (left[0] + right[0]) / 2.0;
    let cy = (bottom[1] + top[1]) / 2.0;
    let cursor = moved(points[handle], delta);

    if handle < 2 {
        // 拖上/下: 垂直半轴取被拖点到中心 y 的距离, 水平半轴按 x 增量外扩.
        let half_h = (cursor[1] - cy).abs();
        let dx = delta[0];
        vec![
            [cx, cy + half_h],
            [cx, cy - half_h],
            [left[0] - dx, left[1]],
            [right[0] + dx, right[1]],
        ]
    } else {
        // 拖左/右: 镜像情形.
        let half_w = (cursor[0] - cx).abs();
        let dy = delta[1];
        vec![
            [bottom[0], bottom[1] + dy],
            [top[0], top[1] - dy],
            [cx - half_w, cy],
            [cx + half_w, cy],
        ]
    }
}

fn drag_rectangle(points: &[Canvas2], handle: usize, delta: Canvas2) -> Vec<Canvas2> {
    // 对角槽位配对: 0 <-> 3, 1 <-> 2.
    let opposite = 3 - handle;
    let fixed = points[opposite];
    let cursor = moved(points[handle], delta);

    let rebuilt = rect_corners(cursor, fixed);
    debug_assert_eq!(rebuilt.len(), 4);
    rebuilt
}
