//! 在内存 CT 体数据上走一遍完整的 ROI 测量流程:
//! 绘制椭圆 → 渲染通道同步统计 → 打印统计文本行.
//!
//! ```text
//! cargo run --example measure
//! ```

use std::time::Instant;

use roi_berry::prelude::*;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    // 64³ 的 CT 体数据: 空气背景, 中心一个软组织立方体.
    let mut volume = GridVolume::new("demo-ct", (64, 64, 64), [0.0; 3], [1.0; 3], -1000.0)
        .with_modality(Modality::Ct)
        .with_mm_spacing();
    for k in 24..40 {
        for j in 24..40 {
            for i in 24..40 {
                volume.set((i, j, k), 50.0);
            }
        }
    }

    let surface = PlaneSurface::new(
        "axial",
        "demo-frame",
        Camera {
            view_plane_normal: [0.0, 0.0, 1.0],
            view_up: [0.0, 1.0, 0.0],
            focal_point: [32.0, 32.0, 32.0],
        },
    );

    let mut store = MemoryStore::new();
    let mut tool = RoiTool::new(ShapeKind::Ellipse, ToolOptions::default());

    // 画一个完全落在立方体内的椭圆.
    let anchor = [32.0, 32.0, 32.0];
    let cursor = [37.0, 36.0, 32.0];
    let c0 = surface.world_to_canvas(anchor);
    let c1 = surface.world_to_canvas(cursor);

    tool.add_new_annotation(PointerEvent::at(c0, anchor), &surface, &mut store);
    tool.pointer_move(
        PointerEvent {
            canvas: c1,
            world: cursor,
            canvas_delta: [c1[0] - c0[0], c1[1] - c0[1]],
            world_delta: [
                cursor[0] - anchor[0],
                cursor[1] - anchor[1],
                cursor[2] - anchor[2],
            ],
        },
        &surface,
        &mut store,
    );
    tool.pointer_up(&mut store, &[&volume]);

    for event in tool.take_events() {
        log::info!("事件: {event:?}");
    }

    // 首帧渲染同步计算统计.
    let sketches = tool
        .render(&surface, &mut store, &[&volume], Instant::now())
        .expect("轴向视图不会投影出错");
    for sketch in &sketches {
        log::info!("{:?}: {} 个 handle", sketch.kind, sketch.canvas_points.len());
        for line in &sketch.text_lines {
            log::info!("  {line}");
        }
    }
}
