//! End-to-end behavior of the canvas through its public API.

use canvas::{CanvasConfig, CanvasView, SharedCanvas};
use canvas_core::input::{ButtonEvent, Modifiers, MotionEvent, MouseButton};
use canvas_core::{Bounds, Color, RecordingSurface};
use glam::Vec2;
use scene_graph::{ItemId, RectFigure};
use std::thread;

fn view_with(config: CanvasConfig) -> CanvasView {
    CanvasView::with_config(&config)
}

fn add_box(view: &mut CanvasView, bounds: Bounds) -> ItemId {
    let layer = view.current_layer();
    let item = view
        .scene_mut()
        .create_figure(layer, RectFigure::new(Color::rgb(0.8, 0.2, 0.2)));
    let scene = view.scene_mut();
    scene.set_auto_sizing(item, false);
    scene.update_flags(item, |flags| {
        flags.accepts_selection = true;
        flags.draggable = true;
    });
    view.add_item(item);
    view.scene_mut().set_bounds(item, bounds);
    view.sync();
    item
}

fn button(view: &mut CanvasView, at: Vec2, press: bool, modifiers: Modifiers) {
    view.handle_mouse_button(ButtonEvent {
        button: MouseButton::Left,
        press,
        position: at,
        modifiers,
    });
}

fn click(view: &mut CanvasView, at: Vec2, modifiers: Modifiers) {
    button(view, at, true, modifiers);
    button(view, at, false, modifiers);
}

#[test]
fn crossing_lines_hop_on_the_lower_line() {
    let mut view = CanvasView::new();
    let layer = view.current_layer();
    let horizontal = view.scene_mut().create_line(layer);
    let vertical = view.scene_mut().create_line(layer);
    view.add_item(horizontal);
    view.add_item(vertical);
    view.scene_mut()
        .set_line_vertices(horizontal, vec![Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0)]);
    view.scene_mut()
        .set_line_vertices(vertical, vec![Vec2::new(50.0, 0.0), Vec2::new(50.0, 100.0)]);
    view.sync();

    let scene = view.scene();
    let lower = scene.get(horizontal).unwrap();
    let hops: Vec<_> = lower.as_line().unwrap().hops().collect();
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].hop, Some(vertical));
    assert_eq!(hops[0].pos + lower.position(), Vec2::new(50.0, 50.0));
    assert_eq!(scene.get(vertical).unwrap().as_line().unwrap().hops().count(), 0);
}

#[test]
fn click_selects_the_frontmost_item() {
    let mut view = CanvasView::new();
    let back = add_box(&mut view, Bounds::from_xywh(10.0, 10.0, 100.0, 100.0));
    let front = add_box(&mut view, Bounds::from_xywh(50.0, 50.0, 100.0, 100.0));

    click(&mut view, Vec2::new(80.0, 80.0), Modifiers::none());
    assert_eq!(view.selection().contents(), &[front]);
    assert!(!view.scene().get(back).unwrap().is_selected());

    // lowering the front item changes which one the click finds
    view.scene_mut().lower(front);
    click(&mut view, Vec2::new(80.0, 80.0), Modifiers::none());
    assert_eq!(view.selection().contents(), &[back]);
}

#[test]
fn cropped_export_size_does_not_depend_on_zoom() {
    let mut view = view_with(CanvasConfig {
        page_size: Vec2::new(1200.0, 900.0),
        ..CanvasConfig::default()
    });
    add_box(&mut view, Bounds::from_xywh(100.0, 100.0, 200.0, 80.0));
    add_box(&mut view, Bounds::from_xywh(400.0, 300.0, 50.0, 50.0));

    let at_one = view.render_png(true).unwrap();
    view.set_zoom(2.0);
    let at_two = view.render_png(true).unwrap();

    assert_eq!((at_two.width(), at_two.height()), (370, 270));
    assert_eq!(at_one.size(), at_two.size());
}

#[test]
fn dragging_a_selection_moves_every_item_by_the_same_snapped_delta() {
    let mut view = view_with(CanvasConfig {
        grid_size: 10.0,
        grid_snapping: true,
        ..CanvasConfig::default()
    });
    let a = add_box(&mut view, Bounds::from_xywh(10.0, 10.0, 30.0, 30.0));
    let b = add_box(&mut view, Bounds::from_xywh(63.0, 17.0, 30.0, 30.0));
    let c = add_box(&mut view, Bounds::from_xywh(121.0, 88.0, 30.0, 30.0));
    let start: Vec<Vec2> = [a, b, c]
        .iter()
        .map(|&id| view.scene().get(id).unwrap().position())
        .collect();

    click(&mut view, Vec2::new(20.0, 20.0), Modifiers::none());
    click(&mut view, Vec2::new(70.0, 25.0), Modifiers::shift());
    click(&mut view, Vec2::new(130.0, 95.0), Modifiers::shift());
    assert_eq!(view.selection().len(), 3);

    button(&mut view, Vec2::new(20.0, 20.0), true, Modifiers::none());
    view.handle_mouse_move(MotionEvent {
        position: Vec2::new(53.0, 67.0),
        modifiers: Modifiers::none().with_button(MouseButton::Left),
    });
    button(&mut view, Vec2::new(53.0, 67.0), false, Modifiers::none());

    let deltas: Vec<Vec2> = [a, b, c]
        .iter()
        .zip(&start)
        .map(|(&id, start)| view.scene().get(id).unwrap().position() - *start)
        .collect();
    assert_eq!(deltas, vec![Vec2::new(30.0, 50.0); 3]);
    assert_eq!(view.scene().get(a).unwrap().position(), Vec2::new(40.0, 60.0));
    assert_eq!(view.selection().len(), 3);
}

#[test]
fn background_thread_builds_while_the_ui_paints() {
    let canvas = SharedCanvas::new(CanvasView::new());
    let builder = {
        let canvas = canvas.clone();
        thread::spawn(move || {
            for i in 0..50 {
                canvas.with(|view| {
                    let x = (i % 10) as f32 * 60.0;
                    let y = (i / 10) as f32 * 60.0;
                    add_box(view, Bounds::from_xywh(x, y, 40.0, 40.0));
                });
            }
        })
    };

    for _ in 0..20 {
        canvas.with(|view| {
            if let Some(area) = view.take_repaint_request() {
                assert!(view.repaint(&mut RecordingSurface::new(), &area));
            }
        });
    }
    builder.join().unwrap();

    let mut view = canvas.lock();
    let root = view.layer(view.current_layer()).unwrap().root();
    assert_eq!(view.scene().children(root).len(), 50);
    let area = Bounds::from_origin_size(Vec2::ZERO, view.view_size());
    assert!(view.repaint(&mut RecordingSurface::new(), &area));
    assert!(view.get_item_at(Vec2::new(545.0, 245.0)).is_some());
}
