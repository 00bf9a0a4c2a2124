use super::{ensure_target, rgb, select, RenderLayer, View};
use crate::actor::{ActorState, Direction};
use crate::background::Alignment;
use crate::backend::{Backend, Flip};
use crate::camera::Camera;
use crate::error::EngineError;
use crate::map::Map;
use macroquad::math::Rect;

/// Picks the reference velocity for this frame.
///
/// A constant velocity always wins. Otherwise the background follows the
/// camera target's horizontal speed, and stands still while the camera is
/// locked or sits on a horizontal edge.
fn update_velocity<T>(map: &mut Map<T>, camera: &Camera) {
    let target = camera
        .target()
        .and_then(|i| map.entities.get(i))
        .and_then(|e| e.actor.as_ref());

    let bg = &mut map.background;
    if let Some(actor) = target {
        bg.direction = if actor.is(ActorState::GOING_LEFT) {
            Direction::Left
        } else {
            Direction::Right
        };
    }
    if bg.velocity_is_constant {
        return;
    }
    bg.velocity = match target {
        Some(actor) if !camera.is_at_horizontal_boundary() && !camera.is_locked() => {
            actor.velocity_x
        }
        _ => 0.0,
    };
}

pub(super) fn render_background<B: Backend>(
    backend: &mut B,
    map: &mut Map<B::Texture>,
    camera: &Camera,
    view: View,
) -> Result<(), EngineError> {
    update_velocity(map, camera);
    map.background.distribute_velocity();
    for layer in &mut map.background.layers {
        layer.cover(backend, view.logical_width)?;
    }

    let target = ensure_target(
        backend,
        &mut map.render_targets[RenderLayer::Background.index()],
        view.logical_width,
        view.logical_height,
    )?;
    select(backend, Some(target))?;

    let clear_color = rgb(map.handle.background_color);
    if map.background.layers.is_empty() {
        backend.clear(clear_color);
    }

    let direction = map.background.direction;
    let alignment = map.background.alignment;
    for (index, layer) in map.background.layers.iter_mut().enumerate() {
        layer.wrap();
        let (pos_x_a, pos_x_b) = layer.draw_positions();
        layer.advance(direction);

        let dst_y = match alignment {
            Alignment::Top => layer.pos_y - camera.pos_y(),
            Alignment::Bottom => layer.pos_y + (view.logical_height as f64 - layer.height as f64),
        };

        if index == 0 {
            backend.clear(clear_color);
        }
        for x in [pos_x_a, pos_x_b] {
            let dst = Rect::new(
                x.trunc() as f32,
                dst_y.trunc() as f32,
                layer.width as f32,
                layer.height as f32,
            );
            backend.copy(&layer.texture, None, dst, Flip::NONE);
        }
    }

    select(backend, None)
}
