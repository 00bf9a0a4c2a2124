use super::{ensure_target, select, LayerLevel, View, TRANSPARENT};
use crate::actor::{Actor, ActorState, Depth, Entity};
use crate::backend::{Backend, Flip};
use crate::camera::Camera;
use crate::error::EngineError;
use crate::map::Map;
use macroquad::math::Rect;

const BACKGROUND_DEPTHS: &[Depth] = &[Depth::Background];
const FOREGROUND_DEPTHS: &[Depth] = &[Depth::Midground, Depth::Foreground];

/// Moves an animated actor to its next frame once `1 / fps` has passed.
fn advance_animation(actor: &mut Actor, dt: f64) {
    if !actor.is(ActorState::ANIMATED) {
        return;
    }
    let Some(anim) = actor.animation().copied() else {
        return;
    };
    if anim.fps == 0 || anim.length == 0 {
        return;
    }
    actor.time_since_last_anim_frame += dt;
    if actor.time_since_last_anim_frame >= 1.0 / anim.fps as f64 {
        actor.time_since_last_anim_frame = 0.0;
        actor.current_frame = (actor.current_frame + 1) % anim.length;
    }
}

/// Source and destination rectangles for an actor's current frame.
fn frame_rects(entity: &Entity, actor: &Actor, camera: &Camera) -> (Rect, Rect) {
    let (first_frame, offset_y) = actor
        .animation()
        .map_or((1, 0), |a| (a.first_frame, a.offset_y));
    let (w, h) = (entity.width, entity.height);
    let src = Rect::new(
        ((first_frame.saturating_sub(1) + actor.current_frame) as f64 * w) as f32,
        (offset_y as f64 * h) as f32,
        w as f32,
        h as f32,
    );
    let dst = Rect::new(
        (entity.pos_x - camera.pos_x() - w / 2.0) as f32,
        (entity.pos_y - camera.pos_y() - h / 2.0) as f32,
        w as f32,
        h as f32,
    );
    (src, dst)
}

pub(super) fn render_actors<B: Backend>(
    backend: &mut B,
    map: &mut Map<B::Texture>,
    camera: &Camera,
    level: LayerLevel,
    view: View,
) -> Result<(), EngineError> {
    let target = ensure_target(
        backend,
        &mut map.render_targets[level.actor_layer().index()],
        view.logical_width,
        view.logical_height,
    )?;
    select(backend, Some(target))?;
    backend.clear(TRANSPARENT);

    let depths = match level {
        LayerLevel::Background => BACKGROUND_DEPTHS,
        LayerLevel::Foreground => FOREGROUND_DEPTHS,
    };
    for &depth in depths {
        for entity in map.entities.iter_mut() {
            let Some(actor) = entity.actor.as_mut() else {
                continue;
            };
            if actor.depth != depth {
                continue;
            }
            advance_animation(actor, view.dt);

            let entity = &*entity;
            let Some(actor) = entity.actor.as_ref() else {
                continue;
            };
            let Some(sprite) = actor
                .sprite_sheet_id
                .checked_sub(1)
                .and_then(|i| map.sprites.get(i))
            else {
                continue;
            };
            let (src, dst) = frame_rects(entity, actor, camera);
            let flip = if actor.is(ActorState::LOOKING_LEFT) {
                Flip::HORIZONTAL
            } else {
                Flip::NONE
            };
            backend.copy(sprite, Some(src), dst, flip);
        }
    }

    select(backend, None)
}
