//! Per-frame actor physics.
//!
//! Distances are `acceleration * meter_in_pixel * dt²` horizontally and
//! `meter_in_pixel² * dt²` vertically, added to the velocities once per
//! frame. Velocities are in pixels per frame.

use crate::actor::{ActorAction, ActorState, Entity, Motion};
use crate::map::MapMetrics;

/// Advances every actor by `dt` seconds and refreshes all bounding boxes.
pub fn update_entities(entities: &mut [Entity], world: &MapMetrics, dt: f64) {
    for entity in entities {
        update_actor(entity, world, dt);
        entity.update_bounding_box();
    }
}

fn update_actor(entity: &mut Entity, world: &MapMetrics, dt: f64) {
    let Some(actor) = entity.actor.as_mut() else {
        return;
    };
    let m = world.meter_in_pixel;
    let distance_x = actor.acceleration * m * dt * dt;
    let distance_y = m * m * dt * dt;

    match actor.motion {
        Motion::Gravitational => {
            actor.state.set(ActorState::RISING, actor.velocity_y < 0.0);
            if actor.is(ActorState::RISING) {
                actor.state.insert(ActorState::IN_MID_AIR);
            }

            if actor.is(ActorState::IN_MID_AIR) {
                actor.velocity_y += distance_y;
                entity.pos_y += actor.velocity_y;
            } else {
                actor.action.remove(ActorAction::JUMP);
                actor.velocity_y = 0.0;
                // ground correction
                if world.tile_height > 0.0 {
                    entity.pos_y = world.tile_height * (entity.pos_y / world.tile_height).round();
                }
            }
        }
        Motion::Floating => {
            actor.state.remove(ActorState::IN_MID_AIR | ActorState::JUMPING | ActorState::RISING);

            if actor.is(ActorState::MOVING) {
                actor.velocity_y += distance_y;
            } else {
                actor.velocity_y -= distance_y;
            }
            if actor.velocity_y > 0.0 {
                if actor.is(ActorState::GOING_UP) {
                    entity.pos_y -= actor.velocity_y;
                } else if actor.is(ActorState::GOING_DOWN) {
                    entity.pos_y += actor.velocity_y;
                }
            }
            actor.velocity_y = actor.velocity_y.min(actor.max_velocity_y).max(0.0);
        }
    }

    if actor.is(ActorState::MOVING) {
        actor.velocity_x += distance_x;
    } else {
        actor.velocity_x -= distance_x * 2.0;
    }
    if actor.velocity_x > 0.0 {
        if actor.is(ActorState::GOING_LEFT) {
            entity.pos_x -= actor.velocity_x;
        } else if actor.is(ActorState::GOING_RIGHT) {
            entity.pos_x += actor.velocity_x;
        }
    }
    actor.velocity_x = actor.velocity_x.min(actor.max_velocity_x).max(0.0);

    if actor.connect_horizontal_map_ends {
        entity.pos_x = wrap(entity.pos_x, entity.width, world.width);
    } else {
        entity.pos_x = entity.pos_x.max((entity.width / 4.0).floor());
    }
    // Only the left edge is walled; vertical ends are open unless connected.
    if actor.connect_vertical_map_ends {
        entity.pos_y = wrap(entity.pos_y, entity.height, world.height);
    }
}

/// Teleports a coordinate that left `[-size, extent + size]` to the other end.
fn wrap(pos: f64, size: f64, extent: f64) -> f64 {
    if pos < -size {
        extent + size
    } else if pos > extent + size {
        -size
    } else {
        pos
    }
}
