//! Entities placed by the map's object layers, and the actor record that
//! gives some of them physics and animation.

use bitflags::bitflags;

bitflags! {
    /// Pose and intent bits the simulator and renderer read.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ActorState: u32 {
        const MOVING = 1 << 0;
        const JUMPING = 1 << 1;
        const IN_MID_AIR = 1 << 2;
        const RISING = 1 << 3;
        const ANIMATED = 1 << 4;
        const GOING_LEFT = 1 << 5;
        const GOING_RIGHT = 1 << 6;
        const LOOKING_LEFT = 1 << 7;
        const LOOKING_RIGHT = 1 << 8;
        const GOING_UP = 1 << 9;
        const GOING_DOWN = 1 << 10;
    }
}

bitflags! {
    /// Requests raised by game code and consumed by the simulator.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ActorAction: u32 {
        const JUMP = 1 << 0;
    }
}

/// How gravity applies to an actor. Fixed at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Motion {
    /// Falls while in mid-air; grounded otherwise.
    Gravitational,
    /// Velocity ramps along the GOING_UP / GOING_DOWN flags.
    #[default]
    Floating,
}

/// Parallax bucket an actor is drawn in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Depth {
    /// Drawn with the map background, behind foreground tiles.
    Background,
    /// Drawn over foreground tiles, before foreground actors.
    Midground,
    #[default]
    Foreground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// A horizontal run of frames on a sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    /// 1-based column of the first frame.
    pub first_frame: u32,
    pub length: u32,
    pub fps: u32,
    /// Row on the sprite sheet.
    pub offset_y: u32,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            first_frame: 1,
            length: 1,
            fps: 0,
            offset_y: 0,
        }
    }
}

/// Axis-aligned bounding box in map pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aabb {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Aabb {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            top,
            left,
            right,
            bottom,
        }
    }

    /// Boxes that share an edge intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        bounding_boxes_intersect(self, other)
    }
}

/// True unless one box lies strictly beyond an edge of the other.
pub fn bounding_boxes_intersect(a: &Aabb, b: &Aabb) -> bool {
    !(b.left > a.right || b.top > a.bottom || a.left > b.right || a.top > b.bottom)
}

#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub acceleration: f64,
    pub max_velocity_x: f64,
    /// Vertical speed limit for floating actors; `max_velocity_x` when the
    /// map does not set one.
    pub max_velocity_y: f64,
    pub jumping_power: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    /// 1-based index into the map's sprite sheets; 0 means none.
    pub sprite_sheet_id: usize,
    pub spawn_pos_x: f64,
    pub spawn_pos_y: f64,
    pub connect_horizontal_map_ends: bool,
    pub connect_vertical_map_ends: bool,
    pub state: ActorState,
    pub action: ActorAction,
    pub motion: Motion,
    pub depth: Depth,
    /// 1-based index into `animations`.
    pub current_animation: usize,
    pub current_frame: u32,
    pub time_since_last_anim_frame: f64,
    pub animations: Vec<Animation>,
}

impl Actor {
    pub fn animation(&self) -> Option<&Animation> {
        self.current_animation
            .checked_sub(1)
            .and_then(|i| self.animations.get(i))
    }

    pub fn is(&self, state: ActorState) -> bool {
        self.state.contains(state)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Entity {
    /// Tiled object id.
    pub id: u32,
    pub name: String,
    /// Center of the entity.
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f64,
    pub height: f64,
    bounding_box: Aabb,
    pub actor: Option<Actor>,
}

impl Entity {
    pub fn new(pos_x: f64, pos_y: f64, width: f64, height: f64) -> Self {
        let mut entity = Self {
            pos_x,
            pos_y,
            width,
            height,
            ..Default::default()
        };
        entity.update_bounding_box();
        entity
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    /// Recomputes the box from the center pose; left and top never go
    /// below zero.
    pub fn update_bounding_box(&mut self) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        self.bounding_box = Aabb {
            left: (self.pos_x - half_w).max(0.0),
            top: (self.pos_y - half_h).max(0.0),
            right: self.pos_x + half_w,
            bottom: self.pos_y + half_h,
        };
    }

    pub fn set_moving(&mut self, moving: bool) {
        if let Some(actor) = self.actor.as_mut() {
            actor.state.set(ActorState::MOVING, moving);
        }
    }

    /// Horizontal directions also turn the sprite.
    pub fn set_direction(&mut self, direction: Direction) {
        let Some(actor) = self.actor.as_mut() else {
            return;
        };
        let state = &mut actor.state;
        match direction {
            Direction::Left => {
                state.remove(ActorState::GOING_RIGHT | ActorState::LOOKING_RIGHT);
                state.insert(ActorState::GOING_LEFT | ActorState::LOOKING_LEFT);
            }
            Direction::Right => {
                state.remove(ActorState::GOING_LEFT | ActorState::LOOKING_LEFT);
                state.insert(ActorState::GOING_RIGHT | ActorState::LOOKING_RIGHT);
            }
            Direction::Up => {
                state.remove(ActorState::GOING_DOWN);
                state.insert(ActorState::GOING_UP);
            }
            Direction::Down => {
                state.remove(ActorState::GOING_UP);
                state.insert(ActorState::GOING_DOWN);
            }
        }
    }

    /// Selects a 1-based animation; restarts it only when it changes.
    pub fn set_animation(&mut self, animation: usize) {
        if let Some(actor) = self.actor.as_mut() {
            if actor.current_animation != animation {
                actor.current_animation = animation;
                actor.current_frame = 0;
                actor.time_since_last_anim_frame = 0.0;
            }
        }
    }

    /// Starts a jump unless one is running or the actor is still rising.
    pub fn jump(&mut self) {
        let height = self.height;
        let Some(actor) = self.actor.as_mut() else {
            return;
        };
        if actor.is(ActorState::JUMPING) || actor.velocity_y > 0.0 {
            return;
        }
        self.pos_y -= height / 8.0;
        actor.velocity_y = -actor.jumping_power;
        actor.state.insert(ActorState::JUMPING | ActorState::IN_MID_AIR);
        actor.action.insert(ActorAction::JUMP);
        self.update_bounding_box();
    }

    /// Standing on ground ends a jump; otherwise the actor falls.
    pub fn set_grounded(&mut self, grounded: bool) {
        if let Some(actor) = self.actor.as_mut() {
            if grounded {
                actor.state.remove(ActorState::IN_MID_AIR | ActorState::JUMPING);
            } else {
                actor.state.insert(ActorState::IN_MID_AIR);
            }
        }
    }

    pub fn reset_to_spawn(&mut self) {
        if let Some(actor) = self.actor.as_mut() {
            self.pos_x = actor.spawn_pos_x;
            self.pos_y = actor.spawn_pos_y;
            actor.velocity_x = 0.0;
            actor.velocity_y = 0.0;
            self.update_bounding_box();
        }
    }
}
