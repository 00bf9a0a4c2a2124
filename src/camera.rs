use crate::actor::Entity;

/// Viewport into the map, in map pixels.
///
/// While locked the camera centers on its target entity each frame. While
/// unlocked it only moves through [`Core::set_camera_position`]. Either way
/// the position is clamped to `[0, map - logical_size]` on both axes.
///
/// [`Core::set_camera_position`]: crate::Core::set_camera_position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Camera {
    pub(crate) pos_x: f64,
    pub(crate) pos_y: f64,
    pub(crate) max_pos_x: f64,
    pub(crate) max_pos_y: f64,
    pub(crate) target_entity_id: Option<usize>,
    pub(crate) is_locked: bool,
    pub(crate) is_at_horizontal_boundary: bool,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pos_x(&self) -> f64 {
        self.pos_x
    }

    pub fn pos_y(&self) -> f64 {
        self.pos_y
    }

    pub fn max_pos_x(&self) -> f64 {
        self.max_pos_x
    }

    pub fn max_pos_y(&self) -> f64 {
        self.max_pos_y
    }

    pub fn target(&self) -> Option<usize> {
        self.target_entity_id
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn is_at_horizontal_boundary(&self) -> bool {
        self.is_at_horizontal_boundary
    }

    pub fn lock(&mut self) {
        self.is_locked = true;
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    pub fn set_target(&mut self, entity: Option<usize>) {
        self.target_entity_id = entity;
    }

    /// Moves an unlocked camera. Relative moves are scaled by the frame
    /// time in milliseconds so speeds stay frame-rate independent.
    pub(crate) fn set_position(
        &mut self,
        x: f64,
        y: f64,
        relative: bool,
        time_since_last_frame: f64,
    ) {
        if self.is_locked {
            return;
        }
        if relative {
            let scale = time_since_last_frame * 1000.0;
            self.pos_x += x * scale;
            self.pos_y += y * scale;
        } else {
            self.pos_x = x;
            self.pos_y = y;
        }
    }

    /// Centers a locked camera on its target entity.
    pub(crate) fn move_to_target(
        &mut self,
        logical: (f64, f64),
        map_size: (f64, f64),
        entities: &[Entity],
    ) {
        if !self.is_locked {
            return;
        }
        let Some(target) = self.target_entity_id.and_then(|i| entities.get(i)) else {
            return;
        };
        if target.actor.is_none() {
            return;
        }
        self.pos_x = (target.pos_x - logical.0 / 2.0).max(0.0);
        self.pos_y = (target.pos_y - logical.1 / 2.0).max(0.0);
        self.clamp_to_map(logical, map_size);
    }

    /// Clamps both axes into `[0, map - logical]` and records whether the
    /// camera sits on the left or right edge.
    pub(crate) fn clamp_to_map(&mut self, logical: (f64, f64), map_size: (f64, f64)) {
        // Maps narrower than the view pin the camera at 0.
        self.max_pos_x = (map_size.0 - logical.0).max(0.0);
        self.max_pos_y = (map_size.1 - logical.1).max(0.0);
        self.is_at_horizontal_boundary = false;

        if self.pos_x <= 0.0 {
            self.pos_x = 0.0;
            self.is_at_horizontal_boundary = true;
        }
        if self.pos_y <= 0.0 {
            self.pos_y = 0.0;
        }
        if self.pos_x >= self.max_pos_x {
            self.pos_x = self.max_pos_x;
            self.is_at_horizontal_boundary = true;
        }
        if self.pos_y >= self.max_pos_y {
            self.pos_y = self.max_pos_y;
        }
    }
}
