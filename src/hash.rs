//! Property-name hashing.
//!
//! Names are compressed with djb2 (`hash = hash * 33 + byte`, seeded with
//! 5381, wrapping on overflow). The function is `const` so every name the
//! engine looks up is hashed at compile time. Keep the algorithm fixed:
//! offline tables depend on these exact values.

/// djb2 hash of `name`.
pub const fn djb2(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash: u64 = 5381;
    let mut i = 0;
    while i < bytes.len() {
        hash = hash.wrapping_mul(33).wrapping_add(bytes[i] as u64);
        i += 1;
    }
    hash
}

/// Hash of a runtime string; same algorithm as [`djb2`].
pub fn hash(name: &str) -> u64 {
    djb2(name)
}

pub const H_ACTOR: u64 = djb2("actor");
pub const H_ACCELERATION: u64 = djb2("acceleration");
pub const H_ANIMATED_TILE_FPS: u64 = djb2("animated_tile_fps");
pub const H_BACKGROUND_CONSTANT_VELOCITY: u64 = djb2("background_constant_velocity");
pub const H_BACKGROUND_IS_TOP_ALIGNED: u64 = djb2("background_is_top_aligned");
pub const H_BACKGROUND_LAYER_SHIFT: u64 = djb2("background_layer_shift");
pub const H_CLIMBABLE: u64 = djb2("climbable");
pub const H_CONNECT_HORIZONTAL_MAP_ENDS: u64 = djb2("connect_horizontal_map_ends");
pub const H_CONNECT_VERTICAL_MAP_ENDS: u64 = djb2("connect_vertical_map_ends");
pub const H_GRAVITATION: u64 = djb2("gravitation");
pub const H_HEIGHT: u64 = djb2("height");
pub const H_IS_AFFECTED_BY_GRAVITY: u64 = djb2("is_affected_by_gravity");
pub const H_IS_ANIMATED: u64 = djb2("is_animated");
pub const H_IS_IN_BACKGROUND: u64 = djb2("is_in_background");
pub const H_IS_IN_FOREGROUND: u64 = djb2("is_in_foreground");
pub const H_IS_IN_MIDGROUND: u64 = djb2("is_in_midground");
pub const H_IS_LEFT_ORIENTED: u64 = djb2("is_left_oriented");
pub const H_IS_MOVING: u64 = djb2("is_moving");
pub const H_IS_PLAYER: u64 = djb2("is_player");
pub const H_JUMPING_POWER: u64 = djb2("jumping_power");
pub const H_MAX_VELOCITY_X: u64 = djb2("max_velocity_x");
pub const H_MAX_VELOCITY_Y: u64 = djb2("max_velocity_y");
pub const H_METER_IN_PIXEL: u64 = djb2("meter_in_pixel");
pub const H_SOLID_ABOVE: u64 = djb2("solid_above");
pub const H_SOLID_BELOW: u64 = djb2("solid_below");
pub const H_SOLID_LEFT: u64 = djb2("solid_left");
pub const H_SOLID_RIGHT: u64 = djb2("solid_right");
pub const H_SPRITE_SHEET_ID: u64 = djb2("sprite_sheet_id");
pub const H_WIDTH: u64 = djb2("width");
pub const H_OBJECTGROUP: u64 = djb2("objectgroup");
pub const H_TILELAYER: u64 = djb2("tilelayer");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_published_table() {
        assert_eq!(H_ACTOR, 0x0000_0031_0f12_8ebe);
        assert_eq!(H_WIDTH, 0x0000_0031_10a3_b0a5);
        assert_eq!(H_HEIGHT, 0x0000_0653_01d6_88de);
        assert_eq!(H_CLIMBABLE, 0x0377_c455_420b_8600);
        assert_eq!(H_IS_PLAYER, 0x0377_cc44_78b1_6e8d);
        assert_eq!(H_IS_MOVING, 0x0377_cc44_71f3_7f30);
        assert_eq!(H_TILELAYER, 0x0377_d9f7_0e84_4fb0);
    }

    #[test]
    fn long_names_wrap_instead_of_overflowing() {
        assert_eq!(H_OBJECTGROUP, 0xc0b9_d518_970b_e349);
        assert_eq!(H_GRAVITATION, 0xc090_e5ec_1240_4d2d);
        assert_eq!(H_SPRITE_SHEET_ID, 0xe214_1daa_e50c_d180);
        assert_eq!(H_BACKGROUND_CONSTANT_VELOCITY, 0x1cb1_9bb1_5ad8_b7fc);
        assert_eq!(H_ANIMATED_TILE_FPS, 0xf16b_a347_de2d_ebdd);
    }

    #[test]
    fn runtime_hash_agrees_with_const() {
        let name = format!("sprite_sheet_{}", "id");
        assert_eq!(hash(&name), H_SPRITE_SHEET_ID);
        assert_eq!(djb2(""), 5381);
    }
}
