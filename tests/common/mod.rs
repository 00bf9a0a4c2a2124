#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tilescroll::{Core, HeadlessBackend, Window, WindowConfig};

pub const MAP_W: usize = 64;
pub const MAP_H: usize = 32;
pub const TILE: u32 = 16;
/// Gid of the three-frame animated tile.
pub const ANIMATED_GID: u32 = 5;
/// Tiled's horizontal-flip bit on a gid.
pub const FLIP_H: u32 = 0x8000_0000;
/// Gid of a tile with `solid_above`.
pub const SOLID_GID: u32 = 2;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock went backwards")
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("tilescroll_{name}_{nanos}_{n}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create image dir");
    }
    image::RgbaImage::from_pixel(width, height, image::Rgba([40, 80, 120, 255]))
        .save(path)
        .expect("write png");
}

fn prop(name: &str, kind: &str, value: Value) -> Value {
    json!({ "name": name, "type": kind, "value": value })
}

/// Knobs for the generated test map.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub animated_tile_fps: i64,
    pub gravitation: f64,
    pub with_player: bool,
    pub player_at: (f64, f64),
    pub sprite_sheet: Option<String>,
    pub background_layer: Option<String>,
    pub write_sprite: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            animated_tile_fps: 10,
            gravitation: 9.81,
            with_player: true,
            player_at: (200.0, 150.0),
            sprite_sheet: Some("sprites/hero.png".into()),
            background_layer: Some("backgrounds/hills.png".into()),
            write_sprite: true,
        }
    }
}

impl Fixture {
    /// Writes the map, its tileset image and referenced images into a fresh
    /// directory and returns the map path.
    pub fn write(&self, name: &str) -> PathBuf {
        let dir = temp_dir(name);
        write_png(&dir.join("tilesets/world.png"), 64, 32);
        if let (Some(sheet), true) = (&self.sprite_sheet, self.write_sprite) {
            write_png(&dir.join(sheet), 128, 64);
        }
        if let Some(bg) = &self.background_layer {
            write_png(&dir.join(bg), 100, 60);
        }

        let mut ground = vec![0u32; MAP_W * MAP_H];
        for col in 0..MAP_W {
            ground[(MAP_H - 1) * MAP_W + col] = SOLID_GID;
        }
        ground[(MAP_H - 2) * MAP_W + 3] = ANIMATED_GID;
        ground[(MAP_H - 2) * MAP_W + 9] = ANIMATED_GID | FLIP_H;

        let mut canopy = vec![0u32; MAP_W * MAP_H];
        canopy[4 * MAP_W + 10] = 3 | FLIP_H;

        let mut map_props = vec![
            prop("gravitation", "float", json!(self.gravitation)),
            prop("meter_in_pixel", "int", json!(16)),
            prop("animated_tile_fps", "int", json!(self.animated_tile_fps)),
            prop("background_layer_shift", "float", json!(0.5)),
        ];
        if let Some(sheet) = &self.sprite_sheet {
            map_props.push(prop("sprite_sheet_1", "string", json!(sheet)));
        }
        if let Some(bg) = &self.background_layer {
            map_props.push(prop("background_layer_1", "string", json!(bg)));
        }

        let mut objects = vec![json!({
            "id": 2,
            "name": "sign",
            "type": "decoration",
            "x": 320.0,
            "y": 480.0,
            "width": 16.0,
            "height": 16.0
        })];
        if self.with_player {
            objects.insert(
                0,
                json!({
                    "id": 1,
                    "name": "hero",
                    "type": "actor",
                    "x": self.player_at.0,
                    "y": self.player_at.1,
                    "properties": [
                        prop("is_player", "bool", json!(true)),
                        prop("is_affected_by_gravity", "bool", json!(true)),
                        prop("acceleration", "float", json!(8.0)),
                        prop("max_velocity_x", "float", json!(3.0)),
                        prop("jumping_power", "float", json!(6.0)),
                        prop("sprite_sheet_id", "int", json!(1)),
                        prop("width", "int", json!(16)),
                        prop("height", "int", json!(32)),
                        prop("is_animated", "bool", json!(true)),
                        prop("animation_1", "bool", json!(true)),
                        prop("animation_1_length", "int", json!(4)),
                        prop("animation_1_fps", "int", json!(8)),
                    ]
                }),
            );
            objects.push(json!({
                "id": 3,
                "name": "bird",
                "type": "actor",
                "x": 600.0,
                "y": 100.0,
                "properties": [
                    prop("is_in_background", "bool", json!(true)),
                    prop("is_left_oriented", "bool", json!(true)),
                    prop("sprite_sheet_id", "int", json!(1)),
                ]
            }));
        }

        let map = json!({
            "width": MAP_W,
            "height": MAP_H,
            "tilewidth": TILE,
            "tileheight": TILE,
            "backgroundcolor": "#336699",
            "properties": map_props,
            "tilesets": [{
                "firstgid": 1,
                "name": "world",
                "tilewidth": TILE,
                "tileheight": TILE,
                "tilecount": 8,
                "columns": 4,
                "image": "tilesets/world.png",
                "tiles": [
                    {
                        "id": 1,
                        "properties": [prop("solid_above", "bool", json!(true))]
                    },
                    {
                        "id": 4,
                        "animation": [
                            { "tileid": 4, "duration": 100 },
                            { "tileid": 5, "duration": 100 },
                            { "tileid": 6, "duration": 100 }
                        ]
                    }
                ]
            }],
            "layers": [
                {
                    "type": "tilelayer",
                    "name": "ground",
                    "width": MAP_W,
                    "height": MAP_H,
                    "data": ground
                },
                {
                    "type": "tilelayer",
                    "name": "canopy",
                    "width": MAP_W,
                    "height": MAP_H,
                    "data": canopy,
                    "properties": [prop("is_in_foreground", "bool", json!(true))]
                },
                {
                    "type": "objectgroup",
                    "name": "entities",
                    "objects": objects
                }
            ]
        });

        let path = dir.join("level.json");
        fs::write(&path, serde_json::to_string_pretty(&map).expect("serialize map"))
            .expect("write map");
        path
    }
}

pub fn window_with_refresh(refresh: u32) -> Window<HeadlessBackend> {
    let backend = HeadlessBackend::new(640, 360).with_refresh_rate(refresh);
    Window::new(&WindowConfig::default(), backend).expect("window")
}

pub fn window() -> Window<HeadlessBackend> {
    window_with_refresh(60)
}

pub fn loaded(fixture: &Fixture, name: &str) -> (Window<HeadlessBackend>, Core<HeadlessBackend>) {
    let mut window = window();
    let mut core = Core::default();
    core.load_map(fixture.write(name), &mut window).expect("load map");
    (window, core)
}
