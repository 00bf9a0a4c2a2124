//! A loaded map: decoded handle, entity table, GPU resources and the
//! tile-flag grid.
//!
//! [`Map::load`] fills every table from an [`IrMap`] in a fixed order. When
//! any step fails, everything acquired so far is released again before the
//! error is returned, so a half-loaded map never escapes.

use crate::actor::{Actor, ActorState, Animation, Depth, Entity, Motion};
use crate::background::{Alignment, Background, BackgroundLayer};
use crate::backend::{Backend, Flip};
use crate::error::EngineError;
use crate::hash::{self, *};
use crate::ir_map::{Gid, IrMap, IrObject, IrTileset, Properties, PropertyValue};
use crate::properties::{PropertyBinder, PropertySource};
use crate::render::{LayerLevel, RenderLayer};
use anyhow::anyhow;
use bitflags::bitflags;
use log::{debug, info, warn};
use macroquad::math::Rect;
use std::path::{Path, PathBuf};

bitflags! {
    /// Collision hints attached to a tile through its custom properties.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct TileFlags: u8 {
        const CLIMBABLE = 1 << 0;
        const SOLID_ABOVE = 1 << 1;
        const SOLID_BELOW = 1 << 2;
        const SOLID_LEFT = 1 << 3;
        const SOLID_RIGHT = 1 << 4;
    }
}

const TILE_FLAG_PROPERTIES: [(u64, TileFlags); 5] = [
    (H_CLIMBABLE, TileFlags::CLIMBABLE),
    (H_SOLID_ABOVE, TileFlags::SOLID_ABOVE),
    (H_SOLID_BELOW, TileFlags::SOLID_BELOW),
    (H_SOLID_LEFT, TileFlags::SOLID_LEFT),
    (H_SOLID_RIGHT, TileFlags::SOLID_RIGHT),
];

/// A tileset with its image on the GPU.
#[derive(Debug)]
pub struct Tileset<T> {
    pub(crate) first_gid: u32,
    pub(crate) tile_w: u32,
    pub(crate) tile_h: u32,
    pub(crate) columns: u32,
    pub(crate) spacing: u32,
    pub(crate) margin: u32,
    pub(crate) texture: T,
}

impl<T> Tileset<T> {
    /// Source rectangle of a local tile id on the tileset image.
    pub(crate) fn src_rect(&self, local_id: u32) -> Rect {
        let cols = self.columns.max(1);
        let col = local_id % cols;
        let row = local_id / cols;
        let sx = self.margin + col * (self.tile_w + self.spacing);
        let sy = self.margin + row * (self.tile_h + self.spacing);
        Rect::new(sx as f32, sy as f32, self.tile_w as f32, self.tile_h as f32)
    }
}

/// One animated cell on a background-level tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedTile {
    pub(crate) tileset: usize,
    /// Local id of the tile that owns the animation.
    pub(crate) base_id: u32,
    /// Local id currently shown.
    pub(crate) id: u32,
    pub(crate) dst_x: f64,
    pub(crate) dst_y: f64,
    pub(crate) current_frame: usize,
    pub(crate) animation_length: usize,
    /// Mirroring from the cell's gid.
    pub(crate) flip: Flip,
}

impl AnimatedTile {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn flip(&self) -> Flip {
        self.flip
    }
}

/// World constants the simulator reads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapMetrics {
    /// Map width in pixels.
    pub width: f64,
    pub height: f64,
    pub tile_width: f64,
    pub tile_height: f64,
    pub gravitation: f64,
    pub meter_in_pixel: f64,
}

pub struct Map<T> {
    pub(crate) handle: IrMap,
    pub(crate) path: PathBuf,
    pub(crate) tilesets: Vec<Tileset<T>>,
    pub(crate) entities: Vec<Entity>,
    pub(crate) sprites: Vec<T>,
    pub(crate) animated_tiles: Vec<AnimatedTile>,
    pub(crate) background: Background<T>,
    pub(crate) tile_properties: Vec<TileFlags>,
    pub(crate) metrics: MapMetrics,
    pub(crate) animated_tile_fps: u32,
    pub(crate) time_since_last_anim_frame: f64,
    pub(crate) render_targets: [Option<T>; RenderLayer::COUNT],
    pub(crate) layer_textures: [Option<T>; LayerLevel::COUNT],
    pub(crate) animated_tile_texture: Option<T>,
    pub(crate) binder: PropertyBinder,
    pub(crate) player: Option<usize>,
    pub(crate) pos_x: f64,
    pub(crate) pos_y: f64,
}

impl<T> Map<T> {
    fn empty(handle: IrMap, path: PathBuf) -> Self {
        Self {
            handle,
            path,
            tilesets: Vec::new(),
            entities: Vec::new(),
            sprites: Vec::new(),
            animated_tiles: Vec::new(),
            background: Background::default(),
            tile_properties: Vec::new(),
            metrics: MapMetrics::default(),
            animated_tile_fps: 0,
            time_since_last_anim_frame: 0.0,
            render_targets: Default::default(),
            layer_textures: Default::default(),
            animated_tile_texture: None,
            binder: PropertyBinder::new(),
            player: None,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }

    /// Builds every table and GPU resource for a decoded map.
    ///
    /// `map_dir` is the directory tileset, sprite-sheet and background paths
    /// are resolved against. `view_width` sizes background layer textures.
    /// `refresh_rate` caps the animated-tile fps.
    pub fn load<B>(
        handle: IrMap,
        map_dir: &Path,
        backend: &mut B,
        view_width: u32,
        refresh_rate: u32,
    ) -> Result<Self, EngineError>
    where
        B: Backend<Texture = T>,
    {
        let mut map = Self::empty(handle, map_dir.to_path_buf());
        match map.populate(backend, view_width, refresh_rate) {
            Ok(()) => Ok(map),
            Err(err) => {
                map.unload(backend);
                Err(err)
            }
        }
    }

    fn populate<B>(
        &mut self,
        backend: &mut B,
        view_width: u32,
        refresh_rate: u32,
    ) -> Result<(), EngineError>
    where
        B: Backend<Texture = T>,
    {
        if self.handle.width == 0 || self.handle.height == 0 {
            return Err(EngineError::warning(anyhow!("map has no tiles")));
        }
        if self.handle.tile_w == 0 || self.handle.tile_h == 0 {
            return Err(EngineError::warning(anyhow!("map tile size is zero")));
        }

        // Actor motion depends on the map's gravitation, so map-level
        // properties are bound before entities.
        self.bind_map_properties(refresh_rate);
        self.load_entities();
        self.load_tilesets(backend)?;
        self.load_sprites(backend)?;
        self.load_animated_tiles();
        self.load_background(backend, view_width)?;
        self.load_tile_properties();

        info!(
            target: "tilescroll::map",
            "Loaded {}x{} map: {} entities, {} sprite sheets, {} animated tiles, {} background layers",
            self.metrics.width,
            self.metrics.height,
            self.entities.len(),
            self.sprites.len(),
            self.animated_tiles.len(),
            self.background.layers.len()
        );
        Ok(())
    }

    fn bind_map_properties(&mut self, refresh_rate: u32) {
        let props = &self.handle.properties;
        let binder = &mut self.binder;

        self.metrics = MapMetrics {
            width: self.handle.pixel_width() as f64,
            height: self.handle.pixel_height() as f64,
            tile_width: self.handle.tile_w as f64,
            tile_height: self.handle.tile_h as f64,
            gravitation: binder.decimal_property(H_GRAVITATION, props),
            meter_in_pixel: binder.integer_property(H_METER_IN_PIXEL, props) as f64,
        };

        let fps = binder.integer_property(H_ANIMATED_TILE_FPS, props).max(0) as u32;
        self.animated_tile_fps = fps.min(refresh_rate);
        if fps > refresh_rate {
            debug!(
                target: "tilescroll::map",
                "animated_tile_fps {} capped to refresh rate {}", fps, refresh_rate
            );
        }

        let bg = &mut self.background;
        bg.layer_shift = binder.decimal_property(H_BACKGROUND_LAYER_SHIFT, props);
        bg.velocity = binder.decimal_property(H_BACKGROUND_CONSTANT_VELOCITY, props);
        bg.velocity_is_constant = bg.velocity > 0.0;
        bg.alignment = if binder.boolean_property(H_BACKGROUND_IS_TOP_ALIGNED, props) {
            Alignment::Top
        } else {
            Alignment::Bottom
        };

        debug!(
            target: "tilescroll::map",
            "gravitation {} m/s², {} px per meter",
            self.metrics.gravitation,
            self.metrics.meter_in_pixel
        );
    }

    fn load_entities(&mut self) {
        let tile_w = self.handle.tile_w as f64;
        let tile_h = self.handle.tile_h as f64;
        let gravitation = self.metrics.gravitation;

        let mut entities = Vec::new();
        let mut player = None;
        for object in self.handle.objects() {
            let index = entities.len();
            let props = &object.properties;

            let width = self.binder.integer_property(H_WIDTH, props);
            let height = self.binder.integer_property(H_HEIGHT, props);
            let mut entity = Entity::new(
                object.x,
                object.y,
                if width > 0 { width as f64 } else { tile_w },
                if height > 0 { height as f64 } else { tile_h },
            );
            entity.id = object.id;
            entity.name = object.name.clone();

            if hash::hash(&object.class_name) == H_ACTOR {
                let actor = build_actor(&mut self.binder, object, gravitation);
                if player.is_none() && self.binder.boolean_property(H_IS_PLAYER, props) {
                    player = Some(index);
                    info!(target: "tilescroll::map", "  {} {} *", index, object.name);
                } else {
                    info!(target: "tilescroll::map", "  {} {}", index, object.name);
                }
                entity.actor = Some(actor);
            }
            entities.push(entity);
        }

        if player.is_none() {
            warn!(target: "tilescroll::map", "No player actor found.");
        }
        self.entities = entities;
        self.player = player;
    }

    fn load_tilesets<B>(&mut self, backend: &mut B) -> Result<(), EngineError>
    where
        B: Backend<Texture = T>,
    {
        for ts in &self.handle.tilesets {
            let image_path = tileset_image_path(&self.path, ts)?;
            let texture = backend
                .load_texture(&image_path)
                .map_err(EngineError::warning)?;
            debug!(target: "tilescroll::map", "tileset {} from {}", ts.name, image_path.display());
            self.tilesets.push(Tileset {
                first_gid: ts.first_gid,
                tile_w: ts.tile_w,
                tile_h: ts.tile_h,
                columns: ts.columns,
                spacing: ts.spacing,
                margin: ts.margin,
                texture,
            });
        }
        Ok(())
    }

    fn load_sprites<B>(&mut self, backend: &mut B) -> Result<(), EngineError>
    where
        B: Backend<Texture = T>,
    {
        for file in numbered_strings(&mut self.binder, &self.handle, "sprite_sheet") {
            let path = self.path.join(&file);
            let texture = backend.load_texture(&path).map_err(EngineError::warning)?;
            self.sprites.push(texture);
        }
        if self.sprites.is_empty() {
            debug!(target: "tilescroll::map", "map has no sprite sheets");
        }
        Ok(())
    }

    fn load_animated_tiles(&mut self) {
        let mut tiles = Vec::new();
        for layer in self.handle.tile_layers() {
            if !layer.visible
                || self.binder.boolean_property(H_IS_IN_FOREGROUND, &layer.properties)
            {
                continue;
            }
            for cell in layer.cells() {
                let Some((ts, local)) = self.handle.tileset_for_gid(cell.gid) else {
                    continue;
                };
                let tileset = &self.handle.tilesets[ts];
                let Some(first) = tileset.tile(local).and_then(|t| t.animation.first()) else {
                    continue;
                };
                let length = tileset.tile(local).map_or(0, |t| t.animation.len());
                tiles.push(AnimatedTile {
                    tileset: ts,
                    base_id: local,
                    id: first.tile_id,
                    dst_x: cell.x as f64 * self.metrics.tile_width + layer.offset.x as f64,
                    dst_y: cell.y as f64 * self.metrics.tile_height + layer.offset.y as f64,
                    current_frame: 0,
                    animation_length: length,
                    flip: Flip {
                        horizontal: cell.gid.flip_h(),
                        vertical: cell.gid.flip_v(),
                    },
                });
            }
        }
        debug!(target: "tilescroll::map", "{} animated tiles", tiles.len());
        self.animated_tiles = tiles;
    }

    fn load_background<B>(&mut self, backend: &mut B, view_width: u32) -> Result<(), EngineError>
    where
        B: Backend<Texture = T>,
    {
        for file in numbered_strings(&mut self.binder, &self.handle, "background_layer") {
            let path = self.path.join(&file);
            let layer = BackgroundLayer::build(backend, &path, view_width)?;
            self.background.layers.push(layer);
        }
        Ok(())
    }

    fn load_tile_properties(&mut self) {
        let width = self.handle.width as usize;
        let mut grid = vec![TileFlags::empty(); width * self.handle.height as usize];

        for layer in self.handle.tile_layers() {
            for cell in layer.cells() {
                let Some((ts, local)) = self.handle.tileset_for_gid(cell.gid) else {
                    continue;
                };
                let Some(tile) = self.handle.tilesets[ts].tile(local) else {
                    continue;
                };
                let Some(slot) = grid.get_mut(cell.y * width + cell.x) else {
                    continue;
                };
                for (name, flag) in TILE_FLAG_PROPERTIES {
                    if self.binder.boolean_property(name, &tile.properties) {
                        slot.insert(flag);
                    }
                }
            }
        }
        self.tile_properties = grid;
    }

    /// Releases every GPU resource in reverse order of acquisition and
    /// empties all tables.
    pub fn unload<B>(&mut self, backend: &mut B)
    where
        B: Backend<Texture = T>,
    {
        if let Some(tex) = self.animated_tile_texture.take() {
            backend.destroy_texture(tex);
        }
        for slot in self.layer_textures.iter_mut().rev() {
            if let Some(tex) = slot.take() {
                backend.destroy_texture(tex);
            }
        }
        for slot in self.render_targets.iter_mut().rev() {
            if let Some(tex) = slot.take() {
                backend.destroy_texture(tex);
            }
        }
        self.tile_properties.clear();
        self.background.destroy(backend);
        self.animated_tiles.clear();
        while let Some(tex) = self.sprites.pop() {
            backend.destroy_texture(tex);
        }
        while let Some(ts) = self.tilesets.pop() {
            backend.destroy_texture(ts.texture);
        }
        self.entities.clear();
        self.player = None;
        self.time_since_last_anim_frame = 0.0;
    }

    /// Map size in pixels.
    pub fn size(&self) -> (f64, f64) {
        (self.metrics.width, self.metrics.height)
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.handle.tile_w, self.handle.tile_h)
    }

    pub fn metrics(&self) -> &MapMetrics {
        &self.metrics
    }

    pub fn handle(&self) -> &IrMap {
        &self.handle
    }

    /// Directory resources are resolved against.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    /// Index of the first actor flagged `is_player`.
    pub fn player(&self) -> Option<usize> {
        self.player
    }

    pub fn sprite_sheet_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn animated_tiles(&self) -> &[AnimatedTile] {
        &self.animated_tiles
    }

    pub fn animated_tile_fps(&self) -> u32 {
        self.animated_tile_fps
    }

    pub fn background(&self) -> &Background<T> {
        &self.background
    }

    pub fn gravitation(&self) -> f64 {
        self.metrics.gravitation
    }

    pub fn meter_in_pixel(&self) -> f64 {
        self.metrics.meter_in_pixel
    }

    /// Flags of the tile under a map pixel. Empty outside the map.
    pub fn tile_flags_at(&self, x: f64, y: f64) -> TileFlags {
        if x < 0.0 || y < 0.0 {
            return TileFlags::empty();
        }
        let col = (x / self.metrics.tile_width) as usize;
        let row = (y / self.metrics.tile_height) as usize;
        let width = self.handle.width as usize;
        if col >= width || row >= self.handle.height as usize {
            return TileFlags::empty();
        }
        self.tile_properties
            .get(row * width + col)
            .copied()
            .unwrap_or_default()
    }

    /// Whether the tile under the entity's feet carries `flag`.
    pub fn is_entity_on_tile_with(&self, entity: usize, flag: TileFlags) -> bool {
        self.entities.get(entity).is_some_and(|e| {
            self.tile_flags_at(e.pos_x, e.pos_y + e.height / 2.0)
                .contains(flag)
        })
    }

    /// Local id the next frame of an animated tile shows.
    pub(crate) fn next_animated_tile_id(&self, tile: &AnimatedTile) -> u32 {
        self.handle
            .tilesets
            .get(tile.tileset)
            .and_then(|ts| ts.tile(tile.base_id))
            .and_then(|t| t.animation.get(tile.current_frame))
            .map_or(tile.id, |frame| frame.tile_id)
    }

    /// Looks a custom property up on the map, a layer, an object or a tile.
    pub fn property(&self, source: PropertySource, name: &str) -> Option<&PropertyValue> {
        source.resolve(&self.handle)?.find_hash(hash::hash(name))
    }

    pub(crate) fn tileset_for_gid(&self, gid: Gid) -> Option<(&Tileset<T>, u32)> {
        let (i, local) = self.handle.tileset_for_gid(gid)?;
        self.tilesets.get(i).map(|ts| (ts, local))
    }
}

/// `map_dir` + optional tileset subdirectory + image file.
fn tileset_image_path(map_dir: &Path, ts: &IrTileset) -> Result<PathBuf, EngineError> {
    if ts.image.is_empty() {
        return Err(EngineError::warning(anyhow!(
            "tileset '{}' has no image",
            ts.name
        )));
    }
    let mut path = map_dir.to_path_buf();
    if let Some(dir) = &ts.source_dir {
        path.push(dir);
    }
    path.push(&ts.image);
    Ok(path)
}

/// Values of `<prefix>_1`, `<prefix>_2`, ... up to the first gap.
fn numbered_strings(binder: &mut PropertyBinder, map: &IrMap, prefix: &str) -> Vec<String> {
    let mut found = Vec::new();
    for n in 1.. {
        let value = binder.string_property(hash::hash(&format!("{prefix}_{n}")), &map.properties);
        if value.is_empty() {
            break;
        }
        found.push(value.to_owned());
    }
    found
}

fn build_actor(binder: &mut PropertyBinder, object: &IrObject, gravitation: f64) -> Actor {
    let props = &object.properties;
    let mut actor = Actor {
        acceleration: binder.decimal_property(H_ACCELERATION, props),
        jumping_power: binder.decimal_property(H_JUMPING_POWER, props),
        max_velocity_x: binder.decimal_property(H_MAX_VELOCITY_X, props),
        sprite_sheet_id: binder.integer_property(H_SPRITE_SHEET_ID, props).max(0) as usize,
        connect_horizontal_map_ends: binder
            .boolean_property(H_CONNECT_HORIZONTAL_MAP_ENDS, props),
        connect_vertical_map_ends: binder.boolean_property(H_CONNECT_VERTICAL_MAP_ENDS, props),
        spawn_pos_x: object.x,
        spawn_pos_y: object.y,
        current_animation: 1,
        ..Default::default()
    };

    let max_velocity_y = binder.decimal_property(H_MAX_VELOCITY_Y, props);
    actor.max_velocity_y = if max_velocity_y > 0.0 {
        max_velocity_y
    } else {
        actor.max_velocity_x
    };

    actor.motion = if gravitation > 0.0 && binder.boolean_property(H_IS_AFFECTED_BY_GRAVITY, props)
    {
        Motion::Gravitational
    } else {
        Motion::Floating
    };

    actor.depth = if binder.boolean_property(H_IS_IN_MIDGROUND, props) {
        Depth::Midground
    } else if binder.boolean_property(H_IS_IN_BACKGROUND, props) {
        Depth::Background
    } else {
        Depth::Foreground
    };

    if binder.boolean_property(H_IS_LEFT_ORIENTED, props) {
        actor.state |= ActorState::GOING_LEFT | ActorState::LOOKING_LEFT;
    } else {
        actor.state |= ActorState::GOING_RIGHT | ActorState::LOOKING_RIGHT;
    }
    if binder.boolean_property(H_IS_MOVING, props) {
        actor.state.insert(ActorState::MOVING);
    }
    if binder.boolean_property(H_IS_ANIMATED, props) {
        actor.state.insert(ActorState::ANIMATED);
        actor.animations = load_animations(binder, props);
    }
    actor
}

fn load_animations(binder: &mut PropertyBinder, props: &Properties) -> Vec<Animation> {
    let mut count = 0;
    while binder.boolean_property(hash::hash(&format!("animation_{}", count + 1)), props) {
        count += 1;
    }

    (1..=count)
        .map(|n| {
            let mut int = |field: &str| {
                binder
                    .integer_property(hash::hash(&format!("animation_{n}_{field}")), props)
                    .max(0) as u32
            };
            let first_frame = int("first_frame");
            Animation {
                first_frame: if first_frame == 0 { 1 } else { first_frame },
                fps: int("fps"),
                length: int("length"),
                offset_y: int("offset_y"),
            }
        })
        .collect()
}
