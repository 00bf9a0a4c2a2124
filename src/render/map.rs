use super::{ensure_target, select, LayerLevel, View, TRANSPARENT};
use crate::backend::{Backend, Flip};
use crate::camera::Camera;
use crate::error::EngineError;
use crate::hash::H_IS_IN_FOREGROUND;
use crate::map::Map;
use log::{info, trace};
use macroquad::math::Rect;

pub(super) fn render_map<B: Backend>(
    backend: &mut B,
    map: &mut Map<B::Texture>,
    camera: &Camera,
    level: LayerLevel,
    view: View,
) -> Result<(), EngineError> {
    let animate = level == LayerLevel::Background
        && map.animated_tile_fps > 0
        && !map.animated_tiles.is_empty();

    if animate {
        if map.animated_tile_texture.is_none() {
            let texture = create_map_sized(backend, map)?;
            map.animated_tile_texture = Some(texture);
            draw_animated_tiles(backend, map, false)?;
        }
        map.time_since_last_anim_frame += view.dt;
        if map.time_since_last_anim_frame >= 1.0 / map.animated_tile_fps as f64 {
            map.time_since_last_anim_frame = 0.0;
            draw_animated_tiles(backend, map, true)?;
        }
    }

    if map.layer_textures[level.index()].is_none() {
        let texture = rasterize_level(backend, map, level)?;
        map.layer_textures[level.index()] = Some(texture);
    }

    let target = ensure_target(
        backend,
        &mut map.render_targets[level.map_layer().index()],
        view.logical_width,
        view.logical_height,
    )?;
    select(backend, Some(target))?;
    backend.clear(TRANSPARENT);

    let (width, height) = map.size();
    let dst = Rect::new(
        (map.pos_x - camera.pos_x()).floor() as f32,
        (map.pos_y - camera.pos_y()).floor() as f32,
        width as f32,
        height as f32,
    );
    if let Some(texture) = &map.layer_textures[level.index()] {
        backend.copy(texture, None, dst, Flip::NONE);
    }
    if animate {
        if let Some(texture) = &map.animated_tile_texture {
            backend.copy(texture, None, dst, Flip::NONE);
        }
    }

    select(backend, None)
}

fn create_map_sized<B: Backend>(
    backend: &mut B,
    map: &Map<B::Texture>,
) -> Result<B::Texture, EngineError> {
    let (width, height) = map.size();
    backend
        .create_target(width as u32, height as u32)
        .map_err(|e| EngineError::critical(e.context("creating map texture")))
}

/// Draws every visible tile layer of `level` into a new map-sized texture.
fn rasterize_level<B: Backend>(
    backend: &mut B,
    map: &mut Map<B::Texture>,
    level: LayerLevel,
) -> Result<B::Texture, EngineError> {
    let foreground = level == LayerLevel::Foreground;
    let mut layers = Vec::new();
    for (i, layer) in map.handle.layers.iter().enumerate() {
        if layer.is_tile_layer()
            && layer.visible
            && map.binder.boolean_property(H_IS_IN_FOREGROUND, &layer.properties) == foreground
        {
            layers.push(i);
        }
    }

    let texture = create_map_sized(backend, map)?;
    if let Err(err) = select(backend, Some(&texture)) {
        backend.destroy_texture(texture);
        return Err(err);
    }
    backend.clear(TRANSPARENT);

    let (tile_w, tile_h) = map.tile_size();
    for &i in &layers {
        let layer = &map.handle.layers[i];
        for cell in layer.cells() {
            let Some((tileset, local)) = map.tileset_for_gid(cell.gid) else {
                continue;
            };
            let dst = Rect::new(
                (cell.x as u32 * tile_w) as f32 + layer.offset.x,
                (cell.y as u32 * tile_h) as f32 + layer.offset.y,
                tileset.tile_w as f32,
                tileset.tile_h as f32,
            );
            let flip = Flip {
                horizontal: cell.gid.flip_h(),
                vertical: cell.gid.flip_v(),
            };
            backend.copy(&tileset.texture, Some(tileset.src_rect(local)), dst, flip);
        }
        info!(target: "tilescroll::render", "Render map layer: {}", layer.name);
    }

    if let Err(err) = select(backend, None) {
        backend.destroy_texture(texture);
        return Err(err);
    }
    Ok(texture)
}

/// Redraws the animated-tile texture. With `advance`, every tile moves on
/// to its next frame after being drawn.
fn draw_animated_tiles<B: Backend>(
    backend: &mut B,
    map: &mut Map<B::Texture>,
    advance: bool,
) -> Result<(), EngineError> {
    let Some(texture) = &map.animated_tile_texture else {
        return Ok(());
    };
    select(backend, Some(texture))?;
    backend.clear(TRANSPARENT);

    for tile in &map.animated_tiles {
        let Some(tileset) = map.tilesets.get(tile.tileset) else {
            continue;
        };
        let dst = Rect::new(
            tile.dst_x as f32,
            tile.dst_y as f32,
            tileset.tile_w as f32,
            tileset.tile_h as f32,
        );
        backend.copy(&tileset.texture, Some(tileset.src_rect(tile.id)), dst, tile.flip);
    }

    if advance {
        for i in 0..map.animated_tiles.len() {
            let mut tile = map.animated_tiles[i].clone();
            tile.current_frame = (tile.current_frame + 1) % tile.animation_length.max(1);
            tile.id = map.next_animated_tile_id(&tile);
            map.animated_tiles[i] = tile;
        }
        trace!(target: "tilescroll::render", "stepped {} animated tiles", map.animated_tiles.len());
    }

    select(backend, None)
}
