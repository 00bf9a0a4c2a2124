use super::actors::render_actors;
use super::background::render_background;
use super::map::render_map;
use super::{select, LayerLevel, RenderLayer, View};
use crate::backend::{Backend, Flip};
use crate::camera::Camera;
use crate::error::EngineError;
use crate::map::Map;
use macroquad::color::BLACK;
use macroquad::math::Rect;

/// Logo size on screen and its distance from the bottom-right corner.
const LOGO_W: f32 = 48.0;
const LOGO_H: f32 = 14.0;
const LOGO_MARGIN_X: f32 = 53.0;
const LOGO_MARGIN_Y: f32 = 19.0;

/// Fills the five render targets for this frame.
pub(crate) fn render_scene<B: Backend>(
    backend: &mut B,
    map: Option<&mut Map<B::Texture>>,
    camera: &Camera,
    view: View,
) -> Result<(), EngineError> {
    let Some(map) = map else {
        return Ok(());
    };
    render_background(backend, map, camera, view)?;
    for level in LayerLevel::ALL {
        render_map(backend, map, camera, level, view)?;
        render_actors(backend, map, camera, level, view)?;
    }
    Ok(())
}

/// Copies the render targets onto the screen, back to front, and presents.
/// Without a map only the logo is shown.
pub(crate) fn draw_scene<B: Backend>(
    backend: &mut B,
    map: Option<&Map<B::Texture>>,
    hidden: &[bool; RenderLayer::COUNT],
    logo: Option<&B::Texture>,
    view: View,
) -> Result<(), EngineError> {
    select(backend, None)?;
    backend.clear(BLACK);

    let (lw, lh) = (view.logical_width as f32, view.logical_height as f32);
    match map {
        Some(map) => {
            let screen = Rect::new(0.0, 0.0, lw, lh);
            for layer in RenderLayer::ALL {
                if hidden[layer.index()] {
                    continue;
                }
                if let Some(target) = &map.render_targets[layer.index()] {
                    backend.copy(target, None, screen, Flip::NONE);
                }
            }
        }
        None => {
            if let Some(logo) = logo {
                let dst = Rect::new(lw - LOGO_MARGIN_X, lh - LOGO_MARGIN_Y, LOGO_W, LOGO_H);
                backend.copy(logo, None, dst, Flip::NONE);
            }
        }
    }

    backend.present();
    Ok(())
}
