//! Scene compositor.
//!
//! Each frame draws into five cached render targets, each sized to the
//! logical view, and then copies them onto the screen in [`RenderLayer`]
//! order.

mod actors;
mod background;
mod map;
mod scene;

pub(crate) use self::scene::{draw_scene, render_scene};

use crate::backend::Backend;
use crate::error::EngineError;
use anyhow::anyhow;
use macroquad::color::Color;

/// Render targets in composition order, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Background,
    MapBackground,
    ActorBackground,
    MapForeground,
    ActorForeground,
}

impl RenderLayer {
    pub const COUNT: usize = 5;

    pub const ALL: [RenderLayer; RenderLayer::COUNT] = [
        RenderLayer::Background,
        RenderLayer::MapBackground,
        RenderLayer::ActorBackground,
        RenderLayer::MapForeground,
        RenderLayer::ActorForeground,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Tile layers and actors are split into two levels around which the map's
/// foreground is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerLevel {
    /// Tile layers without `is_in_foreground`; background-depth actors.
    Background,
    /// Tile layers with `is_in_foreground`; midground and foreground actors.
    Foreground,
}

impl LayerLevel {
    pub const COUNT: usize = 2;

    pub const ALL: [LayerLevel; LayerLevel::COUNT] = [LayerLevel::Background, LayerLevel::Foreground];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn map_layer(self) -> RenderLayer {
        match self {
            LayerLevel::Background => RenderLayer::MapBackground,
            LayerLevel::Foreground => RenderLayer::MapForeground,
        }
    }

    pub(crate) fn actor_layer(self) -> RenderLayer {
        match self {
            LayerLevel::Background => RenderLayer::ActorBackground,
            LayerLevel::Foreground => RenderLayer::ActorForeground,
        }
    }
}

/// Per-frame inputs every pass shares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct View {
    pub logical_width: u32,
    pub logical_height: u32,
    /// Seconds since the last frame; 0 while paused.
    pub dt: f64,
}

pub(crate) const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

/// `0xRRGGBB` to an opaque color.
pub(crate) fn rgb(color: u32) -> Color {
    Color::from_rgba(
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
        255,
    )
}

/// Returns the target in `slot`, creating it on first use and recreating it
/// when the requested size changed.
pub(crate) fn ensure_target<'a, B: Backend>(
    backend: &mut B,
    slot: &'a mut Option<B::Texture>,
    width: u32,
    height: u32,
) -> Result<&'a B::Texture, EngineError> {
    let stale = slot
        .as_ref()
        .is_some_and(|t| backend.texture_size(t) != (width, height));
    if stale {
        if let Some(old) = slot.take() {
            backend.destroy_texture(old);
        }
    }
    if slot.is_none() {
        let target = backend
            .create_target(width, height)
            .map_err(|e| EngineError::critical(e.context("creating render target")))?;
        *slot = Some(target);
    }
    slot.as_ref()
        .ok_or_else(|| EngineError::critical(anyhow!("render target missing")))
}

/// Selects a render target, escalating failures to critical.
pub(crate) fn select<B: Backend>(backend: &mut B, target: Option<&B::Texture>) -> Result<(), EngineError> {
    backend.set_target(target).map_err(|e| {
        log::error!(target: "tilescroll::render", "{:#}", e);
        EngineError::critical(e)
    })
}
