//! The window value: backend ownership, frame timing, zoom and fullscreen.

use crate::backend::Backend;
use crate::config::WindowConfig;
use crate::core::Core;
use crate::error::EngineError;
use crate::render::{draw_scene, render_scene, View};
use anyhow::anyhow;
use log::{debug, info, warn};
use macroquad::input::KeyCode;
use std::collections::HashSet;

const FALLBACK_REFRESH_RATE: u32 = 60;

const LOGO_W: u32 = 24;
const LOGO_H: u32 = 7;
const LOGO_BG: [u8; 4] = [0x1d, 0x2b, 0x53, 0xff];
const LOGO_FG: [u8; 4] = [0xff, 0xf1, 0xe8, 0xff];

/// 3x5 glyphs spelling the logo text, one row per byte, high bit leftmost.
const LOGO_GLYPHS: [[u8; 5]; 5] = [
    [0b111, 0b010, 0b010, 0b010, 0b010], // T
    [0b111, 0b010, 0b010, 0b010, 0b111], // I
    [0b100, 0b100, 0b100, 0b100, 0b111], // L
    [0b111, 0b100, 0b110, 0b100, 0b111], // E
    [0b111, 0b100, 0b111, 0b001, 0b111], // S
];

fn logo_pixels() -> Vec<u8> {
    let mut pixels = LOGO_BG.repeat((LOGO_W * LOGO_H) as usize);
    for (n, glyph) in LOGO_GLYPHS.iter().enumerate() {
        let left = 2 + 4 * n as u32;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let i = (((1 + row as u32) * LOGO_W + left + col) * 4) as usize;
                pixels[i..i + 4].copy_from_slice(&LOGO_FG);
            }
        }
    }
    pixels
}

/// Owns the backend and everything tied to the screen.
pub struct Window<B: Backend> {
    backend: B,
    width: u32,
    height: u32,
    logical_width: u32,
    logical_height: u32,
    refresh_rate: u32,
    zoom_level: f64,
    time_a: u64,
    time_b: u64,
    time_since_last_frame: f64,
    vsync: bool,
    is_fullscreen: bool,
    saved_position: (i32, i32),
    logo: Option<B::Texture>,
}

impl<B: Backend> Window<B> {
    /// Takes ownership of `backend` and applies `config`.
    ///
    /// A host that cannot report its refresh rate gets 60 Hz with the
    /// frame delay done by the engine instead of vsync.
    pub fn new(config: &WindowConfig, mut backend: B) -> Result<Self, EngineError> {
        if config.logical_width == 0 || config.logical_height == 0 {
            return Err(EngineError::critical(anyhow!("logical size must not be zero")));
        }

        let mut vsync = config.enable_vsync;
        let mut refresh_rate = backend.display_refresh_rate();
        if refresh_rate == 0 {
            refresh_rate = FALLBACK_REFRESH_RATE;
            vsync = false;
        }

        let (width, height) = (config.width, config.height);
        let zoom_level = height as f64 / config.logical_height as f64;
        backend.set_logical_size(config.logical_width, config.logical_height);

        let logo = backend
            .create_texture_from_rgba(LOGO_W, LOGO_H, &logo_pixels())
            .map_err(|e| {
                log::error!(target: "tilescroll::window", "{:#}", e);
                EngineError::critical(e.context("creating logo texture"))
            })?;

        let ticks = backend.ticks_ms();
        let mut window = Self {
            backend,
            width,
            height,
            logical_width: config.logical_width,
            logical_height: config.logical_height,
            refresh_rate,
            zoom_level,
            time_a: ticks,
            time_b: ticks,
            time_since_last_frame: 0.0,
            vsync,
            is_fullscreen: false,
            saved_position: (0, 0),
            logo: Some(logo),
        };

        if config.enable_fullscreen {
            window.toggle_fullscreen()?;
        }

        info!(
            target: "tilescroll::window",
            "Setting up window at resolution {}x{} @ {} Hz (logical {}x{}, vsync {})",
            width,
            height,
            refresh_rate,
            window.logical_width,
            window.logical_height,
            if vsync { "on" } else { "off" }
        );
        Ok(window)
    }

    /// Frees the logo and hands the backend back.
    pub fn destroy(mut self) -> B {
        if let Some(logo) = self.logo.take() {
            self.backend.destroy_texture(logo);
        }
        info!(target: "tilescroll::window", "Quitting");
        self.backend
    }

    /// Scales the logical view so that `zoom` logical pixels fit one
    /// window pixel on each axis.
    pub fn set_zoom_level(&mut self, zoom: f64) -> Result<(), EngineError> {
        if zoom.is_nan() || zoom <= 0.0 {
            warn!(target: "tilescroll::window", "Ignoring zoom level {}", zoom);
            return Err(EngineError::warning(anyhow!("zoom level must be positive")));
        }
        let logical_width = (self.width as f64 / zoom) as u32;
        let logical_height = (self.height as f64 / zoom) as u32;
        if logical_width == 0 || logical_height == 0 {
            return Err(EngineError::warning(anyhow!(
                "zoom level {} leaves no logical pixels",
                zoom
            )));
        }
        self.zoom_level = zoom;
        self.logical_width = logical_width;
        self.logical_height = logical_height;
        self.backend.set_logical_size(logical_width, logical_height);
        debug!(
            target: "tilescroll::window",
            "Zoom {} gives logical size {}x{}",
            zoom,
            logical_width,
            logical_height
        );
        Ok(())
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    /// Switches between windowed and fullscreen. The window position is
    /// remembered on the way in and restored on the way out.
    pub fn toggle_fullscreen(&mut self) -> Result<(), EngineError> {
        let fullscreen = !self.is_fullscreen;
        if fullscreen {
            self.saved_position = self.backend.window_position();
        }
        self.backend.set_fullscreen(fullscreen).map_err(|e| {
            warn!(target: "tilescroll::window", "{:#}", e);
            EngineError::warning(e)
        })?;
        if !fullscreen {
            let (x, y) = self.saved_position;
            self.backend.set_window_position(x, y);
        }
        self.is_fullscreen = fullscreen;
        info!(
            target: "tilescroll::window",
            "{}",
            if fullscreen { "Set fullscreen mode" } else { "Set windowed mode" }
        );
        Ok(())
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    /// Renders and presents one frame.
    ///
    /// Measures the frame time first, sleeping the rest of the frame when
    /// vsync is off. While the core is paused the scene is drawn with a
    /// zero time step.
    pub fn show_scene(&mut self, core: &mut Core<B>) -> Result<(), EngineError> {
        self.time_b = self.time_a;
        self.time_a = self.backend.ticks_ms();
        if self.time_a < self.time_b {
            self.time_a = self.time_b;
        }

        let frame_ms = 1000.0 / self.refresh_rate as f64;
        let delta_ms = (frame_ms - (self.time_a - self.time_b) as f64 / 1000.0).max(0.0);
        if !self.vsync {
            self.backend.delay(delta_ms.floor() as u64);
        }
        self.time_since_last_frame = delta_ms / 1000.0;

        let view = View {
            logical_width: self.logical_width,
            logical_height: self.logical_height,
            dt: if core.is_paused {
                0.0
            } else {
                self.time_since_last_frame
            },
        };

        render_scene(&mut self.backend, core.map.as_mut(), &core.camera, view)?;
        draw_scene(
            &mut self.backend,
            core.map.as_ref(),
            &core.hidden,
            self.logo.as_ref(),
            view,
        )
    }

    /// Seconds the last frame took.
    pub fn time_since_last_frame(&self) -> f64 {
        self.time_since_last_frame
    }

    /// Keys currently held.
    pub fn keyboard_state(&self) -> HashSet<KeyCode> {
        self.backend.keyboard_state()
    }

    pub fn logical_size(&self) -> (u32, u32) {
        (self.logical_width, self.logical_height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    pub fn is_vsync_enabled(&self) -> bool {
        self.vsync
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn window(refresh: u32) -> Window<HeadlessBackend> {
        let backend = HeadlessBackend::new(640, 360).with_refresh_rate(refresh);
        Window::new(&WindowConfig::default(), backend).expect("window")
    }

    #[test]
    fn logo_spells_on_brand_background() {
        let pixels = logo_pixels();
        assert_eq!(pixels.len(), (LOGO_W * LOGO_H * 4) as usize);
        assert_eq!(&pixels[0..4], &LOGO_BG);
        // Top-left corner of the first glyph.
        let i = ((LOGO_W + 2) * 4) as usize;
        assert_eq!(&pixels[i..i + 4], &LOGO_FG);
    }

    #[test]
    fn zero_refresh_rate_falls_back_without_vsync() {
        let w = window(0);
        assert_eq!(w.refresh_rate(), 60);
        assert!(!w.is_vsync_enabled());
    }

    #[test]
    fn initial_zoom_follows_height() {
        let w = window(60);
        assert!((w.zoom_level() - 360.0 / 216.0).abs() < 1e-9);
        assert_eq!(w.backend().logical_size(), (384, 216));
    }

    #[test]
    fn zoom_rescales_logical_size() {
        let mut w = window(60);
        w.set_zoom_level(2.0).expect("zoom");
        assert_eq!(w.zoom_level(), 2.0);
        assert_eq!(w.logical_size(), (320, 180));
        assert_eq!(w.backend().logical_size(), (320, 180));
        assert!(w.set_zoom_level(0.0).is_err());
        assert_eq!(w.zoom_level(), 2.0);
    }

    #[test]
    fn fullscreen_round_trip_restores_position() {
        let mut w = window(60);
        w.backend_mut().set_window_position(40, 30);
        w.toggle_fullscreen().expect("enter");
        assert!(w.backend().is_fullscreen());
        w.backend_mut().set_window_position(0, 0);
        w.toggle_fullscreen().expect("leave");
        assert!(!w.is_fullscreen());
        assert_eq!(w.backend().window_position(), (40, 30));
    }

    #[test]
    fn destroy_releases_logo() {
        let w = window(60);
        assert_eq!(w.backend().live_textures(), 1);
        let backend = w.destroy();
        assert_eq!(backend.live_textures(), 0);
    }
}
