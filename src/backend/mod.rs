//! The seam between the engine and whatever owns the GPU and the window.
//!
//! Every texture operation, clock read and event poll the engine performs
//! goes through [`Backend`]. [`MacroquadBackend`] drives a real window;
//! [`HeadlessBackend`] records operations for tests and display-less tools.

mod headless;
mod macroquad;

pub use self::headless::{HeadlessBackend, HeadlessTexture, Op};
pub use self::macroquad::{MacroquadBackend, MqTexture};

use ::macroquad::color::Color;
use ::macroquad::input::KeyCode;
use ::macroquad::math::Rect;
use std::collections::HashSet;
use std::path::Path;

/// Mirroring applied when copying a texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    pub const NONE: Flip = Flip {
        horizontal: false,
        vertical: false,
    };
    pub const HORIZONTAL: Flip = Flip {
        horizontal: true,
        vertical: false,
    };
}

/// Input and lifecycle events a backend reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Quit,
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    FingerDown { id: u64, x: f32, y: f32 },
    FingerUp { id: u64, x: f32, y: f32 },
    FingerMotion { id: u64, x: f32, y: f32 },
    /// Two or more fingers moving together; `x`/`y` is their centroid.
    MultiGesture { fingers: usize, x: f32, y: f32 },
}

/// Renderer and host services the engine needs.
///
/// Coordinates are logical pixels. When the render target is the screen
/// the backend scales the logical area to the window.
pub trait Backend {
    /// Handle to an image or render-target texture. Dropping a handle does
    /// not free GPU memory; pass it to [`Backend::destroy_texture`].
    type Texture;

    fn load_texture(&mut self, path: &Path) -> anyhow::Result<Self::Texture>;

    fn create_texture_from_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> anyhow::Result<Self::Texture>;

    /// A texture that can be drawn into with [`Backend::set_target`].
    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<Self::Texture>;

    fn texture_size(&self, texture: &Self::Texture) -> (u32, u32);

    /// `None` selects the screen.
    fn set_target(&mut self, target: Option<&Self::Texture>) -> anyhow::Result<()>;

    fn clear(&mut self, color: Color);

    /// `src: None` copies the whole texture.
    fn copy(&mut self, texture: &Self::Texture, src: Option<Rect>, dst: Rect, flip: Flip);

    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Milliseconds since the backend started.
    fn ticks_ms(&self) -> u64;

    fn delay(&mut self, ms: u64);

    /// Drains pending events.
    fn poll_events(&mut self) -> Vec<HostEvent>;

    fn keyboard_state(&self) -> HashSet<KeyCode>;

    /// Refresh rate in Hz; 0 when unknown.
    fn display_refresh_rate(&self) -> u32;

    fn window_size(&self) -> (u32, u32);

    fn set_logical_size(&mut self, width: u32, height: u32);

    fn set_fullscreen(&mut self, fullscreen: bool) -> anyhow::Result<()>;

    fn window_position(&self) -> (i32, i32);

    fn set_window_position(&mut self, x: i32, y: i32);

    /// Ends the frame's drawing. Hosts that own the swap (macroquad's
    /// `next_frame`) still await it themselves.
    fn present(&mut self);
}
