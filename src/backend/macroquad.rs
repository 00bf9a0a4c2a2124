use super::{Backend, Flip, HostEvent};
use anyhow::Context;
use macroquad::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// A macroquad image texture or render target.
pub enum MqTexture {
    Image(Texture2D),
    Target(RenderTarget),
}

impl MqTexture {
    fn texture(&self) -> &Texture2D {
        match self {
            MqTexture::Image(tex) => tex,
            MqTexture::Target(rt) => &rt.texture,
        }
    }
}

/// Draws through macroquad's global context. Create it inside the
/// `#[macroquad::main]` future.
pub struct MacroquadBackend {
    logical: (u32, u32),
    refresh_rate: u32,
    position: (i32, i32),
}

impl MacroquadBackend {
    /// macroquad exposes no refresh-rate query; 60 Hz is assumed unless
    /// set with [`MacroquadBackend::with_refresh_rate`].
    pub fn new() -> Self {
        prevent_quit();
        Self {
            logical: (screen_width() as u32, screen_height() as u32),
            refresh_rate: 60,
            position: (0, 0),
        }
    }

    pub fn with_refresh_rate(mut self, hz: u32) -> Self {
        self.refresh_rate = hz;
        self
    }
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MacroquadBackend {
    type Texture = MqTexture;

    fn load_texture(&mut self, path: &Path) -> anyhow::Result<MqTexture> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Loading texture {}", path.display()))?;
        let image = Image::from_file_with_format(&bytes, None)
            .map_err(|e| anyhow::anyhow!("{e:?}"))
            .with_context(|| format!("Decoding texture {}", path.display()))?;
        let tex = Texture2D::from_image(&image);
        tex.set_filter(FilterMode::Nearest);
        Ok(MqTexture::Image(tex))
    }

    fn create_texture_from_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> anyhow::Result<MqTexture> {
        let w = u16::try_from(width).context("texture width exceeds u16")?;
        let h = u16::try_from(height).context("texture height exceeds u16")?;
        anyhow::ensure!(
            pixels.len() == width as usize * height as usize * 4,
            "expected {}x{} RGBA pixels, got {} bytes",
            width,
            height,
            pixels.len()
        );
        let tex = Texture2D::from_rgba8(w, h, pixels);
        tex.set_filter(FilterMode::Nearest);
        Ok(MqTexture::Image(tex))
    }

    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<MqTexture> {
        anyhow::ensure!(width > 0 && height > 0, "render target must not be empty");
        let rt = render_target(width, height);
        rt.texture.set_filter(FilterMode::Nearest);
        Ok(MqTexture::Target(rt))
    }

    fn texture_size(&self, texture: &MqTexture) -> (u32, u32) {
        let tex = texture.texture();
        (tex.width() as u32, tex.height() as u32)
    }

    fn set_target(&mut self, target: Option<&MqTexture>) -> anyhow::Result<()> {
        match target {
            None => {
                set_camera(&Camera2D::from_display_rect(Rect::new(
                    0.0,
                    0.0,
                    self.logical.0 as f32,
                    self.logical.1 as f32,
                )));
            }
            Some(MqTexture::Target(rt)) => {
                let (w, h) = (rt.texture.width(), rt.texture.height());
                // Render targets are stored upside down relative to the screen.
                set_camera(&Camera2D {
                    zoom: vec2(2.0 / w, 2.0 / h),
                    target: vec2(w / 2.0, h / 2.0),
                    render_target: Some(rt.clone()),
                    ..Default::default()
                });
            }
            Some(MqTexture::Image(_)) => anyhow::bail!("image textures cannot be render targets"),
        }
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        clear_background(color);
    }

    fn copy(&mut self, texture: &MqTexture, src: Option<Rect>, dst: Rect, flip: Flip) {
        draw_texture_ex(
            texture.texture(),
            dst.x,
            dst.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(dst.w, dst.h)),
                source: src,
                flip_x: flip.horizontal,
                flip_y: flip.vertical,
                ..Default::default()
            },
        );
    }

    fn destroy_texture(&mut self, texture: MqTexture) {
        // macroquad frees GPU memory when the last handle drops
        drop(texture);
    }

    fn ticks_ms(&self) -> u64 {
        (get_time() * 1000.0) as u64
    }

    fn delay(&mut self, ms: u64) {
        #[cfg(not(target_arch = "wasm32"))]
        std::thread::sleep(std::time::Duration::from_millis(ms));
        #[cfg(target_arch = "wasm32")]
        let _ = ms;
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        if is_quit_requested() {
            events.push(HostEvent::Quit);
        }
        for key in get_keys_pressed() {
            events.push(HostEvent::KeyDown(key));
        }
        for key in get_keys_released() {
            events.push(HostEvent::KeyUp(key));
        }

        let touches = touches();
        let moving: Vec<&Touch> = touches
            .iter()
            .filter(|t| matches!(t.phase, TouchPhase::Moved))
            .collect();
        for t in &touches {
            let (x, y) = (t.position.x, t.position.y);
            match t.phase {
                TouchPhase::Started => events.push(HostEvent::FingerDown { id: t.id, x, y }),
                TouchPhase::Moved => events.push(HostEvent::FingerMotion { id: t.id, x, y }),
                TouchPhase::Ended | TouchPhase::Cancelled => {
                    events.push(HostEvent::FingerUp { id: t.id, x, y })
                }
                TouchPhase::Stationary => {}
            }
        }
        if moving.len() >= 2 {
            let n = moving.len() as f32;
            let (sx, sy) = moving
                .iter()
                .fold((0.0, 0.0), |(sx, sy), t| (sx + t.position.x, sy + t.position.y));
            events.push(HostEvent::MultiGesture {
                fingers: moving.len(),
                x: sx / n,
                y: sy / n,
            });
        }
        events
    }

    fn keyboard_state(&self) -> HashSet<KeyCode> {
        get_keys_down()
    }

    fn display_refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    fn window_size(&self) -> (u32, u32) {
        (screen_width() as u32, screen_height() as u32)
    }

    fn set_logical_size(&mut self, width: u32, height: u32) {
        self.logical = (width, height);
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> anyhow::Result<()> {
        macroquad::window::set_fullscreen(fullscreen);
        Ok(())
    }

    fn window_position(&self) -> (i32, i32) {
        self.position
    }

    fn set_window_position(&mut self, x: i32, y: i32) {
        self.position = (x, y);
    }

    fn present(&mut self) {
        set_default_camera();
    }
}
