use super::{Backend, Flip, HostEvent};
use anyhow::Context;
use macroquad::color::Color;
use macroquad::input::KeyCode;
use macroquad::math::Rect;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Texture handle issued by [`HeadlessBackend`].
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    pub is_target: bool,
}

/// One recorded backend call. Texture ids refer to [`HeadlessTexture::id`];
/// a `None` target is the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Load { id: usize, path: PathBuf },
    CreateRgba { id: usize, width: u32, height: u32 },
    CreateTarget { id: usize, width: u32, height: u32 },
    SetTarget(Option<usize>),
    Clear { target: Option<usize>, color: Color },
    Copy {
        texture: usize,
        target: Option<usize>,
        src: Option<Rect>,
        dst: Rect,
        flip: Flip,
    },
    Destroy(usize),
    Delay(u64),
    Present,
}

/// A backend without a GPU.
///
/// Image sizes come from the file headers; pixels are never decoded. The
/// clock only moves through [`HeadlessBackend::advance_clock`] and events
/// only arrive through [`HeadlessBackend::push_event`].
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: usize,
    live: HashSet<usize>,
    target: Option<usize>,
    ops: Vec<Op>,
    clock_ms: u64,
    events: VecDeque<HostEvent>,
    keys: HashSet<KeyCode>,
    refresh_rate: u32,
    window_size: (u32, u32),
    logical: (u32, u32),
    fullscreen: bool,
    position: (i32, i32),
    fail_targets: bool,
}

impl HeadlessBackend {
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            next_id: 1,
            live: HashSet::new(),
            target: None,
            ops: Vec::new(),
            clock_ms: 0,
            events: VecDeque::new(),
            keys: HashSet::new(),
            refresh_rate: 60,
            window_size: (window_width, window_height),
            logical: (window_width, window_height),
            fullscreen: false,
            position: (0, 0),
            fail_targets: false,
        }
    }

    pub fn with_refresh_rate(mut self, hz: u32) -> Self {
        self.refresh_rate = hz;
        self
    }

    /// Makes every later `create_target` fail, to exercise GPU failure paths.
    pub fn fail_target_creation(&mut self, fail: bool) {
        self.fail_targets = fail;
    }

    pub fn advance_clock(&mut self, ms: u64) {
        self.clock_ms += ms;
    }

    pub fn push_event(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    pub fn press_key(&mut self, key: KeyCode) {
        self.keys.insert(key);
        self.events.push_back(HostEvent::KeyDown(key));
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys.remove(&key);
        self.events.push_back(HostEvent::KeyUp(key));
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    /// Textures created and not yet destroyed.
    pub fn live_textures(&self) -> usize {
        self.live.len()
    }

    pub fn logical_size(&self) -> (u32, u32) {
        self.logical
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn current_target(&self) -> Option<usize> {
        self.target
    }

    fn issue(&mut self, width: u32, height: u32, is_target: bool) -> HeadlessTexture {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        HeadlessTexture {
            id,
            width,
            height,
            is_target,
        }
    }
}

impl Backend for HeadlessBackend {
    type Texture = HeadlessTexture;

    fn load_texture(&mut self, path: &Path) -> anyhow::Result<HeadlessTexture> {
        let (w, h) = image::image_dimensions(path)
            .with_context(|| format!("Loading texture {}", path.display()))?;
        let tex = self.issue(w, h, false);
        self.ops.push(Op::Load {
            id: tex.id,
            path: path.to_path_buf(),
        });
        Ok(tex)
    }

    fn create_texture_from_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> anyhow::Result<HeadlessTexture> {
        anyhow::ensure!(
            pixels.len() == width as usize * height as usize * 4,
            "expected {}x{} RGBA pixels, got {} bytes",
            width,
            height,
            pixels.len()
        );
        let tex = self.issue(width, height, false);
        self.ops.push(Op::CreateRgba {
            id: tex.id,
            width,
            height,
        });
        Ok(tex)
    }

    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<HeadlessTexture> {
        anyhow::ensure!(!self.fail_targets, "render target creation disabled");
        anyhow::ensure!(width > 0 && height > 0, "render target must not be empty");
        let tex = self.issue(width, height, true);
        self.ops.push(Op::CreateTarget {
            id: tex.id,
            width,
            height,
        });
        Ok(tex)
    }

    fn texture_size(&self, texture: &HeadlessTexture) -> (u32, u32) {
        (texture.width, texture.height)
    }

    fn set_target(&mut self, target: Option<&HeadlessTexture>) -> anyhow::Result<()> {
        if let Some(t) = target {
            anyhow::ensure!(t.is_target, "texture {} is not a render target", t.id);
            anyhow::ensure!(self.live.contains(&t.id), "texture {} was destroyed", t.id);
        }
        self.target = target.map(|t| t.id);
        self.ops.push(Op::SetTarget(self.target));
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        self.ops.push(Op::Clear {
            target: self.target,
            color,
        });
    }

    fn copy(&mut self, texture: &HeadlessTexture, src: Option<Rect>, dst: Rect, flip: Flip) {
        self.ops.push(Op::Copy {
            texture: texture.id,
            target: self.target,
            src,
            dst,
            flip,
        });
    }

    fn destroy_texture(&mut self, texture: HeadlessTexture) {
        self.live.remove(&texture.id);
        if self.target == Some(texture.id) {
            self.target = None;
        }
        self.ops.push(Op::Destroy(texture.id));
    }

    fn ticks_ms(&self) -> u64 {
        self.clock_ms
    }

    fn delay(&mut self, ms: u64) {
        self.ops.push(Op::Delay(ms));
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        self.events.drain(..).collect()
    }

    fn keyboard_state(&self) -> HashSet<KeyCode> {
        self.keys.clone()
    }

    fn display_refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    fn set_logical_size(&mut self, width: u32, height: u32) {
        self.logical = (width, height);
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> anyhow::Result<()> {
        self.fullscreen = fullscreen;
        Ok(())
    }

    fn window_position(&self) -> (i32, i32) {
        self.position
    }

    fn set_window_position(&mut self, x: i32, y: i32) {
        self.position = (x, y);
    }

    fn present(&mut self) {
        self.ops.push(Op::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_target_switches_and_copies() {
        let mut b = HeadlessBackend::new(640, 360);
        let target = b.create_target(32, 32).expect("target");
        let img = b.create_texture_from_rgba(2, 2, &[0; 16]).expect("rgba");
        b.set_target(Some(&target)).expect("set target");
        b.copy(&img, None, Rect::new(0.0, 0.0, 2.0, 2.0), Flip::NONE);
        b.set_target(None).expect("reset");

        assert!(b.ops().iter().any(|op| matches!(
            op,
            Op::Copy { texture, target: Some(t), .. } if *texture == img.id && *t == target.id
        )));
        assert_eq!(b.current_target(), None);
    }

    #[test]
    fn image_textures_cannot_be_targets() {
        let mut b = HeadlessBackend::new(64, 64);
        let img = b.create_texture_from_rgba(1, 1, &[0; 4]).expect("rgba");
        assert!(b.set_target(Some(&img)).is_err());
        assert!(b.create_texture_from_rgba(2, 2, &[0; 4]).is_err());
    }

    #[test]
    fn destroy_tracks_live_textures() {
        let mut b = HeadlessBackend::new(64, 64);
        let a = b.create_target(8, 8).expect("a");
        let c = b.create_target(8, 8).expect("c");
        assert_eq!(b.live_textures(), 2);
        b.destroy_texture(a);
        b.destroy_texture(c);
        assert_eq!(b.live_textures(), 0);
    }

    #[test]
    fn events_drain_in_order() {
        let mut b = HeadlessBackend::new(64, 64);
        b.press_key(KeyCode::Left);
        b.push_event(HostEvent::Quit);
        assert_eq!(
            b.poll_events(),
            vec![HostEvent::KeyDown(KeyCode::Left), HostEvent::Quit]
        );
        assert!(b.poll_events().is_empty());
        assert!(b.keyboard_state().contains(&KeyCode::Left));
    }
}
