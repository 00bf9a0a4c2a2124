//! Parallax background state and the widened layer textures it scrolls.

use crate::actor::Direction;
use crate::backend::{Backend, Flip};
use crate::error::EngineError;
use anyhow::{anyhow, Context};
use macroquad::color::Color;
use macroquad::math::Rect;
use std::path::{Path, PathBuf};

/// Vertical anchoring of background layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Anchored to the map top; scrolls vertically with the camera.
    Top,
    /// Anchored to the bottom of the view.
    #[default]
    Bottom,
}

/// One scrolling image, repeated side by side until it spans the view.
#[derive(Debug)]
pub struct BackgroundLayer<T> {
    pub(crate) path: PathBuf,
    pub(crate) texture: T,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) pos_x: f64,
    pub(crate) pos_y: f64,
    pub(crate) velocity: f64,
}

impl<T> BackgroundLayer<T> {
    /// Loads `path` and copies it `ceil(view_width / image_width)` times into
    /// a render target. The source image is released afterwards.
    ///
    /// A missing image is a warning; failing to draw the target is critical.
    pub(crate) fn build<B>(backend: &mut B, path: &Path, view_width: u32) -> Result<Self, EngineError>
    where
        B: Backend<Texture = T>,
    {
        let image = backend
            .load_texture(path)
            .with_context(|| format!("background layer {}", path.display()))
            .map_err(EngineError::warning)?;
        let (image_w, image_h) = backend.texture_size(&image);
        if image_w == 0 || image_h == 0 {
            backend.destroy_texture(image);
            return Err(EngineError::warning(anyhow!(
                "background layer {} is empty",
                path.display()
            )));
        }

        let repeats = view_width.div_ceil(image_w).max(1);
        let width = repeats * image_w;
        let texture = match backend.create_target(width, image_h) {
            Ok(t) => t,
            Err(err) => {
                backend.destroy_texture(image);
                return Err(EngineError::critical(err.context("creating background target")));
            }
        };

        let drawn = backend.set_target(Some(&texture)).map(|()| {
            backend.clear(Color::new(0.0, 0.0, 0.0, 0.0));
            for i in 0..repeats {
                let dst = Rect::new((i * image_w) as f32, 0.0, image_w as f32, image_h as f32);
                backend.copy(&image, None, dst, Flip::NONE);
            }
        });
        let reset = backend.set_target(None);
        backend.destroy_texture(image);
        if let Err(err) = drawn.and(reset) {
            backend.destroy_texture(texture);
            return Err(EngineError::critical(err));
        }

        log::debug!(
            target: "tilescroll::background",
            "{}: {}x{} ({} repeats)",
            path.display(),
            width,
            image_h,
            repeats
        );

        Ok(Self {
            path: path.to_path_buf(),
            texture,
            width,
            height: image_h,
            pos_x: 0.0,
            pos_y: 0.0,
            velocity: 0.0,
        })
    }

    /// Rebuilds the texture from its image when the view has grown wider
    /// than it. Scroll position and velocity carry over.
    pub(crate) fn cover<B>(&mut self, backend: &mut B, view_width: u32) -> Result<(), EngineError>
    where
        B: Backend<Texture = T>,
    {
        if self.width >= view_width {
            return Ok(());
        }
        let wider = Self::build(backend, &self.path, view_width)?;
        let old = std::mem::replace(&mut self.texture, wider.texture);
        backend.destroy_texture(old);
        self.width = wider.width;
        self.height = wider.height;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pos_x(&self) -> f64 {
        self.pos_x
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Keeps `pos_x` inside `[-width, +width]`, jumping to the opposite end
    /// when it leaves.
    pub(crate) fn wrap(&mut self) {
        let w = self.width as f64;
        if self.pos_x < -w {
            self.pos_x = w;
        }
        if self.pos_x > w {
            self.pos_x = -w;
        }
    }

    /// The two x positions the layer is drawn at so the seam is covered.
    pub(crate) fn draw_positions(&self) -> (f64, f64) {
        let w = self.width as f64;
        let a = self.pos_x;
        let b = if a > 0.0 { a - w } else { a + w };
        (a, b)
    }

    pub(crate) fn advance(&mut self, direction: Direction) {
        if self.velocity > 0.0 {
            if direction == Direction::Right {
                self.pos_x -= self.velocity;
            } else {
                self.pos_x += self.velocity;
            }
        }
    }
}

#[derive(Debug)]
pub struct Background<T> {
    pub(crate) alignment: Alignment,
    pub(crate) direction: Direction,
    pub(crate) layer_shift: f64,
    pub(crate) velocity: f64,
    pub(crate) velocity_is_constant: bool,
    pub(crate) layers: Vec<BackgroundLayer<T>>,
}

impl<T> Default for Background<T> {
    fn default() -> Self {
        Self {
            alignment: Alignment::default(),
            direction: Direction::Left,
            layer_shift: 0.0,
            velocity: 0.0,
            velocity_is_constant: false,
            layers: Vec::new(),
        }
    }
}

impl<T> Background<T> {
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn is_velocity_constant(&self) -> bool {
        self.velocity_is_constant
    }

    pub fn layers(&self) -> &[BackgroundLayer<T>] {
        &self.layers
    }

    /// Splits the reference velocity across layers. The divisor starts at
    /// `layers + 1` and drops by `layer_shift` per layer, so layer 0 is the
    /// slowest.
    pub(crate) fn distribute_velocity(&mut self) {
        let mut factor = self.layers.len() as f64 + 1.0;
        for layer in &mut self.layers {
            layer.velocity = if factor != 0.0 { self.velocity / factor } else { 0.0 };
            factor -= self.layer_shift;
        }
    }

    pub(crate) fn destroy<B>(&mut self, backend: &mut B)
    where
        B: Backend<Texture = T>,
    {
        while let Some(layer) = self.layers.pop() {
            backend.destroy_texture(layer.texture);
        }
    }
}
