//! Side-scrolling Tiled map engine for Macroquad.
//!
//! A [`Window`] owns the [`Backend`] and frame timing. A [`Core`] owns the
//! loaded [`Map`], the [`Camera`] and the event callbacks. Hosts run:
//!
//! ```no_run
//! # use tilescroll::{Core, Window, WindowConfig, HeadlessBackend};
//! # fn main() -> Result<(), tilescroll::EngineError> {
//! let mut window = Window::new(&WindowConfig::default(), HeadlessBackend::new(640, 360))?;
//! let mut core = Core::default();
//! core.load_map("res/maps/level.tmx", &mut window)?;
//! while core.is_active() {
//!     core.update(&mut window);
//!     window.show_scene(&mut core)?;
//! }
//! core.destroy(&mut window);
//! # Ok(())
//! # }
//! ```
//!
//! Maps may be Tiled JSON or TMX. Both decode into the same [`IrMap`].

mod actor;
mod background;
mod camera;
mod config;
mod core;
mod error;
mod event;
mod ir_map;
mod map;
mod properties;
mod render;
mod simulation;
mod window;

pub mod backend;
pub mod hash;
pub mod loader;

pub use crate::actor::{
    bounding_boxes_intersect, Aabb, Actor, ActorAction, ActorState, Animation, Depth, Direction,
    Entity, Motion,
};
pub use crate::background::{Alignment, Background, BackgroundLayer};
pub use crate::backend::{Backend, Flip, HeadlessBackend, HostEvent, MacroquadBackend};
pub use crate::camera::Camera;
pub use crate::config::WindowConfig;
pub use crate::core::Core;
pub use crate::error::{EngineError, MapError, Status};
pub use crate::event::{EventCallback, EventDispatcher, EventKind};
pub use crate::ir_map::{
    Gid, IrFrame, IrLayer, IrLayerKind, IrMap, IrObject, IrTileMetadata, IrTileset, Properties,
    PropertyValue,
};
pub use crate::loader::MapFormat;
pub use crate::map::{AnimatedTile, Map, MapMetrics, TileFlags, Tileset};
pub use crate::properties::{PropertyBinder, PropertySource};
pub use crate::render::{LayerLevel, RenderLayer};
pub use crate::simulation::update_entities;
pub use crate::window::Window;
