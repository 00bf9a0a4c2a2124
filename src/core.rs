//! The core value hosts drive: map lifecycle, camera, events and the
//! per-frame update.

use crate::actor::{Entity, Motion};
use crate::backend::{Backend, HostEvent};
use crate::camera::Camera;
use crate::error::EngineError;
use crate::event::{EventCallback, EventDispatcher, EventKind};
use crate::ir_map::PropertyValue;
use crate::loader::MapFormat;
use crate::map::{Map, TileFlags};
use crate::properties::PropertySource;
use crate::render::RenderLayer;
use crate::simulation::update_entities;
use crate::window::Window;
use anyhow::anyhow;
use log::{debug, info, warn};
use std::path::Path;

/// Engine state between frames. Owns the loaded map.
pub struct Core<B: Backend> {
    pub(crate) map: Option<Map<B::Texture>>,
    pub(crate) camera: Camera,
    pub(crate) events: EventDispatcher<B>,
    pub(crate) is_active: bool,
    pub(crate) is_paused: bool,
    pub(crate) format: MapFormat,
    pub(crate) hidden: [bool; RenderLayer::COUNT],
}

impl<B: Backend> Default for Core<B> {
    fn default() -> Self {
        Self::new(MapFormat::default())
    }
}

impl<B: Backend> Core<B> {
    /// An active core without a map. `format` picks the map decoder for
    /// every later [`Core::load_map`].
    pub fn new(format: MapFormat) -> Self {
        Self {
            map: None,
            camera: Camera::new(),
            events: EventDispatcher::default(),
            is_active: true,
            is_paused: false,
            format,
            hidden: [false; RenderLayer::COUNT],
        }
    }

    /// Unloads any map and leaves the core inactive.
    pub fn destroy(&mut self, window: &mut Window<B>) {
        self.unload_map(window);
        self.is_active = false;
    }

    /// Decodes and loads the map at `path`.
    ///
    /// Fails with a warning when a map is already loaded or the file cannot
    /// be decoded. Any failure part-way through leaves no map loaded. On
    /// success the camera locks onto the player, if the map has one, and
    /// the map-loaded callback runs.
    pub fn load_map(&mut self, path: impl AsRef<Path>, window: &mut Window<B>) -> Result<(), EngineError> {
        let path = path.as_ref();
        if self.map.is_some() {
            warn!(target: "tilescroll::map", "A map has already been loaded: unload map first.");
            return Err(EngineError::warning(anyhow!("a map is already loaded")));
        }

        let (handle, map_dir) = self.format.decode(path).map_err(|e| {
            warn!(target: "tilescroll::map", "{}", e);
            EngineError::warning(e)
        })?;

        let (logical_width, _) = window.logical_size();
        let refresh_rate = window.refresh_rate();
        let map = Map::load(handle, &map_dir, window.backend_mut(), logical_width, refresh_rate)
            .map_err(|e| {
                match &e {
                    EngineError::Critical(err) => log::error!(target: "tilescroll::map", "{:#}", err),
                    EngineError::Warning(err) => warn!(target: "tilescroll::map", "{:#}", err),
                }
                e
            })?;

        self.camera = Camera::new();
        self.camera.set_target(map.player());
        if map.player().is_some() {
            self.camera.lock();
        }
        let logical = logical_f64(window);
        self.camera.move_to_target(logical, map.size(), map.entities());
        self.camera.clamp_to_map(logical, map.size());

        info!(target: "tilescroll::map", "Load map file: {}", path.display());
        self.map = Some(map);
        self.dispatch(EventKind::MapLoaded, window);
        Ok(())
    }

    /// Releases the map and every texture it owns. Does nothing without a
    /// map.
    pub fn unload_map(&mut self, window: &mut Window<B>) {
        let Some(mut map) = self.map.take() else {
            debug!(target: "tilescroll::map", "No map to unload");
            return;
        };
        map.unload(window.backend_mut());
        self.camera.unlock();
        self.camera.set_target(None);
        info!(target: "tilescroll::map", "Unload map.");
        self.dispatch(EventKind::MapUnloaded, window);
    }

    pub fn is_map_loaded(&self) -> bool {
        self.map.is_some()
    }

    /// Replaces any callback already registered for `kind`.
    pub fn register_event_callback(&mut self, kind: EventKind, callback: EventCallback<B>) {
        self.events.register(kind, callback);
    }

    /// Moves an unlocked camera. Relative moves are in pixels per
    /// millisecond of frame time.
    pub fn set_camera_position(&mut self, window: &Window<B>, x: f64, y: f64, relative: bool) {
        self.camera
            .set_position(x, y, relative, window.time_since_last_frame());
        if let Some(map) = &self.map {
            self.camera.clamp_to_map(logical_f64(window), map.size());
        }
    }

    pub fn lock_camera(&mut self) {
        self.camera.lock();
    }

    pub fn unlock_camera(&mut self) {
        self.camera.unlock();
    }

    /// Points the camera at another entity.
    pub fn set_camera_target(&mut self, entity: Option<usize>) {
        self.camera.set_target(entity);
    }

    /// One step of the frame loop: events, then simulation, then camera.
    ///
    /// `Quit` deactivates the core. Every other recognised event is
    /// recorded and handed to its callback, if one is registered. The
    /// simulation is skipped while paused or without a map.
    pub fn update(&mut self, window: &mut Window<B>) {
        for event in window.backend_mut().poll_events() {
            if event == HostEvent::Quit {
                self.deactivate();
                continue;
            }
            self.events.record(event);
            if let Some(kind) = EventKind::of(&event) {
                self.dispatch(kind, window);
            }
        }

        if self.is_paused {
            return;
        }
        let logical = logical_f64(window);
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let metrics = *map.metrics();
        update_entities(map.entities_mut(), &metrics, window.time_since_last_frame());
        self.camera.move_to_target(logical, map.size(), map.entities());
    }

    fn dispatch(&mut self, kind: EventKind, window: &mut Window<B>) {
        if let Some(callback) = self.events.callback(kind) {
            callback(window, self);
        }
    }

    /// Ends the host's frame loop at the next check of [`Core::is_active`].
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Key of the most recent key event.
    pub fn keycode(&self) -> Option<macroquad::input::KeyCode> {
        self.events.keycode()
    }

    pub fn last_event(&self) -> Option<HostEvent> {
        self.events.last_event()
    }

    /// Freezes the simulation and every animation. Rendering goes on.
    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Shows or hides one render layer when compositing.
    pub fn set_render_layer_visible(&mut self, layer: RenderLayer, visible: bool) {
        self.hidden[layer.index()] = !visible;
    }

    pub fn is_render_layer_visible(&self, layer: RenderLayer) -> bool {
        !self.hidden[layer.index()]
    }

    /// Custom property `name` of the loaded map, one of its layers,
    /// objects or tiles.
    pub fn property(&self, source: PropertySource, name: &str) -> Option<&PropertyValue> {
        self.map.as_ref()?.property(source, name)
    }

    pub fn map(&self) -> Option<&Map<B::Texture>> {
        self.map.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn entity_count(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.entities().len())
    }

    pub fn entity(&self, index: usize) -> Option<&Entity> {
        self.map.as_ref()?.entities().get(index)
    }

    pub fn entity_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.map.as_mut()?.entities_mut().get_mut(index)
    }

    /// The map's player entity.
    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        let map = self.map.as_mut()?;
        let player = map.player()?;
        map.entities_mut().get_mut(player)
    }

    /// Whether the player is subject to gravity.
    pub fn player_is_gravitational(&self) -> bool {
        self.map
            .as_ref()
            .and_then(|m| m.player().and_then(|i| m.entities().get(i)))
            .and_then(|e| e.actor.as_ref())
            .is_some_and(|a| a.motion == Motion::Gravitational)
    }

    /// Flags of the tile under pixel `(x, y)`; empty without a map.
    pub fn tile_flags_at(&self, x: f64, y: f64) -> TileFlags {
        self.map
            .as_ref()
            .map_or(TileFlags::empty(), |m| m.tile_flags_at(x, y))
    }

    pub fn is_entity_on_tile_with(&self, entity: usize, flag: TileFlags) -> bool {
        self.map
            .as_ref()
            .is_some_and(|m| m.is_entity_on_tile_with(entity, flag))
    }

    /// Grounds the player on tiles carrying `flag` and lets it fall off
    /// everything else. A rising player is left alone.
    pub fn update_player_ground_contact(&mut self, flag: TileFlags) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let Some(player) = map.player() else {
            return;
        };
        let falling = map
            .entities()
            .get(player)
            .and_then(|e| e.actor.as_ref())
            .is_some_and(|a| a.velocity_y >= 0.0);
        if !falling {
            return;
        }
        let grounded = map.is_entity_on_tile_with(player, flag);
        if let Some(entity) = map.entities_mut().get_mut(player) {
            entity.set_grounded(grounded);
        }
    }
}

fn logical_f64<B: Backend>(window: &Window<B>) -> (f64, f64) {
    let (w, h) = window.logical_size();
    (w as f64, h as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::config::WindowConfig;
    use macroquad::input::KeyCode;

    fn window() -> Window<HeadlessBackend> {
        Window::new(&WindowConfig::default(), HeadlessBackend::new(640, 360)).expect("window")
    }

    fn on_key(_: &mut Window<HeadlessBackend>, core: &mut Core<HeadlessBackend>) {
        if core.keycode() == Some(KeyCode::Q) {
            core.deactivate();
        }
    }

    #[test]
    fn quit_event_deactivates() {
        let mut window = window();
        let mut core = Core::<HeadlessBackend>::default();
        assert!(core.is_active());
        window.backend_mut().push_event(HostEvent::Quit);
        core.update(&mut window);
        assert!(!core.is_active());
    }

    #[test]
    fn key_callbacks_see_the_keycode() {
        let mut window = window();
        let mut core = Core::<HeadlessBackend>::default();
        core.register_event_callback(EventKind::KeyDown, on_key);
        window.backend_mut().press_key(KeyCode::W);
        core.update(&mut window);
        assert!(core.is_active());
        window.backend_mut().press_key(KeyCode::Q);
        core.update(&mut window);
        assert!(!core.is_active());
        assert_eq!(core.keycode(), Some(KeyCode::Q));
    }

    #[test]
    fn unloading_nothing_is_silent() {
        let mut window = window();
        let mut core = Core::<HeadlessBackend>::default();
        core.unload_map(&mut window);
        assert!(!core.is_map_loaded());
        assert_eq!(core.entity_count(), 0);
        assert!(core.property(PropertySource::Map, "gravitation").is_none());
    }

    #[test]
    fn hidden_layers_are_tracked() {
        let mut core = Core::<HeadlessBackend>::default();
        core.set_render_layer_visible(RenderLayer::Background, false);
        assert!(!core.is_render_layer_visible(RenderLayer::Background));
        assert!(core.is_render_layer_visible(RenderLayer::ActorForeground));
    }
}
