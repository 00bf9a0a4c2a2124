//! Callback registry for host and engine events.

use crate::backend::{Backend, HostEvent};
use crate::core::Core;
use crate::window::Window;
use macroquad::input::KeyCode;

/// Event kinds a callback can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FingerDown,
    FingerUp,
    FingerMotion,
    KeyDown,
    KeyUp,
    MultiGesture,
    MapLoaded,
    MapUnloaded,
}

impl EventKind {
    const COUNT: usize = 8;

    /// Kind of a host event; `None` for `Quit`, which the core handles.
    pub fn of(event: &HostEvent) -> Option<EventKind> {
        match event {
            HostEvent::Quit => None,
            HostEvent::KeyDown(_) => Some(EventKind::KeyDown),
            HostEvent::KeyUp(_) => Some(EventKind::KeyUp),
            HostEvent::FingerDown { .. } => Some(EventKind::FingerDown),
            HostEvent::FingerUp { .. } => Some(EventKind::FingerUp),
            HostEvent::FingerMotion { .. } => Some(EventKind::FingerMotion),
            HostEvent::MultiGesture { .. } => Some(EventKind::MultiGesture),
        }
    }
}

/// Called on the frame loop with the window and the core.
pub type EventCallback<B> = fn(&mut Window<B>, &mut Core<B>);

/// One optional callback per [`EventKind`].
pub struct EventDispatcher<B: Backend> {
    callbacks: [Option<EventCallback<B>>; EventKind::COUNT],
    last_event: Option<HostEvent>,
    keycode: Option<KeyCode>,
}

impl<B: Backend> Default for EventDispatcher<B> {
    fn default() -> Self {
        Self {
            callbacks: [None; EventKind::COUNT],
            last_event: None,
            keycode: None,
        }
    }
}

impl<B: Backend> EventDispatcher<B> {
    /// Registering again for the same kind replaces the earlier callback.
    pub fn register(&mut self, kind: EventKind, callback: EventCallback<B>) {
        self.callbacks[kind as usize] = Some(callback);
    }

    pub fn unregister(&mut self, kind: EventKind) {
        self.callbacks[kind as usize] = None;
    }

    pub fn callback(&self, kind: EventKind) -> Option<EventCallback<B>> {
        self.callbacks[kind as usize]
    }

    /// Most recent host event seen by the core.
    pub fn last_event(&self) -> Option<HostEvent> {
        self.last_event
    }

    /// Key of the most recent key event.
    pub fn keycode(&self) -> Option<KeyCode> {
        self.keycode
    }

    pub(crate) fn record(&mut self, event: HostEvent) {
        if let HostEvent::KeyDown(key) | HostEvent::KeyUp(key) = event {
            self.keycode = Some(key);
        }
        self.last_event = Some(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn noop(_: &mut Window<HeadlessBackend>, _: &mut Core<HeadlessBackend>) {}
    fn other(_: &mut Window<HeadlessBackend>, _: &mut Core<HeadlessBackend>) {}

    #[test]
    fn maps_host_events_to_kinds() {
        assert_eq!(EventKind::of(&HostEvent::Quit), None);
        assert_eq!(
            EventKind::of(&HostEvent::KeyUp(KeyCode::Space)),
            Some(EventKind::KeyUp)
        );
        assert_eq!(
            EventKind::of(&HostEvent::MultiGesture { fingers: 2, x: 0.0, y: 0.0 }),
            Some(EventKind::MultiGesture)
        );
    }

    #[test]
    fn registration_overwrites() {
        let mut events = EventDispatcher::<HeadlessBackend>::default();
        assert!(events.callback(EventKind::KeyDown).is_none());
        events.register(EventKind::KeyDown, noop);
        events.register(EventKind::KeyDown, other);
        let cb = events.callback(EventKind::KeyDown).expect("registered");
        assert_eq!(cb as usize, other as EventCallback<HeadlessBackend> as usize);
        events.unregister(EventKind::KeyDown);
        assert!(events.callback(EventKind::KeyDown).is_none());
    }

    #[test]
    fn remembers_last_key() {
        let mut events = EventDispatcher::<HeadlessBackend>::default();
        events.record(HostEvent::KeyDown(KeyCode::Left));
        events.record(HostEvent::FingerUp { id: 1, x: 0.0, y: 0.0 });
        assert_eq!(events.keycode(), Some(KeyCode::Left));
        assert!(matches!(events.last_event(), Some(HostEvent::FingerUp { .. })));
    }
}
