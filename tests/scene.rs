mod common;

use common::{window, window_with_refresh, Fixture};
use macroquad::math::Rect;
use tilescroll::backend::Op;
use tilescroll::{Core, HeadlessBackend, RenderLayer, Window, WindowConfig};

/// Ids of 384x216 render targets in creation order.
fn view_targets(ops: &[Op]) -> Vec<usize> {
    ops.iter()
        .filter_map(|op| match op {
            Op::CreateTarget {
                id,
                width: 384,
                height: 216,
            } => Some(*id),
            _ => None,
        })
        .collect()
}

/// Textures copied onto the screen, in order.
fn screen_copies(ops: &[Op]) -> Vec<usize> {
    ops.iter()
        .filter_map(|op| match op {
            Op::Copy {
                texture,
                target: None,
                ..
            } => Some(*texture),
            _ => None,
        })
        .collect()
}

#[test]
fn without_a_map_only_the_logo_is_drawn() {
    let mut window = window();
    let mut core: Core<HeadlessBackend> = Core::default();
    let logo = window
        .backend()
        .ops()
        .iter()
        .find_map(|op| match op {
            Op::CreateRgba { id, width: 24, height: 7 } => Some(*id),
            _ => None,
        })
        .expect("logo created");
    window.backend_mut().take_ops();

    window.show_scene(&mut core).expect("frame");
    let ops = window.backend_mut().take_ops();

    let copies: Vec<&Op> = ops.iter().filter(|op| matches!(op, Op::Copy { .. })).collect();
    assert_eq!(copies.len(), 1);
    match copies[0] {
        Op::Copy { texture, target, dst, .. } => {
            assert_eq!(*texture, logo);
            assert_eq!(*target, None);
            assert_eq!(*dst, Rect::new(331.0, 197.0, 48.0, 14.0));
        }
        other => panic!("unexpected op {other:?}"),
    }
    assert_eq!(ops.last(), Some(&Op::Present));
}

#[test]
fn layers_are_composited_back_to_front() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "order");
    window.backend_mut().take_ops();

    window.show_scene(&mut core).expect("frame");
    let ops = window.backend_mut().take_ops();

    let targets = view_targets(&ops);
    assert_eq!(targets.len(), RenderLayer::COUNT);
    assert_eq!(screen_copies(&ops), targets);
    assert_eq!(ops.last(), Some(&Op::Present));
    // Every pass hands the screen back.
    assert_eq!(window.backend().current_target(), None);
}

#[test]
fn targets_are_cached_between_frames() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "cached");
    window.show_scene(&mut core).expect("first frame");
    window.backend_mut().take_ops();

    window.show_scene(&mut core).expect("second frame");
    let ops = window.backend_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, Op::CreateTarget { .. })));
    assert_eq!(screen_copies(&ops).len(), RenderLayer::COUNT);
}

#[test]
fn hidden_layers_are_skipped() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "hidden");
    core.set_render_layer_visible(RenderLayer::Background, false);
    core.set_render_layer_visible(RenderLayer::ActorForeground, false);
    window.backend_mut().take_ops();

    window.show_scene(&mut core).expect("frame");
    let ops = window.backend_mut().take_ops();
    let targets = view_targets(&ops);
    assert_eq!(screen_copies(&ops), targets[1..4].to_vec());
}

#[test]
fn animated_tiles_step_at_their_own_rate() {
    let mut window = window_with_refresh(20);
    let mut core = Core::default();
    core.load_map(Fixture::default().write("cadence"), &mut window)
        .expect("load");

    // Five frames of 0.05 s with tiles at 10 fps.
    for _ in 0..5 {
        window.show_scene(&mut core).expect("frame");
        assert!((window.time_since_last_frame() - 0.05).abs() < 1e-12);
    }
    let map = core.map().expect("map");
    for tile in map.animated_tiles() {
        assert_eq!(tile.current_frame(), 2);
        assert_eq!(tile.id(), 6);
    }
}

#[test]
fn animated_tile_fps_is_capped_by_refresh_rate() {
    let fixture = Fixture {
        animated_tile_fps: 240,
        ..Fixture::default()
    };
    let (_window, core) = common::loaded(&fixture, "fps_cap");
    let map = core.map().expect("map");
    assert_eq!(map.animated_tile_fps(), 60);
}

#[test]
fn paused_core_freezes_animation() {
    let mut window = window_with_refresh(20);
    let mut core = Core::default();
    core.load_map(Fixture::default().write("paused"), &mut window)
        .expect("load");
    core.pause();

    for _ in 0..5 {
        window.show_scene(&mut core).expect("frame");
        core.update(&mut window);
    }
    let map = core.map().expect("map");
    assert!(map.animated_tiles().iter().all(|t| t.current_frame() == 0));
    let hero = core.entity(0).and_then(|e| e.actor.as_ref()).expect("hero");
    assert_eq!(hero.current_frame, 0);
}

#[test]
fn without_vsync_the_frame_sleeps_out_its_budget() {
    let config = WindowConfig {
        enable_vsync: false,
        ..WindowConfig::default()
    };
    let backend = HeadlessBackend::new(640, 360).with_refresh_rate(50);
    let mut window = Window::new(&config, backend).expect("window");
    let mut core: Core<HeadlessBackend> = Core::default();

    window.backend_mut().advance_clock(5);
    window.show_scene(&mut core).expect("frame");
    assert!(window.backend().ops().contains(&Op::Delay(19)));
    assert!((window.time_since_last_frame() - 0.019995).abs() < 1e-9);
}

#[test]
fn zoom_resizes_render_targets() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "zoom");
    window.show_scene(&mut core).expect("frame");

    window.set_zoom_level(3.0).expect("zoom");
    assert_eq!(window.zoom_level(), 3.0);
    assert_eq!(window.logical_size(), (213, 120));
    window.backend_mut().take_ops();

    window.show_scene(&mut core).expect("frame");
    let resized = window
        .backend()
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::CreateTarget { width: 213, height: 120, .. }))
        .count();
    assert_eq!(resized, RenderLayer::COUNT);
}

#[test]
fn zooming_out_widens_background_layers() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "zoom_out");
    window.show_scene(&mut core).expect("frame");
    let textures = window.backend().live_textures();

    window.set_zoom_level(1.5).expect("zoom");
    assert_eq!(window.logical_size(), (426, 240));
    window.show_scene(&mut core).expect("frame");

    let layer = &core.map().expect("map").background().layers()[0];
    // Five 100px copies cover the 426px view.
    assert_eq!(layer.width(), 500);
    assert_eq!(window.backend().live_textures(), textures);

    // Zooming back in keeps the wider texture.
    window.set_zoom_level(2.0).expect("zoom");
    window.show_scene(&mut core).expect("frame");
    assert_eq!(core.map().expect("map").background().layers()[0].width(), 500);
}

#[test]
fn animated_tiles_keep_their_cell_mirroring() {
    let (mut window, mut core) = common::loaded(&Fixture::default(), "animated_flip");
    window.backend_mut().take_ops();
    window.show_scene(&mut core).expect("frame");
    let ops = window.backend_mut().take_ops();

    // The first map-sized target of the frame holds the animated tiles.
    let animated = ops
        .iter()
        .find_map(|op| match op {
            Op::CreateTarget {
                id,
                width: 1024,
                height: 512,
            } => Some(*id),
            _ => None,
        })
        .expect("animated tile texture");
    let flips: Vec<bool> = ops
        .iter()
        .filter_map(|op| match op {
            Op::Copy { target, flip, .. } if *target == Some(animated) => Some(flip.horizontal),
            _ => None,
        })
        .collect();
    assert_eq!(flips, vec![false, true]);

    let map = core.map().expect("map");
    assert!(map.animated_tiles()[1].flip().horizontal);
}
