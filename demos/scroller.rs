use macroquad::prelude::*;
use tilescroll::{
    Core, Direction, EventKind, MacroquadBackend, Status, TileFlags, Window, WindowConfig,
};

fn window_conf() -> Conf {
    Conf {
        window_title: "Scroller".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

fn key_down(window: &mut Window<MacroquadBackend>, core: &mut Core<MacroquadBackend>) {
    match core.keycode() {
        Some(KeyCode::Q) => core.deactivate(),
        Some(KeyCode::F) => {
            if let Err(err) = window.toggle_fullscreen() {
                log::warn!("{}", err);
            }
        }
        Some(KeyCode::P) => {
            if core.is_paused() {
                core.resume();
            } else {
                core.pause();
            }
        }
        Some(KeyCode::Space) => {
            if let Some(player) = core.player_mut() {
                player.jump();
            }
        }
        Some(KeyCode::Left) => steer(core, Direction::Left),
        Some(KeyCode::Right) => steer(core, Direction::Right),
        _ => {}
    }
}

fn key_up(window: &mut Window<MacroquadBackend>, core: &mut Core<MacroquadBackend>) {
    let held = window.keyboard_state();
    if held.contains(&KeyCode::Left) || held.contains(&KeyCode::Right) {
        return;
    }
    if let Some(player) = core.player_mut() {
        player.set_moving(false);
    }
}

fn steer(core: &mut Core<MacroquadBackend>, direction: Direction) {
    if let Some(player) = core.player_mut() {
        player.set_direction(direction);
        player.set_moving(true);
    }
}

fn map_loaded(_: &mut Window<MacroquadBackend>, core: &mut Core<MacroquadBackend>) {
    log::info!("{} entities on the map", core.entity_count());
}

async fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(2) {
        Some(path) => WindowConfig::from_json_file(path)?,
        None => WindowConfig {
            width: 1280,
            height: 720,
            ..WindowConfig::default()
        },
    };
    let map_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "assets/maps/level.tmx".to_owned());

    let mut window = Window::new(&config, MacroquadBackend::new())?;
    let mut core = Core::default();
    core.register_event_callback(EventKind::KeyDown, key_down);
    core.register_event_callback(EventKind::KeyUp, key_up);
    core.register_event_callback(EventKind::MapLoaded, map_loaded);

    if let Err(err) = core.load_map(&map_path, &mut window) {
        if err.is_critical() {
            return Err(err.into());
        }
        log::warn!("Running without a map: {}", err);
    }

    while core.is_active() {
        core.update_player_ground_contact(TileFlags::SOLID_ABOVE);
        core.update(&mut window);
        let status = Status::from(window.show_scene(&mut core));
        if status == Status::ErrorCritical {
            break;
        }
        next_frame().await;
    }

    core.destroy(&mut window);
    window.destroy();
    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        log::error!("{:#}", err);
    }
}
