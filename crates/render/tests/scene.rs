use std::time::{Duration, Instant};

use water_gpu::{
    Command, CommandLog, Context, CullMode, Device, RecordingDevice, RenderState, ShaderLibrary, TextureHandle,
};
use water_render::{full_library, DragMode, Obstacle, Scene, SceneConfig};
use water_sim::RandomDropConfig;

const FRAME: f32 = 1.0 / 60.0;

fn quiet() -> SceneConfig {
    SceneConfig {
        resolution: 32,
        water_detail: 8,
        caustics_resolution: 64,
        random_drops: RandomDropConfig {
            enabled: false,
            ..RandomDropConfig::default()
        },
        ..SceneConfig::default()
    }
}

fn setup(config: SceneConfig) -> (Context, CommandLog, Scene) {
    let device = RecordingDevice::new();
    let log = device.log();
    let mut context = Context::new(Box::new(device));
    let scene = Scene::new(&mut context, &full_library(), config, Some(7)).unwrap();
    log.clear();
    (context, log, scene)
}

fn draws(log: &CommandLog) -> Vec<(String, Option<TextureHandle>, RenderState)> {
    log.draws()
        .into_iter()
        .map(|c| match c {
            Command::Draw {
                label, target, state, ..
            } => (label, target, state),
            _ => unreachable!(),
        })
        .collect()
}

fn labels(log: &CommandLog) -> Vec<String> {
    log.draw_labels()
}

#[test]
fn frame_updates_then_draws_in_order() {
    let (mut context, log, mut scene) = setup(quiet());

    scene.frame(&mut context, FRAME).unwrap();

    assert_eq!(
        labels(&log),
        [
            "water_update",
            "water_update",
            "water_normal",
            "caustics",
            "pool",
            "surface_above",
            "surface_under"
        ]
    );
    let commands = log.commands();
    assert_eq!(commands.first(), Some(&Command::BeginFrame));
    assert_eq!(commands.last(), Some(&Command::EndFrame));
    assert_eq!(scene.frames(), 1);
    assert_eq!(scene.water().swap_count(), 3);
}

#[test]
fn caustics_render_offscreen_and_the_rest_to_the_screen() {
    let (mut context, log, mut scene) = setup(quiet());
    let caustics = scene.renderer().caustics().handle();

    scene.frame(&mut context, FRAME).unwrap();

    for (label, target, state) in draws(&log) {
        match label.as_str() {
            "caustics" => {
                assert_eq!(target, Some(caustics));
                assert!(!state.depth_test);
            }
            "pool" | "surface_above" | "surface_under" => {
                assert_eq!(target, None, "{label}");
                assert!(state.depth_test, "{label}");
            }
            _ => assert_ne!(target, None, "{label} is a simulation pass"),
        }
    }
}

#[test]
fn surface_is_drawn_from_above_then_below() {
    let (mut context, log, mut scene) = setup(quiet());

    scene.draw(&mut context).unwrap();

    let culls: Vec<_> = draws(&log).into_iter().map(|(label, _, state)| (label, state.cull)).collect();
    assert_eq!(
        culls,
        [
            ("pool".to_owned(), CullMode::Back),
            ("surface_above".to_owned(), CullMode::Front),
            ("surface_under".to_owned(), CullMode::Back),
        ]
    );
    assert_eq!(context.device().render_state(), RenderState::default());
}

#[test]
fn long_frames_are_not_simulated() {
    let (mut context, log, mut scene) = setup(quiet());

    scene.frame(&mut context, 1.5).unwrap();

    assert_eq!(labels(&log), ["pool", "surface_above", "surface_under"]);
    assert_eq!(scene.frames(), 0);
    assert_eq!(scene.water().swap_count(), 0);
}

#[test]
fn paused_scene_still_draws() {
    let (mut context, log, mut scene) = setup(quiet());
    assert!(scene.toggle_pause());

    scene.frame(&mut context, FRAME).unwrap();
    assert_eq!(labels(&log), ["pool", "surface_above", "surface_under"]);

    assert!(!scene.toggle_pause());
    scene.update(&mut context, FRAME).unwrap();
    assert_eq!(scene.frames(), 1);
}

#[test]
fn droplet_is_drawn_blended_until_it_splashes_once() {
    let (mut context, log, mut scene) = setup(quiet());
    scene.droplets_mut().spawn(0.25, -0.25);

    scene.frame(&mut context, FRAME).unwrap();
    let droplet_draws: Vec<_> = draws(&log)
        .into_iter()
        .filter(|(label, ..)| label == "droplet")
        .collect();
    assert_eq!(droplet_draws.len(), 1);
    let (_, target, state) = &droplet_draws[0];
    assert_eq!(*target, None);
    assert!(state.blend && state.depth_test);

    for _ in 0..60 {
        scene.frame(&mut context, FRAME).unwrap();
    }
    let all = labels(&log);
    assert_eq!(all.iter().filter(|l| *l == "water_drop").count(), 1);
    assert!(scene.droplets().is_empty());

    log.clear();
    scene.frame(&mut context, FRAME).unwrap();
    assert!(!labels(&log).contains(&"droplet".to_owned()));
}

#[test]
fn seeded_random_drops_spawn_on_the_interval() {
    let config = SceneConfig {
        random_drops: RandomDropConfig::default(),
        ..quiet()
    };
    let (mut context, _log, mut scene) = setup(config);
    assert!(scene.random_drops_enabled());

    for _ in 0..3 {
        scene.update(&mut context, 0.25).unwrap();
    }
    assert!(scene.droplets().is_empty());
    scene.update(&mut context, 0.25).unwrap();
    assert_eq!(scene.droplets().len(), 1);
    let droplet = scene.droplets().alive().next().unwrap();
    assert!(droplet.position.x.abs() <= 0.9 && droplet.position.z.abs() <= 0.9);

    scene.set_random_drops(false);
    for _ in 0..8 {
        scene.update(&mut context, 0.25).unwrap();
    }
    // The first droplet has splashed and nothing replaced it.
    assert!(scene.droplets().is_empty());
}

#[test]
fn dragging_over_the_water_rains_throttled_droplets() {
    let (_context, _log, mut scene) = setup(quiet());
    let start = Instant::now();

    // Slightly above the middle of the default 800x600 viewport the view ray
    // meets the water inside the pool.
    assert_eq!(scene.start_drag(400.0, 250.0, start), DragMode::Drops);
    assert_eq!(scene.droplets().len(), 1);

    scene.during_drag(405.0, 250.0, start + Duration::from_millis(30));
    assert_eq!(scene.droplets().len(), 1);
    scene.during_drag(410.0, 250.0, start + Duration::from_millis(100));
    assert_eq!(scene.droplets().len(), 2);

    scene.stop_drag();
    scene.during_drag(420.0, 250.0, start + Duration::from_millis(500));
    assert_eq!(scene.droplets().len(), 2);
}

#[test]
fn dragging_outside_the_pool_orbits_the_camera() {
    let (_context, _log, mut scene) = setup(quiet());
    let before = *scene.camera();
    let now = Instant::now();

    assert_eq!(scene.start_drag(0.0, 0.0, now), DragMode::Orbit);
    scene.during_drag(10.0, 20.0, now);

    let after = scene.camera();
    assert!((after.angle_y - (before.angle_y - 10.0)).abs() < 1e-4);
    assert!((after.angle_x - (before.angle_x - 20.0)).abs() < 1e-4);
    assert!(scene.droplets().is_empty());
}

#[test]
fn obstacle_is_drawn_and_moves_water() {
    let config = SceneConfig {
        obstacle: Some(Obstacle {
            center: [0.0, -0.25, 0.0],
            radius: 0.25,
        }),
        ..quiet()
    };
    let (mut context, log, mut scene) = setup(config);

    scene.draw(&mut context).unwrap();
    assert_eq!(labels(&log), ["pool", "surface_above", "surface_under", "obstacle"]);

    log.clear();
    scene.move_obstacle(&mut context, [0.2, -0.25, 0.0]).unwrap();
    assert_eq!(labels(&log), ["water_sphere"]);
    assert_eq!(scene.renderer().obstacle().map(|o| o.center), Some([0.2, -0.25, 0.0]));
}

#[test]
fn failed_reload_keeps_the_scene_running() {
    let (mut context, log, mut scene) = setup(quiet());

    assert!(scene.reload_kernels(&mut context, &ShaderLibrary::new()).is_err());
    scene.frame(&mut context, FRAME).unwrap();
    assert_eq!(labels(&log).len(), 7);
}

#[test]
fn resize_updates_viewport() {
    let (mut context, _log, mut scene) = setup(quiet());
    scene.resize(&mut context, 1024, 512);
    assert_eq!(scene.viewport(), water_math::Viewport::new(0, 0, 1024, 512));
    assert_eq!(context.viewport(), scene.viewport());

    // Minimised windows report a zero size.
    scene.resize(&mut context, 0, 0);
    assert_eq!(scene.viewport(), water_math::Viewport::new(0, 0, 1024, 512));
}

#[test]
fn missing_tile_image_fails_with_context() {
    let device = RecordingDevice::new();
    let mut context = Context::new(Box::new(device));
    let config = SceneConfig {
        tiles: Some("/no/such/tiles.png".into()),
        ..quiet()
    };
    let err = Scene::new(&mut context, &full_library(), config, None).err().unwrap();
    let message = format!("{err:#}");
    assert!(message.contains("loading pool tiles"), "{message}");
    assert!(message.contains("/no/such/tiles.png"), "{message}");
}
