use bevy::prelude::*;
use bevy::math::bounding::Aabb2d;
use bevy::window::{WindowPlugin, PrimaryWindow};
use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::gizmos::config::{GizmoConfigStore, DefaultGizmoConfigGroup};
use bevy_egui::EguiPlugin;
use bevy_rts_camera::*;

pub mod config;
pub mod error;
pub mod systems;


use config::{SpeedTier, WORLD_SIZE_X, WORLD_SIZE_Z};
use systems::artifacts::ArtifactPlugin;
use systems::grid::GridPlugin;
use systems::propagation::PropagationPlugin;
use systems::tasks::TaskPlugin;
use systems::ui::UIPlugin;
use systems::walls::WallPlugin;
use systems::{log_phase_changes, DemoPhase};

fn main() -> bevy::app::AppExit {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Block Caster".into(),
                mode: bevy::window::WindowMode::Windowed,
                resolution: bevy::window::WindowResolution::new(1920.0, 1080.0),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(RtsCameraPlugin)
        .init_state::<DemoPhase>()
        .init_resource::<SpeedTier>()

        .add_plugins(GridPlugin)
        .add_plugins(ArtifactPlugin)
        .add_plugins(TaskPlugin)
        .add_plugins(WallPlugin)
        .add_plugins(PropagationPlugin)
        .add_plugins(UIPlugin)

        .insert_resource(ClearColor(Color::BLACK))
        .add_systems(Startup, (start, setup_gizmos, maximize_window))
        .add_systems(Update, (handle_exit, log_phase_changes))
        .run()
}

fn setup_gizmos(
    mut config_store: ResMut<GizmoConfigStore>
) {
    let (config, _) = config_store.config_mut::<DefaultGizmoConfigGroup>();
    // grid guides stay visible through the wall cubes
    config.depth_bias = -1.0;
}

fn maximize_window(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    for mut window in windows.iter_mut() {
        window.set_maximized(true);
    }
}

fn start(
    mut commands: Commands
) {
    let half_world = Vec2::new(WORLD_SIZE_X as f32, WORLD_SIZE_Z as f32) / 2.0;

    // the camera can't pan past the grid
    commands.spawn((
        RtsCamera {
            bounds: Aabb2d::new(half_world, half_world),
            min_angle: 0.66,
            height_max: 1200.0,
            ..default()
        },
        RtsCameraControls {
            key_up: KeyCode::KeyW,
            key_down: KeyCode::KeyS,
            key_left: KeyCode::KeyA,
            key_right: KeyCode::KeyD,
            key_rotate_left: KeyCode::KeyQ,
            key_rotate_right: KeyCode::KeyE,
            pan_speed: 200.0,
            zoom_sensitivity: 0.15,
            edge_pan_width: 0.0,
            ..default()
        },
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 1_700.,
            ..default()
        },
        Transform::from_xyz(50000.0, 50000.0, 50000.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn handle_exit(
    keys: Res<ButtonInput<KeyCode>>,
    mut exit: EventWriter<AppExit>,
) {
    if keys.just_pressed(KeyCode::Escape) {
        exit.write(AppExit::Success);
    }
}
