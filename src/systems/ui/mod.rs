use bevy::prelude::*;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin}; // fps
use bevy_egui::{egui, EguiContexts, EguiPlugin, EguiPrimaryContextPass};

use crate::config::SpeedTier;
use crate::systems::artifacts::{Growth, PooledArtifacts, Seed, Walls};
use crate::systems::export::{ExportEvent, FinishedBlocks};
use crate::systems::propagation::engine::PropagationEngine;
use crate::systems::DemoPhase;

pub mod indicator;

pub use indicator::{TierIndicator, TierChangeEvent};
pub use indicator::{update_tier_indicator, render_tier_indicator};

pub struct UIPlugin;

impl Plugin for UIPlugin {
    fn build(&self, app: &mut App) {
        assert!(app.is_plugin_added::<EguiPlugin>());
        app
            .insert_resource(TierIndicator::default())
            .add_event::<TierChangeEvent>()
            .add_systems(Update, (key_input, update_tier_indicator).chain())
            .add_systems(EguiPrimaryContextPass, (ui_main, fps, render_tier_indicator)); // UI rendering here
    }
}

fn key_input(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut tier: ResMut<SpeedTier>,
    mut tier_events: EventWriter<TierChangeEvent>,
) {
    let changed = if keyboard_input.just_pressed(KeyCode::KeyP) {
        Some(tier.next())
    } else if keyboard_input.just_pressed(KeyCode::KeyO) {
        Some(tier.previous())
    } else {
        None
    };

    if let Some(new_tier) = changed {
        *tier = new_tier;
        info!("Speed tier: {}", new_tier.label());
        tier_events.write(TierChangeEvent(new_tier));
    }
}

fn ui_main(
    mut contexts: EguiContexts,
    seed: Res<Seed>,
    phase: Res<State<DemoPhase>>,
    mut tier: ResMut<SpeedTier>,
    mut tier_events: EventWriter<TierChangeEvent>,
    mut export_events: EventWriter<ExportEvent>,
    engine: Res<PropagationEngine>,
    growth: Res<PooledArtifacts<Growth>>,
    walls: Res<PooledArtifacts<Walls>>,
    blocks: Res<FinishedBlocks>,
) {
    if let Ok(ctx) = contexts.ctx_mut() {
        egui::SidePanel::left("config_panel")
            .default_width(200.0)
            .min_width(250.0)
            .max_width(400.0)
            .resizable(true)
            .show(ctx, |ui| {
                // camera
                ui.label("Camera: ");
                ui.label("WASD - Move");
                ui.label("Scroll - Zoom");
                ui.label("Q/E or MMB - Rotate");

                ui.separator();

                ui.label(egui::RichText::new(phase.get().caption())
                    .size(16.0)
                    .strong());
                ui.label(format!("Seed: {}", seed.0));

                ui.separator();

                // speed tier
                ui.label("Speed:");
                ui.horizontal(|ui| {
                    for option in SpeedTier::ALL {
                        let text = egui::RichText::new(option.label()).color(egui::Color32::WHITE);
                        let mut button = egui::Button::new(text);
                        if option == *tier {
                            button = button.fill(indicator::tier_color(option));
                        }
                        if ui.add(button).clicked() && option != *tier {
                            *tier = option;
                            tier_events.write(TierChangeEvent(option));
                        }
                    }
                });
                ui.label("(O/P to switch)");

                ui.separator();

                egui::CollapsingHeader::new("Progress")
                    .default_open(true)
                    .show(ui, |ui| {
                    egui::Grid::new("progress_stats").show(ui, |ui| {
                        ui.label("Regions launched:");
                        ui.label(format!("{} / {}", engine.launched(), engine.discovered()));
                        ui.end_row();
                        ui.label("Active regions:");
                        ui.label(engine.active_regions().to_string());
                        ui.end_row();
                        ui.label("Growth objects:");
                        ui.label(growth.pool.active_count().to_string());
                        ui.end_row();
                        ui.label("Wall objects:");
                        ui.label(walls.pool.active_count().to_string());
                        ui.end_row();
                        ui.label("Finished blocks:");
                        ui.label(blocks.records.len().to_string());
                        ui.end_row();
                        ui.label("Dropped regions:");
                        ui.label(engine.dropped_blocks().to_string());
                        ui.end_row();
                    });
                });

                ui.separator();

                // export section
                ui.horizontal(|ui| {
                    let button = ui.add_enabled(!blocks.records.is_empty(), egui::Button::new("Export OBJ"));
                    if button
                        .on_hover_text("Export finished blocks as OBJ file, current directory")
                        .clicked() {
                        let timestamp = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .map(|elapsed| elapsed.as_secs())
                            .unwrap_or_default();
                        let filename = format!("blocks_export_{}.obj", timestamp);
                        export_events.write(ExportEvent { filename });
                    }
                });

                ui.separator();
                ui.label("ESC - Exit");
            });
    }
}

fn fps(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
) {
    if let Ok(ctx) = contexts.ctx_mut() {
        egui::Area::new(egui::Id::new("fps_counter"))
            .anchor(egui::Align2::RIGHT_TOP, egui::Vec2::new(-10.0, 10.0))
            .show(ctx, |ui| {
                ui.with_layout(egui::Layout::top_down(egui::Align::RIGHT), |ui| {
                    if let Some(fps) = diagnostics
                        .get(&FrameTimeDiagnosticsPlugin::FPS)
                        .and_then(|fps_diagnostic| fps_diagnostic.smoothed())
                    {
                        ui.label(egui::RichText::new(format!("{:.0}", fps))
                            .size(26.0)
                            .color(egui::Color32::WHITE));
                    }
                });
            });
    }
}
