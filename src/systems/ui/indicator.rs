use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use crate::config::SpeedTier;

#[derive(Resource)]
pub struct TierIndicator {
    pub tier: SpeedTier,
    pub timer: f32,
    pub duration: f32,
}

impl Default for TierIndicator {
    fn default() -> Self {
        Self {
            tier: SpeedTier::Normal,
            timer: 0.0,
            duration: 2.0,
        }
    }
}

#[derive(Event)]
pub struct TierChangeEvent(pub SpeedTier);

pub fn tier_color(tier: SpeedTier) -> egui::Color32 {
    match tier {
        SpeedTier::Normal => egui::Color32::from_rgb(45, 72, 116),
        SpeedTier::Fast => egui::Color32::from_rgb(50, 91, 34),
        SpeedTier::Dev => egui::Color32::from_rgb(180, 60, 60),
    }
}

pub fn update_tier_indicator(
    mut indicator: ResMut<TierIndicator>,
    mut events: EventReader<TierChangeEvent>,
    time: Res<Time>,
) {
    for event in events.read() {
        indicator.tier = event.0;
        indicator.timer = indicator.duration;
    }

    if indicator.timer > 0.0 {
        indicator.timer = (indicator.timer - time.delta_secs()).max(0.0);
    }
}

pub fn render_tier_indicator(
    indicator: Res<TierIndicator>,
    mut contexts: EguiContexts,
) {
    if indicator.timer <= 0.0 {
        return;
    }

    if let Ok(ctx) = contexts.ctx_mut() {
        let alpha = (indicator.timer / indicator.duration).clamp(0.0, 1.0);
        let bg_color = tier_color(indicator.tier);

        egui::Area::new(egui::Id::new("tier_indicator"))
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 60.0))
            .show(ctx, |ui| {
                let frame = egui::Frame::new()
                    .fill(egui::Color32::from_rgba_unmultiplied(
                        bg_color.r(), bg_color.g(), bg_color.b(),
                        (200.0 * alpha) as u8
                    ))
                    .stroke(egui::Stroke::new(
                        1.5,
                        egui::Color32::from_rgba_unmultiplied(255, 255, 255, (180.0 * alpha) as u8)
                    ))
                    .inner_margin(egui::Margin::symmetric(20, 10))
                    .corner_radius(egui::CornerRadius::same(8));

                frame.show(ui, |ui| {
                    ui.label(egui::RichText::new(indicator.tier.label().to_uppercase())
                        .size(18.0)
                        .color(egui::Color32::from_rgba_unmultiplied(255, 255, 255, (255.0 * alpha) as u8))
                        .strong());
                });
            });
    }
}
