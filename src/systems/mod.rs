use bevy::prelude::*;

pub mod artifacts;
pub mod export;
pub mod grid;
pub mod mesh;
pub mod pool;
pub mod propagation;
pub mod tasks;
pub mod ui;
pub mod walls;

/// Stages of one demo run, in order.
#[derive(States, Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoPhase {
    #[default]
    DrawingWalls,
    Labeling,
    Propagating,
    Finished,
}

impl DemoPhase {
    pub fn caption(self) -> &'static str {
        match self {
            DemoPhase::DrawingWalls => "Drawing walls",
            DemoPhase::Labeling => "Finding regions",
            DemoPhase::Propagating => "Growing regions",
            DemoPhase::Finished => "Done",
        }
    }
}

pub fn log_phase_changes(mut transitions: EventReader<StateTransitionEvent<DemoPhase>>) {
    for transition in transitions.read() {
        if let (Some(from), Some(to)) = (transition.exited, transition.entered) {
            info!("Phase {:?} -> {:?}", from, to);
        }
    }
}
