use bevy::prelude::*;
use rand::Rng;

use crate::config::{PALETTE_COUNT, PALETTE_STEPS, POOL_SOFT_CAPACITY, WALL_FADE_RATE, WALL_FADE_STEPS};
use crate::systems::artifacts::{ArtifactPool, Tint};
use crate::systems::grid::RegionId;
use crate::systems::pool::PoolId;

/// Per-region colour gradients, from washed out to the region's final colour.
#[derive(Resource, Debug, Clone)]
pub struct Palettes {
    gradients: Vec<Vec<Color>>,
}

impl Palettes {
    /// Draws [`PALETTE_COUNT`] gradients whose hues share one random window of the wheel.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let hue_min: f32 = rng.random();
        let hue_range: f32 = rng.random_range(0.2..0.35);

        let gradients = (0..PALETTE_COUNT)
            .map(|_| {
                // wraps past 1.0 back to the start of the wheel
                let hue = (hue_min + rng.random::<f32>() * hue_range).fract();
                let saturation = rng.random_range(0.75..=1.0);
                let value = rng.random_range(0.75..=1.0);
                (0..PALETTE_STEPS)
                    .map(|step| {
                        let t = step as f32 / (PALETTE_STEPS - 1) as f32;
                        Color::hsv(hue * 360.0, saturation * t, value)
                    })
                    .collect()
            })
            .collect();

        Self { gradients }
    }

    pub fn palette_for(region: RegionId) -> u16 {
        (region.code() as usize % PALETTE_COUNT) as u16
    }

    pub fn color(&self, palette: u16, step: u16) -> Color {
        self.gradients
            .get(palette as usize)
            .and_then(|gradient| gradient.get(step as usize))
            .copied()
            .unwrap_or(Color::WHITE)
    }

    pub fn final_color(&self, palette: u16) -> Color {
        self.color(palette, (PALETTE_STEPS - 1) as u16)
    }

    pub fn len(&self) -> usize {
        self.gradients.len()
    }
}

/// Colour red to blue for a wall fade step.
pub fn wall_color(step: u16) -> Color {
    let t = step as f32 / WALL_FADE_STEPS as f32;
    Color::srgb(1.0 - t, 0.0, t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeGradient {
    Region { palette: u16 },
    Wall,
}

/// How long a fade lasts and how many distinct colours it shows on the way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTiming {
    pub duration: f32,
    pub steps: usize,
}

impl FadeTiming {
    pub fn walls() -> Self {
        Self {
            duration: WALL_FADE_STEPS as f32 / WALL_FADE_RATE,
            steps: WALL_FADE_STEPS,
        }
    }
}

#[derive(Debug)]
struct Fader {
    id: PoolId,
    elapsed: f32,
    shown: Option<usize>,
    gradient: FadeGradient,
}

/// Advances the colour of freshly spawned artifacts until they settle.
///
/// Artifacts that are recycled mid-fade are dropped on the next advance since their
/// handle no longer resolves.
#[derive(Debug)]
pub struct FadeController {
    faders: Vec<Fader>,
}

impl Default for FadeController {
    fn default() -> Self {
        Self { faders: Vec::with_capacity(POOL_SOFT_CAPACITY) }
    }
}

impl FadeController {
    /// Starts fading an artifact. It stays flagged as fading until the last step.
    pub fn track(&mut self, id: PoolId, gradient: FadeGradient, pool: &mut ArtifactPool) {
        if let Some(artifact) = pool.get_mut(id) {
            artifact.fading = true;
            self.faders.push(Fader { id, elapsed: 0.0, shown: None, gradient });
        }
    }

    /// Moves every fade forward by `dt` seconds.
    ///
    /// # Returns
    /// How many fades finished during this call
    pub fn advance(&mut self, dt: f32, timing: FadeTiming, pool: &mut ArtifactPool) -> usize {
        let steps = timing.steps.max(1);
        let mut finished = 0;
        let mut i = self.faders.len();

        while i > 0 {
            i -= 1;
            let fader = &mut self.faders[i];
            if !pool.is_live(fader.id) {
                self.faders.swap_remove(i);
                continue;
            }

            fader.elapsed += dt;
            let step = (fader.elapsed / timing.duration.max(f32::EPSILON) * steps as f32) as usize;

            if step >= steps {
                if let Some(artifact) = pool.get_mut(fader.id) {
                    artifact.tint = settled_tint(fader.gradient);
                    artifact.fading = false;
                }
                self.faders.swap_remove(i);
                finished += 1;
                continue;
            }

            if fader.shown != Some(step) {
                fader.shown = Some(step);
                if let Some(artifact) = pool.get_mut(fader.id) {
                    artifact.tint = step_tint(fader.gradient, step, steps);
                }
            }
        }

        finished
    }

    pub fn len(&self) -> usize {
        self.faders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faders.is_empty()
    }
}

// fewer steps sample the full gradient evenly
fn step_tint(gradient: FadeGradient, step: usize, steps: usize) -> Tint {
    match gradient {
        FadeGradient::Region { palette } => Tint::Gradient {
            palette,
            step: (step * PALETTE_STEPS / steps) as u16,
        },
        FadeGradient::Wall => Tint::Wall((step * WALL_FADE_STEPS / steps) as u16),
    }
}

fn settled_tint(gradient: FadeGradient) -> Tint {
    match gradient {
        FadeGradient::Region { palette } => Tint::Final { palette },
        FadeGradient::Wall => Tint::Wall((WALL_FADE_STEPS - 1) as u16),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn timing() -> FadeTiming {
        FadeTiming { duration: 1.0, steps: 5 }
    }

    #[test]
    fn fades_walk_the_gradient_then_settle() {
        let mut pool = ArtifactPool::with_capacity(4, 8);
        let mut fades = FadeController::default();
        let id = pool.acquire();
        fades.track(id, FadeGradient::Region { palette: 3 }, &mut pool);
        assert!(pool.get(id).unwrap().fading);

        fades.advance(0.1, timing(), &mut pool);
        assert_eq!(pool.get(id).unwrap().tint, Tint::Gradient { palette: 3, step: 0 });

        fades.advance(0.5, timing(), &mut pool);
        assert_eq!(pool.get(id).unwrap().tint, Tint::Gradient { palette: 3, step: 9 });

        assert_eq!(fades.advance(0.5, timing(), &mut pool), 1);
        let artifact = pool.get(id).unwrap();
        assert_eq!(artifact.tint, Tint::Final { palette: 3 });
        assert!(!artifact.fading);
        assert!(fades.is_empty());
    }

    #[test]
    fn recycled_artifacts_are_left_alone() {
        let mut pool = ArtifactPool::with_capacity(4, 8);
        let mut fades = FadeController::default();
        let id = pool.acquire();
        fades.track(id, FadeGradient::Wall, &mut pool);
        pool.release(id);

        let reused = pool.acquire();
        assert_eq!(fades.advance(2.0, FadeTiming::walls(), &mut pool), 0);
        assert!(fades.is_empty());
        assert_eq!(pool.get(reused).unwrap().tint, Tint::Neutral);
    }

    #[test]
    fn palettes_end_on_saturated_colours() {
        let mut rng = StdRng::seed_from_u64(11);
        let palettes = Palettes::generate(&mut rng);
        assert_eq!(palettes.len(), PALETTE_COUNT);

        for palette in 0..PALETTE_COUNT as u16 {
            let first = Hsva::from(palettes.color(palette, 0));
            let last = Hsva::from(palettes.final_color(palette));
            assert!(first.saturation < 1e-4);
            assert!(last.saturation >= 0.75 - 1e-4);
            assert!(last.value >= 0.75 - 1e-4);
        }
        assert_eq!(Palettes::palette_for(RegionId::new(102).unwrap()), 2);
    }
}
