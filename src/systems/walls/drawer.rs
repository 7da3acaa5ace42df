use bevy::prelude::*;
use rand::Rng;

use crate::config::{WALL_DRAWER_COOLDOWN_MAX, WALL_DRAWER_COOLDOWN_MIN, WALL_DRAWER_MAX_ANGLE, WALL_DRAWER_TURN_SPEED};

/// A point that wanders from z = 0 towards the far edge of the grid,
/// leaving a wall behind it.
///
/// Headings are in degrees, 0 pointing along +z and positive turning towards +x.
#[derive(Debug, Clone)]
pub struct WallDrawer {
    /// x and z on the grid plane
    pub position: Vec2,
    heading: f32,
    target: f32,
    cooldown: f32,
    last: IVec2,
    done: bool,
}

fn random_heading<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random_range(-WALL_DRAWER_MAX_ANGLE..WALL_DRAWER_MAX_ANGLE)
}

fn random_cooldown<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random_range(WALL_DRAWER_COOLDOWN_MIN..WALL_DRAWER_COOLDOWN_MAX)
}

impl WallDrawer {
    pub fn new<R: Rng + ?Sized>(x: f32, rng: &mut R) -> Self {
        Self {
            position: Vec2::new(x, 0.0),
            heading: random_heading(rng),
            target: random_heading(rng),
            cooldown: random_cooldown(rng),
            last: IVec2::new(x.round() as i32, 0),
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    /// Moves the drawer for `dt` seconds at `speed` units per second inside a
    /// `size.x` by `size.y` world and pushes every cell it crossed onto `crossed`.
    ///
    /// Cells are crossed along x at the previous row first, then along z at the new column,
    /// so a fast step still leaves a 4-connected wall.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        speed: f32,
        size: IVec2,
        rng: &mut R,
        crossed: &mut Vec<IVec2>,
    ) {
        if self.done {
            return;
        }

        let max_turn = WALL_DRAWER_TURN_SPEED * dt;
        self.heading += (self.target - self.heading).clamp(-max_turn, max_turn);

        let radians = self.heading.to_radians();
        let direction = Vec2::new(radians.sin(), radians.cos());
        self.position += direction * speed * dt;
        self.position.x = self.position.x.clamp(0.0, size.x as f32);
        self.position.y = self.position.y.min(size.y as f32);

        let x = self.position.x.round() as i32;
        let z = self.position.y.floor() as i32;

        let step = (x - self.last.x).signum();
        let mut cx = self.last.x;
        while cx != x {
            cx += step;
            crossed.push(IVec2::new(cx, self.last.y));
        }
        for cz in (self.last.y + 1)..=z {
            crossed.push(IVec2::new(x, cz));
        }
        self.last = IVec2::new(x, z.max(self.last.y));

        if z > size.y - 1 {
            self.done = true;
        }

        self.cooldown -= dt;
        if self.cooldown < 0.0 {
            self.cooldown = random_cooldown(rng);
            self.target = random_heading(rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    const SIZE: IVec2 = IVec2::new(200, 200);

    fn walk(drawer: &mut WallDrawer, speed: f32, rng: &mut StdRng) -> Vec<IVec2> {
        let mut crossed = Vec::new();
        let mut steps = 0;
        while !drawer.is_done() {
            drawer.advance(1.0 / 64.0, speed, SIZE, rng, &mut crossed);
            steps += 1;
            assert!(steps < 100_000, "drawer never reached the far edge");
        }
        crossed
    }

    #[test]
    fn drawers_reach_the_far_edge_with_a_connected_wall() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut drawer = WallDrawer::new(100.0, &mut rng);
        let crossed = walk(&mut drawer, 79.0, &mut rng);

        let first = crossed.first().copied().unwrap();
        assert!(first.y <= 1);
        assert!(crossed.iter().any(|c| c.y == SIZE.y));
        // each cell touches the previous one
        for pair in crossed.windows(2) {
            let d = (pair[1] - pair[0]).abs();
            assert_eq!(d.x + d.y, 1, "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn fast_steps_leave_no_gaps() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut drawer = WallDrawer::new(50.0, &mut rng);
        let mut crossed = Vec::new();
        while !drawer.is_done() {
            drawer.advance(0.25, 300.0, SIZE, &mut rng, &mut crossed);
        }
        let rows: HashSet<i32> = crossed.iter().map(|c| c.y).collect();
        for z in 1..=SIZE.y {
            assert!(rows.contains(&z), "row {z} skipped");
        }
    }

    #[test]
    fn drawers_stay_inside_the_world() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut drawer = WallDrawer::new(0.0, &mut rng);
        for cell in walk(&mut drawer, 200.0, &mut rng) {
            assert!((0..=SIZE.x).contains(&cell.x));
            assert!((0..=SIZE.y).contains(&cell.y));
        }
        assert!(drawer.heading().abs() <= WALL_DRAWER_MAX_ANGLE);
    }
}
