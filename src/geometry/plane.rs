//! 2D reference configuration space.
//!
//! An axis-aligned rectangle of the plane populated with rectangular and
//! circular obstacles. Collision tests are exact (segment clipping against
//! boxes, point-segment distance against discs), so the engine can be
//! exercised without a physics or collision library.
//!
//! Sampling draws from a seeded `ChaCha8Rng` behind a mutex: two spaces
//! built with the same seed produce the same sample stream.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::GeometryOracle;

// ============================================================================
// Point2
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn lerp(&self, other: &Point2, t: f64) -> Point2 {
        Point2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

// ============================================================================
// Obstacles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Obstacle {
    /// Closed axis-aligned box.
    Rect { min: Point2, max: Point2 },
    /// Closed disc.
    Circle { center: Point2, radius: f64 },
}

impl Obstacle {
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Obstacle::Rect {
            min: Point2::new(min_x.min(max_x), min_y.min(max_y)),
            max: Point2::new(min_x.max(max_x), min_y.max(max_y)),
        }
    }

    pub fn circle(cx: f64, cy: f64, radius: f64) -> Self {
        Obstacle::Circle { center: Point2::new(cx, cy), radius: radius.abs() }
    }

    pub fn contains(&self, p: &Point2) -> bool {
        match self {
            Obstacle::Rect { min, max } => {
                p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
            }
            Obstacle::Circle { center, radius } => center.distance(p) <= *radius,
        }
    }

    /// Distance from `p` to the obstacle; zero when inside.
    pub fn distance_to(&self, p: &Point2) -> f64 {
        match self {
            Obstacle::Rect { min, max } => {
                let dx = (min.x - p.x).max(0.0).max(p.x - max.x);
                let dy = (min.y - p.y).max(0.0).max(p.y - max.y);
                dx.hypot(dy)
            }
            Obstacle::Circle { center, radius } => (center.distance(p) - radius).max(0.0),
        }
    }

    /// Whether the closed segment `a`-`b` touches the obstacle.
    pub fn intersects_segment(&self, a: &Point2, b: &Point2) -> bool {
        match self {
            Obstacle::Rect { min, max } => segment_hits_box(a, b, min, max),
            Obstacle::Circle { center, radius } => {
                point_segment_distance(center, a, b) <= *radius
            }
        }
    }
}

/// Liang-Barsky clip of the segment against a closed box.
fn segment_hits_box(a: &Point2, b: &Point2, min: &Point2, max: &Point2) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, a.x - min.x),
        (dx, max.x - a.x),
        (-dy, a.y - min.y),
        (dy, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return false;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return false;
            }
            t1 = t1.min(r);
        }
    }
    t0 <= t1
}

fn point_segment_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(&a.lerp(b, t))
}

// ============================================================================
// PlaneSpace
// ============================================================================

/// Bounded 2D space with obstacles and a seeded sampler.
pub struct PlaneSpace {
    min: Point2,
    max: Point2,
    obstacles: Vec<Obstacle>,
    rng: Mutex<ChaCha8Rng>,
}

impl PlaneSpace {
    /// Space spanning `[0, width] x [0, height]`.
    pub fn new(width: f64, height: f64, seed: u64) -> Self {
        Self::with_bounds(0.0, 0.0, width, height, seed)
    }

    pub fn with_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64, seed: u64) -> Self {
        Self {
            min: Point2::new(min_x.min(max_x), min_y.min(max_y)),
            max: Point2::new(min_x.max(max_x), min_y.max(max_y)),
            obstacles: Vec::new(),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn in_bounds(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }

    /// Uniform sample over the whole bounds; may land inside an obstacle.
    pub fn sample_uniform(&self) -> Point2 {
        let mut rng = self.rng.lock();
        Point2::new(
            rng.gen_range(self.min.x..=self.max.x),
            rng.gen_range(self.min.y..=self.max.y),
        )
    }

    /// Uniform sample that passes `is_valid`, giving up after `attempts`.
    pub fn sample_valid(&self, attempts: usize) -> Option<Point2> {
        (0..attempts)
            .map(|_| self.sample_uniform())
            .find(|p| self.is_valid(p))
    }

    /// Valid points of a regular grid with the given spacing, row by row.
    pub fn lattice(&self, step: f64) -> Vec<Point2> {
        if step <= 0.0 {
            return Vec::new();
        }
        let cols = ((self.max.x - self.min.x) / step).floor() as usize;
        let rows = ((self.max.y - self.min.y) / step).floor() as usize;
        let mut points = Vec::with_capacity((cols + 1) * (rows + 1));
        for r in 0..=rows {
            for c in 0..=cols {
                let p = Point2::new(self.min.x + c as f64 * step, self.min.y + r as f64 * step);
                if self.is_valid(&p) {
                    points.push(p);
                }
            }
        }
        points
    }
}

impl GeometryOracle for PlaneSpace {
    type State = Point2;

    fn dimension(&self) -> usize {
        2
    }

    fn max_extent(&self) -> f64 {
        self.min.distance(&self.max)
    }

    fn distance(&self, a: &Point2, b: &Point2) -> f64 {
        a.distance(b)
    }

    fn motion_valid(&self, a: &Point2, b: &Point2) -> bool {
        self.is_valid(a)
            && self.is_valid(b)
            && !self.obstacles.iter().any(|o| o.intersects_segment(a, b))
    }

    fn is_valid(&self, state: &Point2) -> bool {
        self.in_bounds(state) && !self.obstacles.iter().any(|o| o.contains(state))
    }

    fn clearance(&self, state: &Point2) -> f64 {
        self.obstacles
            .iter()
            .map(|o| o.distance_to(state))
            .fold(f64::INFINITY, f64::min)
    }

    fn sample_near(&self, anchor: &Point2, radius: f64) -> Point2 {
        let r = radius.abs();
        let offset = {
            let mut rng = self.rng.lock();
            Point2::new(rng.gen_range(-r..=r), rng.gen_range(-r..=r))
        };
        self.clamp(Point2::new(anchor.x + offset.x, anchor.y + offset.y))
    }
}
