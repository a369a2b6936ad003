//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;

use geo::{Intersects, Point};
use regionjoin::pip::parse_wkt;
use regionjoin::{GeoPoint, RegionSpec, OUTSIDE_LABEL};

/// xorshift64* generator, deterministic across platforms
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in [lo, hi)
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        lo + unit * (hi - lo)
    }
}

pub fn random_points(n: usize, seed: u64, lo: f64, hi: f64) -> Vec<GeoPoint> {
    let mut rng = Rng::new(seed);
    (0..n)
        .map(|_| {
            let lat = rng.range(lo, hi);
            let lon = rng.range(lo, hi);
            GeoPoint::new(lat, lon)
        })
        .collect()
}

fn ring_text(ring: &[(f64, f64)]) -> String {
    let mut parts: Vec<String> = ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    if let Some(first) = parts.first().cloned() {
        parts.push(first);
    }
    format!("({})", parts.join(", "))
}

pub fn polygon_wkt(exterior: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> String {
    let mut rings = vec![ring_text(exterior)];
    rings.extend(holes.iter().map(|h| ring_text(h)));
    format!("POLYGON({})", rings.join(", "))
}

/// Axis-aligned square as an open ring
pub fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
    vec![(x0, y0), (x0, y1), (x1, y1), (x1, y0)]
}

/// Star-shaped simple ring around (cx, cy)
pub fn star(cx: f64, cy: f64, r_in: f64, r_out: f64, spikes: usize, phase: f64) -> Vec<(f64, f64)> {
    (0..spikes * 2)
        .map(|k| {
            let r = if k % 2 == 0 { r_out } else { r_in };
            let a = phase + PI * k as f64 / spikes as f64;
            (cx + r * a.cos(), cy + r * a.sin())
        })
        .collect()
}

/// `side * side` irregular regions on a 10-unit grid. Neighbours overlap and
/// every third region has a square hole around its centre.
pub fn grid_regions(side: usize) -> Vec<RegionSpec> {
    let mut regions = Vec::with_capacity(side * side);
    for j in 0..side {
        for i in 0..side {
            let n = j * side + i;
            let (cx, cy) = (i as f64 * 10.0, j as f64 * 10.0);
            let exterior = star(cx, cy, 4.0, 7.0, 5 + n % 4, n as f64 * 0.37);
            let holes = if n % 3 == 0 {
                vec![square(cx - 1.5, cy - 1.5, cx + 1.5, cy + 1.5)]
            } else {
                vec![]
            };
            regions.push(RegionSpec::new(
                format!("R{:02}", n),
                polygon_wkt(&exterior, &holes),
            ));
        }
    }
    regions
}

/// Sequential oracle built on geo's own predicate.
pub fn reference_labels(points: &[GeoPoint], regions: &[RegionSpec]) -> Vec<String> {
    let parsed: Vec<_> = regions
        .iter()
        .filter_map(|r| parse_wkt(&r.wkt).ok().map(|g| (r.name.clone(), g)))
        .collect();

    points
        .iter()
        .map(|p| {
            let point = Point::new(p.lon, p.lat);
            parsed
                .iter()
                .find(|(_, g)| g.intersects(&point))
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| OUTSIDE_LABEL.to_string())
        })
        .collect()
}
