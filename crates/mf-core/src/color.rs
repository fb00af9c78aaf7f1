//! Display-color generation for submaps and route segments.
//!
//! Colors are advisory only (a front-end paints each partition / segment in
//! a distinct hue); nothing in the core compares them. Hues step by the
//! golden-ratio conjugate, which spreads consecutive colors across the wheel
//! far better than uniform random draws.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Fractional part of the golden ratio.
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618033988749895;

/// Issues `#rrggbb` hex colors, never repeating one it has already issued.
pub struct ColorWheel {
    issued: Vec<String>,
    hue: f64,
}

impl ColorWheel {
    /// A wheel with a random starting hue.
    pub fn new() -> Self {
        let mut rng = SmallRng::from_entropy();
        Self::with_start_hue(rng.r#gen::<f64>())
    }

    /// A wheel starting at a fixed hue — use for reproducible fixtures.
    pub fn with_start_hue(hue: f64) -> Self {
        Self {
            issued: Vec::new(),
            hue: hue.rem_euclid(1.0),
        }
    }

    /// Next unused color.
    pub fn next_color(&mut self) -> String {
        loop {
            self.hue = (self.hue + GOLDEN_RATIO_CONJUGATE) % 1.0;

            // Fixed saturation / value: distinct hues, consistent intensity.
            let (r, g, b) = hsv_to_rgb(self.hue, 0.5, 0.95);
            let hex = format!(
                "#{:02x}{:02x}{:02x}",
                (r * 255.0) as u8,
                (g * 255.0) as u8,
                (b * 255.0) as u8
            );

            if !self.issued.contains(&hex) {
                self.issued.push(hex.clone());
                return hex;
            }
        }
    }

    /// Colors issued so far, in order.
    pub fn issued(&self) -> &[String] {
        &self.issued
    }
}

impl Default for ColorWheel {
    fn default() -> Self {
        Self::new()
    }
}

/// HSV → RGB, all channels in `[0, 1]`.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
