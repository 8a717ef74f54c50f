//! Trait space: points inside an n-dimensional ball around the origin.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::SimError;

/// Returns `true` if `xs` lies strictly inside the ball of `radius`.
pub fn in_sphere(xs: &[f64], radius: f64) -> bool {
    xs.iter().map(|x| x * x).sum::<f64>() < radius * radius
}

/// Euclidean distance between two trait vectors.
///
/// Only the common prefix of the two vectors is compared.
pub fn euclidean_distance(xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Fraction of the cube `[-r, r]^n` covered by its inscribed ball, which is
/// the acceptance rate of [`random_in_sphere`].
pub fn ball_acceptance(n: usize) -> f64 {
    // p(n) = p(n - 2) * pi / (2n), with p(0) = p(1) = 1.
    let mut p = [1.0_f64, 1.0];
    for k in 2..=n {
        p[k % 2] *= std::f64::consts::PI / (2 * k) as f64;
    }
    p[n % 2]
}

/// Draws a uniformly distributed point inside the ball of `radius`.
///
/// Points are drawn in the cube `[-radius, radius]^n` and rejected until
/// one falls inside the ball.
///
/// ### Errors
/// [`SimError::TraitSamplingExhausted`] if `max_attempts` draws all land
/// outside the ball.
pub fn random_in_sphere(
    rng: &mut impl Rng,
    n: usize,
    radius: f64,
    max_attempts: usize,
) -> Result<Vec<f64>, SimError> {
    let mut xs = vec![0.0; n];
    for _ in 0..max_attempts {
        for x in &mut xs {
            *x = rng.random_range(-radius..=radius);
        }
        if in_sphere(&xs, radius) {
            return Ok(xs);
        }
    }
    Err(SimError::TraitSamplingExhausted {
        attempts: max_attempts,
    })
}

/// Perturbs `xs` with independent normal noise, staying inside the ball.
///
/// A perturbed candidate is drawn from the current vector and accepted only
/// if it lies inside the ball of `radius`; otherwise a new candidate is
/// drawn, up to `max_attempts` times.
///
/// ### Returns
/// `true` if a candidate was accepted, `false` if every attempt fell
/// outside and `xs` was left unchanged.
pub fn white_noise(
    xs: &mut [f64],
    rng: &mut impl Rng,
    noise: &Normal<f64>,
    radius: f64,
    max_attempts: usize,
) -> bool {
    let mut candidate = xs.to_vec();
    for _ in 0..max_attempts {
        for (c, x) in candidate.iter_mut().zip(xs.iter()) {
            *c = x + noise.sample(rng);
        }
        if in_sphere(&candidate, radius) {
            xs.copy_from_slice(&candidate);
            return true;
        }
    }
    false
}
