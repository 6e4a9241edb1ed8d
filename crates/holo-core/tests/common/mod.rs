#![allow(dead_code)]

use std::f64::consts::TAU;

use ndarray::{Array2, ArrayD};
use num_complex::Complex64;

use holo_core::ctf::{CtfSettings, OpticalParams};
use holo_core::image::Image;
use holo_core::simulate::{complex_wave, SimulationConfig};

/// Deterministic values in `[0, 1)` from a 64-bit LCG, so tests never depend
/// on an RNG crate or on thread scheduling.
pub fn pseudo_random(h: usize, w: usize, seed: u64) -> Array2<f64> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    Array2::from_shape_fn((h, w), |_| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    })
}

/// Strictly positive intensities, `1 + noise`.
pub fn positive_image(h: usize, w: usize, seed: u64) -> Image<f64> {
    Image::from(pseudo_random(h, w, seed).mapv(|v| 1.0 + v))
}

/// Smooth, periodic phase pattern with peak-to-peak `2 * strength`.
pub fn smooth_phase(h: usize, w: usize, strength: f64) -> Array2<f64> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let x = TAU * c as f64 / w as f64;
        let y = TAU * r as f64 / h as f64;
        strength * (0.6 * x.sin() * (2.0 * y).cos() + 0.4 * (x + y).cos())
    })
}

/// Unit-amplitude phase object.
pub fn phase_object(h: usize, w: usize, strength: f64) -> (Image<f64>, Image<f64>, Image<Complex64>) {
    let amplitude = Image::from(Array2::<f64>::ones((h, w)));
    let phase = Image::from(smooth_phase(h, w, strength));
    let wave = complex_wave(&amplitude, &phase).unwrap();
    (amplitude, phase, wave)
}

/// Optics under which every FFT frequency of a unit-scale grid passes the
/// aperture: `k <= π * sqrt(2) < k0 = 2π`.
pub fn open_optics() -> OpticalParams {
    OpticalParams::default()
}

pub fn simulation_config(defoci: &[f64]) -> SimulationConfig {
    SimulationConfig {
        ctf: CtfSettings::default()
            .with_defoci(defoci.to_vec())
            .with_optics(&open_optics()),
        ..SimulationConfig::default()
    }
}

pub fn max_abs_diff(a: &ArrayD<f64>, b: &ArrayD<f64>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "shape mismatch in comparison");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

pub fn max_abs_diff_complex(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "shape mismatch in comparison");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

/// Population standard deviation.
pub fn std_dev(values: &ArrayD<f64>) -> f64 {
    let n = values.len() as f64;
    let mean = values.sum() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
