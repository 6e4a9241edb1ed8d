mod common;

use ndarray::Array2;
use num_complex::Complex64;

use holo_core::ctf::contrast_transfer;
use holo_core::error::HoloError;
use holo_core::image::Image;
use holo_core::retrieval::{GerchbergSaxton, PhaseRetrieval};
use holo_core::simulate::{simulate_focal_series, simulate_with_ctf};

use common::{max_abs_diff, max_abs_diff_complex, phase_object, simulation_config, smooth_phase};

const DEFOCI: [f64; 3] = [-6.0, 0.0, 6.0];

/// Sum of squared amplitude misfits of `wave` against every plane of `series`.
fn amplitude_misfit(wave: &Image<Complex64>, series: &Image<f64>, ctf: &Image<Complex64>) -> f64 {
    let simulated = simulate_with_ctf(wave, ctf, None).unwrap();
    simulated
        .data
        .iter()
        .zip(series.data.iter())
        .map(|(s, m)| (s.sqrt() - m.sqrt()).powi(2))
        .sum()
}

#[test]
fn test_name() {
    assert_eq!(GerchbergSaxton::default().name(), "Gerchberg-Saxton");
    assert_eq!(GerchbergSaxton::default().iterations, 5);
}

#[test]
fn test_true_wave_is_a_fixed_point() {
    let (_, _, wave) = phase_object(16, 16, 0.7);
    let config = simulation_config(&DEFOCI);
    let series = simulate_focal_series(&wave, &config).unwrap();

    let gs = GerchbergSaxton::new(3)
        .with_ctf_settings(config.ctf.clone())
        .with_initial_wave(wave.clone());
    let result = gs.retrieve(&series).unwrap();

    assert_eq!(result.wave.data.shape(), &[16, 16]);
    assert!(result.phase.is_none());
    assert!(max_abs_diff_complex(&result.wave.data, &wave.data) < 1e-9);
}

#[test]
fn test_iterations_reduce_amplitude_misfit() {
    let (_, _, wave) = phase_object(24, 24, 0.6);
    let config = simulation_config(&DEFOCI);
    let series = simulate_focal_series(&wave, &config).unwrap();
    let ctf = contrast_transfer(&series.signal_plane().unwrap(), &config.ctf).unwrap();

    let start = GerchbergSaxton::new(0).with_ctf(ctf.clone()).retrieve(&series).unwrap();
    let refined = GerchbergSaxton::new(15).with_ctf(ctf.clone()).retrieve(&series).unwrap();

    let before = amplitude_misfit(&start.wave, &series, &ctf);
    let after = amplitude_misfit(&refined.wave, &series, &ctf);
    assert!(after < before, "misfit grew: {before} -> {after}");
}

#[test]
fn test_phase_hint_unwraps_large_phase() {
    // Peak-to-peak phase of 8 rad wraps several times.
    let phase = Image::from(smooth_phase(16, 16, 4.0));
    let amplitude = Image::from(Array2::<f64>::ones((16, 16)));
    let wave = holo_core::simulate::complex_wave(&amplitude, &phase).unwrap();
    let config = simulation_config(&DEFOCI);
    let series = simulate_focal_series(&wave, &config).unwrap();

    let result = GerchbergSaxton::new(2)
        .with_ctf_settings(config.ctf.clone())
        .with_initial_phase(phase.clone())
        .retrieve(&series)
        .unwrap();

    let retrieved = result.phase.expect("a phase hint yields a phase");
    assert!(max_abs_diff(&retrieved.data, &phase.data) < 1e-6);
    assert!(retrieved.data.iter().any(|&p| p > std::f64::consts::PI));
}

#[test]
fn test_defoci_taken_from_series_axis() {
    let (_, _, wave) = phase_object(8, 8, 0.4);
    let series = simulate_focal_series(&wave, &simulation_config(&DEFOCI)).unwrap();
    // No CTF and no defoci in the settings: the series' own defocus axis is used.
    let result = GerchbergSaxton::new(1).retrieve(&series).unwrap();
    assert_eq!(result.wave.data.shape(), &[8, 8]);
    assert!(result.wave.metadata.optics.is_some());
}

#[test]
fn test_explicit_defoci_with_series_defocus_axis() {
    let (_, _, wave) = phase_object(8, 8, 0.4);
    let config = simulation_config(&DEFOCI);
    let series = simulate_focal_series(&wave, &config).unwrap();
    assert_eq!(series.nav.len(), 1);

    // The series' own defocus axis must not be read as astigmatism angles.
    let result = GerchbergSaxton::new(1)
        .with_ctf_settings(config.ctf.clone())
        .retrieve(&series);
    assert!(result.is_ok(), "retrieval failed: {:?}", result.err());
    assert_eq!(result.unwrap().wave.data.shape(), &[8, 8]);

    let plane_ctf = contrast_transfer(&series.signal_plane().unwrap(), &config.ctf).unwrap();
    assert_eq!(plane_ctf.data.shape(), &[3, 8, 8]);
    assert!(GerchbergSaxton::new(1).with_ctf(plane_ctf).retrieve(&series).is_ok());
}

#[test]
fn test_mismatched_ctf_is_rejected() {
    let (_, _, wave) = phase_object(8, 8, 0.4);
    let config = simulation_config(&DEFOCI);
    let series = simulate_focal_series(&wave, &config).unwrap();
    let short_ctf = contrast_transfer(&wave, &simulation_config(&[0.0, 1.0]).ctf).unwrap();

    let result = GerchbergSaxton::new(1).with_ctf(short_ctf).retrieve(&series);
    assert!(matches!(result, Err(HoloError::ShapeMismatch { .. })));
}

#[test]
fn test_series_without_defocus_is_rejected() {
    let single = Image::from(Array2::<f64>::ones((8, 8)));
    let result = GerchbergSaxton::default().retrieve(&single);
    assert!(matches!(result, Err(HoloError::MissingDefocus)));
}

#[test]
fn test_usable_as_trait_object() {
    let (_, _, wave) = phase_object(8, 8, 0.4);
    let series = simulate_focal_series(&wave, &simulation_config(&DEFOCI)).unwrap();
    let methods: Vec<Box<dyn PhaseRetrieval>> = vec![Box::new(GerchbergSaxton::new(1))];
    for method in &methods {
        let result = method.retrieve(&series).unwrap();
        assert_eq!(result.wave.signal, series.signal, "{}", method.name());
    }
}
