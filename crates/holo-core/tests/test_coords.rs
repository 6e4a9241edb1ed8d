use std::f64::consts::TAU;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use holo_core::coords::{
    fourier_space_coords, fourier_vectors, frequency_vectors, k_squared, real_space_coords,
    reciprocal_axis, FourierCoords, FourierMode, Shift,
};
use holo_core::error::HoloError;
use holo_core::image::{Axis, Image};

fn blank(h: usize, w: usize) -> Image<f64> {
    Image::from(Array2::<f64>::zeros((h, w)))
}

// ---------------------------------------------------------------------------
// Real space
// ---------------------------------------------------------------------------

#[test]
fn test_unshifted_coords_follow_offset_and_scale() {
    let image = blank(3, 4).with_scales([0.5, 2.0]).with_offsets([1.0, -1.0]);
    let (x, y) = real_space_coords(&image, false, None).unwrap();
    assert_eq!(x, vec![1.0, 1.5, 2.0, 2.5]);
    assert_eq!(y, vec![-1.0, 1.0, 3.0]);
}

#[test]
fn test_shifted_coords_are_centered() {
    let (x, y) = real_space_coords(&blank(4, 5), true, None).unwrap();
    assert_eq!(x, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
    assert_eq!(y, vec![-1.5, -0.5, 0.5, 1.5]);
}

#[test]
fn test_shift_variants() {
    let image = blank(3, 3).with_scales([2.0, 2.0]);
    let shifts = [Shift::Pixels(1), Shift::Physical(0.5)];
    let (x, y) = real_space_coords(&image, false, Some(&shifts[..])).unwrap();
    assert_eq!(x, vec![-2.0, 0.0, 2.0]);
    assert_eq!(y, vec![-0.5, 1.5, 3.5]);
}

#[test]
fn test_wrong_shift_length_is_rejected() {
    let shifts = [Shift::Pixels(0); 3];
    assert!(matches!(
        real_space_coords(&blank(3, 3), true, Some(&shifts[..])),
        Err(HoloError::ShiftLength(3))
    ));
}

#[test]
fn test_irregular_axis_uses_explicit_values() {
    let mut image = blank(1, 3);
    image.signal.x = Axis::from_values(&[0.0, 1.0, 4.0]);
    let (x, _) = real_space_coords(&image, false, None).unwrap();
    assert_eq!(x, vec![0.0, 1.0, 4.0]);
}

// ---------------------------------------------------------------------------
// Fourier space
// ---------------------------------------------------------------------------

#[test]
fn test_mode_parsing() {
    assert_eq!("square".parse::<FourierMode>().unwrap(), FourierMode::Square);
    assert_eq!("vectors".parse::<FourierMode>().unwrap(), FourierMode::Vectors);
    assert_eq!("both".parse::<FourierMode>().unwrap(), FourierMode::Both);
    assert_eq!(FourierMode::Both.to_string(), "both");
    assert!(matches!(
        "radial".parse::<FourierMode>(),
        Err(HoloError::UnknownMode(m)) if m == "radial"
    ));
}

#[test]
fn test_fourier_vectors_have_zero_first_and_fft_order() {
    let image = blank(6, 8).with_scales([0.5, 1.0]);
    let (kx, ky) = fourier_vectors(&image);
    let dkx = TAU / (8.0 * 0.5);
    let dky = TAU / 6.0;

    let expected_x: Vec<f64> = [0, 1, 2, 3, -4, -3, -2, -1].iter().map(|&m| m as f64 * dkx).collect();
    let expected_y: Vec<f64> = [0, 1, 2, -3, -2, -1].iter().map(|&m| m as f64 * dky).collect();
    for (a, b) in kx.iter().zip(&expected_x) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
    for (a, b) in ky.iter().zip(&expected_y) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_square_mesh_shape_and_values() {
    let image = blank(5, 7);
    let FourierCoords::Square(k2) = fourier_space_coords(&image, FourierMode::Square) else {
        panic!("expected a square mesh");
    };
    assert_eq!(k2.dim(), (5, 7));
    let (kx, ky) = fourier_vectors(&image);
    assert_abs_diff_eq!(k2[[2, 3]], kx[3] * kx[3] + ky[2] * ky[2], epsilon = 1e-12);
    assert_eq!(k2[[0, 0]], 0.0);
}

#[test]
fn test_both_mode_is_consistent() {
    let image = blank(4, 6).with_scales([0.3, 0.7]);
    let FourierCoords::Both { k2, kx, ky } = fourier_space_coords(&image, FourierMode::Both) else {
        panic!("expected mesh and vectors");
    };
    assert_eq!(k2, k_squared(&kx, &ky));
}

#[test]
fn test_frequency_vectors_are_wavenumbers_over_two_pi() {
    let image = blank(9, 10).with_scales([0.2, 0.3]);
    let (kx, ky) = fourier_vectors(&image);
    let (qx, qy) = frequency_vectors(&image);
    for (k, q) in kx.iter().zip(&qx).chain(ky.iter().zip(&qy)) {
        assert_abs_diff_eq!(*k, TAU * q, epsilon = 1e-12);
    }
}

#[test]
fn test_reciprocal_axis_units() {
    let axis = Axis::linear(8, 0.5, 0.0).with_units("nm");
    let reciprocal = reciprocal_axis(&axis);
    assert_eq!(reciprocal.units.as_deref(), Some("1 / nm"));
    assert_eq!(reciprocal.size, 8);
    assert_eq!(reciprocal.coords()[0], 0.0);
    assert_abs_diff_eq!(reciprocal.coords()[1], 0.25, epsilon = 1e-12);
}
