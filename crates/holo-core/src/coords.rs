//! Real-space and reciprocal-space coordinates of an image's signal plane.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use crate::error::{HoloError, Result};
use crate::image::{Axis, Image};

/// Extra origin shift for one signal axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shift {
    /// Whole pixels, converted with the axis scale.
    Pixels(i64),
    /// Already in physical units.
    Physical(f64),
}

impl Shift {
    fn resolve(self, scale: f64) -> f64 {
        match self {
            Shift::Pixels(n) => n as f64 * scale,
            Shift::Physical(v) => v,
        }
    }
}

/// Real-space coordinate vectors `(x, y)` of the signal axes.
///
/// With `shifted`, half of each axis span is subtracted so that an image with
/// zero offsets has its origin in the middle. `shifts`, when given, must hold
/// exactly one entry per signal axis (`[x, y]`).
pub fn real_space_coords<T: Clone>(
    image: &Image<T>,
    shifted: bool,
    shifts: Option<&[Shift]>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if let Some(s) = shifts {
        if s.len() != 2 {
            return Err(HoloError::ShiftLength(s.len()));
        }
    }

    let axes = [&image.signal.x, &image.signal.y];
    let mut coords = axes.map(|axis| axis.coords());

    if shifted {
        for (c, axis) in coords.iter_mut().zip(axes) {
            let span = c
                .iter()
                .map(|v| v - axis.offset)
                .fold(f64::NEG_INFINITY, f64::max);
            if span.is_finite() {
                c.iter_mut().for_each(|v| *v -= 0.5 * span);
            }
        }
    }

    if let Some(s) = shifts {
        for ((c, axis), shift) in coords.iter_mut().zip(axes).zip(s) {
            let amount = shift.resolve(axis.scale);
            c.iter_mut().for_each(|v| *v -= amount);
        }
    }

    let [x, y] = coords;
    Ok((x, y))
}

/// Output selector for [`fourier_space_coords`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FourierMode {
    /// `|k|^2` mesh.
    Square,
    /// `kx`, `ky` vectors.
    Vectors,
    /// Mesh and vectors.
    Both,
}

impl FromStr for FourierMode {
    type Err = HoloError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "square" => Ok(Self::Square),
            "vectors" => Ok(Self::Vectors),
            "both" => Ok(Self::Both),
            other => Err(HoloError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for FourierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Square => write!(f, "square"),
            Self::Vectors => write!(f, "vectors"),
            Self::Both => write!(f, "both"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum FourierCoords {
    Square(Array2<f64>),
    Vectors {
        kx: Vec<f64>,
        ky: Vec<f64>,
    },
    Both {
        k2: Array2<f64>,
        kx: Vec<f64>,
        ky: Vec<f64>,
    },
}

/// Reciprocal-space coordinates with spacing `2π/(N·d)`, zero frequency at index 0.
pub fn fourier_space_coords<T: Clone>(image: &Image<T>, mode: FourierMode) -> FourierCoords {
    let (kx, ky) = fourier_vectors(image);
    match mode {
        FourierMode::Vectors => FourierCoords::Vectors { kx, ky },
        FourierMode::Square => FourierCoords::Square(k_squared(&kx, &ky)),
        FourierMode::Both => FourierCoords::Both {
            k2: k_squared(&kx, &ky),
            kx,
            ky,
        },
    }
}

/// Angular wavenumber vectors `(kx, ky)` in FFT order.
pub fn fourier_vectors<T: Clone>(image: &Image<T>) -> (Vec<f64>, Vec<f64>) {
    (
        fft_frequencies(image.signal.x.size, image.signal.x.scale, TAU),
        fft_frequencies(image.signal.y.size, image.signal.y.scale, TAU),
    )
}

/// Spatial-frequency vectors `(qx, qy)` (`|q| = 1/r`) in FFT order.
pub fn frequency_vectors<T: Clone>(image: &Image<T>) -> (Vec<f64>, Vec<f64>) {
    (
        fft_frequencies(image.signal.x.size, image.signal.x.scale, 1.0),
        fft_frequencies(image.signal.y.size, image.signal.y.scale, 1.0),
    )
}

/// `kx^2 + ky^2` on the `(ny, nx)` grid.
pub fn k_squared(kx: &[f64], ky: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((ky.len(), kx.len()), |(r, c)| kx[c] * kx[c] + ky[r] * ky[r])
}

/// Axis describing the transform of `axis`: FFT-ordered frequencies with
/// reciprocal units.
pub fn reciprocal_axis(axis: &Axis) -> Axis {
    let mut out = Axis::from_values(&fft_frequencies(axis.size, axis.scale, 1.0));
    out.name = axis.name.clone();
    out.units = axis.units.as_ref().map(|u| format!("1 / {u}"));
    out
}

/// Centered vector `dk * (i - floor(n/2))`, inverse-shifted so that zero
/// frequency lands at index 0. `period` is `2π` for wavenumbers, 1 for
/// spatial frequencies.
fn fft_frequencies(n: usize, spacing: f64, period: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let dk = period / (n as f64 * spacing);
    let half = n / 2;
    (0..n)
        .map(|i| {
            let centered = (i + half) % n;
            dk * (centered as f64 - half as f64)
        })
        .collect()
}
