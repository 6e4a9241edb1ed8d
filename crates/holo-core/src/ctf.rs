//! Non-paraxial contrast transfer function.
//!
//! The aberration phase follows the Rayleigh-integral propagator
//! `sqrt(k0^2 - k^2)`, which stays valid for high numerical apertures and
//! refractive indices other than 1. Astigmatism is modelled along a rotated
//! frequency direction `ka = kx cos(θ) + ky sin(θ)`.

use std::f64::consts::{PI, TAU};

use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_NUMERICAL_APERTURE, DEFAULT_REFRACTIVE_INDEX, DEFAULT_WAVELENGTH};
use crate::coords::{fourier_vectors, k_squared};
use crate::error::{HoloError, Result};
use crate::image::{assemble, Axis, Image, Metadata, SignalAxes};

/// Optical parameters of the imaging system.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpticalParams {
    pub wavelength: f64,
    pub refractive_index: f64,
    pub numerical_aperture: f64,
    /// Cosine-bell smoothing of the aperture edge, as a fraction of the
    /// aperture size in `k^2`. `None` gives a sharp aperture.
    #[serde(default)]
    pub smoothing: Option<f64>,
}

impl Default for OpticalParams {
    fn default() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            refractive_index: DEFAULT_REFRACTIVE_INDEX,
            numerical_aperture: DEFAULT_NUMERICAL_APERTURE,
            smoothing: None,
        }
    }
}

impl OpticalParams {
    /// Wavenumber in the medium, `n * 2π / λ`.
    pub fn wavenumber(&self) -> f64 {
        self.refractive_index * TAU / self.wavelength
    }

    /// Squared aperture cutoff, `(NA * k0 / n)^2`.
    pub fn aperture_k2(&self) -> f64 {
        let k = self.numerical_aperture * self.wavenumber() / self.refractive_index;
        k * k
    }
}

/// Request for a CTF computation. Every field is optional: defoci and angles
/// fall back to the input's navigation axes, optical parameters to the
/// input's metadata and then to the defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtfSettings {
    pub defoci: Option<Vec<f64>>,
    pub angles: Option<Vec<f64>>,
    pub wavelength: Option<f64>,
    pub refractive_index: Option<f64>,
    pub numerical_aperture: Option<f64>,
    pub smoothing: Option<f64>,
}

impl CtfSettings {
    pub fn with_defoci(mut self, defoci: impl Into<Vec<f64>>) -> Self {
        self.defoci = Some(defoci.into());
        self
    }

    pub fn with_angles(mut self, angles: impl Into<Vec<f64>>) -> Self {
        self.angles = Some(angles.into());
        self
    }

    pub fn with_optics(mut self, optics: &OpticalParams) -> Self {
        self.wavelength = Some(optics.wavelength);
        self.refractive_index = Some(optics.refractive_index);
        self.numerical_aperture = Some(optics.numerical_aperture);
        self.smoothing = optics.smoothing;
        self
    }

    /// Override first, then metadata, then default, per parameter.
    pub fn resolve_optics(&self, metadata: &Metadata) -> OpticalParams {
        let stored = metadata.optics.unwrap_or_default();
        OpticalParams {
            wavelength: self.wavelength.unwrap_or(stored.wavelength),
            refractive_index: self.refractive_index.unwrap_or(stored.refractive_index),
            numerical_aperture: self.numerical_aperture.unwrap_or(stored.numerical_aperture),
            smoothing: self.smoothing.or(stored.smoothing),
        }
    }

    /// Work out which defocus (and angle) values to batch over.
    ///
    /// Defoci come from the settings or the first navigation axis; angles from
    /// the settings or the next navigation axis not already consumed.
    pub fn resolve_batch<T: Clone>(&self, image: &Image<T>) -> Result<CtfBatch> {
        let mut nav = image.nav.iter();
        let defoci = match &self.defoci {
            Some(d) => d.clone(),
            None => match nav.next() {
                Some(axis) => axis.coords(),
                None => {
                    warn!("No defocus value given and the input has no navigation axis");
                    return Err(HoloError::MissingDefocus);
                }
            },
        };
        if defoci.is_empty() {
            return Err(HoloError::MissingDefocus);
        }

        let angles = match &self.angles {
            Some(a) => Some(a.clone()),
            None => nav.next().map(Axis::coords),
        };
        match angles {
            Some(angles) if angles.is_empty() => Err(HoloError::EmptySequence),
            Some(angles) => Ok(CtfBatch::DefocusAngle { defoci, angles }),
            None => Ok(CtfBatch::Defocus(defoci)),
        }
    }
}

/// Batch of CTF slices: one per defocus, or one per (defocus, angle) pair.
#[derive(Clone, Debug, PartialEq)]
pub enum CtfBatch {
    Defocus(Vec<f64>),
    DefocusAngle { defoci: Vec<f64>, angles: Vec<f64> },
}

impl CtfBatch {
    pub fn defoci(&self) -> &[f64] {
        match self {
            Self::Defocus(d) => d,
            Self::DefocusAngle { defoci, .. } => defoci,
        }
    }

    pub fn angles(&self) -> Option<&[f64]> {
        match self {
            Self::Defocus(_) => None,
            Self::DefocusAngle { angles, .. } => Some(angles),
        }
    }

    /// Number of slices produced.
    pub fn len(&self) -> usize {
        self.defoci().len() * self.angles().map_or(1, <[f64]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(defocus, angle)` of every slice in output order (defocus-major).
    fn combinations(&self) -> Vec<(f64, Option<f64>)> {
        match self {
            Self::Defocus(d) => d.iter().map(|&df| (df, None)).collect(),
            Self::DefocusAngle { defoci, angles } => defoci
                .iter()
                .flat_map(|&df| angles.iter().map(move |&a| (df, Some(a))))
                .collect(),
        }
    }
}

/// Aberration phase per unit defocus.
///
/// Without an angle: `sqrt(k0^2 - k^2) - k0`. With an astigmatism angle θ:
/// `sqrt(k0^2 - ka^2) - (sqrt(k0^2 - k^2) + k0) / 2`. Evanescent samples
/// (negative radicand) come out as NaN.
pub fn aberration_phase(kx: &[f64], ky: &[f64], k0: f64, angle: Option<f64>) -> Array2<f64> {
    let k0_sq = k0 * k0;
    match angle {
        None => Array2::from_shape_fn((ky.len(), kx.len()), |(r, c)| {
            let k2 = kx[c] * kx[c] + ky[r] * ky[r];
            (k0_sq - k2).sqrt() - k0
        }),
        Some(theta) => {
            let (sin, cos) = theta.sin_cos();
            Array2::from_shape_fn((ky.len(), kx.len()), |(r, c)| {
                let k2 = kx[c] * kx[c] + ky[r] * ky[r];
                let ka = kx[c] * cos + ky[r] * sin;
                (k0_sq - ka * ka).sqrt() - 0.5 * ((k0_sq - k2).sqrt() + k0)
            })
        }
    }
}

/// Aperture function on a `k^2` mesh: 1 inside `(NA k0 / n)^2`, an optional
/// half-cosine taper out to `(1 + f)` times that, 0 beyond.
pub fn aperture(k2: &Array2<f64>, optics: &OpticalParams) -> Array2<f64> {
    let k2_ap = optics.aperture_k2();
    k2.mapv(|k2| {
        if k2 <= k2_ap {
            return 1.0;
        }
        match optics.smoothing {
            Some(f) if f > 0.0 && k2 < (1.0 + f) * k2_ap => {
                0.5 * (1.0 + (PI * (k2 - k2_ap) / (f * k2_ap)).cos())
            }
            _ => 0.0,
        }
    })
}

/// Contrast transfer function for the signal geometry of `image`.
///
/// Output shape is `[n_defoci, (n_angles,) ny, nx]` in FFT order (zero
/// frequency at index 0). The optical parameters actually used are written to
/// the output metadata.
pub fn contrast_transfer<T: Clone>(
    image: &Image<T>,
    settings: &CtfSettings,
) -> Result<Image<Complex64>> {
    let batch = settings.resolve_batch(image)?;
    let optics = settings.resolve_optics(&image.metadata);
    let (kx, ky) = fourier_vectors(image);
    let k2 = k_squared(&kx, &ky);
    let k0 = optics.wavenumber();
    let ap = aperture(&k2, &optics);

    debug!(
        nx = kx.len(),
        ny = ky.len(),
        slices = batch.len(),
        k0,
        aperture_k2 = optics.aperture_k2(),
        "Building CTF"
    );

    let unshifted = (batch.angles().is_none()).then(|| aberration_phase(&kx, &ky, k0, None));

    let slices: Vec<Array2<Complex64>> = batch
        .combinations()
        .into_par_iter()
        .map(|(defocus, angle)| {
            let chi = match (&unshifted, angle) {
                (Some(chi), None) => chi.clone(),
                _ => aberration_phase(&kx, &ky, k0, angle),
            };
            ctf_slice(&chi, &ap, defocus)
        })
        .collect();

    let mut nav_shape = vec![batch.defoci().len()];
    let mut nav = vec![Axis::from_values(batch.defoci()).with_name("defocus")];
    if let Some(angles) = batch.angles() {
        nav_shape.push(angles.len());
        nav.push(Axis::from_values(angles).with_name("astigmatism angle"));
    }

    let data = assemble(&nav_shape, slices)?;
    let signal = SignalAxes {
        x: reciprocal_wavenumber_axis(&kx, image.signal.x.units.as_deref()),
        y: reciprocal_wavenumber_axis(&ky, image.signal.y.units.as_deref()),
    };
    let mut ctf = Image::new(data, nav, signal)?;
    ctf.metadata = image.metadata.clone();
    ctf.metadata.pad = None;
    ctf.metadata.optics = Some(optics);
    if let CtfBatch::DefocusAngle { defoci, .. } = &batch {
        ctf.metadata.astigmatic_defocus = Some(defoci.clone());
    }

    info!(
        slices = batch.len(),
        wavelength = optics.wavelength,
        refractive_index = optics.refractive_index,
        numerical_aperture = optics.numerical_aperture,
        "CTF computed"
    );
    Ok(ctf)
}

/// `exp(i * chi * defocus) * aperture`; evanescent samples are zeroed.
fn ctf_slice(chi: &Array2<f64>, aperture: &Array2<f64>, defocus: f64) -> Array2<Complex64> {
    ndarray::Zip::from(chi)
        .and(aperture)
        .map_collect(|&chi, &ap| {
            if chi.is_finite() {
                Complex64::from_polar(ap, chi * defocus)
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
}

fn reciprocal_wavenumber_axis(k: &[f64], units: Option<&str>) -> Axis {
    let mut axis = Axis::from_values(k);
    axis.units = units.map(|u| format!("1 / {u}"));
    axis
}
