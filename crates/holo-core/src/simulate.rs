//! Focal-series image formation through the CTF.

use ndarray::{Array2, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coords::fourier_vectors;
use crate::ctf::{contrast_transfer, CtfSettings};
use crate::error::{HoloError, Result};
use crate::fft::{fft2d, ifft2d, FftNorm};
use crate::image::{assemble, Image};

/// Settings for [`simulate_focal_series`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// CTF request; `defoci` sets the planes to simulate.
    pub ctf: CtfSettings,
    /// RMS illumination semi-angle (rad) for the spatial-coherence envelope.
    pub coherence_angle: Option<f64>,
    /// Accepted for interface compatibility; computation always runs on the CPU.
    pub use_gpu: bool,
}

/// Complex wave `amplitude * exp(i * phase)`, keeping the amplitude's axes and metadata.
pub fn complex_wave(amplitude: &Image<f64>, phase: &Image<f64>) -> Result<Image<Complex64>> {
    if amplitude.data.shape() != phase.data.shape() {
        return Err(HoloError::ShapeMismatch {
            expected: amplitude.data.shape().to_vec(),
            actual: phase.data.shape().to_vec(),
        });
    }
    let data = Zip::from(&amplitude.data)
        .and(&phase.data)
        .map_collect(|&a, &p| Complex64::from_polar(a, p));
    amplitude.derive(data)
}

/// Intensities of `wave` propagated to every defocus of `config.ctf`.
///
/// The CTF is built on the wave's own geometry; its navigation axes become the
/// navigation axes of the returned series.
pub fn simulate_focal_series(
    wave: &Image<Complex64>,
    config: &SimulationConfig,
) -> Result<Image<f64>> {
    if config.use_gpu {
        warn!("GPU simulation requested; running on the CPU");
    }
    let ctf = contrast_transfer(wave, &config.ctf)?;
    simulate_with_ctf(wave, &ctf, config.coherence_angle)
}

/// Intensities `|IFFT(FFT(wave) * CTF * E)|^2` for every slice of a precomputed CTF.
pub fn simulate_with_ctf(
    wave: &Image<Complex64>,
    ctf: &Image<Complex64>,
    coherence_angle: Option<f64>,
) -> Result<Image<f64>> {
    if wave.nav_len() != 1 {
        return Err(HoloError::ShapeMismatch {
            expected: vec![wave.signal.y.size, wave.signal.x.size],
            actual: wave.data.shape().to_vec(),
        });
    }
    if wave.signal_shape() != ctf.signal_shape() {
        return Err(HoloError::ShapeMismatch {
            expected: vec![ctf.signal.y.size, ctf.signal.x.size],
            actual: vec![wave.signal.y.size, wave.signal.x.size],
        });
    }

    let spectrum = wave
        .slices()?
        .into_iter()
        .next()
        .map(|w| fft2d(w.view(), FftNorm::Backward))
        .ok_or(HoloError::EmptySequence)?;
    let transfers = effective_transfer(wave, ctf, coherence_angle)?;

    let intensities: Vec<Array2<f64>> = transfers
        .par_iter()
        .map(|t| {
            let field = ifft2d((&spectrum * t).view(), FftNorm::Backward);
            field.mapv(|v| v.norm_sqr())
        })
        .collect();

    let data = assemble(&ctf.nav_shape(), intensities)?;
    let mut series = Image::new(data, ctf.nav.clone(), wave.signal.clone())?;
    series.metadata = wave.metadata.clone();
    series.metadata.optics = ctf.metadata.optics;

    info!(
        planes = series.nav_len(),
        coherence = ?coherence_angle,
        "Focal series simulated"
    );
    Ok(series)
}

/// CTF slices multiplied by the spatial-coherence envelope, if any.
///
/// For Gaussian-distributed illumination tilts of RMS angle `α`, averaging the
/// defocus phase gives `E = exp(-½ (k0 α Δf)^2 |∇k Chi|^2)` with
/// `|∇k Chi| = k / sqrt(k0^2 - k^2)`; beyond `k0` nothing propagates.
pub fn effective_transfer<T: Clone>(
    geometry: &Image<T>,
    ctf: &Image<Complex64>,
    coherence_angle: Option<f64>,
) -> Result<Vec<Array2<Complex64>>> {
    let slices = ctf.slices()?;
    let Some(alpha) = coherence_angle else {
        return Ok(slices);
    };

    let optics = ctf.metadata.optics.unwrap_or_default();
    let k0 = optics.wavenumber();
    let (kx, ky) = fourier_vectors(geometry);
    let gradient_sq = Array2::from_shape_fn((ky.len(), kx.len()), |(r, c)| {
        let k2 = kx[c] * kx[c] + ky[r] * ky[r];
        let radicand = k0 * k0 - k2;
        if radicand > 0.0 {
            k2 / radicand
        } else {
            f64::INFINITY
        }
    });

    let defoci = ctf.nav.first().map(|a| a.coords()).unwrap_or_default();
    let per_defocus = (slices.len() / defoci.len().max(1)).max(1);

    Ok(slices
        .into_iter()
        .enumerate()
        .map(|(i, slice)| {
            let defocus = defoci.get(i / per_defocus).copied().unwrap_or(0.0);
            let spread = 0.5 * (k0 * alpha * defocus).powi(2);
            Zip::from(&slice).and(&gradient_sq).map_collect(|&t, &g| {
                if g.is_finite() {
                    t * (-spread * g).exp()
                } else {
                    Complex64::new(0.0, 0.0)
                }
            })
        })
        .collect())
}
