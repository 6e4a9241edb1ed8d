//! Statistical comparison of an observed image against an expected one.

use ndarray::{Array2, ArrayD, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binning::{digitize, integrate_image, BinSize, Profile};
use crate::consts::FRC_AXIS_NAME;
use crate::coords::frequency_vectors;
use crate::error::{HoloError, Result};
use crate::fft::{fft2d, fft_image, FftNorm};
use crate::image::{assemble, Image};
use crate::pad::remove_pad;
use crate::simulate::{complex_wave, simulate_focal_series, SimulationConfig};

/// Settings for [`validate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Bin size of the FRC radial integration, in `|q|` units.
    pub bin_size: BinSize,
    /// Remove padding from both images before comparing them.
    pub unpad: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bin_size: BinSize::Auto,
            unpad: true,
        }
    }
}

/// Every statistic of the suite for one image pair.
#[derive(Clone, Debug)]
pub struct ValidationReport {
    pub chi2: Image<f64>,
    pub rvalue: f64,
    pub rmse_real: Image<f64>,
    pub rmse_fourier: Image<f64>,
    pub frc: Profile<f64>,
}

/// An observed/expected pair of identical shape.
///
/// Nothing is cached: every statistic is recomputed from the stored images.
#[derive(Clone, Debug)]
pub struct Validation {
    observed: Image<f64>,
    expected: Image<f64>,
}

impl Validation {
    /// With `unpad`, the pad record of each image (if any) is removed first.
    pub fn new(observed: &Image<f64>, expected: &Image<f64>, unpad: bool) -> Result<Self> {
        let (observed, expected) = if unpad {
            (remove_pad(observed)?, remove_pad(expected)?)
        } else {
            (observed.clone(), expected.clone())
        };
        Self::checked(observed, expected)
    }

    /// Wrap raw arrays; no pad metadata is involved.
    pub fn from_arrays(observed: ArrayD<f64>, expected: ArrayD<f64>) -> Result<Self> {
        Self::checked(Image::from_array(observed)?, Image::from_array(expected)?)
    }

    fn checked(observed: Image<f64>, expected: Image<f64>) -> Result<Self> {
        if observed.data.shape() != expected.data.shape() {
            return Err(HoloError::ShapeMismatch {
                expected: expected.data.shape().to_vec(),
                actual: observed.data.shape().to_vec(),
            });
        }
        Ok(Self { observed, expected })
    }

    pub fn observed(&self) -> &Image<f64> {
        &self.observed
    }

    pub fn expected(&self) -> &Image<f64> {
        &self.expected
    }

    /// `(o - e)^2 / e^2`, elementwise.
    pub fn chi2(&self) -> Result<Image<f64>> {
        let data = Zip::from(&self.observed.data)
            .and(&self.expected.data)
            .map_collect(|&o, &e| (o - e).powi(2) / (e * e));
        self.observed.derive(data)
    }

    /// `Σ|√o - √e| / Σ√e`. Negative intensities make the result NaN.
    pub fn rvalue(&self) -> f64 {
        let (diff, norm) = Zip::from(&self.observed.data)
            .and(&self.expected.data)
            .fold((0.0, 0.0), |(diff, norm), &o, &e| {
                let (so, se) = (o.sqrt(), e.sqrt());
                (diff + (so - se).abs(), norm + se)
            });
        diff / norm
    }

    /// Squared differences of the mean-centered images, in real space and
    /// after an orthonormal FFT.
    ///
    /// The means are taken over the whole array, navigation axes included.
    pub fn rmse_check(&self) -> Result<(Image<f64>, Image<f64>)> {
        let mean_o = self.observed.data.mean().unwrap_or(0.0);
        let mean_e = self.expected.data.mean().unwrap_or(0.0);
        let centered = Zip::from(&self.observed.data)
            .and(&self.expected.data)
            .map_collect(|&o, &e| (o - mean_o) - (e - mean_e));
        let diff = self.observed.derive(centered)?;

        let rmse_real = diff.derive(diff.data.mapv(|d| d * d))?;
        let spectrum = fft_image(&diff, FftNorm::Ortho)?;
        let rmse_fourier = spectrum.derive(spectrum.data.mapv(|v| v.norm_sqr()))?;
        Ok((rmse_real, rmse_fourier))
    }

    /// Fourier ring correlation, one curve per navigation slice.
    ///
    /// The cross-correlation `Re(Fo conj(Fe))` and both power spectra are
    /// summed over the same rings of the unshifted `|q|` mesh, then
    /// `FRC = xc / sqrt(ac_o ac_e)`. Rings where both spectra vanish are NaN.
    pub fn fourier_ring_correlation(&self, bin_size: BinSize) -> Result<Profile<f64>> {
        let obs = self.observed.stacked()?;
        let exp = self.expected.stacked()?;

        let mut xc = Vec::with_capacity(self.observed.nav_len());
        let mut ac_o = Vec::with_capacity(self.observed.nav_len());
        let mut ac_e = Vec::with_capacity(self.observed.nav_len());
        for (o, e) in obs.outer_iter().zip(exp.outer_iter()) {
            let fo = fft2d(o, FftNorm::Backward);
            let fe = fft2d(e, FftNorm::Backward);
            xc.push(Zip::from(&fo).and(&fe).map_collect(|&a, &b| (a * b.conj()).re));
            ac_o.push(fo.mapv(|v| v.norm_sqr()));
            ac_e.push(fe.mapv(|v| v.norm_sqr()));
        }

        let (qx, qy) = frequency_vectors(&self.observed);
        let q = Array2::from_shape_fn((qy.len(), qx.len()), |(r, c)| qx[c].hypot(qy[r]));
        let (ny, nx) = self.observed.signal_shape();
        let q_scales = [
            1.0 / (nx as f64 * self.observed.signal.x.scale),
            1.0 / (ny as f64 * self.observed.signal.y.scale),
        ];
        let bins = digitize(&q, bin_size, q_scales)?;

        let nav_shape = self.observed.nav_shape();
        let ring_sum = |maps: Vec<Array2<f64>>| -> Result<Profile<f64>> {
            let image = self.observed.derive(assemble(&nav_shape, maps)?)?;
            integrate_image(&image, &bins, false)
        };
        let xc = ring_sum(xc)?;
        let ac_o = ring_sum(ac_o)?;
        let ac_e = ring_sum(ac_e)?;

        let data = Zip::from(&xc.data)
            .and(&ac_o.data)
            .and(&ac_e.data)
            .map_collect(|&x, &a, &b| x / (a * b).sqrt());

        let mut axis = xc.axis;
        axis.name = Some(FRC_AXIS_NAME.to_string());
        axis.units = self.observed.signal.x.units.as_ref().map(|u| format!("1 / {u}"));

        debug!(rings = axis.size, "Fourier ring correlation computed");
        Ok(Profile {
            data,
            nav: xc.nav,
            axis,
        })
    }

    /// Run the whole suite.
    pub fn report(&self, bin_size: BinSize) -> Result<ValidationReport> {
        let chi2 = self.chi2()?;
        let rvalue = self.rvalue();
        let (rmse_real, rmse_fourier) = self.rmse_check()?;
        let frc = self.fourier_ring_correlation(bin_size)?;
        Ok(ValidationReport {
            chi2,
            rvalue,
            rmse_real,
            rmse_fourier,
            frc,
        })
    }
}

/// Build a [`Validation`] from `config` and run every statistic.
pub fn validate(
    observed: &Image<f64>,
    expected: &Image<f64>,
    config: &ValidationConfig,
) -> Result<ValidationReport> {
    let report = Validation::new(observed, expected, config.unpad)?.report(config.bin_size)?;
    info!(
        rvalue = report.rvalue,
        rings = report.frc.n_bins(),
        "Validation finished"
    );
    Ok(report)
}

/// Check a reconstructed `amplitude`/`phase` pair against the measured `series`.
///
/// The wave is propagated to the defoci of the series' first navigation axis
/// (overriding any defoci in `config`), and `series` is compared with the
/// simulation after unpadding both. Returns `(chi2, rvalue)`.
pub fn focal_series_validation(
    series: &Image<f64>,
    amplitude: &Image<f64>,
    phase: &Image<f64>,
    config: &SimulationConfig,
) -> Result<(Image<f64>, f64)> {
    let defoci = series
        .nav
        .first()
        .map(|a| a.coords())
        .ok_or(HoloError::MissingDefocus)?;

    let mut config = config.clone();
    config.ctf.defoci = Some(defoci);
    let wave = complex_wave(amplitude, phase)?;
    let simulated = simulate_focal_series(&wave, &config)?;

    let validation = Validation::new(series, &simulated, true)?;
    let chi2 = validation.chi2()?;
    let rvalue = validation.rvalue();
    info!(rvalue, planes = series.nav_len(), "Focal series validated");
    Ok((chi2, rvalue))
}
