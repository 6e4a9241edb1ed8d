//! Multi-focus Gerchberg-Saxton refinement.
//!
//! Each iteration propagates the current wave to every plane of the series,
//! replaces the modulus with the measured amplitude, propagates back with the
//! conjugate transfer and merges the planes as a `Σ|T|^2`-weighted average in
//! Fourier space.

use ndarray::{Array2, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_GS_ITERATIONS, EPSILON};
use crate::ctf::{contrast_transfer, CtfSettings};
use crate::error::{HoloError, Result};
use crate::fft::{fft2d, ifft2d, FftNorm};
use crate::image::{Axis, Image};
use crate::retrieval::{PhaseRetrieval, Reconstruction};
use crate::simulate::effective_transfer;

#[derive(Clone, Debug)]
pub struct GerchbergSaxton {
    pub iterations: usize,
    /// Used to build the CTF when `ctf` is not supplied.
    pub ctf_settings: CtfSettings,
    /// Precomputed CTF, one slice per plane of the series.
    pub ctf: Option<Image<Complex64>>,
    /// Starting wave; defaults to the amplitude of the plane nearest focus.
    pub initial_wave: Option<Image<Complex64>>,
    /// Phase hint, used to start the loop and to unwrap the result.
    pub initial_phase: Option<Image<f64>>,
    pub coherence_angle: Option<f64>,
    pub use_gpu: bool,
}

impl Default for GerchbergSaxton {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_GS_ITERATIONS,
            ctf_settings: CtfSettings::default(),
            ctf: None,
            initial_wave: None,
            initial_phase: None,
            coherence_angle: None,
            use_gpu: false,
        }
    }
}

impl GerchbergSaxton {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    pub fn with_ctf(mut self, ctf: Image<Complex64>) -> Self {
        self.ctf = Some(ctf);
        self
    }

    pub fn with_ctf_settings(mut self, settings: CtfSettings) -> Self {
        self.ctf_settings = settings;
        self
    }

    pub fn with_initial_wave(mut self, wave: Image<Complex64>) -> Self {
        self.initial_wave = Some(wave);
        self
    }

    pub fn with_initial_phase(mut self, phase: Image<f64>) -> Self {
        self.initial_phase = Some(phase);
        self
    }

    pub fn with_coherence_angle(mut self, alpha: f64) -> Self {
        self.coherence_angle = Some(alpha);
        self
    }

    fn single_slice<T: Clone>(&self, image: &Image<T>, expected: (usize, usize)) -> Result<Array2<T>> {
        if image.signal_shape() != expected || image.nav_len() != 1 {
            return Err(HoloError::ShapeMismatch {
                expected: vec![expected.0, expected.1],
                actual: image.data.shape().to_vec(),
            });
        }
        image
            .slices()?
            .into_iter()
            .next()
            .ok_or(HoloError::EmptySequence)
    }

    /// CTF on the series' signal plane. The series' navigation axes are
    /// `[defocus, angle]`; they fill whichever of the two the settings leave unset.
    fn series_ctf(&self, series: &Image<f64>) -> Result<Image<Complex64>> {
        let mut axes = series.nav.iter().map(Axis::coords);
        let (nav_defoci, nav_angles) = (axes.next(), axes.next());
        let mut settings = self.ctf_settings.clone();
        settings.defoci = settings.defoci.or(nav_defoci);
        settings.angles = settings.angles.or(nav_angles);
        contrast_transfer(&series.signal_plane()?, &settings)
    }

    fn starting_wave(
        &self,
        amplitudes: &[Array2<f64>],
        defoci: &[f64],
        hint: Option<&Array2<f64>>,
        shape: (usize, usize),
    ) -> Result<Array2<Complex64>> {
        if let Some(wave) = &self.initial_wave {
            return self.single_slice(wave, shape);
        }
        let nearest = defoci
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map_or(0, |(i, _)| i);
        let amplitude = amplitudes.get(nearest).ok_or(HoloError::EmptySequence)?;
        Ok(match hint {
            Some(phase) => Zip::from(amplitude)
                .and(phase)
                .map_collect(|&a, &p| Complex64::from_polar(a, p)),
            None => amplitude.mapv(|a| Complex64::new(a, 0.0)),
        })
    }
}

impl PhaseRetrieval for GerchbergSaxton {
    fn name(&self) -> &str {
        "Gerchberg-Saxton"
    }

    fn retrieve(&self, series: &Image<f64>) -> Result<Reconstruction> {
        if self.use_gpu {
            warn!("GPU refinement requested; running on the CPU");
        }
        if series.nav_len() == 0 {
            return Err(HoloError::EmptySequence);
        }
        let shape = series.signal_shape();

        let ctf = match &self.ctf {
            Some(ctf) => ctf.clone(),
            None => self.series_ctf(series)?,
        };
        if ctf.signal_shape() != shape || ctf.nav_len() != series.nav_len() {
            return Err(HoloError::ShapeMismatch {
                expected: series.data.shape().to_vec(),
                actual: ctf.data.shape().to_vec(),
            });
        }
        let transfers = effective_transfer(series, &ctf, self.coherence_angle)?;

        let amplitudes: Vec<Array2<f64>> = series
            .slices()?
            .into_iter()
            .map(|s| s.mapv(|v| v.max(0.0).sqrt()))
            .collect();
        let defoci = ctf.nav.first().map(|a| a.coords()).unwrap_or_default();

        let hint = match &self.initial_phase {
            Some(phase) => Some(self.single_slice(phase, shape)?),
            None => None,
        };
        let mut wave = self.starting_wave(&amplitudes, &defoci, hint.as_ref(), shape)?;

        let weight = transfers
            .iter()
            .fold(Array2::<f64>::zeros(shape), |acc, t| acc + t.mapv(|v| v.norm_sqr()));

        for iteration in 0..self.iterations {
            let spectrum = fft2d(wave.view(), FftNorm::Backward);

            let (numerator, residual) = transfers
                .par_iter()
                .zip(amplitudes.par_iter())
                .map(|(t, amplitude)| {
                    let field = ifft2d((&spectrum * t).view(), FftNorm::Backward);
                    let mut residual = 0.0;
                    let constrained = Zip::from(&field).and(amplitude).map_collect(|&psi, &a| {
                        let modulus = psi.norm();
                        residual += (modulus - a).powi(2);
                        if modulus > EPSILON {
                            psi * (a / modulus)
                        } else {
                            Complex64::new(a, 0.0)
                        }
                    });
                    let back = fft2d(constrained.view(), FftNorm::Backward);
                    let contribution = Zip::from(&back)
                        .and(t)
                        .map_collect(|&f, &t| f * t.conj());
                    (contribution, residual)
                })
                .reduce(
                    || (Array2::<Complex64>::zeros(shape), 0.0),
                    |(a, ra), (b, rb)| (a + b, ra + rb),
                );

            let merged = Zip::from(&numerator)
                .and(&weight)
                .and(&spectrum)
                .map_collect(|&n, &w, &s| if w > EPSILON { n / w } else { s });
            wave = ifft2d(merged.view(), FftNorm::Backward);

            debug!(iteration, residual, "Gerchberg-Saxton iteration");
        }

        let phase = match &hint {
            Some(hint) => {
                let unwrapped = Zip::from(&wave)
                    .and(hint)
                    .map_collect(|&psi, &h| h + (psi * Complex64::from_polar(1.0, -h)).arg());
                let mut phase = Image::new(unwrapped.into_dyn(), Vec::new(), series.signal.clone())?;
                phase.metadata = series.metadata.clone();
                Some(phase)
            }
            None => None,
        };

        let mut out = Image::new(wave.into_dyn(), Vec::new(), series.signal.clone())?;
        out.metadata = series.metadata.clone();
        out.metadata.optics = ctf.metadata.optics;

        info!(
            method = self.name(),
            iterations = self.iterations,
            planes = series.nav_len(),
            "Phase retrieval finished"
        );
        Ok(Reconstruction { wave: out, phase })
    }
}
