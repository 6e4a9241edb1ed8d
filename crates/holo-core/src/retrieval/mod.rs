pub mod gerchberg_saxton;

use num_complex::Complex64;

use crate::error::Result;
use crate::image::Image;

pub use gerchberg_saxton::GerchbergSaxton;

/// Output of a phase-retrieval run.
#[derive(Clone, Debug)]
pub struct Reconstruction {
    /// Complex wave in real space, signal geometry of the input series.
    pub wave: Image<Complex64>,
    /// Unwrapped phase, when the method can provide one.
    pub phase: Option<Image<f64>>,
}

/// Wave reconstruction from a focal series whose first navigation axis holds
/// the defocus values.
///
/// TIE solvers live outside this crate and plug in through this trait.
pub trait PhaseRetrieval: Send + Sync {
    fn name(&self) -> &str;

    fn retrieve(&self, series: &Image<f64>) -> Result<Reconstruction>;
}
