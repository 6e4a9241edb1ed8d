use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::coords::reciprocal_axis;
use crate::error::Result;
use crate::image::{Image, Pixel, SignalAxes};

/// Normalization convention of a 2D transform pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FftNorm {
    /// Forward unscaled, inverse scaled by `1/(h*w)`.
    #[default]
    Backward,
    /// Both directions scaled by `1/sqrt(h*w)`.
    Ortho,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Inverse,
}

/// 2D forward FFT of a real or complex slice.
pub fn fft2d<T: Pixel>(data: ArrayView2<'_, T>, norm: FftNorm) -> Array2<Complex64> {
    let mut work = data.mapv(Pixel::to_complex);
    transform(&mut work, Direction::Forward, norm);
    work
}

/// 2D inverse FFT of a complex slice.
pub fn ifft2d(data: ArrayView2<'_, Complex64>, norm: FftNorm) -> Array2<Complex64> {
    let mut work = data.to_owned();
    transform(&mut work, Direction::Inverse, norm);
    work
}

/// Forward FFT of every signal slice of `image`.
///
/// The zero frequency stays at index 0; the returned signal axes carry the
/// matching spatial frequencies (`1/(N*d)` spacing, FFT order).
pub fn fft_image<T: Pixel>(image: &Image<T>, norm: FftNorm) -> Result<Image<Complex64>> {
    let data = image.map_slices(|s| fft2d(s, norm))?;
    let mut out = image.derive(data)?;
    out.signal = SignalAxes {
        x: reciprocal_axis(&image.signal.x),
        y: reciprocal_axis(&image.signal.y),
    };
    out.metadata.pad = None;
    Ok(out)
}

fn transform(work: &mut Array2<Complex64>, direction: Direction, norm: FftNorm) {
    let (h, w) = work.dim();
    if h == 0 || w == 0 {
        return;
    }
    let mut planner = FftPlanner::new();
    let (fft_row, fft_col) = match direction {
        Direction::Forward => (planner.plan_fft_forward(w), planner.plan_fft_forward(h)),
        Direction::Inverse => (planner.plan_fft_inverse(w), planner.plan_fft_inverse(h)),
    };

    let parallel = h * w >= PARALLEL_PIXEL_THRESHOLD;
    transform_lanes(work, Axis(1), &fft_row, parallel);
    transform_lanes(work, Axis(0), &fft_col, parallel);

    let scale = match (direction, norm) {
        (Direction::Forward, FftNorm::Backward) => 1.0,
        (Direction::Inverse, FftNorm::Backward) => 1.0 / (h * w) as f64,
        (_, FftNorm::Ortho) => 1.0 / ((h * w) as f64).sqrt(),
    };
    if scale != 1.0 {
        work.mapv_inplace(|v| v * scale);
    }
}

/// Run `fft` over every 1D lane along `axis`, in place.
fn transform_lanes(work: &mut Array2<Complex64>, axis: Axis, fft: &Arc<dyn Fft<f64>>, parallel: bool) {
    let run = |mut lane: ArrayViewMut1<'_, Complex64>| {
        let mut buffer = lane.to_vec();
        fft.process(&mut buffer);
        lane.assign(&ArrayView1::from(&buffer));
    };
    if parallel {
        Zip::from(work.lanes_mut(axis)).par_for_each(&run);
    } else {
        work.lanes_mut(axis).into_iter().for_each(&run);
    }
}
