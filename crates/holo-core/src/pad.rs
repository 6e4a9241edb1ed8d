//! Reversible padding of the signal plane.
//!
//! `set_pad` records the resolved pixel widths in the image metadata so that
//! `remove_pad` can cut exactly the same border away again.

use ndarray::{Array2, ArrayView2, Slice};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HoloError, Result};
use crate::image::{Axis, Image};

/// `(before, after)` pixel counts per signal axis, `[x, y]` order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadRecord {
    pub widths: Vec<(usize, usize)>,
}

/// One pad width, in pixels or in physical units of the axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PadExtent {
    Pixels(usize),
    /// Converted with `round(value / scale)`.
    Physical(f64),
}

impl PadExtent {
    fn to_pixels(self, axis: &Axis) -> usize {
        match self {
            PadExtent::Pixels(n) => n,
            PadExtent::Physical(v) => (v / axis.scale).round().max(0.0) as usize,
        }
    }
}

/// Padding of a single signal axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AxisPad {
    /// Same width before and after.
    Symmetric(PadExtent),
    /// `(before, after)`.
    Asymmetric(PadExtent, PadExtent),
}

impl AxisPad {
    /// One value means the same width on both sides, two mean `(before, after)`.
    pub fn from_slice(values: &[PadExtent]) -> Result<Self> {
        match values {
            [w] => Ok(Self::Symmetric(*w)),
            [before, after] => Ok(Self::Asymmetric(*before, *after)),
            other => Err(HoloError::InvalidPadEntry(other.len())),
        }
    }

    fn resolve(self, axis: &Axis) -> (usize, usize) {
        match self {
            Self::Symmetric(w) => {
                let n = w.to_pixels(axis);
                (n, n)
            }
            Self::Asymmetric(before, after) => (before.to_pixels(axis), after.to_pixels(axis)),
        }
    }
}

/// Pad width request for [`set_pad`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PadWidth {
    /// No padding; `set_pad` returns a copy.
    #[default]
    None,
    /// Same width on both sides of both axes.
    Uniform(PadExtent),
    /// One entry applied to every axis, or one entry per axis in `[x, y]` order.
    PerAxis(Vec<AxisPad>),
}

/// Border fill rule, following the usual array padding semantics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PadMode<T> {
    Constant(T),
    /// Repeat the edge value.
    Edge,
    /// Mirror without repeating the edge sample.
    Reflect,
    /// Mirror including the edge sample.
    Symmetric,
    /// Periodic continuation.
    Wrap,
}

impl PadMode<f64> {
    pub fn zeros() -> Self {
        PadMode::Constant(0.0)
    }
}

/// Pad the signal plane of every navigation slice.
///
/// Offsets of the signal axes move back by `before * scale`, so the original
/// pixels keep their physical coordinates. Fails if the image already carries
/// a pad record or if more entries than signal axes are given.
pub fn set_pad<T: Clone>(image: &Image<T>, width: &PadWidth, mode: &PadMode<T>) -> Result<Image<T>> {
    let entries = match width {
        PadWidth::None => return Ok(image.clone()),
        PadWidth::Uniform(extent) => vec![AxisPad::Symmetric(*extent)],
        PadWidth::PerAxis(entries) => entries.clone(),
    };
    let (x_pad, y_pad) = match entries.as_slice() {
        [] => return Ok(image.clone()),
        [both] => (both.resolve(&image.signal.x), both.resolve(&image.signal.y)),
        [x, y] => (x.resolve(&image.signal.x), y.resolve(&image.signal.y)),
        more => {
            return Err(HoloError::PadWidthTooLong {
                given: more.len(),
                signal_dims: 2,
            })
        }
    };
    if image.metadata.pad.is_some() {
        return Err(HoloError::AlreadyPadded);
    }
    let (h, w) = image.signal_shape();
    if (h == 0 || w == 0) && !matches!(mode, PadMode::Constant(_)) {
        return Err(HoloError::ShapeMismatch {
            expected: vec![1, 1],
            actual: vec![h, w],
        });
    }

    let data = image.map_slices(|slice| pad_slice(slice, y_pad, x_pad, mode))?;

    let mut signal = image.signal.clone();
    extend_axis(&mut signal.x, x_pad);
    extend_axis(&mut signal.y, y_pad);

    let mut out = Image::new(data, image.nav.clone(), signal)?;
    out.metadata = image.metadata.clone();
    out.metadata.pad = Some(PadRecord {
        widths: vec![x_pad, y_pad],
    });
    debug!(?x_pad, ?y_pad, "Padded signal plane");
    Ok(out)
}

/// Undo the last [`set_pad`]. Images without a pad record are returned unchanged.
pub fn remove_pad<T: Clone>(image: &Image<T>) -> Result<Image<T>> {
    let Some(record) = &image.metadata.pad else {
        return Ok(image.clone());
    };
    if record.widths.len() > 2 {
        return Err(HoloError::PadWidthTooLong {
            given: record.widths.len(),
            signal_dims: 2,
        });
    }

    let ndim = image.data.ndim();
    let mut signal = image.signal.clone();
    let mut cuts = [(0usize, 0usize); 2];
    for (i, &(before, after)) in record.widths.iter().enumerate() {
        let axis = if i == 0 { &mut signal.x } else { &mut signal.y };
        if before + after > axis.size {
            return Err(HoloError::ShapeMismatch {
                expected: vec![before + after],
                actual: vec![axis.size],
            });
        }
        if before != 0 || after != 0 {
            axis.size -= before + after;
            axis.offset += before as f64 * axis.scale;
            axis.values = axis.values.take().map(|v| v[before..before + axis.size].to_vec());
            cuts[i] = (before, after);
        }
    }

    let [(x_before, _), (y_before, _)] = cuts;
    let (x_len, y_len) = (signal.x.size, signal.y.size);
    let data = image
        .data
        .slice_each_axis(|ax| {
            let index = ax.axis.index();
            if index == ndim - 1 {
                Slice::from(x_before..x_before + x_len)
            } else if index == ndim - 2 {
                Slice::from(y_before..y_before + y_len)
            } else {
                Slice::from(..)
            }
        })
        .to_owned();

    let mut out = Image::new(data, image.nav.clone(), signal)?;
    out.metadata = image.metadata.clone();
    out.metadata.pad = None;
    debug!(widths = ?record.widths, "Removed padding");
    Ok(out)
}

fn extend_axis(axis: &mut Axis, (before, after): (usize, usize)) {
    axis.size += before + after;
    axis.offset -= before as f64 * axis.scale;
    axis.values = None;
}

fn pad_slice<T: Clone>(
    data: ArrayView2<'_, T>,
    (top, bottom): (usize, usize),
    (left, right): (usize, usize),
    mode: &PadMode<T>,
) -> Array2<T> {
    let (h, w) = data.dim();
    let out_h = h + top + bottom;
    let out_w = w + left + right;
    Array2::from_shape_fn((out_h, out_w), |(r, c)| {
        let src_r = source_index(r as isize - top as isize, h, mode);
        let src_c = source_index(c as isize - left as isize, w, mode);
        match (src_r, src_c, mode) {
            (Some(sr), Some(sc), _) => data[[sr, sc]].clone(),
            (_, _, PadMode::Constant(value)) => value.clone(),
            // Non-constant modes always map onto a source sample of a non-empty slice.
            _ => data[[0, 0]].clone(),
        }
    })
}

/// Source index for output position `i` (relative to the first original
/// sample) along an axis of length `n`. `None` means "use the constant".
fn source_index<T>(i: isize, n: usize, mode: &PadMode<T>) -> Option<usize> {
    let n_i = n as isize;
    if (0..n_i).contains(&i) {
        return Some(i as usize);
    }
    if n == 0 {
        return None;
    }
    let idx = match mode {
        PadMode::Constant(_) => return None,
        PadMode::Edge => i.clamp(0, n_i - 1),
        PadMode::Wrap => i.rem_euclid(n_i),
        PadMode::Reflect => {
            if n == 1 {
                0
            } else {
                let period = 2 * (n_i - 1);
                let m = i.rem_euclid(period);
                if m >= n_i {
                    period - m
                } else {
                    m
                }
            }
        }
        PadMode::Symmetric => {
            let period = 2 * n_i;
            let m = i.rem_euclid(period);
            if m >= n_i {
                period - 1 - m
            } else {
                m
            }
        }
    };
    Some(idx as usize)
}
