use std::fmt::Debug;
use std::ops::{AddAssign, Div};

use ndarray::{Array2, ArrayD, ArrayView2, CowArray, Ix3, IxDyn};
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::consts::AXIS_SPACING_DECIMALS;
use crate::ctf::OpticalParams;
use crate::error::{HoloError, Result};
use crate::pad::PadRecord;

/// Scalar types an [`Image`] can hold: real intensities or complex waves.
pub trait Pixel:
    Copy + Send + Sync + Zero + AddAssign + Div<f64, Output = Self> + Debug + 'static
{
    fn to_complex(self) -> Complex64;
}

impl Pixel for f64 {
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}

impl Pixel for Complex64 {
    fn to_complex(self) -> Complex64 {
        self
    }
}

/// One calibrated array axis.
///
/// A linear axis maps index `i` to `offset + i * scale`. An irregular axis
/// keeps its explicit coordinate vector in `values` (non-uniform defocus
/// series, FFT-ordered frequencies, irregular bin labels).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub size: usize,
    pub scale: f64,
    pub offset: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl Axis {
    /// Uncalibrated axis: unit scale, zero offset.
    pub fn new(size: usize) -> Self {
        Self::linear(size, 1.0, 0.0)
    }

    pub fn linear(size: usize, scale: f64, offset: f64) -> Self {
        Self {
            size,
            scale,
            offset,
            name: None,
            units: None,
            values: None,
        }
    }

    /// Build an axis from explicit coordinates.
    ///
    /// Evenly spaced values (constant first difference to 5 decimals) give a
    /// linear axis; anything else is kept verbatim as an irregular axis.
    pub fn from_values(values: &[f64]) -> Self {
        let offset = values.first().copied().unwrap_or(0.0);
        if is_evenly_spaced(values) {
            Self::linear(values.len(), values[1] - values[0], offset)
        } else {
            let scale = if values.len() > 1 {
                values[1] - values[0]
            } else {
                1.0
            };
            Self {
                values: Some(values.to_vec()),
                ..Self::linear(values.len(), scale, offset)
            }
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn is_linear(&self) -> bool {
        self.values.is_none()
    }

    /// Physical coordinate of every index along this axis.
    pub fn coords(&self) -> Vec<f64> {
        match &self.values {
            Some(values) => values.clone(),
            None => (0..self.size)
                .map(|i| self.offset + i as f64 * self.scale)
                .collect(),
        }
    }
}

/// True when `values` has at least two entries whose first differences all
/// agree once rounded to [`AXIS_SPACING_DECIMALS`] places.
pub fn is_evenly_spaced(values: &[f64]) -> bool {
    if values.len() < 2 {
        return false;
    }
    let factor = 10f64.powi(AXIS_SPACING_DECIMALS);
    let round = |d: f64| (d * factor).round() / factor;
    let first = round(values[1] - values[0]);
    values.windows(2).all(|w| round(w[1] - w[0]) == first)
}

/// The two image-plane axes. `x` runs along array columns, `y` along rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalAxes {
    pub x: Axis,
    pub y: Axis,
}

impl SignalAxes {
    pub fn scales(&self) -> [f64; 2] {
        [self.x.scale, self.y.scale]
    }
}

/// Typed metadata carried alongside an image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    /// Active padding, written by `set_pad` and consumed by `remove_pad`.
    pub pad: Option<PadRecord>,
    /// Optical parameters used to build (or to be used for) a CTF.
    pub optics: Option<OpticalParams>,
    /// Defocus values of an astigmatic CTF batch.
    pub astigmatic_defocus: Option<Vec<f64>>,
}

/// N-dimensional image: zero or more navigation axes followed by exactly two
/// signal axes. Array shape is `[nav sizes..., y.size, x.size]`.
#[derive(Clone, Debug)]
pub struct Image<T> {
    pub data: ArrayD<T>,
    pub nav: Vec<Axis>,
    pub signal: SignalAxes,
    pub metadata: Metadata,
}

impl<T: Clone> Image<T> {
    pub fn new(data: ArrayD<T>, nav: Vec<Axis>, signal: SignalAxes) -> Result<Self> {
        let mut expected: Vec<usize> = nav.iter().map(|a| a.size).collect();
        expected.push(signal.y.size);
        expected.push(signal.x.size);
        if data.shape() != expected.as_slice() {
            return Err(HoloError::ShapeMismatch {
                expected,
                actual: data.shape().to_vec(),
            });
        }
        Ok(Self {
            data,
            nav,
            signal,
            metadata: Metadata::default(),
        })
    }

    /// Wrap a raw array: the last two dimensions become the signal plane and
    /// every other dimension an uncalibrated navigation axis.
    pub fn from_array(data: ArrayD<T>) -> Result<Self> {
        let shape = data.shape().to_vec();
        if shape.len() < 2 {
            return Err(HoloError::ShapeMismatch {
                expected: vec![1, 1],
                actual: shape,
            });
        }
        let n = shape.len();
        let nav = shape[..n - 2].iter().map(|&s| Axis::new(s)).collect();
        let signal = SignalAxes {
            x: Axis::new(shape[n - 1]),
            y: Axis::new(shape[n - 2]),
        };
        Self::new(data, nav, signal)
    }

    /// Stack equally shaped 2D slices along a single navigation axis.
    pub fn from_series(slices: Vec<Array2<T>>, nav_axis: Axis) -> Result<Self> {
        let (ny, nx) = slices.first().ok_or(HoloError::EmptySequence)?.dim();
        let data = assemble(&[slices.len()], slices)?;
        let signal = SignalAxes {
            x: Axis::new(nx),
            y: Axis::new(ny),
        };
        Self::new(data, vec![nav_axis], signal)
    }

    /// Set `[x, y]` signal scales.
    pub fn with_scales(mut self, scales: [f64; 2]) -> Self {
        self.signal.x.scale = scales[0];
        self.signal.y.scale = scales[1];
        self
    }

    /// Set `[x, y]` signal offsets.
    pub fn with_offsets(mut self, offsets: [f64; 2]) -> Self {
        self.signal.x.offset = offsets[0];
        self.signal.y.offset = offsets[1];
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.signal.x.units = Some(units.to_string());
        self.signal.y.units = Some(units.to_string());
        self
    }

    pub fn with_optics(mut self, optics: OpticalParams) -> Self {
        self.metadata.optics = Some(optics);
        self
    }

    /// Replace navigation axis `index`; the new axis must keep its size.
    pub fn with_nav_axis(mut self, index: usize, axis: Axis) -> Result<Self> {
        let current = self.nav.get(index).map(|a| a.size);
        if current != Some(axis.size) {
            return Err(HoloError::ShapeMismatch {
                expected: current.into_iter().collect(),
                actual: vec![axis.size],
            });
        }
        self.nav[index] = axis;
        Ok(self)
    }

    /// `(rows, cols)` of the signal plane.
    pub fn signal_shape(&self) -> (usize, usize) {
        (self.signal.y.size, self.signal.x.size)
    }

    pub fn nav_shape(&self) -> Vec<usize> {
        self.nav.iter().map(|a| a.size).collect()
    }

    /// Number of 2D slices (1 for a plain image).
    pub fn nav_len(&self) -> usize {
        self.nav.iter().map(|a| a.size).product()
    }

    /// New image with the same axes and metadata but different data.
    pub fn derive<U: Clone>(&self, data: ArrayD<U>) -> Result<Image<U>> {
        let mut out = Image::new(data, self.nav.clone(), self.signal.clone())?;
        out.metadata = self.metadata.clone();
        Ok(out)
    }

    /// View of the data as `(nav_len, ny, nx)`, copying only when the layout
    /// cannot be reshaped in place.
    pub fn stacked(&self) -> Result<CowArray<'_, T, Ix3>> {
        let (ny, nx) = self.signal_shape();
        self.data
            .to_shape((self.nav_len(), ny, nx))
            .map_err(|_| HoloError::ShapeMismatch {
                expected: vec![self.nav_len(), ny, nx],
                actual: self.data.shape().to_vec(),
            })
    }

    /// First 2D slice as a plain image: same signal axes and metadata, no
    /// navigation axes.
    pub fn signal_plane(&self) -> Result<Image<T>> {
        let stacked = self.stacked()?;
        let first = stacked
            .outer_iter()
            .next()
            .ok_or(HoloError::EmptySequence)?
            .to_owned();
        let mut out = Image::new(first.into_dyn(), Vec::new(), self.signal.clone())?;
        out.metadata = self.metadata.clone();
        Ok(out)
    }

    /// Owned copy of every 2D slice in navigation order.
    pub fn slices(&self) -> Result<Vec<Array2<T>>> {
        Ok(self
            .stacked()?
            .outer_iter()
            .map(|s| s.to_owned())
            .collect())
    }

    /// Apply `f` to every 2D slice and reassemble with the same navigation shape.
    pub fn map_slices<U, F>(&self, f: F) -> Result<ArrayD<U>>
    where
        U: Clone,
        F: Fn(ArrayView2<'_, T>) -> Array2<U>,
    {
        let stacked = self.stacked()?;
        let mapped: Vec<Array2<U>> = stacked.outer_iter().map(f).collect();
        assemble(&self.nav_shape(), mapped)
    }
}

impl<T: Clone> From<Array2<T>> for Image<T> {
    fn from(data: Array2<T>) -> Self {
        let (ny, nx) = data.dim();
        Self {
            data: data.into_dyn(),
            nav: Vec::new(),
            signal: SignalAxes {
                x: Axis::new(nx),
                y: Axis::new(ny),
            },
            metadata: Metadata::default(),
        }
    }
}

/// Concatenate equally shaped 2D slices into `[nav_shape..., ny, nx]`.
pub(crate) fn assemble<U: Clone>(nav_shape: &[usize], slices: Vec<Array2<U>>) -> Result<ArrayD<U>> {
    let (ny, nx) = slices.first().map(|s| s.dim()).unwrap_or((0, 0));
    let mut shape = nav_shape.to_vec();
    shape.push(ny);
    shape.push(nx);

    let mut flat = Vec::with_capacity(slices.len() * ny * nx);
    for slice in &slices {
        if slice.dim() != (ny, nx) {
            return Err(HoloError::ShapeMismatch {
                expected: vec![ny, nx],
                actual: slice.shape().to_vec(),
            });
        }
        flat.extend(slice.iter().cloned());
    }

    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|_| HoloError::ShapeMismatch {
        expected: shape.clone(),
        actual: vec![slices.len(), ny, nx],
    })
}
