//! Binarized counting integrals over radial and angular meshes.
//!
//! A mesh (radius or angle per pixel) is digitized into uniform bins, every
//! pixel being labeled with the left edge of its bin. Integration then sums
//! (or averages) the data over pixels sharing a label, in ascending label order.

use ndarray::{Array2, ArrayD, ArrayView2, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::BIN_EDGE_OVERSHOOT;
use crate::coords::{real_space_coords, Shift};
use crate::error::{HoloError, Result};
use crate::image::{Axis, Image, Pixel};

/// Bin width selection for [`digitize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum BinSize {
    /// Euclidean norm of the per-axis pixel scales.
    #[default]
    Auto,
    /// Split the mesh range into this many bins.
    Count(usize),
    /// Explicit width in mesh units.
    Width(f64),
}

/// Mesh options shared by the radial and angular integrals.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshOptions {
    pub bin_size: BinSize,
    /// Move the origin to the image center.
    pub shifted: bool,
    /// Additional `[x, y]` origin shift.
    pub shifts: Option<Vec<Shift>>,
    /// Average (true) or sum (false) within each bin.
    pub normalize: bool,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            bin_size: BinSize::Auto,
            shifted: true,
            shifts: None,
            normalize: true,
        }
    }
}

/// Digitized mesh: each sample holds the left edge of the bin it falls into.
#[derive(Clone, Debug)]
pub struct BinMap {
    labels: Array2<f64>,
    edges: Vec<f64>,
}

impl BinMap {
    pub fn labels(&self) -> &Array2<f64> {
        &self.labels
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn dim(&self) -> (usize, usize) {
        self.labels.dim()
    }

    /// Distinct labels, ascending.
    pub fn unique_labels(&self) -> Vec<f64> {
        let mut unique: Vec<f64> = self.labels.iter().copied().collect();
        unique.sort_by(f64::total_cmp);
        unique.dedup();
        unique
    }

    /// Index of every sample's label within [`Self::unique_labels`], plus the
    /// pixel count of every group.
    fn grouping(&self) -> (Vec<f64>, Array2<usize>, Vec<usize>) {
        let unique = self.unique_labels();
        let groups = self.labels.mapv(|label| {
            unique
                .binary_search_by(|probe| probe.total_cmp(&label))
                .unwrap_or(0)
        });
        let mut counts = vec![0usize; unique.len()];
        for &g in groups.iter() {
            counts[g] += 1;
        }
        (unique, groups, counts)
    }

    /// Pixel count per unique label, ascending label order.
    pub fn counts(&self) -> Vec<usize> {
        self.grouping().2
    }
}

/// Width implied by `bin_size` for a mesh spanning `[min, max]`.
fn bin_width(min: f64, max: f64, bin_size: BinSize, scales: [f64; 2]) -> Result<f64> {
    let width = match bin_size {
        BinSize::Auto => (scales[0] * scales[0] + scales[1] * scales[1]).sqrt(),
        BinSize::Count(0) => {
            return Err(HoloError::InvalidBinSize("bin count must be positive".into()))
        }
        BinSize::Count(n) => (max - min) / n as f64,
        BinSize::Width(w) => w,
    };
    if !width.is_finite() || width <= 0.0 {
        return Err(HoloError::InvalidBinSize(format!(
            "width {width} for mesh range [{min}, {max}]"
        )));
    }
    Ok(width)
}

/// Digitize `mesh` into uniform bins.
///
/// Edges run from `min(mesh)` in steps of the bin width up to (excluding)
/// `max(mesh) + 1.1 * width`, so the largest sample is interior to the last
/// occupied bin. `scales` are the `[x, y]` pixel scales used by [`BinSize::Auto`].
pub fn digitize(mesh: &Array2<f64>, bin_size: BinSize, scales: [f64; 2]) -> Result<BinMap> {
    let (min, max) = mesh
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return Err(HoloError::InvalidBinSize(
            "mesh is empty or not finite".into(),
        ));
    }

    let width = bin_width(min, max, bin_size, scales)?;
    let stop = max + BIN_EDGE_OVERSHOOT * width;
    let n_edges = ((stop - min) / width).ceil() as usize;
    let edges: Vec<f64> = (0..n_edges).map(|k| min + k as f64 * width).collect();

    let labels = mesh.mapv(|v| {
        let idx = edges.partition_point(|&e| e <= v).saturating_sub(1);
        edges[idx]
    });

    debug!(
        width,
        edges = edges.len(),
        min,
        max,
        "Digitized mesh"
    );

    Ok(BinMap { labels, edges })
}

/// Digitized radius `sqrt(x^2 + y^2)` over the real-space mesh of `image`.
pub fn digitize_radius<T: Clone>(
    image: &Image<T>,
    bin_size: BinSize,
    shifted: bool,
    shifts: Option<&[Shift]>,
) -> Result<BinMap> {
    let (x, y) = real_space_coords(image, shifted, shifts)?;
    let radius = Array2::from_shape_fn((y.len(), x.len()), |(r, c)| x[c].hypot(y[r]));
    digitize(&radius, bin_size, image.signal.scales())
}

/// Digitized angle `atan2(y, x)` over the real-space mesh of `image`.
pub fn digitize_angle<T: Clone>(
    image: &Image<T>,
    bin_size: BinSize,
    shifted: bool,
    shifts: Option<&[Shift]>,
) -> Result<BinMap> {
    let (x, y) = real_space_coords(image, shifted, shifts)?;
    let angle = Array2::from_shape_fn((y.len(), x.len()), |(r, c)| y[r].atan2(x[c]));
    digitize(&angle, bin_size, image.signal.scales())
}

/// Binarized counting integral of one 2D slice.
///
/// Returns one value per unique label of `bins`, ascending. Complex data is
/// accumulated component-wise, so grouping is identical for real and complex
/// input of the same shape.
pub fn integrate_binary<T: Pixel>(
    data: ArrayView2<'_, T>,
    bins: &BinMap,
    normalize: bool,
) -> Result<Vec<T>> {
    if data.dim() != bins.dim() {
        return Err(HoloError::ShapeMismatch {
            expected: bins.labels.shape().to_vec(),
            actual: data.shape().to_vec(),
        });
    }
    let (_, groups, counts) = bins.grouping();
    Ok(accumulate(data, &groups, &counts, normalize))
}

fn accumulate<T: Pixel>(
    data: ArrayView2<'_, T>,
    groups: &Array2<usize>,
    counts: &[usize],
    normalize: bool,
) -> Vec<T> {
    let mut sums = vec![T::zero(); counts.len()];
    for (&g, &v) in groups.iter().zip(data.iter()) {
        sums[g] += v;
    }
    if normalize {
        for (s, &n) in sums.iter_mut().zip(counts) {
            *s = *s / n as f64;
        }
    }
    sums
}

/// Result of a binned integration: one curve per navigation index.
#[derive(Clone, Debug)]
pub struct Profile<T> {
    /// Shape `[nav sizes..., n_bins]`.
    pub data: ArrayD<T>,
    pub nav: Vec<Axis>,
    /// Bin labels: linear when evenly spaced, explicit otherwise.
    pub axis: Axis,
}

impl<T: Clone> Profile<T> {
    pub fn n_bins(&self) -> usize {
        self.axis.size
    }

    /// Values of a profile without navigation axes.
    pub fn values(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

/// Apply [`integrate_binary`] to every navigation slice of `image`.
pub fn integrate_image<T: Pixel>(
    image: &Image<T>,
    bins: &BinMap,
    normalize: bool,
) -> Result<Profile<T>> {
    if image.signal_shape() != bins.dim() {
        return Err(HoloError::ShapeMismatch {
            expected: bins.labels.shape().to_vec(),
            actual: vec![image.signal.y.size, image.signal.x.size],
        });
    }
    let (unique, groups, counts) = bins.grouping();
    let stacked = image.stacked()?;

    let mut flat = Vec::with_capacity(image.nav_len() * unique.len());
    for slice in stacked.outer_iter() {
        flat.extend(accumulate(slice, &groups, &counts, normalize));
    }

    let mut shape = image.nav_shape();
    shape.push(unique.len());
    let data = ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|_| {
        HoloError::ShapeMismatch {
            expected: shape.clone(),
            actual: vec![image.nav_len(), unique.len()],
        }
    })?;

    Ok(Profile {
        data,
        nav: image.nav.clone(),
        axis: Axis::from_values(&unique),
    })
}

/// Radial integral of `image` over a digitized radius mesh.
pub fn integrate_radial<T: Pixel>(image: &Image<T>, options: &MeshOptions) -> Result<Profile<T>> {
    let bins = digitize_radius(
        image,
        options.bin_size,
        options.shifted,
        options.shifts.as_deref(),
    )?;
    let mut profile = integrate_image(image, &bins, options.normalize)?;
    profile.axis.name = Some("radius".into());
    profile.axis.units = image.signal.x.units.clone();
    Ok(profile)
}

/// Angular integral of `image` over a digitized angle mesh.
pub fn integrate_angular<T: Pixel>(image: &Image<T>, options: &MeshOptions) -> Result<Profile<T>> {
    let bins = digitize_angle(
        image,
        options.bin_size,
        options.shifted,
        options.shifts.as_deref(),
    )?;
    let mut profile = integrate_image(image, &bins, options.normalize)?;
    profile.axis.name = Some("angle".into());
    profile.axis.units = Some("rad".into());
    Ok(profile)
}
