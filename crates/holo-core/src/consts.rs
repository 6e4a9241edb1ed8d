/// Minimum pixel count (h*w) to use row-level Rayon parallelism in the FFT.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Edge overshoot, in bin widths, appended past the mesh maximum so the
/// largest sample lands strictly inside the last bin.
pub const BIN_EDGE_OVERSHOOT: f64 = 1.1;

/// Decimal places used when deciding whether a set of axis values is evenly spaced.
pub const AXIS_SPACING_DECIMALS: i32 = 5;

/// Small epsilon to avoid division by zero in amplitude and weight normalization.
pub const EPSILON: f64 = 1e-12;

/// Default wavelength when neither an override nor image metadata supplies one.
pub const DEFAULT_WAVELENGTH: f64 = 1.0;

/// Default refractive index of the imaging medium.
pub const DEFAULT_REFRACTIVE_INDEX: f64 = 1.0;

/// Default numerical aperture.
pub const DEFAULT_NUMERICAL_APERTURE: f64 = 1.0;

/// Default number of Gerchberg-Saxton iterations.
pub const DEFAULT_GS_ITERATIONS: usize = 5;

/// Axis name given to the spatial-frequency axis of a Fourier ring correlation.
pub const FRC_AXIS_NAME: &str = "|q| = |1/r|";
