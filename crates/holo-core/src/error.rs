use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoloError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("pad_width too long for signal with dimension = {signal_dims} (got {given} entries)")]
    PadWidthTooLong { given: usize, signal_dims: usize },

    #[error("pad_width entry has {0} values, only 1 or 2 per signal axis are accepted")]
    InvalidPadEntry(usize),

    #[error("Image already carries a pad record; remove it before padding again")]
    AlreadyPadded,

    #[error("The number of shift values should be 2, got {0}")]
    ShiftLength(usize),

    #[error("Mode not recognized: {0}")]
    UnknownMode(String),

    #[error("Invalid bin size: {0}")]
    InvalidBinSize(String),

    #[error("No defocus value given and no navigation axis to read it from")]
    MissingDefocus,

    #[error("Empty focal series")]
    EmptySequence,

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HoloError>;
