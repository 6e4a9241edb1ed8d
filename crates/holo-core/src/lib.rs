pub mod binning;
pub mod config;
pub mod consts;
pub mod coords;
pub mod ctf;
pub mod error;
pub mod fft;
pub mod image;
pub mod pad;
pub mod retrieval;
pub mod simulate;
pub mod validation;
