//! NetCDF I/O for ELM history files, observation products and composites.
//!
//! Reads 2-D/3-D fields and time series with CF conventions (packing,
//! fill values, `<unit> since <date>` time axes with `noleap` calendars)
//! and writes composites back with their Set label as a global attribute.

pub mod error;
pub mod native;
pub mod reader;
pub mod writer;

pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
pub use reader::{decode_times, read_field, read_set_label, read_time_series, SET_ATTRIBUTE};
pub use writer::{write_field, write_time_series};
