//! surfrefl: Solar Irradiance Tables and TOA Reflectance
//!
//! This library loads the packaged Thuillier solar irradiance table, derives
//! band solar irradiances from it and converts sensor radiance into
//! top-of-atmosphere reflectance. Auxiliary data needed by downstream
//! operators is installed through an explicit, idempotent installer.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionInfo, BandSpec, ProcessingReport, ReflError, ReflImage, ReflResult,
    SpectralResponse, SunZenithSource,
};

pub use io::{
    load_table, load_table_from, AuxdataInstaller, AuxdataSource, InstallReport, InstallState,
    IrradianceTable, ResourceLocator,
};

pub use crate::core::{process_arrays, ProcessingConfig, ToaReflectanceProcessor};
