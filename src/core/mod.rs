//! Core radiometric processing modules

pub mod spectral;
pub mod toa_reflectance;

// Re-export main types
pub use toa_reflectance::{
    earth_sun_distance_au, process_arrays, toa_radiance, toa_reflectance, toa_reflectance_image,
    ProcessingConfig, ToaReflectanceProcessor,
};
