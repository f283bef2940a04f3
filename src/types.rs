use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued radiance, reflectance or angle raster
pub type ReflReal = f32;

/// 2D raster (rows x cols)
pub type ReflImage = Array2<ReflReal>;

/// Spectral response of a sensor band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpectralResponse {
    /// Gaussian response described by its centre and full width at half maximum
    Gaussian {
        center_nm: f64,
        fwhm_nm: f64,
    },
    /// Tabulated response, weights are relative (not necessarily normalised)
    Sampled {
        wavelengths_nm: Vec<f64>,
        weights: Vec<f64>,
    },
}

/// One sensor band to convert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSpec {
    pub name: String,
    pub raster_band: usize,               // 1-based, as in GDAL
    pub response: SpectralResponse,
    pub solar_irradiance: Option<f64>,    // mW m-2 nm-1, overrides the table when set
}

/// Where the sun zenith angle comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SunZenithSource {
    /// Same angle for the whole scene, degrees
    Constant(f64),
    /// Per-pixel angles (degrees) stored in this 1-based raster band
    Band(usize),
}

/// Solar geometry and date of an acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionInfo {
    pub date: NaiveDate,
    pub sun_zenith: SunZenithSource,
}

/// Summary returned by the processing entry points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub output_path: Option<PathBuf>,
    pub bands: Vec<String>,
    pub dimensions: (usize, usize),          // (rows, cols)
    pub earth_sun_distance_au: f64,
    pub band_solar_irradiance: Vec<f64>,     // E0 per band, mW m-2 nm-1
    pub invalid_pixels: usize,
}

/// Error types for irradiance loading and reflectance processing
#[derive(Debug, thiserror::Error)]
pub enum ReflError {
    #[error("Resource missing: {0}")]
    ResourceMissing(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Auxiliary data installation failed: {0}")]
    Install(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for reflectance operations
pub type ReflResult<T> = Result<T, ReflError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReflError::CorruptData("stream ended".to_string());
        assert_eq!(err.to_string(), "Corrupt data: stream ended");
    }
}
