use crate::io::irradiance::IrradianceTable;
use crate::types::{
    AcquisitionInfo, BandSpec, ProcessingReport, ReflError, ReflImage, ReflResult, SunZenithSource,
};
use chrono::{Datelike, NaiveDate};
use ndarray::Zip;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;

/// Eccentricity of the Earth's orbit
pub const EARTH_ORBIT_ECCENTRICITY: f64 = 0.01672;

/// Length of the anomalistic year in days
const ANOMALISTIC_YEAR_DAYS: f64 = 365.256363;

/// Day of year of perihelion (approx.)
const PERIHELION_DAY: f64 = 4.0;

/// Earth-Sun distance in astronomical units for a date
pub fn earth_sun_distance_au(date: NaiveDate) -> f64 {
    let day_of_year = date.ordinal() as f64;
    1.0 - EARTH_ORBIT_ECCENTRICITY
        * (2.0 * PI * (day_of_year - PERIHELION_DAY) / ANOMALISTIC_YEAR_DAYS).cos()
}

/// ρ = π·L·d² / (E0·cos θs)
///
/// Returns NaN for a sun at or below the horizon, or a non-positive E0.
pub fn toa_reflectance(radiance: f64, solar_irradiance: f64, sun_zenith_deg: f64, distance_au: f64) -> f64 {
    if !(0.0..90.0).contains(&sun_zenith_deg) || !(solar_irradiance > 0.0) {
        return f64::NAN;
    }
    PI * radiance * distance_au * distance_au / (solar_irradiance * sun_zenith_deg.to_radians().cos())
}

/// Inverse of [`toa_reflectance`]
pub fn toa_radiance(reflectance: f64, solar_irradiance: f64, sun_zenith_deg: f64, distance_au: f64) -> f64 {
    if !(0.0..90.0).contains(&sun_zenith_deg) || !(solar_irradiance > 0.0) {
        return f64::NAN;
    }
    reflectance * solar_irradiance * sun_zenith_deg.to_radians().cos() / (PI * distance_au * distance_au)
}

/// Reflectance for a whole image under a single sun zenith angle
pub fn toa_reflectance_image(
    radiance: &ReflImage,
    solar_irradiance: f64,
    sun_zenith_deg: f64,
    distance_au: f64,
) -> ReflImage {
    let mut output = ReflImage::zeros(radiance.dim());
    let zip = Zip::from(&mut output).and(radiance);
    let pixel = |out: &mut f32, &l: &f32| {
        *out = toa_reflectance(l as f64, solar_irradiance, sun_zenith_deg, distance_au) as f32;
    };

    #[cfg(feature = "parallel")]
    zip.par_for_each(pixel);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(pixel);

    output
}

/// Parameters for TOA reflectance processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub bands: Vec<BandSpec>,
    pub acquisition: AcquisitionInfo,
    pub radiance_scale: f64,         // applied to raw band values before conversion
    pub no_data_value: Option<f32>,  // raw radiance value marking missing pixels
}

impl ProcessingConfig {
    pub fn new(bands: Vec<BandSpec>, acquisition: AcquisitionInfo) -> Self {
        Self {
            bands,
            acquisition,
            radiance_scale: 1.0,
            no_data_value: None,
        }
    }

    pub fn validate(&self) -> ReflResult<()> {
        if self.bands.is_empty() {
            return Err(ReflError::Config("No bands configured".to_string()));
        }

        let mut names = HashSet::new();
        for band in &self.bands {
            if band.name.trim().is_empty() {
                return Err(ReflError::Config("Band with empty name".to_string()));
            }
            if !names.insert(band.name.as_str()) {
                return Err(ReflError::Config(format!("Duplicate band name '{}'", band.name)));
            }
            if band.raster_band == 0 {
                return Err(ReflError::Config(format!(
                    "Band '{}': raster band indices start at 1",
                    band.name
                )));
            }
            band.response
                .validate()
                .map_err(|e| ReflError::Config(format!("Band '{}': {}", band.name, e)))?;
            if let Some(e0) = band.solar_irradiance {
                if !(e0 > 0.0) || !e0.is_finite() {
                    return Err(ReflError::Config(format!(
                        "Band '{}': solar irradiance must be positive, got {}",
                        band.name, e0
                    )));
                }
            }
        }

        match self.acquisition.sun_zenith {
            SunZenithSource::Constant(angle) if !(0.0..90.0).contains(&angle) => {
                return Err(ReflError::Config(format!(
                    "Sun zenith angle {} deg outside [0, 90)",
                    angle
                )));
            }
            SunZenithSource::Band(0) => {
                return Err(ReflError::Config("Sun zenith raster band indices start at 1".to_string()));
            }
            _ => {}
        }

        if !(self.radiance_scale > 0.0) || !self.radiance_scale.is_finite() {
            return Err(ReflError::Config(format!(
                "Radiance scale must be positive, got {}",
                self.radiance_scale
            )));
        }
        Ok(())
    }
}

/// Converts radiance bands to TOA reflectance
#[derive(Debug, Clone)]
pub struct ToaReflectanceProcessor {
    config: ProcessingConfig,
    solar_irradiance: Vec<f64>,
    distance_au: f64,
}

impl ToaReflectanceProcessor {
    /// Resolve the band solar irradiances once, from overrides or the table
    pub fn new(table: &IrradianceTable, config: ProcessingConfig) -> ReflResult<Self> {
        config.validate()?;

        if config.bands.iter().any(|band| band.solar_irradiance.is_none()) {
            table.validate_spectral()?;
        }

        let mut solar_irradiance = Vec::with_capacity(config.bands.len());
        for band in &config.bands {
            let e0 = match band.solar_irradiance {
                Some(e0) => e0,
                None => table.band_irradiance(&band.response)?,
            };
            log::info!("Band {}: E0 = {:.3} mW m-2 nm-1", band.name, e0);
            solar_irradiance.push(e0);
        }

        let distance_au = earth_sun_distance_au(config.acquisition.date);
        log::debug!("Earth-Sun distance on {}: {:.6} AU", config.acquisition.date, distance_au);

        Ok(Self {
            config,
            solar_irradiance,
            distance_au,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn band_count(&self) -> usize {
        self.config.bands.len()
    }

    pub fn band_names(&self) -> Vec<String> {
        self.config.bands.iter().map(|band| band.name.clone()).collect()
    }

    pub fn solar_irradiance(&self) -> &[f64] {
        &self.solar_irradiance
    }

    pub fn earth_sun_distance_au(&self) -> f64 {
        self.distance_au
    }

    /// Raw value to physical radiance, None for missing pixels
    fn scaled_radiance(&self, raw: f32) -> Option<f64> {
        if raw.is_nan() || self.config.no_data_value == Some(raw) {
            None
        } else {
            Some(raw as f64 * self.config.radiance_scale)
        }
    }

    fn e0(&self, band_index: usize) -> ReflResult<f64> {
        self.solar_irradiance.get(band_index).copied().ok_or_else(|| {
            ReflError::Processing(format!(
                "Band index {} out of range ({} bands configured)",
                band_index,
                self.band_count()
            ))
        })
    }

    /// Reflectance for one band with per-pixel sun zenith angles (degrees)
    pub fn compute_band(
        &self,
        band_index: usize,
        radiance: &ReflImage,
        sun_zenith: &ReflImage,
    ) -> ReflResult<ReflImage> {
        let e0 = self.e0(band_index)?;
        if radiance.dim() != sun_zenith.dim() {
            return Err(ReflError::Processing(format!(
                "Radiance {:?} and sun zenith {:?} must have the same dimensions",
                radiance.dim(),
                sun_zenith.dim()
            )));
        }

        let d = self.distance_au;
        let mut output = ReflImage::zeros(radiance.dim());
        let zip = Zip::from(&mut output).and(radiance).and(sun_zenith);
        let pixel = |out: &mut f32, &raw: &f32, &sza: &f32| {
            *out = match self.scaled_radiance(raw) {
                Some(l) => toa_reflectance(l, e0, sza as f64, d) as f32,
                None => f32::NAN,
            };
        };

        #[cfg(feature = "parallel")]
        zip.par_for_each(pixel);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(pixel);

        Ok(output)
    }

    /// Reflectance for one band under a scene-constant sun zenith angle (degrees)
    pub fn compute_band_constant(
        &self,
        band_index: usize,
        radiance: &ReflImage,
        sun_zenith_deg: f64,
    ) -> ReflResult<ReflImage> {
        let e0 = self.e0(band_index)?;
        let d = self.distance_au;
        let mut output = ReflImage::zeros(radiance.dim());
        let zip = Zip::from(&mut output).and(radiance);
        let pixel = |out: &mut f32, &raw: &f32| {
            *out = match self.scaled_radiance(raw) {
                Some(l) => toa_reflectance(l, e0, sun_zenith_deg, d) as f32,
                None => f32::NAN,
            };
        };

        #[cfg(feature = "parallel")]
        zip.par_for_each(pixel);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(pixel);

        Ok(output)
    }

    /// Convert every configured band.
    ///
    /// `sun_zenith` is required when the configuration reads angles from a band.
    pub fn compute_all(
        &self,
        radiance: &[ReflImage],
        sun_zenith: Option<&ReflImage>,
    ) -> ReflResult<Vec<ReflImage>> {
        if radiance.len() != self.band_count() {
            return Err(ReflError::Processing(format!(
                "Expected {} radiance bands, got {}",
                self.band_count(),
                radiance.len()
            )));
        }

        let convert = |(i, band): (usize, &ReflImage)| match (&self.config.acquisition.sun_zenith, sun_zenith) {
            (SunZenithSource::Constant(angle), _) => self.compute_band_constant(i, band, *angle),
            (SunZenithSource::Band(_), Some(angles)) => self.compute_band(i, band, angles),
            (SunZenithSource::Band(index), None) => Err(ReflError::Processing(format!(
                "Sun zenith band {} requested but no angle raster supplied",
                index
            ))),
        };

        // Bands in parallel, pixels within each band as well
        #[cfg(feature = "parallel")]
        let images = radiance.par_iter().enumerate().map(convert).collect();
        #[cfg(not(feature = "parallel"))]
        let images = radiance.iter().enumerate().map(convert).collect();
        images
    }
}

/// Raster-free entry point: radiance arrays and configuration in, reflectance out
pub fn process_arrays(
    table: &IrradianceTable,
    config: ProcessingConfig,
    radiance: &[ReflImage],
    sun_zenith: Option<&ReflImage>,
) -> ReflResult<(Vec<ReflImage>, ProcessingReport)> {
    let processor = ToaReflectanceProcessor::new(table, config)?;
    let reflectance = processor.compute_all(radiance, sun_zenith)?;

    let dimensions = reflectance.first().map(|image| image.dim()).unwrap_or((0, 0));
    let invalid_pixels = reflectance
        .iter()
        .map(|image| image.iter().filter(|v| v.is_nan()).count())
        .sum();

    log::info!(
        "Computed TOA reflectance for {} bands ({}x{}), {} invalid pixels",
        reflectance.len(),
        dimensions.0,
        dimensions.1,
        invalid_pixels
    );

    let report = ProcessingReport {
        output_path: None,
        bands: processor.band_names(),
        dimensions,
        earth_sun_distance_au: processor.earth_sun_distance_au(),
        band_solar_irradiance: processor.solar_irradiance().to_vec(),
        invalid_pixels,
    };
    Ok((reflectance, report))
}
