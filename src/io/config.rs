use crate::core::toa_reflectance::ProcessingConfig;
use crate::types::{AcquisitionInfo, BandSpec, ReflError, ReflResult, SpectralResponse, SunZenithSource};
use chrono::NaiveDate;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Root `<processing>` element of a parameter file
#[derive(Debug, Deserialize)]
pub struct ProcessingXml {
    #[serde(rename = "acquisitionDate")]
    pub acquisition_date: String,
    #[serde(rename = "sunZenithDeg")]
    pub sun_zenith_deg: Option<f64>,
    #[serde(rename = "sunZenithBand")]
    pub sun_zenith_band: Option<usize>,
    #[serde(rename = "radianceScale")]
    pub radiance_scale: Option<f64>,
    #[serde(rename = "noDataValue")]
    pub no_data_value: Option<f32>,
    #[serde(rename = "band", default)]
    pub bands: Vec<BandXml>,
}

#[derive(Debug, Deserialize)]
pub struct BandXml {
    pub name: String,
    #[serde(rename = "rasterBand")]
    pub raster_band: usize,
    #[serde(rename = "centerWavelength")]
    pub center_wavelength: Option<f64>,
    pub fwhm: Option<f64>,
    #[serde(rename = "srfWavelengths")]
    pub srf_wavelengths: Option<String>,
    #[serde(rename = "srfWeights")]
    pub srf_weights: Option<String>,
    #[serde(rename = "solarIrradiance")]
    pub solar_irradiance: Option<f64>,
}

impl BandXml {
    fn into_band_spec(self) -> ReflResult<BandSpec> {
        let response = match (self.srf_wavelengths, self.srf_weights, self.center_wavelength, self.fwhm) {
            (Some(wavelengths), Some(weights), _, _) => SpectralResponse::Sampled {
                wavelengths_nm: parse_space_separated_numbers(&wavelengths)?,
                weights: parse_space_separated_numbers(&weights)?,
            },
            (None, None, Some(center_nm), Some(fwhm_nm)) => SpectralResponse::Gaussian { center_nm, fwhm_nm },
            _ => {
                return Err(ReflError::Config(format!(
                    "Band '{}' needs either centerWavelength + fwhm or srfWavelengths + srfWeights",
                    self.name
                )));
            }
        };

        Ok(BandSpec {
            name: self.name,
            raster_band: self.raster_band,
            response,
            solar_irradiance: self.solar_irradiance,
        })
    }
}

impl ProcessingXml {
    fn into_config(self) -> ReflResult<ProcessingConfig> {
        let date = NaiveDate::parse_from_str(self.acquisition_date.trim(), "%Y-%m-%d").map_err(|e| {
            ReflError::Config(format!(
                "Invalid acquisitionDate '{}' (expected YYYY-MM-DD): {}",
                self.acquisition_date, e
            ))
        })?;

        let sun_zenith = match (self.sun_zenith_deg, self.sun_zenith_band) {
            (Some(angle), None) => SunZenithSource::Constant(angle),
            (None, Some(band)) => SunZenithSource::Band(band),
            (Some(_), Some(_)) => {
                return Err(ReflError::Config(
                    "Specify either sunZenithDeg or sunZenithBand, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(ReflError::Config(
                    "Missing sun zenith: set sunZenithDeg or sunZenithBand".to_string(),
                ));
            }
        };

        let bands = self
            .bands
            .into_iter()
            .map(BandXml::into_band_spec)
            .collect::<ReflResult<Vec<_>>>()?;

        let mut config = ProcessingConfig::new(bands, AcquisitionInfo { date, sun_zenith });
        if let Some(scale) = self.radiance_scale {
            config.radiance_scale = scale;
        }
        config.no_data_value = self.no_data_value;
        Ok(config)
    }
}

/// Parse and validate a `<processing>` parameter document
pub fn parse_processing_config(xml_content: &str) -> ReflResult<ProcessingConfig> {
    let raw: ProcessingXml = from_str(xml_content)
        .map_err(|e| ReflError::XmlParsing(format!("Failed to parse processing parameters: {}", e)))?;

    let config = raw.into_config()?;
    config.validate()?;

    log::debug!(
        "Parsed processing parameters: {} bands, date {}",
        config.bands.len(),
        config.acquisition.date
    );
    Ok(config)
}

/// Read a processing parameter file from disk
pub fn read_processing_config<P: AsRef<Path>>(path: P) -> ReflResult<ProcessingConfig> {
    log::info!("Reading processing parameters: {}", path.as_ref().display());
    let content = std::fs::read_to_string(&path)?;
    parse_processing_config(&content)
}

/// Parse space-separated numbers from a string
fn parse_space_separated_numbers<T>(input: &str) -> ReflResult<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    input
        .split_whitespace()
        .map(|s| s.parse::<T>().map_err(|e|
            ReflError::Config(format!("Parse error in '{}': {}", s, e))
        ))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_and_sampled_bands() {
        let xml = r#"
        <processing>
            <acquisitionDate>2021-06-15</acquisitionDate>
            <sunZenithDeg>35.5</sunZenithDeg>
            <radianceScale>0.01</radianceScale>
            <noDataValue>-999</noDataValue>
            <band>
                <name>B4</name>
                <rasterBand>1</rasterBand>
                <centerWavelength>665.0</centerWavelength>
                <fwhm>30.0</fwhm>
            </band>
            <band>
                <name>B8</name>
                <rasterBand>2</rasterBand>
                <srfWavelengths>820 830 840 850</srfWavelengths>
                <srfWeights>0.1 0.9 1.0 0.2</srfWeights>
                <solarIrradiance>1041.6</solarIrradiance>
            </band>
        </processing>
        "#;

        let config = parse_processing_config(xml).unwrap();
        assert_eq!(config.bands.len(), 2);
        assert_eq!(config.acquisition.date, NaiveDate::from_ymd_opt(2021, 6, 15).unwrap());
        assert_eq!(config.acquisition.sun_zenith, SunZenithSource::Constant(35.5));
        assert_eq!(config.radiance_scale, 0.01);
        assert_eq!(config.no_data_value, Some(-999.0));
        assert_eq!(
            config.bands[0].response,
            SpectralResponse::Gaussian { center_nm: 665.0, fwhm_nm: 30.0 }
        );
        match &config.bands[1].response {
            SpectralResponse::Sampled { wavelengths_nm, weights } => {
                assert_eq!(wavelengths_nm, &vec![820.0, 830.0, 840.0, 850.0]);
                assert_eq!(weights.len(), 4);
            }
            other => panic!("expected sampled response, got {:?}", other),
        }
        assert_eq!(config.bands[1].solar_irradiance, Some(1041.6));
    }

    #[test]
    fn test_missing_response() {
        let xml = r#"
        <processing>
            <acquisitionDate>2021-06-15</acquisitionDate>
            <sunZenithBand>3</sunZenithBand>
            <band><name>B4</name><rasterBand>1</rasterBand><fwhm>30</fwhm></band>
        </processing>
        "#;
        assert!(matches!(parse_processing_config(xml), Err(ReflError::Config(_))));
    }

    #[test]
    fn test_bad_date() {
        let xml = r#"
        <processing>
            <acquisitionDate>15/06/2021</acquisitionDate>
            <sunZenithDeg>30</sunZenithDeg>
            <band><name>B4</name><rasterBand>1</rasterBand><centerWavelength>665</centerWavelength><fwhm>30</fwhm></band>
        </processing>
        "#;
        assert!(matches!(parse_processing_config(xml), Err(ReflError::Config(_))));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            parse_processing_config("<processing><acquisitionDate>"),
            Err(ReflError::XmlParsing(_))
        ));
    }
}
