use crate::core::toa_reflectance::{process_arrays, ProcessingConfig};
use crate::io::irradiance::IrradianceTable;
use crate::types::{ProcessingReport, ReflError, ReflImage, ReflResult, SunZenithSource};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Read one 1-based raster band as f32
pub fn read_band(dataset: &Dataset, band_index: usize) -> ReflResult<ReflImage> {
    let band_count = dataset.raster_count() as usize;
    if band_index == 0 || band_index > band_count {
        return Err(ReflError::Processing(format!(
            "Raster band {} requested but product has {} bands",
            band_index, band_count
        )));
    }

    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(band_index as _)?;
    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| ReflError::Processing(format!("Failed to reshape band {}: {}", band_index, e)))
}

/// Write reflectance bands as a float32 GeoTIFF georeferenced like `source`
pub fn write_reflectance<P: AsRef<Path>>(
    path: P,
    source: &Dataset,
    bands: &[ReflImage],
) -> ReflResult<()> {
    let (rows, cols) = bands
        .first()
        .map(|image| image.dim())
        .ok_or_else(|| ReflError::Processing("No reflectance bands to write".to_string()))?;

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut output = driver.create_with_band_type::<f32, _>(
        path.as_ref(),
        cols as _,
        rows as _,
        bands.len() as _,
    )?;

    match source.geo_transform() {
        Ok(transform) => output.set_geo_transform(&transform)?,
        Err(e) => log::warn!("Source product has no geotransform: {}", e),
    }
    let projection = source.projection();
    if !projection.is_empty() {
        output.set_projection(&projection)?;
    }

    for (i, image) in bands.iter().enumerate() {
        if image.dim() != (rows, cols) {
            return Err(ReflError::Processing(format!(
                "Band {} has dimensions {:?}, expected {:?}",
                i + 1,
                image.dim(),
                (rows, cols)
            )));
        }
        let mut band = output.rasterband((i + 1) as _)?;
        band.set_no_data_value(Some(f64::NAN))?;
        let buffer = Buffer::new((cols, rows), image.iter().copied().collect());
        band.write((0, 0), (cols, rows), &buffer)?;
    }

    log::info!("Wrote {} reflectance bands to {}", bands.len(), path.as_ref().display());
    Ok(())
}

/// Product entry point: radiance raster + configuration in, reflectance GeoTIFF out
pub fn process_product<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &ProcessingConfig,
    table: &IrradianceTable,
) -> ReflResult<ProcessingReport> {
    log::info!("Processing radiance product: {}", input.as_ref().display());
    let dataset = Dataset::open(input.as_ref())?;

    let radiance = config
        .bands
        .iter()
        .map(|band| read_band(&dataset, band.raster_band))
        .collect::<ReflResult<Vec<_>>>()?;

    let sun_zenith = match config.acquisition.sun_zenith {
        SunZenithSource::Band(index) => Some(read_band(&dataset, index)?),
        SunZenithSource::Constant(_) => None,
    };

    let (reflectance, mut report) = process_arrays(table, config.clone(), &radiance, sun_zenith.as_ref())?;
    write_reflectance(&output, &dataset, &reflectance)?;

    report.output_path = Some(output.as_ref().to_path_buf());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AcquisitionInfo, BandSpec, SpectralResponse};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn write_input(path: &Path) {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver.create_with_band_type::<f32, _>(path, 4 as _, 3 as _, 2 as _).unwrap();
        dataset.set_geo_transform(&[500000.0, 10.0, 0.0, 4500000.0, 0.0, -10.0]).unwrap();

        for (index, value) in [(1, 120.0f32), (2, 30.0f32)] {
            let mut band = dataset.rasterband(index as _).unwrap();
            let buffer = Buffer::new((4, 3), vec![value; 12]);
            band.write((0, 0), (4, 3), &buffer).unwrap();
        }
    }

    #[test]
    fn test_process_product_round_trip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("radiance.tif");
        let output = dir.path().join("reflectance.tif");
        write_input(&input);

        let wavelengths: Vec<f64> = (0..800).map(|i| 400.0 + i as f64).collect();
        let table = IrradianceTable::new(wavelengths.clone(), vec![1500.0; wavelengths.len()]).unwrap();
        let config = ProcessingConfig::new(
            vec![BandSpec {
                name: "red".to_string(),
                raster_band: 1,
                response: SpectralResponse::Gaussian { center_nm: 665.0, fwhm_nm: 30.0 },
                solar_irradiance: None,
            }],
            AcquisitionInfo {
                date: NaiveDate::from_ymd_opt(2021, 3, 20).unwrap(),
                sun_zenith: SunZenithSource::Band(2),
            },
        );

        let report = process_product(&input, &output, &config, &table).unwrap();
        assert_eq!(report.dimensions, (3, 4));
        assert_eq!(report.output_path.as_deref(), Some(output.as_path()));

        let written = Dataset::open(&output).unwrap();
        assert_eq!(written.raster_count() as usize, 1);
        let rho = read_band(&written, 1).unwrap();
        let expected = crate::core::toa_reflectance::toa_reflectance(
            120.0,
            report.band_solar_irradiance[0],
            30.0,
            report.earth_sun_distance_au,
        ) as f32;
        assert!((rho[[1, 2]] - expected).abs() < 1e-5);
    }
}
