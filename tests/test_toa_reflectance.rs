use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use std::f64::consts::PI;
use surfrefl::core::toa_reflectance::{earth_sun_distance_au, toa_radiance, toa_reflectance};
use surfrefl::io::config::parse_processing_config;
use surfrefl::{process_arrays, IrradianceTable, ReflError, SunZenithSource, ToaReflectanceProcessor};

/// Blackbody-shaped spectrum on a 1 nm grid (shape only, not a reference dataset)
fn smooth_spectrum() -> IrradianceTable {
    let wavelengths: Vec<f64> = (0..=2000).map(|i| 300.0 + i as f64).collect();
    let irradiances: Vec<f64> = wavelengths
        .iter()
        .map(|w| 1900.0 * (-((w - 480.0) / 700.0).powi(2)).exp())
        .collect();
    IrradianceTable::new(wavelengths, irradiances).unwrap()
}

const PARAMETERS: &str = r#"
<processing>
    <acquisitionDate>2020-01-03</acquisitionDate>
    <sunZenithBand>3</sunZenithBand>
    <radianceScale>0.1</radianceScale>
    <noDataValue>0</noDataValue>
    <band>
        <name>B4</name>
        <rasterBand>1</rasterBand>
        <centerWavelength>665.0</centerWavelength>
        <fwhm>30.0</fwhm>
    </band>
    <band>
        <name>B8</name>
        <rasterBand>2</rasterBand>
        <srfWavelengths>780 800 830 860 880</srfWavelengths>
        <srfWeights>0.0 0.8 1.0 0.7 0.0</srfWeights>
    </band>
</processing>
"#;

#[test]
fn test_earth_sun_distance_over_a_year() {
    let mut date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let mut closest = (date, f64::MAX);
    while date.year() == 2021 {
        let d = earth_sun_distance_au(date);
        assert!((0.983..=1.017).contains(&d), "{} -> {}", date, d);
        if d < closest.1 {
            closest = (date, d);
        }
        date = date.succ_opt().unwrap();
    }
    assert_eq!(closest.0.month(), 1);
    assert!(closest.0.day() <= 7);
}

#[test]
fn test_reflectance_radiance_consistency() {
    for &sza in &[0.0, 25.0, 60.0, 85.0] {
        let rho = 0.3;
        let l = toa_radiance(rho, 1550.0, sza, 0.99);
        assert_relative_eq!(toa_reflectance(l, 1550.0, sza, 0.99), rho, epsilon = 1e-12);
    }
    // Lambertian reference: overhead sun, 1 AU, L = E0 / π gives ρ = 1
    assert_relative_eq!(toa_reflectance(1550.0 / PI, 1550.0, 0.0, 1.0), 1.0, epsilon = 1e-12);
}

#[test]
fn test_parameter_file_to_reflectance() {
    let _ = env_logger::builder().is_test(true).try_init();
    let table = smooth_spectrum();
    let config = parse_processing_config(PARAMETERS).unwrap();
    assert_eq!(config.acquisition.sun_zenith, SunZenithSource::Band(3));

    let red = Array2::from_shape_vec((2, 3), vec![800.0f32, 0.0, 650.0, 1200.0, f32::NAN, 900.0]).unwrap();
    let nir = Array2::from_elem((2, 3), 1500.0f32);
    let angles = Array2::from_shape_vec((2, 3), vec![20.0f32, 20.0, 20.0, 40.0, 40.0, 91.0]).unwrap();

    let (images, report) = process_arrays(&table, config.clone(), &[red, nir], Some(&angles)).unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(report.bands, vec!["B4".to_string(), "B8".to_string()]);
    assert_eq!(report.dimensions, (2, 3));
    assert_relative_eq!(report.earth_sun_distance_au, earth_sun_distance_au(config.acquisition.date));

    // no-data (0), NaN and the sun below the horizon, in both bands for the last one
    assert!(images[0][[0, 1]].is_nan());
    assert!(images[0][[1, 1]].is_nan());
    assert!(images[0][[1, 2]].is_nan());
    assert!(images[1][[1, 2]].is_nan());
    assert_eq!(report.invalid_pixels, 4);

    let e0_red = report.band_solar_irradiance[0];
    let expected = toa_reflectance(80.0, e0_red, 20.0, report.earth_sun_distance_au);
    assert_relative_eq!(images[0][[0, 0]] as f64, expected, epsilon = 1e-6);

    // E0 is the response-weighted mean, close to the spectrum at the band centre
    let at_center = table.irradiance_at(665.0).unwrap();
    assert!((e0_red - at_center).abs() / at_center < 0.01);
}

#[test]
fn test_processor_rejects_unusable_table() {
    let config = parse_processing_config(PARAMETERS).unwrap();
    let unsorted = IrradianceTable::new(vec![700.0, 600.0], vec![1.0, 1.0]).unwrap();
    assert!(matches!(
        ToaReflectanceProcessor::new(&unsorted, config),
        Err(ReflError::InvalidFormat(_))
    ));
}

#[test]
fn test_band_count_mismatch() {
    let config = parse_processing_config(PARAMETERS).unwrap();
    let processor = ToaReflectanceProcessor::new(&smooth_spectrum(), config).unwrap();
    let only_one = vec![Array2::from_elem((2, 2), 1.0f32)];
    assert!(processor.compute_all(&only_one, None).is_err());
}
