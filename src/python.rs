//! Python bindings (`_core` extension module)

use crate::core::toa_reflectance::{earth_sun_distance_au, toa_reflectance_image};
use crate::io::auxdata::{AuxdataInstaller, AuxdataSource, InstallState};
use crate::io::irradiance::{load_table, load_table_from};
use crate::types::ReflError;
use chrono::NaiveDate;
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

fn to_py_err(e: ReflError) -> PyErr {
    match e {
        ReflError::Config(_) | ReflError::InvalidFormat(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn parse_date(date: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| PyValueError::new_err(format!("Invalid date '{}': {}", date, e)))
}

/// Load the irradiance table, returns (wavelengths, irradiances)
#[pyfunction]
fn load_irradiance_table(py: Python, path: Option<String>) -> PyResult<(PyObject, PyObject)> {
    let table = match path {
        Some(path) => load_table_from(path),
        None => load_table(),
    }
    .map_err(to_py_err)?;

    Ok((
        table.wavelengths().to_pyarray(py).into(),
        table.irradiances().to_pyarray(py).into(),
    ))
}

/// Earth-Sun distance (AU) for a YYYY-MM-DD date
#[pyfunction]
fn earth_sun_distance(date: String) -> PyResult<f64> {
    Ok(earth_sun_distance_au(parse_date(&date)?))
}

/// Convert a radiance image to TOA reflectance
#[pyfunction]
fn compute_toa_reflectance(
    py: Python,
    radiance: PyReadonlyArray2<f32>,
    solar_irradiance: f64,
    sun_zenith_deg: f64,
    date: String,
) -> PyResult<PyObject> {
    if !(solar_irradiance > 0.0) {
        return Err(PyValueError::new_err("solar_irradiance must be positive"));
    }
    let distance = earth_sun_distance_au(parse_date(&date)?);
    let array = radiance.as_array().to_owned();

    let reflectance = py.allow_threads(|| {
        toa_reflectance_image(&array, solar_irradiance, sun_zenith_deg, distance)
    });
    Ok(reflectance.to_pyarray(py).into())
}

/// Python handle for an installation state
#[pyclass(name = "InstallState")]
struct PyInstallState {
    inner: InstallState,
}

#[pymethods]
impl PyInstallState {
    #[new]
    fn new() -> Self {
        PyInstallState { inner: InstallState::new() }
    }

    #[getter]
    fn installed(&self) -> bool {
        self.inner.is_installed()
    }

    fn __repr__(&self) -> String {
        format!("InstallState(installed={})", self.inner.is_installed())
    }
}

/// Install auxiliary data once per state, returns the copied relative paths
#[pyfunction]
fn ensure_auxdata_installed(
    state: PyRef<PyInstallState>,
    source: String,
    target_dir: Option<String>,
    pattern: Option<String>,
) -> PyResult<Vec<String>> {
    let source_path = PathBuf::from(&source);
    let source = if source.to_lowercase().ends_with(".zip") {
        AuxdataSource::Archive(source_path)
    } else {
        AuxdataSource::Directory(source_path)
    };

    let mut installer = match target_dir {
        Some(dir) => AuxdataInstaller::new(source, PathBuf::from(dir)),
        None => AuxdataInstaller::for_current_version(source),
    };
    if let Some(pattern) = pattern {
        installer = installer.with_pattern(&pattern).map_err(to_py_err)?;
    }

    let report = installer.ensure_installed(&state.inner).map_err(to_py_err)?;
    Ok(report.copied)
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyInstallState>()?;

    m.add_function(wrap_pyfunction!(load_irradiance_table, m)?)?;
    m.add_function(wrap_pyfunction!(earth_sun_distance, m)?)?;
    m.add_function(wrap_pyfunction!(compute_toa_reflectance, m)?)?;
    m.add_function(wrap_pyfunction!(ensure_auxdata_installed, m)?)?;

    Ok(())
}
