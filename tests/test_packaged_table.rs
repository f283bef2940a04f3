//! `load_table()` through the standard search path.
//!
//! Kept in its own test binary with a single test: the environment
//! override is process-global.

use surfrefl::io::irradiance::{AUXDATA_DIR_ENV, THUILLIER_RESOURCE, THUILLIER_ROW_COUNT};
use surfrefl::{load_table, IrradianceTable, ReflError, ResourceLocator};
use tempfile::TempDir;

fn synthetic_table() -> IrradianceTable {
    let wavelengths: Vec<f64> = (0..THUILLIER_ROW_COUNT)
        .map(|i| 200.0 + i as f64 * 0.2683)
        .collect();
    let irradiances: Vec<f64> = wavelengths
        .iter()
        .map(|w| 1800.0 * (-((w - 520.0) / 650.0).powi(2)).exp())
        .collect();
    IrradianceTable::new(wavelengths, irradiances).unwrap()
}

#[test]
fn test_load_table_with_environment_override() {
    let _ = env_logger::builder().is_test(true).try_init();

    let override_dir = TempDir::new().unwrap();
    let data_home = TempDir::new().unwrap();
    std::env::set_var(AUXDATA_DIR_ENV, override_dir.path());
    // Keeps a table installed on this machine out of the search path (Linux)
    std::env::set_var("XDG_DATA_HOME", data_home.path());

    let locator = ResourceLocator::packaged();
    assert_eq!(locator.file_name(), THUILLIER_RESOURCE);
    assert_eq!(locator.search_dirs().len(), 3);
    assert_eq!(locator.search_dirs()[0].as_path(), override_dir.path());

    let reference = synthetic_table();
    let path = override_dir.path().join(THUILLIER_RESOURCE);
    reference
        .write_to(std::io::BufWriter::new(std::fs::File::create(&path).unwrap()))
        .unwrap();

    let loaded = load_table().unwrap();
    assert_eq!(loaded.row_count(), THUILLIER_ROW_COUNT);
    assert_eq!(loaded.wavelengths().len(), loaded.irradiances().len());
    assert_eq!(loaded, reference);
    assert_eq!(load_table().unwrap(), loaded);

    std::fs::remove_file(&path).unwrap();
    let elsewhere = locator.search_dirs()[1..]
        .iter()
        .any(|dir| dir.join(THUILLIER_RESOURCE).exists() || dir.join(format!("{}.gz", THUILLIER_RESOURCE)).exists());
    if elsewhere {
        println!("Irradiance table also present outside the override, skipping missing-resource check");
        return;
    }
    match load_table() {
        Err(ReflError::ResourceMissing(msg)) => assert!(msg.contains(THUILLIER_RESOURCE), "unexpected: {}", msg),
        other => panic!("expected ResourceMissing, got {:?}", other),
    }
}
