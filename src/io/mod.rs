//! I/O modules for irradiance tables, auxiliary data, parameters and products

pub mod irradiance;
pub mod auxdata;
pub mod config;
#[cfg(feature = "gdal")]
pub mod product;

pub use irradiance::{load_table, load_table_from, read_table, IrradianceTable, ResourceLocator};
pub use auxdata::{AuxdataInstaller, AuxdataSource, InstallReport, InstallState};
pub use config::{parse_processing_config, read_processing_config};
#[cfg(feature = "gdal")]
pub use product::process_product;
