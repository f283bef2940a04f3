//! Solar spectral irradiance reference table (Thuillier 2002).
//!
//! The table ships as a packed big-endian resource:
//!
//! ```text
//! i32        rowCount
//! f64 x N    wavelengths  (nm)
//! f64 x N    irradiances  (mW m-2 nm-1)
//! ```
//!
//! A plain-text dump (one `wavelength irradiance` pair per line) is also
//! supported for packing new resources and for verifying existing ones.

use crate::io::auxdata::{default_auxdata_dir, AUXDATA_VERSION};
use crate::types::{ReflError, ReflResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use ndarray::{aview1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// File name of the packaged Thuillier table
pub const THUILLIER_RESOURCE: &str = "thuillier_2002.bin";

/// Number of rows in the reference Thuillier dataset
pub const THUILLIER_ROW_COUNT: usize = 8191;

/// Environment variable pointing at an alternative auxdata directory
pub const AUXDATA_DIR_ENV: &str = "SURFREFL_AUXDATA_DIR";

/// Upper bound on rows reserved before any value has been read
const MAX_PREALLOCATED_ROWS: usize = 1 << 16;

/// Two parallel columns: wavelength and solar irradiance
#[derive(Debug, Clone, PartialEq)]
pub struct IrradianceTable {
    wavelengths: Vec<f64>,
    irradiances: Vec<f64>,
}

impl IrradianceTable {
    /// Build a table from two columns of equal length
    pub fn new(wavelengths: Vec<f64>, irradiances: Vec<f64>) -> ReflResult<Self> {
        if wavelengths.len() != irradiances.len() {
            return Err(ReflError::InvalidFormat(format!(
                "Column length mismatch: {} wavelengths, {} irradiances",
                wavelengths.len(),
                irradiances.len()
            )));
        }
        Ok(Self { wavelengths, irradiances })
    }

    pub fn row_count(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn irradiances(&self) -> &[f64] {
        &self.irradiances
    }

    /// Table as a (2, rowCount) array: row 0 wavelengths, row 1 irradiances
    pub fn as_rows(&self) -> Array2<f64> {
        let mut rows = Array2::zeros((2, self.row_count()));
        rows.row_mut(0).assign(&aview1(&self.wavelengths));
        rows.row_mut(1).assign(&aview1(&self.irradiances));
        rows
    }

    /// Decode the packed big-endian layout from any byte stream.
    ///
    /// The stream is read to completion. A stream that ends before the
    /// declared number of values is reported as `CorruptData` and no
    /// partial table is returned.
    pub fn read_from<R: Read>(mut reader: R) -> ReflResult<Self> {
        let declared = reader
            .read_i32::<BigEndian>()
            .map_err(|e| corrupt_or_io(e, "stream ended before the row count header"))?;

        if declared < 0 {
            return Err(ReflError::CorruptData(format!(
                "Negative row count {} in table header",
                declared
            )));
        }
        let row_count = declared as usize;
        log::debug!("Irradiance table declares {} rows", row_count);

        let wavelengths = read_f64_column(&mut reader, row_count, "wavelength")?;
        let irradiances = read_f64_column(&mut reader, row_count, "irradiance")?;

        let trailing = std::io::copy(&mut reader, &mut std::io::sink())
            .map_err(|e| corrupt_or_io(e, "stream damaged after the irradiance column"))?;
        if trailing > 0 {
            log::debug!("Ignoring {} trailing bytes after irradiance table", trailing);
        }

        Ok(Self { wavelengths, irradiances })
    }

    /// Encode the table in the packed big-endian layout
    pub fn write_to<W: Write>(&self, mut writer: W) -> ReflResult<()> {
        let row_count = i32::try_from(self.row_count()).map_err(|_| {
            ReflError::InvalidFormat(format!(
                "Table with {} rows does not fit the i32 row count header",
                self.row_count()
            ))
        })?;

        writer.write_i32::<BigEndian>(row_count)?;
        for &wavelength in &self.wavelengths {
            writer.write_f64::<BigEndian>(wavelength)?;
        }
        for &irradiance in &self.irradiances {
            writer.write_f64::<BigEndian>(irradiance)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse a plain-text dump: two numeric columns, `#` starts a comment line
    pub fn read_text_dump<R: BufRead>(reader: R) -> ReflResult<Self> {
        let mut wavelengths = Vec::new();
        let mut irradiances = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|field| !field.is_empty());

            match (fields.next(), fields.next(), fields.next()) {
                (Some(wavelength), Some(irradiance), None) => {
                    wavelengths.push(parse_dump_value(wavelength, line_no)?);
                    irradiances.push(parse_dump_value(irradiance, line_no)?);
                }
                _ => {
                    return Err(ReflError::CorruptData(format!(
                        "Line {}: expected two columns, got '{}'",
                        line_no, trimmed
                    )));
                }
            }
        }

        Ok(Self { wavelengths, irradiances })
    }

    /// Write a plain-text dump that parses back to identical values
    pub fn write_text_dump<W: Write>(&self, mut writer: W) -> ReflResult<()> {
        writeln!(writer, "# wavelength_nm irradiance_mW_m-2_nm-1")?;
        for (wavelength, irradiance) in self.wavelengths.iter().zip(&self.irradiances) {
            writeln!(writer, "{} {}", wavelength, irradiance)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Read `count` big-endian doubles, failing on a short stream
fn read_f64_column<R: Read>(reader: &mut R, count: usize, column: &str) -> ReflResult<Vec<f64>> {
    let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATED_ROWS));
    for read in 0..count {
        let value = reader.read_f64::<BigEndian>().map_err(|e| {
            corrupt_or_io(
                e,
                &format!(
                    "{} column truncated: expected {} values, stream ended after {}",
                    column, count, read
                ),
            )
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Short or undecodable streams are corrupt data, anything else is plain I/O.
/// flate2 reports a damaged deflate stream as `InvalidInput`.
fn corrupt_or_io(error: std::io::Error, context: &str) -> ReflError {
    match error.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            ReflError::CorruptData(format!("{} ({})", context, error))
        }
        _ => ReflError::Io(error),
    }
}

fn parse_dump_value(field: &str, line_no: usize) -> ReflResult<f64> {
    field.parse::<f64>().map_err(|e| {
        ReflError::CorruptData(format!("Line {}: invalid number '{}': {}", line_no, field, e))
    })
}

/// Check for the gzip magic signature without consuming the stream
fn is_gzip_stream<R: BufRead>(reader: &mut R) -> std::io::Result<bool> {
    let head = reader.fill_buf()?;
    Ok(head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b)
}

/// Directory holding the resources packaged with this crate
pub fn packaged_resource_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join("auxdata")
}

/// Finds a packaged resource by searching a list of directories in order
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    file_name: String,
    search_dirs: Vec<PathBuf>,
}

impl ResourceLocator {
    /// Locator with no search directories yet
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            search_dirs: Vec::new(),
        }
    }

    /// Standard search order for the Thuillier table: environment override,
    /// installed auxdata for this version, then the crate's packaged resources
    pub fn packaged() -> Self {
        let mut locator = Self::new(THUILLIER_RESOURCE);
        if let Some(dir) = std::env::var_os(AUXDATA_DIR_ENV) {
            locator = locator.with_dir(PathBuf::from(dir));
        }
        locator
            .with_dir(default_auxdata_dir(AUXDATA_VERSION))
            .with_dir(packaged_resource_dir())
    }

    pub fn with_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// First existing `<dir>/<name>` or `<dir>/<name>.gz`
    pub fn locate(&self) -> ReflResult<PathBuf> {
        let gz_name = format!("{}.gz", self.file_name);
        for dir in &self.search_dirs {
            for name in [self.file_name.as_str(), gz_name.as_str()] {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    log::debug!("Resolved {} to {}", self.file_name, candidate.display());
                    return Ok(candidate);
                }
            }
        }

        let searched: Vec<String> = self
            .search_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        Err(ReflError::ResourceMissing(format!(
            "{} not found in [{}]",
            self.file_name,
            searched.join(", ")
        )))
    }
}

/// Load the packaged Thuillier solar irradiance table.
///
/// Every call reopens and decodes the resource, nothing is cached.
pub fn load_table() -> ReflResult<IrradianceTable> {
    let path = ResourceLocator::packaged().locate()?;
    load_table_from(path)
}

/// Decode a packed table from any stream (already decompressed)
pub fn read_table<R: Read>(reader: R) -> ReflResult<IrradianceTable> {
    IrradianceTable::read_from(reader)
}

/// Load an irradiance table from a packed (optionally gzipped) file
pub fn load_table_from<P: AsRef<Path>>(path: P) -> ReflResult<IrradianceTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        ReflError::ResourceMissing(format!("Cannot open {}: {}", path.display(), e))
    })?;

    let mut reader = BufReader::new(file);
    let table = if is_gzip_stream(&mut reader)? {
        log::debug!("Decompressing gzip irradiance table {}", path.display());
        read_table(GzDecoder::new(reader))?
    } else {
        read_table(reader)?
    };

    log::info!(
        "Loaded irradiance table {} ({} rows)",
        path.display(),
        table.row_count()
    );
    Ok(table)
}

/// Load a plain-text dump from disk
pub fn read_text_dump_file<P: AsRef<Path>>(path: P) -> ReflResult<IrradianceTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        ReflError::ResourceMissing(format!("Cannot open {}: {}", path.display(), e))
    })?;
    IrradianceTable::read_text_dump(BufReader::new(file))
}

/// Convert a plain-text dump into the packed binary layout, returns the row count
pub fn pack_text_dump<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> ReflResult<usize> {
    let table = read_text_dump_file(&input)?;

    if let Some(parent) = output.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(output.as_ref())?;
    table.write_to(BufWriter::new(file))?;

    log::info!(
        "Packed {} rows from {} into {}",
        table.row_count(),
        input.as_ref().display(),
        output.as_ref().display()
    );
    Ok(table.row_count())
}
