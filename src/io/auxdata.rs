use crate::types::{ReflError, ReflResult};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use zip::ZipArchive;

/// Version component of the auxdata directory
pub const AUXDATA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Versioned directory for installed auxiliary data
pub fn default_auxdata_dir(version: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("surfrefl")
        .join("auxdata")
        .join(version)
}

/// Installation state owned by the caller.
///
/// One state should be shared by every caller installing into the same
/// target; concurrent `ensure_installed` calls on it are serialized.
#[derive(Debug, Default)]
pub struct InstallState {
    installed: Mutex<bool>,
}

impl InstallState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // A panic while copying leaves `false` behind, which is safe to retry
        self.installed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Where auxiliary files are copied from
#[derive(Debug, Clone)]
pub enum AuxdataSource {
    /// A directory tree
    Directory(PathBuf),
    /// A zip bundle
    Archive(PathBuf),
}

impl std::fmt::Display for AuxdataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuxdataSource::Directory(path) => write!(f, "directory {}", path.display()),
            AuxdataSource::Archive(path) => write!(f, "archive {}", path.display()),
        }
    }
}

/// Outcome of one `ensure_installed` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub target_dir: PathBuf,
    pub copied: Vec<String>,   // relative paths, '/'-separated
    pub skipped: Vec<String>,  // matched but already present
    pub already_installed: bool,
}

/// Copies matching auxiliary files into a versioned directory once
#[derive(Debug, Clone)]
pub struct AuxdataInstaller {
    source: AuxdataSource,
    target_dir: PathBuf,
    pattern: Option<Regex>,
    overwrite: bool,
}

impl AuxdataInstaller {
    pub fn new(source: AuxdataSource, target_dir: PathBuf) -> Self {
        Self {
            source,
            target_dir,
            pattern: None,
            overwrite: false,
        }
    }

    /// Installer targeting the default directory for this crate version
    pub fn for_current_version(source: AuxdataSource) -> Self {
        Self::new(source, default_auxdata_dir(AUXDATA_VERSION))
    }

    /// Only install files whose relative path matches `pattern`
    pub fn with_pattern(mut self, pattern: &str) -> ReflResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ReflError::Config(format!("Invalid auxdata pattern '{}': {}", pattern, e)))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn source(&self) -> &AuxdataSource {
        &self.source
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Install the auxiliary data unless `state` says it is already done.
    ///
    /// Failures are logged and leave `state` untouched so a later call retries.
    pub fn ensure_installed(&self, state: &InstallState) -> ReflResult<InstallReport> {
        let mut installed = state.lock();
        if *installed {
            log::debug!("Auxiliary data already installed in {}", self.target_dir.display());
            return Ok(InstallReport {
                target_dir: self.target_dir.clone(),
                already_installed: true,
                ..Default::default()
            });
        }

        log::info!("Installing auxiliary data from {} into {}", self.source, self.target_dir.display());
        match self.install() {
            Ok(report) => {
                *installed = true;
                log::info!(
                    "Auxiliary data installed: {} copied, {} already present",
                    report.copied.len(),
                    report.skipped.len()
                );
                Ok(report)
            }
            Err(e) => {
                log::error!(
                    "Failed to install auxiliary data into {}: {}",
                    self.target_dir.display(),
                    e
                );
                Err(ReflError::Install(format!("{} -> {}: {}", self.source, self.target_dir.display(), e)))
            }
        }
    }

    fn install(&self) -> ReflResult<InstallReport> {
        fs::create_dir_all(&self.target_dir)?;

        let mut report = InstallReport {
            target_dir: self.target_dir.clone(),
            ..Default::default()
        };

        match &self.source {
            AuxdataSource::Directory(dir) => self.install_from_directory(dir, &mut report)?,
            AuxdataSource::Archive(path) => self.install_from_archive(path, &mut report)?,
        }

        Ok(report)
    }

    fn matches(&self, relative: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(relative))
    }

    /// Destination for a relative path, or None when it should be skipped
    fn destination(&self, relative: &str, report: &mut InstallReport) -> Option<PathBuf> {
        if !self.matches(relative) {
            return None;
        }
        let dest = self.target_dir.join(relative);
        if dest.exists() && !self.overwrite {
            log::debug!("Keeping existing {}", dest.display());
            report.skipped.push(relative.to_string());
            return None;
        }
        Some(dest)
    }

    fn install_from_directory(&self, dir: &Path, report: &mut InstallReport) -> ReflResult<()> {
        if !dir.is_dir() {
            return Err(ReflError::ResourceMissing(format!(
                "Auxdata source directory {} does not exist",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        for file in files {
            let relative = match file.strip_prefix(dir) {
                Ok(relative) => to_slash_path(relative),
                Err(_) => continue,
            };
            if let Some(dest) = self.destination(&relative, report) {
                let mut input = File::open(&file)?;
                write_atomically(&dest, |out| std::io::copy(&mut input, out))?;
                log::debug!("Installed {}", relative);
                report.copied.push(relative);
            }
        }
        Ok(())
    }

    fn install_from_archive(&self, path: &Path, report: &mut InstallReport) -> ReflResult<()> {
        let file = File::open(path).map_err(|e| {
            ReflError::ResourceMissing(format!("Cannot open auxdata archive {}: {}", path.display(), e))
        })?;
        let mut archive = ZipArchive::new(file)?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let relative = match entry.enclosed_name() {
                Some(name) => to_slash_path(name),
                None => {
                    log::warn!("Skipping archive entry with unsafe path: {}", entry.name());
                    continue;
                }
            };

            if let Some(dest) = self.destination(&relative, report) {
                write_atomically(&dest, |out| std::io::copy(&mut entry, out))?;
                log::debug!("Installed {} from archive", relative);
                report.copied.push(relative);
            }
        }
        Ok(())
    }
}

/// Recursively gather regular files below `dir`
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> ReflResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write through a temp file in the destination directory, then rename
fn write_atomically<F>(dest: &Path, fill: F) -> ReflResult<()>
where
    F: FnOnce(&mut File) -> std::io::Result<u64>,
{
    let parent = dest.parent().ok_or_else(|| {
        ReflError::Install(format!("Destination {} has no parent directory", dest.display()))
    })?;
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    fill(temp.as_file_mut())?;
    temp.persist(dest).map_err(|e| ReflError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slash_path() {
        let path = Path::new("tables").join("thuillier_2002.bin");
        assert_eq!(to_slash_path(&path), "tables/thuillier_2002.bin");
    }

    #[test]
    fn test_default_dir_is_versioned() {
        let dir = default_auxdata_dir("1.2.3");
        assert!(dir.ends_with("surfrefl/auxdata/1.2.3"));
    }

    #[test]
    fn test_bad_pattern() {
        let installer = AuxdataInstaller::new(
            AuxdataSource::Directory(PathBuf::from("/nonexistent")),
            PathBuf::from("/tmp/unused"),
        );
        assert!(matches!(installer.with_pattern("(unclosed"), Err(ReflError::Config(_))));
    }

    #[test]
    fn test_missing_source_keeps_state_retryable() {
        let target = TempDir::new().unwrap();
        let installer = AuxdataInstaller::new(
            AuxdataSource::Directory(target.path().join("does_not_exist")),
            target.path().join("installed"),
        );
        let state = InstallState::new();

        assert!(matches!(installer.ensure_installed(&state), Err(ReflError::Install(_))));
        assert!(!state.is_installed());
    }
}
