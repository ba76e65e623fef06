//! Test fixture files.
//!
//! Fixtures live under a root directory (`fixtures/files` by default):
//!
//! ```text
//! valid/sample-aktr-report.pdf
//! valid/*.pdf
//! malicious/fake-pdf.exe
//! malicious/script-injection.pdf
//! ```
//!
//! A missing fixture skips the scenario that needs it rather than failing it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// Locates fixture files below a root directory.
#[derive(Debug, Clone)]
pub struct Fixtures {
    root: PathBuf,
}

impl Fixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative` under the root, skipping when it does not exist.
    pub fn require(&self, relative: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::skipped(format!("Fixture not found: {}", path.display())))
        }
    }

    pub fn sample_aktr(&self) -> Result<PathBuf> {
        self.require("valid/sample-aktr-report.pdf")
    }

    pub fn malicious_exe(&self) -> Result<PathBuf> {
        self.require("malicious/fake-pdf.exe")
    }

    pub fn script_injection(&self) -> Result<PathBuf> {
        self.require("malicious/script-injection.pdf")
    }

    /// All PDFs in `valid/`, sorted by name. Skips when there are none.
    pub fn valid_pdfs(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join("valid");
        let entries = std::fs::read_dir(&dir)
            .map_err(|_| Error::skipped(format!("Fixture directory not found: {}", dir.display())))?;

        let mut pdfs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        pdfs.sort();

        if pdfs.is_empty() {
            return Err(Error::skipped(format!("No PDF fixtures in {}", dir.display())));
        }
        Ok(pdfs)
    }
}

/// A generated file that is deleted when dropped.
#[derive(Debug)]
pub struct TempFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl TempFixture {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes a zero-filled `large_test.pdf` of `bytes` bytes into a temp dir.
pub fn oversized_file(bytes: u64) -> Result<TempFixture> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("large_test.pdf");

    let mut writer = BufWriter::new(File::create(&path)?);
    let chunk = vec![b'0'; 1024 * 1024];
    let mut remaining = bytes;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        writer.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    writer.flush()?;

    Ok(TempFixture { _dir: dir, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fixture_is_skip() {
        let fixtures = Fixtures::new("/nonexistent/fixtures");
        assert!(fixtures.sample_aktr().unwrap_err().is_skip());
        assert!(fixtures.valid_pdfs().unwrap_err().is_skip());
    }

    #[test]
    fn test_present_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("valid")).unwrap();
        std::fs::create_dir_all(dir.path().join("malicious")).unwrap();
        std::fs::write(dir.path().join("valid/sample-aktr-report.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("valid/b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("valid/notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("malicious/fake-pdf.exe"), b"MZ").unwrap();

        let fixtures = Fixtures::new(dir.path());
        assert!(fixtures.sample_aktr().is_ok());
        assert!(fixtures.malicious_exe().is_ok());
        assert!(fixtures.script_injection().is_err());

        let pdfs = fixtures.valid_pdfs().unwrap();
        assert_eq!(pdfs.len(), 2);
        assert!(pdfs[0].ends_with("b.pdf"));
    }

    #[test]
    fn test_oversized_file() {
        let fixture = oversized_file(3 * 1024 * 1024 + 5).unwrap();
        let len = std::fs::metadata(fixture.path()).unwrap().len();
        assert_eq!(len, 3 * 1024 * 1024 + 5);
        assert!(fixture.path().ends_with("large_test.pdf"));

        let path = fixture.path().to_path_buf();
        drop(fixture);
        assert!(!path.exists());
    }
}
