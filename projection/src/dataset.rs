use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;
use readers::{has_extension, ScanLayout, ScanResult, LABEL_EXTENSIONS, SCAN_EXTENSIONS};

use crate::scan::{open_scan, open_scan_with_labels, Scan};

/// Directory below the dataset root that holds the `.label` files in the separate layout
pub const LABEL_DIRECTORY: &str = "labels";

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Scans hold their labels in a fifth column
    pub combined: bool,
    /// Only read points, even if labels are available
    pub ignore_labels: bool,
}

/// One scan file and, in the separate layout, its label file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub scan: PathBuf,
    pub labels: Option<PathBuf>,
}

/// Sorted list of all scans of a dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    entries: Vec<ScanEntry>,
    options: DatasetOptions,
}

/// Returns all files below `dir` with one of the given extensions, sorted by path
fn collect_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Directory {} does not exist", dir.display());
    }

    let all_files = walkdir::WalkDir::new(dir).into_iter().map(
        |entry| -> Result<Option<PathBuf>> {
            let entry = entry?;
            if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                Ok(Some(entry.path().to_owned()))
            } else {
                Ok(None)
            }
        },
    );
    let mut files = all_files
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

impl Dataset {
    /// Finds all scans in `<root>/<scan_directory>` and, for labeled datasets in the separate layout, pairs them
    /// with the files in `<root>/labels` by sorted order
    pub fn discover<P: AsRef<Path>>(
        root: P,
        scan_directory: &str,
        options: DatasetOptions,
    ) -> Result<Self> {
        let root = root.as_ref();
        let scan_files = collect_files(&root.join(scan_directory), SCAN_EXTENSIONS)
            .context("Failed to collect scan files")?;

        let entries = if options.combined || options.ignore_labels {
            scan_files
                .into_iter()
                .map(|scan| ScanEntry { scan, labels: None })
                .collect::<Vec<_>>()
        } else {
            let label_files = collect_files(&root.join(LABEL_DIRECTORY), LABEL_EXTENSIONS)
                .context("Failed to collect label files")?;
            if label_files.len() != scan_files.len() {
                bail!(
                    "Found {} scan files but {} label files",
                    scan_files.len(),
                    label_files.len()
                );
            }
            scan_files
                .into_iter()
                .zip(label_files.into_iter())
                .map(|(scan, labels)| ScanEntry {
                    scan,
                    labels: Some(labels),
                })
                .collect()
        };

        info!(
            "Found {} scans in {}",
            entries.len(),
            root.join(scan_directory).display()
        );
        Ok(Self { entries, options })
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn layout(&self) -> ScanLayout {
        if self.options.combined {
            ScanLayout::Combined
        } else {
            ScanLayout::Separate
        }
    }

    /// Reads the scan at `index`. Panics if `index` is out of bounds
    pub fn open(&self, index: usize) -> ScanResult<Scan> {
        let entry = &self.entries[index];
        let scan = match entry.labels {
            Some(ref labels) => open_scan_with_labels(&entry.scan, labels)?,
            None => open_scan(&entry.scan, self.layout())?,
        };
        if self.options.ignore_labels {
            Ok(scan.into_plain())
        } else {
            Ok(scan)
        }
    }
}
