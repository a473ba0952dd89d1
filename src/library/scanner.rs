use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audio::bridge::FILE_EXTENSIONS;

/// Scanner for finding module files in a directory tree
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all module file paths
    pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>, anyhow::Error> {
        let mut module_files = Vec::new();

        for entry in WalkDir::new(directory)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            if Self::is_supported(path) {
                module_files.push(path.to_path_buf());
            }
        }

        Ok(module_files)
    }

    /// Whether the decoder understands this file's extension
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| FILE_EXTENSIONS.contains(&ext.as_str()))
    }
}
