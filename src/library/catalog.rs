// Search catalog
// The list of module paths handed to the search worker on load

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::library::scanner::DirectoryScanner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Path relative to the catalog root, `/`-separated.
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a sorted catalog of every module under `root`.
    pub fn from_directory(root: &Path) -> Result<Self> {
        let files = DirectoryScanner::scan(root)
            .with_context(|| format!("Failed to scan {:?}", root))?;

        let mut entries = files
            .iter()
            .filter_map(|path| path.strip_prefix(root).ok())
            .map(|relative| CatalogEntry {
                file: relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.file.cmp(&b.file));

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON text carried by the worker's `load` message.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse catalog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_directory_sorted_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("MOD/Purple Motion")).unwrap();
        fs::create_dir_all(dir.path().join("IT")).unwrap();
        fs::write(dir.path().join("MOD/Purple Motion/2ND_PM.S3M"), b"x").unwrap();
        fs::write(dir.path().join("IT/beyond.it"), b"x").unwrap();
        fs::write(dir.path().join("IT/notes.txt"), b"x").unwrap();

        let catalog = Catalog::from_directory(dir.path()).unwrap();
        let files: Vec<_> = catalog.entries.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["IT/beyond.it", "MOD/Purple Motion/2ND_PM.S3M"]);
    }

    #[test]
    fn test_json_is_plain_array() {
        let catalog = Catalog {
            entries: vec![CatalogEntry { file: "XM/a.xm".to_string() }],
        };
        let json = catalog.to_json().unwrap();
        assert_eq!(json, r#"[{"file":"XM/a.xm"}]"#);
        assert_eq!(Catalog::from_json(&json).unwrap(), catalog);
    }
}
