// JSON manifest describing an image: options plus entries in declaration
// order. Links must come after their targets, as in the tree API.

use super::entry_tree::EntryMeta;
use super::image::Fat16Image;
use chrono::{DateTime, Utc};
use log::debug;
use mkfat_core::{FileSource, ImageOptions, MkfatError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestEntryType {
    Directory,
    File,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub entry_type: ManifestEntryType,
    pub path: String,
    /// Host file with the content, relative to the manifest's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Inline content, as an alternative to `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub archive: bool,
}

impl ManifestEntry {
    fn meta(&self) -> EntryMeta {
        EntryMeta {
            mtime: self.mtime,
            read_only: self.read_only,
            hidden: self.hidden,
            system: self.system,
            archive: self.archive,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub options: ImageOptions,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self, MkfatError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MkfatError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Declare every entry on a new image. Relative `source` paths resolve
    /// against `base_dir`.
    pub fn into_image(self, base_dir: &Path) -> Result<Fat16Image, MkfatError> {
        let mut image = Fat16Image::new(self.options);
        let tree = image.tree_mut();

        for entry in &self.entries {
            let meta = entry.meta();
            match entry.entry_type {
                ManifestEntryType::Directory => {
                    tree.add_directory_with(&entry.path, meta)?;
                }
                ManifestEntryType::File => match (&entry.source, &entry.contents) {
                    (Some(source), None) => {
                        let host_path = base_dir.join(source);
                        debug!("{} <- {}", entry.path, host_path.display());
                        tree.add_file_with(&entry.path, FileSource::new(host_path), meta)?;
                    }
                    (None, contents) => {
                        let contents = contents.clone().unwrap_or_default();
                        tree.add_file_with(&entry.path, contents, meta)?;
                    }
                    (Some(_), Some(_)) => {
                        return Err(MkfatError::Configuration(format!(
                            "{}: 'source' and 'contents' are mutually exclusive",
                            entry.path
                        )));
                    }
                },
                ManifestEntryType::Link => {
                    let target = entry.target.as_deref().ok_or_else(|| {
                        MkfatError::Configuration(format!("{}: link without 'target'", entry.path))
                    })?;
                    tree.add_link_with(&entry.path, target, meta)?;
                }
            }
        }

        Ok(image)
    }
}
