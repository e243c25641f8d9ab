//! Image source for the gallery.
//!
//! Resolves the configured manifest or directory into an ordered list of
//! [`GalleryEntry`] values, at most one page long. Entries without a usable
//! image are dropped here; entries whose image fails to decode are dropped
//! later by the loader.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::GallerySource;
use crate::events::GalleryEntry;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read gallery manifest {path}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse gallery manifest {path}")]
    ParseManifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("gallery directory {0} does not exist or is not a directory")]
    MissingDirectory(PathBuf),
}

/// List response in the shape the content service returns it.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    contents: Vec<ManifestItem>,
}

#[derive(Debug, Deserialize)]
struct ManifestItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    image: Option<ManifestImage>,
}

#[derive(Debug, Deserialize)]
struct ManifestImage {
    #[serde(default)]
    url: Option<String>,
}

#[instrument(skip_all, fields(page_size = page_size))]
pub fn discover(source: GallerySource<'_>, page_size: usize) -> Result<Vec<GalleryEntry>, SourceError> {
    let entries = match source {
        GallerySource::Manifest(path) => from_manifest(path, page_size)?,
        GallerySource::Directory(path) => from_directory(path, page_size)?,
    };
    info!(count = entries.len(), "gallery source resolved");
    Ok(entries)
}

fn from_manifest(path: &Path, page_size: usize) -> Result<Vec<GalleryEntry>, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SourceError::ReadManifest {
        path: path.to_path_buf(),
        source,
    })?;
    // YAML is a superset of JSON, so one parser covers both manifest flavours.
    let manifest: Manifest =
        serde_yaml::from_str(&raw).map_err(|source| SourceError::ParseManifest {
            path: path.to_path_buf(),
            source,
        })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let entries = manifest
        .contents
        .into_iter()
        .take(page_size)
        .enumerate()
        .filter_map(|(position, item)| {
            let id = item.id.unwrap_or_else(|| format!("item-{position}"));
            let Some(url) = item.image.and_then(|img| img.url) else {
                debug!(%id, "manifest entry has no image; skipping");
                return None;
            };
            match resolve_url(base, &url) {
                Some(path) => Some(GalleryEntry { id, path }),
                None => {
                    warn!(%id, %url, "unsupported image url; skipping");
                    None
                }
            }
        })
        .collect();
    Ok(entries)
}

/// Map a manifest URL to a local path. Remote URLs are not supported.
fn resolve_url(base: &Path, url: &str) -> Option<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let local = if let Some(rest) = url.strip_prefix("file://") {
        rest
    } else if url.contains("://") {
        return None;
    } else {
        url
    };
    let path = Path::new(local);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        Some(base.join(path))
    }
}

fn from_directory(root: &Path, page_size: usize) -> Result<Vec<GalleryEntry>, SourceError> {
    if !root.is_dir() {
        return Err(SourceError::MissingDirectory(root.to_path_buf()));
    }
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image(path))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .take(page_size)
        .map(|path| {
            let id = path
                .file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or_default()
                .to_string();
            GalleryEntry { id, path }
        })
        .collect())
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "gif", "webp"].contains(&e.as_str())
    )
}
