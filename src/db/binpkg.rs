// src/db/binpkg.rs

//! Binary package archives
//!
//! A built package is a `.tar.xz` of its destdir. Besides the installed
//! tree, the archive root may carry `generated-depends` and
//! `generated-provides` files produced by the package stage.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

fn open_archive(path: &Path) -> Result<Archive<XzDecoder<File>>> {
    let file = File::open(path).map_err(|e| {
        Error::ArchiveError(format!("Failed to open {}: {}", path.display(), e))
    })?;
    Ok(Archive::new(XzDecoder::new(file)))
}

/// Archive member path without any leading `./` or `/`
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Read one member of a binary package as text
///
/// Returns `Ok(None)` if the archive has no such member; anything else that
/// goes wrong (unreadable archive, corrupt stream) is an error.
pub fn read_member(archive_path: &Path, member: &str) -> Result<Option<String>> {
    let wanted = normalize(Path::new(member));
    let mut archive = open_archive(archive_path)?;

    let entries = archive.entries().map_err(|e| {
        Error::ArchiveError(format!(
            "Failed to read entries of {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            Error::ArchiveError(format!(
                "Failed to read entry of {}: {}",
                archive_path.display(),
                e
            ))
        })?;

        let entry_path = entry
            .path()
            .map_err(|e| Error::ArchiveError(format!("Bad entry path: {}", e)))?
            .into_owned();
        if normalize(&entry_path) != wanted {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(|e| {
            Error::ArchiveError(format!(
                "Failed to read {} from {}: {}",
                member,
                archive_path.display(),
                e
            ))
        })?;
        debug!("Read {} from {}", member, archive_path.display());
        return Ok(Some(content));
    }

    Ok(None)
}

/// One entry of a binary package manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Path relative to the archive root, without a leading `./`
    pub path: PathBuf,
    pub is_dir: bool,
}

/// List every member of a binary package
pub fn list_members(archive_path: &Path) -> Result<Vec<Member>> {
    let mut archive = open_archive(archive_path)?;
    let mut members = Vec::new();

    let entries = archive.entries().map_err(|e| {
        Error::ArchiveError(format!(
            "Failed to read entries of {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    for entry in entries {
        let entry = entry
            .map_err(|e| Error::ArchiveError(format!("Failed to read entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| Error::ArchiveError(format!("Bad entry path: {}", e)))?;

        let normalized = normalize(&path);
        if !normalized.as_os_str().is_empty() {
            members.push(Member {
                path: normalized,
                is_dir: entry.header().entry_type().is_dir(),
            });
        }
    }

    Ok(members)
}

/// Unpack a binary package into `dest`, keeping permissions
pub fn unpack(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut archive = open_archive(archive_path)?;
    archive.set_preserve_permissions(true);
    archive.unpack(dest).map_err(|e| {
        Error::ArchiveError(format!(
            "Failed to unpack {} into {}: {}",
            archive_path.display(),
            dest.display(),
            e
        ))
    })
}

/// Split a generated-dependency file into atoms, one per non-blank line
pub fn parse_generated(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
