//! Access to the game's and the server's content directories.
//!
//! The configuration core only needs to enumerate sub-directories and read or write
//! text files; [`ContentSource`] is that seam, with [`LocalContent`] as the real
//! filesystem implementation.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use walkdir::WalkDir;

/// Directory listing and text I/O over the filesystem (or a stand-in for tests).
#[cfg_attr(test, mockall::automock)]
pub trait ContentSource {
    /// Names of the sub-directories of `dir`, sorted. A missing or unreadable
    /// directory yields an empty list.
    fn list_dirs(&self, dir: &Utf8Path) -> Vec<String>;

    fn is_file(&self, path: &Utf8Path) -> bool;

    fn read_text(&self, path: &Utf8Path) -> Result<String>;

    /// Write `text` to `path`, creating parent directories as needed.
    fn write_text(&self, path: &Utf8Path, text: &str) -> Result<()>;
}

/// [`ContentSource`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalContent;

impl ContentSource for LocalContent {
    fn list_dirs(&self, dir: &Utf8Path) -> Vec<String> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Cannot list {}: {}", dir, e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    fn read_text(&self, path: &Utf8Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
    }

    fn write_text(&self, path: &Utf8Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent))?;
        }
        fs::write(path, text).with_context(|| format!("Failed to write {}", path))
    }
}

pub fn cars_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("content").join("cars")
}

pub fn tracks_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("content").join("tracks")
}

/// Car models installed in the game, sorted.
pub fn list_cars(source: &impl ContentSource, game_root: &Utf8Path) -> Vec<String> {
    source.list_dirs(&cars_dir(game_root))
}

/// Keep the cars whose name contains `filter`, ignoring case.
pub fn filter_cars<'a>(cars: &'a [String], filter: &str) -> Vec<&'a str> {
    let needle = filter.trim().to_lowercase();
    cars.iter()
        .map(String::as_str)
        .filter(|car| needle.is_empty() || car.to_lowercase().contains(&needle))
        .collect()
}

/// Skins available for `model` in the server's content tree, sorted.
pub fn list_skins(source: &impl ContentSource, server_root: &Utf8Path, model: &str) -> Vec<String> {
    source.list_dirs(&cars_dir(server_root).join(model).join("skins"))
}

/// How [`link_or_copy`] placed a content directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The destination already existed and was left untouched.
    AlreadyPresent,
    Linked,
    Copied,
}

/// Make `src` available at `dst`: a directory symlink where the platform allows it,
/// otherwise a recursive copy.
pub fn link_or_copy(src: &Utf8Path, dst: &Utf8Path) -> Result<LinkOutcome> {
    if dst.exists() || dst.is_symlink() {
        return Ok(LinkOutcome::AlreadyPresent);
    }
    if !src.is_dir() {
        anyhow::bail!("Content directory not found: {}", src);
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent))?;
    }

    match symlink_dir(src, dst) {
        Ok(()) => {
            tracing::debug!("Linked {} -> {}", dst, src);
            Ok(LinkOutcome::Linked)
        }
        Err(e) => {
            tracing::debug!("Symlink {} failed ({}), copying instead", dst, e);
            copy_tree(src, dst)?;
            Ok(LinkOutcome::Copied)
        }
    }
}

#[cfg(unix)]
fn symlink_dir(src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_dir(src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_src: &Utf8Path, _dst: &Utf8Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks not supported"))
}

/// Recursively copy the directory `src` to `dst`.
pub fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Unexpected path outside {}", src))?;
        let target = dst.as_std_path().join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_list_dirs_sorted_and_dirs_only() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        let cars = cars_dir(&root);
        for name in ["ks_mazda_mx5_cup", "abarth500", "ks_audi_r8"] {
            fs::create_dir_all(cars.join(name)).unwrap();
        }
        fs::write(cars.join("readme.txt"), "x").unwrap();

        assert_eq!(
            list_cars(&LocalContent, &root),
            vec!["abarth500", "ks_audi_r8", "ks_mazda_mx5_cup"]
        );
        assert!(LocalContent.list_dirs(&root.join("missing")).is_empty());
    }

    #[test]
    fn test_filter_cars_case_insensitive() {
        let cars = vec!["ks_Audi_R8".to_string(), "abarth500".to_string()];
        assert_eq!(filter_cars(&cars, "audi"), vec!["ks_Audi_R8"]);
        assert_eq!(filter_cars(&cars, "").len(), 2);
    }

    #[test]
    fn test_write_text_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = utf8_root(&temp).join("cfg").join("server_cfg.ini");
        LocalContent.write_text(&path, "[SERVER]\n").unwrap();
        assert!(LocalContent.is_file(&path));
        assert_eq!(LocalContent.read_text(&path).unwrap(), "[SERVER]\n");
    }

    #[test]
    fn test_link_or_copy_places_content_once() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        let src = root.join("game").join("abarth500");
        fs::create_dir_all(src.join("skins").join("red")).unwrap();
        fs::write(src.join("data.acd"), "bytes").unwrap();

        let dst = root.join("server").join("content").join("cars").join("abarth500");
        let outcome = link_or_copy(&src, &dst).unwrap();
        assert!(matches!(outcome, LinkOutcome::Linked | LinkOutcome::Copied));
        assert!(dst.join("data.acd").is_file());
        assert!(dst.join("skins").join("red").is_dir());

        assert_eq!(link_or_copy(&src, &dst).unwrap(), LinkOutcome::AlreadyPresent);
    }

    #[test]
    fn test_link_or_copy_missing_source() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        assert!(link_or_copy(&root.join("nope"), &root.join("dst")).is_err());
    }

    #[test]
    fn test_copy_tree() {
        let temp = TempDir::new().unwrap();
        let root = utf8_root(&temp);
        let src = root.join("src");
        fs::create_dir_all(src.join("ui").join("layout_gp")).unwrap();
        fs::write(src.join("ui").join("layout_gp").join("ui_track.json"), "{}").unwrap();

        copy_tree(&src, &root.join("dst")).unwrap();
        assert!(root.join("dst").join("ui").join("layout_gp").join("ui_track.json").is_file());
    }
}
