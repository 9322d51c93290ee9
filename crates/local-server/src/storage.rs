//! Blocking helpers over the on-disk library layout.
//!
//! A manga is either a directory holding `index.json` next to its chapter
//! folders, or a single `.cbz` archive with `index.json` at its root and one
//! entry prefix per chapter.

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use tempfile::NamedTempFile;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    error::{LocalError, LocalResult},
    model::{LocalManga, MangaChapter, MangaIndex},
};

pub const INDEX_FILE: &str = "index.json";
const ARCHIVE_EXTENSIONS: [&str; 2] = ["cbz", "zip"];

pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn scan_library(root: &Path) -> LocalResult<Vec<LocalManga>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        let index = if path.is_dir() {
            if !path.join(INDEX_FILE).is_file() {
                continue;
            }
            read_dir_index(&path)
        } else if is_archive_path(&path) {
            read_archive_index(&path)
        } else {
            continue;
        };

        match index {
            Ok(index) => result.push(LocalManga::new(index.into_manga(), path)),
            Err(err) => tracing::warn!("[Storage] Skipping {}: {err}", path.display()),
        }
    }

    result.sort_by(|a, b| a.manga.title.cmp(&b.manga.title));
    Ok(result)
}

pub fn read_index(path: &Path) -> LocalResult<MangaIndex> {
    if path.is_dir() {
        read_dir_index(path)
    } else {
        read_archive_index(path)
    }
}

fn read_dir_index(dir: &Path) -> LocalResult<MangaIndex> {
    let index_path = dir.join(INDEX_FILE);
    let file = File::open(&index_path)?;
    serde_json::from_reader(io::BufReader::new(file)).map_err(|source| LocalError::Index {
        path: index_path.display().to_string(),
        source,
    })
}

fn read_archive_index(path: &Path) -> LocalResult<MangaIndex> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let entry = archive.by_name(INDEX_FILE)?;
    serde_json::from_reader(entry).map_err(|source| LocalError::Index {
        path: format!("{}!/{INDEX_FILE}", path.display()),
        source,
    })
}

/// Removes the given chapters from a stored manga and rewrites its index.
/// Returns the number of chapters dropped from the index.
pub fn delete_chapters(path: &Path, ids: &BTreeSet<i64>) -> LocalResult<usize> {
    let mut index = read_index(path)?;
    let removed: Vec<MangaChapter> = index
        .chapters
        .iter()
        .filter(|chapter| ids.contains(&chapter.id))
        .cloned()
        .collect();

    if removed.is_empty() {
        tracing::info!("[Storage] Nothing to delete in {}", path.display());
        return Ok(0);
    }

    if !path.is_dir() {
        index.chapters.retain(|chapter| !ids.contains(&chapter.id));
        rewrite_archive(path, &removed, &index)?;
        return Ok(removed.len());
    }

    let mut deleted = BTreeSet::new();
    let mut failure = None;
    for chapter in &removed {
        if let Err(err) = delete_chapter_files(path, chapter) {
            failure = Some(err);
            break;
        }
        deleted.insert(chapter.id);
    }

    // Only what is really gone leaves the index, even when a later chapter failed
    if !deleted.is_empty() {
        index.chapters.retain(|chapter| !deleted.contains(&chapter.id));
        write_dir_index(path, &index)?;
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(deleted.len()),
    }
}

fn delete_chapter_files(dir: &Path, chapter: &MangaChapter) -> io::Result<()> {
    let Some(target) = chapter_path(dir, &chapter.url) else {
        tracing::warn!(
            "[Storage] Refusing to delete chapter {} outside of {}",
            chapter.id,
            dir.display()
        );
        return Ok(());
    };

    let result = if target.is_dir() {
        fs::remove_dir_all(&target)
    } else {
        fs::remove_file(&target)
    };

    match result {
        Ok(()) => {
            tracing::info!("[Storage] Deleted {}", target.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("[Storage] Already gone: {}", target.display());
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn chapter_path(dir: &Path, url: &str) -> Option<PathBuf> {
    let relative = Path::new(url.trim_matches('/'));
    let is_plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    (is_plain && !url.trim_matches('/').is_empty()).then(|| dir.join(relative))
}

/// Writes `target` through a temp file in the same directory. The temp file
/// is removed if `write` or the final rename fails.
fn replace_file(
    target: &Path,
    write: impl FnOnce(&mut File) -> LocalResult<()>,
) -> LocalResult<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}

fn write_dir_index(dir: &Path, index: &MangaIndex) -> LocalResult<()> {
    let index_path = dir.join(INDEX_FILE);
    let bytes = serde_json::to_vec_pretty(index).map_err(|source| LocalError::Index {
        path: index_path.display().to_string(),
        source,
    })?;

    replace_file(&index_path, |file| Ok(file.write_all(&bytes)?))
}

fn belongs_to(entry_name: &str, chapter: &MangaChapter) -> bool {
    let prefix = chapter.url.trim_matches('/');
    !prefix.is_empty()
        && (entry_name == prefix
            || entry_name
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/')))
}

fn rewrite_archive(path: &Path, removed: &[MangaChapter], index: &MangaIndex) -> LocalResult<()> {
    let bytes = serde_json::to_vec_pretty(index).map_err(|source| LocalError::Index {
        path: format!("{}!/{INDEX_FILE}", path.display()),
        source,
    })?;

    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut dropped = 0usize;

    replace_file(path, |file| {
        let mut writer = ZipWriter::new(file);
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();
            if name == INDEX_FILE {
                continue;
            }
            if removed.iter().any(|chapter| belongs_to(&name, chapter)) {
                dropped += 1;
                continue;
            }
            writer.raw_copy_file(entry)?;
        }

        writer.start_file(INDEX_FILE, SimpleFileOptions::default())?;
        writer.write_all(&bytes)?;
        writer.finish()?;
        Ok(())
    })?;

    tracing::info!(
        "[Storage] Rewrote {} without {dropped} entries",
        path.display()
    );
    Ok(())
}
