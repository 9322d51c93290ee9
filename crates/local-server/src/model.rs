use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,

    /// `None` when the manga was passed around without its chapter list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<MangaChapter>>,
}

impl Manga {
    pub fn without_chapters(&self) -> Self {
        Self {
            chapters: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaChapter {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub number: f32,

    /// Path of the chapter's files, relative to the manga's storage
    pub url: String,
}

/// A manga together with the place it is stored in the library.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalManga {
    pub manga: Manga,
    pub path: PathBuf,
}

impl LocalManga {
    pub fn new(manga: Manga, path: PathBuf) -> Self {
        Self { manga, path }
    }

    pub fn is_archive(&self) -> bool {
        self.path.is_file()
    }
}

/// On-disk `index.json` of a stored manga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaIndex {
    pub manga: Manga,
    #[serde(default)]
    pub chapters: Vec<MangaChapter>,
}

impl MangaIndex {
    pub fn into_manga(self) -> Manga {
        Manga {
            chapters: Some(self.chapters),
            ..self.manga
        }
    }
}
