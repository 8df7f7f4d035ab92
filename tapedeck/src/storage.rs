use crate::error::Result;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

pub const MAX_FILE_STEM_LENGTH: usize = 100;
pub const PLACEHOLDER_FILE_STEM: &str = "unnamed-session";

lazy_static! {
    static ref DISALLOWED_CHARACTERS: Regex = Regex::new(r"[^A-Za-z0-9\s\-_]").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref SEPARATOR_RUN: Regex = Regex::new(r"[-_]{2,}").unwrap();
}

/// Named-file key/value store holding one fixture per session.
pub trait FixtureStorage: Debug + Send + Sync {
    fn exists(&self, name: &str) -> bool;
    fn read(&self, name: &str) -> Result<String>;
    fn write(&self, name: &str, contents: &str) -> Result<()>;
}

/// Derives the fixture file name for a session, e.g. `"GET /posts (ok)"` becomes
/// `get-posts-ok.json`.
pub fn fixture_file_name(session_name: &str) -> String {
    let lower = session_name.to_lowercase();
    let replaced = DISALLOWED_CHARACTERS.replace_all(&lower, "_");
    let dashed = WHITESPACE_RUN.replace_all(&replaced, "-");
    // a run of separators keeps its first one
    let collapsed = SEPARATOR_RUN.replace_all(&dashed, |run: &Captures| run[0][..1].to_string());

    let stem: String = collapsed
        .trim_matches(|c: char| c == '-' || c == '_')
        .chars()
        .take(MAX_FILE_STEM_LENGTH)
        .collect();
    let stem = stem.trim_end_matches(|c: char| c == '-' || c == '_');

    if stem.is_empty() {
        format!("{}.json", PLACEHOLDER_FILE_STEM)
    } else {
        format!("{}.json", stem)
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl FixtureStorage for FileStorage {
    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn read(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path_for(name))?)
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(name), contents)?;

        Ok(())
    }
}

/// Keeps fixtures in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FixtureStorage for MemoryStorage {
    fn exists(&self, name: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(name))
            .unwrap_or(false)
    }

    fn read(&self, name: &str) -> Result<String> {
        self.files.lock()?.get(name).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("fixture {} doesn't exist", name),
            )
            .into()
        })
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        self.files
            .lock()?
            .insert(String::from(name), String::from(contents));

        Ok(())
    }
}
