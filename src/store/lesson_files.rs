use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::dictionary::{Blacklist, Dictionary, Word};
use crate::store::BlacklistStore;

// Shipped fallback so a fresh install can practice without any lesson
// files on disk.
const DEFAULT_LESSON_NAME: &str = "common_words";
const DEFAULT_WORDS: &str = include_str!("../../assets/lessons/common_words.les");
const DEFAULT_STROKES: &str = include_str!("../../assets/lessons/common_words.chd");

/// Resolves and reads one lesson's flat files: `<name>.les` (words),
/// `<name>.chd` (chords) and `<name>.blk` (blacklist), all whitespace-
/// separated token streams. Missing files degrade to empty collections —
/// the caller decides whether the result is usable.
pub struct LessonFiles {
    lessons_dir: PathBuf,
    lesson_name: String,
}

impl LessonFiles {
    pub fn new(config: &Config) -> Self {
        let lessons_dir = if config.lessons_dir.is_empty() {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("stenodrill")
                .join("lessons")
        } else {
            PathBuf::from(&config.lessons_dir)
        };
        Self {
            lessons_dir,
            lesson_name: config.lesson_name.clone(),
        }
    }

    #[allow(dead_code)] // Used by integration tests
    pub fn with_dir(lessons_dir: PathBuf, lesson_name: &str) -> Self {
        Self {
            lessons_dir,
            lesson_name: lesson_name.to_string(),
        }
    }

    fn lesson_path(&self, extension: &str) -> PathBuf {
        self.lessons_dir
            .join(format!("{}.{extension}", self.lesson_name))
    }

    /// Words and chords are parallel lists paired by position.
    pub fn load_dictionary(&self) -> Dictionary {
        let words = self.read_tokens("les", DEFAULT_WORDS);
        let strokes = self.read_tokens("chd", DEFAULT_STROKES);
        if words.len() != strokes.len() {
            warn!(
                words = words.len(),
                strokes = strokes.len(),
                "word and chord lists differ in length; pairing up to the shorter"
            );
        }
        Dictionary::new(
            words
                .into_iter()
                .zip(strokes)
                .map(|(text, stroke)| Word { text, stroke })
                .collect(),
        )
    }

    pub fn load_blacklist(&self) -> Blacklist {
        let path = self.lesson_path("blk");
        match fs::read_to_string(&path) {
            Ok(content) => Blacklist::new(parse_tokens(&content)),
            Err(err) => {
                // Normal for a lesson nothing has been blacklisted in yet.
                info!("no blacklist at {}: {err}", path.display());
                Blacklist::default()
            }
        }
    }

    pub fn blacklist_store(&self) -> FileBlacklistStore {
        FileBlacklistStore {
            path: self.lesson_path("blk"),
        }
    }

    fn read_tokens(&self, extension: &str, embedded: &str) -> Vec<String> {
        let path = self.lesson_path(extension);
        match fs::read_to_string(&path) {
            Ok(content) => parse_tokens(&content),
            Err(err) => {
                if self.lesson_name == DEFAULT_LESSON_NAME {
                    info!(
                        "no {} on disk, using the built-in lesson: {err}",
                        path.display()
                    );
                    parse_tokens(embedded)
                } else {
                    warn!("cannot read {}: {err}", path.display());
                    Vec::new()
                }
            }
        }
    }
}

/// Splits a lesson file into tokens, skipping blank lines and `<...>`
/// comment/header lines.
fn parse_tokens(source: &str) -> Vec<String> {
    source
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('<'))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

/// Writes the blacklist as one space-separated line, atomically
/// (tmp file + rename), so an interrupted save never truncates it.
pub struct FileBlacklistStore {
    path: PathBuf,
}

impl BlacklistStore for FileBlacklistStore {
    fn save(&self, blacklist: &Blacklist) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("blk.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(blacklist.words().join(" ").as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
