use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// One translation Plover emitted: the text it typed (with Plover's
/// leading space), the chord(s) that produced it, and whether it was an
/// undo (`*` marker) that retracted text instead of adding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordEvent {
    pub text: String,
    pub stroke: String,
    pub is_delete: bool,
}

/// Where Plover keeps its log when no override is configured.
pub fn default_log_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        home.join("AppData")
            .join("Local")
            .join("plover")
            .join("plover")
            .join("plover.log")
    } else {
        home.join(".config").join("plover").join("plover.log")
    }
}

/// Incremental reader over Plover's continuously-appended log. Opens at
/// the end of the file so history is never replayed; "nothing new" is the
/// common, non-error result.
pub struct LogTail {
    reader: BufReader<File>,
    partial: String,
}

impl LogTail {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("cannot open Plover log at {}", path.display()))?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader: BufReader::new(file),
            partial: String::new(),
        })
    }

    /// Next complete appended line, or None when nothing new has landed.
    /// A line still being written (no newline yet) is buffered until the
    /// rest arrives.
    fn next_line(&mut self) -> Option<String> {
        loop {
            let mut chunk = Vec::new();
            match self.reader.read_until(b'\n', &mut chunk) {
                Ok(0) => return None,
                Ok(_) => {
                    self.partial.push_str(&String::from_utf8_lossy(&chunk));
                    if self.partial.ends_with('\n') {
                        let line = self
                            .partial
                            .trim_end_matches(['\n', '\r'])
                            .to_string();
                        self.partial.clear();
                        return Some(line);
                    }
                }
                Err(err) => {
                    debug!("error reading Plover log: {err}");
                    return None;
                }
            }
        }
    }

    /// Next translation event, skipping over unrelated log lines.
    pub fn next_event(&mut self) -> Option<WordEvent> {
        while let Some(line) = self.next_line() {
            match parse_translation_line(&line) {
                Some(event) => return Some(event),
                None => debug!("skipping log line: {line}"),
            }
        }
        None
    }
}

// Column where "Translation" sits after the timestamp; the undo variant is
// prefixed with '*' and lands one column later.
const TRANSLATION_COLUMN: usize = 24;

/// Parses one Plover log line of the form
/// `2013-05-22 21:49:21,923 Translation(('TKO',) : do)` into a
/// [`WordEvent`]. Multi-stroke chords (`('HROG', 'TPAOEUL')`) are joined
/// with `/`. Anything that doesn't parse yields `None` and is dropped by
/// the caller — the engine never sees partial events.
pub fn parse_translation_line(line: &str) -> Option<WordEvent> {
    let translation = line.find("Translation")?;
    let (multi, separator) = match line.find(",) : ") {
        Some(position) => (false, position + 1),
        None => (true, line.find(" : ")?),
    };
    let is_delete = translation != TRANSLATION_COLUMN;

    let stroke_start = translation + 14;
    let stroke_end = separator.checked_sub(2)?;
    let strokes = line.get(stroke_start..stroke_end)?;
    let stroke = strokes.split("', '").collect::<Vec<_>>().join("/");

    let text_start = separator + if multi { 2 } else { 3 };
    let text = line.get(text_start..line.len().checked_sub(1)?)?;

    Some(WordEvent {
        text: text.to_string(),
        stroke,
        is_delete,
    })
}
