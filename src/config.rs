use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_lesson_name")]
    pub lesson_name: String,
    #[serde(default = "default_start_base_words")]
    pub start_base_words: usize,
    #[serde(default = "default_increment_words")]
    pub increment_words: usize,
    #[serde(default = "default_min_level_up_word_wpm")]
    pub min_level_up_word_wpm: u32,
    #[serde(default = "default_min_level_up_total_wpm")]
    pub min_level_up_total_wpm: u32,
    #[serde(default = "default_word_avg_samples")]
    pub word_avg_samples: usize,
    #[serde(default = "default_word_start_avg_wpm")]
    pub word_start_avg_wpm: u32,
    #[serde(default = "default_single_word_buffer")]
    pub single_word_buffer: bool,
    #[serde(default = "default_word_dictation_enabled")]
    pub word_dictation_enabled: bool,
    #[serde(default = "default_announce_levels")]
    pub announce_levels: bool,
    #[serde(default = "default_wpm_reporting_period_secs")]
    pub wpm_reporting_period_secs: u64,
    #[serde(default = "default_line_buffer_width")]
    pub line_buffer_width: f32,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
    #[serde(default = "default_lessons_dir")]
    pub lessons_dir: String,
}

fn default_lesson_name() -> String {
    "common_words".to_string()
}
fn default_start_base_words() -> usize {
    5
}
fn default_increment_words() -> usize {
    5
}
fn default_min_level_up_word_wpm() -> u32 {
    30
}
fn default_min_level_up_total_wpm() -> u32 {
    20
}
fn default_word_avg_samples() -> usize {
    10
}
fn default_word_start_avg_wpm() -> u32 {
    20
}
fn default_single_word_buffer() -> bool {
    false
}
fn default_word_dictation_enabled() -> bool {
    false
}
fn default_announce_levels() -> bool {
    true
}
fn default_wpm_reporting_period_secs() -> u64 {
    60
}
fn default_line_buffer_width() -> f32 {
    38.0
}
fn default_log_file_path() -> String {
    // Empty means auto-discover the Plover log for this platform.
    String::new()
}
fn default_lessons_dir() -> String {
    // Empty means the platform data dir.
    String::new()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lesson_name: default_lesson_name(),
            start_base_words: default_start_base_words(),
            increment_words: default_increment_words(),
            min_level_up_word_wpm: default_min_level_up_word_wpm(),
            min_level_up_total_wpm: default_min_level_up_total_wpm(),
            word_avg_samples: default_word_avg_samples(),
            word_start_avg_wpm: default_word_start_avg_wpm(),
            single_word_buffer: default_single_word_buffer(),
            word_dictation_enabled: default_word_dictation_enabled(),
            announce_levels: default_announce_levels(),
            wpm_reporting_period_secs: default_wpm_reporting_period_secs(),
            line_buffer_width: default_line_buffer_width(),
            log_file_path: default_log_file_path(),
            lessons_dir: default_lessons_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stenodrill")
            .join("config.toml")
    }

    /// Clamp values a hand-edited config could break. Call after
    /// deserialization and CLI overrides.
    pub fn validate(&mut self) {
        self.start_base_words = self.start_base_words.max(2);
        self.increment_words = self.increment_words.max(1);
        self.word_avg_samples = self.word_avg_samples.max(1);
        self.word_start_avg_wpm = self.word_start_avg_wpm.max(1);
        self.line_buffer_width = self.line_buffer_width.max(8.0);
    }
}
