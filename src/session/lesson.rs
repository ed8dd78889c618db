use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use tracing::{info, warn};

use crate::announce::{Announcer, SharedStats};
use crate::config::Config;
use crate::dictionary::{Blacklist, Dictionary};
use crate::engine::line_buffer::{LineBuffer, TextWidth};
use crate::engine::word_pool::{PoolError, WordPool};
use crate::engine::word_stats::WordStats;
use crate::plover::WordEvent;
use crate::store::BlacklistStore;

/// The live lesson: per-word stats, unlock progression, the target line,
/// and all timing.
///
/// Mutated from one synchronous event-processing path. Every time-dependent
/// method takes `now` explicitly; the binary passes `Instant::now()`.
pub struct LessonState {
    config: Config,
    dictionary: Dictionary,
    blacklist: Blacklist,
    stats: Vec<WordStats>,
    buffer: LineBuffer,
    rng: SmallRng,
    measure: Box<dyn TextWidth>,
    store: Box<dyn BlacklistStore>,
    announcer: Arc<dyn Announcer>,
    shared: Arc<SharedStats>,

    start_base_words: usize,
    unlocked_words: usize,
    current_level: u32,
    current_word: usize,
    typed_words: u32,
    input_buffer: String,
    is_started: bool,
    is_paused: bool,
    lesson_start: Option<Instant>,
    last_typed: Option<Instant>,
    pause_start: Option<Instant>,
    worst_word: Option<(usize, f64)>,
}

impl LessonState {
    pub fn new(
        config: &Config,
        dictionary: Dictionary,
        blacklist: Blacklist,
        store: Box<dyn BlacklistStore>,
        announcer: Arc<dyn Announcer>,
        shared: Arc<SharedStats>,
        measure: Box<dyn TextWidth>,
        rng: SmallRng,
    ) -> Result<Self, PoolError> {
        let start_base_words =
            adjusted_start_base(config.start_base_words, &dictionary, &blacklist);
        let stats = vec![
            WordStats::new(config.word_start_avg_wpm, config.word_avg_samples);
            dictionary.len()
        ];
        let buffer = LineBuffer::new(config.line_buffer_width, config.single_word_buffer);

        let mut lesson = Self {
            config: config.clone(),
            dictionary,
            blacklist,
            stats,
            buffer,
            rng,
            measure,
            store,
            announcer,
            shared,
            start_base_words,
            unlocked_words: 0,
            current_level: 0,
            current_word: 0,
            typed_words: 0,
            input_buffer: String::new(),
            is_started: false,
            is_paused: false,
            lesson_start: None,
            last_typed: None,
            pause_start: None,
            worst_word: None,
        };

        let pool = WordPool::new(
            &lesson.dictionary,
            &lesson.blacklist,
            &lesson.stats,
            lesson.start_base_words + lesson.unlocked_words,
        );
        lesson
            .buffer
            .fill_line(&pool, &mut lesson.rng, lesson.measure.as_ref(), 1, 0)?;
        lesson.current_word = lesson.buffer.highlighted_word();

        if lesson.config.word_dictation_enabled {
            lesson
                .announcer
                .announce(&lesson.dictionary.word(lesson.current_word).text);
        }
        Ok(lesson)
    }

    /// Feeds one translation event in. The first event of the session
    /// starts the clock. Returns true when the event completed the active
    /// word.
    pub fn on_event(&mut self, event: &WordEvent, now: Instant) -> Result<bool, PoolError> {
        if self.is_paused {
            return Ok(false);
        }
        if !self.is_started {
            self.start(now);
        }

        if event.is_delete {
            let keep = self
                .input_buffer
                .chars()
                .count()
                .saturating_sub(event.text.chars().count());
            self.input_buffer = self.input_buffer.chars().take(keep).collect();
        } else {
            self.input_buffer.push_str(&event.text);
        }

        if self.input_buffer.trim() == self.dictionary.word(self.current_word).text {
            self.complete_word(now)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skips the active word as if it had been typed. No-op before the
    /// lesson starts or while paused.
    pub fn force_advance(&mut self, now: Instant) -> Result<(), PoolError> {
        if !self.is_started || self.is_paused {
            return Ok(());
        }
        self.complete_word(now)
    }

    /// Removes the active word from the lesson: persists the grown
    /// blacklist, spends one unlock slot to keep the active pool size
    /// stable (skipping over any newly exposed words that are themselves
    /// blacklisted), and advances past the dead word.
    pub fn blacklist_current(&mut self, now: Instant) -> Result<(), PoolError> {
        if !self.is_started || self.is_paused {
            return Ok(());
        }
        let text = self.dictionary.word(self.current_word).text.clone();
        if self.blacklist.insert(&text) {
            if let Err(err) = self.store.save(&self.blacklist) {
                warn!("failed to persist blacklist: {err:#}");
            }
        }
        self.unlocked_words += 1;
        self.skip_blacklisted_at_boundary();

        self.buffer.go_to_list_end();
        self.complete_word(now)
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        if !self.is_started {
            return;
        }
        if self.is_paused {
            let paused_for = now.duration_since(self.pause_start.take().unwrap_or(now));
            if let Some(start) = self.lesson_start {
                self.lesson_start = Some(start + paused_for);
            }
            if let Some(last) = self.last_typed {
                self.last_typed = Some(last + paused_for);
            }
            self.is_paused = false;
            info!("lesson resumed");
        } else {
            self.pause_start = Some(now);
            self.is_paused = true;
            info!("lesson paused");
        }
        self.shared.set_paused(self.is_paused);
    }

    /// Time spent practicing, blind to pauses.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(start) = self.lesson_start else {
            return Duration::ZERO;
        };
        match (self.is_paused, self.pause_start) {
            (true, Some(pause)) => pause.duration_since(start),
            _ => now.duration_since(start),
        }
    }

    pub fn session_wpm(&self, now: Instant) -> f64 {
        if !self.is_started {
            return 0.0;
        }
        let minutes = self.elapsed(now).as_secs_f64() / 60.0;
        f64::from(self.typed_words) / minutes
    }

    /// Unlocks the next batch of words once the session WPM gate and every
    /// active word's own WPM gate are both met. Safe to re-run: without new
    /// completions the freshly unlocked words sit at the seed average,
    /// which the per-word gate rejects.
    pub fn check_level_up(&mut self, now: Instant) {
        if self.session_wpm(now) < f64::from(self.config.min_level_up_total_wpm) {
            return;
        }
        for i in 0..self.active_bound() {
            if self.blacklist.contains(&self.dictionary.word(i).text) {
                continue;
            }
            if self.stats[i].average_wpm() < f64::from(self.config.min_level_up_word_wpm) {
                return;
            }
        }
        self.level_up();
    }

    fn level_up(&mut self) {
        let mut total = self.start_base_words + self.unlocked_words;
        let mut i = total;
        self.unlocked_words += self.config.increment_words;
        // Already-blacklisted words in the newly exposed range don't count
        // against the increment.
        while total < self.start_base_words + self.unlocked_words && i < self.dictionary.len() {
            if self.blacklist.contains(self.dictionary.word(i).text.trim()) {
                self.unlocked_words += 1;
            }
            total += 1;
            i += 1;
        }
        self.current_level += 1;
        info!(
            level = self.current_level,
            active = self.active_word_count(),
            "level up"
        );
        if self.config.announce_levels {
            self.announcer.announce_level(self.current_level);
        }
    }

    fn start(&mut self, now: Instant) {
        self.is_started = true;
        self.lesson_start = Some(now);
        // Backdate the last-typed mark by one seed duration so the first
        // word isn't charged for pre-session idle time.
        let seed = Duration::from_millis(60_000 / u64::from(self.config.word_start_avg_wpm.max(1)));
        self.last_typed = Some(now.checked_sub(seed).unwrap_or(now));
        self.shared.set_started();
        info!(lesson = %self.config.lesson_name, "lesson started");
        if self.config.announce_levels {
            self.announcer.announce_level(0);
        }
    }

    fn complete_word(&mut self, now: Instant) -> Result<(), PoolError> {
        self.input_buffer.clear();
        if let Some(last) = self.last_typed {
            let duration = now.duration_since(last);
            self.stats[self.current_word].record_completion(duration.as_millis() as u64);
        }
        self.last_typed = Some(now);
        self.typed_words += 1;
        self.check_level_up(now);

        let pool = WordPool::new(
            &self.dictionary,
            &self.blacklist,
            &self.stats,
            self.start_base_words + self.unlocked_words,
        );
        self.current_word =
            self.buffer
                .advance(&pool, &mut self.rng, self.measure.as_ref(), self.current_word)?;

        self.update_worst_word();
        self.shared.set_wpm(self.session_wpm(now));
        if self.config.word_dictation_enabled {
            self.announcer
                .announce(&self.dictionary.word(self.current_word).text);
        }
        Ok(())
    }

    /// Spend extra unlock slots while the word at the unlock boundary is
    /// already blacklisted.
    fn skip_blacklisted_at_boundary(&mut self) {
        loop {
            let boundary = self.start_base_words + self.unlocked_words - 1;
            if boundary >= self.dictionary.len()
                || !self
                    .blacklist
                    .contains(&self.dictionary.word(boundary).text)
            {
                return;
            }
            self.unlocked_words += 1;
        }
    }

    fn update_worst_word(&mut self) {
        let mut worst: Option<(usize, f64)> = None;
        for i in 0..self.active_bound() {
            if self.blacklist.contains(&self.dictionary.word(i).text) {
                continue;
            }
            let wpm = self.stats[i].average_wpm();
            match worst {
                Some((_, current)) if wpm >= current => {}
                _ => worst = Some((i, wpm)),
            }
        }
        self.worst_word = worst;
    }

    fn active_bound(&self) -> usize {
        (self.start_base_words + self.unlocked_words).min(self.dictionary.len())
    }

    /// Unlocked words minus blacklisted ones — the pool the selector
    /// actually draws from.
    pub fn active_word_count(&self) -> usize {
        (0..self.active_bound())
            .filter(|&i| !self.blacklist.contains(&self.dictionary.word(i).text))
            .count()
    }

    #[allow(dead_code)] // Used through the library target
    pub fn current_word_index(&self) -> usize {
        self.current_word
    }

    #[allow(dead_code)] // Used through the library target
    pub fn current_word_text(&self) -> &str {
        &self.dictionary.word(self.current_word).text
    }

    pub fn current_stroke(&self) -> &str {
        &self.dictionary.word(self.current_word).stroke
    }

    pub fn word_text(&self, index: usize) -> &str {
        &self.dictionary.word(index).text
    }

    pub fn line(&self) -> &[usize] {
        self.buffer.line()
    }

    pub fn look_ahead(&self) -> &[usize] {
        self.buffer.look_ahead()
    }

    pub fn highlighted_position(&self) -> usize {
        self.buffer.highlighted_position()
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn typed_words(&self) -> u32 {
        self.typed_words
    }

    #[allow(dead_code)] // Used through the library target
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    #[allow(dead_code)] // Used through the library target
    pub fn word_wpm(&self, index: usize) -> f64 {
        self.stats[index].average_wpm()
    }

    pub fn worst_word(&self) -> Option<(&str, f64)> {
        self.worst_word
            .map(|(index, wpm)| (self.dictionary.word(index).text.as_str(), wpm))
    }

    #[allow(dead_code)] // Used through the library target
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }
}

/// Widen the starting window so it really holds `start_base_words`
/// non-blacklisted entries: every blacklisted word found inside the
/// (growing) window extends it by one.
fn adjusted_start_base(
    start_base_words: usize,
    dictionary: &Dictionary,
    blacklist: &Blacklist,
) -> usize {
    let mut base = start_base_words;
    let mut total = 0;
    let mut i = 0;
    while total < base && i < dictionary.len() {
        if blacklist.contains(dictionary.word(i).text.trim()) {
            base += 1;
        }
        total += 1;
        i += 1;
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Word;
    use crate::engine::line_buffer::MonospaceWidth;
    use anyhow::Result;
    use rand::SeedableRng;
    use std::sync::Mutex;

    struct RecordingStore {
        saved: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl BlacklistStore for RecordingStore {
        fn save(&self, blacklist: &Blacklist) -> Result<()> {
            self.saved.lock().unwrap().push(blacklist.words().to_vec());
            Ok(())
        }
    }

    struct RecordingAnnouncer {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    struct Harness {
        lesson: LessonState,
        saved: Arc<Mutex<Vec<Vec<String>>>>,
        announced: Arc<Mutex<Vec<String>>>,
        epoch: Instant,
    }

    fn word(text: &str) -> Word {
        Word {
            text: text.to_string(),
            stroke: format!("S-{}", text.to_uppercase()),
        }
    }

    fn harness_with(config: Config, words: &[&str], blacklisted: &[&str]) -> Harness {
        let dictionary = Dictionary::new(words.iter().map(|w| word(w)).collect());
        let blacklist = Blacklist::new(blacklisted.iter().map(|w| w.to_string()).collect());
        let saved = Arc::new(Mutex::new(Vec::new()));
        let announced = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::new(SharedStats::default());
        let lesson = LessonState::new(
            &config,
            dictionary,
            blacklist,
            Box::new(RecordingStore {
                saved: Arc::clone(&saved),
            }),
            Arc::new(RecordingAnnouncer {
                messages: Arc::clone(&announced),
            }),
            shared,
            Box::new(MonospaceWidth),
            SmallRng::seed_from_u64(11),
        )
        .unwrap();
        Harness {
            lesson,
            saved,
            announced,
            epoch: Instant::now(),
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.start_base_words = 3;
        config.increment_words = 2;
        config.word_avg_samples = 1;
        config.word_start_avg_wpm = 20;
        config.line_buffer_width = 20.0;
        config
    }

    impl Harness {
        fn at(&self, ms: u64) -> Instant {
            self.epoch + Duration::from_millis(ms)
        }

        /// Completes whatever word is active at the given time.
        fn type_active_word(&mut self, ms: u64) {
            let text = format!(" {}", self.lesson.current_word_text());
            let event = WordEvent {
                text,
                stroke: "T-".to_string(),
                is_delete: false,
            };
            let completed = self.lesson.on_event(&event, self.at(ms)).unwrap();
            assert!(completed, "event should have completed the active word");
        }
    }

    #[test]
    fn test_first_completion_uses_seed_duration() {
        // samples = 1, seed 20 WPM: the very first completion lands exactly
        // one seed interval (3000ms) after the backdated mark.
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        let first = h.lesson.current_word_index();
        h.type_active_word(0);
        assert_eq!(h.lesson.typed_words(), 1);
        assert!((h.lesson.word_wpm(first) - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_event_buffer_requires_full_match() {
        let mut h = harness_with(test_config(), &["alpha", "beta", "gamma", "delta"], &[]);
        let target = h.lesson.current_word_text().to_string();
        // A non-matching translation accumulates without completing.
        let wrong = WordEvent {
            text: " nope".to_string(),
            stroke: "TPH".to_string(),
            is_delete: false,
        };
        assert!(!h.lesson.on_event(&wrong, h.at(100)).unwrap());
        assert_eq!(h.lesson.typed_words(), 0);

        // Deleting it and typing the real word completes.
        let erase = WordEvent {
            text: " nope".to_string(),
            stroke: "*".to_string(),
            is_delete: true,
        };
        assert!(!h.lesson.on_event(&erase, h.at(200)).unwrap());
        let right = WordEvent {
            text: format!(" {target}"),
            stroke: "T-".to_string(),
            is_delete: false,
        };
        assert!(h.lesson.on_event(&right, h.at(300)).unwrap());
        assert_eq!(h.lesson.typed_words(), 1);
    }

    #[test]
    fn test_pause_shifts_the_timeline() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.type_active_word(0);
        let second = h.lesson.current_word_index();

        // Pause for 5s, resume, then finish the word 1s of real work later.
        h.lesson.toggle_pause(h.at(0));
        assert!(h.lesson.is_paused());
        h.lesson.toggle_pause(h.at(5000));
        assert!(!h.lesson.is_paused());
        h.type_active_word(6000);

        // Only the unpaused second counts: 60 WPM, not 10.
        assert!((h.lesson.word_wpm(second) - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_elapsed_is_blind_to_pause() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.type_active_word(0);
        h.lesson.toggle_pause(h.at(1000));
        // While paused, elapsed is frozen at the pause point.
        assert_eq!(h.lesson.elapsed(h.at(4000)), Duration::from_millis(1000));
        h.lesson.toggle_pause(h.at(6000));
        assert_eq!(h.lesson.elapsed(h.at(7000)), Duration::from_millis(2000));
    }

    #[test]
    fn test_events_ignored_while_paused() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.type_active_word(0);
        h.lesson.toggle_pause(h.at(100));
        let event = WordEvent {
            text: format!(" {}", h.lesson.current_word_text()),
            stroke: "T-".to_string(),
            is_delete: false,
        };
        assert!(!h.lesson.on_event(&event, h.at(200)).unwrap());
        assert_eq!(h.lesson.typed_words(), 1);
    }

    #[test]
    fn test_pause_before_start_is_a_noop() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.lesson.toggle_pause(h.at(0));
        assert!(!h.lesson.is_paused());
        assert!(!h.lesson.is_started());
    }

    #[test]
    fn test_level_up_unlocks_and_announces() {
        // Seed average (20) meets the per-word gate, so the first fast
        // completion levels up.
        let mut config = test_config();
        config.min_level_up_word_wpm = 15;
        config.min_level_up_total_wpm = 10;
        let mut h = harness_with(
            config,
            &["one", "two", "three", "four", "five", "six", "seven"],
            &[],
        );
        h.type_active_word(1000);
        assert_eq!(h.lesson.current_level(), 1);
        assert_eq!(h.lesson.active_word_count(), 5);
        let announced = h.announced.lock().unwrap();
        assert!(announced.contains(&"Level 0".to_string()));
        assert!(announced.contains(&"Level 1".to_string()));
    }

    #[test]
    fn test_level_up_gate_blocks_on_slow_word() {
        // One slow completion drags that word below the gate.
        let mut config = test_config();
        config.min_level_up_word_wpm = 30;
        config.min_level_up_total_wpm = 1;
        let mut h = harness_with(config, &["one", "two", "three", "four", "five"], &[]);
        h.type_active_word(0);
        // 4000ms = 15 WPM with a single-sample window: below the gate.
        h.type_active_word(4000);
        assert_eq!(h.lesson.current_level(), 0);
        assert_eq!(h.lesson.active_word_count(), 3);
    }

    #[test]
    fn test_check_level_up_is_idempotent_without_new_completions() {
        let mut config = test_config();
        config.min_level_up_word_wpm = 30;
        config.min_level_up_total_wpm = 10;
        config.word_avg_samples = 1;
        let mut h = harness_with(
            config,
            &["one", "two", "three", "four", "five", "six", "seven", "eight"],
            &[],
        );
        // Keep typing fast (500ms per word) until every active word has
        // cleared the 30 WPM gate and a level-up fires.
        for i in 1..=40u64 {
            h.type_active_word(i * 500);
            if h.lesson.current_level() > 0 {
                break;
            }
        }
        let level = h.lesson.current_level();
        assert!(level > 0, "setup should have reached level 1");
        let unlocked_before = h.lesson.active_word_count();

        // Newly unlocked words sit at the 20 WPM seed, below the gate.
        for _ in 0..5 {
            h.lesson.check_level_up(h.at(10_000));
        }
        assert_eq!(h.lesson.current_level(), level);
        assert_eq!(h.lesson.active_word_count(), unlocked_before);
    }

    #[test]
    fn test_blacklist_active_word_keeps_pool_size_and_persists() {
        let mut h = harness_with(test_config(), &["a", "b", "c", "d", "e"], &[]);
        h.type_active_word(500);

        let victim = h.lesson.current_word_text().to_string();
        h.lesson.blacklist_current(h.at(1000)).unwrap();

        // Pool still holds three practicable words.
        assert_eq!(h.lesson.active_word_count(), 3);
        assert!(h.lesson.blacklist().contains(&victim));
        // Persisted exactly once, with exactly the victim.
        let saved = h.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0], vec![victim.clone()]);
        // The dead word is no longer the active target.
        assert_ne!(h.lesson.current_word_text(), victim);
    }

    #[test]
    fn test_blacklist_skips_over_preblacklisted_neighbors() {
        // Blacklisting "c" exposes "d" — but "d" is already blacklisted, so
        // the shift keeps going to "e".
        let mut h = harness_with(test_config(), &["a", "b", "c", "d", "e", "f"], &["d"]);
        h.type_active_word(500);
        // Find and blacklist whatever is active; pool must stay at 3.
        h.lesson.blacklist_current(h.at(1000)).unwrap();
        assert_eq!(h.lesson.active_word_count(), 3);
    }

    #[test]
    fn test_start_base_adjustment_counts_blacklisted_entries() {
        let dictionary = Dictionary::new(
            ["a", "b", "c", "d", "e"].iter().map(|w| word(w)).collect(),
        );
        let blacklist = Blacklist::new(vec!["b".to_string()]);
        assert_eq!(adjusted_start_base(3, &dictionary, &blacklist), 4);

        // Two blacklisted words inside the growing window.
        let blacklist = Blacklist::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(adjusted_start_base(3, &dictionary, &blacklist), 5);

        let blacklist = Blacklist::default();
        assert_eq!(adjusted_start_base(3, &dictionary, &blacklist), 3);
    }

    #[test]
    fn test_worst_word_tracks_lowest_average() {
        let mut config = test_config();
        config.min_level_up_total_wpm = 500; // never level up
        let mut h = harness_with(config, &["one", "two", "three", "four"], &[]);
        h.type_active_word(0);
        let slow = h.lesson.current_word_index();
        // 6000ms = 10 WPM, far below everyone else's 20 WPM seed.
        h.type_active_word(6000);
        let (text, wpm) = h.lesson.worst_word().unwrap();
        assert_eq!(text, h.lesson.word_text(slow));
        assert!((wpm - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_force_advance_requires_running_lesson() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.lesson.force_advance(h.epoch).unwrap();
        assert_eq!(h.lesson.typed_words(), 0);
        assert!(!h.lesson.is_started());

        h.type_active_word(0);
        h.lesson.force_advance(h.at(500)).unwrap();
        assert_eq!(h.lesson.typed_words(), 2);
    }

    #[test]
    fn test_session_wpm_counts_typed_words_over_elapsed() {
        let mut h = harness_with(test_config(), &["one", "two", "three", "four"], &[]);
        h.type_active_word(0);
        h.type_active_word(1000);
        h.type_active_word(2000);
        // 3 words in 60s of elapsed time = 3 WPM.
        assert!((h.lesson.session_wpm(h.at(60_000)) - 3.0).abs() < 0.01);
    }
}
