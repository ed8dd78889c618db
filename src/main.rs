mod announce;
mod config;
mod dictionary;
mod engine;
mod event;
mod plover;
mod session;
mod store;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing_subscriber::EnvFilter;

use announce::{Announcer, LogAnnouncer, SharedStats, WpmReporter};
use config::Config;
use engine::line_buffer::MonospaceWidth;
use event::{AppEvent, EventHandler};
use plover::LogTail;
use session::lesson::LessonState;
use store::lesson_files::LessonFiles;

#[derive(Parser)]
#[command(
    name = "stenodrill",
    version,
    about = "Steno typing tutor with adaptive word scheduling"
)]
struct Cli {
    #[arg(short, long, help = "Lesson name (base name of the .les/.chd files)")]
    lesson: Option<String>,

    #[arg(long, help = "Path to Plover's log file")]
    log_file: Option<PathBuf>,

    #[arg(long, help = "Directory containing lesson files")]
    lessons_dir: Option<PathBuf>,

    #[arg(long, help = "Show one word at a time")]
    single_word: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().unwrap_or_default();
    if let Some(lesson) = cli.lesson {
        config.lesson_name = lesson;
    }
    if let Some(path) = cli.log_file {
        config.log_file_path = path.display().to_string();
    }
    if let Some(dir) = cli.lessons_dir {
        config.lessons_dir = dir.display().to_string();
    }
    if cli.single_word {
        config.single_word_buffer = true;
    }
    config.validate();

    let files = LessonFiles::new(&config);
    let dictionary = files.load_dictionary();
    let blacklist = files.load_blacklist();

    // The selector needs two eligible words at all times; refuse to start
    // a lesson that cannot provide them.
    let eligible = dictionary
        .words()
        .iter()
        .filter(|word| !blacklist.contains(&word.text))
        .count();
    if eligible < 2 {
        bail!(
            "lesson '{}' has {eligible} practicable word(s); at least two are needed",
            config.lesson_name
        );
    }

    let log_path = if config.log_file_path.is_empty() {
        plover::default_log_path()
    } else {
        PathBuf::from(&config.log_file_path)
    };
    let log = LogTail::open(&log_path)?;

    let announcer: Arc<dyn Announcer> = Arc::new(LogAnnouncer);
    let shared = Arc::new(SharedStats::default());
    if config.wpm_reporting_period_secs > 0 {
        WpmReporter::spawn(
            Duration::from_secs(config.wpm_reporting_period_secs),
            Arc::clone(&shared),
            Arc::clone(&announcer),
        );
    }

    let mut lesson = LessonState::new(
        &config,
        dictionary,
        blacklist,
        Box::new(files.blacklist_store()),
        announcer,
        shared,
        Box::new(MonospaceWidth),
        SmallRng::from_entropy(),
    )?;

    enable_raw_mode()?;
    let events = EventHandler::new(Duration::from_millis(100), log);
    let result = run(&mut lesson, &events);
    disable_raw_mode()?;
    result
}

fn run(lesson: &mut LessonState, events: &EventHandler) -> Result<()> {
    print_target(lesson);
    loop {
        match events.next()? {
            AppEvent::Word(word) => {
                if lesson.on_event(&word, Instant::now())? {
                    print_line(&format!("typed {}", word.stroke));
                    print_target(lesson);
                }
            }
            AppEvent::Key(key) => {
                if handle_key(lesson, key)? {
                    return Ok(());
                }
            }
            AppEvent::Tick => {}
        }
    }
}

/// Returns true when the user asked to quit.
fn handle_key(lesson: &mut LessonState, key: KeyEvent) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return Ok(true),
        KeyCode::Char('c') if ctrl => return Ok(true),
        KeyCode::Tab => {
            lesson.toggle_pause(Instant::now());
            let state = if lesson.is_paused() { "paused" } else { "resumed" };
            print_line(&format!("-- {state} --"));
        }
        KeyCode::Char('b') if ctrl => {
            lesson.blacklist_current(Instant::now())?;
            print_target(lesson);
        }
        KeyCode::Char('f') if ctrl => {
            lesson.force_advance(Instant::now())?;
            print_target(lesson);
        }
        _ => {}
    }
    Ok(false)
}

fn print_target(lesson: &LessonState) {
    let now = Instant::now();
    let line = lesson
        .line()
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let text = lesson.word_text(index);
            if position == lesson.highlighted_position() {
                format!("[{text}]")
            } else {
                text.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    print_line(&line);

    if !lesson.look_ahead().is_empty() {
        let next = lesson
            .look_ahead()
            .iter()
            .map(|&index| lesson.word_text(index))
            .collect::<Vec<_>>()
            .join(" ");
        print_line(&format!("  next: {next}"));
    }

    let worst = lesson
        .worst_word()
        .map(|(text, wpm)| format!("  worst {text} ({wpm:.0})"))
        .unwrap_or_default();
    print_line(&format!(
        "chord {}  wpm {:.0}  level {}  words {}  typed {}{worst}",
        lesson.current_stroke(),
        lesson.session_wpm(now),
        lesson.current_level(),
        lesson.active_word_count(),
        lesson.typed_words(),
    ));
}

// Raw mode needs explicit carriage returns.
fn print_line(text: &str) {
    print!("{text}\r\n");
    io::stdout().flush().ok();
}
