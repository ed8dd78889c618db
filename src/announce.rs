use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use tracing::info;

/// Best-effort, fire-and-forget notifications. Callers never wait on an
/// announcement and nothing is owed at shutdown. Speech synthesis is out of
/// scope; any backend implementing this trait can be dropped in.
pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);

    fn announce_level(&self, level: u32) {
        self.announce(&format!("Level {level}"));
    }
}

/// Announcer that writes to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) {
        info!(target: "announce", "{text}");
    }
}

/// The one piece of lesson state shared with background tasks. Written by
/// the event-processing path, read by the periodic reporter; one interval
/// of staleness is fine.
#[derive(Debug, Default)]
pub struct SharedStats {
    wpm: AtomicU32,
    paused: AtomicBool,
    started: AtomicBool,
}

impl SharedStats {
    pub fn set_wpm(&self, wpm: f64) {
        self.wpm.store(wpm.max(0.0) as u32, Ordering::Relaxed);
    }

    pub fn wpm(&self) -> u32 {
        self.wpm.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_started(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

/// Periodic aggregate-WPM announcer running on its own detached thread.
pub struct WpmReporter;

impl WpmReporter {
    /// Announces the running WPM every `period` while a lesson is running
    /// and not paused. The thread dies with the process; there is no
    /// cleanup to do.
    pub fn spawn(period: Duration, shared: Arc<SharedStats>, announcer: Arc<dyn Announcer>) {
        thread::spawn(move || {
            loop {
                thread::sleep(period);
                if shared.is_started() && !shared.is_paused() {
                    announcer.announce(&format!("{} words per minute.", shared.wpm()));
                }
            }
        });
    }
}
