use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};

use crate::plover::{LogTail, WordEvent};

pub enum AppEvent {
    Word(WordEvent),
    Key(KeyEvent),
    Tick,
}

/// Single background thread multiplexing Plover's log and keyboard
/// controls into one channel. Key polling doubles as the pacing for log
/// reads; a Tick is sent whenever a poll interval passes quietly.
pub struct EventHandler {
    rx: mpsc::Receiver<AppEvent>,
    _tx: mpsc::Sender<AppEvent>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration, mut log: LogTail) -> Self {
        let (tx, rx) = mpsc::channel();
        let _tx = tx.clone();

        thread::spawn(move || {
            loop {
                // Drain whatever Plover appended since the last pass.
                while let Some(word) = log.next_event() {
                    if tx.send(AppEvent::Word(word)).is_err() {
                        return;
                    }
                }
                if event::poll(tick_rate).unwrap_or(false) {
                    if let Ok(Event::Key(key)) = event::read()
                        && tx.send(AppEvent::Key(key)).is_err()
                    {
                        return;
                    }
                } else if tx.send(AppEvent::Tick).is_err() {
                    return;
                }
            }
        });

        Self { rx, _tx }
    }

    pub fn next(&self) -> anyhow::Result<AppEvent> {
        Ok(self.rx.recv()?)
    }
}
