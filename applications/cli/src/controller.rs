//! Trial controller - maps listener commands onto session and engine calls
//!
//! Engine and session errors are reported to the listener and the trial goes
//! on; only failures to write to the terminal end it.

use crate::console::{Command, HELP};
use crate::error::Result;
use blindtest_core::{BlindTestError, ResultRecord, Slot};
use blindtest_session::{PlaybackEngine, PlaybackState, ResultLog, TestSession};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Whether the trial continues after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

/// Drives one blind trial
pub struct Controller {
    session: TestSession,
    engine: PlaybackEngine,
    log_path: PathBuf,
    record: Option<ResultRecord>,
}

impl Controller {
    /// `session` must be materialized before slots can play
    pub fn new(session: TestSession, engine: PlaybackEngine, log_path: PathBuf) -> Self {
        Self {
            session,
            engine,
            log_path,
            record: None,
        }
    }

    /// Apply one command, writing feedback to `out`
    pub fn handle(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        match command {
            Command::Play(slot) => {
                self.engine.stop();
                match self.engine.start(&self.session, slot) {
                    Ok(()) => writeln!(out, "Playing slot {}", slot)?,
                    Err(e) => report(out, &e)?,
                }
            }
            Command::Toggle => match self.engine.toggle() {
                Ok(()) => match self.engine.state() {
                    PlaybackState::Paused => writeln!(out, "Paused")?,
                    PlaybackState::Running => writeln!(out, "Playing")?,
                    _ => writeln!(out, "Nothing is playing")?,
                },
                Err(e) => report(out, &e)?,
            },
            Command::Stop => {
                self.engine.stop();
                writeln!(out, "Stopped")?;
            }
            Command::Seek(position_ms) => {
                if self.engine.is_open() {
                    self.engine.seek(position_ms);
                    writeln!(out, "Seek to {}", format_ms(position_ms))?;
                } else {
                    writeln!(out, "Nothing is playing")?;
                }
            }
            Command::Time => match self.engine.time_info() {
                Some((current, total)) => {
                    writeln!(out, "{} / {}", format_ms(current), format_ms(total))?;
                }
                None => writeln!(out, "Not playing")?,
            },
            Command::Answer { slot, memo } => {
                self.engine.stop();
                return self.answer(slot, memo, out);
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => {
                self.engine.stop();
                writeln!(out, "Trial abandoned")?;
                return Ok(Flow::Finished);
            }
        }
        Ok(Flow::Continue)
    }

    fn answer(&mut self, slot: Slot, memo: String, out: &mut impl Write) -> Result<Flow> {
        let correct = match self.session.judge(slot.is_first()) {
            Ok(correct) => correct,
            Err(e) => {
                report(out, &e)?;
                return Ok(Flow::Continue);
            }
        };
        let record = self.session.result_record(slot, memo)?;

        writeln!(
            out,
            "{}: slot {} held {} {}, slot {} held {} {}",
            record.outcome(),
            record.better_slot,
            record.hq_factor,
            record.test_type.unit(),
            record.better_slot.other(),
            record.lq_factor,
            record.test_type.unit()
        )?;
        info!(
            "Answer for {}: chose slot {} ({})",
            record.filename,
            slot,
            if correct { "correct" } else { "incorrect" }
        );

        match ResultLog::append_to_file(&self.log_path, &record) {
            Ok(()) => writeln!(out, "Result saved to {}", self.log_path.display())?,
            Err(e) => {
                warn!("Could not save result: {}", e);
                writeln!(out, "Could not save result: {}", e)?;
            }
        }

        self.record = Some(record);
        Ok(Flow::Finished)
    }

    /// Print the position line while a slot is playing
    pub fn tick(&self, out: &mut impl Write) -> Result<()> {
        if let Some((current, total)) = self.engine.time_info() {
            writeln!(out, "  {} / {}", format_ms(current), format_ms(total))?;
        }
        Ok(())
    }

    /// Stop playback when the slot has played out
    pub fn reap_finished(&mut self, out: &mut impl Write) -> Result<()> {
        if self.engine.state() == PlaybackState::Stopped {
            self.engine.stop();
            writeln!(out, "Finished")?;
        }
        Ok(())
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// The record written by the listener's answer
    pub fn record(&self) -> Option<&ResultRecord> {
        self.record.as_ref()
    }
}

fn report(out: &mut impl Write, e: &BlindTestError) -> Result<()> {
    warn!("{}", e);
    writeln!(out, "Error: {}", e)?;
    Ok(())
}

/// `m:ss.mmm`
pub fn format_ms(ms: u32) -> String {
    format!("{}:{:02}.{:03}", ms / 60_000, (ms / 1_000) % 60, ms % 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_seconds_millis() {
        assert_eq!(format_ms(0), "0:00.000");
        assert_eq!(format_ms(61_250), "1:01.250");
        assert_eq!(format_ms(3_599_999), "59:59.999");
    }
}
