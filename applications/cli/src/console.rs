//! Interactive trial commands typed at the prompt

use blindtest_core::Slot;
use std::fmt;

/// One line of listener input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play a slot from the start
    Play(Slot),
    /// Pause or resume
    Toggle,
    /// Stop playback
    Stop,
    /// Jump to a position in milliseconds
    Seek(u32),
    /// Print the position
    Time,
    /// Submit the slot judged higher quality
    Answer { slot: Slot, memo: String },
    /// Show the command list
    Help,
    /// Leave without answering
    Quit,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type h for help)", self.0)
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
Commands:
  1 | 2           play slot 1 or 2 from the start
  p               pause / resume
  s               stop
  seek <ms>       jump to a position
  t               show position
  a <1|2> [memo]  answer: which slot sounds better
  h               this help
  q               quit without answering";

fn parse_slot(word: &str) -> Result<Slot, ParseError> {
    match word {
        "1" => Ok(Slot::First),
        "2" => Ok(Slot::Second),
        other => Err(ParseError(format!("slot must be 1 or 2, got '{}'", other))),
    }
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "1" | "2" if rest.is_empty() => parse_slot(word).map(Command::Play),
        "p" | "pause" => Ok(Command::Toggle),
        "s" | "stop" => Ok(Command::Stop),
        "t" | "time" => Ok(Command::Time),
        "h" | "help" | "?" => Ok(Command::Help),
        "q" | "quit" => Ok(Command::Quit),
        "seek" => rest
            .parse()
            .map(Command::Seek)
            .map_err(|_| ParseError(format!("seek needs a position in ms, got '{}'", rest))),
        "a" | "answer" => {
            let (slot, memo) = match rest.split_once(char::is_whitespace) {
                Some((slot, memo)) => (slot, memo.trim()),
                None => (rest, ""),
            };
            Ok(Command::Answer {
                slot: parse_slot(slot)?,
                memo: memo.to_string(),
            })
        }
        "" => Err(ParseError("empty command".to_string())),
        other => Err(ParseError(format!("unknown command '{}'", other))),
    }
}
