use std::mem;

use crate::models::{Turn, UNKNOWN_SPEAKER};

/// Longest speaker label accepted, keeps prose with colons from being read as a label
pub const MAX_SPEAKER_LABEL_CHARS: usize = 40;

/// Parser state between lines
#[derive(Debug)]
enum ParserState {
    /// No speaker label seen yet; text goes to the unknown speaker
    NoSpeaker { buffer: Vec<String> },
    /// Inside a labelled turn
    InTurn { speaker: String, buffer: Vec<String> },
}

/// Line-oriented transcript parser producing speaker-attributed turns
#[derive(Debug)]
pub struct TurnParser {
    state: ParserState,
    turns: Vec<Turn>,
}

impl Default for TurnParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::NoSpeaker { buffer: Vec::new() },
            turns: Vec::new(),
        }
    }

    /// Feed one raw line; blank lines are ignored
    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match split_speaker_label(line) {
            Some((speaker, rest)) => {
                self.flush();
                let mut buffer = Vec::new();
                if !rest.is_empty() {
                    buffer.push(rest.to_string());
                }
                self.state = ParserState::InTurn {
                    speaker: speaker.to_string(),
                    buffer,
                };
            }
            None => match &mut self.state {
                ParserState::NoSpeaker { buffer } | ParserState::InTurn { buffer, .. } => {
                    buffer.push(line.to_string())
                }
            },
        }
    }

    /// Flush the buffered turn and return all turns in order
    pub fn finish(mut self) -> Vec<Turn> {
        self.flush();
        self.turns
    }

    fn flush(&mut self) {
        let (speaker, buffer) = match &mut self.state {
            ParserState::NoSpeaker { buffer } => (UNKNOWN_SPEAKER, buffer),
            ParserState::InTurn { speaker, buffer } => (speaker.as_str(), buffer),
        };
        if buffer.is_empty() {
            return;
        }
        let text = mem::take(buffer).join(" ");
        self.turns.push(Turn::new(speaker, text));
    }
}

/// Parse a raw transcript into ordered turns
pub fn parse_turns(transcript: &str) -> Vec<Turn> {
    let mut parser = TurnParser::new();
    for line in transcript.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Split `Speaker: text` into its parts when the prefix is a plausible label
///
/// A label is 1-40 chars of ASCII letters, digits, spaces, `_` or `-`,
/// followed by the first colon on the line.
fn split_speaker_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let label = &line[..colon];
    let label_chars = label.chars().count();
    if label_chars == 0 || label_chars > MAX_SPEAKER_LABEL_CHARS {
        return None;
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-')
    {
        return None;
    }
    let speaker = label.trim_end();
    if speaker.is_empty() {
        return None;
    }
    Some((speaker, line[colon + 1..].trim_start()))
}
