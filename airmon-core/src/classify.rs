//! Phrase Classification for Voice Queries
//!
//! Maps a free-text utterance onto one of the three supported queries
//! by case-insensitive substring match against fixed phrase tables.
//! First table wins on overlap; utterances matching nothing are
//! rejected so the assistant can say it did not understand rather than
//! guess.

/// A recognized spoken query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// "What is the air quality right now"
    Current,
    /// "What was the worst reading"
    Highest,
    /// "When did it last spike"
    LastSpike,
}

const CURRENT_PHRASES: &[&str] = &[
    "what's the current",
    "what is the current",
    "how's the air",
    "how is the air",
    "current reading",
    "current air quality",
];

const HIGHEST_PHRASES: &[&str] = &[
    "highest reading",
    "maximum level",
    "peak value",
    "worst reading",
    "highest level",
    "maximum reading",
];

const SPIKE_PHRASES: &[&str] = &[
    "when did it spike",
    "last spike",
    "recent spike",
    "when was the spike",
    "spike detection",
    "detect spike",
];

/// Classify an utterance, or `None` when no phrase matches
pub fn classify(text: &str) -> Option<Command> {
    let text = text.to_lowercase();
    let matches = |phrases: &[&str]| phrases.iter().any(|p| text.contains(p));
    if matches(CURRENT_PHRASES) {
        Some(Command::Current)
    } else if matches(HIGHEST_PHRASES) {
        Some(Command::Highest)
    } else if matches(SPIKE_PHRASES) {
        Some(Command::LastSpike)
    } else {
        None
    }
}
