//! Voice Query Responder
//!
//! Takes a transcribed utterance, checks for the wake word, classifies
//! it against the phrase tables and answers with a full spoken sentence
//! through the event bus. Audio capture and playback live outside the
//! daemon; this module stops at the text boundary.
//!
//! Every handled utterance produces the same bus choreography:
//! `processing` status, one `response`, `idle` status. Unrecognized
//! queries and empty stores get apologetic sentences rather than
//! silence so the user always hears something.

use airmon_core::{classify, Clock, Command, Window};
use chrono::{DateTime, Utc};

use crate::bus::{BusEvent, StatusKind};
use crate::monitor::{Monitor, MonitorError};

/// Name the assistant answers to
pub const WAKE_WORD: &str = "puff";

const NO_DATA: &str = "I don't have any sensor readings yet.";
const UNRECOGNIZED: &str =
    "Sorry, I didn't understand that. You can ask about current readings, highest levels, or spikes.";
const QUERY_FAILED: &str = "Sorry, I couldn't look that up right now.";

/// Wake-word gate and query responder
pub struct Assistant<'a, C: Clock> {
    monitor: &'a Monitor<C>,
}

impl<'a, C: Clock> Assistant<'a, C> {
    /// Attach to a monitor
    pub fn new(monitor: &'a Monitor<C>) -> Self {
        Self { monitor }
    }

    /// Whether an utterance addresses the assistant
    pub fn mentions_wake_word(text: &str) -> bool {
        text.to_lowercase().contains(WAKE_WORD)
    }

    /// Handle one utterance end to end
    ///
    /// Returns the spoken sentence, or `None` when the wake word is
    /// absent and the utterance is ignored entirely.
    pub fn handle(&self, utterance: &str) -> Option<String> {
        if !Self::mentions_wake_word(utterance) {
            return None;
        }
        log::info!("handling voice query: {utterance:?}");
        self.monitor
            .publish(&BusEvent::status(StatusKind::Processing));

        let sentence = match self.answer(utterance) {
            Ok(sentence) => sentence,
            Err(e) => {
                log::error!("voice query failed: {e}");
                QUERY_FAILED.to_string()
            }
        };

        self.monitor.publish(&BusEvent::response(sentence.clone()));
        self.monitor.publish(&BusEvent::status(StatusKind::Idle));
        Some(sentence)
    }

    fn answer(&self, utterance: &str) -> Result<String, MonitorError> {
        let command = match classify(utterance) {
            Some(command) => command,
            None => return Ok(UNRECOGNIZED.to_string()),
        };
        match command {
            Command::Current => self.current_sentence(),
            Command::Highest => self.highest_sentence(),
            Command::LastSpike => self.spike_sentence(),
        }
    }

    fn current_sentence(&self) -> Result<String, MonitorError> {
        Ok(match self.monitor.current_reading()? {
            Some(sample) => format!(
                "Current PM2.5 level is {:.1} and PM10 is {:.1} micrograms per cubic meter.",
                sample.pm25, sample.pm10
            ),
            None => NO_DATA.to_string(),
        })
    }

    fn highest_sentence(&self) -> Result<String, MonitorError> {
        Ok(match self.monitor.highest(Window::Day)? {
            Some(highest) => format!(
                "Today's highest PM2.5 reading was {:.1} at {}, and highest PM10 was {:.1} at {}.",
                highest.pm25.value,
                spoken_time(highest.pm25.timestamp),
                highest.pm10.value,
                spoken_time(highest.pm10.timestamp),
            ),
            None => NO_DATA.to_string(),
        })
    }

    fn spike_sentence(&self) -> Result<String, MonitorError> {
        Ok(match self.monitor.last_spike(Window::Day, None)? {
            Some(spike) => format!(
                "I detected a spike in PM2.5 levels at {}, reaching {:.1} from a baseline of {:.1}.",
                spoken_time(spike.timestamp),
                spike.value,
                spike.baseline,
            ),
            None => "I haven't detected any spikes in the last 24 hours.".to_string(),
        })
    }
}

fn spoken_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
