use crate::{Highlight, Intent, UiState};
use chrono::{DateTime, Duration, Utc};

pub const TRANSIENT_HIGHLIGHT_WINDOW_MS: i64 = 3000;

/// Expiry intents for transient highlights older than the window. The
/// interactive loop feeds these back through [`crate::reduce`].
pub fn due_expiries(state: &UiState, now: DateTime<Utc>) -> Vec<Intent> {
    let window = Duration::milliseconds(TRANSIENT_HIGHLIGHT_WINDOW_MS);
    state
        .sessions
        .highlights
        .iter()
        .filter_map(|(session_id, highlight)| match highlight {
            Highlight::OutputTransient { since } if now - *since >= window => {
                Some(Intent::ExpireTransientHighlight {
                    session_id: session_id.clone(),
                })
            }
            _ => None,
        })
        .collect()
}

/// Earliest instant at which [`due_expiries`] will return something.
pub fn next_expiry(state: &UiState) -> Option<DateTime<Utc>> {
    let window = Duration::milliseconds(TRANSIENT_HIGHLIGHT_WINDOW_MS);
    state
        .sessions
        .highlights
        .values()
        .filter_map(|highlight| match highlight {
            Highlight::OutputTransient { since } => Some(*since + window),
            _ => None,
        })
        .min()
}
