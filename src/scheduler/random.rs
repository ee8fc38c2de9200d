//! Clock-driven pseudo-random scheduling.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::scheduler::{BackendSet, Scheduler};

/// Picks `backends[now_nanos mod N]`.
///
/// Spreads load evenly enough across backends; not suitable where
/// unpredictability matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl Scheduler for Random {
    fn select<'a>(&self, _client_key: &str, backends: &'a BackendSet) -> &'a str {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        // Reduce in u128 so the pick is exactly nanos mod N.
        backends.pick((nanos % backends.len() as u128) as u64)
    }
}
