//! Chat-path counters over the `metrics` facade
//!
//! The core only records; installing a recorder/exporter is up to the
//! embedding application.

use ::metrics::counter;

/// Messages emitted on the relay by this client
pub const MESSAGES_SENT: &str = "jobline_messages_sent_total";

/// Messages received from the relay and appended to a log
pub const MESSAGES_RECEIVED: &str = "jobline_messages_received_total";

/// Inbound events dropped because they targeted a non-active room
pub const STALE_ROOM_DROPS: &str = "jobline_stale_room_drops_total";

/// History fetches that failed and degraded to an empty log
pub const HISTORY_FALLBACKS: &str = "jobline_history_fallbacks_total";

/// Relay connections established (initial connect and reconnects)
pub const RELAY_CONNECTS: &str = "jobline_relay_connects_total";

pub fn record_message_sent() {
    counter!(MESSAGES_SENT).increment(1);
}

pub fn record_message_received() {
    counter!(MESSAGES_RECEIVED).increment(1);
}

pub fn record_stale_room_drop() {
    counter!(STALE_ROOM_DROPS).increment(1);
}

pub fn record_history_fallback() {
    counter!(HISTORY_FALLBACKS).increment(1);
}

pub fn record_relay_connect() {
    counter!(RELAY_CONNECTS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record_without_recorder() {
        // The facade is a no-op without an installed recorder; these must not
        // panic in that configuration.
        record_message_sent();
        record_message_received();
        record_stale_room_drop();
        record_history_fallback();
        record_relay_connect();
    }
}
