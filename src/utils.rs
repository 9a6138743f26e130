//! Utility functions for the lobby coordinator

use chrono::{DateTime, Utc};
use rand::Rng;

/// Characters used in lobby codes; omits 0/O and 1/I so codes read aloud cleanly
const LOBBY_ID_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a random lobby code of the given length
pub fn generate_lobby_id(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..LOBBY_ID_CHARS.len());
            LOBBY_ID_CHARS[idx] as char
        })
        .collect()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
