//! Lipa-na-M-PESA request credentials.
//!
//! Every STK push carries a timestamp and a password derived from it, so the
//! two must always be generated together from the same instant.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

/// Format an instant as the gateway's `YYYYMMDDHHMMSS` timestamp.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// base64(shortcode ++ passkey ++ timestamp)
pub fn generate_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", short_code, passkey, timestamp))
}
