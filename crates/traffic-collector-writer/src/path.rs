//! Object key and file name generation.
//!
//! Both are derived from the UTC time of the flush call, never from the time
//! the batch started filling.

use chrono::{DateTime, Utc};

/// Object key `[prefix/]<YYYYMMDD>/<HHMMSS>.json`.
pub fn object_key(prefix: Option<&str>, at: DateTime<Utc>) -> String {
    let date = at.format("%Y%m%d");
    let time = at.format("%H%M%S");
    match prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}/{}.json", prefix, date, time),
        None => format!("{}/{}.json", date, time),
    }
}

/// Local file name `<prefix>_<HHMMSS>.json`.
pub fn file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", prefix, at.format("%H%M%S"))
}
