use chrono::{DateTime, FixedOffset};
use lazy_regex::regex;

pub(crate) fn get_now() -> DateTime<FixedOffset> {
    let now = chrono::offset::Local::now();
    now.with_timezone(now.offset())
}

/// Collapses whitespace runs into a single space and trims.
pub fn clean_text(text: &str) -> String {
    regex!(r"\s+").replace_all(text, " ").trim().to_string()
}

/// `"ETA:"` -> `"ETA"`
pub fn strip_label_colon(text: &str) -> String {
    clean_text(text).trim_end_matches(':').trim_end().to_string()
}
