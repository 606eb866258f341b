//! Date parsing for the `first_published` column.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use publisher_shared::{PublisherError, Result};

/// Date-only layouts accepted, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%d-%b-%Y", // 11-Jan-2011
    "%d-%B-%Y", // 11-January-2011
    "%d/%m/%Y", // 11/01/2011
    "%Y-%m-%d", // 2011-01-11
    "%d %B %Y", // 11 January 2011
    "%d %b %Y", // 11 Jan 2011
];

/// Parse a first-published value. Date-only values are midnight UTC.
pub fn parse_first_published(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.and_time(NaiveTime::default()).and_utc())
        .ok_or_else(|| PublisherError::parse(format!("unrecognised first_published date '{text}'")))
}
