use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Weekday};

use crate::ValidationError;

/// Calendar date format used in the price cache, forecast keys and logs.
pub const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

pub fn parse_date(value: &str) -> Result<Date, ValidationError> {
    Date::parse(value.trim(), ISO_DATE).map_err(|_| ValidationError::InvalidDate {
        value: value.to_owned(),
    })
}

pub fn format_date(date: Date) -> String {
    // The format only contains numeric components, which always render.
    date.format(ISO_DATE)
        .unwrap_or_else(|_| format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

pub fn is_business_day(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// The `count` weekdays strictly after `date`, ascending. No holiday calendar.
///
/// Stops early at the last representable date, so the result may be shorter
/// than `count`.
pub fn business_days_after(date: Date, count: usize) -> Vec<Date> {
    let mut days = Vec::new();
    let mut cursor = date;
    while days.len() < count {
        let Some(next) = cursor.next_day() else {
            break;
        };
        cursor = next;
        if is_business_day(cursor) {
            days.push(cursor);
        }
    }
    days
}
