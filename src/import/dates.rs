use chrono::{Datelike, Month, NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use super::error::DateError;

/// Caller-supplied date and time used when a record carries no date at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    pub year_now: String,
    pub month: &'static str,
    pub day: NaiveDate,
    pub time: NaiveTime,
}

impl ResolvedDate {
    pub fn from_fallback(fb: &Fallback) -> Self {
        ResolvedDate {
            year_now: fb.date.year().to_string(),
            month: month_name(fb.date.month()),
            day: fb.date,
            time: fb.time,
        }
    }

    pub fn day_string(&self) -> String {
        self.day.format("%Y-%m-%d").to_string()
    }

    pub fn time_string(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

pub fn resolve_dates(raw: &Map<String, Value>, fallback: &Fallback) -> Result<ResolvedDate, DateError> {
    let year_now = present(raw, "year_now");
    let month = present(raw, "month");
    let day = present(raw, "day");
    let creation_time = present(raw, "creation_time");

    let time = match creation_time {
        Some(v) => v
            .as_str()
            .map(str::trim)
            .and_then(parse_time)
            .ok_or_else(|| DateError::InvalidFormat {
                field: "creation_time".into(),
                value: display(v),
            })?,
        None => fallback.time,
    };

    // A time of day stands alone; year and month only make sense with a day.
    let Some(day_v) = day else {
        for (name, v) in [("year_now", year_now), ("month", month)] {
            if v.is_some() {
                return Err(DateError::PartialDate(name.to_string()));
            }
        }
        return Ok(ResolvedDate {
            time,
            ..ResolvedDate::from_fallback(fallback)
        });
    };

    let day_s = day_v.as_str().map(str::trim).unwrap_or_default();
    let day_date = parse_day(day_s).ok_or_else(|| DateError::InvalidFormat {
        field: "day".into(),
        value: display(day_v),
    })?;
    let day_label = day_date.format("%Y-%m-%d").to_string();

    let month_name_resolved = match month {
        Some(v) => {
            let name = v
                .as_str()
                .and_then(parse_month_name)
                .ok_or_else(|| DateError::InvalidMonth(display(v)))?;
            if name != month_name(day_date.month()) {
                return Err(DateError::Inconsistent {
                    field: "month".into(),
                    value: name.to_string(),
                    day: day_label,
                });
            }
            name
        }
        None => month_name(day_date.month()),
    };

    let year_text = match year_now {
        Some(v) => {
            let text = match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            // Free-form text is kept as is; only a plain year number is checked.
            if let Ok(y) = text.parse::<i32>() {
                if y != day_date.year() {
                    return Err(DateError::Inconsistent {
                        field: "year_now".into(),
                        value: text,
                        day: day_label,
                    });
                }
            }
            text
        }
        None => day_date.year().to_string(),
    };

    Ok(ResolvedDate {
        year_now: year_text,
        month: month_name_resolved,
        day: day_date,
        time,
    })
}

/// Null and blank strings count as absent.
fn present<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match raw.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            _ => c == p,
        })
}

/// `YYYY-MM-DD` or `DD/MM/YYYY`, zero padded.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    if matches_shape(s, "dddd-dd-dd") {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    } else if matches_shape(s, "dd/dd/dddd") {
        NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
    } else {
        None
    }
}

/// `HH:MM:SS` only; `HH:MM` is rejected.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    if !matches_shape(s, "dd:dd:dd") {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S").ok()
}

pub fn parse_month_name(s: &str) -> Option<&'static str> {
    let s = s.trim();
    (1..=12u32)
        .map(month_name)
        .find(|name| name.eq_ignore_ascii_case(s))
}

fn month_name(m: u32) -> &'static str {
    u8::try_from(m)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("January")
}
