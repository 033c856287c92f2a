//! Serde helpers for wall-clock times.
//!
//! Forms submit `19:00` while Postgres `time` columns come back as
//! `19:00:00`; both parse, and values are always written as `HH:MM`.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

const SHORT: &str = "%H:%M";
const LONG: &str = "%H:%M:%S";

pub fn parse(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, SHORT)
        .or_else(|_| NaiveTime::parse_from_str(value, LONG))
        .ok()
}

pub fn format(time: &NaiveTime) -> String {
    time.format(SHORT).to_string()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}'", raw)))
}
