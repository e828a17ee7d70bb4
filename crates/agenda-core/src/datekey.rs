use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

const UTC_MINUTE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%MZ", "%Y-%m-%d %H:%MZ"];

/// Canonical `YYYY-MM-DD` calendar day used to bucket activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_KEY_FORMAT)
            .map(Self)
            .map_err(|err| anyhow!("invalid date key {s:?}: {err}"))
    }
}

impl Serialize for DateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A timestamp as it arrives from the backend, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DateInput {
    Text(String),
    EpochMillis(i64),
    Instant(DateTime<Utc>),
    Date(NaiveDate),
}

impl DateInput {
    /// `null` is "no value"; numbers are epoch milliseconds; any other
    /// non-string value is kept as text so it later fails to parse.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Number(number) => {
                let millis = number.as_i64().or_else(|| {
                    number
                        .as_f64()
                        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                        .map(|f| f.trunc() as i64)
                });
                Some(match millis {
                    Some(millis) => Self::EpochMillis(millis),
                    None => Self::Text(number.to_string()),
                })
            }
            other => Some(Self::Text(other.to_string())),
        }
    }

    /// Resolves the input to an instant in `tz`. Date-only inputs resolve to
    /// local midnight of that day. Instants whose wall-clock time in `tz`
    /// falls outside chrono's date range resolve to `None`.
    pub fn to_local(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        let resolved = match self {
            Self::Text(text) => parse_text(text, tz),
            Self::EpochMillis(millis) => Utc
                .timestamp_millis_opt(*millis)
                .single()
                .map(|dt| dt.with_timezone(tz)),
            Self::Instant(dt) => Some(dt.with_timezone(tz)),
            Self::Date(date) => local_midnight(*date, tz),
        };
        resolved.filter(|dt| local_in_range(dt))
    }
}

impl From<&str> for DateInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Instant(dt)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

/// Day key of `input` in `tz`, or `None` when the input is absent or does
/// not parse to a valid date.
pub fn date_key(input: Option<&DateInput>, tz: &Tz) -> Option<DateKey> {
    input
        .and_then(|value| value.to_local(tz))
        .map(|local| DateKey(local.date_naive()))
}

fn parse_text(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(tz));
    }

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(token, fmt) {
            return Some(dt.with_timezone(tz));
        }
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%SZ") {
        return Some(Utc.from_utc_datetime(&ndt).with_timezone(tz));
    }

    for fmt in UTC_MINUTE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return Some(Utc.from_utc_datetime(&ndt).with_timezone(tz));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return resolve_local(ndt, tz);
        }
    }

    NaiveDate::parse_from_str(token, DATE_KEY_FORMAT)
        .ok()
        .and_then(|date| local_midnight(date, tz))
}

// Ambiguous wall-clock times take the earlier instant; times inside a DST
// gap move forward by an hour.
fn resolve_local(ndt: NaiveDateTime, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&ndt).earliest().or_else(|| {
        ndt.checked_add_signed(Duration::hours(1))
            .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
    })
}

fn local_in_range(dt: &DateTime<Tz>) -> bool {
    let offset = TimeDelta::seconds(i64::from(dt.offset().fix().local_minus_utc()));
    dt.naive_utc().checked_add_signed(offset).is_some()
}

fn local_midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    resolve_local(date.and_time(NaiveTime::MIN), tz)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn key(raw: &str, tz: &Tz) -> Option<String> {
        date_key(Some(&DateInput::from(raw)), tz).map(|k| k.to_string())
    }

    #[test]
    fn same_local_day_shares_a_key() {
        let tz = chrono_tz::America::New_York;
        let samples = [
            "2025-01-05",
            "2025-01-05T00:00:00",
            "2025-01-05T08:15",
            "2025-01-05 23:59:59",
            "2025-01-05T23:59:59.999",
            "2025-01-05T12:00:00-05:00",
            "2025-01-06T04:30:00Z",
            "2025-01-05T09:30Z",
            "2025-01-05 09:30Z",
            "2025-01-05T19:30+05:00",
            "2025-01-05T09:30-0500",
            "2025-01-05 21:45+01:00",
            "2025-01-05T15:30:00+0530",
        ];
        for raw in samples {
            assert_eq!(key(raw, &tz).as_deref(), Some("2025-01-05"), "{raw}");
        }
    }

    #[test]
    fn offset_timestamps_convert_into_local_zone() {
        let tz = chrono_tz::Asia::Tokyo;
        assert_eq!(
            key("2025-01-05T20:00:00Z", &tz).as_deref(),
            Some("2025-01-06")
        );
        assert_eq!(
            key("20250105T200000Z", &tz).as_deref(),
            Some("2025-01-06")
        );
    }

    #[test]
    fn keys_are_zero_padded() {
        let key = DateKey::from_ymd(987, 3, 4).expect("valid date");
        assert_eq!(key.to_string(), "0987-03-04");
    }

    #[test]
    fn invalid_inputs_have_no_key() {
        let tz = chrono_tz::UTC;
        for raw in ["", "   ", "not-a-date", "2025-13-01", "2025-02-30", "12345"] {
            assert_eq!(key(raw, &tz), None, "{raw:?}");
        }
        assert_eq!(date_key(None, &tz), None);
        assert_eq!(DateInput::from_json(&Value::Null), None);
        let flag = DateInput::from_json(&json!(true));
        assert_eq!(date_key(flag.as_ref(), &tz), None);
    }

    #[test]
    fn json_numbers_are_epoch_millis() {
        let tz = chrono_tz::UTC;
        let input = DateInput::from_json(&json!(1_736_035_200_000_i64)).expect("number input");
        assert_eq!(input, DateInput::EpochMillis(1_736_035_200_000));
        assert_eq!(
            date_key(Some(&input), &tz).map(|k| k.to_string()).as_deref(),
            Some("2025-01-05")
        );
    }

    #[test]
    fn millis_at_the_edge_of_the_range_have_no_key() {
        let latest = DateInput::EpochMillis(8_210_266_876_799_999);
        let earliest = DateInput::EpochMillis(-8_334_601_228_800_000);

        assert!(date_key(Some(&latest), &chrono_tz::UTC).is_some());
        assert!(date_key(Some(&earliest), &chrono_tz::UTC).is_some());
        assert_eq!(date_key(Some(&latest), &chrono_tz::Asia::Tokyo), None);
        assert_eq!(
            date_key(Some(&earliest), &chrono_tz::America::Los_Angeles),
            None
        );
        assert_eq!(latest.to_local(&chrono_tz::Asia::Tokyo), None);
        assert_eq!(date_key(Some(&DateInput::EpochMillis(i64::MAX)), &chrono_tz::UTC), None);
    }

    #[test]
    fn typed_inputs_resolve_without_parsing() {
        let tz = chrono_tz::Europe::Berlin;
        let instant = Utc
            .with_ymd_and_hms(2025, 1, 5, 23, 30, 0)
            .single()
            .expect("valid instant");
        assert_eq!(
            date_key(Some(&DateInput::from(instant)), &tz).map(|k| k.to_string()),
            Some("2025-01-06".to_string())
        );
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).expect("valid date");
        assert_eq!(
            date_key(Some(&DateInput::from(date)), &tz),
            Some(DateKey::new(date))
        );
    }

    #[test]
    fn dst_gap_moves_forward() {
        let tz = chrono_tz::America::New_York;
        let resolved = DateInput::from("2025-03-09T02:30:00")
            .to_local(&tz)
            .expect("gap time resolves");
        assert_eq!(resolved.format("%H:%M").to_string(), "03:30");
    }

    #[test]
    fn parses_and_serializes_as_string() {
        let key: DateKey = "2025-12-01".parse().expect("parse key");
        assert_eq!(
            serde_json::to_value(key).expect("serialize"),
            json!("2025-12-01")
        );
        let back: DateKey = serde_json::from_value(json!("2025-12-01")).expect("deserialize");
        assert_eq!(back, key);
        assert!("12/01/2025".parse::<DateKey>().is_err());
    }
}
