use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datekey::{DateInput, DateKey, date_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Task,
    Meeting,
    Call,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [ActivityKind::Task, ActivityKind::Meeting, ActivityKind::Call];

    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::Task => "task",
            ActivityKind::Meeting => "meeting",
            ActivityKind::Call => "call",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ActivityKind::Task => "tasks",
            ActivityKind::Meeting => "meetings",
            ActivityKind::Call => "calls",
        }
    }

    /// Name of the field whose timestamp places the activity on a day.
    pub fn timestamp_field(self) -> &'static str {
        match self {
            ActivityKind::Task => "due_date",
            ActivityKind::Meeting => "start_time",
            ActivityKind::Call => "call_time",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A task, meeting, or call with its relevant timestamp under one canonical
/// name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub at: Option<DateInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateInput>,
}

impl Activity {
    pub fn new(kind: ActivityKind, title: impl Into<String>, at: Option<DateInput>) -> Self {
        Self {
            kind,
            id: None,
            title: title.into(),
            status: None,
            at,
            ends_at: None,
        }
    }

    /// Converts one backend record. Returns `None` only when the record is
    /// not a JSON object.
    pub fn from_json(kind: ActivityKind, record: &Value) -> Option<Self> {
        if !record.is_object() {
            return None;
        }
        RawActivity::deserialize(record)
            .ok()
            .map(|raw| Self::from_raw(kind, raw))
    }

    pub fn from_raw(kind: ActivityKind, raw: RawActivity) -> Self {
        let id = first_present(&raw.id, &raw.object_id).and_then(scalar_text);
        let title = [&raw.title, &raw.subject, &raw.name]
            .into_iter()
            .filter_map(|v| v.as_ref().and_then(scalar_text))
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| match &id {
                Some(id) => format!("{kind} {id}"),
                None => format!("untitled {kind}"),
            });

        let at = match kind {
            ActivityKind::Task => first_present(&raw.due_date, &raw.due_date_camel),
            ActivityKind::Meeting => first_present(&raw.start_time, &raw.start_time_camel),
            ActivityKind::Call => first_present(&raw.call_time, &raw.call_time_camel),
        }
        .and_then(DateInput::from_json);

        let ends_at = match kind {
            ActivityKind::Meeting => {
                first_present(&raw.end_time, &raw.end_time_camel).and_then(DateInput::from_json)
            }
            _ => None,
        };

        Self {
            kind,
            id,
            title,
            status: raw.status.as_ref().and_then(scalar_text),
            at,
            ends_at,
        }
    }

    pub fn local_time(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.at.as_ref().and_then(|at| at.to_local(tz))
    }

    pub fn day_key(&self, tz: &Tz) -> Option<DateKey> {
        date_key(self.at.as_ref(), tz)
    }

    /// Milliseconds since the epoch, with a missing or unparseable timestamp
    /// counting as zero.
    pub fn sort_millis(&self, tz: &Tz) -> i64 {
        self.local_time(tz)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Backend record as delivered, tolerant of both snake_case and camelCase
/// field names. Only [`Activity::from_raw`] reads it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActivity {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub subject: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub due_date: Option<Value>,
    #[serde(default, rename = "dueDate")]
    pub due_date_camel: Option<Value>,
    #[serde(default)]
    pub start_time: Option<Value>,
    #[serde(default, rename = "startTime")]
    pub start_time_camel: Option<Value>,
    #[serde(default)]
    pub end_time: Option<Value>,
    #[serde(default, rename = "endTime")]
    pub end_time_camel: Option<Value>,
    #[serde(default)]
    pub call_time: Option<Value>,
    #[serde(default, rename = "callTime")]
    pub call_time_camel: Option<Value>,
}

fn first_present<'a>(primary: &'a Option<Value>, fallback: &'a Option<Value>) -> Option<&'a Value> {
    primary
        .as_ref()
        .filter(|v| !v.is_null())
        .or_else(|| fallback.as_ref().filter(|v| !v.is_null()))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
