use std::collections::{BTreeMap, BTreeSet};

use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::activity::{Activity, ActivityKind};
use crate::datekey::DateKey;

pub type DayBuckets = BTreeMap<DateKey, Vec<Activity>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub tasks: usize,
    pub meetings: usize,
    pub calls: usize,
}

impl DayCounts {
    pub fn total(&self) -> usize {
        self.tasks + self.meetings + self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, kind: ActivityKind) -> usize {
        match kind {
            ActivityKind::Task => self.tasks,
            ActivityKind::Meeting => self.meetings,
            ActivityKind::Call => self.calls,
        }
    }
}

/// Everything scheduled on one day, each list ascending by its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAgenda {
    pub key: DateKey,
    pub meetings: Vec<Activity>,
    pub calls: Vec<Activity>,
    pub tasks: Vec<Activity>,
}

impl DayAgenda {
    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty() && self.calls.is_empty() && self.tasks.is_empty()
    }
}

/// Items left out of the calendar for one activity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipTally {
    pub missing: usize,
    pub unparseable: usize,
}

impl SkipTally {
    pub fn total(&self) -> usize {
        self.missing + self.unparseable
    }
}

/// Day buckets for the three activity kinds, derived from the input
/// collections in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityIndex {
    tz: Tz,
    tasks: DayBuckets,
    meetings: DayBuckets,
    calls: DayBuckets,
    skipped: BTreeMap<ActivityKind, SkipTally>,
}

impl ActivityIndex {
    #[tracing::instrument(skip_all, fields(tz = %tz))]
    pub fn build(tasks: &[Activity], meetings: &[Activity], calls: &[Activity], tz: Tz) -> Self {
        let mut skipped = BTreeMap::new();
        let tasks = bucket_by_day(tasks, ActivityKind::Task, &tz, &mut skipped);
        let meetings = bucket_by_day(meetings, ActivityKind::Meeting, &tz, &mut skipped);
        let calls = bucket_by_day(calls, ActivityKind::Call, &tz, &mut skipped);

        debug!(
            task_days = tasks.len(),
            meeting_days = meetings.len(),
            call_days = calls.len(),
            "built activity index"
        );

        Self {
            tz,
            tasks,
            meetings,
            calls,
            skipped,
        }
    }

    pub fn buckets(&self, kind: ActivityKind) -> &DayBuckets {
        match kind {
            ActivityKind::Task => &self.tasks,
            ActivityKind::Meeting => &self.meetings,
            ActivityKind::Call => &self.calls,
        }
    }

    pub fn counts(&self, key: DateKey) -> DayCounts {
        let size = |buckets: &DayBuckets| buckets.get(&key).map_or(0, Vec::len);
        DayCounts {
            tasks: size(&self.tasks),
            meetings: size(&self.meetings),
            calls: size(&self.calls),
        }
    }

    pub fn agenda(&self, key: DateKey) -> DayAgenda {
        let sorted = |buckets: &DayBuckets| {
            let mut items = buckets.get(&key).cloned().unwrap_or_default();
            sort_by_timestamp(&mut items, &self.tz);
            items
        };
        DayAgenda {
            key,
            meetings: sorted(&self.meetings),
            calls: sorted(&self.calls),
            tasks: sorted(&self.tasks),
        }
    }

    /// Every day holding at least one activity of any kind.
    pub fn days(&self) -> BTreeSet<DateKey> {
        self.tasks
            .keys()
            .chain(self.meetings.keys())
            .chain(self.calls.keys())
            .copied()
            .collect()
    }

    pub fn skipped(&self, kind: ActivityKind) -> SkipTally {
        self.skipped.get(&kind).copied().unwrap_or_default()
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().map(SkipTally::total).sum()
    }
}

/// Stable ascending sort on each item's timestamp; items without one sort
/// as the epoch.
pub fn sort_by_timestamp(items: &mut [Activity], tz: &Tz) {
    items.sort_by_cached_key(|item| item.sort_millis(tz));
}

fn bucket_by_day(
    items: &[Activity],
    kind: ActivityKind,
    tz: &Tz,
    skipped: &mut BTreeMap<ActivityKind, SkipTally>,
) -> DayBuckets {
    let mut buckets = DayBuckets::new();
    for item in items {
        match item.day_key(tz) {
            Some(key) => buckets.entry(key).or_default().push(item.clone()),
            None => {
                let tally = skipped.entry(kind).or_default();
                if item.at.is_some() {
                    tally.unparseable += 1;
                } else {
                    tally.missing += 1;
                }
                debug!(
                    kind = %kind,
                    id = ?item.id,
                    title = %item.title,
                    at = ?item.at,
                    "activity has no usable {}; left off the calendar",
                    kind.timestamp_field()
                );
            }
        }
    }
    buckets
}
