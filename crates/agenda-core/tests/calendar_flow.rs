use std::cell::RefCell;
use std::fs;

use agenda_core::activity::ActivityKind;
use agenda_core::cli::Invocation;
use agenda_core::commands::dispatch;
use agenda_core::config::Config;
use agenda_core::datastore::DataStore;
use agenda_core::datekey::DateKey;
use agenda_core::grid::build_month_grid;
use agenda_core::grouping::ActivityIndex;
use agenda_core::notify::{Notice, Notifier};
use agenda_core::render::Renderer;
use agenda_core::selection::{NavAction, Selection};
use chrono::{NaiveDate, Weekday};
use tempfile::tempdir;

#[derive(Default)]
struct Recorder(RefCell<Vec<Notice>>);

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.0.borrow_mut().push(notice);
    }
}

fn key(raw: &str) -> DateKey {
    raw.parse().expect("valid key")
}

fn seed(store: &DataStore) {
    fs::write(
        &store.tasks_path,
        r#"{"success": true, "data": [
            {"id": 1, "title": "Send proposal", "due_date": "2025-12-03T17:00:00Z"},
            {"id": 2, "title": "Renew contract", "dueDate": "2025-12-03T08:00:00Z"},
            {"id": 3, "title": "Broken import", "due_date": "not-a-date"},
            {"id": 4, "title": "Backlog"}
        ]}"#,
    )
    .expect("write tasks");
    fs::write(
        &store.meetings_path,
        r#"[
            {"_id": "m1", "subject": "Demo", "startTime": "2025-12-03T15:00:00Z", "endTime": "2025-12-03T16:00:00Z"},
            {"_id": "m2", "subject": "Kickoff", "start_time": "2025-12-03T09:30:00Z"},
            "not a record"
        ]"#,
    )
    .expect("write meetings");
    fs::write(
        &store.calls_path,
        "{\"id\": \"c1\", \"title\": \"Intro call\", \"callTime\": 1765285200000}\n",
    )
    .expect("write calls");
}

#[test]
fn exports_become_a_counted_month_grid() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    seed(&store);

    let collections = store.load_all().expect("load exports");
    assert_eq!(collections.tasks.len(), 4);
    assert_eq!(collections.meetings.len(), 2);
    assert_eq!(collections.calls.len(), 1);

    let index = ActivityIndex::build(
        &collections.tasks,
        &collections.meetings,
        &collections.calls,
        chrono_tz::UTC,
    );
    let third = index.counts(key("2025-12-03"));
    assert_eq!((third.tasks, third.meetings, third.calls), (2, 2, 0));
    // 1765285200000 ms is 2025-12-09T13:00:00Z.
    assert_eq!(index.counts(key("2025-12-09")).calls, 1);
    assert_eq!(index.skipped(ActivityKind::Task).total(), 2);

    let agenda = index.agenda(key("2025-12-03"));
    let meetings: Vec<&str> = agenda.meetings.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(meetings, vec!["Kickoff", "Demo"]);
    let tasks: Vec<&str> = agenda.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(tasks, vec!["Renew contract", "Send proposal"]);

    let grid = build_month_grid(
        NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"),
        Weekday::Sun,
    )
    .with_counts(&index);
    assert_eq!(grid.cells.len(), 35);
    let total: usize = grid.day_cells().map(|cell| cell.counts.total()).sum();
    assert_eq!(total, 5);
}

#[test]
fn local_timezone_moves_late_items_to_the_next_day() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    seed(&store);
    let collections = store.load_all().expect("load exports");

    let index = ActivityIndex::build(
        &collections.tasks,
        &collections.meetings,
        &collections.calls,
        chrono_tz::Asia::Tokyo,
    );
    // 17:00Z and 15:00Z land on the 4th in Tokyo (UTC+9).
    assert_eq!(index.counts(key("2025-12-04")).tasks, 1);
    assert_eq!(index.counts(key("2025-12-04")).meetings, 1);
    assert_eq!(index.counts(key("2025-12-03")).tasks, 1);
}

#[test]
fn selection_survives_between_invocations() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    assert_eq!(store.load_selection().expect("load"), None);

    let today = NaiveDate::from_ymd_opt(2025, 12, 17).expect("valid date");
    let selection = Selection::new(today).apply(NavAction::NextMonth);
    store.save_selection(&selection).expect("save");

    let reopened = DataStore::open(temp.path()).expect("reopen datastore");
    let loaded = reopened.load_selection().expect("load").expect("saved selection");
    assert_eq!(loaded, selection);
    assert_eq!(loaded.selected(), key("2026-01-17"));
}

#[test]
fn dispatch_reports_skipped_records_through_the_notifier() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    seed(&store);

    let mut cfg = Config::default();
    cfg.set("calendar.timezone", "UTC");
    let recorder = Recorder::default();
    let inv = Invocation {
        command: "select".to_string(),
        command_args: vec!["2025-12-03".to_string()],
    };

    dispatch(&store, &cfg, &Renderer::plain(), &recorder, inv).expect("dispatch select");

    let notices = recorder.0.borrow();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("2 tasks not shown"));
    let saved = store.load_selection().expect("load").expect("saved selection");
    assert_eq!(saved.selected(), key("2025-12-03"));
    assert_eq!(saved.month(), NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date"));
}

#[test]
fn missing_exports_are_an_empty_calendar() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let collections = store.load_all().expect("load exports");
    assert!(collections.is_empty());

    let mut cfg = Config::default();
    cfg.set("report.skipped", "off");
    let recorder = Recorder::default();
    let inv = Invocation {
        command: "counts".to_string(),
        command_args: vec![],
    };
    dispatch(&store, &cfg, &Renderer::plain(), &recorder, inv).expect("dispatch counts");
    assert!(recorder.0.borrow().is_empty());
}
