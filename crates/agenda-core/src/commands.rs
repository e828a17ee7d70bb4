use anyhow::anyhow;
use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::activity::ActivityKind;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datekey::DateKey;
use crate::datetime::{parse_day_expr, parse_month_expr, resolve_timezone, today_in};
use crate::grid::{MonthGrid, build_month_grid};
use crate::grouping::{ActivityIndex, DayAgenda, DayCounts, SkipTally};
use crate::notify::{Notifier, report_skipped};
use crate::render::Renderer;
use crate::selection::{NavAction, Selection};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "month", "day", "select", "prev", "next", "today", "counts", "export", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Settings every calendar command needs, resolved once per invocation.
#[derive(Debug, Clone, Copy)]
pub struct CalendarContext {
    pub tz: Tz,
    pub week_start: Weekday,
    pub today: NaiveDate,
    pub report_skipped: bool,
}

impl CalendarContext {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let tz = resolve_timezone(cfg);
        Ok(Self {
            tz,
            week_start: cfg.week_start()?,
            today: today_in(&tz),
            report_skipped: cfg.get_bool("report.skipped").unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize)]
struct ExportDocument {
    timezone: String,
    selection: Selection,
    grid: MonthGrid,
    agenda: DayAgenda,
    skipped: SkippedExport,
}

#[derive(Debug, Serialize)]
struct SkippedExport {
    tasks: SkipTally,
    meetings: SkipTally,
    calls: SkipTally,
}

#[instrument(skip(store, cfg, renderer, notifier, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    notifier: &dyn Notifier,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "help" => return cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let ctx = CalendarContext::from_config(cfg)?;
    let selection = store
        .load_selection()?
        .unwrap_or_else(|| Selection::new(ctx.today));
    let index = load_index(store, &ctx, notifier)?;

    match command {
        "month" => cmd_month(renderer, &ctx, &index, selection, &inv.command_args),
        "day" => cmd_day(renderer, &ctx, &index, selection, &inv.command_args),
        "select" => cmd_select(store, renderer, &ctx, &index, selection, &inv.command_args),
        "prev" => cmd_navigate(store, renderer, &ctx, &index, selection, NavAction::PrevMonth),
        "next" => cmd_navigate(store, renderer, &ctx, &index, selection, NavAction::NextMonth),
        "today" => cmd_navigate(
            store,
            renderer,
            &ctx,
            &index,
            selection,
            NavAction::Today(ctx.today),
        ),
        "counts" => cmd_counts(renderer, &index),
        "export" => cmd_export(&ctx, &index, selection),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip_all)]
fn load_index(
    store: &DataStore,
    ctx: &CalendarContext,
    notifier: &dyn Notifier,
) -> anyhow::Result<ActivityIndex> {
    let collections = store.load_all()?;
    let index = ActivityIndex::build(
        &collections.tasks,
        &collections.meetings,
        &collections.calls,
        ctx.tz,
    );
    info!(
        records = collections.len(),
        days = index.days().len(),
        skipped = index.skipped_total(),
        "indexed activities"
    );
    if ctx.report_skipped {
        report_skipped(&index, notifier);
    }
    Ok(index)
}

fn month_grid(ctx: &CalendarContext, index: &ActivityIndex, month: NaiveDate) -> MonthGrid {
    build_month_grid(month, ctx.week_start).with_counts(index)
}

fn cmd_month(
    renderer: &Renderer,
    ctx: &CalendarContext,
    index: &ActivityIndex,
    selection: Selection,
    args: &[String],
) -> anyhow::Result<()> {
    let month = match args.first() {
        Some(raw) => parse_month_expr(raw, ctx.today)?,
        None => selection.month(),
    };
    info!(month = %month.format("%Y-%m"), "command month");
    let grid = month_grid(ctx, index, month);
    renderer.print_month(&grid, selection.selected(), ctx.today)
}

fn cmd_day(
    renderer: &Renderer,
    ctx: &CalendarContext,
    index: &ActivityIndex,
    selection: Selection,
    args: &[String],
) -> anyhow::Result<()> {
    let key = match args.first() {
        Some(raw) => DateKey::new(parse_day_expr(raw, ctx.today)?),
        None => selection.selected(),
    };
    info!(day = %key, "command day");
    renderer.print_agenda(&index.agenda(key), &ctx.tz)
}

fn cmd_select(
    store: &DataStore,
    renderer: &Renderer,
    ctx: &CalendarContext,
    index: &ActivityIndex,
    selection: Selection,
    args: &[String],
) -> anyhow::Result<()> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("select requires a day, e.g. `select 2025-12-01`"))?;
    let key = DateKey::new(parse_day_expr(raw, ctx.today)?);
    let selection = selection.apply(NavAction::SelectDay(key));
    store.save_selection(&selection)?;
    info!(day = %key, "command select");
    renderer.print_agenda(&index.agenda(selection.selected()), &ctx.tz)
}

fn cmd_navigate(
    store: &DataStore,
    renderer: &Renderer,
    ctx: &CalendarContext,
    index: &ActivityIndex,
    selection: Selection,
    action: NavAction,
) -> anyhow::Result<()> {
    let selection = selection.apply(action);
    store.save_selection(&selection)?;
    info!(?action, selected = %selection.selected(), "command navigate");
    let grid = month_grid(ctx, index, selection.month());
    renderer.print_month(&grid, selection.selected(), ctx.today)
}

fn cmd_counts(renderer: &Renderer, index: &ActivityIndex) -> anyhow::Result<()> {
    let rows: Vec<(DateKey, DayCounts)> = index
        .days()
        .into_iter()
        .map(|key| (key, index.counts(key)))
        .collect();
    info!(days = rows.len(), "command counts");
    renderer.print_counts(&rows)
}

fn cmd_export(
    ctx: &CalendarContext,
    index: &ActivityIndex,
    selection: Selection,
) -> anyhow::Result<()> {
    let doc = ExportDocument {
        timezone: ctx.tz.name().to_string(),
        selection,
        grid: month_grid(ctx, index, selection.month()),
        agenda: index.agenda(selection.selected()),
        skipped: SkippedExport {
            tasks: index.skipped(ActivityKind::Task),
            meetings: index.skipped(ActivityKind::Meeting),
            calls: index.skipped(ActivityKind::Call),
        },
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: month [MONTH], day [DAY], select DAY, prev, next, today, \
         counts, export, help, version\n\
         DAY: today, tomorrow, yesterday, weekday names, +Nd/-Nd, +Nw/-Nw, YYYY-MM-DD\n\
         MONTH: YYYY-MM, month names, or any DAY"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::expand_command_abbrev;
    use super::known_command_names;

    #[test]
    fn unique_prefixes_expand() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("mo", &known), Some("month"));
        assert_eq!(expand_command_abbrev("ex", &known), Some("export"));
        assert_eq!(expand_command_abbrev("next", &known), Some("next"));
        assert_eq!(expand_command_abbrev("d", &known), Some("day"));
    }

    #[test]
    fn unknown_and_empty_prefixes_do_not_expand() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("zz", &known), None);
        assert_eq!(expand_command_abbrev("", &known), None);
    }
}
