use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::activity::Activity;
use crate::config::Config;
use crate::datekey::DateKey;
use crate::grid::{CalendarCell, MonthGrid};
use crate::grouping::{DayAgenda, DayCounts};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_month(
        &self,
        grid: &MonthGrid,
        selected: DateKey,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        self.write_month(io::stdout().lock(), grid, selected, today)
    }

    #[tracing::instrument(skip(self, agenda, tz))]
    pub fn print_agenda(&self, agenda: &DayAgenda, tz: &Tz) -> anyhow::Result<()> {
        self.write_agenda(io::stdout().lock(), agenda, tz)
    }

    #[tracing::instrument(skip(self, days))]
    pub fn print_counts(&self, days: &[(DateKey, DayCounts)]) -> anyhow::Result<()> {
        self.write_counts(io::stdout().lock(), days)
    }

    /// Two lines per week: day numbers, then `Nt Nm Nc` badges. The selected
    /// day is bracketed and today is highlighted.
    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        selected: DateKey,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", grid.title())?;
        writeln!(out)?;

        let headers = grid
            .weekday_labels()
            .iter()
            .map(|label| label.to_string())
            .collect();
        let mut rows = Vec::new();
        for week in grid.weeks() {
            let mut days = Vec::with_capacity(7);
            let mut badges = Vec::with_capacity(7);
            for cell in week {
                match cell {
                    CalendarCell::Blank => {
                        days.push(String::new());
                        badges.push(String::new());
                    }
                    CalendarCell::Day(day) => {
                        let label = if day.key == selected {
                            format!("[{:>2}]", day.day)
                        } else {
                            format!(" {:>2} ", day.day)
                        };
                        let label = if day.key.date() == today {
                            self.paint(&label, "1;36")
                        } else {
                            label
                        };
                        days.push(label);
                        badges.push(self.paint(&count_badge(&day.counts), "33"));
                    }
                }
            }
            rows.push(days);
            rows.push(badges);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn write_agenda<W: Write>(
        &self,
        mut out: W,
        agenda: &DayAgenda,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}",
            agenda.key.date().format("%A, %Y-%m-%d")
        )?;

        if agenda.is_empty() {
            writeln!(out, "Nothing scheduled.")?;
            return Ok(());
        }

        let sections: [(&str, &[Activity]); 3] = [
            ("Meetings", agenda.meetings.as_slice()),
            ("Calls", agenda.calls.as_slice()),
            ("Tasks", agenda.tasks.as_slice()),
        ];
        for (heading, items) in sections {
            if items.is_empty() {
                continue;
            }
            writeln!(out)?;
            writeln!(out, "{} ({})", self.paint(heading, "1"), items.len())?;

            let headers = vec![
                "Time".to_string(),
                "Title".to_string(),
                "Status".to_string(),
            ];
            let rows = items
                .iter()
                .map(|item| {
                    vec![
                        time_range(item, tz),
                        item.title.clone(),
                        item.status.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            write_table(&mut out, headers, rows)?;
        }

        Ok(())
    }

    pub fn write_counts<W: Write>(
        &self,
        mut out: W,
        days: &[(DateKey, DayCounts)],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Day".to_string(),
            "Tasks".to_string(),
            "Meetings".to_string(),
            "Calls".to_string(),
        ];
        let rows = days
            .iter()
            .map(|(key, counts)| {
                vec![
                    key.to_string(),
                    counts.tasks.to_string(),
                    counts.meetings.to_string(),
                    counts.calls.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn count_badge(counts: &DayCounts) -> String {
    let mut parts = Vec::new();
    if counts.tasks > 0 {
        parts.push(format!("{}t", counts.tasks));
    }
    if counts.meetings > 0 {
        parts.push(format!("{}m", counts.meetings));
    }
    if counts.calls > 0 {
        parts.push(format!("{}c", counts.calls));
    }
    parts.join(" ")
}

fn time_range(item: &Activity, tz: &Tz) -> String {
    let start = item
        .local_time(tz)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    match item.ends_at.as_ref().and_then(|end| end.to_local(tz)) {
        Some(end) => format!("{start}-{}", end.format("%H:%M")),
        None => start,
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut header_line = String::new();
    for (header, &width) in headers.iter().zip(&widths) {
        header_line.push_str(&format!("{header:width$} "));
    }
    writeln!(writer, "{}", header_line.trim_end())?;

    let mut rule = String::new();
    for &width in &widths {
        rule.push_str(&format!("{:-<width$} ", ""));
    }
    writeln!(writer, "{}", rule.trim_end())?;

    for row in rows {
        let mut line = String::new();
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
