use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{self, DateRange, MonthGrid};
use crate::config::Config;
use crate::datetime::{format_short_date, format_span};
use crate::model::{Color, PERSON_PALETTE, Person, PersonId, RECOLOR_PALETTE, Vacation, VacationStatus};
use crate::planner::Planner;
use crate::session::Session;

/// Visible width of one grid cell: two digits and a marker.
const CELL_WIDTH: usize = 3;
const BLOCK_WIDTH: usize = CELL_WIDTH * 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayState {
    Free,
    Away,
    Clash,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    week_start: Weekday,
    timeline_width: usize,
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
            week_start: cfg.week_start()?,
            timeline_width: cfg.timeline_width()?,
        })
    }

    #[tracing::instrument(skip(self, out, session))]
    pub fn write_people<W: Write>(&self, out: &mut W, session: &Session) -> anyhow::Result<()> {
        let people = session.planner.people();
        if people.is_empty() {
            writeln!(out, "No people yet. Add one with: add <name>")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Name".to_string(),
            "Color".to_string(),
            "Vacations".to_string(),
            "Days".to_string(),
            "".to_string(),
        ];

        let mut rows = Vec::with_capacity(people.len());
        for (idx, person) in people.iter().enumerate() {
            let vacations = session.planner.vacations_for(person.id).collect::<Vec<_>>();
            let days: i64 = vacations.iter().map(|vacation| vacation.day_count()).sum();

            let mut marker = String::new();
            if session.selected_id() == Some(person.id) {
                marker.push_str("selected");
            }
            if session.pending_removal().map(|p| p.id) == Some(person.id) {
                if !marker.is_empty() {
                    marker.push_str(", ");
                }
                marker.push_str("pending removal");
            }

            rows.push(vec![
                self.paint(&(idx + 1).to_string(), "33"),
                self.person_label(person),
                person.color.to_string(),
                vacations.len().to_string(),
                days.to_string(),
                marker,
            ]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    /// Numbered vacation listing. `rows` carries each vacation with its
    /// list number so filtered output keeps stable numbers.
    #[tracing::instrument(skip(self, out, planner, rows))]
    pub fn write_vacations<W: Write>(
        &self,
        out: &mut W,
        planner: &Planner,
        rows: &[(usize, &Vacation)],
    ) -> anyhow::Result<()> {
        if rows.is_empty() {
            writeln!(out, "No matching vacations.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Person".to_string(),
            "Dates".to_string(),
            "Days".to_string(),
            "Status".to_string(),
            "Replacement".to_string(),
        ];

        let mut table = Vec::with_capacity(rows.len());
        for (number, vacation) in rows {
            let person = planner
                .person(vacation.person_id)
                .map(|person| self.person_label(person))
                .unwrap_or_else(|| "?".to_string());
            let status = match vacation.status {
                VacationStatus::Confirmed => vacation.status.to_string(),
                VacationStatus::Tentative => self.paint(vacation.status.as_str(), "2"),
            };
            let replacement = if vacation.is_covered() {
                vacation.replacement.clone()
            } else {
                "-".to_string()
            };

            table.push(vec![
                self.paint(&number.to_string(), "33"),
                person,
                format_span(*vacation),
                vacation.day_count().to_string(),
                status,
                replacement,
            ]);
        }

        write_table(out, headers, table)?;
        Ok(())
    }

    /// One row per person with their vacation days in each month. Months in
    /// which the person shares a day off with someone else carry a `*`.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn write_year<W: Write>(&self, out: &mut W, planner: &Planner, year: i32) -> anyhow::Result<()> {
        let range = calendar::year_range(year).ok_or_else(|| anyhow!("year out of range: {year}"))?;
        let focus = range.start();
        writeln!(
            out,
            "{}",
            self.paint(&calendar::title_for_view(calendar::ViewMode::Year, focus), "1")
        )?;

        let clashes = clash_map(planner, &range);

        let mut headers = vec!["Person".to_string()];
        for month in 1..=12 {
            headers.push(calendar::first_day_of_month(year, month).format("%b").to_string());
        }
        headers.push("Total".to_string());

        let mut rows = Vec::with_capacity(planner.people().len() + 1);
        for person in planner.people() {
            let away = days_away(planner, person.id, &range);
            let mut row = vec![self.person_label(person)];
            for month in 1..=12 {
                let in_month = away.iter().filter(|day| day.month() == month);
                let count = in_month.clone().count();
                let shared = in_month
                    .clone()
                    .any(|day| clashes.get(day).is_some_and(|people| people.contains(&person.id)));
                row.push(match (count, shared) {
                    (0, _) => ".".to_string(),
                    (n, true) => format!("{n}*"),
                    (n, false) => n.to_string(),
                });
            }
            row.push(away.len().to_string());
            rows.push(row);
        }

        let mut team = vec!["overlap".to_string()];
        for month in 1..=12 {
            let count = clashes.keys().filter(|day| day.month() == month).count();
            team.push(if count == 0 { ".".to_string() } else { count.to_string() });
        }
        team.push(clashes.len().to_string());
        rows.push(team);

        write_table(out, headers, rows)?;
        Ok(())
    }

    /// Three month grids side by side for each person.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn write_quarter<W: Write>(&self, out: &mut W, planner: &Planner, focus: NaiveDate) -> anyhow::Result<()> {
        let window = calendar::calendar_date_window(calendar::ViewMode::Quarter, focus);
        writeln!(
            out,
            "{}",
            self.paint(&calendar::title_for_view(calendar::ViewMode::Quarter, focus), "1")
        )?;

        if planner.people().is_empty() {
            writeln!(out, "No people yet. Add one with: add <name>")?;
            return Ok(());
        }

        let clashes = clash_map(planner, &window);
        let first_month = window.start().month();
        let grids = (first_month..first_month + 3)
            .map(|month| {
                calendar::month_grid(window.start().year(), month, self.week_start)
                    .ok_or_else(|| anyhow!("invalid month {month}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        for person in planner.people() {
            writeln!(out)?;
            writeln!(out, "{}", self.person_label(person))?;
            let away = days_away(planner, person.id, &window);
            let blocks = grids
                .iter()
                .map(|grid| self.month_block(grid, person.color, |day| person_day(&away, &clashes, person.id, day)))
                .collect::<Vec<_>>();
            for line_idx in 0..blocks[0].len() {
                let line = blocks
                    .iter()
                    .map(|block| block[line_idx].as_str())
                    .collect::<Vec<_>>()
                    .join("  ");
                writeln!(out, "{}", line.trim_end())?;
            }
        }

        Ok(())
    }

    /// Month grid per person plus a team row marking shared days with `!`.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn write_month<W: Write>(&self, out: &mut W, planner: &Planner, focus: NaiveDate) -> anyhow::Result<()> {
        let window = calendar::calendar_date_window(calendar::ViewMode::Month, focus);
        writeln!(
            out,
            "{}",
            self.paint(&calendar::title_for_view(calendar::ViewMode::Month, focus), "1")
        )?;

        let grid = calendar::month_grid(focus.year(), focus.month(), self.week_start)
            .ok_or_else(|| anyhow!("invalid month in {focus}"))?;
        let clashes = clash_map(planner, &window);

        for person in planner.people() {
            writeln!(out)?;
            writeln!(out, "{}", self.person_label(person))?;
            let away = days_away(planner, person.id, &window);
            for line in self
                .month_block(&grid, person.color, |day| person_day(&away, &clashes, person.id, day))
                .iter()
                .skip(1)
            {
                writeln!(out, "{}", line.trim_end())?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Team")?;
        for line in self
            .month_block(&grid, Color::default(), |day| {
                if clashes.contains_key(&day) {
                    DayState::Clash
                } else {
                    DayState::Free
                }
            })
            .iter()
            .skip(1)
        {
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    /// Gantt bars for every vacation touching `window`.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn write_timeline<W: Write>(&self, out: &mut W, planner: &Planner, window: DateRange) -> anyhow::Result<()> {
        let visible =
            calendar::intervals_overlapping_range(planner.vacations(), window.start(), window.end());
        if visible.is_empty() {
            writeln!(out, "No vacations between {}.", format_span(&window))?;
            return Ok(());
        }

        let labels = visible
            .iter()
            .map(|vacation| {
                planner
                    .person(vacation.person_id)
                    .map(|person| person.name.clone())
                    .unwrap_or_else(|| "?".to_string())
            })
            .collect::<Vec<_>>();
        let label_width = labels
            .iter()
            .map(|label| UnicodeWidthStr::width(label.as_str()))
            .max()
            .unwrap_or(0);

        let width = self.timeline_width;
        let first = format_short_date(window.start());
        let last = format_short_date(window.end());
        let gap = width.saturating_sub(first.len() + last.len()).max(1);
        writeln!(
            out,
            "{:label_width$}  {first}{}{last}",
            "",
            " ".repeat(gap),
        )?;

        for (vacation, label) in visible.iter().zip(labels) {
            let Some(layout) =
                calendar::layout_percent(*vacation, window.start(), window.end(), window.len_days())
            else {
                continue;
            };
            let (left, len) = layout.to_columns(width);
            let fill = match vacation.status {
                VacationStatus::Confirmed => "=",
                VacationStatus::Tentative => "~",
            };
            let color = planner
                .person(vacation.person_id)
                .map(|person| person.color)
                .unwrap_or_default();
            let bar = self.swatch(&fill.repeat(len), color);
            let padding = label_width.saturating_sub(UnicodeWidthStr::width(label.as_str()));

            writeln!(
                out,
                "{label}{}  |{}{bar}{}|  {}",
                " ".repeat(padding),
                " ".repeat(left),
                " ".repeat(width.saturating_sub(left + len)),
                format_span(*vacation),
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, out, planner))]
    pub fn write_overlaps<W: Write>(&self, out: &mut W, planner: &Planner, window: DateRange) -> anyhow::Result<()> {
        let overlaps = calendar::overlap_days(planner.vacations(), &window);
        if overlaps.is_empty() {
            writeln!(out, "No overlapping vacations between {}.", format_span(&window))?;
            return Ok(());
        }

        let headers = vec!["Date".to_string(), "Away".to_string()];
        let rows = overlaps
            .iter()
            .map(|overlap| {
                let mut away = overlap
                    .people
                    .iter()
                    .filter_map(|id| planner.person(*id))
                    .collect::<Vec<_>>();
                away.sort_by_key(|person| planner.person_number(person.id));
                let names = away
                    .into_iter()
                    .map(|person| self.person_label(person))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![overlap.date.format("%a %b %-d").to_string(), names]
            })
            .collect::<Vec<_>>();

        write_table(&mut *out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "{} day(s) with more than one person away.", overlaps.len())?;
        Ok(())
    }

    pub fn write_palette<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        writeln!(out, "Add choices (1 is the default):")?;
        for (idx, color) in PERSON_PALETTE.iter().enumerate() {
            writeln!(out, "  {:>2}  {}  {color}", idx + 1, self.swatch("  ", *color))?;
        }
        writeln!(out, "Recolor choices:")?;
        for (idx, color) in RECOLOR_PALETTE.iter().enumerate() {
            writeln!(out, "  {:>2}  {}  {color}", idx + 1, self.swatch("  ", *color))?;
        }
        Ok(())
    }

    pub fn write_config<W: Write>(&self, out: &mut W, cfg: &Config) -> anyhow::Result<()> {
        let headers = vec!["Config Variable".to_string(), "Value".to_string()];
        let rows = cfg
            .iter()
            .map(|(key, value)| vec![key.clone(), value.clone()])
            .collect::<Vec<_>>();
        write_table(&mut *out, headers, rows)?;

        if !cfg.loaded_files.is_empty() {
            writeln!(out)?;
            for path in &cfg.loaded_files {
                writeln!(out, "loaded {}", path.display())?;
            }
        }
        Ok(())
    }

    fn person_label(&self, person: &Person) -> String {
        self.swatch(&person.name, person.color)
    }

    /// Title line, weekday header and six week lines for one month.
    fn month_block<F>(&self, grid: &MonthGrid, color: Color, state: F) -> Vec<String>
    where
        F: Fn(NaiveDate) -> DayState,
    {
        let mut lines = Vec::with_capacity(8);
        let title = calendar::first_day_of_month(grid.year, grid.month)
            .format("%B")
            .to_string();
        lines.push(format!("{title:^width$}", width = BLOCK_WIDTH));
        lines.push(
            calendar::weekday_labels(grid.week_start)
                .iter()
                .map(|label| format!("{label:>2} "))
                .collect::<String>(),
        );

        for week in grid.weeks() {
            let mut line = String::new();
            for cell in week {
                let Some(day) = cell else {
                    line.push_str(&" ".repeat(CELL_WIDTH));
                    continue;
                };
                let number = format!("{:>2}", day.day());
                match (state(*day), self.color) {
                    (DayState::Free, _) => {
                        line.push_str(&number);
                        line.push(' ');
                    }
                    (DayState::Away, true) => {
                        line.push_str(&self.swatch(&number, color));
                        line.push(' ');
                    }
                    (DayState::Away, false) => {
                        line.push_str(&number);
                        line.push('*');
                    }
                    (DayState::Clash, _) => {
                        line.push_str(&self.swatch(&number, color));
                        line.push('!');
                    }
                }
            }
            lines.push(line);
        }

        lines
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    /// Text on a 24-bit background in `color`, with a foreground that stays
    /// readable on it.
    fn swatch(&self, text: &str, color: Color) -> String {
        let (r, g, b) = color.rgb();
        let fg = if color.is_light() { "30" } else { "97" };
        self.paint(text, &format!("48;2;{r};{g};{b};{fg}"))
    }
}

/// Days in `range` on which `person` is away, merged across their vacations.
fn days_away(planner: &Planner, person: PersonId, range: &DateRange) -> BTreeSet<NaiveDate> {
    planner
        .vacations_for(person)
        .filter_map(|vacation| vacation.span.clamp_to(range))
        .flat_map(|span| span.days())
        .collect()
}

fn clash_map(planner: &Planner, range: &DateRange) -> BTreeMap<NaiveDate, BTreeSet<PersonId>> {
    calendar::overlap_days(planner.vacations(), range)
        .into_iter()
        .map(|overlap| (overlap.date, overlap.people))
        .collect()
}

fn person_day(
    away: &BTreeSet<NaiveDate>,
    clashes: &BTreeMap<NaiveDate, BTreeSet<PersonId>>,
    person: PersonId,
    day: NaiveDate,
) -> DayState {
    if !away.contains(&day) {
        return DayState::Free;
    }
    if clashes.get(&day).is_some_and(|people| people.contains(&person)) {
        DayState::Clash
    } else {
        DayState::Away
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
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

pub(crate) fn strip_ansi(s: &str) -> String {
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
