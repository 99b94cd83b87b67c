//! Calendar arithmetic behind every view: month lengths, grid offsets,
//! interval overlap and Gantt bar layout.
//!
//! Nothing here fails on well-formed input; malformed input is stopped at
//! the form boundary (see [`crate::error`]).

use std::collections::{
  BTreeMap,
  BTreeSet
};

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};
use serde::Serialize;

use crate::error::ValidationError;

const DAYS_IN_MONTH: [u32; 12] =
  [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Cells in a month grid: six weeks of seven days.
pub const GRID_CELLS: usize = 42;

/// Anything with an inclusive start and end day.
pub trait Span {
  fn start(&self) -> NaiveDate;
  fn end(&self) -> NaiveDate;
}

/// A span that belongs to someone, used for overlap counting.
pub trait OwnedSpan: Span {
  type Owner: Ord + Copy;

  fn owner(&self) -> Self::Owner;
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct DateRange {
  start: NaiveDate,
  end:   NaiveDate
}

impl DateRange {
  pub fn new(
    start: NaiveDate,
    end: NaiveDate
  ) -> Result<Self, ValidationError> {
    if end < start {
      return Err(
        ValidationError::EndBeforeStart {
          start,
          end
        }
      );
    }
    Ok(Self {
      start,
      end
    })
  }

  pub fn single(day: NaiveDate) -> Self {
    Self {
      start: day,
      end:   day
    }
  }

  /// Builds a range from two bounds in either order.
  pub(crate) fn spanning(
    a: NaiveDate,
    b: NaiveDate
  ) -> Self {
    Self {
      start: a.min(b),
      end:   a.max(b)
    }
  }

  pub fn start(&self) -> NaiveDate {
    self.start
  }

  pub fn end(&self) -> NaiveDate {
    self.end
  }

  /// Number of days covered, both ends included.
  pub fn len_days(&self) -> i64 {
    (self.end - self.start).num_days()
      + 1
  }

  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    is_date_in_range(
      date, self.start, self.end
    )
  }

  pub fn overlaps<S: Span>(
    &self,
    other: &S
  ) -> bool {
    !(other.end() < self.start
      || other.start() > self.end)
  }

  /// The part of `self` that falls inside `bounds`.
  pub fn clamp_to(
    &self,
    bounds: &DateRange
  ) -> Option<DateRange> {
    if !bounds.overlaps(self) {
      return None;
    }
    Some(Self {
      start: self.start.max(bounds.start),
      end:   self.end.min(bounds.end)
    })
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = NaiveDate>
  + use<> {
    let end = self.end;
    self
      .start
      .iter_days()
      .take_while(move |day| *day <= end)
  }
}

impl Span for DateRange {
  fn start(&self) -> NaiveDate {
    self.start
  }

  fn end(&self) -> NaiveDate {
    self.end
  }
}

pub fn is_leap_year(year: i32) -> bool {
  (year % 4 == 0 && year % 100 != 0)
    || year % 400 == 0
}

/// Days in a month, with `month_index` counted from zero (0 = January).
pub fn days_in_month(
  month_index: u32,
  year: i32
) -> Option<u32> {
  let base = *DAYS_IN_MONTH
    .get(month_index as usize)?;
  if month_index == 1
    && is_leap_year(year)
  {
    Some(29)
  } else {
    Some(base)
  }
}

/// First day of a one-based `month`; months outside 1..=12 fall back to
/// `NaiveDate::MIN`.
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  month
    .checked_sub(1)
    .and_then(|index| {
      days_in_month(index, year)
    })
    .and_then(|day| {
      NaiveDate::from_ymd_opt(
        year, month, day
      )
    })
    .unwrap_or(NaiveDate::MIN)
}

pub fn month_range(
  year: i32,
  month: u32
) -> Option<DateRange> {
  let start = NaiveDate::from_ymd_opt(
    year, month, 1
  )?;
  let last =
    days_in_month(month - 1, year)?;
  let end = NaiveDate::from_ymd_opt(
    year, month, last
  )?;
  Some(DateRange {
    start,
    end
  })
}

pub fn quarter_of(month: u32) -> u32 {
  (month.saturating_sub(1) / 3) + 1
}

pub fn quarter_range(
  year: i32,
  quarter: u32
) -> Option<DateRange> {
  if !(1..=4).contains(&quarter) {
    return None;
  }
  let first_month = (quarter - 1) * 3 + 1;
  let start =
    month_range(year, first_month)?;
  let end =
    month_range(year, first_month + 2)?;
  Some(DateRange {
    start: start.start,
    end:   end.end
  })
}

pub fn year_range(
  year: i32
) -> Option<DateRange> {
  Some(DateRange {
    start: month_range(year, 1)?.start,
    end:   month_range(year, 12)?.end
  })
}

/// Inclusive at both ends.
pub fn is_date_in_range(
  date: NaiveDate,
  start: NaiveDate,
  end: NaiveDate
) -> bool {
  date >= start && date <= end
}

/// Intervals touching `[range_start, range_end]`, in input order.
pub fn intervals_overlapping_range<
  'a,
  S,
  I
>(
  intervals: I,
  range_start: NaiveDate,
  range_end: NaiveDate
) -> Vec<&'a S>
where
  S: Span + 'a,
  I: IntoIterator<Item = &'a S>
{
  intervals
    .into_iter()
    .filter(|interval| {
      !(interval.end() < range_start
        || interval.start() > range_end)
    })
    .collect()
}

/// Position of an interval bar inside a timeline.
///
/// `offset_day` is one-based: an interval starting on the first day of the
/// range has offset 1 and `left_pct` 0.
#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct BarLayout {
  pub offset_day:    i64,
  pub duration_days: i64,
  pub left_pct:      f64,
  pub width_pct:     f64
}

impl BarLayout {
  /// Maps the percentages onto `width` character cells as
  /// `(first_column, length)`. A visible bar is always at least one cell.
  pub fn to_columns(
    &self,
    width: usize
  ) -> (usize, usize) {
    if width == 0 {
      return (0, 0);
    }
    let scale = width as f64 / 100.0;
    let left = ((self.left_pct * scale)
      .floor() as usize)
      .min(width - 1);
    let len = ((self.width_pct * scale)
      .round() as usize)
      .max(1)
      .min(width - left);
    (left, len)
  }
}

pub fn layout_percent<S: Span>(
  interval: &S,
  range_start: NaiveDate,
  range_end: NaiveDate,
  total_days_in_range: i64
) -> Option<BarLayout> {
  if total_days_in_range <= 0
    || interval.end() < range_start
    || interval.start() > range_end
  {
    return None;
  }

  let start =
    interval.start().max(range_start);
  let end = interval.end().min(range_end);
  let offset_day =
    (start - range_start).num_days() + 1;
  let duration_days =
    (end - start).num_days() + 1;
  let total = total_days_in_range as f64;

  Some(BarLayout {
    offset_day,
    duration_days,
    left_pct: (offset_day - 1) as f64
      / total
      * 100.0,
    width_pct: duration_days as f64
      / total
      * 100.0
  })
}

/// Distinct owners away on `day`.
pub fn people_on_day<'a, S, I>(
  intervals: I,
  day: NaiveDate
) -> BTreeSet<S::Owner>
where
  S: OwnedSpan + 'a,
  I: IntoIterator<Item = &'a S>
{
  intervals
    .into_iter()
    .filter(|interval| {
      is_date_in_range(
        day,
        interval.start(),
        interval.end()
      )
    })
    .map(|interval| interval.owner())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOverlap<O> {
  pub date:   NaiveDate,
  pub people: BTreeSet<O>
}

/// Every day in `range` on which two or more distinct owners are away.
pub fn overlap_days<'a, S, I>(
  intervals: I,
  range: &DateRange
) -> Vec<DayOverlap<S::Owner>>
where
  S: OwnedSpan + 'a,
  I: IntoIterator<Item = &'a S>
{
  let mut by_day: BTreeMap<
    NaiveDate,
    BTreeSet<S::Owner>
  > = BTreeMap::new();

  for interval in intervals {
    let span = DateRange::spanning(
      interval.start(),
      interval.end()
    );
    let Some(visible) =
      span.clamp_to(range)
    else {
      continue;
    };
    for day in visible.days() {
      by_day
        .entry(day)
        .or_default()
        .insert(interval.owner());
    }
  }

  by_day
    .into_iter()
    .filter(|(_, people)| people.len() >= 2)
    .map(|(date, people)| DayOverlap {
      date,
      people
    })
    .collect()
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Year,
  Quarter,
  Month
}

impl ViewMode {
  pub fn all() -> [Self; 3] {
    [Self::Year, Self::Quarter, Self::Month]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Year => "year",
      | Self::Quarter => "quarter",
      | Self::Month => "month"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Year => "Year",
      | Self::Quarter => "Quarter",
      | Self::Month => "Month"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "year" => Some(Self::Year),
      | "quarter" => Some(Self::Quarter),
      | "month" => Some(Self::Month),
      | _ => None
    }
  }
}

pub fn calendar_date_window(
  view: ViewMode,
  focus: NaiveDate
) -> DateRange {
  match view {
    | ViewMode::Year => {
      DateRange::spanning(
        first_day_of_month(
          focus.year(),
          1
        ),
        last_day_of_month(
          focus.year(),
          12
        )
      )
    }
    | ViewMode::Quarter => {
      let quarter_start_month =
        (quarter_of(focus.month()) - 1)
          * 3
          + 1;
      DateRange::spanning(
        first_day_of_month(
          focus.year(),
          quarter_start_month
        ),
        last_day_of_month(
          focus.year(),
          quarter_start_month + 2
        )
      )
    }
    | ViewMode::Month => {
      DateRange::spanning(
        first_day_of_month(
          focus.year(),
          focus.month()
        ),
        last_day_of_month(
          focus.year(),
          focus.month()
        )
      )
    }
  }
}

/// Moves `focus` by `step` periods of `view`. `None` when the result is
/// outside the dates chrono can represent.
pub fn shift_focus(
  view: ViewMode,
  focus: NaiveDate,
  step: i32
) -> Option<NaiveDate> {
  match view {
    | ViewMode::Year => {
      shift_years(focus, step)
    }
    | ViewMode::Quarter => {
      shift_months(
        focus,
        i64::from(step) * 3
      )
    }
    | ViewMode::Month => {
      shift_months(
        focus,
        i64::from(step)
      )
    }
  }
}

fn shift_years(
  date: NaiveDate,
  years: i32
) -> Option<NaiveDate> {
  let year =
    date.year().checked_add(years)?;
  clamped_date(year, date.month(), date.day())
}

fn shift_months(
  date: NaiveDate,
  months: i64
) -> Option<NaiveDate> {
  let index = i64::from(date.year())
    * 12
    + i64::from(date.month0())
    + months;
  let year =
    i32::try_from(index.div_euclid(12))
      .ok()?;
  let month =
    index.rem_euclid(12) as u32 + 1;
  clamped_date(year, month, date.day())
}

/// `day` of a one-based `month`, pulled back to the month's last day.
pub(crate) fn clamped_date(
  year: i32,
  month: u32,
  day: u32
) -> Option<NaiveDate> {
  let last = days_in_month(
    month.checked_sub(1)?,
    year
  )?;
  NaiveDate::from_ymd_opt(
    year,
    month,
    day.min(last)
  )
}

pub fn title_for_view(
  view: ViewMode,
  focus: NaiveDate
) -> String {
  match view {
    | ViewMode::Year => {
      format!(
        "Year View {}",
        focus.year()
      )
    }
    | ViewMode::Quarter => {
      let quarter =
        quarter_of(focus.month());
      let window = calendar_date_window(
        view, focus
      );
      format!(
        "Quarter View Q{} {} ({}-{})",
        quarter,
        focus.year(),
        window.start().format("%b"),
        window.end().format("%b")
      )
    }
    | ViewMode::Month => {
      format!(
        "Month View {}",
        focus.format("%B %Y")
      )
    }
  }
}

/// Column of the 1st of the month when weeks begin on `week_start`.
pub fn first_weekday_offset(
  first: NaiveDate,
  week_start: Weekday
) -> usize {
  let day_idx = first
    .weekday()
    .num_days_from_monday();
  let start_idx =
    week_start.num_days_from_monday();
  ((7 + day_idx - start_idx) % 7) as usize
}

pub fn weekday_labels(
  week_start: Weekday
) -> [&'static str; 7] {
  const SUNDAY_FIRST: [&str; 7] =
    ["S", "M", "T", "W", "T", "F", "S"];
  const MONDAY_FIRST: [&str; 7] =
    ["M", "T", "W", "T", "F", "S", "S"];

  if week_start == Weekday::Sun {
    SUNDAY_FIRST
  } else {
    MONDAY_FIRST
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub year:       i32,
  pub month:      u32,
  pub week_start: Weekday,
  pub cells:      [Option<NaiveDate>; GRID_CELLS]
}

impl MonthGrid {
  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[Option<NaiveDate>]>
  {
    self.cells.chunks(7)
  }
}

/// Lays a one-based `month` out on the 6x7 grid.
pub fn month_grid(
  year: i32,
  month: u32,
  week_start: Weekday
) -> Option<MonthGrid> {
  let range = month_range(year, month)?;
  let offset = first_weekday_offset(
    range.start(),
    week_start
  );

  let mut cells = [None; GRID_CELLS];
  for (idx, day) in
    range.days().enumerate()
  {
    cells[offset + idx] = Some(day);
  }

  Some(MonthGrid {
    year,
    month,
    week_start,
    cells
  })
}

/// `None` when the offset leaves chrono's date range.
pub(crate) fn add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  Duration::try_days(days).and_then(
    |delta| date.checked_add_signed(delta)
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn span(
    start: NaiveDate,
    end: NaiveDate
  ) -> DateRange {
    DateRange::new(start, end)
      .expect("ordered span")
  }

  #[derive(Debug)]
  struct Away {
    who:  u8,
    span: DateRange
  }

  impl Span for Away {
    fn start(&self) -> NaiveDate {
      self.span.start()
    }

    fn end(&self) -> NaiveDate {
      self.span.end()
    }
  }

  impl OwnedSpan for Away {
    type Owner = u8;

    fn owner(&self) -> u8 {
      self.who
    }
  }

  #[test]
  fn february_follows_leap_rule() {
    assert_eq!(days_in_month(1, 2024), Some(29));
    assert_eq!(days_in_month(1, 2026), Some(28));
    assert_eq!(days_in_month(1, 1900), Some(28));
    assert_eq!(days_in_month(1, 2000), Some(29));
    assert_eq!(days_in_month(0, 2026), Some(31));
    assert_eq!(days_in_month(10, 2026), Some(30));
    assert_eq!(days_in_month(12, 2026), None);
  }

  #[test]
  fn range_membership_includes_both_ends() {
    let start = ymd(2026, 3, 10);
    let end = ymd(2026, 3, 15);
    assert!(is_date_in_range(start, start, end));
    assert!(is_date_in_range(end, start, end));
    assert!(!is_date_in_range(
      ymd(2026, 3, 9),
      start,
      end
    ));
    assert!(!is_date_in_range(
      ymd(2026, 3, 16),
      start,
      end
    ));
  }

  #[test]
  fn reversed_range_is_rejected() {
    let err = DateRange::new(
      ymd(2026, 3, 15),
      ymd(2026, 3, 10)
    )
    .expect_err("reversed");
    assert!(matches!(
      err,
      ValidationError::EndBeforeStart { .. }
    ));
  }

  #[test]
  fn overlap_filter_keeps_partial_overlaps_only() {
    let march = month_range(2026, 3)
      .expect("march");
    let intervals = vec![
      span(ymd(2026, 2, 1), ymd(2026, 2, 28)),
      span(ymd(2026, 2, 25), ymd(2026, 3, 2)),
      span(ymd(2026, 3, 10), ymd(2026, 3, 15)),
      span(ymd(2026, 3, 31), ymd(2026, 4, 3)),
      span(ymd(2026, 4, 1), ymd(2026, 4, 9)),
    ];

    let hits = intervals_overlapping_range(
      &intervals,
      march.start(),
      march.end()
    );

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].start(), ymd(2026, 2, 25));
    assert_eq!(hits[2].end(), ymd(2026, 4, 3));
  }

  #[test]
  fn march_bar_layout_matches_day_positions() {
    let interval =
      span(ymd(2026, 3, 10), ymd(2026, 3, 15));
    let layout = layout_percent(
      &interval,
      ymd(2026, 3, 1),
      ymd(2026, 3, 31),
      31
    )
    .expect("inside march");

    assert_eq!(layout.offset_day, 10);
    assert_eq!(layout.duration_days, 6);
    assert!((layout.left_pct - 900.0 / 31.0).abs() < 1e-9);
    assert!((layout.width_pct - 600.0 / 31.0).abs() < 1e-9);
  }

  #[test]
  fn bar_layout_clamps_to_range() {
    let interval =
      span(ymd(2026, 2, 20), ymd(2026, 3, 3));
    let layout = layout_percent(
      &interval,
      ymd(2026, 3, 1),
      ymd(2026, 3, 31),
      31
    )
    .expect("overlaps march");
    assert_eq!(layout.offset_day, 1);
    assert_eq!(layout.duration_days, 3);
    assert_eq!(layout.left_pct, 0.0);

    assert!(layout_percent(
      &span(ymd(2026, 4, 1), ymd(2026, 4, 2)),
      ymd(2026, 3, 1),
      ymd(2026, 3, 31),
      31
    )
    .is_none());
  }

  #[test]
  fn bar_columns_never_overflow() {
    let layout = BarLayout {
      offset_day:    31,
      duration_days: 1,
      left_pct:      30.0 / 31.0 * 100.0,
      width_pct:     1.0 / 31.0 * 100.0
    };
    let (left, len) = layout.to_columns(10);
    assert_eq!(left, 9);
    assert_eq!(len, 1);
  }

  #[test]
  fn overlap_days_need_two_distinct_people() {
    let away = vec![
      Away {
        who:  1,
        span: span(ymd(2026, 7, 1), ymd(2026, 7, 5))
      },
      Away {
        who:  1,
        span: span(ymd(2026, 7, 4), ymd(2026, 7, 6))
      },
      Away {
        who:  2,
        span: span(ymd(2026, 7, 5), ymd(2026, 7, 8))
      },
    ];
    let july = month_range(2026, 7).expect("july");

    let overlaps = overlap_days(&away, &july);
    let dates: Vec<NaiveDate> =
      overlaps.iter().map(|o| o.date).collect();
    assert_eq!(dates, vec![ymd(2026, 7, 5), ymd(2026, 7, 6)]);

    let on_fourth = people_on_day(&away, ymd(2026, 7, 4));
    assert_eq!(on_fourth.len(), 1);
  }

  #[test]
  fn month_grid_offsets_first_day() {
    // March 1st 2026 is a Sunday.
    let grid = month_grid(2026, 3, Weekday::Sun)
      .expect("grid");
    assert_eq!(grid.cells[0], Some(ymd(2026, 3, 1)));
    assert_eq!(grid.cells[30], Some(ymd(2026, 3, 31)));
    assert_eq!(grid.cells[31], None);

    let monday_grid =
      month_grid(2026, 3, Weekday::Mon).expect("grid");
    assert_eq!(monday_grid.cells[5], None);
    assert_eq!(monday_grid.cells[6], Some(ymd(2026, 3, 1)));
    assert_eq!(monday_grid.weeks().count(), 6);
  }

  #[test]
  fn quarter_window_and_title() {
    let focus = ymd(2026, 5, 20);
    let window = calendar_date_window(
      ViewMode::Quarter,
      focus
    );
    assert_eq!(window.start(), ymd(2026, 4, 1));
    assert_eq!(window.end(), ymd(2026, 6, 30));
    assert_eq!(
      title_for_view(ViewMode::Quarter, focus),
      "Quarter View Q2 2026 (Apr-Jun)"
    );
    assert_eq!(
      quarter_range(2026, 2),
      Some(window)
    );
  }

  #[test]
  fn shifting_focus_clamps_day_of_month() {
    let focus = ymd(2024, 2, 29);
    assert_eq!(
      shift_focus(ViewMode::Year, focus, 1),
      Some(ymd(2025, 2, 28))
    );
    assert_eq!(
      shift_focus(ViewMode::Month, ymd(2026, 1, 31), 1),
      Some(ymd(2026, 2, 28))
    );
    assert_eq!(
      shift_focus(ViewMode::Quarter, ymd(2026, 2, 10), -1),
      Some(ymd(2025, 11, 10))
    );
    assert_eq!(
      shift_focus(ViewMode::Month, ymd(2026, 12, 15), -24),
      Some(ymd(2024, 12, 15))
    );
  }

  #[test]
  fn shifting_focus_past_representable_dates_is_none() {
    let focus = ymd(2026, 3, 1);
    for view in ViewMode::all() {
      assert_eq!(shift_focus(view, focus, i32::MAX), None);
      assert_eq!(shift_focus(view, focus, i32::MIN), None);
    }
  }

  #[test]
  fn adding_days_beyond_chrono_range_is_none() {
    let today = ymd(2026, 2, 17);
    assert_eq!(add_days(today, 3), Some(ymd(2026, 2, 20)));
    assert_eq!(add_days(today, 200_000_000_000_000), None);
    assert_eq!(add_days(today, i64::MIN), None);
  }

  #[test]
  fn day_iterator_outlives_its_range() {
    let days: Vec<NaiveDate> = {
      let range = DateRange::new(
        ymd(2026, 3, 30),
        ymd(2026, 4, 1)
      )
      .expect("range");
      range.days()
    }
    .collect();
    assert_eq!(
      days,
      vec![
        ymd(2026, 3, 30),
        ymd(2026, 3, 31),
        ymd(2026, 4, 1)
      ]
    );
  }

  #[test]
  fn view_keys_round_trip() {
    for view in ViewMode::all() {
      assert_eq!(ViewMode::from_key(view.as_key()), Some(view));
    }
    assert_eq!(ViewMode::from_key("week"), None);
  }
}
