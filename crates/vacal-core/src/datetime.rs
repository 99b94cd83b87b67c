use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Local,
  NaiveDate,
  Weekday
};
use std::sync::LazyLock;

use regex::Regex;

use crate::calendar::{
  Span,
  add_days
};

static RELATIVE_RE: LazyLock<
  Option<Regex>
> = LazyLock::new(|| {
  Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .ok()
});

/// Today's date on the local clock.
pub fn today_local() -> NaiveDate {
  Local::now().date_naive()
}

/// `Mar 10`
pub fn format_short_date(
  date: NaiveDate
) -> String {
  date.format("%b %-d").to_string()
}

/// `Mar 10 - Mar 15`
pub fn format_span<S: Span>(
  span: &S
) -> String {
  format!(
    "{} - {}",
    format_short_date(span.start()),
    format_short_date(span.end())
  )
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return offset_date(today, 1);
    }
    | "yesterday" => {
      return offset_date(today, -1);
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today,
      target_weekday
    )
    .ok_or_else(|| {
      anyhow!("date out of range")
    });
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if target_month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  let rel_re =
    RELATIVE_RE.as_ref().ok_or_else(
      || {
        anyhow!(
          "internal regex compile \
           failure"
        )
      }
    )?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let days = match unit {
      | "d" => num,
      | "w" => num.saturating_mul(7),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ))
      }
    };

    return offset_date(
      today,
      if sign == "-" { -days } else { days }
    );
  }

  for fmt in ["%Y-%m-%d", "%Y%m%d"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Ok(date);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     month names (e.g. march), \
     +Nd/-Nd/+Nw/-Nw, YYYY-MM-DD, \
     YYYYMMDD"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

pub(crate) fn parse_week_start(
  token: &str
) -> Option<Weekday> {
  match parse_weekday_name(
    &token.to_ascii_lowercase()
  ) {
    | Some(day @ (Weekday::Sun | Weekday::Mon)) => {
      Some(day)
    }
    | _ => None
  }
}

fn offset_date(
  today: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  add_days(today, days).ok_or_else(|| {
    anyhow!(
      "date out of range: {days} day(s) \
       from {today}"
    )
  })
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> Option<NaiveDate> {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
