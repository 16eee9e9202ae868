use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  Local,
  Month,
  NaiveDate,
  Weekday
};
use regex::Regex;

const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";
const TRIGGER_DATE_FORMAT: &str =
  "%a %b %d %Y";

/// Today's date on the local wall
/// clock. Time of day is dropped.
#[must_use]
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

#[must_use]
pub fn format_iso(
  date: NaiveDate
) -> String {
  date
    .format(ISO_DATE_FORMAT)
    .to_string()
}

/// `Fri Mar 08 2024`, the label used
/// on the trigger button.
#[must_use]
pub fn format_trigger_date(
  date: NaiveDate
) -> String {
  date
    .format(TRIGGER_DATE_FORMAT)
    .to_string()
}

#[must_use]
pub fn month_from_number(
  number: u32
) -> Option<Month> {
  u8::try_from(number)
    .ok()
    .and_then(|n| {
      Month::try_from(n).ok()
    })
}

pub fn first_day_of_month(
  year: i32,
  month: Month
) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(
    year,
    month.number_from_month(),
    1
  )
}

pub fn last_day_of_month(
  year: i32,
  month: Month
) -> Option<NaiveDate> {
  let (next_year, next_month) =
    shift_month(year, month, 1);
  first_day_of_month(
    next_year, next_month
  )?
  .pred_opt()
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: Month
) -> u32 {
  last_day_of_month(year, month)
    .map(|date| date.day())
    .unwrap_or(0)
}

/// Moves a (year, month) pair by
/// `step` months, carrying into the
/// year at December/January.
#[must_use]
pub fn shift_month(
  year: i32,
  month: Month,
  step: i32
) -> (i32, Month) {
  let zero_based =
    month.number_from_month() as i32
      - 1
      + step;
  let year = year.saturating_add(
    zero_based.div_euclid(12)
  );
  let index =
    zero_based.rem_euclid(12) as u32;
  let month = month_from_number(
    index + 1
  )
  .unwrap_or(Month::January);
  (year, month)
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

#[must_use]
pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

#[must_use]
pub fn is_weekend(
  date: NaiveDate
) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

/// Every Saturday and Sunday in
/// `[start, end]`, ascending. Empty
/// when `end < start`.
#[must_use]
pub fn weekends_between(
  start: NaiveDate,
  end: NaiveDate
) -> Vec<NaiveDate> {
  start
    .iter_days()
    .take_while(|day| *day <= end)
    .filter(|day| is_weekend(*day))
    .collect()
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
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

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
        ));
      }
    };

    let delta = Duration::try_days(
      if sign == "-" {
        -days
      } else {
        days
      }
    )
    .ok_or_else(|| {
      anyhow!(
        "relative offset out of \
         range: {token}"
      )
    })?;

    return today
      .checked_add_signed(delta)
      .ok_or_else(|| {
        anyhow!(
          "relative date out of \
           range: {token}"
        )
      });
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token,
      ISO_DATE_FORMAT
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/-Nd/+Nw/-Nw, YYYY-MM-DD"
  })
}

/// Parses a month view target:
/// `YYYY-MM`, or a month name which
/// keeps the year of `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<(i32, Month)> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  if let Some(number) =
    parse_month_name(&lower)
  {
    let month =
      month_from_number(number)
        .ok_or_else(|| {
          anyhow!(
            "invalid month value: \
             {number}"
          )
        })?;
    return Ok((today.year(), month));
  }

  let ym_re = Regex::new(r"^(?P<year>-?\d{1,6})-(?P<month>\d{1,2})$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
  let caps =
    ym_re.captures(token).ok_or_else(
      || {
        anyhow!(
          "unrecognized month \
           expression: {input} \
           (expected YYYY-MM or a \
           month name)"
        )
      }
    )?;

  let year: i32 = caps
    .name("year")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse()
    .context("invalid year")?;
  let number: u32 = caps
    .name("month")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse()
    .context("invalid month")?;
  let month = month_from_number(
    number
  )
  .ok_or_else(|| {
    anyhow!(
      "month out of range 1-12: \
       {number}"
    )
  })?;

  if first_day_of_month(year, month)
    .is_none()
  {
    return Err(anyhow!(
      "year out of calendar range: \
       {year}"
    ));
  }

  Ok((year, month))
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

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
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
