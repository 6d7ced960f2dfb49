use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Days,
  Local,
  Months,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::Config;

/// Where `createdAt` timestamps are
/// shown.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DisplayZone {
  Local,
  Named(Tz)
}

impl DisplayZone {
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let raw = cfg
      .get("display.timezone")
      .unwrap_or_else(|| {
        "local".to_string()
      });
    parse_display_zone(&raw)
  }

  pub fn today(self) -> NaiveDate {
    let now = Utc::now();
    match self {
      | DisplayZone::Local => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | DisplayZone::Named(tz) => {
        now.with_timezone(&tz).date_naive()
      }
    }
  }
}

pub fn parse_display_zone(
  raw: &str
) -> anyhow::Result<DisplayZone> {
  let trimmed = raw.trim();
  if trimmed.is_empty()
    || trimmed
      .eq_ignore_ascii_case("local")
  {
    return Ok(DisplayZone::Local);
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        timezone = %trimmed,
        "using configured display timezone"
      );
      Ok(DisplayZone::Named(tz))
    }
    | Err(err) => Err(anyhow!(
      "invalid display.timezone \
       {trimmed}: {err}"
    ))
  }
}

/// Renders a server `createdAt`
/// timestamp. Values that do not parse
/// as RFC 3339 are shown verbatim.
#[must_use]
pub fn format_created_at(
  raw: Option<&str>,
  zone: DisplayZone
) -> String {
  let Some(raw) = raw else {
    return String::new();
  };
  let Ok(parsed) =
    DateTime::parse_from_rfc3339(raw)
  else {
    tracing::trace!(
      raw,
      "unparsable createdAt; showing raw"
    );
    return raw.to_string();
  };

  let utc = parsed.with_timezone(&Utc);
  match zone {
    | DisplayZone::Local => {
      utc
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
    }
    | DisplayZone::Named(tz) => {
      utc
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M")
        .to_string()
    }
  }
}

fn relative_re() -> &'static Regex {
  static RELATIVE: OnceLock<Regex> =
    OnceLock::new();
  RELATIVE.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
    )
    .unwrap_or_else(|err| {
      unreachable!(
        "static regex failed: {err}"
      )
    })
  })
}

/// Accepts `YYYY-MM-DD`, `today`,
/// `yesterday`, `tomorrow`, and
/// relative offsets such as `-7d`,
/// `+2w`, `-1m`.
#[tracing::instrument(skip(today))]
pub fn parse_date_input(
  raw: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let lower =
    raw.trim().to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      &lower, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  let caps = relative_re()
    .captures(&lower)
    .ok_or_else(|| {
      anyhow!(
        "unrecognized date: {raw} \
         (expected YYYY-MM-DD, today, \
         or an offset like -7d)"
      )
    })?;

  let num: u32 = caps["num"]
    .parse()
    .map_err(|_| {
      anyhow!("offset too large: {raw}")
    })?;
  let forward = &caps["sign"] == "+";

  let shifted = match &caps["unit"] {
    | "d" | "w" => {
      let days = if &caps["unit"] == "w"
      {
        u64::from(num) * 7
      } else {
        u64::from(num)
      };
      if forward {
        today.checked_add_days(
          Days::new(days)
        )
      } else {
        today.checked_sub_days(
          Days::new(days)
        )
      }
    }
    | _ => {
      if forward {
        today.checked_add_months(
          Months::new(num)
        )
      } else {
        today.checked_sub_months(
          Months::new(num)
        )
      }
    }
  };

  shifted.ok_or_else(|| {
    anyhow!("date out of range: {raw}")
  })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    DisplayZone,
    format_created_at,
    parse_date_input,
    parse_display_zone
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 31)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_dates() {
    assert_eq!(
      parse_date_input(
        "2025-12-01",
        today()
      )
      .expect("parse"),
      NaiveDate::from_ymd_opt(
        2025, 12, 1
      )
      .expect("valid date")
    );
  }

  #[test]
  fn parses_named_and_relative_days() {
    let yesterday =
      parse_date_input("Yesterday", today())
        .expect("parse yesterday");
    assert_eq!(
      yesterday.to_string(),
      "2026-03-30"
    );

    let two_weeks =
      parse_date_input("+2w", today())
        .expect("parse +2w");
    assert_eq!(
      two_weeks.to_string(),
      "2026-04-14"
    );

    let month_back =
      parse_date_input("-1m", today())
        .expect("parse -1m");
    assert_eq!(
      month_back.to_string(),
      "2026-02-28"
    );
  }

  #[test]
  fn rejects_unknown_input() {
    assert!(
      parse_date_input("soon", today())
        .is_err()
    );
    assert!(
      parse_date_input(
        "2026-02-30",
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn formats_created_at_in_named_zone()
  {
    let zone =
      parse_display_zone("Asia/Tokyo")
        .expect("zone");
    assert_eq!(
      format_created_at(
        Some("2025-03-01T10:00:00.000Z"),
        zone
      ),
      "2025-03-01 19:00"
    );
    assert_eq!(
      format_created_at(
        Some("yesterday-ish"),
        zone
      ),
      "yesterday-ish"
    );
    assert_eq!(
      format_created_at(None, zone),
      ""
    );
  }

  #[test]
  fn local_is_the_default_zone() {
    assert_eq!(
      parse_display_zone("")
        .expect("zone"),
      DisplayZone::Local
    );
    assert!(
      parse_display_zone("Mars/Olympus")
        .is_err()
    );
  }
}
