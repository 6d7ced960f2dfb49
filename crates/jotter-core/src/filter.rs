use chrono::NaiveDate;
use jotter_shared::NotesQuery;
use tracing::trace;

use crate::datetime::parse_date_input;

/// Search form state. Has no effect on
/// the collection until a search runs.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FilterState {
  pub title:     String,
  /// `YYYY-MM-DD` or empty.
  pub from_date: String,
  /// `YYYY-MM-DD` or empty.
  pub to_date:   String
}

impl FilterState {
  /// Builds a filter from user input.
  /// Date bounds accept anything
  /// `parse_date_input` understands and
  /// are stored normalized.
  #[tracing::instrument(skip(today))]
  pub fn parse(
    title: &str,
    from: &str,
    to: &str,
    today: NaiveDate
  ) -> anyhow::Result<Self> {
    let mut filter = Self {
      title: title.to_string(),
      ..Self::default()
    };
    filter.set_from(from, today)?;
    filter.set_to(to, today)?;
    Ok(filter)
  }

  pub fn set_title(
    &mut self,
    title: &str
  ) {
    self.title = title.to_string();
  }

  pub fn set_from(
    &mut self,
    raw: &str,
    today: NaiveDate
  ) -> anyhow::Result<()> {
    self.from_date =
      normalize_bound(raw, today)?;
    Ok(())
  }

  pub fn set_to(
    &mut self,
    raw: &str,
    today: NaiveDate
  ) -> anyhow::Result<()> {
    self.to_date =
      normalize_bound(raw, today)?;
    Ok(())
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_empty()
      && self.from_date.is_empty()
      && self.to_date.is_empty()
  }

  /// The server does the actual
  /// filtering; this only carries the
  /// parameters across.
  pub fn to_query(&self) -> NotesQuery {
    let query = NotesQuery {
      title:     self.title.clone(),
      from_date: self.from_date.clone(),
      end_date:  self.to_date.clone()
    };
    trace!(?query, "built notes query");
    query
  }
}

fn normalize_bound(
  raw: &str,
  today: NaiveDate
) -> anyhow::Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Ok(String::new());
  }
  let date =
    parse_date_input(trimmed, today)?;
  Ok(
    date.format("%Y-%m-%d").to_string()
  )
}
