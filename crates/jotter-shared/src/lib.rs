use std::collections::BTreeMap;
use std::fmt;

use serde::{
  Deserialize,
  Serialize
};

/// Server-assigned note identifier.
/// Opaque to the client: it is only
/// ever copied out of a response.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
  pub fn new(
    raw: impl Into<String>
  ) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for NoteId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Note {
  pub id:          NoteId,
  #[serde(default)]
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(
    rename = "createdAt",
    default
  )]
  pub created_at:  Option<String>,
  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

/// Request body for `POST /notes` and
/// `PUT /notes/{id}`. Nothing else is
/// ever sent.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct NoteBody {
  pub title:       String,
  pub description: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct NotesQuery {
  pub title:     String,
  pub from_date: String,
  pub end_date:  String
}

impl NotesQuery {
  /// Query pairs in wire order. `title`
  /// is always present, the date bounds
  /// only when non-empty.
  pub fn to_pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = vec![(
      "title",
      self.title.clone()
    )];
    if !self.from_date.is_empty() {
      pairs.push((
        "fromDate",
        self.from_date.clone()
      ));
    }
    if !self.end_date.is_empty() {
      pairs.push((
        "endDate",
        self.end_date.clone()
      ));
    }
    pairs
  }

  pub fn is_unfiltered(&self) -> bool {
    self.title.is_empty()
      && self.from_date.is_empty()
      && self.end_date.is_empty()
  }
}
