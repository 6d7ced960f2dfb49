use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use jotter_shared::{Note, NoteId};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::{DisplayZone, format_created_at};
use crate::paginate::PageWindow;

const DESCRIPTION_WIDTH: usize = 48;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    zone: DisplayZone,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let zone = DisplayZone::from_config(cfg)?;

        Ok(Self { color, zone })
    }

    pub fn plain(zone: DisplayZone) -> Self {
        Self { color: false, zone }
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// One page of notes. Rows are numbered from 1 within the page; the
    /// note in edit mode is marked with `*`.
    #[tracing::instrument(skip(self, out, notes, editing))]
    pub fn write_page<W: Write>(
        &self,
        mut out: W,
        notes: &[Note],
        window: PageWindow,
        editing: Option<&NoteId>,
    ) -> anyhow::Result<()> {
        if notes.is_empty() {
            writeln!(out, "No notes.")?;
        } else {
            let headers = vec![
                "#".to_string(),
                "Title".to_string(),
                "Description".to_string(),
                "Created".to_string(),
            ];

            let rows = notes
                .iter()
                .enumerate()
                .map(|(idx, note)| {
                    let marker = if editing == Some(&note.id) { "*" } else { "" };
                    vec![
                        self.paint(&format!("{}{marker}", idx + 1), "33"),
                        note.title.clone(),
                        truncate(&note.description, DESCRIPTION_WIDTH),
                        format_created_at(note.created_at.as_deref(), self.zone),
                    ]
                })
                .collect();

            write_table(&mut out, headers, rows)?;
        }

        let total = window.total_pages();
        writeln!(
            out,
            "page {} of {} ({} notes)",
            if total == 0 { 0 } else { window.page },
            total,
            window.len
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, note))]
    pub fn write_note_info<W: Write>(&self, mut out: W, note: &Note) -> anyhow::Result<()> {
        writeln!(out, "id          {}", note.id)?;
        writeln!(out, "title       {}", note.title)?;
        writeln!(out, "description {}", note.description)?;
        writeln!(
            out,
            "created     {}",
            format_created_at(note.created_at.as_deref(), self.zone)
        )?;
        for (key, value) in &note.extra {
            writeln!(out, "{key:<11} {value}")?;
        }

        Ok(())
    }

    pub fn alert(&self, message: &str) {
        eprintln!("{}", self.paint(message, "31"));
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if UnicodeWidthStr::width(flat.as_str()) <= max {
        return flat;
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in flat.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.push('…');
    out
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

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
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
