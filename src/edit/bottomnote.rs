use std::collections::HashMap;

use itertools::Itertools;
use log::debug;

use crate::{
    data::BOTTOMNOTE,
    lexer::lex,
    util::{fill_title, line_indent, Splice},
};

use super::{Edit, EditError, Edited};

/// Where bottomnote text comes from: an explicit title map first, then an optional template
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NoteSource {
    notes: HashMap<String, String>,
    fallback: Option<String>,
}

fn normalize_title(title: &str) -> String {
    title.split_whitespace().join(" ")
}

impl NoteSource {
    pub fn new(notes: HashMap<String, String>, fallback: Option<String>) -> Self {
        Self {
            notes: notes
                .into_iter()
                .map(|(title, note)| (normalize_title(&title), note))
                .collect(),
            fallback,
        }
    }

    pub fn fallback(template: impl Into<String>) -> Self {
        Self::new(HashMap::new(), Some(template.into()))
    }

    /// Reads a flat TOML table of `"Frame title" = "note"` pairs
    pub fn from_toml(text: &str, fallback: Option<String>) -> Result<Self, toml::de::Error> {
        let notes: HashMap<String, String> = toml::from_str(text)?;
        Ok(Self::new(notes, fallback))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.fallback.is_none()
    }

    pub fn resolve(&self, title: Option<&str>) -> Option<String> {
        if let Some(note) = title.and_then(|title| self.notes.get(&normalize_title(title))) {
            return Some(note.clone());
        }
        let template = self.fallback.as_ref()?;
        match title {
            Some(title) => Some(fill_title(template, title)),
            // a title template can't be filled without a title
            None if template.contains("{title}") => None,
            None => Some(template.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddBottomnotes {
    notes: NoteSource,
    include_plain: bool,
}

impl AddBottomnotes {
    pub fn new(notes: NoteSource) -> Self {
        Self {
            notes,
            include_plain: false,
        }
    }

    pub fn include_plain(mut self, include_plain: bool) -> Self {
        self.include_plain = include_plain;
        self
    }
}

impl Edit for AddBottomnotes {
    fn name(&self) -> &'static str {
        "bottomnotes"
    }

    fn apply<'source>(&self, source: &'source str) -> Result<Edited<'source>, EditError> {
        let document = lex(source)?;
        let mut splice = Splice::new();
        for frame in document.frames() {
            if frame.has_bottomnote() || (frame.is_plain() && !self.include_plain) {
                continue;
            }
            let Some(note) = self.notes.resolve(frame.title) else {
                debug!("No bottomnote for frame at line {}", frame.line);
                continue;
            };
            let end = frame.end_marker_offset();
            match line_indent(source, end) {
                Some((line_start, indent)) => {
                    splice.insert(line_start, format!("{indent}{BOTTOMNOTE}{note}}}\n"))
                }
                None => splice.insert(end, format!("\n{BOTTOMNOTE}{note}}}\n")),
            }
        }
        if splice.is_empty() {
            return Ok(Edited::unchanged(source));
        }
        let changes = splice.len();
        Ok(Edited {
            text: splice.apply(source),
            changes,
        })
    }
}
