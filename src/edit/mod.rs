//! In-place editors for Beamer sources.
//!
//! Every editor lexes the source, decides where its changes go, and splices them into the original text.
//! Nothing outside of the touched spans is ever rewritten, so the diff of an edited lesson stays readable.
//!
//! Editors are idempotent: running one over its own output changes nothing.

mod bottomnote;
mod dividers;
mod options;
mod widths;

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::lexer::LexError;

pub use bottomnote::{AddBottomnotes, NoteSource};
pub use dividers::{AddSectionDividers, DEFAULT_DIVIDER};
pub use options::{AddFrameOption, OptionCondition};
pub use widths::{ChartFilter, NormalizeChartWidths};

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum EditError {
    #[error("{}", .0)]
    Lex(LexError),
    #[error("Chart width must be within (0, 1], got {}", .0)]
    #[from(ignore)]
    InvalidWidth(f32),
    #[error("Bad frame pattern: {}", .0)]
    Pattern(regex::Error),
    #[error("Frame option must be a single non-empty option, got {:?}", .0)]
    #[from(ignore)]
    InvalidOption(String),
    #[error("{}", .0)]
    Io(std::io::Error),
}

#[derive(Debug)]
pub struct Edited<'source> {
    pub text: Cow<'source, str>,
    pub changes: usize,
}

impl<'source> Edited<'source> {
    pub fn unchanged(source: &'source str) -> Self {
        Self {
            text: Cow::Borrowed(source),
            changes: 0,
        }
    }
}

pub trait Edit {
    fn name(&self) -> &'static str;

    fn apply<'source>(&self, source: &'source str) -> Result<Edited<'source>, EditError>;
}

#[derive(Debug)]
pub struct FileEdit {
    pub path: PathBuf,
    /// Change count of each edit, in order of application
    pub changes: Vec<(&'static str, usize)>,
    pub written: bool,
}

impl FileEdit {
    pub fn total(&self) -> usize {
        self.changes.iter().map(|(_, count)| count).sum()
    }
}

/// Applies edits one after another, writing the file only if anything changed
pub fn edit_file(
    path: &Path,
    edits: &[&dyn Edit],
    dry_run: bool,
) -> Result<FileEdit, EditError> {
    let original = std::fs::read_to_string(path)?;
    let mut current = original.clone();
    let mut changes = Vec::with_capacity(edits.len());
    for edit in edits {
        let edited = edit.apply(&current)?;
        debug!("{}: {} change(s) by {}", path.display(), edited.changes, edit.name());
        changes.push((edit.name(), edited.changes));
        if let Cow::Owned(text) = edited.text {
            current = text;
        }
    }
    let written = !dry_run && current != original;
    if written {
        std::fs::write(path, current)?;
    }
    Ok(FileEdit {
        path: path.to_owned(),
        changes,
        written,
    })
}

#[derive(Debug, Default)]
pub struct EditSummary {
    pub files: Vec<FileEdit>,
    pub failed: Vec<(PathBuf, EditError)>,
}

impl EditSummary {
    pub fn total_changes(&self) -> usize {
        self.files.iter().map(FileEdit::total).sum()
    }
}

/// Batch version of [`edit_file`]: missing or broken files are recorded and skipped
pub fn edit_files<'p>(
    paths: impl IntoIterator<Item = &'p Path>,
    edits: &[&dyn Edit],
    dry_run: bool,
) -> EditSummary {
    let mut summary = EditSummary::default();
    for path in paths {
        if !path.is_file() {
            warn!("Skipping {}: file not found", path.display());
            summary.failed.push((
                path.to_owned(),
                std::io::Error::from(std::io::ErrorKind::NotFound).into(),
            ));
            continue;
        }
        match edit_file(path, edits, dry_run) {
            Ok(file) => summary.files.push(file),
            Err(err) => {
                warn!("Skipping {}: {err}", path.display());
                summary.failed.push((path.to_owned(), err));
            }
        }
    }
    info!(
        "{} change(s) across {} file(s){}",
        summary.total_changes(),
        summary.files.len(),
        if dry_run { " (dry run)" } else { "" }
    );
    summary
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn chain_and_write() {
        // arrange
        let dir = tempfile::tempdir().expect("Should be able to create temp dir");
        let path = dir.path().join("lesson_01.tex");
        std::fs::write(
            &path,
            "\\begin{frame}{Ledger}\n\\includegraphics[width=5cm]{figures/ledger.pdf}\n\\end{frame}\n",
        )
        .unwrap();
        let widths = NormalizeChartWidths::new(0.8, ChartFilter::Charts).unwrap();
        let notes = AddBottomnotes::new(NoteSource::fallback("Every ledger is a list of claims"));

        // act
        let report = edit_file(&path, &[&widths, &notes], false).expect("Should be able to edit");

        // assert
        assert!(report.written);
        assert_eq!(report.changes, vec![("widths", 1), ("bottomnotes", 1)]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "\\begin{frame}{Ledger}\n\\includegraphics[width=0.8\\textwidth]{figures/ledger.pdf}\n\\bottomnote{Every ledger is a list of claims}\n\\end{frame}\n"
        );
    }

    #[test]
    fn dry_run_keeps_file() {
        // arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson_01.tex");
        let source = "\\begin{frame}{A}\n\\end{frame}\n";
        std::fs::write(&path, source).unwrap();
        let notes = AddBottomnotes::new(NoteSource::fallback("{title}!"));

        // act
        let report = edit_file(&path, &[&notes], true).expect("Should be able to edit");

        // assert
        assert!(!report.written);
        assert_eq!(report.total(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn missing_files_are_skipped() {
        // arrange
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.tex");
        std::fs::write(&present, "\\begin{frame}{A}\n\\end{frame}\n").unwrap();
        let missing = dir.path().join("missing.tex");
        let notes = AddBottomnotes::new(NoteSource::fallback("note"));

        // act
        let summary = edit_files([present.as_path(), missing.as_path()], &[&notes], false);

        // assert
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, missing);
        assert_eq!(summary.total_changes(), 1);
    }
}
