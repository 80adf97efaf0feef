//! *Slides are forged, not written. Well, at least these ones are.*
//!
//! This crate runs the production line of a Beamer-based lecture course:
//! charts are drawn from declarative specs, lesson sources get their recurring chores applied
//! (bottomnotes, section dividers, chart widths, frame options), decks are compiled with `pdflatex`,
//! audited for pedagogical completeness, and finally shelved into a GitHub Pages folder.
//!
//! # Ideology
//! There is no LaTeX parser in here, and there is not supposed to be one. Beamer sources are *semi*-structured at best,
//! so the only thing ever extracted from them is frame and section boundaries (see [`lex`]).
//! Everything else is a pattern match against a frame's body, and is allowed to be best-effort.
//!
//! What *is* strict:
//! - edits never rewrite text they have no business in. Each edit is a set of splices against the original source;
//! - edits are idempotent. Running the whole chain twice is the same as running it once;
//! - a single broken file never stops a batch. It is reported, and the batch moves on.
//!
//! ### Paths
//! Course layout follows a fixed convention (`module_NN_*/lesson_*.tex`, `module_NN_*/figures/`, `slides/`, `docs/slides/`),
//! but it is always resolved relative to a course root, never hard-coded.

/// Compiles a regex once, on first use
macro_rules! regex {
    ($regex:literal) => {{
        const STR: &'static str = $regex;
        static REGEX: ::once_cell::sync::Lazy<::regex::Regex> =
            ::once_cell::sync::Lazy::new(|| ::regex::Regex::new(STR).expect("Should be a valid regex"));
        &*REGEX
    }};
}

pub mod audit;
pub mod chart;
pub mod compile;
pub mod config;
/// This module defines types that are used to represent parsed data
pub mod data;
pub mod edit;
mod gen;
pub mod layout;
pub mod lexer;
pub mod pages;

/// This module houses "utility-like" structs and functions.
mod util;

/// Reexports
pub use gen::{
    lesson::{BeamerLesson, FrameSpec, LessonSpec, SectionSpec},
    GenerationError, OutputGenerator,
};
pub use lexer::lex;
pub use util::FmtToIo;

/// Everything that can abort a command, as opposed to being reported per file
#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum Error {
    #[error("{}", .0)]
    Config(config::ConfigError),
    #[error("{}", .0)]
    Layout(layout::LayoutError),
    #[error("{}", .0)]
    Edit(edit::EditError),
    #[error("{}", .0)]
    Compile(compile::CompileError),
    #[error("{}", .0)]
    Chart(chart::ChartError),
    #[error("{}", .0)]
    Pages(pages::PagesError),
    #[error("{}", .0)]
    Generation(GenerationError),
    #[error("{}", .0)]
    Io(std::io::Error),
    #[error("{}", .0)]
    Json(serde_json::Error),
}
