//! Shelves compiled decks into the GitHub Pages folder.
//!
//! Layout produced, under the pages directory:
//! ```text
//! manifest.json
//! index.md
//! module_01/lesson_01_cards.pdf
//! module_02/...
//! ```

use std::{
    fmt::Write,
    io,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    layout::{CourseLayout, LayoutError, ModuleDir},
    lexer::command_argument,
};

pub const MANIFEST: &str = "manifest.json";
pub const INDEX: &str = "index.md";

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum PagesError {
    #[error("{}", .0)]
    Io(io::Error),
    #[error("{}", .0)]
    Layout(LayoutError),
    #[error("{}", .0)]
    Json(serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub module: u32,
    pub module_name: String,
    pub lesson: String,
    pub title: Option<String>,
    /// Relative to the pages directory
    pub href: String,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct PagesReport {
    pub entries: Vec<ManifestEntry>,
    /// Lessons without a compiled PDF
    pub missing: Vec<PathBuf>,
    pub manifest: PathBuf,
    pub index: PathBuf,
}

/// `\title{...}` of a lesson, if it has one
pub fn lesson_title(source: &str) -> Option<String> {
    let title = command_argument(source, "\\title")?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!title.is_empty()).then_some(title)
}

/// Next to the source first, then in `slides/`
pub fn find_pdf(layout: &CourseLayout, tex: &Path) -> Option<PathBuf> {
    let name = tex.with_extension("pdf");
    let beside = name.clone();
    let slides = layout.slides_dir().join(name.file_name()?);
    [beside, slides].into_iter().find(|pdf| pdf.is_file())
}

/// `module_01_digital_payments` is "Module 01: Digital payments"
pub fn module_heading(module: &ModuleDir) -> String {
    let topic = module
        .name
        .splitn(3, '_')
        .nth(2)
        .map(|rest| rest.replace('_', " "))
        .filter(|rest| !rest.trim().is_empty());
    match topic {
        Some(topic) => {
            let mut chars = topic.trim().chars();
            let capitalized: String = chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default();
            format!("Module {:02}: {capitalized}", module.number)
        }
        None => format!("Module {:02}", module.number),
    }
}

pub fn render_index(modules: &[ModuleDir], entries: &[ManifestEntry]) -> String {
    let mut out = String::from("# Slides\n");
    for module in modules {
        let lessons: Vec<_> = entries
            .iter()
            .filter(|entry| entry.module == module.number)
            .collect();
        if lessons.is_empty() {
            continue;
        }
        // writing into a String can't fail
        let _ = write!(out, "\n## {}\n\n", module_heading(module));
        for entry in lessons {
            let _ = writeln!(
                out,
                "- [{}]({})",
                entry.title.as_deref().unwrap_or(&entry.lesson),
                entry.href
            );
        }
    }
    out
}

fn href(pages_dir: &Path, target: &Path) -> String {
    let relative = pathdiff::diff_paths(target, pages_dir).unwrap_or_else(|| target.to_owned());
    // hrefs use forward slashes, whatever the platform
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn organize(layout: &CourseLayout, module_filter: Option<u32>) -> Result<PagesReport, PagesError> {
    let pages_dir = layout.pages_dir().to_owned();
    let modules = layout.select_modules(module_filter)?;
    let mut report = PagesReport {
        manifest: pages_dir.join(MANIFEST),
        index: pages_dir.join(INDEX),
        ..Default::default()
    };
    for module in &modules {
        let target_dir = pages_dir.join(format!("module_{:02}", module.number));
        for tex in layout.lessons(module)? {
            let Some(pdf) = find_pdf(layout, &tex) else {
                warn!("No PDF for {}", tex.display());
                report.missing.push(tex);
                continue;
            };
            let stem = tex
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            std::fs::create_dir_all(&target_dir)?;
            let target = target_dir.join(format!("{stem}.pdf"));
            let bytes = std::fs::copy(&pdf, &target)?;
            debug!("{} -> {}", pdf.display(), target.display());
            let title = match std::fs::read_to_string(&tex) {
                Ok(source) => lesson_title(&source),
                Err(e) => {
                    warn!("Could not read {}: {e}", tex.display());
                    None
                }
            };
            report.entries.push(ManifestEntry {
                module: module.number,
                module_name: module.name.clone(),
                lesson: stem,
                title,
                href: href(&pages_dir, &target),
                bytes,
            });
        }
    }

    std::fs::create_dir_all(&pages_dir)?;
    std::fs::write(&report.manifest, serde_json::to_string_pretty(&report.entries)?)?;
    std::fs::write(&report.index, render_index(&modules, &report.entries))?;
    info!(
        "{} deck(s) published to {}, {} missing",
        report.entries.len(),
        pages_dir.display(),
        report.missing.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! title {
        {$name:ident, $input:literal, $output:expr} => {
            #[test]
            fn $name() {
                assert_eq!(lesson_title($input).as_deref(), $output);
            }
        };
    }

    title! {simple_title, "\\title{Card rails}\n\\begin{document}", Some("Card rails")}
    title! {short_title, "\\title[Cards]{Card\n   rails}", Some("Card rails")}
    title! {no_title, "\\begin{document}", None}
    title! {empty_title, "\\title{ }", None}
    title! {nested_title, "\\title{The \\textit{real} cost of payments}", Some("The \\textit{real} cost of payments")}
    title! {commented_title, "% \\title{Old draft}\n\\title{Card rails}", Some("Card rails")}
    title! {escaped_percent_title, "\\title{Fees of 2\\% and more}", Some("Fees of 2\\% and more")}
    title! {titlepage_ignored, "\\titlepage\n\\title{Card rails}", Some("Card rails")}
    title! {unclosed_title, "\\title{Card rails", None}

    fn module(number: u32, name: &str) -> ModuleDir {
        ModuleDir {
            number,
            name: name.into(),
            path: PathBuf::from(name),
        }
    }

    #[test]
    fn headings() {
        assert_eq!(module_heading(&module(1, "module_01_digital_payments")), "Module 01: Digital payments");
        assert_eq!(module_heading(&module(2, "module_02")), "Module 02");
    }

    #[test]
    fn index() {
        // arrange
        let modules = [module(1, "module_01_cards"), module(2, "module_02_empty")];
        let entries = [
            ManifestEntry {
                module: 1,
                module_name: "module_01_cards".into(),
                lesson: "lesson_01".into(),
                title: Some("Card rails".into()),
                href: "module_01/lesson_01.pdf".into(),
                bytes: 1,
            },
            ManifestEntry {
                module: 1,
                module_name: "module_01_cards".into(),
                lesson: "lesson_02".into(),
                title: None,
                href: "module_01/lesson_02.pdf".into(),
                bytes: 1,
            },
        ];

        // act
        let index = render_index(&modules, &entries);

        // assert
        assert_eq!(
            index,
            "# Slides\n\n## Module 01: Cards\n\n- [Card rails](module_01/lesson_01.pdf)\n- [lesson_02](module_01/lesson_02.pdf)\n"
        );
    }

    #[test]
    fn organize_course() {
        // arrange
        let root = tempfile::tempdir().unwrap();
        let module = root.path().join("module_01_cards");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::create_dir_all(root.path().join("slides")).unwrap();
        std::fs::write(module.join("lesson_01_rails.tex"), "\\title{Card rails}").unwrap();
        std::fs::write(module.join("lesson_01_rails.pdf"), "%PDF-1").unwrap();
        std::fs::write(module.join("lesson_02_fees.tex"), "").unwrap();
        std::fs::write(root.path().join("slides/lesson_02_fees.pdf"), "%PDF-12").unwrap();
        std::fs::write(module.join("lesson_03_draft.tex"), "").unwrap();
        let layout = CourseLayout::new(root.path());

        // act
        let report = organize(&layout, None).expect("Should be able to organize");

        // assert
        let pages = root.path().join("docs/slides");
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.missing, vec![module.join("lesson_03_draft.tex")]);
        assert_eq!(report.entries[0].href, "module_01/lesson_01_rails.pdf");
        assert_eq!(report.entries[0].title.as_deref(), Some("Card rails"));
        assert_eq!(report.entries[0].bytes, 6);
        assert_eq!(report.entries[1].bytes, 7);
        assert!(pages.join("module_01/lesson_02_fees.pdf").is_file());

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(pages.join(MANIFEST)).unwrap()).unwrap();
        assert_eq!(manifest[1]["lesson"], "lesson_02_fees");
        assert_eq!(manifest[1]["title"], serde_json::Value::Null);
        let index = std::fs::read_to_string(pages.join(INDEX)).unwrap();
        assert!(index.contains("- [Card rails](module_01/lesson_01_rails.pdf)"));
    }

    #[test]
    fn unknown_module() {
        // arrange
        let root = tempfile::tempdir().unwrap();
        let layout = CourseLayout::new(root.path());

        // act
        let output = organize(&layout, Some(7));

        // assert
        assert!(matches!(output, Err(PagesError::Layout(LayoutError::UnknownModule(7)))));
    }
}
