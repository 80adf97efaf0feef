//! Pedagogical completeness heuristics.
//!
//! A lesson is lexed, every frame is measured, and a set of [`AuditRule`]s turns the measurements into findings.
//! None of this understands LaTeX: bullets are `\item`s, charts are `\includegraphics`, words are whatever is left
//! once commands and comments are gone. It's a smoke detector, not a reviewer.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::AuditConfig,
    data::{Document, Frame},
    layout::PathEngine,
    lexer::lex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub code: &'static str,
    pub severity: Severity,
    /// Whole-file findings have none
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    fn new(code: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            line: None,
            message: message.into(),
        }
    }

    fn at(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// A graphic included by a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Graphic {
    pub reference: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    pub line: usize,
    pub title: Option<String>,
    pub plain: bool,
    pub bullets: usize,
    pub graphics: Vec<Graphic>,
    pub bottomnote: bool,
    pub words: usize,
}

/// Frame body with comments cut off, line structure intact
fn live_text(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for line in body.split_inclusive('\n') {
        let cut = line
            .char_indices()
            .find(|(i, c)| *c == '%' && !line[..*i].ends_with('\\'))
            .map_or(line.len(), |(i, _)| i);
        out.push_str(&line[..cut]);
        if cut < line.len() && line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn count_words(text: &str) -> usize {
    let text = regex!(r"\\(?:begin|end)\{[^}]*\}(?:\[[^\]]*\])?(?:\{[^}]*\})?").replace_all(text, " ");
    let text = regex!(r"\\includegraphics(?:<[^>]*>)?(?:\s*\[[^\]]*\])?\s*\{[^}]*\}").replace_all(&text, " ");
    let text = regex!(r"\\[A-Za-z@]+\*?").replace_all(&text, " ");
    text.split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

pub fn measure(document: &Document<'_>, frame: &Frame<'_>) -> FrameMetrics {
    let body_line = line_of(document.source, frame.body.span.start);
    let text = live_text(frame.body.value);
    let graphics = regex!(r"\\includegraphics(?:<[^>]*>)?(?:\s*\[[^\]]*\])?\s*\{([^}]*)\}")
        .captures_iter(&text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            Some(Graphic {
                reference: captures.get(1)?.as_str().trim().to_owned(),
                line: body_line + text[..whole.start()].matches('\n').count(),
            })
        })
        .collect();
    FrameMetrics {
        line: frame.line,
        title: frame.title.map(|title| title.trim().to_owned()),
        plain: frame.is_plain(),
        bullets: regex!(r"\\item\b").find_iter(&text).count(),
        graphics,
        bottomnote: text.contains(crate::data::BOTTOMNOTE),
        words: count_words(&text),
    }
}

/// What rules look at
pub struct Subject<'a> {
    pub path: &'a Path,
    pub frames: &'a [FrameMetrics],
    pub engine: &'a dyn PathEngine,
}

impl Subject<'_> {
    fn ratio(&self, f: impl Fn(&FrameMetrics) -> bool) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.frames.iter().filter(|frame| f(frame)).count() as f64 / self.frames.len() as f64
    }

    pub fn chart_ratio(&self) -> f64 {
        self.ratio(|frame| !frame.graphics.is_empty())
    }

    pub fn bottomnote_coverage(&self) -> f64 {
        self.ratio(|frame| frame.bottomnote)
    }
}

pub trait AuditRule {
    fn code(&self) -> &'static str;

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding>;
}

fn title_of(frame: &FrameMetrics) -> &str {
    frame.title.as_deref().unwrap_or("untitled")
}

#[derive(Debug)]
pub struct BulletDensity {
    pub max: usize,
}

impl AuditRule for BulletDensity {
    fn code(&self) -> &'static str {
        "AU-001"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        subject
            .frames
            .iter()
            .filter(|frame| frame.bullets > self.max)
            .map(|frame| {
                Finding::new(
                    self.code(),
                    Severity::Warning,
                    format!(
                        "Frame \"{}\" has {} bullets (max {})",
                        title_of(frame),
                        frame.bullets,
                        self.max
                    ),
                )
                .at(frame.line)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct TextHeavy {
    pub max_words: usize,
}

impl AuditRule for TextHeavy {
    fn code(&self) -> &'static str {
        "AU-002"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        subject
            .frames
            .iter()
            .filter(|frame| frame.words > self.max_words)
            .map(|frame| {
                Finding::new(
                    self.code(),
                    Severity::Warning,
                    format!(
                        "Frame \"{}\" has {} words (max {})",
                        title_of(frame),
                        frame.words,
                        self.max_words
                    ),
                )
                .at(frame.line)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct UntitledFrame;

impl AuditRule for UntitledFrame {
    fn code(&self) -> &'static str {
        "AU-003"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        subject
            .frames
            .iter()
            .filter(|frame| !frame.plain && frame.title.as_deref().map_or(true, str::is_empty))
            .map(|frame| Finding::new(self.code(), Severity::Info, "Frame has no title").at(frame.line))
            .collect()
    }
}

/// Frameless files are left alone by both ratio rules
#[derive(Debug)]
pub struct ChartRatio {
    pub min: f64,
}

impl AuditRule for ChartRatio {
    fn code(&self) -> &'static str {
        "AU-004"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        let ratio = subject.chart_ratio();
        if subject.frames.is_empty() || ratio >= self.min {
            return Vec::new();
        }
        vec![Finding::new(
            self.code(),
            Severity::Warning,
            format!(
                "{:.0}% of frames have a chart (min {:.0}%)",
                ratio * 100.0,
                self.min * 100.0
            ),
        )]
    }
}

#[derive(Debug)]
pub struct BottomnoteCoverage {
    pub min: f64,
}

impl AuditRule for BottomnoteCoverage {
    fn code(&self) -> &'static str {
        "AU-005"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        let coverage = subject.bottomnote_coverage();
        if subject.frames.is_empty() || coverage >= self.min {
            return Vec::new();
        }
        vec![Finding::new(
            self.code(),
            Severity::Warning,
            format!(
                "{:.0}% of frames have a bottomnote (min {:.0}%)",
                coverage * 100.0,
                self.min * 100.0
            ),
        )]
    }
}

#[derive(Debug)]
pub struct RequiredTitles {
    pub titles: Vec<String>,
}

impl AuditRule for RequiredTitles {
    fn code(&self) -> &'static str {
        "AU-006"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        let present: Vec<String> = subject
            .frames
            .iter()
            .filter_map(|frame| frame.title.as_deref())
            .map(str::to_lowercase)
            .collect();
        self.titles
            .iter()
            .filter(|required| {
                let required = required.to_lowercase();
                !present.iter().any(|title| title.contains(&required))
            })
            .map(|required| {
                Finding::new(
                    self.code(),
                    Severity::Error,
                    format!("No \"{required}\" frame"),
                )
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct UnresolvedFigures;

impl AuditRule for UnresolvedFigures {
    fn code(&self) -> &'static str {
        "AU-007"
    }

    fn check(&self, subject: &Subject<'_>) -> Vec<Finding> {
        subject
            .frames
            .iter()
            .flat_map(|frame| &frame.graphics)
            .filter_map(|graphic| {
                let err = subject.engine.graphic(subject.path, &graphic.reference).err()?;
                Some(Finding::new(self.code(), Severity::Error, err.to_string()).at(graphic.line))
            })
            .collect()
    }
}

pub fn score(findings: &[Finding]) -> u32 {
    let penalty: u32 = findings
        .iter()
        .map(|finding| match finding.severity {
            Severity::Error => 15,
            Severity::Warning => 5,
            Severity::Info => 1,
        })
        .sum();
    100u32.saturating_sub(penalty)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAudit {
    pub path: PathBuf,
    pub frames: usize,
    pub sections: usize,
    pub bullets: usize,
    pub max_bullets: usize,
    pub charts: usize,
    pub frames_with_charts: usize,
    pub chart_ratio: f64,
    pub bottomnotes: usize,
    pub bottomnote_coverage: f64,
    pub findings: Vec<Finding>,
    pub score: u32,
}

impl FileAudit {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Totals {
    pub files: usize,
    pub failed: usize,
    pub frames: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AuditReport {
    pub files: Vec<FileAudit>,
    pub failed: Vec<FailedFile>,
    pub totals: Totals,
}

impl AuditReport {
    fn from_rows(files: Vec<FileAudit>, failed: Vec<FailedFile>) -> Self {
        let count = |severity| -> usize { files.iter().map(|file| file.count(severity)).sum() };
        let totals = Totals {
            files: files.len(),
            failed: failed.len(),
            frames: files.iter().map(|file| file.frames).sum(),
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            infos: count(Severity::Info),
            average_score: if files.is_empty() {
                0.0
            } else {
                files.iter().map(|file| file.score as f64).sum::<f64>() / files.len() as f64
            },
        };
        Self {
            files,
            failed,
            totals,
        }
    }

    /// Error findings or unreadable files
    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0 || !self.failed.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<40} {:>6} {:>8} {:>7} {:>4} {:>6} {:>6} {:>6} {:>6} {:>5}",
            "File", "Frames", "Sections", "Bullets", "Max", "Charts", "Ratio", "Notes", "Cover", "Score"
        )?;
        for file in &self.files {
            writeln!(
                f,
                "{:<40} {:>6} {:>8} {:>7} {:>4} {:>6} {:>5.0}% {:>6} {:>5.0}% {:>5}",
                file.path.display().to_string(),
                file.frames,
                file.sections,
                file.bullets,
                file.max_bullets,
                file.charts,
                file.chart_ratio * 100.0,
                file.bottomnotes,
                file.bottomnote_coverage * 100.0,
                file.score
            )?;
        }
        for failed in &self.failed {
            writeln!(f, "{:<40} FAILED: {}", failed.path.display().to_string(), failed.error)?;
        }
        for file in self.files.iter().filter(|file| !file.findings.is_empty()) {
            writeln!(f)?;
            writeln!(f, "{}:", file.path.display())?;
            for finding in &file.findings {
                match finding.line {
                    Some(line) => write!(f, "  {line:>5}")?,
                    None => write!(f, "  {:>5}", "-")?,
                }
                writeln!(f, "  {} {:<7}  {}", finding.code, finding.severity, finding.message)?;
            }
        }
        writeln!(f)?;
        write!(
            f,
            "{} file(s), {} failed, {} frame(s): {} error(s), {} warning(s), {} info(s), average score {:.1}",
            self.totals.files,
            self.totals.failed,
            self.totals.frames,
            self.totals.errors,
            self.totals.warnings,
            self.totals.infos,
            self.totals.average_score
        )
    }
}

pub struct Auditor<'e> {
    rules: Vec<Box<dyn AuditRule>>,
    engine: &'e dyn PathEngine,
}

impl<'e> Auditor<'e> {
    /// No rules at all; see [`Auditor::from_config`] for the usual set
    pub fn new(engine: &'e dyn PathEngine) -> Self {
        Self {
            rules: Vec::new(),
            engine,
        }
    }

    pub fn with_rule(mut self, rule: impl AuditRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn from_config(config: &AuditConfig, engine: &'e dyn PathEngine) -> Self {
        let auditor = Self::new(engine)
            .with_rule(BulletDensity {
                max: config.max_bullets,
            })
            .with_rule(TextHeavy {
                max_words: config.max_words,
            })
            .with_rule(UntitledFrame)
            .with_rule(ChartRatio {
                min: config.min_chart_ratio,
            })
            .with_rule(BottomnoteCoverage {
                min: config.min_bottomnote_coverage,
            })
            .with_rule(RequiredTitles {
                titles: config.required_titles.clone(),
            });
        if config.check_figures {
            auditor.with_rule(UnresolvedFigures)
        } else {
            auditor
        }
    }

    pub fn audit_source(&self, path: &Path, source: &str) -> Result<FileAudit, crate::lexer::LexError> {
        let document = lex(source)?;
        let frames: Vec<FrameMetrics> = document
            .frames()
            .map(|frame| measure(&document, frame))
            .collect();
        let subject = Subject {
            path,
            frames: &frames,
            engine: self.engine,
        };
        let mut findings: Vec<Finding> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(&subject))
            .collect();
        findings.sort_by_key(|finding| (finding.line.unwrap_or(0), finding.code));
        Ok(FileAudit {
            path: path.to_owned(),
            frames: frames.len(),
            sections: document.sections().count(),
            bullets: frames.iter().map(|frame| frame.bullets).sum(),
            max_bullets: frames.iter().map(|frame| frame.bullets).max().unwrap_or(0),
            charts: frames.iter().map(|frame| frame.graphics.len()).sum(),
            frames_with_charts: frames.iter().filter(|frame| !frame.graphics.is_empty()).count(),
            chart_ratio: subject.chart_ratio(),
            bottomnotes: frames.iter().filter(|frame| frame.bottomnote).count(),
            bottomnote_coverage: subject.bottomnote_coverage(),
            score: score(&findings),
            findings,
        })
    }

    pub fn audit_file(&self, path: &Path) -> Result<FileAudit, String> {
        let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        self.audit_source(path, &source).map_err(|e| e.to_string())
    }

    pub fn audit_files(&self, paths: &[PathBuf]) -> AuditReport {
        let mut files = Vec::new();
        let mut failed = Vec::new();
        for path in paths {
            match self.audit_file(path) {
                Ok(audit) => {
                    debug!("{}: score {}", path.display(), audit.score);
                    files.push(audit);
                }
                Err(error) => {
                    warn!("Could not audit {}: {error}", path.display());
                    failed.push(FailedFile {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        let report = AuditReport::from_rows(files, failed);
        info!(
            "Audited {} file(s), average score {:.1}",
            report.totals.files, report.totals.average_score
        );
        report
    }
}
