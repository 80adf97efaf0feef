//! Charts are data, not scripts.
//!
//! Every module keeps its figures in a `charts.toml` next to the lessons:
//! ```toml
//! [[chart]]
//! name = "card_fees"
//! title = "Card fees by scheme"
//! kind = "bar"
//! labels = ["Visa", "Mastercard", "Amex"]
//! ylabel = "Fee, %"
//!
//! [[chart.series]]
//! name = "Interchange"
//! values = [1.5, 1.6, 2.3]
//!
//! [chart.quantlet]
//! name = "DF_card_fees"
//! url = "https://quantlet.com/DF_card_fees"
//! ```
//! Each spec is turned into a python function drawing it with matplotlib, and every function of a module
//! lives in one python module that is loaded into the embedded interpreter once.

use std::{
    collections::HashSet,
    fmt::Write,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::layout::{CourseLayout, ModuleDir};

mod python;

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum ChartError {
    #[error("{}", .0)]
    Io(std::io::Error),
    #[error("Failed to parse {}: {}", .path.display(), .source)]
    #[from(ignore)]
    Spec {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Chart {} is defined twice in {}", .chart, .path.display())]
    #[from(ignore)]
    Duplicate { path: PathBuf, chart: String },
    #[error("Chart {:?} is invalid: {}", .chart, .reason)]
    #[from(ignore)]
    Invalid { chart: String, reason: String },
    #[error("Python: {}", .0)]
    #[from(ignore)]
    Python(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    HorizontalBar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontal_bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: Option<String>,
    pub values: Vec<f64>,
    /// Scatter only
    #[serde(default)]
    pub x: Option<Vec<f64>>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Attribution of a chart to its QuantLet. Ends up in the PDF metadata, never on the chart itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantLet {
    pub name: String,
    pub url: Url,
}

fn default_size() -> (f32, f32) {
    (10.0, 6.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    #[serde(default)]
    pub xlabel: Option<String>,
    #[serde(default)]
    pub ylabel: Option<String>,
    /// Inches
    #[serde(default = "default_size")]
    pub size: (f32, f32),
    #[serde(default)]
    pub quantlet: Option<QuantLet>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartFile {
    #[serde(rename = "chart", default)]
    charts: Vec<ChartSpec>,
}

/// Series without an explicit color take these, in order
pub const PALETTE: [&str; 6] = [
    "#3333B2", "#0066CC", "#FF7F0E", "#2CA02C", "#D62728", "#9467BD",
];

const BAR_GROUP_WIDTH: f64 = 0.8;

const HEADER: &str = r#"import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt

plt.rcParams.update({"font.size": 12, "axes.titlesize": 14, "axes.titleweight": "bold"})
"#;

macro_rules! invalid {
    ($spec:expr, $($arg:tt)*) => {
        return Err(ChartError::Invalid {
            chart: $spec.name.clone(),
            reason: format!($($arg)*),
        })
    };
}

fn list(values: impl IntoIterator<Item = f64>) -> String {
    format!("[{}]", values.into_iter().map(|v| format!("{v:?}")).join(", "))
}

fn str_list<'s>(values: impl IntoIterator<Item = &'s String>) -> String {
    format!("[{}]", values.into_iter().map(|v| python::literal(v)).join(", "))
}

/// Bar centers of series `index` out of `count`, for `groups` label groups
fn bar_positions(groups: usize, count: usize, index: usize) -> (Vec<f64>, f64) {
    // rounded, so the generated code stays readable
    let round = |x: f64| (x * 1e6).round() / 1e6;
    let width = BAR_GROUP_WIDTH / count as f64;
    let offset = (index as f64 - (count as f64 - 1.0) / 2.0) * width;
    (
        (0..groups).map(|group| round(group as f64 + offset)).collect(),
        round(width),
    )
}

impl ChartSpec {
    pub fn validate(&self) -> Result<(), ChartError> {
        if !regex!(r"^[A-Za-z0-9_-]+$").is_match(&self.name) {
            invalid!(self, "name should be non-empty and consist of letters, digits, '_' and '-'");
        }
        if self.series.is_empty() {
            invalid!(self, "no series");
        }
        if !(self.size.0 > 0.0 && self.size.1 > 0.0) {
            invalid!(self, "size should be positive, got {:?}", self.size);
        }
        for (i, series) in self.series.iter().enumerate() {
            if let Some(value) = series.values.iter().find(|v| !v.is_finite()) {
                invalid!(self, "series #{i} has a non-finite value {value}");
            }
            let expected = match (&series.x, self.kind) {
                (Some(x), ChartKind::Scatter) => {
                    if x.iter().any(|v| !v.is_finite()) {
                        invalid!(self, "series #{i} has a non-finite x value");
                    }
                    x.len()
                }
                _ => self.labels.len(),
            };
            if series.values.len() != expected {
                invalid!(
                    self,
                    "series #{i} has {} values, expected {expected}",
                    series.values.len()
                );
            }
        }
        if self.kind == ChartKind::Pie {
            if self.series.len() != 1 {
                invalid!(self, "a pie takes exactly one series, got {}", self.series.len());
            }
            let values = &self.series[0].values;
            if values.iter().any(|v| *v < 0.0) {
                invalid!(self, "a pie can't have negative values");
            }
            if values.iter().sum::<f64>() <= 0.0 {
                invalid!(self, "a pie needs a positive total");
            }
        }
        Ok(())
    }

    fn color(&self, index: usize) -> String {
        let color = self.series[index]
            .color
            .as_deref()
            .unwrap_or(PALETTE[index % PALETTE.len()]);
        python::literal(color)
    }

    fn label(&self, index: usize) -> String {
        match &self.series[index].name {
            Some(name) => python::literal(name),
            None => "None".to_owned(),
        }
    }

    /// Writes a python function body that draws the chart into `target`.
    /// The spec is [validated](ChartSpec::validate) first, nothing is written for an invalid one.
    pub fn write_code<W: Write + ?Sized>(&self, out: &mut W, target: &Path) -> Result<(), ChartError> {
        self.validate()?;
        self.draw(out, target).map_err(|_| ChartError::Invalid {
            chart: self.name.clone(),
            reason: "failed to generate code".to_owned(),
        })
    }

    /// Indexes series freely, so only for validated specs
    fn draw<W: Write + ?Sized>(&self, out: &mut W, target: &Path) -> std::fmt::Result {
        writeln!(
            out,
            "fig, ax = plt.subplots(figsize=({:?}, {:?}))",
            self.size.0, self.size.1
        )?;
        let count = self.series.len();
        let groups = self.labels.len();
        let ticks = list((0..groups).map(|group| group as f64));
        match self.kind {
            ChartKind::Bar | ChartKind::HorizontalBar => {
                let (method, axis) = match self.kind {
                    ChartKind::Bar => ("bar", "x"),
                    _ => ("barh", "y"),
                };
                for index in 0..count {
                    let (positions, width) = bar_positions(groups, count, index);
                    writeln!(
                        out,
                        "ax.{method}({}, {}, {width:?}, label={}, color={})",
                        list(positions),
                        list(self.series[index].values.iter().copied()),
                        self.label(index),
                        self.color(index)
                    )?;
                }
                writeln!(out, "ax.set_{axis}ticks({ticks})")?;
                writeln!(out, "ax.set_{axis}ticklabels({})", str_list(&self.labels))?;
            }
            ChartKind::Line => {
                for index in 0..count {
                    writeln!(
                        out,
                        "ax.plot({ticks}, {}, marker=\"o\", linewidth=2, label={}, color={})",
                        list(self.series[index].values.iter().copied()),
                        self.label(index),
                        self.color(index)
                    )?;
                }
                writeln!(out, "ax.set_xticks({ticks})")?;
                writeln!(out, "ax.set_xticklabels({})", str_list(&self.labels))?;
            }
            ChartKind::Scatter => {
                for (index, series) in self.series.iter().enumerate() {
                    let x = match &series.x {
                        Some(x) => list(x.iter().copied()),
                        None => ticks.clone(),
                    };
                    writeln!(
                        out,
                        "ax.scatter({x}, {}, s=60, alpha=0.8, label={}, color={})",
                        list(series.values.iter().copied()),
                        self.label(index),
                        self.color(index)
                    )?;
                }
                if self.series.iter().all(|series| series.x.is_none()) && groups > 0 {
                    writeln!(out, "ax.set_xticks({ticks})")?;
                    writeln!(out, "ax.set_xticklabels({})", str_list(&self.labels))?;
                }
            }
            ChartKind::Pie => {
                let colors = (0..groups).map(|i| python::literal(PALETTE[i % PALETTE.len()]));
                writeln!(
                    out,
                    "ax.pie({}, labels={}, colors=[{}], autopct=\"%1.1f%%\", startangle=90)",
                    list(self.series[0].values.iter().copied()),
                    str_list(&self.labels),
                    colors.format(", ")
                )?;
                writeln!(out, "ax.axis(\"equal\")")?;
            }
        }

        writeln!(out, "ax.set_title({})", python::literal(&self.title))?;
        if self.kind != ChartKind::Pie {
            if let Some(xlabel) = &self.xlabel {
                writeln!(out, "ax.set_xlabel({})", python::literal(xlabel))?;
            }
            if let Some(ylabel) = &self.ylabel {
                writeln!(out, "ax.set_ylabel({})", python::literal(ylabel))?;
            }
            writeln!(out, "ax.grid(True, alpha=0.3)")?;
            writeln!(out, "ax.spines[\"top\"].set_visible(False)")?;
            writeln!(out, "ax.spines[\"right\"].set_visible(False)")?;
            if self.series.iter().any(|series| series.name.is_some()) {
                writeln!(out, "ax.legend(frameon=False)")?;
            }
        }

        write!(out, "metadata = {{\"Title\": {}", python::literal(&self.title))?;
        if let Some(quantlet) = &self.quantlet {
            write!(
                out,
                ", \"Subject\": {}, \"Keywords\": {}",
                python::literal(quantlet.url.as_str()),
                python::literal(&quantlet.name)
            )?;
        }
        writeln!(out, "}}")?;
        writeln!(out, "fig.tight_layout()")?;
        writeln!(
            out,
            "fig.savefig({}, format=\"pdf\", bbox_inches=\"tight\", metadata=metadata)",
            python::literal(&target.to_string_lossy())
        )?;
        writeln!(out, "plt.close(fig)")?;
        Ok(())
    }
}

/// Reads a `charts.toml`. Names must be unique within a file, since they name the PDFs
pub fn load_specs(path: &Path) -> Result<Vec<ChartSpec>, ChartError> {
    let text = std::fs::read_to_string(path)?;
    let file: ChartFile = toml::from_str(&text).map_err(|source| ChartError::Spec {
        path: path.to_owned(),
        source,
    })?;
    let mut seen = HashSet::new();
    for spec in &file.charts {
        if !seen.insert(spec.name.as_str()) {
            return Err(ChartError::Duplicate {
                path: path.to_owned(),
                chart: spec.name.clone(),
            });
        }
    }
    Ok(file.charts)
}

/// Specs of a module; a module without `charts.toml` simply has no charts
pub fn module_specs(layout: &CourseLayout, module: &ModuleDir) -> Result<Vec<ChartSpec>, ChartError> {
    let path = layout.chart_specs(module);
    if !path.is_file() {
        debug!("{} has no {}", module.name, path.display());
        return Ok(Vec::new());
    }
    load_specs(&path)
}

pub fn target(figures_dir: &Path, spec: &ChartSpec) -> PathBuf {
    figures_dir.join(format!("{}.pdf", spec.name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutcome {
    pub name: String,
    pub pdf: PathBuf,
    pub error: Option<String>,
}

impl ChartOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
struct Pending {
    name: String,
    function: String,
    pdf: PathBuf,
}

/// Accumulates charts into a single python module, then draws them all
#[derive(Debug)]
pub struct ChartRenderer {
    code: String,
    charts: Vec<Pending>,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer {
    pub fn new() -> Self {
        Self {
            code: HEADER.to_owned(),
            charts: Vec::new(),
        }
    }

    pub fn add(&mut self, spec: &ChartSpec, pdf: PathBuf) -> Result<(), ChartError> {
        let function = format!("render_{}", self.charts.len());
        let mut body = String::new();
        spec.write_code(&mut body, &pdf)?;
        python::append_function(&mut self.code, &function, &body);
        self.charts.push(Pending {
            name: spec.name.clone(),
            function,
            pdf,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Python source of the module, as it would be loaded
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Fails as a whole only if the module itself can't be loaded (no matplotlib, for example)
    pub fn render(self) -> Result<Vec<ChartOutcome>, ChartError> {
        if self.charts.is_empty() {
            return Ok(Vec::new());
        }
        let token = python::init(&self.code).map_err(|e| ChartError::Python(e.to_string()))?;
        let outcomes = self
            .charts
            .into_iter()
            .map(|chart| {
                let mut error = None;
                if let Some(parent) = chart.pdf.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        error = Some(e.to_string());
                    }
                }
                if error.is_none() {
                    if let Err(e) = python::call_function(&token, &chart.function) {
                        error = Some(e.to_string());
                    }
                }
                match &error {
                    None => debug!("Rendered {}", chart.pdf.display()),
                    Some(e) => error!("Failed to render {}: {e}", chart.name),
                }
                ChartOutcome {
                    name: chart.name,
                    pdf: chart.pdf,
                    error,
                }
            })
            .collect_vec();
        Ok(outcomes)
    }
}

/// Renders every chart of a module. An invalid spec fails alone
pub fn render_module(layout: &CourseLayout, module: &ModuleDir) -> Result<Vec<ChartOutcome>, ChartError> {
    let specs = module_specs(layout, module)?;
    let figures = layout.figures_dir(module);
    let mut renderer = ChartRenderer::new();
    let mut rejected = Vec::new();
    for spec in &specs {
        let pdf = target(&figures, spec);
        if let Err(e) = renderer.add(spec, pdf.clone()) {
            warn!("{e}");
            rejected.push(ChartOutcome {
                name: spec.name.clone(),
                pdf,
                error: Some(e.to_string()),
            });
        }
    }
    let mut outcomes = renderer.render()?;
    outcomes.extend(rejected);
    info!(
        "{}: {} of {} charts rendered",
        module.name,
        outcomes.iter().filter(|o| o.is_ok()).count(),
        specs.len()
    );
    Ok(outcomes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStatus {
    Ok { bytes: u64 },
    Missing,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartCheck {
    pub name: String,
    pub pdf: PathBuf,
    pub status: ChartStatus,
}

pub fn check(spec: &ChartSpec, figures_dir: &Path) -> ChartCheck {
    let pdf = target(figures_dir, spec);
    let status = match std::fs::metadata(&pdf) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => ChartStatus::Ok { bytes: meta.len() },
        Ok(meta) if meta.is_file() => ChartStatus::Empty,
        _ => ChartStatus::Missing,
    };
    ChartCheck {
        name: spec.name.clone(),
        pdf,
        status,
    }
}

/// Checks that every chart of a module was drawn, without drawing anything
pub fn verify(layout: &CourseLayout, module: &ModuleDir) -> Result<Vec<ChartCheck>, ChartError> {
    let figures = layout.figures_dir(module);
    Ok(module_specs(layout, module)?
        .iter()
        .map(|spec| check(spec, &figures))
        .collect())
}
