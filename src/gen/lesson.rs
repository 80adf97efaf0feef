use std::{fmt::Write, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    edit::DEFAULT_DIVIDER,
    util::{fill_title, FmtToIo},
};

use super::{GenerationError, OutputGenerator, Res};

/// A lesson described as data. Usually read from TOML:
/// ```toml
/// title = "Payments"
/// objectives = ["Explain card rails"]
///
/// [[sections]]
/// title = "Cards"
///
/// [[sections.frames]]
/// title = "Four-party model"
/// bullets = ["Issuer", "Acquirer"]
/// chart = "figures/four_party.pdf"
/// note = "Every swipe touches four balance sheets"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonSpec {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub institute: Option<String>,
    pub date: Option<String>,
    pub objectives: Vec<String>,
    pub sections: Vec<SectionSpec>,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionSpec {
    pub title: String,
    pub frames: Vec<FrameSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSpec {
    pub title: String,
    pub options: Vec<String>,
    pub bullets: Vec<String>,
    pub text: Option<String>,
    pub chart: Option<String>,
    pub chart_width: Option<f32>,
    pub note: Option<String>,
}

impl LessonSpec {
    pub fn from_toml(text: &str) -> Result<Self, GenerationError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Res {
        if self.title.trim().is_empty() {
            return Err(GenerationError::NoTitle);
        }
        let frames = self.sections.iter().flat_map(|section| &section.frames);
        for frame in frames {
            if let Some(width) = frame.chart_width {
                if !(width > 0.0 && width <= 1.0) {
                    return Err(GenerationError::InvalidWidth {
                        frame: frame.title.clone(),
                        width,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Context {
    pub frames: usize,
    pub charts: usize,
}

const PREAMBLE: &str = r"\documentclass[aspectratio=169]{beamer}
\usetheme{Madrid}
\usepackage{graphicx}
\usepackage{booktabs}
\setbeamertemplate{navigation symbols}{}
\newcommand{\bottomnote}[1]{\vfill\begin{center}\footnotesize\textit{#1}\end{center}}
";

/// Writes complete standalone Beamer lessons
#[derive(Debug)]
pub struct BeamerLesson {
    chart_width: f32,
}

impl Default for BeamerLesson {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl BeamerLesson {
    pub fn new(chart_width: f32) -> Self {
        Self { chart_width }
    }

    /// Checks both the lesson and the default chart width, without writing anything
    pub fn validate(&self, lesson: &LessonSpec) -> Res {
        if !(self.chart_width > 0.0 && self.chart_width <= 1.0) {
            return Err(GenerationError::InvalidDefaultWidth(self.chart_width));
        }
        lesson.validate()
    }

    pub fn generate(&self, lesson: &LessonSpec) -> Result<String, GenerationError> {
        let mut output = String::new();
        self.write_to(&mut output, &mut Context::default(), lesson)?;
        Ok(output)
    }

    /// Streams the lesson into a file or stdout
    pub fn write_io<W: std::io::Write>(&self, lesson: &LessonSpec, io: W) -> Res {
        let mut output = FmtToIo::new(io);
        match self.write_to(&mut output, &mut Context::default(), lesson) {
            // formatting into io only fails when io does
            Err(GenerationError::Fmt(err)) => Err(output
                .get_error()
                .map_or(GenerationError::Fmt(err), GenerationError::Io)),
            other => other,
        }
    }

    /// The file is only created once the lesson is known to be valid
    pub fn write_file(&self, lesson: &LessonSpec, path: &Path) -> Res {
        self.validate(lesson)?;
        self.write_io(lesson, std::fs::File::create(path)?)
    }

    fn write_list<W: Write + ?Sized>(&self, output: &mut W, items: &[String]) -> Res {
        if items.is_empty() {
            return Ok(());
        }
        output.write_str("\\begin{itemize}\n")?;
        for item in items {
            writeln!(output, "\\item {item}")?;
        }
        output.write_str("\\end{itemize}\n")?;
        Ok(())
    }

    fn write_simple_frame<W: Write + ?Sized>(
        &self,
        output: &mut W,
        context: &mut Context,
        title: &str,
        items: &[String],
    ) -> Res {
        if items.is_empty() {
            return Ok(());
        }
        let frame = FrameSpec {
            title: title.to_owned(),
            bullets: items.to_vec(),
            ..Default::default()
        };
        self.write_to(output, context, &frame)
    }
}

impl OutputGenerator<LessonSpec, Context> for BeamerLesson {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        context: &mut Context,
        lesson: &LessonSpec,
    ) -> Res {
        self.validate(lesson)?;
        output.write_str(PREAMBLE)?;
        output.write_char('\n')?;
        writeln!(output, "\\title{{{}}}", lesson.title)?;
        if let Some(subtitle) = &lesson.subtitle {
            writeln!(output, "\\subtitle{{{subtitle}}}")?;
        }
        if let Some(author) = &lesson.author {
            writeln!(output, "\\author{{{author}}}")?;
        }
        if let Some(institute) = &lesson.institute {
            writeln!(output, "\\institute{{{institute}}}")?;
        }
        writeln!(
            output,
            "\\date{{{}}}",
            lesson.date.as_deref().unwrap_or("\\today")
        )?;
        output.write_str("\n\\begin{document}\n\n\\begin{frame}[plain]\n\\titlepage\n\\end{frame}\n")?;

        self.write_simple_frame(output, context, "Learning Objectives", &lesson.objectives)?;
        OutputGenerator::<SectionSpec, Context>::write_all_to(self, output, context, &lesson.sections)?;
        self.write_simple_frame(output, context, "Summary", &lesson.summary)?;

        output.write_str("\n\\end{document}\n")?;
        Ok(())
    }
}

impl OutputGenerator<SectionSpec, Context> for BeamerLesson {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        context: &mut Context,
        section: &SectionSpec,
    ) -> Res {
        // the divider is the same one the editor inserts, so it recognizes it later
        writeln!(output, "\n\\section{{{}}}", section.title)?;
        writeln!(output, "{}", fill_title(DEFAULT_DIVIDER, &section.title))?;
        OutputGenerator::<FrameSpec, Context>::write_all_to(self, output, context, &section.frames)
    }
}

impl OutputGenerator<FrameSpec, Context> for BeamerLesson {
    fn write_to<W: Write + ?Sized>(
        &self,
        output: &mut W,
        context: &mut Context,
        frame: &FrameSpec,
    ) -> Res {
        context.frames += 1;
        output.write_str("\n\\begin{frame}")?;
        if !frame.options.is_empty() {
            write!(output, "[{}]", frame.options.join(","))?;
        }
        writeln!(output, "{{{}}}", frame.title)?;
        self.write_list(output, &frame.bullets)?;
        if let Some(text) = &frame.text {
            writeln!(output, "{}", text.trim_end())?;
        }
        if let Some(chart) = &frame.chart {
            context.charts += 1;
            let width = frame.chart_width.unwrap_or(self.chart_width);
            writeln!(
                output,
                "\\begin{{center}}\n\\includegraphics[width={width}\\textwidth]{{{chart}}}\n\\end{{center}}"
            )?;
        }
        if let Some(note) = &frame.note {
            writeln!(output, "\\bottomnote{{{note}}}")?;
        }
        output.write_str("\\end{frame}\n")?;
        Ok(())
    }
}
