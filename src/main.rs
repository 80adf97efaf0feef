mod args;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use clap::Parser;
use log::error;

use beamsmith::{
    audit::Auditor,
    chart::{self, ChartStatus},
    compile::{CompileOutcome, Compiler},
    config::{Config, ConfigError},
    edit::{self, AddBottomnotes, AddFrameOption, AddSectionDividers, ChartFilter, Edit, NormalizeChartWidths, NoteSource, OptionCondition},
    layout::{CourseLayout, DefaultEngine},
    pages, BeamerLesson, Error, LessonSpec,
};

use crate::args::{CliArguments, Command, EditArgs, ReportFormat, Selection, When};

/// Whether every file went through; fatal errors are returned instead
type Outcome = Result<bool, Error>;

/// Entry point.
fn main() -> ExitCode {
    let args = CliArguments::parse();
    init_logging(&args);

    match dispatch(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &CliArguments) {
    let level = match (args.quiet, args.verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Everything a command needs to know about the course
struct Course {
    config: Config,
    layout: CourseLayout,
}

impl Course {
    fn load(args: &CliArguments) -> Result<Self, Error> {
        let config = Config::discover(&args.root, args.config.as_deref())?;
        let layout = CourseLayout::new(&args.root)
            .with_slides_dir(&config.compile.output_dir)
            .with_pages_dir(&config.pages.dir);
        Ok(Self { config, layout })
    }

    fn lessons(&self, selection: &Selection) -> Result<Vec<PathBuf>, Error> {
        Ok(self.layout.select_lessons(selection.module, &selection.files)?)
    }

    /// Config paths are relative to the course root
    fn path(&self, path: &Path) -> PathBuf {
        self.layout.root().join(path)
    }
}

/// Execute the requested command.
fn dispatch(args: &CliArguments) -> Outcome {
    let course = Course::load(args)?;
    match &args.command {
        Command::Charts(command) => charts(&course, command),
        Command::Bottomnotes(command) => bottomnotes(&course, command),
        Command::Dividers(command) => dividers(&course, command),
        Command::Widths(command) => widths(&course, command),
        Command::FrameOptions(command) => frame_options(&course, command),
        Command::Compile(command) => compile(&course, command),
        Command::Audit(command) => audit(&course, command),
        Command::Lesson(command) => lesson(&course, command),
        Command::Pages(command) => publish(&course, command),
    }
}

fn charts(course: &Course, command: &args::ChartsCommand) -> Outcome {
    let mut ok = true;
    for module in course.layout.select_modules(command.module)? {
        if command.list {
            for spec in chart::module_specs(&course.layout, &module)? {
                let quantlet = spec
                    .quantlet
                    .as_ref()
                    .map(|q| format!("{} <{}>", q.name, q.url))
                    .unwrap_or_default();
                println!("{}\t{}\t{}\t{quantlet}", module.name, spec.name, spec.kind.as_str());
            }
        } else if command.verify {
            for check in chart::verify(&course.layout, &module)? {
                let status = match check.status {
                    ChartStatus::Ok { bytes } => format!("ok ({bytes} bytes)"),
                    ChartStatus::Missing => "MISSING".to_owned(),
                    ChartStatus::Empty => "EMPTY".to_owned(),
                };
                ok &= matches!(check.status, ChartStatus::Ok { .. });
                println!("{:<8} {}", status, check.pdf.display());
            }
        } else {
            for outcome in chart::render_module(&course.layout, &module)? {
                match &outcome.error {
                    None => println!("ok       {}", outcome.pdf.display()),
                    Some(e) => println!("FAILED   {}: {e}", outcome.name),
                }
                ok &= outcome.is_ok();
            }
        }
    }
    Ok(ok)
}

fn run_edits(course: &Course, args: &EditArgs, edits: &[&dyn Edit]) -> Outcome {
    let files = course.lessons(&args.selection)?;
    let summary = edit::edit_files(files.iter().map(PathBuf::as_path), edits, args.dry_run);
    for file in &summary.files {
        if file.total() == 0 {
            continue;
        }
        let state = if file.written { "written" } else { "not written" };
        println!("{}: {} change(s), {state}", file.path.display(), file.total());
    }
    for (path, err) in &summary.failed {
        println!("{}: FAILED: {err}", path.display());
    }
    println!("{} change(s) in {} file(s)", summary.total_changes(), summary.files.len());
    Ok(summary.failed.is_empty())
}

fn bottomnotes(course: &Course, command: &args::BottomnotesCommand) -> Outcome {
    let fallback = command
        .fallback
        .clone()
        .or_else(|| course.config.edit.fallback_note.clone());
    let notes_file = command
        .notes
        .clone()
        .or_else(|| course.config.edit.notes.as_deref().map(|path| course.path(path)));
    let notes = match notes_file {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            NoteSource::from_toml(&text, fallback).map_err(|source| ConfigError::Parse { path, source })?
        }
        None => NoteSource::new(Default::default(), fallback),
    };
    let edit = AddBottomnotes::new(notes).include_plain(command.include_plain);
    run_edits(course, &command.edit, &[&edit])
}

fn dividers(course: &Course, command: &args::DividersCommand) -> Outcome {
    let edit = match (&command.template, &course.config.edit.divider) {
        (Some(path), _) => AddSectionDividers::new(std::fs::read_to_string(path)?),
        (None, Some(template)) => AddSectionDividers::new(template.clone()),
        (None, None) => AddSectionDividers::default(),
    };
    run_edits(course, &command.edit, &[&edit])
}

fn widths(course: &Course, command: &args::WidthsCommand) -> Outcome {
    let width = command.width.unwrap_or(course.config.edit.chart_width);
    let filter = if command.all || course.config.edit.all_graphics {
        ChartFilter::All
    } else {
        ChartFilter::Charts
    };
    let edit = NormalizeChartWidths::new(width, filter)?;
    run_edits(course, &command.edit, &[&edit])
}

fn frame_options(course: &Course, command: &args::FrameOptionsCommand) -> Outcome {
    let when = match (&command.matches, command.when) {
        (Some(pattern), _) => OptionCondition::BodyMatches(pattern.clone()),
        (None, When::Always) => OptionCondition::Always,
        (None, When::Verbatim) => OptionCondition::Verbatim,
    };
    let edit = AddFrameOption::new(command.option.clone(), when)?;
    run_edits(course, &command.edit, &[&edit])
}

fn compile(course: &Course, command: &args::CompileCommand) -> Outcome {
    let mut compiler = Compiler::from_config(&course.config.compile, &course.layout);
    if let Some(timeout) = command.timeout {
        compiler = compiler.with_timeout(Duration::from_secs(timeout));
    }
    if let Some(attempts) = command.attempts {
        compiler = compiler.with_attempts(attempts);
    }
    let files = course.lessons(&command.selection)?;
    let report = compiler.compile_all(&files)?;
    for (tex, outcome) in &report.rows {
        let status = match outcome {
            CompileOutcome::Compiled { attempts, .. } => format!("ok ({attempts} attempt(s))"),
            CompileOutcome::Failed { code, errors, .. } => {
                let code = code.map_or("killed".to_owned(), |code| format!("exit {code}"));
                match errors.first() {
                    Some(first) => format!("FAILED ({code}): {first}"),
                    None => format!("FAILED ({code})"),
                }
            }
            CompileOutcome::TimedOut { attempts } => format!("TIMED OUT ({attempts} attempt(s))"),
            CompileOutcome::Skipped => "skipped (not found)".to_owned(),
        };
        println!("{}: {status}", tex.display());
    }
    println!(
        "{} compiled, {} failed, {} timed out, {} skipped",
        report.compiled(),
        report.failed(),
        report.timed_out(),
        report.skipped()
    );
    Ok(report.is_success())
}

fn audit(course: &Course, command: &args::AuditCommand) -> Outcome {
    let engine = DefaultEngine::new(&course.layout);
    let auditor = Auditor::from_config(&course.config.audit, &engine);
    let files = course.lessons(&command.selection)?;
    let report = auditor.audit_files(&files);
    let rendered = match command.format {
        ReportFormat::Table => report.to_string(),
        ReportFormat::Json => report.to_json()?,
    };
    match &command.output {
        Some(path) => std::fs::write(path, rendered + "\n")?,
        None => println!("{rendered}"),
    }
    let strict_failure = command.strict && report.totals.errors > 0;
    Ok(report.failed.is_empty() && !strict_failure)
}

fn lesson(course: &Course, command: &args::LessonCommand) -> Outcome {
    let spec = LessonSpec::from_toml(&std::fs::read_to_string(&command.spec)?)?;
    let generator = BeamerLesson::new(course.config.edit.chart_width);
    match &command.output {
        Some(path) => generator.write_file(&spec, path)?,
        None => generator.write_io(&spec, std::io::stdout().lock())?,
    }
    Ok(true)
}

fn publish(course: &Course, command: &args::PagesCommand) -> Outcome {
    let report = pages::organize(&course.layout, command.module)?;
    for entry in &report.entries {
        println!("{} ({} bytes)", entry.href, entry.bytes);
    }
    for missing in &report.missing {
        println!("no PDF: {}", missing.display());
    }
    println!(
        "{} deck(s), manifest at {}",
        report.entries.len(),
        report.manifest.display()
    );
    Ok(true)
}
