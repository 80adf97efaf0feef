//! Runs the TeX engine over lessons, one at a time.
//!
//! The engine is an ordinary subprocess: it runs in the lesson's directory, its output is discarded,
//! and it is killed once it outlives the timeout. A run that failed or timed out is retried.
//! After the last attempt, auxiliary files are swept into a temp directory and the PDF is copied to `slides/`.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{config::CompileConfig, layout::CourseLayout};

/// Files the engine leaves next to the source, by extension
pub const AUX_EXTENSIONS: [&str; 10] = [
    "aux",
    "log",
    "nav",
    "out",
    "snm",
    "toc",
    "vrb",
    "synctex.gz",
    "fls",
    "fdb_latexmk",
];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum CompileError {
    #[error("TeX engine `{}` not found", .0)]
    #[from(ignore)]
    EngineMissing(String),
    #[error("{}", .0)]
    Io(io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Compiled {
        pdf: PathBuf,
        attempts: u32,
    },
    Failed {
        attempts: u32,
        code: Option<i32>,
        /// `!` lines of the engine's log
        errors: Vec<String>,
    },
    TimedOut {
        attempts: u32,
    },
    /// Source file does not exist
    Skipped,
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Compiled { .. })
    }
}

#[derive(Debug)]
enum Run {
    Exited(ExitStatus),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct Compiler {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    attempts: u32,
    temp_dir: String,
    output_dir: Option<PathBuf>,
}

impl Compiler {
    /// `args` may contain `{tex}` (source file name) and `{stem}` (file name without extension)
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let defaults = CompileConfig::default();
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(defaults.timeout_secs),
            attempts: defaults.attempts,
            temp_dir: defaults.temp_dir,
            output_dir: None,
        }
    }

    pub fn from_config(config: &CompileConfig, layout: &CourseLayout) -> Self {
        Self::new(config.program.clone(), config.args.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_attempts(config.attempts)
            .with_temp_dir(config.temp_dir.clone())
            .with_output_dir(layout.root().join(&config.output_dir))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// At least one attempt is always made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<String>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Compiled PDFs are copied here. Without one they stay next to the source only
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    fn command(&self, dir: &Path, file_name: &str, stem: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(
                self.args
                    .iter()
                    .map(|arg| arg.replace("{tex}", file_name).replace("{stem}", stem)),
            )
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    fn run_once(&self, mut command: Command) -> Result<Run, CompileError> {
        let mut child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CompileError::EngineMissing(self.program.clone()),
            _ => e.into(),
        })?;
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Run::Exited(status));
            }
            if start.elapsed() >= self.timeout {
                // the process may have exited in between, which is fine
                let _ = child.kill();
                child.wait()?;
                return Ok(Run::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn compile_file(&self, tex: &Path) -> Result<CompileOutcome, CompileError> {
        if !tex.is_file() {
            warn!("Skipping {}: file not found", tex.display());
            return Ok(CompileOutcome::Skipped);
        }
        let dir = match tex.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let file_name = tex
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = tex
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut attempts = 0;
        let last = loop {
            attempts += 1;
            debug!("Compiling {} (attempt {attempts}/{})", tex.display(), self.attempts);
            let run = self.run_once(self.command(dir, &file_name, &stem))?;
            let succeeded = match &run {
                Run::Exited(status) if status.success() => true,
                Run::Exited(status) => {
                    debug!("{} exited with {status}", self.program);
                    false
                }
                Run::TimedOut => {
                    warn!(
                        "{} timed out after {}s on {}",
                        self.program,
                        self.timeout.as_secs_f32(),
                        tex.display()
                    );
                    false
                }
            };
            if succeeded || attempts >= self.attempts {
                break run;
            }
        };

        let pdf = dir.join(format!("{stem}.pdf"));
        let outcome = match last {
            Run::Exited(status) if status.success() && pdf.is_file() => {
                CompileOutcome::Compiled { pdf, attempts }
            }
            Run::Exited(status) => CompileOutcome::Failed {
                attempts,
                code: status.code(),
                errors: log_errors(&dir.join(format!("{stem}.log"))),
            },
            Run::TimedOut => CompileOutcome::TimedOut { attempts },
        };

        self.tidy(dir, &stem);
        if let CompileOutcome::Compiled { pdf, .. } = &outcome {
            if let Some(output_dir) = &self.output_dir {
                std::fs::create_dir_all(output_dir)?;
                std::fs::copy(pdf, output_dir.join(format!("{stem}.pdf")))?;
            }
        }
        Ok(outcome)
    }

    /// Moves auxiliary files into the temp directory. Never fails the compilation
    fn tidy(&self, dir: &Path, stem: &str) {
        let temp = dir.join(&self.temp_dir);
        for extension in AUX_EXTENSIONS {
            let name = format!("{stem}.{extension}");
            let source = dir.join(&name);
            if !source.is_file() {
                continue;
            }
            let moved = std::fs::create_dir_all(&temp)
                .and_then(|_| std::fs::rename(&source, temp.join(&name)));
            if let Err(e) = moved {
                warn!("Could not move {} to {}: {e}", source.display(), temp.display());
            }
        }
    }

    /// Sequential. Stops early only when the engine itself is missing
    pub fn compile_all(&self, files: &[PathBuf]) -> Result<CompileReport, CompileError> {
        let mut report = CompileReport::default();
        for tex in files {
            let outcome = match self.compile_file(tex) {
                Ok(outcome) => outcome,
                Err(e @ CompileError::EngineMissing(_)) => return Err(e),
                Err(e) => CompileOutcome::Failed {
                    attempts: 0,
                    code: None,
                    errors: vec![e.to_string()],
                },
            };
            match &outcome {
                CompileOutcome::Compiled { attempts, .. } => {
                    info!("Compiled {} ({attempts} attempt(s))", tex.display())
                }
                CompileOutcome::Failed { errors, .. } => error!(
                    "Failed to compile {}{}",
                    tex.display(),
                    errors.first().map(|e| format!(": {e}")).unwrap_or_default()
                ),
                CompileOutcome::TimedOut { .. } => error!("Timed out on {}", tex.display()),
                CompileOutcome::Skipped => {}
            }
            report.rows.push((tex.clone(), outcome));
        }
        info!(
            "{} compiled, {} failed, {} timed out, {} skipped",
            report.compiled(),
            report.failed(),
            report.timed_out(),
            report.skipped()
        );
        Ok(report)
    }
}

/// Error lines of a TeX log. An unreadable log just has no errors
fn log_errors(log: &Path) -> Vec<String> {
    // logs are not guaranteed to be UTF-8
    match std::fs::read(log) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.starts_with('!'))
            .map(|line| line.trim_end().to_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[derive(Debug, Default)]
pub struct CompileReport {
    pub rows: Vec<(PathBuf, CompileOutcome)>,
}

impl CompileReport {
    fn count(&self, f: impl Fn(&CompileOutcome) -> bool) -> usize {
        self.rows.iter().filter(|(_, outcome)| f(outcome)).count()
    }

    pub fn compiled(&self) -> usize {
        self.count(CompileOutcome::is_success)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CompileOutcome::Failed { .. }))
    }

    pub fn timed_out(&self) -> usize {
        self.count(|o| matches!(o, CompileOutcome::TimedOut { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CompileOutcome::Skipped))
    }

    /// Skipped files don't count as failures
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.timed_out() == 0
    }
}
