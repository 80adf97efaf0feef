use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// The Beamer course production line.
#[derive(Debug, Clone, Parser)]
#[clap(name = "beamsmith", version, author)]
pub struct CliArguments {
    /// The command to run
    #[command(subcommand)]
    pub command: Command,

    /// Course root, containing the module_NN_* directories
    #[clap(long = "root", env = "BEAMSMITH_ROOT", value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Configuration file [default: <root>/beamsmith.toml, if present]
    #[clap(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Sets the level of logging verbosity:
    /// -v = info, -vv = debug, -vvv = trace
    #[clap(short, long = "verbose", action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Only log errors
    #[clap(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// What to do.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Renders the charts described in each module's charts.toml
    Charts(ChartsCommand),

    /// Adds a \bottomnote to frames that lack one
    Bottomnotes(BottomnotesCommand),

    /// Adds a divider frame after each \section
    Dividers(DividersCommand),

    /// Normalizes the width of included charts
    Widths(WidthsCommand),

    /// Adds an option to matching frames
    FrameOptions(FrameOptionsCommand),

    /// Compiles lessons with the TeX engine
    #[command(visible_alias = "c")]
    Compile(CompileCommand),

    /// Checks lessons for pedagogical completeness
    Audit(AuditCommand),

    /// Generates a lesson from a TOML description
    Lesson(LessonCommand),

    /// Copies compiled decks into the GitHub Pages folder
    Pages(PagesCommand),
}

/// Which lessons to work on
#[derive(Debug, Clone, Args)]
pub struct Selection {
    /// Only lessons of this module
    #[clap(short, long = "module", value_name = "N")]
    pub module: Option<u32>,

    /// Explicit lesson files; these take precedence over --module
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    #[clap(flatten)]
    pub selection: Selection,

    /// Reports changes without writing anything
    #[clap(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct ChartsCommand {
    /// Only charts of this module
    #[clap(short, long = "module", value_name = "N")]
    pub module: Option<u32>,

    /// Checks that every chart exists and is non-empty, without rendering
    #[clap(long = "verify", conflicts_with = "list")]
    pub verify: bool,

    /// Lists the charts, without rendering
    #[clap(long = "list")]
    pub list: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct BottomnotesCommand {
    #[clap(flatten)]
    pub edit: EditArgs,

    /// TOML table of "Frame title" = "note" [default: from config]
    #[clap(long = "notes", value_name = "FILE")]
    pub notes: Option<PathBuf>,

    /// Note for frames absent from the table; {title} is substituted
    #[clap(long = "fallback", value_name = "TEMPLATE")]
    pub fallback: Option<String>,

    /// Also annotates plain frames
    #[clap(long = "include-plain")]
    pub include_plain: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct DividersCommand {
    #[clap(flatten)]
    pub edit: EditArgs,

    /// File with the divider frame template; {title} is substituted
    #[clap(long = "template", value_name = "FILE")]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct WidthsCommand {
    #[clap(flatten)]
    pub edit: EditArgs,

    /// Fraction of \textwidth, within (0, 1] [default: from config]
    #[clap(long = "width")]
    pub width: Option<f32>,

    /// Normalizes every graphic, not just charts
    #[clap(long = "all")]
    pub all: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum When {
    Always,
    Verbatim,
}

#[derive(Debug, Clone, Parser)]
pub struct FrameOptionsCommand {
    #[clap(flatten)]
    pub edit: EditArgs,

    /// The option to add
    #[clap(long = "option", default_value = "fragile")]
    pub option: String,

    /// Which frames get the option
    #[clap(long = "when", default_value = "verbatim")]
    pub when: When,

    /// Only frames whose body matches this regex; overrides --when
    #[clap(long = "matches", value_name = "REGEX")]
    pub matches: Option<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct CompileCommand {
    #[clap(flatten)]
    pub selection: Selection,

    /// Seconds before the engine is killed [default: from config]
    #[clap(long = "timeout", value_name = "S")]
    pub timeout: Option<u64>,

    /// Runs per lesson before giving up [default: from config]
    #[clap(long = "attempts", value_name = "N")]
    pub attempts: Option<u32>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Parser)]
pub struct AuditCommand {
    #[clap(flatten)]
    pub selection: Selection,

    /// The format of the report
    #[clap(long = "format", default_value = "table")]
    pub format: ReportFormat,

    /// Writes the report here instead of stdout
    #[clap(short, long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fails when any error-level finding is reported
    #[clap(long = "strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct LessonCommand {
    /// Lesson description
    pub spec: PathBuf,

    /// Output .tex file [default: stdout]
    #[clap(short, long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct PagesCommand {
    /// Only decks of this module
    #[clap(short, long = "module", value_name = "N")]
    pub module: Option<u32>,
}
