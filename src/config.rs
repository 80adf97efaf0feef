//! `beamsmith.toml`, found at the course root.
//!
//! Every section and every field is optional:
//! ```toml
//! [compile]
//! timeout_secs = 60
//!
//! [audit]
//! max_bullets = 5
//! required_titles = ["Learning Objectives", "Key Takeaways"]
//! ```

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

pub const CONFIG_FILE: &str = "beamsmith.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub compile: CompileConfig,
    pub audit: AuditConfig,
    pub edit: EditConfig,
    pub pages: PagesConfig,
}

#[derive(Debug, Clone, PartialEq, SmartDefault, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    #[default("pdflatex".to_owned())]
    pub program: String,
    /// `{tex}` is replaced with the file name, `{stem}` with the file name sans extension
    #[default(_code = r#"vec!["-interaction=nonstopmode".to_owned(), "-halt-on-error".to_owned(), "{tex}".to_owned()]"#)]
    pub args: Vec<String>,
    #[default(120)]
    pub timeout_secs: u64,
    #[default(2)]
    pub attempts: u32,
    /// Auxiliary files go here, relative to the tex file
    #[default("temp".to_owned())]
    pub temp_dir: String,
    /// Compiled decks are copied here, relative to the course root
    #[default("slides".to_owned())]
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, SmartDefault, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    #[default(6)]
    pub max_bullets: usize,
    #[default(120)]
    pub max_words: usize,
    #[default(0.3)]
    pub min_chart_ratio: f64,
    #[default(0.8)]
    pub min_bottomnote_coverage: f64,
    #[default(_code = r#"vec!["Learning Objectives".to_owned(), "Summary".to_owned()]"#)]
    pub required_titles: Vec<String>,
    #[default(true)]
    pub check_figures: bool,
}

#[derive(Debug, Clone, PartialEq, SmartDefault, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditConfig {
    #[default(0.8)]
    pub chart_width: f32,
    /// Normalize every graphic, not just charts
    pub all_graphics: bool,
    /// TOML table of `"Frame title" = "note"`, relative to the course root
    pub notes: Option<PathBuf>,
    /// Used for frames absent from the notes table; `{title}` is substituted
    pub fallback_note: Option<String>,
    /// Divider frame template; `{title}` is substituted
    pub divider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, SmartDefault, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagesConfig {
    /// Relative to the course root
    #[default("docs/slides".to_owned())]
    pub dir: String,
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// An explicit config must exist; otherwise `beamsmith.toml` at the root is used if present
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::load(path);
        }
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            debug!("No {CONFIG_FILE} in {}, using defaults", root.display());
            Ok(Self::default())
        }
    }
}
