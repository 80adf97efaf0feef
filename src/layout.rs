use std::{
    io,
    path::{Path, PathBuf},
};

use itertools::Itertools;

pub const PAGES_DIR: &str = "docs/slides";
pub const SLIDES_DIR: &str = "slides";
pub const FIGURES_DIR: &str = "figures";
pub const CHART_SPECS: &str = "charts.toml";

/// Extensions LaTeX tries, when a graphic is referenced without one
const GRAPHIC_EXTENSIONS: [&str; 3] = ["pdf", "png", "jpg"];

#[derive(Debug, derive_more::From, thiserror::Error)]
pub enum LayoutError {
    #[error("{}", .0)]
    Io(io::Error),
    #[error("There's no module_{:02}_* directory in the course", .0)]
    #[from(ignore)]
    UnknownModule(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDir {
    pub number: u32,
    pub name: String,
    pub path: PathBuf,
}

/// Parses `module_NN` or `module_NN_anything`
pub fn module_number(dir_name: &str) -> Option<u32> {
    regex!(r"^module_(\d{2})(?:_.*)?$")
        .captures(dir_name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
pub struct CourseLayout {
    root: PathBuf,
    slides_dir: PathBuf,
    pages_dir: PathBuf,
}

impl CourseLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            slides_dir: root.join(SLIDES_DIR),
            pages_dir: root.join(PAGES_DIR),
            root,
        }
    }

    /// Relative paths are taken relative to the course root
    pub fn with_slides_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.slides_dir = self.root.join(dir);
        self
    }

    /// Relative paths are taken relative to the course root
    pub fn with_pages_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.pages_dir = self.root.join(dir);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slides_dir(&self) -> &Path {
        &self.slides_dir
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    pub fn figures_dir(&self, module: &ModuleDir) -> PathBuf {
        module.path.join(FIGURES_DIR)
    }

    pub fn chart_specs(&self, module: &ModuleDir) -> PathBuf {
        module.path.join(CHART_SPECS)
    }

    pub fn modules(&self) -> Result<Vec<ModuleDir>, LayoutError> {
        let mut modules = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(number) = module_number(&name) {
                modules.push(ModuleDir {
                    number,
                    name,
                    path: entry.path(),
                });
            }
        }
        modules.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));
        Ok(modules)
    }

    pub fn module(&self, number: u32) -> Result<ModuleDir, LayoutError> {
        self.modules()?
            .into_iter()
            .find(|module| module.number == number)
            .ok_or(LayoutError::UnknownModule(number))
    }

    /// Modules, optionally narrowed to a single one
    pub fn select_modules(&self, filter: Option<u32>) -> Result<Vec<ModuleDir>, LayoutError> {
        match filter {
            Some(number) => Ok(vec![self.module(number)?]),
            None => self.modules(),
        }
    }

    /// `lesson_*.tex` files of a module, sorted by name
    pub fn lessons(&self, module: &ModuleDir) -> Result<Vec<PathBuf>, LayoutError> {
        let mut lessons = Vec::new();
        for entry in std::fs::read_dir(&module.path)? {
            let path = entry?.path();
            let is_lesson = path.is_file()
                && path.extension().is_some_and(|ext| ext == "tex")
                && path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("lesson_"));
            if is_lesson {
                lessons.push(path);
            }
        }
        lessons.sort();
        Ok(lessons)
    }

    /// Explicit files win; otherwise every lesson of every selected module
    pub fn select_lessons(
        &self,
        module: Option<u32>,
        explicit: &[PathBuf],
    ) -> Result<Vec<PathBuf>, LayoutError> {
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }
        let mut lessons = Vec::new();
        for module in self.select_modules(module)? {
            lessons.extend(self.lessons(&module)?);
        }
        Ok(lessons)
    }

    /// Module directory a file lives in, if any
    pub fn module_of(&self, file: &Path) -> Option<ModuleDir> {
        file.ancestors().skip(1).find_map(|dir| {
            let name = dir.file_name()?.to_string_lossy().into_owned();
            let number = module_number(&name)?;
            Some(ModuleDir {
                number,
                name,
                path: dir.to_owned(),
            })
        })
    }
}

#[derive(Debug)]
pub enum VariantError {
    Io(io::Error), // missing permissions, or broken symbolic links
    NotExist,      // file does not in fact exist in the filesystem
    NotAFile,      // path resolves to a directory, not a file
}

#[derive(Debug, thiserror::Error)]
#[error("Could not resolve `{reference}` (tried {})", tried(.attempts))]
pub struct ResolveError {
    pub reference: String,
    pub attempts: Vec<(PathBuf, VariantError)>,
}

fn tried(attempts: &[(PathBuf, VariantError)]) -> String {
    attempts
        .iter()
        .map(|(path, _)| path.display())
        .join(", ")
}

/// Resolves graphics referenced from a tex file
pub trait PathEngine {
    fn graphic(&self, tex: &Path, reference: &str) -> Result<PathBuf, ResolveError>;
}

macro_rules! try_path {
    ($path:expr) => {
        let path = $path;
        if path.try_exists().is_ok_and(std::convert::identity)
            // path exists and is reachable
            && path.is_file()
        // and path points to the file
        {
            // found a match!
            return Ok(path);
        }
    };
}

macro_rules! path_error {
    ($path:expr) => {
        match $path.try_exists() {
            Err(io) => VariantError::Io(io),
            Ok(false) => VariantError::NotExist,
            Ok(true) => VariantError::NotAFile,
        }
    };
}

/// Candidates for a reference relative to a base: as written, then with usual extensions
/// The reference as written, then with each graphic extension appended.
/// A dot in the name (`rate_1.5`) is not an extension, unless it's one of the graphic ones.
fn candidates(base: &Path, reference: &str) -> Vec<PathBuf> {
    let path = base.join(reference);
    let has_graphic_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| GRAPHIC_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)));
    let mut candidates = vec![path];
    if !has_graphic_extension {
        candidates.extend(
            GRAPHIC_EXTENSIONS
                .iter()
                .map(|ext| base.join(format!("{reference}.{ext}"))),
        );
    }
    candidates
}

/// Looks next to the tex file, then in the module's figures, then at the course root
#[derive(Debug)]
pub struct DefaultEngine<'l> {
    layout: &'l CourseLayout,
}

impl<'l> DefaultEngine<'l> {
    pub fn new(layout: &'l CourseLayout) -> Self {
        Self { layout }
    }

    fn bases(&self, tex: &Path) -> Vec<PathBuf> {
        let mut bases = Vec::with_capacity(3);
        if let Some(dir) = tex.parent() {
            bases.push(dir.to_owned());
        }
        if let Some(module) = self.layout.module_of(tex) {
            bases.push(self.layout.figures_dir(&module));
        }
        bases.push(self.layout.root().to_owned());
        bases
    }
}

impl PathEngine for DefaultEngine<'_> {
    fn graphic(&self, tex: &Path, reference: &str) -> Result<PathBuf, ResolveError> {
        let reference = reference.trim();
        let attempts = self
            .bases(tex)
            .iter()
            .flat_map(|base| candidates(base, reference))
            .collect_vec();
        for attempt in &attempts {
            try_path!(attempt.clone());
        }

        // well, all options failed. now let's construct informative error:
        Err(ResolveError {
            reference: reference.to_string(),
            attempts: attempts
                .into_iter()
                .map(|path| {
                    let err = path_error!(path);
                    (path, err)
                })
                .collect(),
        })
    }
}

/// Resolves everything to itself. For sources that are checked without a filesystem around them
#[derive(Debug, Default)]
pub struct PrimitiveEngine;

impl PathEngine for PrimitiveEngine {
    fn graphic(&self, _: &Path, reference: &str) -> Result<PathBuf, ResolveError> {
        Ok(PathBuf::from(reference.trim()))
    }
}
