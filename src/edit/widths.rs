use itertools::Itertools;

use crate::{
    data::{option_key, split_options},
    lexer::is_commented,
    util::Splice,
};

use super::{Edit, EditError, Edited};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartFilter {
    /// Graphics under a `figures/` folder, or any `.pdf`
    #[default]
    Charts,
    All,
}

impl ChartFilter {
    fn matches(&self, path: &str) -> bool {
        match self {
            ChartFilter::All => true,
            ChartFilter::Charts => {
                let path = path.trim().replace('\\', "/");
                path.starts_with("figures/") || path.contains("/figures/") || path.ends_with(".pdf")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeChartWidths {
    width: f32,
    filter: ChartFilter,
}

impl NormalizeChartWidths {
    pub fn new(width: f32, filter: ChartFilter) -> Result<Self, EditError> {
        if !(width > 0.0 && width <= 1.0) {
            return Err(EditError::InvalidWidth(width));
        }
        Ok(Self { width, filter })
    }

    fn width_option(&self) -> String {
        format!("width={}\\textwidth", self.width)
    }

    fn is_target_width(&self, option: &str) -> bool {
        let Some((_, value)) = option.split_once('=') else {
            return false;
        };
        value
            .trim()
            .strip_suffix("\\textwidth")
            .and_then(|value| value.trim().parse::<f32>().ok())
            .is_some_and(|value| (value - self.width).abs() < 1e-6)
    }

    /// New option list, if the old one needs a change
    fn rewrite(&self, options: Option<&str>) -> Option<String> {
        let mut changed = false;
        let mut has_width = false;
        let mut rewritten = Vec::new();
        for option in split_options(options.unwrap_or_default()) {
            match option_key(option) {
                "width" if has_width => changed = true,
                "width" => {
                    has_width = true;
                    changed |= !self.is_target_width(option);
                    rewritten.push(self.width_option());
                }
                // would fight the width
                "height" | "scale" => changed = true,
                _ => rewritten.push(option.to_string()),
            }
        }
        if !has_width {
            rewritten.insert(0, self.width_option());
            changed = true;
        }
        changed.then(|| rewritten.into_iter().join(","))
    }
}

impl Edit for NormalizeChartWidths {
    fn name(&self) -> &'static str {
        "widths"
    }

    fn apply<'source>(&self, source: &'source str) -> Result<Edited<'source>, EditError> {
        let graphics = regex!(r"\\includegraphics(<[^>]*>)?(?:\s*\[([^\]]*)\])?\s*\{([^}]*)\}");
        let mut splice = Splice::new();
        for captures in graphics.captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if is_commented(source, whole.start()) {
                continue;
            }
            let path = captures.get(3).map_or("", |m| m.as_str());
            if !self.filter.matches(path) {
                continue;
            }
            let Some(options) = self.rewrite(captures.get(2).map(|m| m.as_str())) else {
                continue;
            };
            let overlay = captures.get(1).map_or("", |m| m.as_str());
            splice.replace(
                whole.range(),
                format!("\\includegraphics{overlay}[{options}]{{{path}}}"),
            );
        }
        if splice.is_empty() {
            return Ok(Edited::unchanged(source));
        }
        let changes = splice.len();
        Ok(Edited {
            text: splice.apply(source),
            changes,
        })
    }
}
