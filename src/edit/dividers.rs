use crate::{
    data::Token,
    lexer::lex,
    util::{fill_title, Splice},
};

use super::{Edit, EditError, Edited};

/// Plain frame with a centered section title.
///
/// Custom templates should stay `plain` and mention `{title}` in the body,
/// otherwise inserted dividers won't be recognized on the next run.
pub const DEFAULT_DIVIDER: &str = "\\begin{frame}[plain]
\\vfill
\\centering
{\\Large\\textbf{{title}}}
\\vfill
\\end{frame}";

#[derive(Debug, Clone)]
pub struct AddSectionDividers {
    template: String,
}

impl Default for AddSectionDividers {
    fn default() -> Self {
        Self::new(DEFAULT_DIVIDER)
    }
}

impl AddSectionDividers {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Edit for AddSectionDividers {
    fn name(&self) -> &'static str {
        "dividers"
    }

    fn apply<'source>(&self, source: &'source str) -> Result<Edited<'source>, EditError> {
        let document = lex(source)?;
        let mut splice = Splice::new();
        for (i, token) in document.tokens.iter().enumerate() {
            let Token::Section(section) = token else {
                continue;
            };
            let has_divider = matches!(
                document.tokens.get(i + 1),
                Some(Token::Frame(frame)) if frame.is_plain() && frame.body.contains(section.title)
            );
            if has_divider {
                continue;
            }
            let divider = fill_title(&self.template, section.title);
            splice.insert(section.span.end, format!("\n{}", divider.trim_end()));
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
