use cached::proc_macro::cached;
use regex::Regex;

use crate::{
    data::{option_key, Frame},
    lexer::lex,
    util::Splice,
};

use super::{Edit, EditError, Edited};

const VERBATIM_MARKERS: [&str; 5] = [
    "\\begin{verbatim}",
    "\\begin{lstlisting}",
    "\\begin{minted}",
    "\\verb",
    "\\lstinline",
];

#[cached]
fn frame_pattern(pattern: String) -> Result<Regex, regex::Error> {
    Regex::new(&pattern)
}

/// Decides which frames receive the option
#[derive(Debug, Clone, PartialEq)]
pub enum OptionCondition {
    Always,
    /// Frames with verbatim-like content, which Beamer needs `fragile` for
    Verbatim,
    BodyMatches(String),
}

impl OptionCondition {
    fn holds(&self, frame: &Frame<'_>) -> Result<bool, EditError> {
        Ok(match self {
            OptionCondition::Always => true,
            OptionCondition::Verbatim => VERBATIM_MARKERS
                .iter()
                .any(|marker| frame.body.contains(marker)),
            OptionCondition::BodyMatches(pattern) => {
                frame_pattern(pattern.clone())?.is_match(frame.body.value)
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddFrameOption {
    option: String,
    when: OptionCondition,
}

impl AddFrameOption {
    /// The option has to be a single `name` or `name=value` with a non-empty name
    pub fn new(option: impl Into<String>, when: OptionCondition) -> Result<Self, EditError> {
        let option = option.into().trim().to_string();
        if option.contains(',') || option_key(&option).is_empty() {
            return Err(EditError::InvalidOption(option));
        }
        if let OptionCondition::BodyMatches(pattern) = &when {
            // fail early, before any file is touched
            frame_pattern(pattern.clone())?;
        }
        Ok(Self { option, when })
    }

    /// The familiar `fragile`-for-verbatim fix
    pub fn fragile() -> Self {
        Self {
            option: "fragile".to_string(),
            when: OptionCondition::Verbatim,
        }
    }
}

impl Edit for AddFrameOption {
    fn name(&self) -> &'static str {
        "frame-options"
    }

    fn apply<'source>(&self, source: &'source str) -> Result<Edited<'source>, EditError> {
        let document = lex(source)?;
        let key = option_key(&self.option);
        let mut splice = Splice::new();
        for frame in document.frames() {
            if frame.has_option(key) || !self.when.holds(frame)? {
                continue;
            }
            match &frame.options {
                Some(options) => {
                    let existing = options.value.trim_end();
                    let separator = if existing.trim().is_empty() || existing.ends_with(',') {
                        ""
                    } else {
                        ","
                    };
                    splice.insert(
                        options.span.start + existing.len(),
                        format!("{separator}{}", self.option),
                    );
                }
                None => splice.insert(frame.options_insert_offset(), format!("[{}]", self.option)),
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test {
        {$name:ident, $edit:expr, $input:literal, $output:literal} => {
            #[test]
            fn $name() {
                // arrange
                let edit = $edit;

                // act
                let edited = edit.apply($input).expect("Should be able to apply");

                // assert
                assert_eq!(edited.text, $output);
            }
        };
    }

    fn always(option: &str) -> AddFrameOption {
        AddFrameOption::new(option, OptionCondition::Always).expect("Should be valid")
    }

    test! {no_options, always("t"),
        "\\begin{frame}{A}\n\\end{frame}",
        "\\begin{frame}[t]{A}\n\\end{frame}"}
    test! {append, always("t"),
        "\\begin{frame}[plain]{A}\n\\end{frame}",
        "\\begin{frame}[plain,t]{A}\n\\end{frame}"}
    test! {append_spaced, always("t"),
        "\\begin{frame}[plain, label=x ]{A}\n\\end{frame}",
        "\\begin{frame}[plain, label=x,t ]{A}\n\\end{frame}"}
    test! {empty_options, always("t"),
        "\\begin{frame}[]{A}\n\\end{frame}",
        "\\begin{frame}[t]{A}\n\\end{frame}"}
    test! {present, always("t"),
        "\\begin{frame}[ t ]{A}\n\\end{frame}",
        "\\begin{frame}[ t ]{A}\n\\end{frame}"}
    test! {after_overlay, always("t"),
        "\\begin{frame}<2->{A}\n\\end{frame}",
        "\\begin{frame}<2->[t]{A}\n\\end{frame}"}
    test! {key_value_present, always("label=intro"),
        "\\begin{frame}[label=other]{A}\n\\end{frame}",
        "\\begin{frame}[label=other]{A}\n\\end{frame}"}
    test! {fragile_verbatim, AddFrameOption::fragile(),
        "\\begin{frame}{Code}\n\\begin{verbatim}\nx = 1\n\\end{verbatim}\n\\end{frame}\n\\begin{frame}{Text}\n\\end{frame}",
        "\\begin{frame}[fragile]{Code}\n\\begin{verbatim}\nx = 1\n\\end{verbatim}\n\\end{frame}\n\\begin{frame}{Text}\n\\end{frame}"}
    test! {body_matches, AddFrameOption::new("shrink", OptionCondition::BodyMatches(r"\\begin\{tabular\}".into())).unwrap(),
        "\\begin{frame}{Table}\n\\begin{tabular}{cc}\\end{tabular}\n\\end{frame}\n\\begin{frame}{Other}\n\\end{frame}",
        "\\begin{frame}[shrink]{Table}\n\\begin{tabular}{cc}\\end{tabular}\n\\end{frame}\n\\begin{frame}{Other}\n\\end{frame}"}

    #[test]
    fn bad_pattern() {
        // arrange
        let pattern = OptionCondition::BodyMatches("(unclosed".into());

        // act
        let output = AddFrameOption::new("t", pattern);

        // assert
        assert!(matches!(output, Err(EditError::Pattern(_))));
    }

    macro_rules! invalid {
        {$name:ident, $option:literal} => {
            #[test]
            fn $name() {
                // arrange

                // act
                let output = AddFrameOption::new($option, OptionCondition::Always);

                // assert
                assert!(matches!(output, Err(EditError::InvalidOption(_))));
            }
        };
    }

    invalid! {empty_option, ""}
    invalid! {blank_option, "  "}
    invalid! {nameless_option, "=x"}
    invalid! {two_options, "t,fragile"}

    #[test]
    fn idempotent() {
        // arrange
        let source = "\\begin{frame}{A}\n\\end{frame}\n\\begin{frame}[plain]\n\\end{frame}";

        for edit in [always("t"), always(" label = intro ")] {
            // act
            let once = edit.apply(source).expect("Should be able to apply");
            let twice = edit.apply(&once.text).expect("Should be able to apply again");

            // assert
            assert_eq!(once.changes, 2);
            assert_eq!(twice.changes, 0);
        }
    }
}
