use std::ops::{Deref, Range};

use crate::lexer::is_commented;

// Everything in here borrows from the source text.
// Editors never mutate a parsed document; they compute splices against the
// original source using the recorded spans and produce a new string.

/// A value, together with a byte range it occupies in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Range<usize>,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Range<usize>) -> Self {
        Self { value, span }
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

pub const END_FRAME: &str = "\\end{frame}";
pub const BEGIN_FRAME: &str = "\\begin{frame}";
pub const BOTTOMNOTE: &str = "\\bottomnote{";

#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'source> {
    /// `\begin{frame}` up to and including `\end{frame}`
    pub span: Range<usize>,
    pub overlay: Option<Spanned<&'source str>>,
    pub options: Option<Spanned<&'source str>>,
    pub title: Option<&'source str>,
    pub body: Spanned<&'source str>,
    /// 1-based
    pub line: usize,
}

impl<'source> Frame<'source> {
    pub fn option_list(&self) -> Vec<&'source str> {
        self.options
            .as_ref()
            .map(|options| split_options(options.value))
            .unwrap_or_default()
    }

    /// Checks for both `name` and `name=value` forms
    pub fn has_option(&self, name: &str) -> bool {
        self.option_list()
            .into_iter()
            .any(|option| option_key(option) == name)
    }

    pub fn is_plain(&self) -> bool {
        self.has_option("plain")
    }

    /// Commented-out notes don't count
    pub fn has_bottomnote(&self) -> bool {
        self.body
            .value
            .match_indices(BOTTOMNOTE)
            .any(|(i, _)| !is_commented(self.body.value, i))
    }

    /// Offset of the `\end{frame}` marker closing this frame
    pub fn end_marker_offset(&self) -> usize {
        self.body.span.end
    }

    /// Offset right after `\begin{frame}` and its overlay specification.
    /// That's where a missing option group belongs.
    pub fn options_insert_offset(&self) -> usize {
        match &self.overlay {
            Some(overlay) => overlay.span.end + 1,
            None => self.span.start + BEGIN_FRAME.len(),
        }
    }
}

pub fn split_options(options: &str) -> Vec<&str> {
    options
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .collect()
}

pub fn option_key(option: &str) -> &str {
    option
        .split_once('=')
        .map(|(key, _)| key.trim())
        .unwrap_or(option)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section<'source> {
    pub title: &'source str,
    pub starred: bool,
    pub span: Range<usize>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'source> {
    Section(Section<'source>),
    Frame(Frame<'source>),
}

impl Token<'_> {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Token::Section(section) => &section.span,
            Token::Frame(frame) => &frame.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document<'source> {
    pub source: &'source str,
    pub tokens: Vec<Token<'source>>,
}

impl<'source> Document<'source> {
    pub fn frames(&self) -> impl Iterator<Item = &Frame<'source>> + '_ {
        self.tokens.iter().filter_map(|token| match token {
            Token::Frame(frame) => Some(frame),
            Token::Section(_) => None,
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section<'source>> + '_ {
        self.tokens.iter().filter_map(|token| match token {
            Token::Section(section) => Some(section),
            Token::Frame(_) => None,
        })
    }
}


#[cfg(test)]
mod frame_tests {
    use crate::lex;

    macro_rules! bottomnote {
        {$name:ident, $input:literal, $output:literal} => {
            #[test]
            fn $name() {
                // arrange
                let document = lex($input).expect("Should be able to lex");

                // act
                let output = document.frames().next().map(|frame| frame.has_bottomnote());

                // assert
                assert_eq!(output, Some($output));
            }
        };
    }

    bottomnote! {present, "\\begin{frame}{A}\n\\bottomnote{Fees}\n\\end{frame}", true}
    bottomnote! {absent, "\\begin{frame}{A}\ntext\n\\end{frame}", false}
    bottomnote! {commented, "\\begin{frame}{A}\n% \\bottomnote{todo}\n\\end{frame}", false}
    bottomnote! {after_text_comment, "\\begin{frame}{A}\nFees % \\bottomnote{todo}\n\\end{frame}", false}
    bottomnote! {escaped_percent, "\\begin{frame}{A}\n2\\% \\bottomnote{Fees}\n\\end{frame}", true}
    bottomnote! {live_after_commented, "\\begin{frame}{A}\n% \\bottomnote{old}\n\\bottomnote{new}\n\\end{frame}", true}
}
