use nom::{
    bytes::complete::tag,
    character::complete::{char, space0},
    combinator::opt,
    error::{ErrorKind, ParseError},
    sequence::preceded,
    IResult, Offset,
};

use crate::data::{Document, Frame, Section, Spanned, Token, BEGIN_FRAME, END_FRAME};

const SECTION: &str = "\\section";
const FRAME_TITLE: &str = "\\frametitle";

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum LexError {
    #[error("Frame at line {line} is never closed with \\end{{frame}}")]
    UnterminatedFrame { line: usize },
    #[error("Group opened at line {line} is never closed")]
    UnbalancedGroup { line: usize },
}

/// Byte offsets of line starts, for reporting
struct LineIndex(Vec<usize>);

impl LineIndex {
    fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self(starts)
    }

    fn line(&self, offset: usize) -> usize {
        match self.0.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

/// Parses a delimited group, returning it's inner text.
///
/// Groups nest, and escaped delimiters (`\{`) are skipped.
/// A group that is opened, but never closed, is a failure.
fn group<'source, E: ParseError<&'source str>>(
    open: char,
    close: char,
) -> impl FnMut(&'source str) -> IResult<&'source str, &'source str, E> {
    move |input: &'source str| {
        let (inner, _) = char(open)(input)?;
        let mut depth = 0usize;
        let mut escaped = false;
        for (i, c) in inner.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            if c == '\\' {
                escaped = true;
            } else if c == close {
                if depth == 0 {
                    return Ok((&inner[i + c.len_utf8()..], &inner[..i]));
                }
                depth -= 1;
            } else if c == open {
                depth += 1;
            }
        }
        Err(nom::Err::Failure(E::from_error_kind(input, ErrorKind::Char)))
    }
}

type FrameHead<'source> = (
    Option<&'source str>,
    Option<&'source str>,
    Option<&'source str>,
);

/// Parses `\begin{frame}<overlay>[options]{title}`, everything except the keyword being optional
fn frame_head<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, FrameHead<'source>, E> {
    let (input, _) = tag(BEGIN_FRAME)(input)?;
    let (input, overlay) = opt(group('<', '>'))(input)?;
    let (input, options) = opt(preceded(space0, group('[', ']')))(input)?;
    let (input, title) = opt(preceded(space0, group('{', '}')))(input)?;
    Ok((input, (overlay, options, title)))
}

/// Parses `\section`, `\section*` and `\section[short]{long}`
fn section_head<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, (bool, &'source str), E> {
    let (input, _) = tag(SECTION)(input)?;
    let (input, star) = opt(char('*'))(input)?;
    let (input, _) = opt(preceded(space0, group('[', ']')))(input)?;
    let (input, title) = preceded(space0, group('{', '}'))(input)?;
    Ok((input, (star.is_some(), title)))
}

fn frame_title<'source, E: ParseError<&'source str>>(
    input: &'source str,
) -> IResult<&'source str, &'source str, E> {
    let (input, _) = tag(FRAME_TITLE)(input)?;
    let (input, _) = opt(preceded(space0, group('<', '>')))(input)?;
    let (input, _) = opt(preceded(space0, group('[', ']')))(input)?;
    preceded(space0, group('{', '}'))(input)
}

/// Whether there's an unescaped `%` earlier on the same line
pub(crate) fn is_commented(source: &str, offset: usize) -> bool {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..offset];
    prefix
        .char_indices()
        .any(|(i, c)| c == '%' && !prefix[..i].ends_with('\\'))
}

/// Finds first uncommented occurrence of a pattern, at or after `from`
fn find_live(source: &str, pattern: &str, from: usize) -> Option<usize> {
    source[from..]
        .match_indices(pattern)
        .map(|(i, _)| from + i)
        .find(|&i| !is_commented(source, i))
}

/// Mandatory argument of the first uncommented `command`, an optional `[...]` before it skipped.
///
/// Longer commands sharing the prefix (`\titlepage` for `\title`) don't match.
pub(crate) fn command_argument<'source>(source: &'source str, command: &str) -> Option<&'source str> {
    let mut from = 0;
    while let Some(at) = find_live(source, command, from) {
        from = at + command.len();
        let argument: IResult<&str, &str, nom::error::Error<&str>> = preceded(
            opt(preceded(space0, group('[', ']'))),
            preceded(space0, group('{', '}')),
        )(&source[from..]);
        if let Ok((_, argument)) = argument {
            return Some(argument);
        }
    }
    None
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn lex_frame<'source>(
    source: &'source str,
    start: usize,
    lines: &LineIndex,
) -> Result<Frame<'source>, LexError> {
    let line = lines.line(start);
    let (rest, (overlay, options, title)) =
        frame_head::<nom::error::Error<&str>>(&source[start..])
            .map_err(|_| LexError::UnbalancedGroup { line })?;
    let body_start = source.offset(rest);
    let body_end =
        find_live(source, END_FRAME, body_start).ok_or(LexError::UnterminatedFrame { line })?;
    let body = &source[body_start..body_end];

    let spanned = |inner: &'source str| {
        let from = source.offset(inner);
        Spanned::new(inner, from..from + inner.len())
    };

    let title = non_empty(title).or_else(|| {
        let at = find_live(body, FRAME_TITLE, 0)?;
        frame_title::<nom::error::Error<&str>>(&body[at..])
            .ok()
            .and_then(|(_, title)| non_empty(Some(title)))
    });

    Ok(Frame {
        span: start..body_end + END_FRAME.len(),
        overlay: overlay.map(spanned),
        options: options.map(spanned),
        title,
        body: Spanned::new(body, body_start..body_end),
        line,
    })
}

/// Next uncommented frame or section candidate
fn next_candidate(source: &str, from: usize) -> Option<usize> {
    let frame = find_live(source, BEGIN_FRAME, from);
    let section = find_live(source, SECTION, from);
    match (frame, section) {
        (Some(frame), Some(section)) => Some(frame.min(section)),
        (frame, section) => frame.or(section),
    }
}

/// Extracts frames and sections from a Beamer source, in order of appearance
pub fn lex(source: &str) -> Result<Document<'_>, LexError> {
    let lines = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = next_candidate(source, cursor) {
        let rest = &source[offset..];
        if rest.starts_with(BEGIN_FRAME) {
            let frame = lex_frame(source, offset, &lines)?;
            cursor = frame.span.end;
            tokens.push(Token::Frame(frame));
            continue;
        }
        match section_head::<nom::error::Error<&str>>(rest) {
            Ok((after, (starred, title))) => {
                let end = source.offset(after);
                tokens.push(Token::Section(Section {
                    title: title.trim(),
                    starred,
                    span: offset..end,
                    line: lines.line(offset),
                }));
                cursor = end;
            }
            Err(nom::Err::Failure(_)) => {
                return Err(LexError::UnbalancedGroup {
                    line: lines.line(offset),
                })
            }
            // something like `\sectionfont`, not a section
            Err(_) => cursor = offset + SECTION.len(),
        }
    }

    Ok(Document { source, tokens })
}

#[cfg(test)]
mod group_tests {
    use super::*;

    macro_rules! test {
        {$name:ident, $input:literal, $rest:literal, $inner:literal} => {
            #[test]
            fn $name() {
                // arrange

                // act
                let output = group::<nom::error::Error<&str>>('{', '}')($input);

                // assert
                assert_eq!(output.expect("Should be able to parse"), ($rest, $inner));
            }
        };
    }

    test! {simple, "{abc} rest", " rest", "abc"}
    test! {nested, r"{\textbf{a}b}", "", r"\textbf{a}b"}
    test! {escaped, r"{50\}% off}!", "!", r"50\}% off"}
    test! {empty, "{}", "", ""}

    #[test]
    fn unclosed_is_failure() {
        // arrange
        let input = "{never closed";

        // act
        let output = group::<nom::error::Error<&str>>('{', '}')(input);

        // assert
        assert!(matches!(output, Err(nom::Err::Failure(_))));
    }

    #[test]
    fn absent_is_error() {
        // arrange
        let input = "no group";

        // act
        let output = group::<nom::error::Error<&str>>('{', '}')(input);

        // assert
        assert!(matches!(output, Err(nom::Err::Error(_))));
    }
}

#[cfg(test)]
mod lex_tests {
    use super::*;

    fn frames(source: &str) -> Vec<Frame<'_>> {
        lex(source)
            .expect("Should be able to lex")
            .frames()
            .cloned()
            .collect()
    }

    macro_rules! title {
        {$name:ident, $input:literal, $title:expr} => {
            #[test]
            fn $name() {
                // arrange

                // act
                let frames = frames($input);

                // assert
                assert_eq!(frames.len(), 1, "Should find a single frame");
                assert_eq!(frames[0].title, $title);
            }
        };
    }

    title! {inline_title, "\\begin{frame}{Payments}\nbody\n\\end{frame}", Some("Payments")}
    title! {options_title, "\\begin{frame}[t]{Payments}\nbody\n\\end{frame}", Some("Payments")}
    title! {overlay_options_title, "\\begin{frame}<1->[fragile] {Payments}\nbody\n\\end{frame}", Some("Payments")}
    title! {frametitle, "\\begin{frame}[t]\n\\frametitle{Tokenization}\nbody\n\\end{frame}", Some("Tokenization")}
    title! {no_title, "\\begin{frame}[plain]\n\\titlepage\n\\end{frame}", None}
    title! {empty_title, "\\begin{frame}{}\nbody\n\\end{frame}", None}
    title! {nested_title, "\\begin{frame}{The \\textit{real} cost}\nx\n\\end{frame}", Some("The \\textit{real} cost")}

    #[test]
    fn spans() {
        // arrange
        let source = "pre\n\\begin{frame}[t]{A}\nbody\n\\end{frame}\npost";

        // act
        let frames = frames(source);

        // assert
        let frame = &frames[0];
        assert_eq!(&source[frame.span.clone()], "\\begin{frame}[t]{A}\nbody\n\\end{frame}");
        assert_eq!(&source[frame.options.as_ref().unwrap().span.clone()], "t");
        assert_eq!(frame.body.value, "\nbody\n");
        assert_eq!(&source[frame.end_marker_offset()..], "\\end{frame}\npost");
        assert_eq!(frame.line, 2);
    }

    #[test]
    fn order_of_tokens() {
        // arrange
        let source = "\\section{Intro}\n\\begin{frame}{A}\n\\end{frame}\n\\section*{Outro}\n\\begin{frame}{B}\n\\end{frame}\n";

        // act
        let document = lex(source).expect("Should be able to lex");

        // assert
        let kinds = document
            .tokens
            .iter()
            .map(|token| match token {
                Token::Section(section) => format!("s:{}", section.title),
                Token::Frame(frame) => format!("f:{}", frame.title.unwrap_or_default()),
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, ["s:Intro", "f:A", "s:Outro", "f:B"]);
        assert!(document.sections().nth(1).unwrap().starred);
    }

    #[test]
    fn short_section_title() {
        // arrange
        let source = "\\section[Short]{A much longer title}\n";

        // act
        let document = lex(source).expect("Should be able to lex");

        // assert
        assert_eq!(document.sections().next().unwrap().title, "A much longer title");
    }

    #[test]
    fn commented_frames_are_ignored() {
        // arrange
        let source = "% \\begin{frame}{Old}\n%\\end{frame}\n\\begin{frame}{New}\n% \\end{frame}\nx\n\\end{frame}\n";

        // act
        let frames = frames(source);

        // assert
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].title, Some("New"));
        assert_eq!(frames[0].body.value, "\n% \\end{frame}\nx\n");
    }

    #[test]
    fn escaped_percent_is_not_a_comment() {
        // arrange
        let source = "Growth of 5\\% \\begin{frame}{A}\n\\end{frame}";

        // act
        let frames = frames(source);

        // assert
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn section_inside_frame_belongs_to_body() {
        // arrange
        let source = "\\begin{frame}[fragile]{Code}\n\\begin{verbatim}\n\\section{x}\n\\end{verbatim}\n\\end{frame}";

        // act
        let document = lex(source).expect("Should be able to lex");

        // assert
        assert_eq!(document.tokens.len(), 1);
    }

    #[test]
    fn section_like_commands_are_skipped() {
        // arrange
        let source = "\\sectionfont{\\bfseries}\n\\setbeamertemplate{section page}{}\n";

        // act
        let document = lex(source).expect("Should be able to lex");

        // assert
        assert!(document.tokens.is_empty());
    }

    #[test]
    fn empty_source() {
        assert!(lex("").expect("Should be able to lex").tokens.is_empty());
    }

    #[test]
    fn unterminated_frame() {
        // arrange
        let source = "line one\n\\begin{frame}{A}\nnever closed\n";

        // act
        let output = lex(source);

        // assert
        assert_eq!(output, Err(LexError::UnterminatedFrame { line: 2 }));
    }

    #[test]
    fn unbalanced_title() {
        // arrange
        let source = "\\begin{frame}{A\n\\end{frame}";

        // act
        let output = lex(source);

        // assert
        assert_eq!(output, Err(LexError::UnbalancedGroup { line: 1 }));
    }
}
