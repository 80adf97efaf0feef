use std::{borrow::Cow, collections::VecDeque, ops::Range};

/// A set of replacements against a single source text.
///
/// Replacement ranges must not overlap; insertions are empty ranges.
/// Insertions at the same offset keep the order they were added in.
#[derive(Debug, Default)]
pub struct Splice {
    edits: Vec<(Range<usize>, String)>,
}

impl Splice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.edits.push((at..at, text.into()));
    }

    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.edits.push((range, text.into()));
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn apply<'source>(mut self, source: &'source str) -> Cow<'source, str> {
        if self.edits.is_empty() {
            return Cow::Borrowed(source);
        }
        // stable sort keeps insertion order for equal offsets
        self.edits.sort_by_key(|(range, _)| range.start);
        let extra: usize = self.edits.iter().map(|(_, text)| text.len()).sum();
        let mut output = String::with_capacity(source.len() + extra);
        let mut last = 0;
        for (range, text) in &self.edits {
            debug_assert!(range.start >= last, "Splice ranges should not overlap");
            output.push_str(&source[last..range.start]);
            output.push_str(text);
            last = range.end;
        }
        output.push_str(&source[last..]);
        Cow::Owned(output)
    }
}


/// Leading whitespace of the line containing `offset`, if the line has nothing else before it
pub fn line_indent(source: &str, offset: usize) -> Option<(usize, &str)> {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..offset];
    prefix
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some((line_start, prefix))
}

/// Substitutes `{title}` in a user-provided template
pub fn fill_title(template: &str, title: &str) -> String {
    template.replace("{title}", title)
}

#[derive(Debug)]
pub struct FmtToIo<W>(W, VecDeque<std::io::Error>);
impl<W> FmtToIo<W> {
    pub fn new(io: W) -> Self
    where
        W: std::io::Write,
    {
        Self(io, VecDeque::new())
    }

    pub fn get_error(&mut self) -> Option<std::io::Error> {
        self.1.pop_front()
    }
}
impl<W: std::io::Write> std::fmt::Write for FmtToIo<W> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if let Err(err) = self.0.write_all(s.as_bytes()) {
            self.1.push_back(err);
            return Err(std::fmt::Error);
        }
        Ok(())
    }
}
