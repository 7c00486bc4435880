use std::fmt;

use crate::token::Span;

/// A human-facing source position. Both fields are 1-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn of(src: &str, span: Span) -> Location {
        let lo = (span.lo as usize).min(src.len());
        let line_start = line_start(src, lo);
        let column = src[line_start..lo].chars().count() + 1;
        Location {
            line: span.line(src),
            column: u32::try_from(column).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

fn line_start(src: &str, offset: usize) -> usize {
    src[..offset]
        .rfind(['\n', '\r', '\u{85}', '\u{2028}', '\u{2029}'])
        .map_or(0, |i| {
            i + src[i..].chars().next().map_or(1, char::len_utf8)
        })
}

/// Precomputed line starts, for repeated line lookups over the same source.
/// Agrees with [`Span::line`].
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(src: &str) -> LineIndex {
        let mut starts = vec![0];
        let mut chars = src.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let next = match c {
                '\r' => match chars.next_if(|&(_, c)| c == '\n') {
                    Some((j, _)) => j + 1,
                    None => i + 1,
                },
                '\n' | '\u{85}' | '\u{2028}' | '\u{2029}' => i + c.len_utf8(),
                _ => continue,
            };
            starts.push(u32::try_from(next).unwrap_or(u32::MAX));
        }
        LineIndex { starts }
    }

    /// The 1-based line of the span start.
    pub fn line(&self, span: Span) -> u32 {
        let line = self.starts.partition_point(|&start| start <= span.lo);
        u32::try_from(line).unwrap_or(u32::MAX)
    }
}

/// Renders the source line holding the span start, with a caret marker
/// underneath the spanned text (clamped to that line).
pub struct Snippet<'src> {
    src: &'src str,
    span: Span,
}

impl<'src> Snippet<'src> {
    pub fn new(src: &'src str, span: Span) -> Snippet<'src> {
        Snippet { src, span }
    }
}

impl fmt::Display for Snippet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = (self.span.lo as usize).min(self.src.len());
        let start = line_start(self.src, lo);
        let line = self.src[start..]
            .split(['\n', '\r', '\u{85}', '\u{2028}', '\u{2029}'])
            .next()
            .unwrap_or_default();
        let pad = self.src[start..lo].chars().count();
        let hi = (self.span.hi() as usize).clamp(lo, start + line.len());
        let marks = self.src[lo..hi].chars().count().max(1);
        writeln!(f, "{line}")?;
        write!(f, "{:pad$}{:^<marks$}", "", "")
    }
}
