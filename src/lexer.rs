use std::{fmt, iter::Peekable, num::ParseIntError};

use tracing::debug;

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// An explicit end-of-input marker. Everything after it is ignored.
const END_OF_INPUT: char = '\u{1a}';

pub type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// The output of a successful scan.
#[derive(Debug, Default)]
pub struct Lexed {
    /// Every non-comment token, terminated by a single [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub comments: Vec<Token>,
}

/// Lexes the provided string, producing the tokens and comments into the
/// provided buffers.
///
/// A lexical error aborts the scan; the buffers then hold whatever was
/// scanned before the offending position.
pub fn lex(src: &str, tokens: &mut Vec<Token>, comments: &mut Vec<Token>) -> Result<()> {
    Lexer::new(src, tokens, comments).lex()
}

/// A convenience function that allocates new buffers per lexed input and
/// returns them.
pub fn lex_in_new(src: &str) -> Result<Lexed> {
    let mut lexed = Lexed {
        tokens: Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY),
        comments: Vec::new(),
    };
    lex(src, &mut lexed.tokens, &mut lexed.comments)?;
    Ok(lexed)
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
    comments: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) -> Result<()> {
        assert!(self.tokens.is_empty(), "must pass clean tokens buffer");
        assert!(self.comments.is_empty(), "must pass clean comments buffer");
        loop {
            let kind = self.scan_token_kind()?;
            let token = Token::new(kind, self.span());
            match kind {
                TokenKind::Comment => self.comments.push(token),
                TokenKind::Eof => {
                    self.tokens.push(token);
                    break;
                }
                _ => self.tokens.push(token),
            }
        }
        debug!(
            tokens = self.tokens.len(),
            comments = self.comments.len(),
            "lexed source"
        );
        Ok(())
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> Result<TokenKind> {
        use TokenKind::*;
        self.skip_whitespace();
        let Some(c) = self.mark_advance() else {
            return Ok(Eof);
        };
        let kind = match c {
            END_OF_INPUT => Eof,
            '.' => Dot,
            ';' => Semicolon,
            ',' => Comma,
            ':' => Colon,
            '?' => Question,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            '|' => Pipe,
            '&' => Amp,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '%' => Percent,
            '=' => match self.peek() {
                Some('=') => self.advance_with(Eq),
                _ => Assign,
            },
            '!' => match self.peek() {
                Some('=') => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                Some('=') => self.advance_with(LessEq),
                Some('<') => self.advance_with(Shl),
                _ => Less,
            },
            '>' => match self.peek() {
                Some('=') => self.advance_with(GreaterEq),
                Some('>') => self.advance_with(Shr),
                _ => Greater,
            },
            '/' => match self.peek() {
                Some('/') => self.line_comment(),
                _ => Slash,
            },
            '"' => self.string()?,
            c if is_identifier_start(c) => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c => return Err(self.span().wrap(Error::UnexpectedChar(c))),
        };
        Ok(kind)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Consumes a string literal. A backslash escapes exactly one character,
    /// which may be a quote.
    fn string(&mut self) -> Result<TokenKind> {
        let mut is_escaping = false;
        loop {
            match (is_escaping, self.advance()) {
                (_, None) => {
                    return Err(self.span().wrap(Error::UnclosedString));
                }
                (false, Some('"')) => return Ok(TokenKind::String),
                (false, Some('\\')) => is_escaping = true,
                (_, Some(_)) => is_escaping = false,
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while self.peek().is_some_and(is_identifier_part) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        TokenKind::Number
    }

    fn line_comment(&mut self) -> TokenKind {
        assert_eq!(self.advance(), Some('/'));
        while self.peek().is_some_and(|c| !is_line_terminator(c)) {
            self.advance();
        }
        TokenKind::Comment
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(
        src: &'src str,
        tokens: &'tok mut Vec<Token>,
        comments: &'tok mut Vec<Token>,
    ) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            tokens,
            comments,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_line_terminator(c: char) -> bool {
    matches!(
        c,
        '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}' | END_OF_INPUT
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar(char),
    UnclosedString,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedChar(c) => write!(f, "illegal character {c:?}"),
            Error::UnclosedString => write!(f, "string literal is not closed with '\"'"),
        }
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i32, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.text(src).parse()
    }

    /// Returns the string literal contents, without quotes and with escapes
    /// resolved.
    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let raw = token.span().offset(1, -1).substr(src);
        if !raw.contains('\\') {
            return Box::from(raw);
        }
        let mut buf = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => buf.extend(chars.next()),
                c => buf.push(c),
            }
        }
        buf.into_boxed_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_no_errors() {
        let input = include_str!("../demos/bounce.plp");
        let lexed = lex_in_new(input).expect("demo must lex");
        assert!(!lexed.comments.is_empty());
        assert_eq!(lexed.tokens.iter().filter(|t| t.is_eof()).count(), 1);
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/%" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Percent, 4..5),
                (Eof, 5..5),
            ],
            "= == ! != < <= << > >= >>" => [
                (Assign, 0..1),
                (Eq, 2..4),
                (Bang, 5..6),
                (NotEq, 7..9),
                (Less, 10..11),
                (LessEq, 12..14),
                (Shl, 15..17),
                (Greater, 18..19),
                (GreaterEq, 20..22),
                (Shr, 23..25),
                (Eof, 25..25),
            ],
            "<<=>>=" => [
                (Shl, 0..2),
                (Assign, 2..3),
                (Shr, 3..5),
                (Assign, 5..6),
                (Eof, 6..6),
            ],
            "(){}[].,;:?|&" => [
                (LParen, 0..1),
                (RParen, 1..2),
                (LBrace, 2..3),
                (RBrace, 3..4),
                (LBracket, 4..5),
                (RBracket, 5..6),
                (Dot, 6..7),
                (Comma, 7..8),
                (Semicolon, 8..9),
                (Colon, 9..10),
                (Question, 10..11),
                (Pipe, 11..12),
                (Amp, 12..13),
                (Eof, 13..13),
            ],
            "int boolean pixel image x y Z SCREEN_SIZE" => [
                (Int, 0..3),
                (Boolean, 4..11),
                (Pixel, 12..17),
                (Image, 18..23),
                (X, 24..25),
                (Y, 26..27),
                (Z, 28..29),
                (ScreenSize, 30..41),
                (Eof, 41..41),
            ],
            "z X Int xy x_loc pixels" => [
                (Identifier, 0..1),
                (Identifier, 2..3),
                (Identifier, 4..7),
                (Identifier, 8..10),
                (XLoc, 11..16),
                (Pixels, 17..23),
                (Eof, 23..23),
            ],
            "1/11/007/123456789" => [
                (Number, 0..1),
                (Slash, 1..2),
                (Number, 2..4),
                (Slash, 4..5),
                (Number, 5..8),
                (Slash, 8..9),
                (Number, 9..18),
                (Eof, 18..18),
            ],
            r#"""/"a b"/"q\"q""# => [
                (String, 0..2),
                (Slash, 2..3),
                (String, 3..8),
                (Slash, 8..9),
                (String, 9..15),
                (Eof, 15..15),
            ],
            "a \u{1a} b" => [(Identifier, 0..1), (Eof, 2..3)],
        });

        for (input, tokens) in cases {
            let lexed = lex_in_new(input).expect("must lex");
            assert_eq!(lexed.tokens, tokens.as_slice(), "input: {input:?}");
        }
    }

    #[test]
    fn comments_are_split_out() {
        let src = "a // first\nb //second\r\nc // last";
        let lexed = lex_in_new(src).unwrap();
        let kinds: Vec<_> = lexed.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        let comments: Vec<_> = lexed.comments.iter().map(|t| t.text(src)).collect();
        assert_eq!(comments, ["// first", "//second", "// last"]);
        assert_eq!(lexed.tokens[2].line(src), 3);
    }

    #[test]
    fn unclosed_string_is_fatal() {
        let error = lex_in_new("a = \"never closed").unwrap_err();
        assert_eq!(error.inner, Error::UnclosedString);
        assert_eq!(error.span.lo, 4);
    }

    #[test]
    fn escaped_quote_at_end_is_unclosed() {
        let error = lex_in_new(r#""abc\""#).unwrap_err();
        assert_eq!(error.inner, Error::UnclosedString);
        assert_eq!(error.span, Span::new_of_bounds(0..6));
    }

    #[test]
    fn illegal_character_is_fatal() {
        let error = lex_in_new("a = 1 # 2").unwrap_err();
        assert_eq!(error.inner, Error::UnexpectedChar('#'));
        assert_eq!(error.span, Span::new_of_bounds(6..7));
    }

    #[test]
    fn extracts_literal_values() {
        let src = r#"42 "a\"b\\c""#;
        let lexed = lex_in_new(src).unwrap();
        assert_eq!(extract::int(lexed.tokens[0], src), Ok(42));
        assert_eq!(&*extract::string(lexed.tokens[1], src), r#"a"b\c"#);
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
