use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: u32,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            lo: span.lo,
            len: span.len,
        }
    }

    /// Creates an end-of-file token positioned just after the source text.
    pub fn eof_for(src: &str) -> Token {
        let lo = u32::try_from(src.len()).unwrap_or(u32::MAX);
        Token::new(TokenKind::Eof, Span::new_of_length(lo, 0))
    }

    pub fn span(&self) -> Span {
        Span {
            lo: self.lo,
            len: self.len,
        }
    }

    /// The slice of the source this token was scanned from.
    pub fn text<'src>(&self, src: &'src str) -> &'src str {
        self.span().substr(src)
    }

    /// The 1-based line on which this token starts.
    pub fn line(&self, src: &str) -> u32 {
        self.span().line(src)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub lo: u32,
    pub len: u32,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        let lo = u32::try_from(lo).unwrap_or(u32::MAX);
        let len = u32::try_from(hi - lo as usize).unwrap_or(u32::MAX);
        Span::new_of_length(lo, len)
    }

    pub const fn new_of_length(lo: u32, len: u32) -> Span {
        Span { lo, len }
    }

    pub const fn hi(&self) -> u32 {
        self.lo + self.len
    }

    /// Returns a span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_length(lo, hi - lo)
    }

    /// Shrinks (or grows) the span on each side.
    pub fn offset(self, lo: i32, hi: i32) -> Span {
        let new_lo = self.lo.saturating_add_signed(lo);
        let new_hi = self.hi().saturating_add_signed(hi).max(new_lo);
        Span::new_of_length(new_lo, new_hi - new_lo)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo as usize..self.hi() as usize]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { inner, span: self }
    }

    /// Derives the 1-based line number of the span start.
    ///
    /// A line ends at `\n`, `\r`, `\r\n`, NEL, LINE SEPARATOR or PARAGRAPH
    /// SEPARATOR.
    pub fn line(self, src: &str) -> u32 {
        let end = (self.lo as usize).min(src.len());
        let mut line = 1;
        let mut chars = src[..end].chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    chars.next_if_eq(&'\n');
                    line += 1;
                }
                '\n' | '\u{85}' | '\u{2028}' | '\u{2029}' => line += 1,
                _ => (),
            }
        }
        line
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub inner: T,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Declarable types
    Int,
    Boolean,
    Pixel,
    Image,

    // Predefined pseudo-values
    /// Implicit horizontal coordinate.
    X,
    /// Implicit vertical coordinate.
    Y,
    Z,
    ScreenSize,

    If,
    Else,
    While,
    Pause,

    // Selectors
    Width,
    Height,
    Location,
    XLoc,
    YLoc,
    Red,
    Green,
    Blue,
    Visible,
    Shape,
    Pixels,

    True,
    False,

    Dot,
    Semicolon,
    Comma,
    Colon,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `|`
    Pipe,
    /// `&`
    Amp,
    /// `=`
    Assign,
    /// `==`
    Eq,
    /// `!`
    Bang,
    /// `!=`
    NotEq,
    Less,
    LessEq,
    /// `<<`
    Shl,
    Greater,
    GreaterEq,
    /// `>>`
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Identifier,
    Number,
    String,

    Comment,
    Eof,
}

impl TokenKind {
    pub fn is_type(self) -> bool {
        matches!(
            self,
            TokenKind::Int | TokenKind::Boolean | TokenKind::Pixel | TokenKind::Image
        )
    }

    pub fn is_opening_delim(self) -> bool {
        matches!(
            self,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace
        )
    }

    /// For a closing delimiter, returns the opening one it must match.
    pub fn matching_opener(self) -> Option<TokenKind> {
        match self {
            TokenKind::RParen => Some(TokenKind::LParen),
            TokenKind::RBracket => Some(TokenKind::LBracket),
            TokenKind::RBrace => Some(TokenKind::LBrace),
            _ => None,
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "int" => TokenKind::Int,
    "boolean" => TokenKind::Boolean,
    "pixel" => TokenKind::Pixel,
    "image" => TokenKind::Image,
    "x" => TokenKind::X,
    "y" => TokenKind::Y,
    "Z" => TokenKind::Z,
    "SCREEN_SIZE" => TokenKind::ScreenSize,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "pause" => TokenKind::Pause,
    "width" => TokenKind::Width,
    "height" => TokenKind::Height,
    "location" => TokenKind::Location,
    "x_loc" => TokenKind::XLoc,
    "y_loc" => TokenKind::YLoc,
    "red" => TokenKind::Red,
    "green" => TokenKind::Green,
    "blue" => TokenKind::Blue,
    "visible" => TokenKind::Visible,
    "shape" => TokenKind::Shape,
    "pixels" => TokenKind::Pixels,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
};
