use std::fmt;

use tracing::debug;

use crate::{
    ast::{
        Attribute, BinaryOperator, Dec, Expr, ExprKind, Ident, PixelExpr, Predefined, Program,
        Stmt, StmtKind, UnaryOperator, Untyped,
    },
    lexer::extract,
    token::{Span, Spanned, Token, TokenKind},
    types::DeclType,
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T>;

/// Parses a whole program from the lexed tokens (comments excluded).
///
/// The first syntax error aborts parsing.
pub fn parse_program(
    src: &str,
    tokens: &[Token],
    ident_interner: &mut Interner,
) -> ParseResult<Program<Untyped>> {
    parse(src, tokens, ident_interner, Parser::parse_program)
}

/// Parses a single expression. Mostly useful for tests and tooling.
pub fn parse_expr(
    src: &str,
    tokens: &[Token],
    ident_interner: &mut Interner,
) -> ParseResult<Expr<Untyped>> {
    parse(src, tokens, ident_interner, |p| {
        let expr = p.parse_expr()?;
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, 'ident, T>(
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner,
    f: impl for<'a> FnOnce(&'a mut Parser<'src, 'tok, 'ident>) -> Result<T>,
) -> ParseResult<T> {
    check_delimiters(tokens)?;
    let mut p = Parser::new(src, tokens, ident_interner);
    let parsed = f(&mut p)?;
    debug!(consumed = p.cursor, "parsed token stream");
    Ok(parsed)
}

/// Checks that every `(`, `[` and `{` is closed by its matching delimiter,
/// across the whole token sequence.
pub fn check_delimiters(tokens: &[Token]) -> Result<()> {
    let mut open: Vec<Token> = Vec::with_capacity(16);
    for token in tokens {
        if token.kind.is_opening_delim() {
            open.push(*token);
        } else if let Some(opener) = token.kind.matching_opener() {
            match open.pop() {
                Some(top) if top.kind == opener => (),
                _ => {
                    let error = Error::UnbalancedDelimiter { found: token.kind };
                    return Err(token.span().wrap(error));
                }
            }
        }
    }
    match open.pop() {
        Some(unclosed) => {
            let error = Error::UnclosedDelimiter {
                opener: unclosed.kind,
            };
            Err(unclosed.span().wrap(error))
        }
        None => Ok(()),
    }
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner,
    cursor: usize,
}

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Program<Untyped>> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;

        let mut decs = Vec::with_capacity(8);
        while self.peek().kind.is_type() {
            decs.push(self.parse_dec()?);
        }

        let mut stmts = Vec::with_capacity(16);
        while self.except(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::RBrace)?;
        self.consume(TokenKind::Eof)?;

        Ok(Program { name, decs, stmts })
    }

    fn parse_dec(&mut self) -> Result<Dec> {
        let ty_token = self.advance();
        let ty = match ty_token.kind {
            TokenKind::Int => DeclType::Int,
            TokenKind::Boolean => DeclType::Boolean,
            TokenKind::Pixel => DeclType::Pixel,
            TokenKind::Image => DeclType::Image,
            _ => unreachable!("caller checks for a type keyword"),
        };
        let name = self.parse_ident()?;
        let end = self.consume(TokenKind::Semicolon)?;
        Ok(Dec {
            ty,
            name,
            span: ty_token.span().to(end.span()),
        })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt<Untyped>>, Span)> {
        let start = self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while self.except(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.consume(TokenKind::RBrace)?;
        Ok((stmts, start.span().to(end.span())))
    }

    fn parse_stmt(&mut self) -> Result<Stmt<Untyped>> {
        let start = self.advance();
        let (kind, end) = match start.kind {
            // Alternative: if ( expr ) block [else block]
            TokenKind::If => {
                let condition = self.parse_condition()?;
                let (then_body, mut end) = self.parse_block()?;
                let else_body = if self.take(TokenKind::Else) {
                    let (else_body, else_span) = self.parse_block()?;
                    end = else_span;
                    else_body
                } else {
                    Vec::new()
                };
                let alt = StmtKind::Alternative {
                    condition,
                    then_body,
                    else_body,
                };
                (alt, end)
            }

            // Iteration: while ( expr ) block
            TokenKind::While => {
                let condition = self.parse_condition()?;
                let (body, end) = self.parse_block()?;
                (StmtKind::Iteration { condition, body }, end)
            }

            // Pause: pause expr ;
            TokenKind::Pause => {
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Pause(expr), end.span())
            }

            TokenKind::Identifier => {
                let target = self.ident_of(start);
                let kind = self.parse_assignment(target)?;
                let end = self.consume(TokenKind::Semicolon)?;
                (kind, end.span())
            }

            other => {
                let error = Error::UnexpectedTokenInStmt { token: other };
                return Err(start.span().wrap(error));
            }
        };

        Ok(Stmt {
            kind,
            span: start.span().to(end),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr<Untyped>> {
        self.consume(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        Ok(expr)
    }

    /// Distinguishes the assignment forms by the tokens following the
    /// target identifier. Does not consume the final semicolon.
    fn parse_assignment(&mut self, target: Ident) -> Result<StmtKind<Untyped>> {
        const AFTER_TARGET: &[TokenKind] = &[TokenKind::Assign, TokenKind::LBracket, TokenKind::Dot];

        match self.consume_any(AFTER_TARGET)?.kind {
            TokenKind::Assign => {
                let next = self.peek();
                match next.kind {
                    TokenKind::LBrace => {
                        let pixel = self.parse_pixel()?;
                        Ok(StmtKind::AssignPixel {
                            target,
                            pixel,
                            info: (),
                        })
                    }
                    TokenKind::String => {
                        self.advance();
                        let file = next.span().wrap(extract::string(next, self.src));
                        Ok(StmtKind::FileLoad { target, file })
                    }
                    _ => {
                        let value = self.parse_expr()?;
                        Ok(StmtKind::AssignExpr { target, value })
                    }
                }
            }
            TokenKind::LBracket => self.parse_pixel_write(target),
            TokenKind::Dot => {
                const SELECTORS: &[TokenKind] = &[
                    TokenKind::Pixels,
                    TokenKind::Location,
                    TokenKind::Shape,
                    TokenKind::Visible,
                ];
                let selector = self.peek();
                if !SELECTORS.contains(&selector.kind) {
                    let error = Error::ExpectedSelector {
                        actual: selector.kind,
                    };
                    return Err(selector.span().wrap(error));
                }
                self.advance();
                match selector.kind {
                    TokenKind::Pixels => {
                        self.consume(TokenKind::LBracket)?;
                        self.parse_pixel_write(target)
                    }
                    TokenKind::Location => {
                        self.consume(TokenKind::Assign)?;
                        let (x, y) = self.parse_pair(TokenKind::LBracket, TokenKind::RBracket)?;
                        Ok(StmtKind::ScreenLocation { target, x, y })
                    }
                    TokenKind::Shape => {
                        self.consume(TokenKind::Assign)?;
                        let (width, height) =
                            self.parse_pair(TokenKind::LBracket, TokenKind::RBracket)?;
                        Ok(StmtKind::Shape {
                            target,
                            width,
                            height,
                        })
                    }
                    TokenKind::Visible => {
                        self.consume(TokenKind::Assign)?;
                        let value = self.parse_expr()?;
                        Ok(StmtKind::Visibility { target, value })
                    }
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
    }

    /// Parses `x, y] = pixel` or `x, y].color = expr`, the opening bracket
    /// being already consumed.
    fn parse_pixel_write(&mut self, target: Ident) -> Result<StmtKind<Untyped>> {
        let (x, y) = self.parse_coords_rest()?;
        match self
            .consume_any(&[TokenKind::Assign, TokenKind::Dot])?
            .kind
        {
            TokenKind::Assign => {
                let pixel = self.parse_pixel()?;
                Ok(StmtKind::SinglePixel {
                    target,
                    x,
                    y,
                    pixel,
                })
            }
            TokenKind::Dot => {
                let color = self.parse_color()?;
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                Ok(StmtKind::SingleSample {
                    target,
                    x,
                    y,
                    color,
                    value,
                })
            }
            _ => unreachable!(),
        }
    }

    /// Parses `open expr , expr close`.
    fn parse_pair(
        &mut self,
        open: TokenKind,
        close: TokenKind,
    ) -> Result<(Expr<Untyped>, Expr<Untyped>)> {
        self.consume(open)?;
        let first = self.parse_expr()?;
        self.consume(TokenKind::Comma)?;
        let second = self.parse_expr()?;
        self.consume(close)?;
        Ok((first, second))
    }

    /// Parses `expr , expr ]`, the opening bracket being already consumed.
    fn parse_coords_rest(&mut self) -> Result<(Expr<Untyped>, Expr<Untyped>)> {
        let x = self.parse_expr()?;
        self.consume(TokenKind::Comma)?;
        let y = self.parse_expr()?;
        self.consume(TokenKind::RBracket)?;
        Ok((x, y))
    }

    /// Pixel constructor: { expr , expr , expr }
    fn parse_pixel(&mut self) -> Result<PixelExpr<Untyped>> {
        let start = self.consume(TokenKind::LBrace)?;
        self.parse_pixel_rest(start)
    }

    fn parse_pixel_rest(&mut self, start: Token) -> Result<PixelExpr<Untyped>> {
        let red = self.parse_expr()?;
        self.consume(TokenKind::Comma)?;
        let green = self.parse_expr()?;
        self.consume(TokenKind::Comma)?;
        let blue = self.parse_expr()?;
        let end = self.consume(TokenKind::RBrace)?;
        Ok(PixelExpr {
            red: Box::new(red),
            green: Box::new(green),
            blue: Box::new(blue),
            span: start.span().to(end.span()),
        })
    }

    fn parse_color(&mut self) -> Result<Ident> {
        let token = self.consume_any(&[TokenKind::Red, TokenKind::Green, TokenKind::Blue])?;
        Ok(self.ident_of(token))
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(self.ident_of(token))
    }

    fn ident_of(&mut self, token: Token) -> Ident {
        Ident {
            name: self.ident_interner.intern(token.text(self.src)),
            span: token.span(),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr<Untyped>> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr<Untyped>> {
        let lhs_token = self.advance();
        let mut lhs = self.parse_nud(lhs_token)?;

        loop {
            let op_token = self.peek();

            if let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) {
                if lbp < min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }

                self.advance(); // Operator
                lhs = self.parse_led(op_token, lhs, rbp)?;
            } else {
                // Not an infix operator
                break;
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expr<Untyped>> {
        let (kind, span) = match token.kind {
            TokenKind::Number => {
                let Ok(parsed) = extract::int(token, self.src) else {
                    return Err(token.span().wrap(Error::IntOutOfRange));
                };
                (ExprKind::Int(parsed), token.span())
            }
            TokenKind::True => (ExprKind::Bool(true), token.span()),
            TokenKind::False => (ExprKind::Bool(false), token.span()),

            kind @ (TokenKind::X | TokenKind::Y | TokenKind::Z | TokenKind::ScreenSize) => {
                let predefined = match kind {
                    TokenKind::X => Predefined::X,
                    TokenKind::Y => Predefined::Y,
                    TokenKind::Z => Predefined::Z,
                    TokenKind::ScreenSize => Predefined::ScreenSize,
                    _ => unreachable!(),
                };
                (ExprKind::Predefined(predefined), token.span())
            }

            // Grouping: ( expr )
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                (ExprKind::Paren(Box::new(expr)), token.span().to(end.span()))
            }

            // Pixel constructor: { expr , expr , expr }
            TokenKind::LBrace => {
                let pixel = self.parse_pixel_rest(token)?;
                let span = pixel.span;
                (ExprKind::Pixel(pixel), span)
            }

            // Prefix operators: !, -
            kind @ (TokenKind::Bang | TokenKind::Minus) => {
                let op = match kind {
                    TokenKind::Bang => UnaryOperator::Not,
                    TokenKind::Minus => UnaryOperator::Neg,
                    _ => unreachable!(),
                };
                let expr = self.parse_expr_bp(Self::PREFIX_BINDING_POWER)?;
                let span = token.span().to(expr.span);
                let unary = ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                };
                (unary, span)
            }

            TokenKind::Identifier => {
                let ident = self.ident_of(token);
                self.parse_ident_expr(ident)?
            }

            other => {
                let error = Error::UnexpectedTokenInExpr { token: other };
                return Err(token.span().wrap(error));
            }
        };

        Ok(Expr {
            kind,
            span,
            info: (),
        })
    }

    /// Parses what may follow an identifier in an expression: a sample
    /// access, an attribute read, or nothing.
    fn parse_ident_expr(&mut self, ident: Ident) -> Result<(ExprKind<Untyped>, Span)> {
        let next = self.peek();
        match next.kind {
            TokenKind::LBracket => {
                self.advance();
                self.parse_sample(ident)
            }
            TokenKind::Dot => {
                self.advance();
                let selector = self.advance();
                let attribute = match selector.kind {
                    TokenKind::Pixels => {
                        self.consume(TokenKind::LBracket)?;
                        return self.parse_sample(ident);
                    }
                    TokenKind::Width => Attribute::Width,
                    TokenKind::Height => Attribute::Height,
                    TokenKind::XLoc => Attribute::XLoc,
                    TokenKind::YLoc => Attribute::YLoc,
                    other => {
                        let error = Error::ExpectedSelector { actual: other };
                        return Err(selector.span().wrap(error));
                    }
                };
                let attr = ExprKind::Attribute {
                    image: ident,
                    attribute,
                };
                Ok((attr, ident.span.to(selector.span())))
            }
            _ => Ok((ExprKind::Id(ident), ident.span)),
        }
    }

    /// Parses `x, y].color`, the opening bracket being already consumed.
    fn parse_sample(&mut self, image: Ident) -> Result<(ExprKind<Untyped>, Span)> {
        let (x, y) = self.parse_coords_rest()?;
        self.consume(TokenKind::Dot)?;
        let color = self.parse_color()?;
        let sample = ExprKind::Sample {
            image,
            x: Box::new(x),
            y: Box::new(y),
            color,
        };
        Ok((sample, image.span.to(color.span)))
    }

    /// led: Parses tokens that follow a left-hand-side expression
    /// (infix operators)
    fn parse_led(&mut self, op_token: Token, lhs: Expr<Untyped>, rbp: u8) -> Result<Expr<Untyped>> {
        if op_token.kind == TokenKind::Question {
            let then_arm = self.parse_expr()?;
            self.consume(TokenKind::Colon)?;
            let else_arm = self.parse_expr_bp(rbp)?;
            let span = lhs.span.to(else_arm.span);
            let cond = ExprKind::Conditional {
                condition: Box::new(lhs),
                then_arm: Box::new(then_arm),
                else_arm: Box::new(else_arm),
            };
            return Ok(Expr {
                kind: cond,
                span,
                info: (),
            });
        }

        let op = match op_token.kind {
            TokenKind::Pipe => BinaryOperator::Or,
            TokenKind::Amp => BinaryOperator::And,
            TokenKind::Eq => BinaryOperator::Eq,
            TokenKind::NotEq => BinaryOperator::NotEq,
            TokenKind::Less => BinaryOperator::Less,
            TokenKind::LessEq => BinaryOperator::LessEq,
            TokenKind::Greater => BinaryOperator::Greater,
            TokenKind::GreaterEq => BinaryOperator::GreaterEq,
            TokenKind::Shl => BinaryOperator::Shl,
            TokenKind::Shr => BinaryOperator::Shr,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Rem,
            other => {
                let error = Error::UnexpectedOperator { actual: other };
                return Err(op_token.span().wrap(error));
            }
        };
        // Parse right operand with correct precedence
        let rhs = self.parse_expr_bp(rbp)?;

        let span = lhs.span.to(rhs.span);
        let binary = ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        Ok(Expr {
            kind: binary,
            span,
            info: (),
        })
    }

    const PREFIX_BINDING_POWER: u8 = 17;

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        let bp = match kind {
            // Level 8: Conditional (right-associative)
            TokenKind::Question => (2, 1),

            // Level 7: Logical or
            TokenKind::Pipe => (3, 4),

            // Level 6: Logical and
            TokenKind::Amp => (5, 6),

            // Level 5: Equality
            TokenKind::Eq | TokenKind::NotEq => (7, 8),

            // Level 4: Comparisons
            TokenKind::Less | TokenKind::LessEq | TokenKind::Greater | TokenKind::GreaterEq => {
                (9, 10)
            }

            // Level 3: Shifts
            TokenKind::Shl | TokenKind::Shr => (11, 12),

            // Level 2: Addition/Subtraction
            TokenKind::Plus | TokenKind::Minus => (13, 14),

            // Level 1: Multiplication/Division/Remainder
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (15, 16),

            _ => return None,
        };
        Some(bp)
    }
}

impl Parser<'_, '_, '_> {
    fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner,
    ) -> Parser<'src, 'tok, 'ident> {
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current token and advances. Never moves past the end.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// returns an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            let error = Error::Unexpected {
                actual: c.kind,
                expected: expect,
            };
            Err(c.span().wrap(error))
        }
    }

    /// Advances if the current token matches any of the provided tokens. If
    /// not, returns an error.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        for t in expect {
            if self.is(*t) {
                return Ok(self.advance());
            }
        }
        let c = self.peek();
        let error = Error::UnexpectedAny {
            actual: c.kind,
            expected: Box::from(expect),
        };
        Err(c.span().wrap(error))
    }

    /// Returns true while the current token is neither `except` nor
    /// [`TokenKind::Eof`].
    fn except(&self, except: TokenKind) -> bool {
        let c = self.peek().kind;
        c != except && c != TokenKind::Eof
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedTokenInExpr {
        token: TokenKind,
    },
    UnexpectedTokenInStmt {
        token: TokenKind,
    },
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    UnexpectedOperator {
        actual: TokenKind,
    },
    ExpectedSelector {
        actual: TokenKind,
    },
    IntOutOfRange,
    /// A closing delimiter without its matching opener.
    UnbalancedDelimiter {
        found: TokenKind,
    },
    UnclosedDelimiter {
        opener: TokenKind,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            UnexpectedTokenInStmt { token } => {
                write!(f, "unexpected token {token:?} at start of statement")
            }
            Unexpected { actual, expected } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            UnexpectedAny { actual, expected } => {
                write!(f, "expected one of {expected:?}, but got {actual:?}")
            }
            UnexpectedOperator { actual } => write!(f, "unexpected operator {actual:?}"),
            ExpectedSelector { actual } => write!(f, "expected a selector, but got {actual:?}"),
            IntOutOfRange => write!(f, "integer literal out of bounds"),
            UnbalancedDelimiter { found } => write!(f, "unbalanced delimiter {found:?}"),
            UnclosedDelimiter { opener } => write!(f, "delimiter {opener:?} is never closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_simple_expression() {
            let expr = "(1 * 2 + 3) - (1 + 2 % 3)";
            let tree_ok = "
                binary Sub (0..25)
                  paren (0..11)
                    binary Add (1..10)
                      binary Mul (1..6)
                        int 1 (1..2)
                        int 2 (5..6)
                      int 3 (9..10)
                  paren (14..25)
                    binary Add (15..24)
                      int 1 (15..16)
                      binary Rem (19..24)
                        int 2 (19..20)
                        int 3 (23..24)
            ";
        }

        fn test_literals_and_predefined() {
            let expr = "true & !false | x < SCREEN_SIZE";
            let tree_ok = "
                binary Or (0..31)
                  binary And (0..13)
                    bool true (0..4)
                    unary Not (7..13)
                      bool false (8..13)
                  binary Less (16..31)
                    predefined x (16..17)
                    predefined SCREEN_SIZE (20..31)
            ";
        }

        fn test_precedence_shift_arith_compare() {
            let expr = "a << 1 + b >= Z == c";
            let tree_ok = "
                binary Eq (0..20)
                  binary GreaterEq (0..15)
                    binary Shl (0..10)
                      ident a (0..1)
                      binary Add (5..10)
                        int 1 (5..6)
                        ident b (9..10)
                    predefined Z (14..15)
                  ident c (19..20)
            ";
        }

        fn test_left_associativity() {
            let expr = "a - b - c";
            let tree_ok = "
                binary Sub (0..9)
                  binary Sub (0..5)
                    ident a (0..1)
                    ident b (4..5)
                  ident c (8..9)
            ";
        }

        fn test_unary_minus_binds_tighter() {
            let expr = "-a * b";
            let tree_ok = "
                binary Mul (0..6)
                  unary Neg (0..2)
                    ident a (1..2)
                  ident b (5..6)
            ";
        }

        fn test_conditional_is_right_associative() {
            let expr = "a ? 1 : b ? 2 : 3";
            let tree_ok = "
                conditional (0..17)
                  ident a (0..1)
                  int 1 (4..5)
                  conditional (8..17)
                    ident b (8..9)
                    int 2 (12..13)
                    int 3 (16..17)
            ";
        }

        fn test_conditional_condition_is_logical() {
            let expr = "a | b ? c : d";
            let tree_ok = "
                conditional (0..13)
                  binary Or (0..5)
                    ident a (0..1)
                    ident b (4..5)
                  ident c (8..9)
                  ident d (12..13)
            ";
        }

        fn test_sample_and_attribute() {
            let expr = "img[x, y + 1].red + img.width";
            let tree_ok = "
                binary Add (0..29)
                  sample img.red (0..17)
                    predefined x (4..5)
                    binary Add (7..12)
                      predefined y (7..8)
                      int 1 (11..12)
                  attribute img.width (20..29)
            ";
        }

        fn test_sample_with_pixels_selector() {
            let expr = "img.pixels[0, 1].blue";
            let tree_ok = "
                sample img.blue (0..21)
                  int 0 (11..12)
                  int 1 (14..15)
            ";
        }

        fn test_pixel_constructor_expr() {
            let expr = "c ? {1, 2, 3} : {Z, 0, 0}";
            let tree_ok = "
                conditional (0..25)
                  ident c (0..1)
                  pixel (4..13)
                    int 1 (5..6)
                    int 2 (8..9)
                    int 3 (11..12)
                  pixel (16..25)
                    predefined Z (17..18)
                    int 0 (20..21)
                    int 0 (23..24)
            ";
        }

        fn test_declarations() {
            let program = "p { int a; boolean b; pixel c; image d; }";
            let tree_ok = "
                program p
                  dec int a (4..10)
                  dec boolean b (11..21)
                  dec pixel c (22..30)
                  dec image d (31..39)
            ";
        }

        fn test_assignment_forms() {
            let program = r#"p {
a = 1;
a = {1, 2, 3};
a = "f.png";
a[1, 2] = {0, 0, 0};
a.pixels[1, 2] = {0, 0, 0};
a[1, 2].green = 7;
a.location = [3, 4];
a.shape = [5, 6];
a.visible = true;
}"#;
            let tree_ok = r#"
                program p
                  assign a (4..10)
                    int 1 (8..9)
                  assign pixel a (11..25)
                    pixel (15..24)
                      int 1 (16..17)
                      int 2 (19..20)
                      int 3 (22..23)
                  load a "f.png" (26..38)
                  set pixel a (39..59)
                    int 1 (41..42)
                    int 2 (44..45)
                    pixel (49..58)
                      int 0 (50..51)
                      int 0 (53..54)
                      int 0 (56..57)
                  set pixel a (60..87)
                    int 1 (69..70)
                    int 2 (72..73)
                    pixel (77..86)
                      int 0 (78..79)
                      int 0 (81..82)
                      int 0 (84..85)
                  set sample a.green (88..106)
                    int 1 (90..91)
                    int 2 (93..94)
                    int 7 (104..105)
                  set location a (107..127)
                    int 3 (121..122)
                    int 4 (124..125)
                  set shape a (128..145)
                    int 5 (139..140)
                    int 6 (142..143)
                  set visible a (146..163)
                    bool true (158..162)
            "#;
        }

        fn test_control_flow() {
            let program = "p {
if (a) { pause 1; } else { b = 2; }
while (a == 0) { }
if (b) { }
}";
            let tree_ok = "
                program p
                  if (4..39)
                    ident a (8..9)
                    then
                      pause (13..21)
                        int 1 (19..20)
                    else
                      assign b (31..37)
                        int 2 (35..36)
                  while (40..58)
                    binary Eq (47..53)
                      ident a (47..48)
                      int 0 (52..53)
                    do
                  if (59..69)
                    ident b (63..64)
                    then
            ";
        }

        fn test_error_unexpected_token_in_expr() {
            let expr = "1 + ;";
            let expected_errors = &["4..5: unexpected token Semicolon in expression"];
        }

        fn test_error_missing_semicolon() {
            let program = "p { a = 1 }";
            let expected_errors = &["10..11: expected token Semicolon, but got RBrace"];
        }

        fn test_error_bad_selector() {
            let program = "p { a.red = 1; }";
            let expected_errors = &["6..9: expected a selector, but got Red"];
        }

        fn test_error_statement_start() {
            let program = "p { 1 = a; }";
            let expected_errors = &["4..5: unexpected token Number at start of statement"];
        }

        fn test_error_declaration_after_statement() {
            let program = "p { a = 1; int b; }";
            let expected_errors = &["11..14: unexpected token Int at start of statement"];
        }

        fn test_error_unbalanced_closing() {
            let program = "p { a = (1 + 2]; }";
            let expected_errors = &["14..15: unbalanced delimiter RBracket"];
        }

        fn test_error_unclosed_opening() {
            let program = "p { if (a) { a = 1; }";
            let expected_errors = &["2..3: delimiter LBrace is never closed"];
        }

        fn test_error_extra_closing() {
            let expr = "1 + 2)";
            let expected_errors = &["5..6: unbalanced delimiter RParen"];
        }

        fn test_error_int_too_large() {
            let expr = "9999999999";
            let expected_errors = &["0..10: integer literal out of bounds"];
        }

        fn test_error_trailing_tokens() {
            let program = "p { } q";
            let expected_errors = &["6..7: expected token Eof, but got Identifier"];
        }
    );
}
