// program ::= IDENT '{' dec* stmt* '}'
// dec ::= TYPE IDENT ';'
// stmt ::= if '(' expr ')' block [else block]
//        | while '(' expr ')' block
//        | pause expr ';'
//        | IDENT '=' (expr | pixel | STRING) ';'
//        | IDENT pixels '=' pixel ';'
//        | IDENT pixels '.' COLOR '=' expr ';'
//        | IDENT '.' (location | shape) '=' '[' expr ',' expr ']' ';'
//        | IDENT '.' visible '=' expr ';'
// pixels ::= ['.' pixels] '[' expr ',' expr ']'
// pixel ::= '{' expr ',' expr ',' expr '}'

// Precedence
//
// ! -
// * / %
// + -
// << >>
// < <= > >=
// == !=
// &
// |
// ?:

use std::fmt;

use crate::{
    token::{Span, Spanned},
    types::{DeclType, PixelTarget, Type},
    util::intern::Interned,
};

/// Parametrizes the tree over what each pass knows about it.
pub trait Info {
    /// Stored on every expression.
    type Expr: fmt::Debug + PartialEq + Clone;
    /// Stored on the whole-pixel assignment, selecting its generated form.
    type Target: fmt::Debug + PartialEq + Clone;
}

/// The tree produced by the parser.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Untyped;

impl Info for Untyped {
    type Expr = ();
    type Target = ();
}

/// The tree produced by the type checker. An expression holds `None` only if
/// its type could not be resolved (an error has been reported for it).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Typed;

impl Info for Typed {
    type Expr = Option<Type>;
    type Target = PixelTarget;
}

#[derive(Debug, PartialEq)]
pub struct Program<I: Info> {
    pub name: Ident,
    pub decs: Vec<Dec>,
    pub stmts: Vec<Stmt<I>>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Dec {
    pub ty: DeclType,
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Stmt<I: Info> {
    pub kind: StmtKind<I>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind<I: Info> {
    /// `if (cond) { .. } else { .. }`
    Alternative {
        condition: Expr<I>,
        then_body: Vec<Stmt<I>>,
        else_body: Vec<Stmt<I>>,
    },
    /// `while (cond) { .. }`
    Iteration {
        condition: Expr<I>,
        body: Vec<Stmt<I>>,
    },
    Pause(Expr<I>),
    /// `ident = {r, g, b};` on a pixel, or a broadcast over every
    /// coordinate of an image.
    AssignPixel {
        target: Ident,
        pixel: PixelExpr<I>,
        info: I::Target,
    },
    /// `ident[x, y] = {r, g, b};`
    SinglePixel {
        target: Ident,
        x: Expr<I>,
        y: Expr<I>,
        pixel: PixelExpr<I>,
    },
    /// `ident[x, y].red = value;`
    SingleSample {
        target: Ident,
        x: Expr<I>,
        y: Expr<I>,
        color: Ident,
        value: Expr<I>,
    },
    /// `ident.location = [x, y];`
    ScreenLocation {
        target: Ident,
        x: Expr<I>,
        y: Expr<I>,
    },
    /// `ident.shape = [width, height];`
    Shape {
        target: Ident,
        width: Expr<I>,
        height: Expr<I>,
    },
    /// `ident.visible = value;`
    Visibility { target: Ident, value: Expr<I> },
    /// `ident = "file.png";`
    FileLoad {
        target: Ident,
        file: Spanned<Box<str>>,
    },
    /// `ident = value;`
    AssignExpr { target: Ident, value: Expr<I> },
}

/// A pixel constructor, `{red, green, blue}`.
#[derive(Debug, PartialEq)]
pub struct PixelExpr<I: Info> {
    pub red: Box<Expr<I>>,
    pub green: Box<Expr<I>>,
    pub blue: Box<Expr<I>>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Expr<I: Info> {
    pub kind: ExprKind<I>,
    pub span: Span,
    pub info: I::Expr,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind<I: Info> {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr<I>>,
        rhs: Box<Expr<I>>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr<I>>,
    },
    Conditional {
        condition: Box<Expr<I>>,
        then_arm: Box<Expr<I>>,
        else_arm: Box<Expr<I>>,
    },
    /// `ident[x, y].color`
    Sample {
        image: Ident,
        x: Box<Expr<I>>,
        y: Box<Expr<I>>,
        color: Ident,
    },
    /// `ident.width`
    Attribute { image: Ident, attribute: Attribute },
    Pixel(PixelExpr<I>),
    Paren(Box<Expr<I>>),
    Id(Ident),
    Int(i32),
    Bool(bool),
    Predefined(Predefined),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOperator {
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Eq | BinaryOperator::NotEq)
    }

    pub fn is_relational(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Less | LessEq | Greater | GreaterEq)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Or => "|",
            And => "&",
            Eq => "==",
            NotEq => "!=",
            Less => "<",
            LessEq => "<=",
            Greater => ">",
            GreaterEq => ">=",
            Shl => "<<",
            Shr => ">>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Neg => "-",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    Width,
    Height,
    XLoc,
    YLoc,
}

impl Attribute {
    pub fn keyword(self) -> &'static str {
        match self {
            Attribute::Width => "width",
            Attribute::Height => "height",
            Attribute::XLoc => "x_loc",
            Attribute::YLoc => "y_loc",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Predefined {
    X,
    Y,
    Z,
    ScreenSize,
}

impl Predefined {
    pub fn keyword(self) -> &'static str {
        match self {
            Predefined::X => "x",
            Predefined::Y => "y",
            Predefined::Z => "Z",
            Predefined::ScreenSize => "SCREEN_SIZE",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Interned,
    pub span: Span,
}

impl From<Ident> for Interned {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
