use crate::{
    lexer, parser,
    token::Spanned,
    type_checker::{self, ErrorKind, Expected},
    util::fmt::{Context, Show},
};

impl Show for Spanned<type_checker::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }
        write!(f, "{}: ", error.node)?;

        match &error.kind {
            ErrorKind::Redeclared { name, previous } => {
                let name = i.get(*name);
                write!(f, "{name} is already declared at {previous}")
            }
            ErrorKind::ShadowsProgramName(name) => {
                let name = i.get(*name);
                write!(f, "{name} is the name of the program")
            }
            ErrorKind::Undeclared(name) => {
                let name = i.get(*name);
                write!(f, "{name} is not declared")
            }
            ErrorKind::Mismatch { expected, actual } => {
                write!(f, "expected {expected}, but got {actual}")
            }
            ErrorKind::Unassignable { declared, actual } => {
                write!(f, "type {actual} is not assignable to {declared}")
            }
            ErrorKind::Operands { op, expected } => {
                let kind = match expected {
                    Expected::Boolean => "boolean",
                    _ => "integer",
                };
                write!(f, "operator {} expects {kind} operands", op.symbol())
            }
            ErrorKind::Incomparable { op, lhs, rhs } => {
                write!(f, "operator {} can not compare {lhs} and {rhs}", op.symbol())
            }
            ErrorKind::ArmsMismatch { then_ty, else_ty } => {
                write!(f, "conditional arms have types {then_ty} and {else_ty}")
            }
        }
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, _: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }
        write!(f, "{error}")
    }
}

impl Show for Spanned<lexer::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, _: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }
        write!(f, "{error}")
    }
}
