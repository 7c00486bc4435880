use std::fmt;

use crate::{
    ast::{Program, Typed},
    token::Span,
    types::SymbolTable,
    util::intern::Interner,
};

pub mod classfile;
pub mod emit;
mod generator;
pub mod listing;
pub mod runtime;

pub use generator::Generator;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Generates the checked program into the provided backend.
///
/// The program must have been checked without diagnostics; any node the
/// checker could not resolve aborts generation. No partial output is ever
/// produced.
pub fn generate<E>(
    emitter: E,
    ident_interner: &Interner,
    symbols: &SymbolTable,
    src: &str,
    source_name: &str,
    program: &Program<Typed>,
) -> Result<E::Output>
where
    E: emit::Emitter,
{
    Generator::new(emitter, ident_interner, symbols, src).generate(source_name, program)
}

/// An internal code generation failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Emit(emit::Error),
    UnknownColor(Span),
    Undeclared(Span),
    Untyped(Span),
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Emit(_) => None,
            Error::UnknownColor(span) | Error::Undeclared(span) | Error::Untyped(span) => {
                Some(*span)
            }
        }
    }
}

impl From<emit::Error> for Error {
    fn from(value: emit::Error) -> Self {
        Error::Emit(value)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Emit(error) => write!(f, "backend error: {error}"),
            Error::UnknownColor(_) => f.write_str("unknown color channel"),
            Error::Undeclared(_) => f.write_str("variable has no declaration"),
            Error::Untyped(_) => f.write_str("expression has no resolved type"),
        }
    }
}
