use std::{collections::HashMap, fmt};

use crate::{ast::Dec, util::intern::Interned};

/// The type of an expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Boolean,
    Pixel,
    Image,
    /// The implicit horizontal coordinate.
    X,
    /// The implicit vertical coordinate.
    Y,
    ScreenSize,
}

impl Type {
    /// Whether a value of this type may be used wherever an integer is
    /// expected.
    pub fn is_integer(self) -> bool {
        matches!(self, Type::Int | Type::X | Type::Y | Type::ScreenSize)
    }

    /// Type equivalence: identical types, or two integer-compatible ones.
    pub fn compatible(self, other: Type) -> bool {
        self == other || (self.is_integer() && other.is_integer())
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Boolean => "boolean",
            Type::Pixel => "pixel",
            Type::Image => "image",
            Type::X => "x",
            Type::Y => "y",
            Type::ScreenSize => "SCREEN_SIZE",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type that may appear in a declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclType {
    Int,
    Boolean,
    Pixel,
    Image,
}

impl From<DeclType> for Type {
    fn from(value: DeclType) -> Self {
        match value {
            DeclType::Int => Type::Int,
            DeclType::Boolean => Type::Boolean,
            DeclType::Pixel => Type::Pixel,
            DeclType::Image => Type::Image,
        }
    }
}

impl fmt::Display for DeclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Type::from(*self), f)
    }
}

/// What a whole-pixel assignment writes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelTarget {
    /// Stores the packed color in a pixel variable.
    Pixel,
    /// Broadcasts the color to every coordinate of an image.
    Image,
}

/// The global, flat, symbol table. There are no nested scopes.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: HashMap<Interned, Dec>,
}

impl SymbolTable {
    pub fn with_capacity(capacity: usize) -> SymbolTable {
        SymbolTable {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: impl Into<Interned>) -> Option<&Dec> {
        self.map.get(&name.into())
    }

    /// Attempts to declare the provided symbol.
    ///
    /// Fails with the previous declaration if the name is already taken.
    pub fn declare(&mut self, dec: Dec) -> Result<(), Dec> {
        match self.map.get(&dec.name.name) {
            Some(previous) => Err(*previous),
            None => {
                self.map.insert(dec.name.name, dec);
                Ok(())
            }
        }
    }
}
