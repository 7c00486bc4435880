//! The instruction emission seam between the generator and a backend.

use std::{fmt, rc::Rc};

/// A branch target, created by [`Emitter::new_label`] and positioned by
/// [`Emitter::place_label`], within the current method.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A local variable index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub u16);

/// Integer comparison conditions. For [`Insn::If`] the value is compared
/// against zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub fn holds(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Cond::Eq => lhs == rhs,
            Cond::Ne => lhs != rhs,
            Cond::Lt => lhs < rhs,
            Cond::Ge => lhs >= rhs,
            Cond::Gt => lhs > rhs,
            Cond::Le => lhs <= rhs,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Ge => "ge",
            Cond::Gt => "gt",
            Cond::Le => "le",
        }
    }
}

/// Reference comparison conditions, by identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefCond {
    Eq,
    Ne,
}

impl RefCond {
    pub fn holds(self, same: bool) -> bool {
        match self {
            RefCond::Eq => same,
            RefCond::Ne => !same,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            RefCond::Eq => "eq",
            RefCond::Ne => "ne",
        }
    }
}

/// A field or method reference, by owner class, name and descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: Rc<str>,
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
}

impl MemberRef {
    pub fn new(owner: impl Into<Rc<str>>, name: &str, descriptor: &str) -> MemberRef {
        MemberRef {
            owner: owner.into(),
            name: Rc::from(name),
            descriptor: Rc::from(descriptor),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.owner, self.name, self.descriptor)
    }
}

/// A stack machine instruction. Every value is a 32-bit integer, except for
/// object references (images and strings).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Insn {
    Const(i32),
    /// Pushes a string constant.
    Str(Rc<str>),
    Dup,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Neg,

    /// Pops one value and branches if it satisfies the condition against zero.
    If(Cond, Label),
    /// Pops two values and branches if they satisfy the condition.
    IfCmp(Cond, Label),
    /// Pops two object references and branches if they satisfy the condition.
    IfRefCmp(RefCond, Label),
    Goto(Label),

    Load(Slot),
    Store(Slot),
    Inc(Slot, i8),

    GetStatic(MemberRef),
    PutStatic(MemberRef),
    PutField(MemberRef),

    InvokeVirtual(MemberRef),
    InvokeStatic(MemberRef),
    InvokeSpecial(MemberRef),
    /// Allocates an uninitialized object of the provided class.
    New(Rc<str>),

    Return,
}

impl Insn {
    /// The label this instruction may transfer control to, if any.
    pub fn target(&self) -> Option<Label> {
        match self {
            Insn::If(_, label)
            | Insn::IfCmp(_, label)
            | Insn::IfRefCmp(_, label)
            | Insn::Goto(label) => Some(*label),
            _ => None,
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Insn::*;
        match self {
            Const(v) => write!(f, "const {v}"),
            Str(s) => write!(f, "str {s:?}"),
            Dup => f.write_str("dup"),
            Add => f.write_str("add"),
            Sub => f.write_str("sub"),
            Mul => f.write_str("mul"),
            Div => f.write_str("div"),
            Rem => f.write_str("rem"),
            Shl => f.write_str("shl"),
            Shr => f.write_str("shr"),
            And => f.write_str("and"),
            Or => f.write_str("or"),
            Xor => f.write_str("xor"),
            Neg => f.write_str("neg"),
            If(cond, label) => write!(f, "if{} {label}", cond.mnemonic()),
            IfCmp(cond, label) => write!(f, "ifcmp{} {label}", cond.mnemonic()),
            IfRefCmp(cond, label) => write!(f, "ifrefcmp{} {label}", cond.mnemonic()),
            Goto(label) => write!(f, "goto {label}"),
            Load(slot) => write!(f, "load {}", slot.0),
            Store(slot) => write!(f, "store {}", slot.0),
            Inc(slot, by) => write!(f, "inc {} {by}", slot.0),
            GetStatic(m) => write!(f, "getstatic {m}"),
            PutStatic(m) => write!(f, "putstatic {m}"),
            PutField(m) => write!(f, "putfield {m}"),
            InvokeVirtual(m) => write!(f, "invokevirtual {m}"),
            InvokeStatic(m) => write!(f, "invokestatic {m}"),
            InvokeSpecial(m) => write!(f, "invokespecial {m}"),
            New(class) => write!(f, "new {class}"),
            Return => f.write_str("return"),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The backend contract. Calls must follow the order
/// `begin_module (declare_static* | begin_method .. end_method)* finish`.
pub trait Emitter {
    type Output;

    fn begin_module(&mut self, name: &str, source_file: &str) -> Result<()>;

    fn declare_static(&mut self, name: &str, descriptor: &str) -> Result<()>;

    fn begin_method(&mut self, name: &str, descriptor: &str) -> Result<()>;

    fn new_label(&mut self) -> Label;

    /// Positions the label at the next emitted instruction. A label may only
    /// be placed once.
    fn place_label(&mut self, label: Label) -> Result<()>;

    /// Attributes the next emitted instructions to the provided source line.
    fn line(&mut self, line: u32);

    fn emit(&mut self, insn: Insn);

    /// Closes the current method, checking that every branch targets a placed
    /// label.
    fn end_method(&mut self) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    NoModule,
    NoMethod,
    UnclosedMethod,
    LabelPlacedTwice(Label),
    UnplacedLabel(Label),
    /// A backend specific limit, such as a maximum code size, was exceeded.
    Limit(&'static str),
    /// The code does not satisfy the backend's stack discipline.
    Stack(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoModule => write!(f, "no module was begun"),
            Error::NoMethod => write!(f, "no method is open"),
            Error::UnclosedMethod => write!(f, "a method is still open"),
            Error::LabelPlacedTwice(label) => write!(f, "label {label} placed twice"),
            Error::UnplacedLabel(label) => write!(f, "label {label} is targeted but never placed"),
            Error::Limit(what) => write!(f, "{what} limit exceeded"),
            Error::Stack(msg) => write!(f, "invalid stack usage: {msg}"),
        }
    }
}
