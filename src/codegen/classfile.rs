//! Encodes modules as JVM class files (version 50, which verifies without
//! stack map frames).

use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::codegen::{
    emit::{self, Cond, Emitter, Insn, Label, MemberRef, RefCond, Slot},
    listing::{Listing, Method, Module},
    runtime,
};

const MAGIC: u32 = 0xCAFE_BABE;
const MAJOR_VERSION: u16 = 50;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;

/// Builds the module in memory, then encodes it as a class file.
#[derive(Debug, Default)]
pub struct ClassFileEmitter {
    listing: Listing,
}

impl ClassFileEmitter {
    pub fn new() -> ClassFileEmitter {
        ClassFileEmitter::default()
    }
}

impl Emitter for ClassFileEmitter {
    type Output = Vec<u8>;

    fn begin_module(&mut self, name: &str, source_file: &str) -> emit::Result<()> {
        self.listing.begin_module(name, source_file)
    }

    fn declare_static(&mut self, name: &str, descriptor: &str) -> emit::Result<()> {
        self.listing.declare_static(name, descriptor)
    }

    fn begin_method(&mut self, name: &str, descriptor: &str) -> emit::Result<()> {
        self.listing.begin_method(name, descriptor)
    }

    fn new_label(&mut self) -> Label {
        self.listing.new_label()
    }

    fn place_label(&mut self, label: Label) -> emit::Result<()> {
        self.listing.place_label(label)
    }

    fn line(&mut self, line: u32) {
        self.listing.line(line);
    }

    fn emit(&mut self, insn: Insn) {
        self.listing.emit(insn);
    }

    fn end_method(&mut self) -> emit::Result<()> {
        self.listing.end_method()
    }

    fn finish(self) -> emit::Result<Vec<u8>> {
        encode(&self.listing.finish()?)
    }
}

/// Encodes the module as a public class extending `java/lang/Object`, whose
/// statics become static fields and whose methods are `public static`.
pub fn encode(module: &Module) -> emit::Result<Vec<u8>> {
    let mut pool = ConstantPool::default();
    let this_class = pool.class(&module.name)?;
    let super_class = pool.class(runtime::OBJECT_CLASS)?;

    let mut fields = Vec::with_capacity(module.statics.len());
    for s in &module.statics {
        fields.push((pool.utf8(&s.name)?, pool.utf8(&s.descriptor)?));
    }

    let code_name = pool.utf8("Code")?;
    let lines_name = pool.utf8("LineNumberTable")?;
    let mut methods = Vec::with_capacity(module.methods.len());
    for method in &module.methods {
        let name = pool.utf8(&method.name)?;
        let descriptor = pool.utf8(&method.descriptor)?;
        let code = assemble(method, &mut pool)?;
        debug!(
            method = %method.name,
            len = code.bytes.len(),
            max_stack = code.max_stack,
            max_locals = code.max_locals,
            "assembled method"
        );
        methods.push((name, descriptor, code));
    }

    let source_file_name = pool.utf8("SourceFile")?;
    let source_file = pool.utf8(&module.source_file)?;

    let mut out = Vec::with_capacity(1024);
    put_u32(&mut out, MAGIC);
    put_u16(&mut out, 0);
    put_u16(&mut out, MAJOR_VERSION);
    pool.write(&mut out)?;
    put_u16(&mut out, ACC_PUBLIC | ACC_SUPER);
    put_u16(&mut out, this_class);
    put_u16(&mut out, super_class);
    put_u16(&mut out, 0);

    put_u16(&mut out, count(fields.len(), "field count")?);
    for (name, descriptor) in fields {
        put_u16(&mut out, ACC_STATIC);
        put_u16(&mut out, name);
        put_u16(&mut out, descriptor);
        put_u16(&mut out, 0);
    }

    put_u16(&mut out, count(methods.len(), "method count")?);
    for (name, descriptor, code) in methods {
        put_u16(&mut out, ACC_PUBLIC | ACC_STATIC);
        put_u16(&mut out, name);
        put_u16(&mut out, descriptor);
        put_u16(&mut out, 1);
        code.write(&mut out, code_name, lines_name)?;
    }

    put_u16(&mut out, 1);
    put_u16(&mut out, source_file_name);
    put_u32(&mut out, 2);
    put_u16(&mut out, source_file);

    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(Rc<str>),
    Integer(i32),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
}

/// A deduplicating constant pool. Indexes start at one.
#[derive(Debug, Default)]
struct ConstantPool {
    entries: Vec<Constant>,
    index: HashMap<Constant, u16>,
}

impl ConstantPool {
    fn insert(&mut self, constant: Constant) -> emit::Result<u16> {
        if let Some(&index) = self.index.get(&constant) {
            return Ok(index);
        }
        let index = u16::try_from(self.entries.len() + 1)
            .ok()
            .filter(|&i| i < u16::MAX)
            .ok_or(emit::Error::Limit("constant pool"))?;
        self.entries.push(constant.clone());
        self.index.insert(constant, index);
        Ok(index)
    }

    fn utf8(&mut self, text: &str) -> emit::Result<u16> {
        self.insert(Constant::Utf8(Rc::from(text)))
    }

    fn integer(&mut self, value: i32) -> emit::Result<u16> {
        self.insert(Constant::Integer(value))
    }

    fn class(&mut self, name: &str) -> emit::Result<u16> {
        let name = self.utf8(name)?;
        self.insert(Constant::Class(name))
    }

    fn string(&mut self, text: &str) -> emit::Result<u16> {
        let text = self.utf8(text)?;
        self.insert(Constant::String(text))
    }

    fn member(&mut self, member: &MemberRef) -> emit::Result<(u16, u16)> {
        let class = self.class(&member.owner)?;
        let name = self.utf8(&member.name)?;
        let descriptor = self.utf8(&member.descriptor)?;
        let name_and_type = self.insert(Constant::NameAndType(name, descriptor))?;
        Ok((class, name_and_type))
    }

    fn field(&mut self, member: &MemberRef) -> emit::Result<u16> {
        let (class, name_and_type) = self.member(member)?;
        self.insert(Constant::Fieldref(class, name_and_type))
    }

    fn method(&mut self, member: &MemberRef) -> emit::Result<u16> {
        let (class, name_and_type) = self.member(member)?;
        self.insert(Constant::Methodref(class, name_and_type))
    }

    fn write(&self, out: &mut Vec<u8>) -> emit::Result<()> {
        put_u16(out, count(self.entries.len() + 1, "constant pool")?);
        for entry in &self.entries {
            match entry {
                Constant::Utf8(text) => {
                    let bytes = modified_utf8(text);
                    out.push(1);
                    put_u16(out, count(bytes.len(), "constant length")?);
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(value) => {
                    out.push(3);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::Class(name) => {
                    out.push(7);
                    put_u16(out, *name);
                }
                Constant::String(text) => {
                    out.push(8);
                    put_u16(out, *text);
                }
                Constant::Fieldref(class, name_and_type) => {
                    out.push(9);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::Methodref(class, name_and_type) => {
                    out.push(10);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::NameAndType(name, descriptor) => {
                    out.push(12);
                    put_u16(out, *name);
                    put_u16(out, *descriptor);
                }
            }
        }
        Ok(())
    }
}

/// The JVM's string encoding: NUL takes two bytes and supplementary
/// characters are written as surrogate pairs.
fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => out.extend_from_slice(&[0xC0, 0x80]),
            '\u{1}'..='\u{FFFF}' => {
                let mut buf = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            _ => {
                let mut units = [0; 2];
                for unit in c.encode_utf16(&mut units) {
                    let [hi, lo] = unit.to_be_bytes();
                    out.push(0xE0 | (hi >> 4));
                    out.push(0x80 | ((hi & 0x0F) << 2) | (lo >> 6));
                    out.push(0x80 | (lo & 0x3F));
                }
            }
        }
    }
    out
}

/// An assembled method body.
#[derive(Debug)]
struct Code {
    bytes: Vec<u8>,
    max_stack: u16,
    max_locals: u16,
    /// Pairs of (bytecode offset, line).
    lines: Vec<(u16, u16)>,
}

impl Code {
    fn write(&self, out: &mut Vec<u8>, code_name: u16, lines_name: u16) -> emit::Result<()> {
        let lines_len = if self.lines.is_empty() {
            0
        } else {
            6 + 2 + 4 * self.lines.len()
        };
        let attribute_len = 2 + 2 + 4 + self.bytes.len() + 2 + 2 + lines_len;

        put_u16(out, code_name);
        put_u32(out, wide_count(attribute_len, "code attribute")?);
        put_u16(out, self.max_stack);
        put_u16(out, self.max_locals);
        put_u32(out, wide_count(self.bytes.len(), "code size")?);
        out.extend_from_slice(&self.bytes);
        put_u16(out, 0);

        if self.lines.is_empty() {
            put_u16(out, 0);
            return Ok(());
        }
        put_u16(out, 1);
        put_u16(out, lines_name);
        put_u32(out, wide_count(2 + 4 * self.lines.len(), "line table")?);
        put_u16(out, count(self.lines.len(), "line table")?);
        for &(pc, line) in &self.lines {
            put_u16(out, pc);
            put_u16(out, line);
        }
        Ok(())
    }
}

/// Encodes the instructions, resolving labels to relative branch offsets.
fn assemble(method: &Method, pool: &mut ConstantPool) -> emit::Result<Code> {
    let mut bytes = Vec::with_capacity(method.code.len() * 3);
    let mut offsets = Vec::with_capacity(method.code.len() + 1);
    // Pairs of (branch instruction offset, label).
    let mut fixups = Vec::new();

    for insn in &method.code {
        let at = bytes.len();
        offsets.push(at);
        if let Some(label) = encode_insn(insn, &mut bytes, pool)? {
            fixups.push((at, label));
        }
    }
    offsets.push(bytes.len());
    if bytes.len() > usize::from(u16::MAX) {
        return Err(emit::Error::Limit("code size"));
    }

    for (at, label) in fixups {
        let target = method
            .label_offset(label)
            .and_then(|index| offsets.get(index))
            .ok_or(emit::Error::UnplacedLabel(label))?;
        let relative = i16::try_from(*target as i64 - at as i64)
            .map_err(|_| emit::Error::Limit("branch offset"))?;
        bytes[at + 1..at + 3].copy_from_slice(&relative.to_be_bytes());
    }

    let mut lines = Vec::with_capacity(method.lines.len());
    for &(index, line) in &method.lines {
        let Some(&pc) = offsets.get(index).filter(|&&pc| pc < bytes.len()) else {
            continue;
        };
        let line = u16::try_from(line).map_err(|_| emit::Error::Limit("line number"))?;
        lines.push((count(pc, "code size")?, line));
    }

    Ok(Code {
        bytes,
        max_stack: max_stack(method)?,
        max_locals: max_locals(method)?,
        lines,
    })
}

/// Appends the instruction, returning the label it branches to. Branch
/// operands are left zeroed for patching.
fn encode_insn(
    insn: &Insn,
    out: &mut Vec<u8>,
    pool: &mut ConstantPool,
) -> emit::Result<Option<Label>> {
    use Insn::*;
    match insn {
        Const(value) => match *value {
            v @ -1..=5 => out.push(u8::try_from(0x03 + v).unwrap_or(0x03)),
            v if i8::try_from(v).is_ok() => {
                out.push(0x10);
                out.extend_from_slice(&v.to_be_bytes()[3..]);
            }
            v if i16::try_from(v).is_ok() => {
                out.push(0x11);
                out.extend_from_slice(&v.to_be_bytes()[2..]);
            }
            v => {
                let index = pool.integer(v)?;
                load_constant(out, index);
            }
        },
        Str(text) => {
            let index = pool.string(text)?;
            load_constant(out, index);
        }
        Dup => out.push(0x59),
        Add => out.push(0x60),
        Sub => out.push(0x64),
        Mul => out.push(0x68),
        Div => out.push(0x6C),
        Rem => out.push(0x70),
        Neg => out.push(0x74),
        Shl => out.push(0x78),
        Shr => out.push(0x7A),
        And => out.push(0x7E),
        Or => out.push(0x80),
        Xor => out.push(0x82),
        If(cond, label) => {
            out.extend_from_slice(&[0x99 + cond_offset(*cond), 0, 0]);
            return Ok(Some(*label));
        }
        IfCmp(cond, label) => {
            out.extend_from_slice(&[0x9F + cond_offset(*cond), 0, 0]);
            return Ok(Some(*label));
        }
        IfRefCmp(cond, label) => {
            let opcode = match cond {
                RefCond::Eq => 0xA5,
                RefCond::Ne => 0xA6,
            };
            out.extend_from_slice(&[opcode, 0, 0]);
            return Ok(Some(*label));
        }
        Goto(label) => {
            out.extend_from_slice(&[0xA7, 0, 0]);
            return Ok(Some(*label));
        }
        Load(slot) => local(out, 0x15, 0x1A, *slot),
        Store(slot) => local(out, 0x36, 0x3B, *slot),
        Inc(Slot(slot), by) => match u8::try_from(*slot) {
            Ok(slot) => out.extend_from_slice(&[0x84, slot, by.to_be_bytes()[0]]),
            Err(_) => {
                out.extend_from_slice(&[0xC4, 0x84]);
                put_u16(out, *slot);
                out.extend_from_slice(&i16::from(*by).to_be_bytes());
            }
        },
        GetStatic(m) => member(out, 0xB2, pool.field(m)?),
        PutStatic(m) => member(out, 0xB3, pool.field(m)?),
        PutField(m) => member(out, 0xB5, pool.field(m)?),
        InvokeVirtual(m) => member(out, 0xB6, pool.method(m)?),
        InvokeSpecial(m) => member(out, 0xB7, pool.method(m)?),
        InvokeStatic(m) => member(out, 0xB8, pool.method(m)?),
        New(class) => member(out, 0xBB, pool.class(class)?),
        Return => out.push(0xB1),
    }
    Ok(None)
}

fn cond_offset(cond: Cond) -> u8 {
    match cond {
        Cond::Eq => 0,
        Cond::Ne => 1,
        Cond::Lt => 2,
        Cond::Ge => 3,
        Cond::Gt => 4,
        Cond::Le => 5,
    }
}

fn load_constant(out: &mut Vec<u8>, index: u16) {
    match u8::try_from(index) {
        Ok(index) => out.extend_from_slice(&[0x12, index]),
        Err(_) => member(out, 0x13, index),
    }
}

fn local(out: &mut Vec<u8>, opcode: u8, short_opcode: u8, Slot(slot): Slot) {
    match u8::try_from(slot) {
        Ok(short @ 0..=3) => out.push(short_opcode + short),
        Ok(slot) => out.extend_from_slice(&[opcode, slot]),
        Err(_) => {
            out.extend_from_slice(&[0xC4, opcode]);
            put_u16(out, slot);
        }
    }
}

fn member(out: &mut Vec<u8>, opcode: u8, index: u16) {
    out.push(opcode);
    put_u16(out, index);
}

/// The operand stack slots taken by a value of the provided field type.
fn value_size(descriptor: &str) -> u16 {
    match descriptor.as_bytes().first() {
        Some(b'J' | b'D') => 2,
        Some(b'V') | None => 0,
        _ => 1,
    }
}

/// Returns the stack slots of the arguments and of the return value.
fn method_sizes(descriptor: &str) -> emit::Result<(u16, u16)> {
    let malformed = || emit::Error::Stack(format!("malformed descriptor {descriptor}"));
    let (params, ret) = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .ok_or_else(malformed)?;

    let mut args = 0;
    let mut rest = params.as_bytes();
    while !rest.is_empty() {
        let dims = rest.iter().take_while(|&&b| b == b'[').count();
        let (&kind, tail) = rest[dims..].split_first().ok_or_else(malformed)?;
        rest = tail;
        match kind {
            b'L' => {
                let end = rest.iter().position(|&b| b == b';').ok_or_else(malformed)?;
                rest = &rest[end + 1..];
            }
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => (),
            _ => return Err(malformed()),
        }
        args += if dims == 0 && matches!(kind, b'J' | b'D') {
            2
        } else {
            1
        };
    }
    Ok((args, value_size(ret)))
}

/// Returns how many values the instruction pops and pushes.
fn stack_effect(insn: &Insn) -> emit::Result<(u16, u16)> {
    use Insn::*;
    Ok(match insn {
        Const(_) | Str(_) | Load(_) | New(_) => (0, 1),
        Dup => (1, 2),
        Store(_) | If(..) => (1, 0),
        Add | Sub | Mul | Div | Rem | Shl | Shr | And | Or | Xor => (2, 1),
        Neg => (1, 1),
        IfCmp(..) | IfRefCmp(..) => (2, 0),
        Goto(_) | Inc(..) | Return => (0, 0),
        GetStatic(m) => (0, value_size(&m.descriptor)),
        PutStatic(m) => (value_size(&m.descriptor), 0),
        PutField(m) => (1 + value_size(&m.descriptor), 0),
        InvokeVirtual(m) | InvokeSpecial(m) => {
            let (args, ret) = method_sizes(&m.descriptor)?;
            (args + 1, ret)
        }
        InvokeStatic(m) => method_sizes(&m.descriptor)?,
    })
}

/// Computes the deepest operand stack over every path, checking that each
/// instruction is always reached at the same depth.
fn max_stack(method: &Method) -> emit::Result<u16> {
    let code = &method.code;
    let mut depths: Vec<Option<u16>> = vec![None; code.len()];
    let mut worklist = vec![(0, 0)];
    let mut max = 0;

    while let Some((index, depth)) = worklist.pop() {
        let Some(insn) = code.get(index) else {
            return Err(emit::Error::Stack(format!(
                "control falls off the end of {}",
                method.name
            )));
        };
        match depths[index] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                return Err(emit::Error::Stack(format!(
                    "instruction {index} reached with depths {seen} and {depth}"
                )));
            }
            None => depths[index] = Some(depth),
        }

        let (pops, pushes) = stack_effect(insn)?;
        let after = depth
            .checked_sub(pops)
            .ok_or_else(|| emit::Error::Stack(format!("underflow at instruction {index}")))?;
        let after = after + pushes;
        max = max.max(after);

        let target = |label: Label| {
            method
                .label_offset(label)
                .ok_or(emit::Error::UnplacedLabel(label))
        };
        match insn {
            Insn::Return => {}
            Insn::Goto(label) => worklist.push((target(*label)?, after)),
            Insn::If(_, label) | Insn::IfCmp(_, label) | Insn::IfRefCmp(_, label) => {
                worklist.push((target(*label)?, after));
                worklist.push((index + 1, after));
            }
            _ => worklist.push((index + 1, after)),
        }
    }
    Ok(max)
}

fn max_locals(method: &Method) -> emit::Result<u16> {
    let (args, _) = method_sizes(&method.descriptor)?;
    let used = method
        .code
        .iter()
        .filter_map(|insn| match insn {
            Insn::Load(Slot(slot)) | Insn::Store(Slot(slot)) | Insn::Inc(Slot(slot), _) => {
                Some(*slot)
            }
            _ => None,
        })
        .max()
        .map_or(Ok(0), |slot| {
            slot.checked_add(1).ok_or(emit::Error::Limit("local count"))
        })?;
    Ok(args.max(used))
}

fn count(len: usize, what: &'static str) -> emit::Result<u16> {
    u16::try_from(len).map_err(|_| emit::Error::Limit(what))
}

fn wide_count(len: usize, what: &'static str) -> emit::Result<u32> {
    u32::try_from(len).map_err(|_| emit::Error::Limit(what))
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn method(code: Vec<Insn>, labels: &[(Label, usize)]) -> Method {
        Method {
            name: "main".to_owned(),
            descriptor: runtime::MAIN_DESC.to_owned(),
            code,
            labels: labels.iter().copied().collect(),
            lines: vec![(0, 1)],
        }
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut pool = ConstantPool::default();
        let a = pool.class("A").unwrap();
        assert_eq!(pool.utf8("A").unwrap(), 1);
        assert_eq!(pool.class("A").unwrap(), a);
        assert_eq!(pool.integer(70_000).unwrap(), 3);
        assert_eq!(pool.entries.len(), 3);
    }

    #[test]
    fn encodes_constants_by_size() {
        let mut pool = ConstantPool::default();
        let code = [
            Insn::Const(-1),
            Insn::Const(5),
            Insn::Const(255),
            Insn::Const(1000),
            Insn::Const(70_000),
        ];
        let mut out = Vec::new();
        for insn in &code {
            encode_insn(insn, &mut out, &mut pool).unwrap();
        }
        assert_eq!(out, [0x02, 0x08, 0x11, 0x00, 0xFF, 0x11, 0x03, 0xE8, 0x12, 1]);

        let mut out = Vec::new();
        encode_insn(&Insn::Const(-128), &mut out, &mut pool).unwrap();
        assert_eq!(out, [0x10, 0x80]);
    }

    #[test]
    fn patches_forward_and_backward_branches() {
        let (top, end) = (Label(0), Label(1));
        let m = method(
            vec![
                Insn::Load(Slot(1)),
                Insn::If(Cond::Eq, end),
                Insn::Inc(Slot(1), -1),
                Insn::Goto(top),
                Insn::Return,
            ],
            &[(top, 0), (end, 4)],
        );
        let code = assemble(&m, &mut ConstantPool::default()).unwrap();
        assert_eq!(
            code.bytes,
            [0x1B, 0x99, 0x00, 0x09, 0x84, 0x01, 0xFF, 0xA7, 0xFF, 0xF9, 0xB1]
        );
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 2);
        assert_eq!(code.lines, [(0, 1)]);
    }

    #[test]
    fn compares_references_by_identity() {
        let image = MemberRef::new("p", "i", runtime::IMAGE_DESC);
        let (holds, end) = (Label(0), Label(1));
        let m = method(
            vec![
                Insn::GetStatic(image.clone()),
                Insn::GetStatic(image),
                Insn::IfRefCmp(RefCond::Ne, holds),
                Insn::Const(0),
                Insn::Goto(end),
                Insn::Const(1),
                Insn::Return,
            ],
            &[(holds, 5), (end, 6)],
        );
        let code = assemble(&m, &mut ConstantPool::default()).unwrap();
        assert_eq!(code.bytes[6..9], [0xA6, 0x00, 0x07]);
        assert_eq!(code.max_stack, 2);
    }

    #[test]
    fn stack_depth_follows_calls() {
        let image = MemberRef::new("p", "i", runtime::IMAGE_DESC);
        let m = method(
            vec![
                Insn::GetStatic(image),
                Insn::Dup,
                Insn::Const(0),
                Insn::Const(0),
                Insn::Const(1),
                Insn::Const(2),
                Insn::Const(3),
                Insn::InvokeStatic(runtime::make_pixel()),
                Insn::InvokeVirtual(runtime::image_member("setPixel", "(III)V")),
                Insn::InvokeVirtual(runtime::update_frame()),
                Insn::Return,
            ],
            &[],
        );
        assert_eq!(max_stack(&m), Ok(7));
        assert_eq!(max_locals(&m), Ok(1));
    }

    #[test]
    fn rejects_broken_stack_discipline() {
        let underflow = method(vec![Insn::Add, Insn::Return], &[]);
        assert_eq!(
            max_stack(&underflow),
            Err(emit::Error::Stack("underflow at instruction 0".to_owned()))
        );

        let l = Label(0);
        let unbalanced = method(
            vec![
                Insn::Const(0),
                Insn::If(Cond::Eq, l),
                Insn::Const(1),
                Insn::Return,
            ],
            &[(l, 3)],
        );
        assert!(matches!(max_stack(&unbalanced), Err(emit::Error::Stack(_))));

        let falls_off = method(vec![Insn::Const(0), Insn::Store(Slot(1))], &[]);
        assert!(matches!(max_stack(&falls_off), Err(emit::Error::Stack(_))));
    }

    #[test]
    fn parses_method_descriptors() {
        assert_eq!(method_sizes("()V"), Ok((0, 0)));
        assert_eq!(method_sizes("(IIII)V"), Ok((4, 0)));
        assert_eq!(method_sizes("([Ljava/lang/String;)V"), Ok((1, 0)));
        assert_eq!(method_sizes("(Ljava/lang/String;J[[I)I"), Ok((4, 1)));
        assert!(method_sizes("(Q)V").is_err());
    }

    #[test]
    fn encodes_modified_utf8() {
        assert_eq!(modified_utf8("a\0"), [b'a', 0xC0, 0x80]);
        assert_eq!(modified_utf8("é"), "é".as_bytes());
        assert_eq!(
            modified_utf8("\u{1F600}"),
            [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
    }

    #[test]
    fn writes_the_class_header() {
        let mut l = ClassFileEmitter::new();
        l.begin_module("Demo", "demo.plp").unwrap();
        l.declare_static("a", "I").unwrap();
        l.begin_method(runtime::MAIN, runtime::MAIN_DESC).unwrap();
        l.line(1);
        l.emit(Insn::Return);
        l.end_method().unwrap();
        let bytes = l.finish().unwrap();

        assert_eq!(bytes[..8], [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 50]);
        assert!(bytes.windows(4).any(|w| w == b"Demo"));
        assert!(bytes.windows(8).any(|w| w == b"demo.plp"));
        assert!(bytes.windows(15).any(|w| w == b"LineNumberTable"));
    }
}
