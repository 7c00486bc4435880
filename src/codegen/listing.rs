use std::{collections::BTreeMap, fmt};

use crate::codegen::emit::{self, Emitter, Insn, Label};

/// An in-memory backend. It keeps every instruction as emitted, which makes
/// it the base for the other backends and for executing generated code in
/// tests.
#[derive(Debug, Default)]
pub struct Listing {
    module: Option<Module>,
    method: Option<Method>,
    next_label: u32,
}

impl Listing {
    pub fn new() -> Listing {
        Listing::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub name: String,
    pub source_file: String,
    pub statics: Vec<Static>,
    pub methods: Vec<Method>,
}

impl Module {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Static {
    pub name: String,
    pub descriptor: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub code: Vec<Insn>,
    /// Maps each placed label to the index of the instruction it precedes.
    pub labels: BTreeMap<Label, usize>,
    /// Pairs of (first instruction index, source line), ordered by index.
    pub lines: Vec<(usize, u32)>,
}

impl Method {
    pub fn label_offset(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    /// The source line of the instruction at the provided index.
    pub fn line_at(&self, index: usize) -> Option<u32> {
        let after = self.lines.partition_point(|&(start, _)| start <= index);
        after.checked_sub(1).map(|i| self.lines[i].1)
    }
}

impl Emitter for Listing {
    type Output = Module;

    fn begin_module(&mut self, name: &str, source_file: &str) -> emit::Result<()> {
        self.module = Some(Module {
            name: name.to_owned(),
            source_file: source_file.to_owned(),
            ..Module::default()
        });
        Ok(())
    }

    fn declare_static(&mut self, name: &str, descriptor: &str) -> emit::Result<()> {
        let module = self.module.as_mut().ok_or(emit::Error::NoModule)?;
        module.statics.push(Static {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        });
        Ok(())
    }

    fn begin_method(&mut self, name: &str, descriptor: &str) -> emit::Result<()> {
        if self.module.is_none() {
            return Err(emit::Error::NoModule);
        }
        if self.method.is_some() {
            return Err(emit::Error::UnclosedMethod);
        }
        self.method = Some(Method {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            ..Method::default()
        });
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn place_label(&mut self, label: Label) -> emit::Result<()> {
        let method = self.method.as_mut().ok_or(emit::Error::NoMethod)?;
        let at = method.code.len();
        if method.labels.insert(label, at).is_some() {
            return Err(emit::Error::LabelPlacedTwice(label));
        }
        Ok(())
    }

    fn line(&mut self, line: u32) {
        let Some(method) = self.method.as_mut() else {
            return;
        };
        let at = method.code.len();
        match method.lines.last_mut() {
            Some((_, last)) if *last == line => (),
            Some((start, last)) if *start == at => *last = line,
            _ => method.lines.push((at, line)),
        }
    }

    fn emit(&mut self, insn: Insn) {
        if let Some(method) = self.method.as_mut() {
            method.code.push(insn);
        }
    }

    fn end_method(&mut self) -> emit::Result<()> {
        let method = self.method.take().ok_or(emit::Error::NoMethod)?;
        if let Some(label) = method
            .code
            .iter()
            .filter_map(Insn::target)
            .find(|label| !method.labels.contains_key(label))
        {
            return Err(emit::Error::UnplacedLabel(label));
        }
        let module = self.module.as_mut().ok_or(emit::Error::NoModule)?;
        module.methods.push(method);
        Ok(())
    }

    fn finish(self) -> emit::Result<Module> {
        if self.method.is_some() {
            return Err(emit::Error::UnclosedMethod);
        }
        self.module.ok_or(emit::Error::NoModule)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} ({})", self.name, self.source_file)?;
        for s in &self.statics {
            writeln!(f, "static {} {}", s.name, s.descriptor)?;
        }
        for method in &self.methods {
            write!(f, "{method}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method {} {}", self.name, self.descriptor)?;
        let mut lines = self.lines.iter().peekable();
        for at in 0..=self.code.len() {
            for (label, _) in self.labels.iter().filter(|&(_, &i)| i == at) {
                writeln!(f, "{label}:")?;
            }
            if let Some((_, line)) = lines.next_if(|(start, _)| *start == at) {
                writeln!(f, "  ; line {line}")?;
            }
            if let Some(insn) = self.code.get(at) {
                writeln!(f, "  {insn}")?;
            }
        }
        Ok(())
    }
}
