//! A stack machine executing [`Listing`](crate::codegen::listing::Listing)
//! modules against an in-memory image runtime that records every call.

use std::{collections::HashMap, rc::Rc};

use crate::codegen::{
    emit::{Insn, MemberRef},
    listing::{Method, Module},
    runtime,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Image(usize),
    Str(Rc<str>),
    Null,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: i32,
    pub height: i32,
    pub x_loc: i32,
    pub y_loc: i32,
    pub visible: bool,
    pub pixels: Vec<i32>,
}

impl Image {
    pub fn new(width: i32, height: i32) -> Image {
        let len = usize::try_from(width * height).unwrap_or(0);
        Image {
            width,
            height,
            x_loc: 0,
            y_loc: 0,
            visible: false,
            pixels: vec![0; len],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if (0..self.width).contains(&x) && (0..self.height).contains(&y) {
            usize::try_from(y * self.width + x).ok()
        } else {
            None
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<i32> {
        self.index(x, y).map(|i| self.pixels[i])
    }
}

/// A runtime call, as observed by the image double.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SetPixel {
        image: usize,
        x: i32,
        y: i32,
        pixel: i32,
    },
    SetSample {
        image: usize,
        x: i32,
        y: i32,
        channel: i32,
        value: i32,
    },
    UpdateFrame(usize),
    UpdateImageSize(usize),
    LoadImage(usize, Rc<str>),
    Pause(i32),
}

pub struct Vm<'m> {
    module: &'m Module,
    pub statics: HashMap<String, Value>,
    pub locals: HashMap<u16, i32>,
    pub images: Vec<Image>,
    pub calls: Vec<Call>,
    image_size: (i32, i32),
    fuel: usize,
}

pub type Trap = String;

impl<'m> Vm<'m> {
    pub fn new(module: &'m Module) -> Vm<'m> {
        let statics = module
            .statics
            .iter()
            .map(|s| {
                let value = if s.descriptor == runtime::IMAGE_DESC {
                    Value::Null
                } else {
                    Value::Int(0)
                };
                (s.name.clone(), value)
            })
            .collect();
        Vm {
            module,
            statics,
            locals: HashMap::new(),
            images: Vec::new(),
            calls: Vec::new(),
            image_size: (4, 3),
            fuel: 100_000,
        }
    }

    /// The size of newly constructed images.
    pub fn with_image_size(mut self, width: i32, height: i32) -> Vm<'m> {
        self.image_size = (width, height);
        self
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.statics.get(name) {
            Some(Value::Int(value)) => *value,
            other => panic!("static {name} is not an int: {other:?}"),
        }
    }

    pub fn image(&self, name: &str) -> &Image {
        match self.statics.get(name) {
            Some(Value::Image(index)) => &self.images[*index],
            other => panic!("static {name} is not an image: {other:?}"),
        }
    }

    pub fn run(&mut self) -> Result<(), Trap> {
        let module = self.module;
        let main = module
            .method(runtime::MAIN)
            .ok_or_else(|| "no main method".to_owned())?;
        self.execute(main)
    }

    fn execute(&mut self, method: &Method) -> Result<(), Trap> {
        let mut stack: Vec<Value> = Vec::with_capacity(16);
        let mut pc = 0;
        loop {
            self.fuel = self.fuel.checked_sub(1).ok_or("out of fuel")?;
            let insn = method
                .code
                .get(pc)
                .ok_or_else(|| format!("pc {pc} out of bounds"))?;
            pc += 1;

            let jump = |label| {
                method
                    .label_offset(label)
                    .ok_or_else(|| format!("unplaced label {label}"))
            };
            match insn {
                Insn::Const(value) => stack.push(Value::Int(*value)),
                Insn::Str(text) => stack.push(Value::Str(Rc::clone(text))),
                Insn::Dup => {
                    let top = stack.last().cloned().ok_or("dup on empty stack")?;
                    stack.push(top);
                }
                Insn::Add => binary(&mut stack, i32::wrapping_add)?,
                Insn::Sub => binary(&mut stack, i32::wrapping_sub)?,
                Insn::Mul => binary(&mut stack, i32::wrapping_mul)?,
                Insn::Div | Insn::Rem => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if rhs == 0 {
                        return Err("division by zero".to_owned());
                    }
                    let value = if *insn == Insn::Div {
                        lhs.wrapping_div(rhs)
                    } else {
                        lhs.wrapping_rem(rhs)
                    };
                    stack.push(Value::Int(value));
                }
                #[allow(clippy::cast_sign_loss)]
                Insn::Shl => binary(&mut stack, |a, b| a.wrapping_shl(b as u32))?,
                #[allow(clippy::cast_sign_loss)]
                Insn::Shr => binary(&mut stack, |a, b| a.wrapping_shr(b as u32))?,
                Insn::And => binary(&mut stack, |a, b| a & b)?,
                Insn::Or => binary(&mut stack, |a, b| a | b)?,
                Insn::Xor => binary(&mut stack, |a, b| a ^ b)?,
                Insn::Neg => {
                    let value = pop_int(&mut stack)?;
                    stack.push(Value::Int(value.wrapping_neg()));
                }
                Insn::If(cond, label) => {
                    if cond.holds(pop_int(&mut stack)?, 0) {
                        pc = jump(*label)?;
                    }
                }
                Insn::IfCmp(cond, label) => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if cond.holds(lhs, rhs) {
                        pc = jump(*label)?;
                    }
                }
                Insn::IfRefCmp(cond, label) => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    if cond.holds(lhs == rhs) {
                        pc = jump(*label)?;
                    }
                }
                Insn::Goto(label) => pc = jump(*label)?,
                Insn::Load(slot) => {
                    let value = self
                        .locals
                        .get(&slot.0)
                        .ok_or_else(|| format!("local {} read before written", slot.0))?;
                    stack.push(Value::Int(*value));
                }
                Insn::Store(slot) => {
                    let value = pop_int(&mut stack)?;
                    self.locals.insert(slot.0, value);
                }
                Insn::Inc(slot, by) => {
                    let value = self
                        .locals
                        .get_mut(&slot.0)
                        .ok_or_else(|| format!("local {} read before written", slot.0))?;
                    *value = value.wrapping_add(i32::from(*by));
                }
                Insn::GetStatic(m) => {
                    let value = self
                        .statics
                        .get(&*m.name)
                        .cloned()
                        .ok_or_else(|| format!("no static {}", m.name))?;
                    stack.push(value);
                }
                Insn::PutStatic(m) => {
                    let value = pop(&mut stack)?;
                    let slot = self
                        .statics
                        .get_mut(&*m.name)
                        .ok_or_else(|| format!("no static {}", m.name))?;
                    *slot = value;
                }
                Insn::PutField(m) => {
                    let value = pop_int(&mut stack)?;
                    let image = pop_image(&mut stack)?;
                    let image = &mut self.images[image];
                    match &*m.name {
                        "x_loc" => image.x_loc = value,
                        "y_loc" => image.y_loc = value,
                        "width" => image.width = value,
                        "height" => image.height = value,
                        "isVisible" => image.visible = value != 0,
                        other => return Err(format!("no field {other}")),
                    }
                }
                Insn::InvokeVirtual(m) => self.invoke_image(m, &mut stack)?,
                Insn::InvokeStatic(m) => self.invoke_static(m, &mut stack)?,
                Insn::InvokeSpecial(m) if &*m.name == "<init>" => {
                    pop_image(&mut stack)?;
                }
                Insn::InvokeSpecial(m) => return Err(format!("unknown method {m}")),
                Insn::New(class) => {
                    if &**class != runtime::IMAGE_CLASS {
                        return Err(format!("unknown class {class}"));
                    }
                    let (width, height) = self.image_size;
                    self.images.push(Image::new(width, height));
                    stack.push(Value::Image(self.images.len() - 1));
                }
                Insn::Return => {
                    return if stack.is_empty() {
                        Ok(())
                    } else {
                        Err(format!("returned with {} values on the stack", stack.len()))
                    };
                }
            }
        }
    }

    fn invoke_static(&mut self, m: &MemberRef, stack: &mut Vec<Value>) -> Result<(), Trap> {
        match (&*m.owner, &*m.name) {
            (runtime::PIXEL_CLASS, "makePixel") => {
                let blue = pop_int(stack)?;
                let green = pop_int(stack)?;
                let red = pop_int(stack)?;
                stack.push(Value::Int(pack_pixel(red, green, blue)));
            }
            (runtime::IMAGE_CLASS, "pause") => {
                let millis = pop_int(stack)?;
                self.calls.push(Call::Pause(millis));
            }
            _ => return Err(format!("unknown method {m}")),
        }
        Ok(())
    }

    fn invoke_image(&mut self, m: &MemberRef, stack: &mut Vec<Value>) -> Result<(), Trap> {
        let params = m.descriptor.split(')').next().unwrap_or_default();
        let mut args = Vec::new();
        for _ in 0..params.matches('I').count() {
            args.push(pop_int(stack)?);
        }
        args.reverse();

        let file = if &*m.name == "loadImage" {
            match stack.pop() {
                Some(Value::Str(text)) => Some(text),
                other => return Err(format!("expected a string, found {other:?}")),
            }
        } else {
            None
        };
        let index = pop_image(stack)?;
        let image = &mut self.images[index];

        let result = match (&*m.name, args.as_slice()) {
            ("getWidth", []) => Some(image.width),
            ("getHeight", []) => Some(image.height),
            ("getX_loc", []) => Some(image.x_loc),
            ("getY_loc", []) => Some(image.y_loc),
            ("getSample", &[x, y, channel]) => {
                let pixel = image.pixel(x, y).ok_or("sample out of bounds")?;
                Some(pixel >> (16 - 8 * channel) & 0xff)
            }
            ("setPixel", &[x, y, pixel]) => {
                if let Some(i) = image.index(x, y) {
                    image.pixels[i] = pixel;
                }
                self.calls.push(Call::SetPixel {
                    image: index,
                    x,
                    y,
                    pixel,
                });
                None
            }
            ("setSample", &[x, y, channel, value]) => {
                if let Some(i) = image.index(x, y) {
                    let shift = 16 - 8 * channel;
                    let cleared = image.pixels[i] & !(0xff << shift);
                    image.pixels[i] = cleared | (value & 0xff) << shift;
                }
                self.calls.push(Call::SetSample {
                    image: index,
                    x,
                    y,
                    channel,
                    value,
                });
                None
            }
            ("updateImageSize", []) => {
                let len = usize::try_from(image.width * image.height).unwrap_or(0);
                image.pixels.resize(len, 0);
                self.calls.push(Call::UpdateImageSize(index));
                None
            }
            ("updateFrame", []) => {
                self.calls.push(Call::UpdateFrame(index));
                None
            }
            ("loadImage", []) => {
                let file = file.ok_or("loadImage without a file")?;
                self.calls.push(Call::LoadImage(index, file));
                None
            }
            _ => return Err(format!("unknown method {m}")),
        };
        if let Some(result) = result {
            stack.push(Value::Int(result));
        }
        Ok(())
    }
}

/// Packs the channels like the runtime's `makePixel`: opaque alpha, then
/// red, green and blue bytes, each channel truncated to its low byte.
pub fn pack_pixel(red: i32, green: i32, blue: i32) -> i32 {
    let byte = |c: i32| u32::from(c.to_le_bytes()[0]);
    let packed = 0xff00_0000 | byte(red) << 16 | byte(green) << 8 | byte(blue);
    i32::from_ne_bytes(packed.to_ne_bytes())
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, Trap> {
    stack.pop().ok_or_else(|| "stack underflow".to_owned())
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i32, Trap> {
    match pop(stack)? {
        Value::Int(value) => Ok(value),
        other => Err(format!("expected an int, found {other:?}")),
    }
}

fn pop_image(stack: &mut Vec<Value>) -> Result<usize, Trap> {
    match pop(stack)? {
        Value::Image(index) => Ok(index),
        other => Err(format!("expected an image, found {other:?}")),
    }
}

fn binary(stack: &mut Vec<Value>, op: impl FnOnce(i32, i32) -> i32) -> Result<(), Trap> {
    let rhs = pop_int(stack)?;
    let lhs = pop_int(stack)?;
    stack.push(Value::Int(op(lhs, rhs)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{codegen::listing::Listing, driver, util::intern::Interner};

    fn compile(src: &str) -> Module {
        let mut interner = Interner::with_capacity(16);
        driver::compile(src, "p.plp", &mut interner, Listing::new())
            .unwrap()
            .output
    }

    #[test]
    fn broadcast_writes_every_coordinate() {
        let module = compile("p { image i; i = {x, y, 7}; }");
        let mut vm = Vm::new(&module).with_image_size(4, 3);
        vm.run().unwrap();

        let writes = vm
            .calls
            .iter()
            .filter(|c| matches!(c, Call::SetPixel { .. }))
            .count();
        assert_eq!(writes, 12);
        assert_eq!(vm.calls.last(), Some(&Call::UpdateFrame(0)));
        let image = vm.image("i");
        for x in 0..4 {
            for y in 0..3 {
                assert_eq!(image.pixel(x, y), Some(pack_pixel(x, y, 7)));
            }
        }
    }

    #[test]
    fn broadcast_over_empty_image_writes_nothing() {
        let module = compile("p { image i; i = {1, 2, 3}; }");
        let mut vm = Vm::new(&module).with_image_size(0, 5);
        vm.run().unwrap();
        assert_eq!(vm.calls, [Call::UpdateFrame(0)]);
    }

    #[test]
    fn loops_check_the_guard_first() {
        let module = compile(indoc! {"
            p {
              int skipped;
              int counted;
              while (false) { skipped = skipped + 1; }
              while (counted < 5) { counted = counted + 1; }
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(vm.int("skipped"), 0);
        assert_eq!(vm.int("counted"), 5);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let module = compile(indoc! {"
            p {
              boolean lt;
              boolean ge;
              boolean eq;
              boolean ne;
              lt = 3 < 4;
              ge = 3 >= 4;
              eq = true == (1 <= 1);
              ne = 2 != 2;
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(
            [vm.int("lt"), vm.int("ge"), vm.int("eq"), vm.int("ne")],
            [1, 0, 1, 0]
        );
    }

    #[test]
    fn images_compare_by_identity() {
        let module = compile(indoc! {"
            p {
              image a;
              image b;
              boolean before;
              boolean after;
              boolean differ;
              before = a == b;
              a = b;
              after = a == b;
              differ = a != b;
            }
        "});
        let listing = module.to_string();
        assert!(listing.contains("ifrefcmpeq"));
        assert!(listing.contains("ifrefcmpne"));

        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(
            [vm.int("before"), vm.int("after"), vm.int("differ")],
            [0, 1, 0]
        );
    }

    #[test]
    fn pixel_packing() {
        assert_eq!(pack_pixel(0, 0, 0) as u32, 0xff00_0000);
        assert_eq!(pack_pixel(1, 2, 3) as u32, 0xff01_0203);
        assert_eq!(pack_pixel(runtime::Z, 256, -1) as u32, 0xffff_00ff);
    }

    #[test]
    fn arithmetic_and_conditionals() {
        let module = compile(indoc! {"
            p {
              int n;
              boolean b;
              n = -(2 * 3) + (true ? 10 : 20) % 7 << 2 >> 1;
              b = !(n == 0) & (false | true);
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(vm.int("n"), (-(2 * 3) + 10 % 7) << 2 >> 1);
        assert_eq!(vm.int("b"), 1);
    }

    #[test]
    fn if_else_takes_one_branch() {
        let module = compile(indoc! {"
            p {
              int a;
              if (a == 0) { a = 1; } else { a = 2; }
              if (a == 0) { a = 10; } else { a = a + 20; }
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(vm.int("a"), 21);
    }

    #[test]
    fn samples_update_single_channels() {
        let module = compile(indoc! {"
            p {
              image i;
              int g;
              i[1, 2] = {10, 20, 30};
              i.pixels[1, 2].green = 200;
              g = i[1, 2].green + i[1, 2].blue;
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(vm.int("g"), 230);
        assert_eq!(vm.image("i").pixel(1, 2), Some(pack_pixel(10, 200, 30)));
        assert_eq!(
            vm.calls,
            [
                Call::SetPixel {
                    image: 0,
                    x: 1,
                    y: 2,
                    pixel: pack_pixel(10, 20, 30)
                },
                Call::UpdateFrame(0),
                Call::SetSample {
                    image: 0,
                    x: 1,
                    y: 2,
                    channel: runtime::GREEN,
                    value: 200
                },
                Call::UpdateFrame(0),
            ]
        );
    }

    #[test]
    fn image_attributes_and_runtime_calls() {
        let module = compile(indoc! {r#"
            p {
              image i;
              int w;
              int s;
              i = "cat.png";
              i.shape = [5, 6];
              i.location = [SCREEN_SIZE - 10, Z];
              i.visible = true;
              pause 100;
              w = i.width * i.height;
              s = i.x_loc + i.y_loc;
            }
        "#});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();

        let image = vm.image("i");
        assert!(image.visible);
        assert_eq!(image.pixels.len(), 30);
        assert_eq!(vm.int("w"), 30);
        assert_eq!(vm.int("s"), 990 + 255);
        assert_eq!(
            vm.calls,
            [
                Call::LoadImage(0, Rc::from("cat.png")),
                Call::UpdateFrame(0),
                Call::UpdateImageSize(0),
                Call::UpdateFrame(0),
                Call::UpdateFrame(0),
                Call::UpdateFrame(0),
                Call::Pause(100),
            ]
        );
    }

    #[test]
    fn pixel_variables_hold_packed_colors() {
        let module = compile(indoc! {"
            p {
              pixel a;
              pixel b;
              a = {Z, 0, 1};
              b = a == a ? {1, 2, 3} : a;
            }
        "});
        let mut vm = Vm::new(&module);
        vm.run().unwrap();
        assert_eq!(vm.int("a"), pack_pixel(255, 0, 1));
        assert_eq!(vm.int("b"), pack_pixel(1, 2, 3));
    }

    #[test]
    fn division_by_zero_traps() {
        let module = compile("p { int a; a = 1 / a; }");
        assert_eq!(Vm::new(&module).run(), Err("division by zero".to_owned()));
    }

    #[test]
    fn demos_run_to_completion() {
        for src in [
            include_str!("../../demos/bounce.plp"),
            include_str!("../../demos/gradient.plp"),
        ] {
            let module = compile(src);
            let mut vm = Vm::new(&module).with_image_size(8, 8);
            vm.run().unwrap();
            assert!(vm.calls.contains(&Call::UpdateFrame(0)));
        }
    }
}
