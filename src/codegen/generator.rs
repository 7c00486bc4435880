use std::{collections::HashMap, rc::Rc};

use tracing::{debug, info_span};

use crate::{
    ast::{
        Attribute, BinaryOperator, Dec, Expr, ExprKind, Ident, PixelExpr, Predefined, Program,
        Stmt, StmtKind, Typed, UnaryOperator,
    },
    codegen::{
        emit::{Cond, Emitter, Insn, Label, MemberRef, RefCond, Slot},
        runtime, Error, Result,
    },
    token::Span,
    types::{DeclType, PixelTarget, SymbolTable, Type},
    util::{fmt::source::LineIndex, intern::Interner},
};

// Local slot names. Slot 0 holds the arguments of `main`.
const X: &str = "x";
const Y: &str = "y";
const WIDTH: &str = "width";
const HEIGHT: &str = "height";

/// Lowers a checked program into a single module holding one static per
/// declaration and a `main` method running the statements.
pub struct Generator<'a, E> {
    emitter: E,
    ident_interner: &'a Interner,
    symbols: &'a SymbolTable,
    lines: LineIndex,
    module: Rc<str>,
    slots: HashMap<&'static str, Slot>,
}

impl<'a, E> Generator<'a, E>
where
    E: Emitter,
{
    pub fn new(
        emitter: E,
        ident_interner: &'a Interner,
        symbols: &'a SymbolTable,
        src: &str,
    ) -> Generator<'a, E> {
        Generator {
            emitter,
            ident_interner,
            symbols,
            lines: LineIndex::new(src),
            module: Rc::from(""),
            slots: HashMap::new(),
        }
    }

    pub fn generate(mut self, source_name: &str, program: &Program<Typed>) -> Result<E::Output> {
        let name = self.name(program.name);
        let _span = info_span!("codegen", module = name).entered();
        self.module = Rc::from(name);

        self.g_program(source_name, program)?;

        debug!(statics = program.decs.len(), "generated module");
        Ok(self.emitter.finish()?)
    }

    fn g_program(&mut self, source_name: &str, program: &Program<Typed>) -> Result<()> {
        self.emitter.begin_module(&self.module, source_name)?;
        for dec in &program.decs {
            let name = self.name(dec.name);
            self.emitter.declare_static(name, runtime::descriptor(dec.ty))?;
        }

        self.emitter.begin_method(runtime::MAIN, runtime::MAIN_DESC)?;
        self.g_line(program.name.span);
        for name in [X, Y] {
            let slot = self.slot(name);
            self.emit(Insn::Const(0));
            self.emit(Insn::Store(slot));
        }
        for dec in &program.decs {
            self.g_dec(dec)?;
        }
        self.g_stmts(&program.stmts)?;
        self.emit(Insn::Return);
        self.emitter.end_method()?;
        Ok(())
    }

    fn g_dec(&mut self, dec: &Dec) -> Result<()> {
        self.g_line(dec.span);
        if dec.ty == DeclType::Image {
            let class: Rc<str> = Rc::from(runtime::IMAGE_CLASS);
            self.emit(Insn::New(Rc::clone(&class)));
            self.emit(Insn::Dup);
            self.emit(Insn::InvokeSpecial(MemberRef::new(
                class,
                "<init>",
                runtime::VOID_DESC,
            )));
            let global = self.global(dec.name)?;
            self.emit(Insn::PutStatic(global));
        }
        Ok(())
    }

    fn g_stmts(&mut self, stmts: &[Stmt<Typed>]) -> Result<()> {
        stmts.iter().try_for_each(|stmt| self.g_stmt(stmt))
    }

    fn g_stmt(&mut self, stmt: &Stmt<Typed>) -> Result<()> {
        self.g_line(stmt.span);
        match &stmt.kind {
            StmtKind::Alternative {
                condition,
                then_body,
                else_body,
            } => {
                let else_label = self.emitter.new_label();
                self.g_expr(condition)?;
                self.emit(Insn::If(Cond::Eq, else_label));
                self.g_stmts(then_body)?;
                if else_body.is_empty() {
                    self.emitter.place_label(else_label)?;
                } else {
                    let end = self.emitter.new_label();
                    self.emit(Insn::Goto(end));
                    self.emitter.place_label(else_label)?;
                    self.g_stmts(else_body)?;
                    self.emitter.place_label(end)?;
                }
            }
            StmtKind::Iteration { condition, body } => {
                let body_label = self.emitter.new_label();
                let guard = self.emitter.new_label();
                self.emit(Insn::Goto(guard));
                self.emitter.place_label(body_label)?;
                self.g_stmts(body)?;
                self.emitter.place_label(guard)?;
                self.g_line(stmt.span);
                self.g_expr(condition)?;
                self.emit(Insn::If(Cond::Ne, body_label));
            }
            StmtKind::Pause(expr) => {
                self.g_expr(expr)?;
                self.emit(Insn::InvokeStatic(runtime::pause()));
            }
            StmtKind::AssignPixel {
                target,
                pixel,
                info: PixelTarget::Pixel,
            } => {
                self.g_pixel(pixel)?;
                let global = self.global(*target)?;
                self.emit(Insn::PutStatic(global));
            }
            StmtKind::AssignPixel {
                target,
                pixel,
                info: PixelTarget::Image,
            } => self.g_broadcast(*target, pixel)?,
            StmtKind::SinglePixel {
                target,
                x,
                y,
                pixel,
            } => {
                self.g_image(*target)?;
                self.emit(Insn::Dup);
                self.g_expr(x)?;
                self.g_expr(y)?;
                self.g_pixel(pixel)?;
                self.invoke_image("setPixel", runtime::SET_PIXEL_DESC);
                self.g_update_frame();
            }
            StmtKind::SingleSample {
                target,
                x,
                y,
                color,
                value,
            } => {
                self.g_image(*target)?;
                self.emit(Insn::Dup);
                self.g_expr(x)?;
                self.g_expr(y)?;
                let channel = self.channel(*color)?;
                self.emit(Insn::Const(channel));
                self.g_expr(value)?;
                self.invoke_image("setSample", runtime::SET_SAMPLE_DESC);
                self.g_update_frame();
            }
            StmtKind::ScreenLocation { target, x, y } => {
                self.g_image(*target)?;
                self.g_put_field(x, "x_loc", "I")?;
                self.g_put_field(y, "y_loc", "I")?;
                self.g_update_frame();
            }
            StmtKind::Shape {
                target,
                width,
                height,
            } => {
                self.g_image(*target)?;
                self.g_put_field(height, "height", "I")?;
                self.g_put_field(width, "width", "I")?;
                self.emit(Insn::Dup);
                self.invoke_image("updateImageSize", runtime::VOID_DESC);
                self.g_update_frame();
            }
            StmtKind::Visibility { target, value } => {
                self.g_image(*target)?;
                self.g_put_field(value, "isVisible", "Z")?;
                self.g_update_frame();
            }
            StmtKind::FileLoad { target, file } => {
                self.g_image(*target)?;
                self.emit(Insn::Dup);
                self.emit(Insn::Str(Rc::from(&*file.inner)));
                self.invoke_image("loadImage", runtime::LOAD_IMAGE_DESC);
                self.g_update_frame();
            }
            StmtKind::AssignExpr { target, value } => {
                self.g_expr(value)?;
                let global = self.global(*target)?;
                self.emit(Insn::PutStatic(global));
            }
        }
        Ok(())
    }

    /// Writes the pixel to every coordinate of the image, column by column,
    /// leaving `x` and `y` at the image bounds.
    fn g_broadcast(&mut self, target: Ident, pixel: &PixelExpr<Typed>) -> Result<()> {
        let image = self.global(target)?;
        let (x, y) = (self.slot(X), self.slot(Y));
        let (width, height) = (self.slot(WIDTH), self.slot(HEIGHT));
        self.emit(Insn::GetStatic(image.clone()));
        self.emit(Insn::Dup);
        self.emit(Insn::Dup);
        self.invoke_image("getWidth", runtime::GETTER_DESC);
        self.emit(Insn::Store(width));
        self.invoke_image("getHeight", runtime::GETTER_DESC);
        self.emit(Insn::Store(height));

        let outer_body = self.emitter.new_label();
        let outer_guard = self.emitter.new_label();
        let inner_body = self.emitter.new_label();
        let inner_guard = self.emitter.new_label();

        self.emit(Insn::Const(0));
        self.emit(Insn::Store(x));
        self.emit(Insn::Goto(outer_guard));
        self.emitter.place_label(outer_body)?;
        self.emit(Insn::Const(0));
        self.emit(Insn::Store(y));
        self.emit(Insn::Goto(inner_guard));

        self.emitter.place_label(inner_body)?;
        self.emit(Insn::GetStatic(image));
        self.emit(Insn::Load(x));
        self.emit(Insn::Load(y));
        self.g_pixel(pixel)?;
        self.invoke_image("setPixel", runtime::SET_PIXEL_DESC);
        self.emit(Insn::Inc(y, 1));

        self.emitter.place_label(inner_guard)?;
        self.g_bounded(y, height, inner_body);
        self.emit(Insn::Inc(x, 1));

        self.emitter.place_label(outer_guard)?;
        self.g_bounded(x, width, outer_body);

        self.g_update_frame();
        Ok(())
    }

    fn g_bounded(&mut self, index: Slot, bound: Slot, body: Label) {
        self.emit(Insn::Load(index));
        self.emit(Insn::Load(bound));
        self.emit(Insn::IfCmp(Cond::Lt, body));
    }

    /// Expects the image on the stack, and keeps it there.
    fn g_put_field(&mut self, value: &Expr<Typed>, field: &str, descriptor: &str) -> Result<()> {
        self.emit(Insn::Dup);
        self.g_expr(value)?;
        self.emit(Insn::PutField(runtime::image_member(field, descriptor)));
        Ok(())
    }

    fn g_pixel(&mut self, pixel: &PixelExpr<Typed>) -> Result<()> {
        self.g_expr(&pixel.red)?;
        self.g_expr(&pixel.green)?;
        self.g_expr(&pixel.blue)?;
        self.emit(Insn::InvokeStatic(runtime::make_pixel()));
        Ok(())
    }

    fn g_expr(&mut self, expr: &Expr<Typed>) -> Result<()> {
        if expr.info.is_none() {
            return Err(Error::Untyped(expr.span));
        }
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                self.g_expr(lhs)?;
                self.g_expr(rhs)?;
                if op.is_equality() && lhs.info == Some(Type::Image) {
                    let cond = match op {
                        BinaryOperator::Eq => RefCond::Eq,
                        _ => RefCond::Ne,
                    };
                    self.g_comparison(|holds| Insn::IfRefCmp(cond, holds))?;
                } else {
                    self.g_binary(*op)?;
                }
            }
            ExprKind::Unary { op, expr } => {
                self.g_expr(expr)?;
                match op {
                    UnaryOperator::Neg => self.emit(Insn::Neg),
                    UnaryOperator::Not => {
                        self.emit(Insn::Const(1));
                        self.emit(Insn::Xor);
                    }
                }
            }
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                let else_label = self.emitter.new_label();
                let end = self.emitter.new_label();
                self.g_expr(condition)?;
                self.emit(Insn::If(Cond::Eq, else_label));
                self.g_expr(then_arm)?;
                self.emit(Insn::Goto(end));
                self.emitter.place_label(else_label)?;
                self.g_expr(else_arm)?;
                self.emitter.place_label(end)?;
            }
            ExprKind::Sample {
                image,
                x,
                y,
                color,
            } => {
                self.g_image(*image)?;
                self.g_expr(x)?;
                self.g_expr(y)?;
                let channel = self.channel(*color)?;
                self.emit(Insn::Const(channel));
                self.invoke_image("getSample", runtime::GET_SAMPLE_DESC);
            }
            ExprKind::Attribute { image, attribute } => {
                self.g_image(*image)?;
                let getter = match attribute {
                    Attribute::Width => "getWidth",
                    Attribute::Height => "getHeight",
                    Attribute::XLoc => "getX_loc",
                    Attribute::YLoc => "getY_loc",
                };
                self.invoke_image(getter, runtime::GETTER_DESC);
            }
            ExprKind::Pixel(pixel) => self.g_pixel(pixel)?,
            ExprKind::Paren(expr) => self.g_expr(expr)?,
            ExprKind::Id(ident) => {
                let global = self.global(*ident)?;
                self.emit(Insn::GetStatic(global));
            }
            ExprKind::Int(int) => self.emit(Insn::Const(*int)),
            ExprKind::Bool(value) => self.emit(Insn::Const(i32::from(*value))),
            ExprKind::Predefined(predefined) => {
                let insn = match predefined {
                    Predefined::X => Insn::Load(self.slot(X)),
                    Predefined::Y => Insn::Load(self.slot(Y)),
                    Predefined::Z => Insn::Const(runtime::Z),
                    Predefined::ScreenSize => Insn::Const(runtime::SCREEN_SIZE),
                };
                self.emit(insn);
            }
        }
        Ok(())
    }

    fn g_binary(&mut self, op: BinaryOperator) -> Result<()> {
        use BinaryOperator::*;
        let insn = match op {
            Add => Insn::Add,
            Sub => Insn::Sub,
            Mul => Insn::Mul,
            Div => Insn::Div,
            Rem => Insn::Rem,
            Shl => Insn::Shl,
            Shr => Insn::Shr,
            And => Insn::And,
            Or => Insn::Or,
            Eq | NotEq | Less | LessEq | Greater | GreaterEq => {
                let cond = match op {
                    Eq => Cond::Eq,
                    NotEq => Cond::Ne,
                    Less => Cond::Lt,
                    LessEq => Cond::Le,
                    Greater => Cond::Gt,
                    _ => Cond::Ge,
                };
                return self.g_comparison(|holds| Insn::IfCmp(cond, holds));
            }
        };
        self.emit(insn);
        Ok(())
    }

    /// Replaces the two topmost values by 1 if the branch built by `compare`
    /// is taken, and by 0 otherwise.
    fn g_comparison(&mut self, compare: impl FnOnce(Label) -> Insn) -> Result<()> {
        let holds = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.emit(compare(holds));
        self.emit(Insn::Const(0));
        self.emit(Insn::Goto(end));
        self.emitter.place_label(holds)?;
        self.emit(Insn::Const(1));
        self.emitter.place_label(end)?;
        Ok(())
    }

    fn g_image(&mut self, image: Ident) -> Result<()> {
        let global = self.global(image)?;
        self.emit(Insn::GetStatic(global));
        Ok(())
    }

    /// Expects the image on the stack, and consumes it.
    fn g_update_frame(&mut self) {
        self.emit(Insn::InvokeVirtual(runtime::update_frame()));
    }

    fn g_line(&mut self, span: Span) {
        let line = self.lines.line(span);
        self.emitter.line(line);
    }
}

// Utility functions.
impl<'a, E> Generator<'a, E>
where
    E: Emitter,
{
    fn emit(&mut self, insn: Insn) {
        self.emitter.emit(insn);
    }

    fn invoke_image(&mut self, method: &str, descriptor: &str) {
        self.emit(Insn::InvokeVirtual(runtime::image_member(method, descriptor)));
    }

    /// Returns the slot of the local, allocating the next free one on first use.
    #[allow(clippy::cast_possible_truncation)]
    fn slot(&mut self, name: &'static str) -> Slot {
        let next = Slot(self.slots.len() as u16 + 1);
        *self.slots.entry(name).or_insert(next)
    }

    fn name(&self, ident: Ident) -> &'a str {
        self.ident_interner.get(ident)
    }

    /// The static field backing a declared variable.
    fn global(&self, ident: Ident) -> Result<MemberRef> {
        let dec = self
            .symbols
            .get(ident)
            .ok_or(Error::Undeclared(ident.span))?;
        Ok(MemberRef::new(
            Rc::clone(&self.module),
            self.name(ident),
            runtime::descriptor(dec.ty),
        ))
    }

    fn channel(&self, color: Ident) -> Result<i32> {
        runtime::channel(self.name(color)).ok_or(Error::UnknownColor(color.span))
    }
}
