use std::io::Write;

use crate::{
    ast::*,
    types::{PixelTarget, Type},
    util::intern::Interner,
};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string<I: InfoWriter>(idents: &Interner, program: &Program<I>) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string<I: InfoWriter>(idents: &Interner, expr: &Expr<I>) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, idents, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner,
    program: &Program<I>,
) -> std::io::Result<()> {
    writeln!(w, "program {}", idents.get(program.name))?;
    for dec in &program.decs {
        sp(w, 1)?;
        writeln!(w, "dec {} {} ({})", dec.ty, idents.get(dec.name), dec.span)?;
    }
    print_stmts(w, idents, 1, &program.stmts)
}

fn print_stmts<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    stmts: &[Stmt<I>],
) -> std::io::Result<()> {
    for stmt in stmts {
        print_stmt(w, idents, i, stmt)?;
    }
    Ok(())
}

fn print_stmt<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    stmt: &Stmt<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Alternative {
            condition,
            then_body,
            else_body,
        } => {
            writeln!(w, "if ({span})")?;
            print_expr(w, idents, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            print_stmts(w, idents, i + 2, then_body)?;
            if !else_body.is_empty() {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_stmts(w, idents, i + 2, else_body)?;
            }
        }
        StmtKind::Iteration { condition, body } => {
            writeln!(w, "while ({span})")?;
            print_expr(w, idents, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "do")?;
            print_stmts(w, idents, i + 2, body)?;
        }
        StmtKind::Pause(expr) => {
            writeln!(w, "pause ({span})")?;
            print_expr(w, idents, i + 1, expr)?;
        }
        StmtKind::AssignPixel {
            target,
            pixel,
            info,
        } => {
            let info = info.write_info();
            writeln!(w, "assign pixel {}{info} ({span})", idents.get(target))?;
            sp(w, i + 1)?;
            print_pixel(w, idents, i + 1, pixel, "")?;
        }
        StmtKind::SinglePixel {
            target,
            x,
            y,
            pixel,
        } => {
            writeln!(w, "set pixel {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, x)?;
            print_expr(w, idents, i + 1, y)?;
            sp(w, i + 1)?;
            print_pixel(w, idents, i + 1, pixel, "")?;
        }
        StmtKind::SingleSample {
            target,
            x,
            y,
            color,
            value,
        } => {
            let (target, color) = (idents.get(target), idents.get(color));
            writeln!(w, "set sample {target}.{color} ({span})")?;
            print_expr(w, idents, i + 1, x)?;
            print_expr(w, idents, i + 1, y)?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::ScreenLocation { target, x, y } => {
            writeln!(w, "set location {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, x)?;
            print_expr(w, idents, i + 1, y)?;
        }
        StmtKind::Shape {
            target,
            width,
            height,
        } => {
            writeln!(w, "set shape {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, width)?;
            print_expr(w, idents, i + 1, height)?;
        }
        StmtKind::Visibility { target, value } => {
            writeln!(w, "set visible {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::FileLoad { target, file } => {
            writeln!(w, "load {} {:?} ({span})", idents.get(target), file.inner)?;
        }
        StmtKind::AssignExpr { target, value } => {
            writeln!(w, "assign {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, value)?;
        }
    }
    Ok(())
}

/// Prints a pixel constructor. It starts at the current line, the caller being
/// responsible for the indentation.
fn print_pixel<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    pixel: &PixelExpr<I>,
    info: impl std::fmt::Display,
) -> std::io::Result<()> {
    writeln!(w, "pixel ({}{info})", pixel.span)?;
    print_expr(w, idents, i + 1, &pixel.red)?;
    print_expr(w, idents, i + 1, &pixel.green)?;
    print_expr(w, idents, i + 1, &pixel.blue)?;
    Ok(())
}

pub fn print_expr<I: InfoWriter>(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    expr: &Expr<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    let info = expr.info.write_info(); // inferred type, for typed ASTs
    let span = expr.span;
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span}{info})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} ({span}{info})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Conditional {
            condition,
            then_arm,
            else_arm,
        } => {
            writeln!(w, "conditional ({span}{info})")?;
            print_expr(w, idents, i + 1, condition)?;
            print_expr(w, idents, i + 1, then_arm)?;
            print_expr(w, idents, i + 1, else_arm)?;
        }
        ExprKind::Sample { image, x, y, color } => {
            let (image, color) = (idents.get(image), idents.get(color));
            writeln!(w, "sample {image}.{color} ({span}{info})")?;
            print_expr(w, idents, i + 1, x)?;
            print_expr(w, idents, i + 1, y)?;
        }
        ExprKind::Attribute { image, attribute } => {
            let (image, attribute) = (idents.get(image), attribute.keyword());
            writeln!(w, "attribute {image}.{attribute} ({span}{info})")?;
        }
        ExprKind::Pixel(pixel) => {
            print_pixel(w, idents, i, pixel, info)?;
        }
        ExprKind::Paren(inner_expr) => {
            writeln!(w, "paren ({span}{info})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Id(ident) => {
            writeln!(w, "ident {} ({span}{info})", idents.get(ident))?;
        }
        ExprKind::Int(val) => {
            writeln!(w, "int {val} ({span}{info})")?;
        }
        ExprKind::Bool(val) => {
            writeln!(w, "bool {val} ({span}{info})")?;
        }
        ExprKind::Predefined(predefined) => {
            writeln!(w, "predefined {} ({span}{info})", predefined.keyword())?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub trait InfoWriter: Info<Expr: InfoDisplay, Target: InfoDisplay> {}

impl<I> InfoWriter for I
where
    I: Info,
    I::Expr: InfoDisplay,
    I::Target: InfoDisplay,
{
}

/// Renders the information a pass attached to a node, if any.
pub trait InfoDisplay {
    fn write_info(&self) -> impl std::fmt::Display + '_;
}

impl InfoDisplay for () {
    fn write_info(&self) -> impl std::fmt::Display + '_ {
        ""
    }
}

impl InfoDisplay for Option<Type> {
    fn write_info(&self) -> impl std::fmt::Display + '_ {
        struct TypeWriter(Option<Type>);

        impl std::fmt::Display for TypeWriter {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.0 {
                    Some(ty) => write!(f, " %: {ty}"),
                    None => write!(f, " %: ?"),
                }
            }
        }

        TypeWriter(*self)
    }
}

impl InfoDisplay for PixelTarget {
    fn write_info(&self) -> impl std::fmt::Display + '_ {
        match self {
            PixelTarget::Pixel => " -> pixel",
            PixelTarget::Image => " -> broadcast",
        }
    }
}
