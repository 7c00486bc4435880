//! Prints trees back as source text that parses into the same tree.

use std::fmt::{self, Formatter};

use crate::{
    ast::*,
    util::{
        fmt::{Context, Show},
        intern::Interner,
    },
};

const INDENT: &str = "  ";

pub fn print_source_string<I: Info>(idents: &Interner, program: &Program<I>) -> String {
    let ctx = Context {
        ident_interner: idents,
    };
    let s = program.display(&ctx).to_string();
    s
}

impl<I: Info> Show for Program<I> {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        let i = ctx.ident_interner;
        writeln!(f, "{} {{", i.get(self.name))?;
        for dec in &self.decs {
            writeln!(f, "{INDENT}{} {};", dec.ty, i.get(dec.name))?;
        }
        write_stmts(f, ctx, 1, &self.stmts)?;
        writeln!(f, "}}")
    }
}

impl<I: Info> Show for Expr<I> {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        write_expr(f, ctx, self)
    }
}

fn indent(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_stmts<I: Info>(
    f: &mut Formatter<'_>,
    ctx: &Context<'_>,
    depth: usize,
    stmts: &[Stmt<I>],
) -> fmt::Result {
    for stmt in stmts {
        indent(f, depth)?;
        write_stmt(f, ctx, depth, stmt)?;
    }
    Ok(())
}

/// Leaves the cursor after the closing brace.
fn write_block<I: Info>(
    f: &mut Formatter<'_>,
    ctx: &Context<'_>,
    depth: usize,
    stmts: &[Stmt<I>],
) -> fmt::Result {
    writeln!(f, "{{")?;
    write_stmts(f, ctx, depth + 1, stmts)?;
    indent(f, depth)?;
    f.write_str("}")
}

fn write_stmt<I: Info>(
    f: &mut Formatter<'_>,
    ctx: &Context<'_>,
    depth: usize,
    stmt: &Stmt<I>,
) -> fmt::Result {
    let i = ctx.ident_interner;
    match &stmt.kind {
        StmtKind::Alternative {
            condition,
            then_body,
            else_body,
        } => {
            write!(f, "if ({}) ", condition.display(ctx))?;
            write_block(f, ctx, depth, then_body)?;
            if !else_body.is_empty() {
                f.write_str(" else ")?;
                write_block(f, ctx, depth, else_body)?;
            }
            return writeln!(f);
        }
        StmtKind::Iteration { condition, body } => {
            write!(f, "while ({}) ", condition.display(ctx))?;
            write_block(f, ctx, depth, body)?;
            return writeln!(f);
        }
        StmtKind::Pause(expr) => write!(f, "pause {}", expr.display(ctx))?,
        StmtKind::AssignPixel { target, pixel, .. } => {
            write!(f, "{} = ", i.get(target))?;
            write_pixel(f, ctx, pixel)?;
        }
        StmtKind::SinglePixel {
            target,
            x,
            y,
            pixel,
        } => {
            let (x, y) = (x.display(ctx), y.display(ctx));
            write!(f, "{}[{x}, {y}] = ", i.get(target))?;
            write_pixel(f, ctx, pixel)?;
        }
        StmtKind::SingleSample {
            target,
            x,
            y,
            color,
            value,
        } => {
            let (x, y, value) = (x.display(ctx), y.display(ctx), value.display(ctx));
            let (target, color) = (i.get(target), i.get(color));
            write!(f, "{target}[{x}, {y}].{color} = {value}")?;
        }
        StmtKind::ScreenLocation { target, x, y } => {
            let (x, y) = (x.display(ctx), y.display(ctx));
            write!(f, "{}.location = [{x}, {y}]", i.get(target))?;
        }
        StmtKind::Shape {
            target,
            width,
            height,
        } => {
            let (width, height) = (width.display(ctx), height.display(ctx));
            write!(f, "{}.shape = [{width}, {height}]", i.get(target))?;
        }
        StmtKind::Visibility { target, value } => {
            write!(f, "{}.visible = {}", i.get(target), value.display(ctx))?;
        }
        StmtKind::FileLoad { target, file } => {
            write!(f, "{} = \"", i.get(target))?;
            for c in file.inner.chars() {
                if matches!(c, '"' | '\\') {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("\"")?;
        }
        StmtKind::AssignExpr { target, value } => {
            write!(f, "{} = {}", i.get(target), value.display(ctx))?;
        }
    }
    writeln!(f, ";")
}

fn write_pixel<I: Info>(
    f: &mut Formatter<'_>,
    ctx: &Context<'_>,
    pixel: &PixelExpr<I>,
) -> fmt::Result {
    let PixelExpr {
        red, green, blue, ..
    } = pixel;
    let (red, green, blue) = (red.display(ctx), green.display(ctx), blue.display(ctx));
    write!(f, "{{{red}, {green}, {blue}}}")
}

/// Parenthesized expressions are kept as nodes, so operands never need
/// additional parentheses.
fn write_expr<I: Info>(f: &mut Formatter<'_>, ctx: &Context<'_>, expr: &Expr<I>) -> fmt::Result {
    let i = ctx.ident_interner;
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            let (lhs, rhs) = (lhs.display(ctx), rhs.display(ctx));
            write!(f, "{lhs} {} {rhs}", op.symbol())
        }
        ExprKind::Unary { op, expr } => write!(f, "{}{}", op.symbol(), expr.display(ctx)),
        ExprKind::Conditional {
            condition,
            then_arm,
            else_arm,
        } => {
            let condition = condition.display(ctx);
            let (then_arm, else_arm) = (then_arm.display(ctx), else_arm.display(ctx));
            write!(f, "{condition} ? {then_arm} : {else_arm}")
        }
        ExprKind::Sample { image, x, y, color } => {
            let (x, y) = (x.display(ctx), y.display(ctx));
            write!(f, "{}[{x}, {y}].{}", i.get(image), i.get(color))
        }
        ExprKind::Attribute { image, attribute } => {
            write!(f, "{}.{}", i.get(image), attribute.keyword())
        }
        ExprKind::Pixel(pixel) => write_pixel(f, ctx, pixel),
        ExprKind::Paren(inner) => write!(f, "({})", inner.display(ctx)),
        ExprKind::Id(ident) => f.write_str(i.get(ident)),
        ExprKind::Int(value) => write!(f, "{value}"),
        ExprKind::Bool(value) => write!(f, "{value}"),
        ExprKind::Predefined(predefined) => f.write_str(predefined.keyword()),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{lexer, parser, util::fmt::tree};

    fn parse(src: &str, interner: &mut Interner) -> Program<Untyped> {
        let lexed = lexer::lex_in_new(src).unwrap();
        parser::parse_program(src, &lexed.tokens, interner).unwrap()
    }

    /// Drops every `lo..hi` span from a printed tree.
    fn without_spans(tree: &str) -> String {
        let mut out = String::with_capacity(tree.len());
        let mut run = String::new();
        for c in tree.chars().chain(Some('\n')) {
            if c.is_ascii_digit() || c == '.' {
                run.push(c);
                continue;
            }
            if !run.contains("..") {
                out.push_str(&run);
            }
            run.clear();
            out.push(c);
        }
        out
    }

    fn assert_round_trip(src: &str) {
        let mut interner = Interner::with_capacity(32);
        let program = parse(src, &mut interner);
        let printed = print_source_string(&interner, &program);

        let reparsed = parse(&printed, &mut interner);
        assert_eq!(
            without_spans(&tree::print_program_string(&interner, &reparsed)),
            without_spans(&tree::print_program_string(&interner, &program)),
        );
        assert_eq!(print_source_string(&interner, &reparsed), printed);
    }

    #[test]
    fn prints_blocks_indented() {
        let src = "p { int a; if (a == 1) { a = 2; } else { pause a; } while (true) { } }";
        let mut interner = Interner::with_capacity(8);
        let program = parse(src, &mut interner);
        assert_eq!(
            print_source_string(&interner, &program),
            indoc! {"
                p {
                  int a;
                  if (a == 1) {
                    a = 2;
                  } else {
                    pause a;
                  }
                  while (true) {
                  }
                }
            "}
        );
    }

    #[test]
    fn every_form_survives_reprinting() {
        assert_round_trip(indoc! {r#"
            p {
              int a;
              boolean b;
              pixel c;
              image d;
              a = -(1 + 2) * 3 - 4 - (5 - 6) % 7 << 1 >> 2;
              b = !b & a < 3 | a >= SCREEN_SIZE == (x != y);
              a = b ? a : b ? 1 : 2;
              a = b ? b ? 1 : 2 : --a;
              c = {Z, d[x, y].green, d.width};
              c = b ? {1, 2, 3} : c;
              d = c;
              d[1, 2] = {3, 4, 5};
              d.pixels[1, 2].blue = 9;
              d.location = [d.x_loc, d.y_loc];
              d.shape = [d.width, d.height];
              d.visible = !b;
              d = "a \"quoted\" \\ file.png";
              if (b) { pause 1; } else { while (a > 0) { a = a - 1; } }
              if (b) { }
            }
        "#});
    }

    #[test]
    fn demos_survive_reprinting() {
        assert_round_trip(include_str!("../../../demos/bounce.plp"));
        assert_round_trip(include_str!("../../../demos/gradient.plp"));
    }
}
