use std::fmt;

use tracing::{debug, info_span};

use crate::{
    ast::{
        BinaryOperator, Dec, Expr, ExprKind, Ident, PixelExpr, Predefined, Program, Stmt,
        StmtKind, Typed, UnaryOperator, Untyped,
    },
    token::{Span, Spanned},
    types::{DeclType, PixelTarget, SymbolTable, Type},
    util::{
        fmt::{Context, Show},
        intern::{Interned, Interner},
    },
};

/// The output of a type checking pass. The program is only acceptable for
/// code generation if [`Diagnostics::is_correct`] holds.
#[derive(Debug)]
pub struct Checked {
    pub program: Program<Typed>,
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
}

pub struct Checker {
    symbols: SymbolTable,
    program_name: Option<Interned>,
    errors: Vec<Spanned<Error>>,
}

impl Checker {
    pub fn with_capacity(capacity: usize) -> Checker {
        Checker {
            symbols: SymbolTable::with_capacity(capacity),
            program_name: None,
            errors: Vec::with_capacity(8),
        }
    }

    /// Checks the whole program in a single pass, producing its typed tree.
    /// Violations are accumulated; they never stop the pass.
    pub fn check(mut self, program: Program<Untyped>) -> Checked {
        let _span = info_span!("type_check", decs = program.decs.len()).entered();
        self.program_name = Some(program.name.name);

        for dec in &program.decs {
            self.declare(*dec);
        }
        let stmts = self.check_stmts(program.stmts);

        debug!(errors = self.errors.len(), "checked program");
        Checked {
            program: Program {
                name: program.name,
                decs: program.decs,
                stmts,
            },
            symbols: self.symbols,
            diagnostics: Diagnostics {
                errors: self.errors,
            },
        }
    }

    /// Checks a free-standing expression against the current symbol table.
    pub fn check_expr(mut self, expr: Expr<Untyped>) -> (Expr<Typed>, Diagnostics) {
        let expr = self.expr(expr);
        let diagnostics = Diagnostics {
            errors: self.errors,
        };
        (expr, diagnostics)
    }

    fn declare(&mut self, dec: Dec) {
        if self.program_name == Some(dec.name.name) {
            let error = ErrorKind::ShadowsProgramName(dec.name.name);
            self.report(Node::Dec, dec.name.span, error);
            return;
        }
        if let Err(previous) = self.symbols.declare(dec) {
            let error = ErrorKind::Redeclared {
                name: dec.name.name,
                previous: previous.span,
            };
            self.report(Node::Dec, dec.name.span, error);
        }
    }

    fn check_stmts(&mut self, stmts: Vec<Stmt<Untyped>>) -> Vec<Stmt<Typed>> {
        stmts.into_iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: Stmt<Untyped>) -> Stmt<Typed> {
        let kind = match stmt.kind {
            StmtKind::Alternative {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.expr(condition);
                self.expect(Node::AlternativeStmt, &condition, Expected::Boolean);
                StmtKind::Alternative {
                    condition,
                    then_body: self.check_stmts(then_body),
                    else_body: self.check_stmts(else_body),
                }
            }
            StmtKind::Iteration { condition, body } => {
                let condition = self.expr(condition);
                self.expect(Node::IterationStmt, &condition, Expected::Boolean);
                StmtKind::Iteration {
                    condition,
                    body: self.check_stmts(body),
                }
            }
            StmtKind::Pause(expr) => {
                let expr = self.expr(expr);
                self.expect(Node::PauseStmt, &expr, Expected::Integer);
                StmtKind::Pause(expr)
            }
            StmtKind::AssignPixel {
                target,
                pixel,
                info: (),
            } => {
                let info = match self.lookup(Node::AssignPixelStmt, target) {
                    Some(DeclType::Image) => PixelTarget::Image,
                    Some(DeclType::Pixel) | None => PixelTarget::Pixel,
                    Some(other) => {
                        let error = ErrorKind::Mismatch {
                            expected: Expected::PixelOrImage,
                            actual: other.into(),
                        };
                        self.report(Node::AssignPixelStmt, target.span, error);
                        PixelTarget::Pixel
                    }
                };
                StmtKind::AssignPixel {
                    target,
                    pixel: self.pixel(pixel),
                    info,
                }
            }
            StmtKind::SinglePixel {
                target,
                x,
                y,
                pixel,
            } => {
                const NODE: Node = Node::SinglePixelAssignmentStmt;
                self.expect_image(NODE, target);
                let (x, y) = self.integer_pair(NODE, x, y);
                StmtKind::SinglePixel {
                    target,
                    x,
                    y,
                    pixel: self.pixel(pixel),
                }
            }
            StmtKind::SingleSample {
                target,
                x,
                y,
                color,
                value,
            } => {
                const NODE: Node = Node::SingleSampleAssignmentStmt;
                self.expect_image(NODE, target);
                let (x, y) = self.integer_pair(NODE, x, y);
                let value = self.expr(value);
                self.expect(NODE, &value, Expected::Integer);
                StmtKind::SingleSample {
                    target,
                    x,
                    y,
                    color,
                    value,
                }
            }
            StmtKind::ScreenLocation { target, x, y } => {
                const NODE: Node = Node::ScreenLocationAssignmentStmt;
                self.expect_image(NODE, target);
                let (x, y) = self.integer_pair(NODE, x, y);
                StmtKind::ScreenLocation { target, x, y }
            }
            StmtKind::Shape {
                target,
                width,
                height,
            } => {
                const NODE: Node = Node::ShapeAssignmentStmt;
                self.expect_image(NODE, target);
                let (width, height) = self.integer_pair(NODE, width, height);
                StmtKind::Shape {
                    target,
                    width,
                    height,
                }
            }
            StmtKind::Visibility { target, value } => {
                const NODE: Node = Node::SetVisibleAssignmentStmt;
                self.expect_image(NODE, target);
                let value = self.expr(value);
                self.expect(NODE, &value, Expected::Boolean);
                StmtKind::Visibility { target, value }
            }
            StmtKind::FileLoad { target, file } => {
                self.expect_image(Node::FileAssignStmt, target);
                StmtKind::FileLoad { target, file }
            }
            StmtKind::AssignExpr { target, value } => {
                let declared = self.lookup(Node::AssignExprStmt, target);
                let value = self.expr(value);
                if let (Some(declared), Some(actual)) = (declared, value.info) {
                    if !Type::from(declared).compatible(actual) {
                        let error = ErrorKind::Unassignable { declared, actual };
                        self.report(Node::AssignExprStmt, value.span, error);
                    }
                }
                StmtKind::AssignExpr { target, value }
            }
        };
        Stmt {
            kind,
            span: stmt.span,
        }
    }

    fn pixel(&mut self, pixel: PixelExpr<Untyped>) -> PixelExpr<Typed> {
        let component = |this: &mut Self, expr: Box<Expr<Untyped>>| {
            let expr = this.expr(*expr);
            this.expect(Node::Pixel, &expr, Expected::Integer);
            Box::new(expr)
        };
        PixelExpr {
            red: component(self, pixel.red),
            green: component(self, pixel.green),
            blue: component(self, pixel.blue),
            span: pixel.span,
        }
    }

    fn integer_pair(
        &mut self,
        node: Node,
        a: Expr<Untyped>,
        b: Expr<Untyped>,
    ) -> (Expr<Typed>, Expr<Typed>) {
        let a = self.expr(a);
        self.expect(node, &a, Expected::Integer);
        let b = self.expr(b);
        self.expect(node, &b, Expected::Integer);
        (a, b)
    }

    fn expr(&mut self, expr: Expr<Untyped>) -> Expr<Typed> {
        let span = expr.span;
        let (kind, ty) = match expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.expr(*lhs);
                let rhs = self.expr(*rhs);
                let ty = self.binary(op, span, lhs.info, rhs.info);
                let binary = ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (binary, Some(ty))
            }
            ExprKind::Unary { op, expr } => {
                let expr = self.expr(*expr);
                let ty = match op {
                    UnaryOperator::Not => {
                        self.expect(Node::UnaryExpr, &expr, Expected::Boolean);
                        Type::Boolean
                    }
                    UnaryOperator::Neg => {
                        self.expect(Node::UnaryExpr, &expr, Expected::Integer);
                        Type::Int
                    }
                };
                let unary = ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                };
                (unary, Some(ty))
            }
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                let condition = self.expr(*condition);
                self.expect(Node::ConditionalExpr, &condition, Expected::Boolean);
                let then_arm = self.expr(*then_arm);
                let else_arm = self.expr(*else_arm);
                if let (Some(then_ty), Some(else_ty)) = (then_arm.info, else_arm.info) {
                    if !then_ty.compatible(else_ty) {
                        let error = ErrorKind::ArmsMismatch { then_ty, else_ty };
                        self.report(Node::ConditionalExpr, span, error);
                    }
                }
                let ty = then_arm.info.or(else_arm.info);
                let cond = ExprKind::Conditional {
                    condition: Box::new(condition),
                    then_arm: Box::new(then_arm),
                    else_arm: Box::new(else_arm),
                };
                (cond, ty)
            }
            ExprKind::Sample { image, x, y, color } => {
                self.expect_image(Node::SampleExpr, image);
                let (x, y) = self.integer_pair(Node::SampleExpr, *x, *y);
                let sample = ExprKind::Sample {
                    image,
                    x: Box::new(x),
                    y: Box::new(y),
                    color,
                };
                (sample, Some(Type::Int))
            }
            ExprKind::Attribute { image, attribute } => {
                self.expect_image(Node::ImageAttributeExpr, image);
                (ExprKind::Attribute { image, attribute }, Some(Type::Int))
            }
            ExprKind::Pixel(pixel) => (ExprKind::Pixel(self.pixel(pixel)), Some(Type::Pixel)),
            ExprKind::Paren(inner) => {
                let inner = self.expr(*inner);
                let ty = inner.info;
                (ExprKind::Paren(Box::new(inner)), ty)
            }
            ExprKind::Id(ident) => {
                let ty = self.lookup(Node::IdentExpr, ident).map(Type::from);
                (ExprKind::Id(ident), ty)
            }
            ExprKind::Int(v) => (ExprKind::Int(v), Some(Type::Int)),
            ExprKind::Bool(v) => (ExprKind::Bool(v), Some(Type::Boolean)),
            ExprKind::Predefined(predefined) => {
                let ty = match predefined {
                    Predefined::X => Type::X,
                    Predefined::Y => Type::Y,
                    Predefined::Z => Type::Int,
                    Predefined::ScreenSize => Type::ScreenSize,
                };
                (ExprKind::Predefined(predefined), Some(ty))
            }
        };
        Expr {
            kind,
            span,
            info: ty,
        }
    }

    /// Validates the operands of a binary operator and returns its result
    /// type. Unresolved operands are not reported again.
    fn binary(
        &mut self,
        op: BinaryOperator,
        span: Span,
        lhs: Option<Type>,
        rhs: Option<Type>,
    ) -> Type {
        let operands = [lhs, rhs];
        let mut known = operands.iter().flatten();

        if op.is_equality() {
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                if !lhs.compatible(rhs) {
                    let error = ErrorKind::Incomparable { op, lhs, rhs };
                    self.report(Node::BinaryExpr, span, error);
                }
            }
            return Type::Boolean;
        }

        let (expected, result) = if op.is_logical() {
            (Expected::Boolean, Type::Boolean)
        } else if op.is_relational() {
            (Expected::Integer, Type::Boolean)
        } else {
            (Expected::Integer, Type::Int)
        };
        if !known.all(|ty| expected.accepts(*ty)) {
            let error = ErrorKind::Operands { op, expected };
            self.report(Node::BinaryExpr, span, error);
        }
        result
    }

    /// Resolves a name, reporting it if undeclared.
    fn lookup(&mut self, node: Node, ident: Ident) -> Option<DeclType> {
        let found = self.symbols.get(ident).map(|dec| dec.ty);
        if found.is_none() {
            self.report(node, ident.span, ErrorKind::Undeclared(ident.name));
        }
        found
    }

    fn expect_image(&mut self, node: Node, ident: Ident) {
        match self.lookup(node, ident) {
            Some(DeclType::Image) | None => (),
            Some(other) => {
                let error = ErrorKind::Mismatch {
                    expected: Expected::Image,
                    actual: other.into(),
                };
                self.report(node, ident.span, error);
            }
        }
    }

    fn expect(&mut self, node: Node, expr: &Expr<Typed>, expected: Expected) {
        if let Some(actual) = expr.info {
            if !expected.accepts(actual) {
                let error = ErrorKind::Mismatch { expected, actual };
                self.report(node, expr.span, error);
            }
        }
    }

    fn report(&mut self, node: Node, span: Span, kind: ErrorKind) {
        self.errors.push(span.wrap(Error { node, kind }));
    }
}

/// Every type violation found in a program, in discovery order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Spanned<Error>>,
}

impl Diagnostics {
    pub fn is_correct(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Spanned<Error>] {
        &self.errors
    }

    /// Renders one line per violation, `line N: Node: message`.
    pub fn log(&self, src: &str, ident_interner: &Interner) -> String {
        use std::fmt::Write;

        let ctx = Context { ident_interner };
        let mut log = String::with_capacity(64 * self.errors.len());
        for error in &self.errors {
            let line = error.span.line(src);
            // Writing into a `String` does not fail.
            _ = writeln!(log, "line {line}: {}", error.display(&ctx));
        }
        log
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub node: Node,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Redeclared { name: Interned, previous: Span },
    ShadowsProgramName(Interned),
    Undeclared(Interned),
    Mismatch { expected: Expected, actual: Type },
    Unassignable { declared: DeclType, actual: Type },
    Operands { op: BinaryOperator, expected: Expected },
    Incomparable {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    ArmsMismatch { then_ty: Type, else_ty: Type },
}

/// The kind of tree node a violation was found in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Dec,
    AlternativeStmt,
    IterationStmt,
    PauseStmt,
    Pixel,
    AssignPixelStmt,
    SinglePixelAssignmentStmt,
    SingleSampleAssignmentStmt,
    ScreenLocationAssignmentStmt,
    ShapeAssignmentStmt,
    SetVisibleAssignmentStmt,
    FileAssignStmt,
    AssignExprStmt,
    ConditionalExpr,
    BinaryExpr,
    UnaryExpr,
    SampleExpr,
    ImageAttributeExpr,
    IdentExpr,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a context requires of a type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Boolean,
    Integer,
    Image,
    PixelOrImage,
}

impl Expected {
    pub fn accepts(self, ty: Type) -> bool {
        match self {
            Expected::Boolean => ty == Type::Boolean,
            Expected::Integer => ty.is_integer(),
            Expected::Image => ty == Type::Image,
            Expected::PixelOrImage => matches!(ty, Type::Pixel | Type::Image),
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Expected::Boolean => "boolean",
            Expected::Integer => "an integer",
            Expected::Image => "image",
            Expected::PixelOrImage => "pixel or image",
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{lexer, parser, util::test_utils::tree_tests};

    use super::*;

    fn check(src: &str) -> (Checked, Interner) {
        let lexed = lexer::lex_in_new(src).expect("must lex");
        let mut interner = Interner::with_capacity(16);
        let program = parser::parse_program(src, &lexed.tokens, &mut interner).expect("must parse");
        (Checker::with_capacity(16).check(program), interner)
    }

    #[test]
    fn correct_program_has_empty_log() {
        let src = "p {
            int a; boolean b; pixel c; image d;
            a = 1 + 2; b = a < SCREEN_SIZE; c = {a, x, Z};
            d = {1, 2, 3}; d.visible = b | !b;
            d.location = [d.x_loc, d.y_loc + 1]; d.shape = [d.width, d.height];
            d[x, y].red = d[y, x].green; d = \"a.png\";
            if (b) { pause a; } else { while (x == y) { a = -a; } }
        }";
        let (checked, interner) = check(src);
        assert!(checked.diagnostics.is_correct());
        assert_eq!(checked.diagnostics.log(src, &interner), "");
        assert_eq!(checked.symbols.len(), 4);
    }

    #[test]
    fn plain_assignment_uses_integer_class() {
        let (checked, _) = check("p { int a; a = SCREEN_SIZE; a = x * y; }");
        assert!(checked.diagnostics.is_correct());

        let (checked, _) = check("p { boolean b; b = 1 + 2; }");
        let errors = checked.diagnostics.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].inner.node, Node::AssignExprStmt);
        assert_eq!(
            errors[0].inner.kind,
            ErrorKind::Unassignable {
                declared: DeclType::Boolean,
                actual: Type::Int
            }
        );
    }

    #[test]
    fn pixel_target_selects_the_generated_form() {
        let (checked, _) = check("p { pixel q; image r; q = {1, 2, 3}; r = {1, 2, 3}; }");
        assert!(checked.diagnostics.is_correct());
        let targets: Vec<_> = checked
            .program
            .stmts
            .iter()
            .map(|stmt| match stmt.kind {
                StmtKind::AssignPixel { info, .. } => info,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(targets, [PixelTarget::Pixel, PixelTarget::Image]);
    }

    #[test]
    fn broadcast_keeps_previous_errors() {
        let src = "p {
            image r; int a;
            a = true;
            r = {1, 2, 3};
        }";
        let (checked, interner) = check(src);
        assert_eq!(
            checked.diagnostics.log(src, &interner),
            "line 3: AssignExprStmt: type boolean is not assignable to int\n"
        );
    }

    #[test]
    fn log_has_one_line_per_error() {
        let src = "p {\nint p;\nint a;\nboolean a;\nb = 1;\n}";
        let (checked, interner) = check(src);
        assert!(!checked.diagnostics.is_correct());
        assert_eq!(
            checked.diagnostics.log(src, &interner),
            "line 2: Dec: p is the name of the program\n\
             line 4: Dec: a is already declared at 11..17\n\
             line 5: AssignExprStmt: b is not declared\n"
        );
    }

    tree_tests!(
        use checker;

        fn test_expression_types() {
            let expr = "1 + x << 2 == SCREEN_SIZE";
            let tree_ok = "
                binary Eq (0..25 %: boolean)
                  binary Shl (0..10 %: int)
                    binary Add (0..5 %: int)
                      int 1 (0..1 %: int)
                      predefined x (4..5 %: x)
                    int 2 (9..10 %: int)
                  predefined SCREEN_SIZE (14..25 %: SCREEN_SIZE)
            ";
        }

        fn test_conditional_takes_then_arm_type() {
            let expr = "1 < 2 ? y : 3";
            let tree_ok = "
                conditional (0..13 %: y)
                  binary Less (0..5 %: boolean)
                    int 1 (0..1 %: int)
                    int 2 (4..5 %: int)
                  predefined y (8..9 %: y)
                  int 3 (12..13 %: int)
            ";
        }

        fn test_pixel_expression_type() {
            let expr = "{Z, 0, -1}";
            let tree_ok = "
                pixel (0..10 %: pixel)
                  predefined Z (1..2 %: int)
                  int 0 (4..5 %: int)
                  unary Neg (7..9 %: int)
                    int 1 (8..9 %: int)
            ";
        }

        fn test_typed_program() {
            let program = "p { image i; pixel q; i = q; q = {1, 2, 3}; i = {0, 0, 0}; }";
            let tree_error = "
                program p
                  dec image i (4..12)
                  dec pixel q (13..21)
                  assign i (22..28)
                    ident q (26..27 %: pixel)
                  assign pixel q -> pixel (29..43)
                    pixel (33..42)
                      int 1 (34..35 %: int)
                      int 2 (37..38 %: int)
                      int 3 (40..41 %: int)
                  assign pixel i -> broadcast (44..58)
                    pixel (48..57)
                      int 0 (49..50 %: int)
                      int 0 (52..53 %: int)
                      int 0 (55..56 %: int)
            ";
            let expected_errors = &[
                "26..27: AssignExprStmt: type pixel is not assignable to image",
            ];
        }

        fn test_logical_operands() {
            let expr = "true & 1";
            let expected_errors = &["0..8: BinaryExpr: operator & expects boolean operands"];
        }

        fn test_arithmetic_operands() {
            let expr = "1 + true";
            let expected_errors = &["0..8: BinaryExpr: operator + expects integer operands"];
        }

        fn test_equality_operands() {
            let expr = "1 == false";
            let expected_errors = &["0..10: BinaryExpr: operator == can not compare int and boolean"];
        }

        fn test_equality_of_integer_class() {
            let expr = "x == SCREEN_SIZE";
            let expected_errors = &[];
        }

        fn test_conditional_errors() {
            let expr = "1 ? true : 2";
            let expected_errors = &[
                "0..1: ConditionalExpr: expected boolean, but got int",
                "0..12: ConditionalExpr: conditional arms have types boolean and int",
            ];
        }

        fn test_unary_errors() {
            let expr = "!1 & -true > 0";
            let expected_errors = &[
                "1..2: UnaryExpr: expected boolean, but got int",
                "6..10: UnaryExpr: expected an integer, but got boolean",
            ];
        }

        fn test_undeclared_is_reported_once() {
            let expr = "a + 1 < 2";
            let expected_errors = &["0..1: IdentExpr: a is not declared"];
        }

        fn test_statement_errors() {
            let program = "p {
int a; boolean b; pixel c;
if (a) { pause b; }
while (1) { }
a = {1, true, 3};
c.visible = 1;
a = \"f\";
b = c[1, 2].red;
b = a.width;
}";
            let expected_errors = &[
                "35..36: AlternativeStmt: expected boolean, but got int",
                "46..47: PauseStmt: expected an integer, but got boolean",
                "58..59: IterationStmt: expected boolean, but got int",
                "65..66: AssignPixelStmt: expected pixel or image, but got int",
                "73..77: Pixel: expected an integer, but got boolean",
                "83..84: SetVisibleAssignmentStmt: expected image, but got pixel",
                "95..96: SetVisibleAssignmentStmt: expected boolean, but got int",
                "98..99: FileAssignStmt: expected image, but got int",
                "111..112: SampleExpr: expected image, but got pixel",
                "111..122: AssignExprStmt: type int is not assignable to boolean",
                "128..129: ImageAttributeExpr: expected image, but got int",
                "128..135: AssignExprStmt: type int is not assignable to boolean",
            ];
        }
    );
}
