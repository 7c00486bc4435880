use crate::{
    lexer, parser,
    token::Spanned,
    type_checker::Checker,
    util::{
        self,
        fmt::{tree, Show},
        intern::Interner,
    },
};

pub fn format_errors<E>(i: &Interner, e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: Show,
{
    let ctx = util::fmt::Context { ident_interner: i };
    e.iter().map(|e| format!("{:#}", e.display(&ctx))).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CheckerProgram(&'static str),
    CheckerExpr(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the stages the test needs. Syntax errors yield an empty tree and a
/// single formatted error.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let interner = &mut Interner::with_capacity(128);

    let input = match test {
        Test::ParserProgram(input)
        | Test::ParserExpr(input)
        | Test::CheckerProgram(input)
        | Test::CheckerExpr(input) => input,
    };
    let lexed = match lexer::lex_in_new(input) {
        Ok(lexed) => lexed,
        Err(error) => return (String::new(), format_errors(interner, &[error])),
    };
    let tokens = &lexed.tokens;

    match test {
        Test::ParserProgram(input) => match parser::parse_program(input, tokens, interner) {
            Ok(prog) => (tree::print_program_string(interner, &prog), vec![]),
            Err(error) => (String::new(), format_errors(interner, &[error])),
        },
        Test::ParserExpr(input) => match parser::parse_expr(input, tokens, interner) {
            Ok(expr) => (tree::print_expr_string(interner, &expr), vec![]),
            Err(error) => (String::new(), format_errors(interner, &[error])),
        },
        Test::CheckerProgram(input) => {
            let prog = match parser::parse_program(input, tokens, interner) {
                Ok(prog) => prog,
                Err(error) => return (String::new(), format_errors(interner, &[error])),
            };
            let checked = Checker::with_capacity(128).check(prog);
            let tree = tree::print_program_string(interner, &checked.program);
            let errors = format_errors(interner, checked.diagnostics.errors());
            (tree, errors)
        }
        Test::CheckerExpr(input) => {
            let expr = match parser::parse_expr(input, tokens, interner) {
                Ok(expr) => expr,
                Err(error) => return (String::new(), format_errors(interner, &[error])),
            };
            let (expr, diagnostics) = Checker::with_capacity(128).check_expr(expr);
            let tree = tree::print_expr_string(interner, &expr);
            let errors = format_errors(interner, diagnostics.errors());
            (tree, errors)
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerProgram($source)
    };
    (@@get_test(checker, expr), $source:expr) => {
        crate::util::test_utils::Test::CheckerExpr($source)
    };
}
pub(crate) use tree_tests;
