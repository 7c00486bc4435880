use std::fmt::Write;

use tracing::{debug, info, info_span};

use crate::{
    codegen::{self, emit::Emitter},
    lexer, parser,
    token::{Span, Spanned},
    type_checker::{Checker, Diagnostics},
    util::{
        fmt::{
            source::{Location, Snippet},
            Context, Show,
        },
        intern::Interner,
    },
};

/// A successfully generated program.
#[derive(Debug)]
pub struct Compiled<O> {
    /// The program name, which also names the generated artifact.
    pub name: String,
    pub output: O,
}

/// Runs every stage over the source, in order, stopping at the first stage
/// that fails.
pub fn compile<E>(
    src: &str,
    source_name: &str,
    ident_interner: &mut Interner,
    emitter: E,
) -> Result<Compiled<E::Output>, CompileError>
where
    E: Emitter,
{
    let _span = info_span!("compile", source = source_name).entered();

    let lexed = lexer::lex_in_new(src).map_err(CompileError::Lex)?;

    let program =
        parser::parse_program(src, &lexed.tokens, ident_interner).map_err(CompileError::Syntax)?;
    debug!(stmts = program.stmts.len(), "parsed");

    let checked = Checker::with_capacity(program.decs.len()).check(program);
    if !checked.diagnostics.is_correct() {
        return Err(CompileError::Type(checked.diagnostics));
    }

    let name = ident_interner.get(checked.program.name).to_owned();
    let output = codegen::generate(
        emitter,
        ident_interner,
        &checked.symbols,
        src,
        source_name,
        &checked.program,
    )
    .map_err(CompileError::Codegen)?;

    info!(program = %name, "compiled");
    Ok(Compiled { name, output })
}

#[derive(Debug)]
pub enum CompileError {
    Lex(Spanned<lexer::Error>),
    Syntax(Spanned<parser::Error>),
    Type(Diagnostics),
    Codegen(codegen::Error),
}

impl CompileError {
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lexer",
            CompileError::Syntax(_) => "parser",
            CompileError::Type(_) => "type checker",
            CompileError::Codegen(_) => "code generator",
        }
    }

    /// Renders a human message, locating the failure in the source.
    pub fn render(&self, src: &str, ident_interner: &Interner) -> String {
        let ctx = Context { ident_interner };
        let mut out = String::with_capacity(128);
        // Writing into a `String` does not fail.
        match self {
            CompileError::Lex(error) => {
                _ = Self::located(&mut out, src, error.span, error.display(&ctx));
            }
            CompileError::Syntax(error) => {
                _ = Self::located(&mut out, src, error.span, error.display(&ctx));
            }
            CompileError::Type(diagnostics) => out.push_str(&diagnostics.log(src, ident_interner)),
            CompileError::Codegen(error) => match error.span() {
                Some(span) => _ = Self::located(&mut out, src, span, error),
                None => _ = writeln!(out, "{error}"),
            },
        }
        format!("{} failed:\n{out}", self.stage())
    }

    fn located(
        out: &mut String,
        src: &str,
        span: Span,
        message: impl std::fmt::Display,
    ) -> std::fmt::Result {
        let location = Location::of(src, span);
        writeln!(out, "{location} (offset {}): {message}", span.lo)?;
        writeln!(out, "{}", Snippet::new(src, span))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codegen::listing::Listing;

    fn failure(src: &str) -> String {
        let mut interner = Interner::with_capacity(16);
        match compile(src, "p.plp", &mut interner, Listing::new()) {
            Ok(compiled) => panic!("{} compiled", compiled.name),
            Err(error) => error.render(src, &interner),
        }
    }

    #[test]
    fn names_the_artifact_after_the_program() {
        let mut interner = Interner::with_capacity(16);
        let compiled = compile("bounce { }", "b.plp", &mut interner, Listing::new()).unwrap();
        assert_eq!(compiled.name, "bounce");
        assert_eq!(compiled.output.source_file, "b.plp");
    }

    #[test]
    fn renders_lexical_errors() {
        assert_eq!(
            failure("p {\n  int a;\n  a = 1 # 2;\n}"),
            indoc! {"
                lexer failed:
                3:9 (offset 21): illegal character '#'
                  a = 1 # 2;
                        ^
            "}
        );
    }

    #[test]
    fn renders_syntax_errors() {
        assert_eq!(
            failure("p {\n  pause ;\n}"),
            indoc! {"
                parser failed:
                2:9 (offset 12): unexpected token Semicolon in expression
                  pause ;
                        ^
            "}
        );
    }

    #[test]
    fn renders_every_type_error() {
        assert_eq!(
            failure("p {\n  int a;\n  a = true;\n  b = 1;\n}"),
            indoc! {"
                type checker failed:
                line 3: AssignExprStmt: type boolean is not assignable to int
                line 4: AssignExprStmt: b is not declared
            "}
        );
    }

    /// Counts the events carrying a `tokens` field.
    struct LexEvents(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl tracing::Subscriber for LexEvents {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            if event.metadata().fields().field("tokens").is_some() {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn logs_the_token_counts_once() {
        let count = std::sync::Arc::default();
        let subscriber = LexEvents(std::sync::Arc::clone(&count));
        tracing::subscriber::with_default(subscriber, || {
            let mut interner = Interner::with_capacity(16);
            compile("p { int a; }", "p.plp", &mut interner, Listing::new()).unwrap();
        });
        assert_eq!(count.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
