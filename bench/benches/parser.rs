use criterion::{criterion_group, criterion_main, Criterion};
use plp::{lexer, parser::parse_program, util::intern::Interner};
use std::hint::black_box;

/// A program whose body repeats a block of statements.
fn input(repeat: usize) -> String {
    let block = "
        if (a < b | !(c == a)) { a = a + 1; } else { b = b * 2 - a % 3; }
        i[a, b] = {a << 1, b >> 1, Z};
        i.pixels[x_of, y_of].red = i[a, b].green / 2;
        while (a > 0) { a = a - 1; pause a ? 1 : 2; }
    ";
    format!(
        "big {{ int a; int b; int c; int x_of; int y_of; image i; {} }}",
        block.repeat(repeat)
    )
}

fn criterion_benchmark(c: &mut Criterion) {
    let input = input(256);
    let lexed = lexer::lex_in_new(&input).unwrap();

    c.bench_function("parser", |b| {
        b.iter(|| {
            let mut interner = Interner::with_capacity(16);
            let program = parse_program(black_box(&input), &lexed.tokens, &mut interner);
            _ = black_box(program);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
