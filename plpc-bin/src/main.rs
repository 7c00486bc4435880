use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::Parser;
use plp::util::intern::Interner;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::emit::Emit;

mod emit;

/// Compiles PLP image manipulation programs.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The program source file.
    input: PathBuf,

    /// The directory that receives `<program name>.<extension>`.
    #[arg(short = 'o', long = "out-dir", value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Emit::Class)]
    emit: Emit,

    /// Logs pipeline progress; repeat for more detail. Without it, `RUST_LOG`
    /// is honored.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("plp=debug,plpc=debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Pipeline failures are reported here and map to exit code 1; I/O failures
/// are returned.
fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let src = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read `{}`", args.input.display()))?;
    let source_name = args.input.file_name().map_or_else(
        || args.input.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    debug!(source = %source_name, bytes = src.len(), "read input");

    let mut interner = Interner::with_capacity(64);
    let (name, artifact) = match args.emit.compile(&src, &source_name, &mut interner) {
        Ok(compiled) => compiled,
        Err(error) => {
            eprint!("{}", error.render(&src, &interner));
            return Ok(ExitCode::from(1));
        }
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create `{}`", args.out_dir.display()))?;
    let path = args.out_dir.join(format!("{name}.{}", args.emit.extension()));
    fs::write(&path, artifact)
        .with_context(|| format!("failed to write `{}`", path.display()))?;

    info!(path = %path.display(), emit = %args.emit, "wrote artifact");
    Ok(ExitCode::SUCCESS)
}
