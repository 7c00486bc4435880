use plp::codegen::{classfile::ClassFileEmitter, listing::Listing};

/// The artifact written for a compiled program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum Emit {
    /// A JVM class file.
    #[default]
    Class,
    /// A human-readable instruction listing.
    Listing,
}

impl Emit {
    pub const fn extension(self) -> &'static str {
        match self {
            Emit::Class => "class",
            Emit::Listing => "lst",
        }
    }

    /// Runs the pipeline over the source, producing the artifact bytes.
    pub fn compile(
        self,
        src: &str,
        source_name: &str,
        ident_interner: &mut plp::util::intern::Interner,
    ) -> Result<(String, Vec<u8>), plp::driver::CompileError> {
        match self {
            Emit::Class => {
                let compiled =
                    plp::driver::compile(src, source_name, ident_interner, ClassFileEmitter::new())?;
                Ok((compiled.name, compiled.output))
            }
            Emit::Listing => {
                let compiled =
                    plp::driver::compile(src, source_name, ident_interner, Listing::new())?;
                Ok((compiled.name, compiled.output.to_string().into_bytes()))
            }
        }
    }
}

impl std::fmt::Display for Emit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emit::Class => f.write_str("class"),
            Emit::Listing => f.write_str("listing"),
        }
    }
}
