use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "A standalone C preprocessor")]
pub struct Cli {
    pub input: PathBuf,

    #[arg(short = 'E', long = "preprocess-only", help = "Emit preprocessed source text instead of a token dump")]
    pub preprocess_only: bool,

    #[arg(short, long, help = "Write output to FILE instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(short = 'D', value_name = "NAME[=VALUE]", help = "Define a macro before the first line is read")]
    pub defines: Vec<String>,
}

impl Cli {
    /// Splits each `-D` argument into a builtin-macro name/value pair the
    /// way the core's `define_builtin` expects: `NAME=VALUE` or bare `NAME`
    /// (which defines to `1`, matching every other C preprocessor's `-D`).
    pub fn parsed_defines(&self) -> Vec<(String, Option<String>)> {
        self.defines
            .iter()
            .map(|raw| match raw.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (raw.clone(), None),
            })
            .collect()
    }
}
