mod args;

use args::Cli;
use bumpalo::Bump;
use clap::Parser;
use cprep_core::error::PrepResult;
use cprep_core::interner::Interner;
use cprep_core::line_source::FileLineSource;
use cprep_core::token::TokenKind;
use cprep_core::Preprocessor;
use std::fs::File;
use std::io::{self, BufWriter, Write};

fn main() {
    let args = Cli::parse();
    run(&args);
}

fn run(args: &Cli) {
    let bump = Bump::new();
    let mut interner = Interner::new(&bump);

    let source = FileLineSource::open(&args.input).unwrap_or_else(|e| {
        eprintln!("cprep: cannot open \"{}\": {e}", args.input.display());
        std::process::exit(1);
    });

    let mut pp = Preprocessor::new(Box::new(source), args.input.clone(), &mut interner);
    for (name, value) in args.parsed_defines() {
        pp.define_builtin(&name, value.as_deref());
    }

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).unwrap_or_else(|e| {
            eprintln!("cprep: cannot create \"{}\": {e}", path.display());
            std::process::exit(1);
        }))),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let result = if args.preprocess_only {
        pp.preprocess(&mut output)
    } else {
        dump_tokens(&mut pp, &mut output)
    };

    output.flush().ok();
    if let Err(e) = result {
        let line = pp.current_line();
        pp.diagnostics().report(&e, line);
    }
}

/// Without `-E`, emit one token per line as `kind:text` for inspection by
/// whatever downstream parser this core is wired into; not a stable
/// machine-readable format, just a debugging aid.
fn dump_tokens(pp: &mut Preprocessor<'_, '_>, output: &mut dyn Write) -> PrepResult<()> {
    loop {
        let tok = pp.next()?;
        if tok.kind == TokenKind::End {
            break;
        }
        writeln!(output, "{:?}:{}", tok.kind, pp.interner().raw(tok.text)).ok();
    }
    Ok(())
}
