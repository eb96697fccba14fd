pub mod context;
pub mod directive;
pub mod error;
pub mod expander;
pub mod interner;
pub mod lexer;
pub mod line_assembler;
pub mod line_source;
pub mod lookahead;
pub mod macro_table;
pub mod postprocessor;
pub mod token;

use context::Context;
use error::{Diagnostics, PrepResult};
use interner::Interner;
use line_source::LineSource;
use lookahead::unexpected_token;
use std::io::Write;
use std::path::PathBuf;
use token::{Token, TokenKind};

/// The only public surface the parser talks to: `next`/`peek`/`consume`
/// pull post-processed tokens on demand, `inject_line` feeds synthetic
/// source (command-line `-D` definitions), and `preprocess` drives `-E`
/// text output instead.
pub struct Preprocessor<'i, 'bump> {
    ctx: Context,
    interner: &'i mut Interner<'bump>,
}

impl<'i, 'bump> Preprocessor<'i, 'bump> {
    pub fn new(source: Box<dyn LineSource>, path: PathBuf, interner: &'i mut Interner<'bump>) -> Self {
        Preprocessor { ctx: Context::init_preprocessing(source, path), interner }
    }

    /// Defines a built-in macro the way `-D NAME[=VALUE]` does, by
    /// synthesizing a `#define` line and running it through the normal
    /// directive path before any real input has been read.
    pub fn define_builtin(&mut self, name: &str, value: Option<&str>) {
        let line = match value {
            Some(v) => format!("#define {name} {v}\n"),
            None => format!("#define {name} 1\n"),
        };
        self.inject_line(line);
    }

    pub fn inject_line(&mut self, raw: String) {
        self.ctx.assembler.inject_line(raw);
    }

    /// Read-only access to the interner, for callers (the CLI's token
    /// dump) that need to render a token's text after pulling it.
    pub fn interner(&self) -> &Interner<'bump> {
        self.interner
    }

    /// Current source line, for callers that want to attribute a
    /// propagated error to a location (the CLI's `Diagnostics` sink).
    pub fn current_line(&self) -> u32 {
        self.ctx.assembler.current_line()
    }

    /// Mutable access to the pipeline's diagnostics sink: non-fatal
    /// warnings (unparseable pp-numbers) are recorded here as they're
    /// encountered, and the CLI reuses the same sink to report a
    /// propagated fatal `ErrorKind` once `preprocess`/the token dump
    /// returns an `Err`.
    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut self.ctx.diagnostics
    }

    fn ensure(&mut self, n: usize) -> PrepResult<()> {
        while !self.ctx.lookahead.is_lookahead_ready(n) {
            match self.ctx.assembler.next_expanded_line(self.interner)? {
                Some(tokens) => {
                    for tok in tokens {
                        if tok.kind == TokenKind::Newline && !self.ctx.lookahead.emit_mode {
                            continue;
                        }
                        self.ctx.lookahead.add_to_lookahead(tok, self.interner, &mut self.ctx.diagnostics);
                    }
                    self.ctx.lookahead.strip_trailing_end_padding();
                }
                None => {
                    let end = Token::new(TokenKind::End, self.interner.intern(""), 0, 0);
                    self.ctx.lookahead.add_to_lookahead(end, self.interner, &mut self.ctx.diagnostics);
                }
            }
        }
        Ok(())
    }

    pub fn next(&mut self) -> PrepResult<Token> {
        self.ensure(1)?;
        Ok(self.ctx.lookahead.pop_front().expect("ensure(1) guarantees a token"))
    }

    pub fn peek(&mut self) -> PrepResult<Token> {
        self.peek_at(1)
    }

    pub fn peek_at(&mut self, n: usize) -> PrepResult<Token> {
        debug_assert!(n >= 1);
        self.ensure(n)?;
        Ok(*self.ctx.lookahead.get(n - 1).expect("ensure(n) guarantees n tokens"))
    }

    pub fn consume(&mut self, kind: TokenKind) -> PrepResult<Token> {
        let tok = self.next()?;
        if tok.kind != kind {
            return Err(unexpected_token(&format!("{kind:?}"), tok, self.interner));
        }
        Ok(tok)
    }

    /// `-E` mode: emits preprocessed source text instead of feeding a
    /// parser. String merging stops and `NEWLINE`s pass through so the
    /// output is a faithful re-rendering of the logical source lines.
    pub fn preprocess(&mut self, output: &mut dyn Write) -> PrepResult<()> {
        self.ctx.lookahead.emit_mode = true;
        loop {
            let tok = self.next()?;
            if tok.kind == TokenKind::End {
                break;
            }
            write!(output, "{}", " ".repeat(tok.leading_whitespace as usize)).ok();
            render_token(output, &tok, self.interner);
        }
        Ok(())
    }
}

fn render_token(output: &mut dyn Write, tok: &Token, interner: &Interner) {
    if tok.kind == TokenKind::Newline {
        writeln!(output).ok();
        return;
    }
    write!(output, "{}", interner.raw(tok.text)).ok();
}
