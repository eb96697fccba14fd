use crate::directive::{DirectiveOutcome, Directives};
use crate::error::{ErrorKind, PrepResult};
use crate::expander::expand_once;
use crate::interner::Interner;
use crate::lexer::LineBuffer;
use crate::line_source::{FileLineSource, LineSource, VecLineSource};
use crate::token::{Token, TokenKind, TokenList};
use std::path::{Path, PathBuf};

/// Pulls lines from one or more `LineSource`s (the bottom of the stack
/// is the translation unit's main file; `#include` and `inject_line`
/// each push another on top, popped once drained), assembling complete
/// logical lines, expanding macros, and driving the directive evaluator.
pub struct LineAssembler {
    sources: Vec<(Box<dyn LineSource>, PathBuf)>,
    buf: Option<LineBuffer>,
    line_no: u32,
    pub directives: Directives,
}

impl LineAssembler {
    pub fn new(source: Box<dyn LineSource>, path: PathBuf) -> Self {
        LineAssembler {
            sources: vec![(source, path)],
            buf: None,
            line_no: 0,
            directives: Directives::new(),
        }
    }

    /// Pushes a synthetic line ahead of the current source, as the
    /// driver does for `-D` command-line macro definitions: the line is
    /// read, tokenized and expanded exactly like real input, then the
    /// pseudo-source drains and control returns to whatever was open.
    pub fn inject_line(&mut self, text: String) {
        let path = self.current_path();
        self.sources.push((Box::new(VecLineSource::from_text(&text)), path));
    }

    pub fn current_line(&self) -> u32 {
        self.line_no
    }

    fn current_path(&self) -> PathBuf {
        self.sources.last().map(|(_, path)| path.clone()).unwrap_or_default()
    }

    fn current_dir(&self) -> PathBuf {
        self.current_path().parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// The raw puller: advances the cursor, asking the line source for
    /// more text when the current line is exhausted, and popping
    /// `#include` frames when a source is drained. Returns `END` only
    /// once every source on the stack is exhausted.
    pub fn get_token(&mut self, interner: &mut Interner) -> Token {
        loop {
            if self.buf.is_none() {
                match self.sources.last_mut() {
                    None => return Token::new(TokenKind::End, interner.intern(""), self.line_no, 0),
                    Some((source, _)) => match source.next_logical_line() {
                        Some(text) => {
                            self.line_no += 1;
                            self.buf = Some(LineBuffer::new(text, self.line_no));
                        }
                        None => {
                            self.sources.pop();
                            continue;
                        }
                    },
                }
            }

            let buf = self.buf.as_mut().expect("just ensured");
            let tok = buf.tokenize(interner);
            if tok.is_eof() {
                self.buf = None;
                return Token::new(TokenKind::Newline, interner.intern("\n"), tok.line, 0);
            }
            return tok;
        }
    }

    /// Reads tokens until `NEWLINE`, returning them without the
    /// terminator. Used both for ordinary code lines and for the rest
    /// of a directive line after its keyword has been consumed. As soon
    /// as a function-like macro name is pushed and immediately followed
    /// by `(`, the whole balanced argument list is pulled in right here
    /// (possibly crossing physical lines) so a multi-line invocation
    /// collapses into this one logical line before expansion ever runs.
    fn read_complete_line(&mut self, first: Option<Token>, interner: &mut Interner) -> PrepResult<Vec<Token>> {
        let mut out = Vec::new();
        if let Some(t) = first {
            out.push(t);
            if self.complete_invocation_if_function_like(&mut out, t, interner)? {
                return Ok(out);
            }
        }
        loop {
            let tok = self.get_token(interner);
            if tok.kind == TokenKind::Newline {
                break;
            }
            out.push(tok);
            if self.complete_invocation_if_function_like(&mut out, tok, interner)? {
                break;
            }
        }
        Ok(out)
    }

    /// If `tok` (just pushed onto `out`) names a function-like macro,
    /// peeks the following token: a `(` pulls the whole balanced
    /// argument list in right here (crossing physical lines if needed);
    /// anything else (including `NEWLINE`) is left unconsumed by pushing
    /// it back for the caller's own loop to see. Returns true if a
    /// `NEWLINE` was hit while doing so, telling the caller the line is
    /// already complete.
    fn complete_invocation_if_function_like(&mut self, out: &mut Vec<Token>, tok: Token, interner: &mut Interner) -> PrepResult<bool> {
        let is_function_like = tok.is_expandable
            && !tok.disable_expand
            && self.directives.macros.lookup(tok.text).is_some_and(|d| d.is_function_like());
        if !is_function_like {
            return Ok(false);
        }

        let next = self.get_token(interner);
        match next.kind {
            TokenKind::LParen => {
                out.push(next);
                let mut list = TokenList::from_vec(std::mem::take(out));
                self.read_macro_invocation(&mut list, interner, 1)?;
                *out = list.into_vec();
                Ok(false)
            }
            TokenKind::Newline => Ok(true),
            _ => {
                out.push(next);
                Ok(false)
            }
        }
    }

    /// Called when a function-like macro name has just been pushed onto
    /// `line` and is followed (or will be followed, once more lines are
    /// pulled) by its `(...)`. Pulls tokens, balancing parentheses and
    /// dropping intervening `NEWLINE`s so a multi-line invocation
    /// collapses into one contiguous line.
    fn read_macro_invocation(&mut self, line: &mut TokenList, interner: &mut Interner, mut depth: i32) -> PrepResult<()> {
        loop {
            let tok = self.get_token(interner);
            match tok.kind {
                TokenKind::End => return Err(ErrorKind::UnbalancedInvocation),
                TokenKind::Newline => continue,
                TokenKind::LParen => {
                    depth += 1;
                    line.push(tok);
                }
                TokenKind::RParen => {
                    depth -= 1;
                    line.push(tok);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => line.push(tok),
            }
        }
    }

    /// After a successful expansion pass, makes sure every function-like
    /// macro name still standing in `line` has its full, balanced
    /// argument list physically present — pulling more source lines via
    /// [`read_macro_invocation`] when the `(` hasn't been matched yet.
    fn refill_expanding_line(&mut self, line: &mut TokenList, interner: &mut Interner) -> PrepResult<()> {
        // New tokens are always appended at the back; pull the line's
        // terminator so nothing ends up spliced in after it, then put a
        // fresh one back on once refilling is done.
        if matches!(line.get(line.len().wrapping_sub(1)), Some(t) if t.kind == TokenKind::Newline) {
            line.pop();
        }

        let mut i = 0;
        while i < line.len() {
            let tok = *line.get(i).expect("i < len");
            if !tok.is_expandable || tok.disable_expand {
                i += 1;
                continue;
            }
            let is_function_like = self.directives.macros.lookup(tok.text).is_some_and(|d| d.is_function_like());
            if !is_function_like {
                i += 1;
                continue;
            }

            let has_open_paren = matches!(line.get(i + 1), Some(t) if t.kind == TokenKind::LParen);
            if !has_open_paren {
                i += 1;
                continue;
            }

            let outstanding = outstanding_depth(line.as_slice(), i + 1);
            if outstanding > 0 {
                self.read_macro_invocation(line, interner, outstanding)?;
            }
            i += 1;
        }

        line.push(Token::new(TokenKind::Newline, interner.intern("\n"), self.line_no, 0));
        Ok(())
    }

    /// Assembles and fully expands the next top-level logical line,
    /// returning its tokens (terminator included) or `None` when the
    /// translation unit is exhausted. Directive lines are consumed
    /// internally and never returned; this loops until it has either a
    /// real code line or end of input.
    pub fn next_expanded_line(&mut self, interner: &mut Interner) -> PrepResult<Option<Vec<Token>>> {
        loop {
            let first = self.get_token(interner);
            if first.kind == TokenKind::End {
                return Ok(None);
            }
            if first.kind == TokenKind::Newline {
                continue;
            }

            if first.kind == TokenKind::Hash {
                let name_tok = self.get_token(interner);
                if name_tok.kind == TokenKind::Newline {
                    continue; // a bare `#` on its own line is a no-op
                }
                let rest = self.read_complete_line(None, interner)?;
                if !self.directives.in_active_block() && !is_conditional_directive(interner.raw(name_tok.text)) {
                    continue;
                }
                let name = interner.raw(name_tok.text).to_string();
                let outcome = self.directives.preprocess_directive(&name, &rest, interner)?;
                if let DirectiveOutcome::Include(rel) = outcome {
                    self.open_include(&rel)?;
                }
                continue;
            }

            if !self.directives.in_active_block() {
                // Discard the rest of this inactive code line.
                self.read_complete_line(None, interner)?;
                continue;
            }

            let mut line = TokenList::from_vec(self.read_complete_line(Some(first), interner)?);
            line.push(Token::new(TokenKind::Newline, interner.intern("\n"), self.line_no, 0));

            loop {
                let changed = expand_once(&mut line, &self.directives.macros, interner)?;
                if !changed {
                    break;
                }
                self.refill_expanding_line(&mut line, interner)?;
            }

            return Ok(Some(line.into_vec()));
        }
    }

    fn open_include(&mut self, rel: &PathBuf) -> PrepResult<()> {
        let base = self.current_dir();
        let full = if rel.is_absolute() { rel.clone() } else { base.join(rel) };
        let source = FileLineSource::open(&full)
            .map_err(|_| ErrorKind::IncludeNotFound(full.display().to_string()))?;
        self.sources.push((Box::new(source), full));
        Ok(())
    }
}

fn is_conditional_directive(name: &str) -> bool {
    matches!(name, "if" | "ifdef" | "ifndef" | "elif" | "else" | "endif")
}

/// Net parenthesis depth still open after the `(` at `toks[open_idx]`,
/// scanning only the tokens currently on hand: 0 means it already
/// closes within `toks`; a positive number is how much nesting
/// `read_macro_invocation` still needs to pull and close.
fn outstanding_depth(toks: &[Token], open_idx: usize) -> i32 {
    let mut depth = 1i32;
    let mut idx = open_idx + 1;
    while idx < toks.len() && depth > 0 {
        match toks[idx].kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            TokenKind::Newline => break,
            _ => {}
        }
        idx += 1;
    }
    depth
}
