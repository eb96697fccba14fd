use crate::error::{ErrorKind, PrepResult};
use crate::expander::expand_to_fixpoint;
use crate::interner::{Interner, Symbol};
use crate::lexer::LineBuffer;
use crate::token::{Token, TokenKind};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum MacroKind {
    ObjectLike,
    FunctionLike { params: Vec<Symbol>, variadic: bool },
}

/// A macro definition, opaque to the expander beyond `kind` and `name`;
/// the replacement list and parameter substitution logic live here
/// rather than in the expander itself.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: Symbol,
    pub kind: MacroKind,
    pub replacement: Vec<Token>,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, MacroKind::FunctionLike { .. })
    }

    /// Builds the replacement tokens for one invocation: `#` stringifies
    /// a parameter's raw (unexpanded) argument, `##` pastes two raw
    /// operands into one token, and a bare parameter is replaced by its
    /// fully macro-expanded argument. `raw_args` must already have
    /// variadic tail arguments joined into the final slot by the caller.
    pub fn substitute(
        &self,
        raw_args: &[Vec<Token>],
        macros: &MacroTable,
        interner: &mut Interner,
    ) -> PrepResult<Vec<Token>> {
        let (params, variadic) = match &self.kind {
            MacroKind::FunctionLike { params, variadic } => (params, *variadic),
            MacroKind::ObjectLike => return Ok(self.replacement.clone()),
        };

        let mut arg_index: HashMap<Symbol, usize> = HashMap::new();
        for (idx, p) in params.iter().enumerate() {
            arg_index.insert(*p, idx);
        }
        // The variadic tail (already comma-joined by the caller into the
        // slot just past the named parameters) is referred to in the
        // replacement list as `__VA_ARGS__`.
        if variadic {
            arg_index.insert(interner.intern("__VA_ARGS__"), params.len());
        }

        let raw_of = |idx: usize| -> &[Token] {
            raw_args.get(idx).map(Vec::as_slice).unwrap_or(&[])
        };

        let mut expanded_cache: Vec<Option<Vec<Token>>> = vec![None; raw_args.len()];
        let body = &self.replacement;
        let mut out: Vec<Token> = Vec::new();
        let mut i = 0;

        while i < body.len() {
            let tok = body[i];

            if tok.kind == TokenKind::Hash {
                if let Some(next) = body.get(i + 1) {
                    if let Some(&pidx) = arg_index.get(&next.text) {
                        let text = stringify(raw_of(pidx), interner);
                        let sym = interner.intern(&text);
                        out.push(Token::new(TokenKind::PrepString, sym, tok.line, tok.leading_whitespace));
                        i += 2;
                        continue;
                    }
                }
                out.push(tok);
                i += 1;
                continue;
            }

            if tok.kind == TokenKind::HashHash {
                i += 1;
                let Some(&rhs) = body.get(i) else { continue };
                let rhs_toks: &[Token] = match arg_index.get(&rhs.text) {
                    Some(&pidx) => raw_of(pidx),
                    None => std::slice::from_ref(&rhs),
                };
                if let Some(first_rhs) = rhs_toks.first().copied() {
                    if let Some(last_out) = out.pop() {
                        let merged = paste(last_out, first_rhs, interner)?;
                        out.push(merged);
                    } else {
                        out.push(first_rhs);
                    }
                    out.extend_from_slice(&rhs_toks[1..]);
                }
                i += 1;
                continue;
            }

            if let Some(&pidx) = arg_index.get(&tok.text) {
                let next_is_paste = matches!(body.get(i + 1), Some(t) if t.kind == TokenKind::HashHash);
                if next_is_paste {
                    out.extend_from_slice(raw_of(pidx));
                } else {
                    if expanded_cache[pidx].is_none() {
                        let expanded = expand_to_fixpoint(raw_of(pidx).to_vec(), macros, interner)?;
                        expanded_cache[pidx] = Some(expanded);
                    }
                    out.extend(expanded_cache[pidx].as_ref().unwrap().iter().copied());
                }
                i += 1;
                continue;
            }

            out.push(tok);
            i += 1;
        }

        Ok(out)
    }
}

/// `#` stringification: render the raw argument tokens back to source
/// text, joined the way the lexer would have seen them (a single space
/// wherever a token carried leading whitespace), and quote the result.
fn stringify(raw: &[Token], interner: &Interner) -> String {
    let mut body = String::new();
    for (i, tok) in raw.iter().enumerate() {
        if i > 0 && tok.leading_whitespace > 0 {
            body.push(' ');
        }
        let text = interner.raw(tok.text);
        if tok.kind == TokenKind::PrepString || tok.kind == TokenKind::PrepChar {
            body.push_str(&text.replace('\\', "\\\\").replace('"', "\\\""));
        } else {
            body.push_str(text);
        }
    }
    format!("\"{body}\"")
}

/// `##` pasting: concatenate the two operands' text and re-lex the
/// result. A paste that doesn't collapse into exactly one token is a
/// fatal error rather than silently keeping two tokens.
fn paste(lhs: Token, rhs: Token, interner: &mut Interner) -> PrepResult<Token> {
    let merged_text = format!("{}{}", interner.raw(lhs.text), interner.raw(rhs.text));
    let mut buf = LineBuffer::new(merged_text.clone(), lhs.line);
    let first = buf.tokenize(interner);
    if first.is_eof() {
        return Err(ErrorKind::InvalidPaste(merged_text));
    }
    let rest = buf.tokenize(interner);
    if !rest.is_eof() {
        return Err(ErrorKind::InvalidPaste(merged_text));
    }
    Ok(Token {
        leading_whitespace: lhs.leading_whitespace,
        line: lhs.line,
        ..first
    })
}

/// Lookup table by interned identifier. Mutated only by the directive
/// evaluator (`#define`/`#undef`); queried (never mutated) by the
/// expander.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<Symbol, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable { macros: HashMap::new() }
    }

    pub fn lookup(&self, name: Symbol) -> Option<&MacroDef> {
        self.macros.get(&name)
    }

    pub fn is_defined(&self, name: Symbol) -> bool {
        self.macros.contains_key(&name)
    }

    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name, def);
    }

    pub fn undef(&mut self, name: Symbol) {
        self.macros.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use crate::interner::Interner;

    #[test]
    fn define_then_lookup_roundtrips() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let name = interner.intern("X");
        let mut table = MacroTable::new();
        table.define(MacroDef { name, kind: MacroKind::ObjectLike, replacement: vec![] });
        assert!(table.is_defined(name));
        assert!(table.lookup(name).is_some());
    }

    #[test]
    fn undef_removes_definition() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let name = interner.intern("X");
        let mut table = MacroTable::new();
        table.define(MacroDef { name, kind: MacroKind::ObjectLike, replacement: vec![] });
        table.undef(name);
        assert!(!table.is_defined(name));
    }
}
