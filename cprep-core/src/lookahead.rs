use crate::error::{Diagnostics, ErrorKind, PrepResult};
use crate::interner::Interner;
use crate::postprocessor::{convert_preprocessing_char, convert_preprocessing_number, convert_preprocessing_string};
use crate::token::{Token, TokenKind};
use std::collections::VecDeque;

/// Tokens already post-processed and waiting for the parser. Reads come
/// off the front; `add_to_lookahead` appends (and may rewrite) the back.
#[derive(Debug, Default)]
pub struct Lookahead {
    deque: VecDeque<Token>,
    /// `-E` mode: string merging stops and `NEWLINE` is preserved.
    pub emit_mode: bool,
}

impl Lookahead {
    pub fn new() -> Self {
        Lookahead { deque: VecDeque::new(), emit_mode: false }
    }

    pub fn len(&self) -> usize {
        self.deque.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    /// A following `STRING` could still merge with the back element, so
    /// the lookahead isn't considered to satisfy a pending demand while
    /// its tail is a bare `STRING` (outside `-E` mode).
    pub fn is_lookahead_ready(&self, n: usize) -> bool {
        if self.deque.len() < n {
            return false;
        }
        if self.emit_mode {
            return true;
        }
        !matches!(self.deque.back(), Some(t) if t.kind == TokenKind::String)
    }

    /// Converts `PREP_*` tokens to their final form and appends, merging
    /// adjacent `STRING` literals. In `-E` mode everything is appended
    /// verbatim, `NEWLINE` included.
    pub fn add_to_lookahead(&mut self, tok: Token, interner: &mut Interner, diagnostics: &mut Diagnostics) {
        if self.emit_mode {
            self.deque.push_back(tok);
            return;
        }

        let converted = match tok.kind {
            TokenKind::PrepNumber => convert_preprocessing_number(tok, interner, diagnostics),
            TokenKind::PrepChar => convert_preprocessing_char(tok, interner),
            TokenKind::PrepString => convert_preprocessing_string(tok, interner),
            _ => tok,
        };

        if converted.kind == TokenKind::String {
            if let Some(back) = self.deque.back_mut() {
                if back.kind == TokenKind::String {
                    back.text = interner.concat(back.text, converted.text);
                    return;
                }
            }
        }

        self.deque.push_back(converted);
    }

    pub fn front(&self) -> Option<&Token> {
        self.deque.front()
    }

    pub fn pop_front(&mut self) -> Option<Token> {
        self.deque.pop_front()
    }

    pub fn get(&self, idx: usize) -> Option<&Token> {
        self.deque.get(idx)
    }

    /// Strips `END` padding that `ensure` may have appended to satisfy an
    /// earlier demand, so an injected line isn't cut off by tokens
    /// belonging to no real input.
    pub fn strip_trailing_end_padding(&mut self) {
        while matches!(self.deque.back(), Some(t) if t.kind == TokenKind::End) {
            self.deque.pop_back();
        }
    }
}

/// `consume`'s error path: build the actual/expected strings the way the
/// caller's diagnostic sink expects.
pub fn unexpected_token(expected: &str, actual: Token, interner: &Interner) -> ErrorKind {
    let actual_text = if actual.kind == TokenKind::End {
        "end of input".to_string()
    } else {
        format!("{:?} \"{}\"", actual.kind, interner.raw(actual.text))
    };
    ErrorKind::UnexpectedToken { expected: expected.to_string(), actual: actual_text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn tok(kind: TokenKind, text: &str, interner: &mut Interner) -> Token {
        Token::new(kind, interner.intern(text), 1, 0)
    }

    #[test]
    fn adjacent_strings_merge() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let mut la = Lookahead::new();
        la.add_to_lookahead(tok(TokenKind::PrepString, "\"foo\"", &mut interner), &mut interner, &mut diagnostics);
        la.add_to_lookahead(tok(TokenKind::PrepString, "\"bar\"", &mut interner), &mut interner, &mut diagnostics);
        assert_eq!(la.len(), 1);
        assert_eq!(interner.raw(la.front().unwrap().text), "foobar");
    }

    #[test]
    fn not_ready_while_back_is_bare_string() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let mut la = Lookahead::new();
        la.add_to_lookahead(tok(TokenKind::PrepString, "\"foo\"", &mut interner), &mut interner, &mut diagnostics);
        assert!(!la.is_lookahead_ready(1));
    }

    #[test]
    fn emit_mode_appends_verbatim_including_newline() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let mut la = Lookahead::new();
        la.emit_mode = true;
        la.add_to_lookahead(tok(TokenKind::Newline, "\n", &mut interner), &mut interner, &mut diagnostics);
        la.add_to_lookahead(tok(TokenKind::PrepString, "\"foo\"", &mut interner), &mut interner, &mut diagnostics);
        la.add_to_lookahead(tok(TokenKind::PrepString, "\"bar\"", &mut interner), &mut interner, &mut diagnostics);
        assert_eq!(la.len(), 3);
    }

    #[test]
    fn strip_trailing_end_padding_removes_only_end_tokens() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let mut la = Lookahead::new();
        la.add_to_lookahead(tok(TokenKind::Identifier, "x", &mut interner), &mut interner, &mut diagnostics);
        la.add_to_lookahead(tok(TokenKind::End, "", &mut interner), &mut interner, &mut diagnostics);
        la.add_to_lookahead(tok(TokenKind::End, "", &mut interner), &mut interner, &mut diagnostics);
        la.strip_trailing_end_padding();
        assert_eq!(la.len(), 1);
    }
}
