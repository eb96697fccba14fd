use crate::interner::{Interner, Symbol};
use crate::token::{Token, TokenKind};

/// A mutable cursor over one already-spliced logical line. Owns its text
/// rather than borrowing it so the line assembler can hold a
/// `LineBuffer` across many `tokenize` calls without fighting a
/// self-referential lifetime; each call re-slices from the current byte
/// offset, which is cheap (no allocation, just an iterator).
pub struct LineBuffer {
    text: String,
    byte_pos: usize,
    line: u32,
}

impl LineBuffer {
    pub fn new(text: String, line: u32) -> Self {
        LineBuffer { text, byte_pos: 0, line }
    }

    pub fn at_end(&self) -> bool {
        self.byte_pos >= self.text.len()
    }

    fn rest(&self) -> &str {
        &self.text[self.byte_pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, skip: usize) -> Option<char> {
        self.rest().chars().nth(skip)
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.byte_pos += c.len_utf8();
        Some(c)
    }

    fn next_char_if<P: Fn(char) -> bool>(&mut self, p: P) -> Option<char> {
        self.peek_char().filter(|c| p(*c)).and_then(|_| self.next_char())
    }

    fn consume_while<P: Fn(char) -> bool>(&mut self, p: P, out: &mut String) {
        while let Some(c) = self.next_char_if(&p) {
            out.push(c);
        }
    }

    /// Eats whitespace and `//`/`/* */` comments, returning the column
    /// width consumed so the caller can stamp `leading_whitespace`.
    fn skip_trivia(&mut self) -> u16 {
        let start = self.byte_pos;
        loop {
            let mut dump = String::new();
            self.consume_while(|c| c.is_whitespace() && c != '\n', &mut dump);

            if self.peek_char() == Some('/') && self.peek_char_at(1) == Some('/') {
                self.next_char();
                self.next_char();
                self.consume_while(|c| c != '\n', &mut dump);
                continue;
            }
            if self.peek_char() == Some('/') && self.peek_char_at(1) == Some('*') {
                self.next_char();
                self.next_char();
                loop {
                    match self.next_char() {
                        None => break,
                        Some('*') if self.peek_char() == Some('/') => {
                            self.next_char();
                            break;
                        }
                        Some(_) => {}
                    }
                }
                continue;
            }
            break;
        }
        (self.byte_pos - start) as u16
    }

    fn lex_ident(&mut self, first: char) -> String {
        let mut s = String::new();
        s.push(first);
        self.consume_while(|c| c.is_alphanumeric() || c == '_', &mut s);
        s
    }

    /// C's pp-number grammar, simplified: a digit-led run of digits,
    /// identifier characters, `.`, and a signed exponent (`e+`, `E-`, ...).
    fn lex_pp_number(&mut self, first: char) -> String {
        let mut s = String::new();
        s.push(first);
        loop {
            if let Some(c) = self.next_char_if(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                let exponent_sign = matches!(c, 'e' | 'E' | 'p' | 'P')
                    && matches!(self.peek_char(), Some('+') | Some('-'));
                s.push(c);
                if exponent_sign {
                    s.push(self.next_char().expect("peeked"));
                }
            } else {
                break;
            }
        }
        s
    }

    fn lex_string_like(&mut self, opener: char, closer: char) -> String {
        let mut s = String::new();
        s.push(opener);
        loop {
            match self.next_char() {
                None => break,
                Some('\\') => {
                    s.push('\\');
                    if let Some(escaped) = self.next_char() {
                        s.push(escaped);
                    }
                }
                Some(c) if c == closer => {
                    s.push(c);
                    break;
                }
                Some(c) => s.push(c),
            }
        }
        s
    }

    /// Recognizes one preprocessing token and advances past it, or
    /// returns `End` once the line's content is exhausted. The line's
    /// trailing newline is consumed here (every `LineSource` appends
    /// one) but never turned into a token of its own; `NEWLINE` is
    /// synthesized once by the puller when it sees `End`, not by this
    /// cursor.
    pub fn tokenize(&mut self, interner: &mut Interner) -> Token {
        let leading_whitespace = self.skip_trivia();

        let Some(c) = self.next_char() else {
            return Token::new(TokenKind::End, interner.intern(""), self.line, leading_whitespace);
        };

        if c == '\n' {
            return Token::new(TokenKind::End, interner.intern(""), self.line, leading_whitespace);
        }

        let (kind, text) = match c {
            'a'..='z' | 'A'..='Z' | '_' => {
                // Encoding-prefixed literals: L"...", u8"...", U'...' etc.
                if matches!(c, 'L' | 'u' | 'U') && matches!(self.peek_char(), Some('"') | Some('\'')) {
                    let quote = self.next_char().expect("peeked");
                    let body = self.lex_string_like(quote, quote);
                    let mut full = String::new();
                    full.push(c);
                    full.push_str(&body);
                    let kind = if quote == '"' { TokenKind::PrepString } else { TokenKind::PrepChar };
                    (kind, full)
                } else {
                    let ident = self.lex_ident(c);
                    let kind = match ident.as_str() {
                        "if" => TokenKind::If,
                        "else" => TokenKind::Else,
                        _ => TokenKind::Identifier,
                    };
                    (kind, ident)
                }
            }
            '0'..='9' => (TokenKind::PrepNumber, self.lex_pp_number(c)),
            '"' => (TokenKind::PrepString, self.lex_string_like('"', '"')),
            '\'' => (TokenKind::PrepChar, self.lex_string_like('\'', '\'')),
            '(' => (TokenKind::LParen, "(".to_string()),
            ')' => (TokenKind::RParen, ")".to_string()),
            '{' => (TokenKind::LBrace, "{".to_string()),
            '}' => (TokenKind::RBrace, "}".to_string()),
            '[' => (TokenKind::LBracket, "[".to_string()),
            ']' => (TokenKind::RBracket, "]".to_string()),
            ',' => (TokenKind::Comma, ",".to_string()),
            ';' => (TokenKind::Semicolon, ";".to_string()),
            '?' => (TokenKind::Question, "?".to_string()),
            ':' => (TokenKind::Colon, ":".to_string()),
            '~' => (TokenKind::Tilde, "~".to_string()),
            '.' => {
                if self.peek_char() == Some('.') && self.peek_char_at(1) == Some('.') {
                    self.next_char();
                    self.next_char();
                    (TokenKind::Ellipsis, "...".to_string())
                } else {
                    (TokenKind::Dot, ".".to_string())
                }
            }
            '#' => {
                if self.next_char_if(|c| c == '#').is_some() {
                    (TokenKind::HashHash, "##".to_string())
                } else {
                    (TokenKind::Hash, "#".to_string())
                }
            }
            '+' => (TokenKind::Plus, "+".to_string()),
            '-' => (TokenKind::Minus, "-".to_string()),
            '*' => (TokenKind::Star, "*".to_string()),
            '/' => (TokenKind::Slash, "/".to_string()),
            '%' => (TokenKind::Percent, "%".to_string()),
            '^' => (TokenKind::Caret, "^".to_string()),
            '!' => {
                if self.next_char_if(|c| c == '=').is_some() {
                    (TokenKind::NotEq, "!=".to_string())
                } else {
                    (TokenKind::Bang, "!".to_string())
                }
            }
            '=' => {
                if self.next_char_if(|c| c == '=').is_some() {
                    (TokenKind::EqEq, "==".to_string())
                } else {
                    (TokenKind::Assign, "=".to_string())
                }
            }
            '<' => {
                if self.next_char_if(|c| c == '=').is_some() {
                    (TokenKind::LtEq, "<=".to_string())
                } else if self.next_char_if(|c| c == '<').is_some() {
                    (TokenKind::Shl, "<<".to_string())
                } else {
                    (TokenKind::Lt, "<".to_string())
                }
            }
            '>' => {
                if self.next_char_if(|c| c == '=').is_some() {
                    (TokenKind::GtEq, ">=".to_string())
                } else if self.next_char_if(|c| c == '>').is_some() {
                    (TokenKind::Shr, ">>".to_string())
                } else {
                    (TokenKind::Gt, ">".to_string())
                }
            }
            '&' => {
                if self.next_char_if(|c| c == '&').is_some() {
                    (TokenKind::AmpAmp, "&&".to_string())
                } else {
                    (TokenKind::Amp, "&".to_string())
                }
            }
            '|' => {
                if self.next_char_if(|c| c == '|').is_some() {
                    (TokenKind::PipePipe, "||".to_string())
                } else {
                    (TokenKind::Pipe, "|".to_string())
                }
            }
            other => (TokenKind::Other(other as u8), other.to_string()),
        };

        let sym = interner.intern(&text);
        Token::new(kind, sym, self.line, leading_whitespace)
    }
}
