use crate::error::{ErrorKind, PrepResult};
use crate::expander::expand_to_fixpoint;
use crate::interner::{Interner, Symbol};
use crate::macro_table::{MacroDef, MacroKind, MacroTable};
use crate::postprocessor::{parse_integer, strip_integer_suffix};
use crate::token::{NumberValue, Token, TokenKind};
use std::path::PathBuf;

/// One `#if`/`#ifdef`/`#ifndef` nesting level. `active` already folds in
/// every ancestor's activity (computed once at push time from the
/// parent's `active`), so `in_active_block` only ever has to look at the
/// top of the stack.
struct CondFrame {
    parent_active: bool,
    any_taken: bool,
    active: bool,
}

/// What a directive line asked the caller to do beyond mutating the
/// macro table and conditional stack.
pub enum DirectiveOutcome {
    None,
    Include(PathBuf),
}

/// Owns the macro table and the conditional-compilation stack, and
/// interprets one assembled `#`-line at a time.
pub struct Directives {
    pub macros: MacroTable,
    stack: Vec<CondFrame>,
}

impl Default for Directives {
    fn default() -> Self {
        Self::new()
    }
}

impl Directives {
    pub fn new() -> Self {
        Directives { macros: MacroTable::new(), stack: Vec::new() }
    }

    pub fn in_active_block(&self) -> bool {
        self.stack.last().map_or(true, |f| f.active)
    }

    /// `name` is the directive keyword with the leading `#` already
    /// stripped (`"define"`, `"if"`, ...); `rest` is every other token on
    /// the line, not including the trailing `NEWLINE`.
    pub fn preprocess_directive(
        &mut self,
        name: &str,
        rest: &[Token],
        interner: &mut Interner,
    ) -> PrepResult<DirectiveOutcome> {
        match name {
            "define" => self.do_define(rest).map(|()| DirectiveOutcome::None),
            "undef" => {
                if let Some(first) = rest.first() {
                    self.macros.undef(first.text);
                }
                Ok(DirectiveOutcome::None)
            }
            "ifdef" => {
                let defined = rest.first().is_some_and(|t| self.macros.is_defined(t.text));
                self.push_if(defined);
                Ok(DirectiveOutcome::None)
            }
            "ifndef" => {
                let defined = rest.first().is_some_and(|t| self.macros.is_defined(t.text));
                self.push_if(!defined);
                Ok(DirectiveOutcome::None)
            }
            "if" => {
                let cond = self.eval_condition(rest, interner)?;
                self.push_if(cond != 0);
                Ok(DirectiveOutcome::None)
            }
            "elif" => {
                let cond = self.eval_condition(rest, interner)?;
                self.do_elif(cond != 0);
                Ok(DirectiveOutcome::None)
            }
            "else" => {
                self.do_else();
                Ok(DirectiveOutcome::None)
            }
            "endif" => {
                self.stack.pop();
                Ok(DirectiveOutcome::None)
            }
            "include" => self.do_include(rest, interner),
            "error" => {
                let msg = rest.iter().map(|t| interner.raw(t.text)).collect::<Vec<_>>().join(" ");
                Err(ErrorKind::UserError(msg))
            }
            "pragma" => Ok(DirectiveOutcome::None),
            other => Err(ErrorKind::BadDirective(format!("unknown directive \"{other}\""))),
        }
    }

    fn push_if(&mut self, condition: bool) {
        let parent_active = self.in_active_block();
        let active = parent_active && condition;
        self.stack.push(CondFrame { parent_active, any_taken: active, active });
    }

    fn do_elif(&mut self, condition: bool) {
        let Some(frame) = self.stack.last_mut() else { return };
        if frame.parent_active && !frame.any_taken && condition {
            frame.active = true;
            frame.any_taken = true;
        } else {
            frame.active = false;
        }
    }

    fn do_else(&mut self) {
        let Some(frame) = self.stack.last_mut() else { return };
        if frame.parent_active && !frame.any_taken {
            frame.active = true;
            frame.any_taken = true;
        } else {
            frame.active = false;
        }
    }

    fn do_define(&mut self, rest: &[Token]) -> PrepResult<()> {
        let Some(name_tok) = rest.first() else {
            return Err(ErrorKind::BadDirective("#define requires a name".to_string()));
        };
        let name = name_tok.text;

        // No whitespace between the name and `(` means function-like.
        if let Some(paren) = rest.get(1) {
            if paren.kind == TokenKind::LParen && paren.leading_whitespace == 0 {
                let (params, variadic, body_start) = parse_param_list(&rest[1..])?;
                let replacement = rest[1 + body_start..].to_vec();
                self.macros.define(MacroDef {
                    name,
                    kind: MacroKind::FunctionLike { params, variadic },
                    replacement,
                });
                return Ok(());
            }
        }

        let replacement = rest[1..].to_vec();
        self.macros.define(MacroDef { name, kind: MacroKind::ObjectLike, replacement });
        Ok(())
    }

    fn do_include(&mut self, rest: &[Token], interner: &mut Interner) -> PrepResult<DirectiveOutcome> {
        let Some(first) = rest.first() else {
            return Err(ErrorKind::BadDirective("#include requires a path".to_string()));
        };
        let raw = interner.raw(first.text);
        let path = match first.kind {
            TokenKind::PrepString | TokenKind::String => raw.trim_matches('"').to_string(),
            _ => {
                // Angle-bracket form: `<`, path pieces, `>` as separate tokens.
                let joined: String = rest
                    .iter()
                    .skip(1)
                    .take_while(|t| t.kind != TokenKind::Gt)
                    .map(|t| interner.raw(t.text))
                    .collect();
                joined
            }
        };
        if path.is_empty() {
            return Err(ErrorKind::BadDirective("#include requires a path".to_string()));
        }
        Ok(DirectiveOutcome::Include(PathBuf::from(path)))
    }

    /// Intercepts the `defined` operator, macro-expands what remains,
    /// and evaluates the resulting constant expression.
    fn eval_condition(&self, rest: &[Token], interner: &mut Interner) -> PrepResult<i64> {
        let substituted = self.substitute_defined(rest, interner)?;
        let expanded = expand_to_fixpoint(substituted, &self.macros, interner)?;
        evaluate_expr(&expanded, interner)
    }

    fn substitute_defined(&self, rest: &[Token], interner: &mut Interner) -> PrepResult<Vec<Token>> {
        let defined_sym = interner.intern("defined");
        let mut out = Vec::with_capacity(rest.len());
        let mut i = 0;
        while i < rest.len() {
            let tok = rest[i];
            if tok.kind == TokenKind::Identifier && tok.text == defined_sym {
                let (name_tok, consumed) = match rest.get(i + 1) {
                    Some(t) if t.kind == TokenKind::LParen => {
                        let Some(name) = rest.get(i + 2) else { return Err(ErrorKind::BadDefined) };
                        if !name.is_expandable {
                            return Err(ErrorKind::BadDefined);
                        }
                        match rest.get(i + 3) {
                            Some(close) if close.kind == TokenKind::RParen => (*name, 4),
                            _ => return Err(ErrorKind::BadDefined),
                        }
                    }
                    Some(t) if t.is_expandable => (*t, 2),
                    _ => return Err(ErrorKind::BadDefined),
                };
                let value = if self.macros.is_defined(name_tok.text) { "1" } else { "0" };
                let sym = interner.intern(value);
                out.push(Token::new(TokenKind::PrepNumber, sym, tok.line, tok.leading_whitespace));
                i += consumed;
                continue;
            }
            out.push(tok);
            i += 1;
        }
        Ok(out)
    }
}

/// Parses `(a, b, ...)` (the opening `(` at `toks[0]`), returning the
/// parameter symbols, whether the last is variadic, and the index just
/// past the closing `)`.
fn parse_param_list(toks: &[Token]) -> PrepResult<(Vec<Symbol>, bool, usize)> {
    let mut params = Vec::new();
    let mut variadic = false;
    let mut i = 1; // skip the LParen itself
    loop {
        match toks.get(i) {
            Some(t) if t.kind == TokenKind::RParen => {
                i += 1;
                break;
            }
            Some(t) if t.kind == TokenKind::Ellipsis => {
                variadic = true;
                i += 1;
            }
            Some(t) if t.kind == TokenKind::Identifier => {
                params.push(t.text);
                i += 1;
            }
            Some(t) if t.kind == TokenKind::Comma => {
                i += 1;
            }
            _ => return Err(ErrorKind::BadDirective("malformed macro parameter list".to_string())),
        }
    }
    Ok((params, variadic, i))
}

/// Small recursive-descent evaluator over `#if`/`#elif` constant
/// expressions: `||`, `&&`, bitwise/relational/shift/arithmetic
/// operators, unary `! ~ - +`, parentheses, and integer literals.
/// Any identifier still standing after macro expansion evaluates to 0,
/// matching every C preprocessor's treatment of unknown names in `#if`.
struct ExprParser<'t, 'bump> {
    toks: &'t [Token],
    pos: usize,
    interner: &'t Interner<'bump>,
}

fn evaluate_expr<'bump>(toks: &[Token], interner: &Interner<'bump>) -> PrepResult<i64> {
    let mut parser = ExprParser { toks, pos: 0, interner };
    parser.parse_or()
}

impl<'t, 'bump> ExprParser<'t, 'bump> {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).copied();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn binop<F>(&mut self, kinds: &[TokenKind], mut next: F) -> PrepResult<i64>
    where
        F: FnMut(&mut Self) -> PrepResult<i64>,
    {
        let mut lhs = next(self)?;
        while let Some(t) = self.peek() {
            if kinds.contains(&t.kind) {
                let op = self.bump().unwrap().kind;
                let rhs = next(self)?;
                lhs = apply_binop(op, lhs, rhs);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::PipePipe], Self::parse_and)
    }
    fn parse_and(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::AmpAmp], Self::parse_bitor)
    }
    fn parse_bitor(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Pipe], Self::parse_bitxor)
    }
    fn parse_bitxor(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Caret], Self::parse_bitand)
    }
    fn parse_bitand(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Amp], Self::parse_eq)
    }
    fn parse_eq(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::EqEq, TokenKind::NotEq], Self::parse_rel)
    }
    fn parse_rel(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Lt, TokenKind::Gt, TokenKind::LtEq, TokenKind::GtEq], Self::parse_shift)
    }
    fn parse_shift(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Shl, TokenKind::Shr], Self::parse_add)
    }
    fn parse_add(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Plus, TokenKind::Minus], Self::parse_mul)
    }
    fn parse_mul(&mut self) -> PrepResult<i64> {
        self.binop(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> PrepResult<i64> {
        if let Some(t) = self.peek() {
            match t.kind {
                TokenKind::Bang => {
                    self.bump();
                    return Ok(i64::from(self.parse_unary()? == 0));
                }
                TokenKind::Tilde => {
                    self.bump();
                    return Ok(!self.parse_unary()?);
                }
                TokenKind::Minus => {
                    self.bump();
                    return Ok(-self.parse_unary()?);
                }
                TokenKind::Plus => {
                    self.bump();
                    return self.parse_unary();
                }
                _ => {}
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PrepResult<i64> {
        let Some(tok) = self.bump() else {
            return Err(ErrorKind::BadDirective("unexpected end of expression".to_string()));
        };
        match tok.kind {
            TokenKind::LParen => {
                let v = self.parse_or()?;
                match self.bump() {
                    Some(t) if t.kind == TokenKind::RParen => Ok(v),
                    _ => Err(ErrorKind::UnexpectedToken { expected: ")".to_string(), actual: "?".to_string() }),
                }
            }
            TokenKind::PrepNumber | TokenKind::Number => {
                let raw = self.interner.raw(tok.text);
                let (body, unsigned) = strip_integer_suffix(raw);
                Ok(match parse_integer(body, unsigned) {
                    Some(NumberValue::Signed(v)) => v,
                    Some(NumberValue::Unsigned(v)) => v as i64,
                    _ => 0,
                })
            }
            TokenKind::Identifier => Ok(0),
            _ => Err(ErrorKind::BadDirective("unexpected token in constant expression".to_string())),
        }
    }
}

fn apply_binop(op: TokenKind, lhs: i64, rhs: i64) -> i64 {
    match op {
        TokenKind::PipePipe => i64::from(lhs != 0 || rhs != 0),
        TokenKind::AmpAmp => i64::from(lhs != 0 && rhs != 0),
        TokenKind::Pipe => lhs | rhs,
        TokenKind::Caret => lhs ^ rhs,
        TokenKind::Amp => lhs & rhs,
        TokenKind::EqEq => i64::from(lhs == rhs),
        TokenKind::NotEq => i64::from(lhs != rhs),
        TokenKind::Lt => i64::from(lhs < rhs),
        TokenKind::Gt => i64::from(lhs > rhs),
        TokenKind::LtEq => i64::from(lhs <= rhs),
        TokenKind::GtEq => i64::from(lhs >= rhs),
        TokenKind::Shl => lhs << rhs,
        TokenKind::Shr => lhs >> rhs,
        TokenKind::Plus => lhs + rhs,
        TokenKind::Minus => lhs - rhs,
        TokenKind::Star => lhs * rhs,
        TokenKind::Slash => if rhs == 0 { 0 } else { lhs / rhs },
        TokenKind::Percent => if rhs == 0 { 0 } else { lhs % rhs },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LineBuffer;
    use bumpalo::Bump;

    fn lex(src: &str, interner: &mut Interner) -> Vec<Token> {
        let mut buf = LineBuffer::new(src.to_string(), 1);
        let mut out = Vec::new();
        loop {
            let tok = buf.tokenize(interner);
            if tok.is_eof() {
                break;
            }
            out.push(tok);
        }
        out
    }

    #[test]
    fn define_object_like_then_undef() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut dirs = Directives::new();
        let rest = lex("X 42", &mut interner);
        dirs.preprocess_directive("define", &rest, &mut interner).unwrap();
        assert!(dirs.macros.is_defined(rest[0].text));
        dirs.preprocess_directive("undef", &rest[..1], &mut interner).unwrap();
        assert!(!dirs.macros.is_defined(rest[0].text));
    }

    #[test]
    fn define_function_like_distinguishes_on_whitespace() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut dirs = Directives::new();
        let rest = lex("MAX(a,b) ((a)>(b)?(a):(b))", &mut interner);
        dirs.preprocess_directive("define", &rest, &mut interner).unwrap();
        let def = dirs.macros.lookup(rest[0].text).unwrap();
        assert!(def.is_function_like());
    }

    #[test]
    fn if_else_endif_tracks_active_block() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut dirs = Directives::new();
        let cond = lex("0", &mut interner);
        dirs.preprocess_directive("if", &cond, &mut interner).unwrap();
        assert!(!dirs.in_active_block());
        dirs.preprocess_directive("else", &[], &mut interner).unwrap();
        assert!(dirs.in_active_block());
        dirs.preprocess_directive("endif", &[], &mut interner).unwrap();
        assert!(dirs.in_active_block());
    }

    #[test]
    fn defined_operator_reads_macro_table() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut dirs = Directives::new();
        let def_rest = lex("Q", &mut interner);
        dirs.preprocess_directive("define", &def_rest, &mut interner).unwrap();

        let cond = lex("defined(Q)", &mut interner);
        dirs.preprocess_directive("if", &cond, &mut interner).unwrap();
        assert!(dirs.in_active_block());
    }

    #[test]
    fn constant_expression_arithmetic() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let toks = lex("1 + 2 * 3 == 7", &mut interner);
        let v = evaluate_expr(&toks, &interner).unwrap();
        assert_eq!(v, 1);
    }
}
