use crate::error::{Diagnostics, ErrorKind};
use crate::interner::Interner;
use crate::token::{NumberValue, Token, TokenKind};

fn is_floating_literal(body: &str) -> bool {
    if body.starts_with("0x") || body.starts_with("0X") {
        body.contains('.') || body.to_ascii_lowercase().contains('p')
    } else {
        body.contains('.') || body.to_ascii_lowercase().contains('e')
    }
}

pub(crate) fn strip_integer_suffix(raw: &str) -> (&str, bool) {
    let mut end = raw.len();
    let mut unsigned = false;
    for c in raw.chars().rev() {
        match c {
            'u' | 'U' => {
                unsigned = true;
                end -= 1;
            }
            'l' | 'L' => end -= 1,
            _ => break,
        }
    }
    (&raw[..end], unsigned)
}

/// Returns `None` (rather than silently defaulting) when `body` doesn't
/// parse as a literal of the given radix, so the caller can decide how
/// to report it.
pub(crate) fn parse_integer(body: &str, unsigned: bool) -> Option<NumberValue> {
    let (radix, digits) = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };
    let digits = if digits.is_empty() { "0" } else { digits };
    match u64::from_str_radix(digits, radix) {
        Ok(v) if !unsigned && v <= i64::MAX as u64 => Some(NumberValue::Signed(v as i64)),
        Ok(v) => Some(NumberValue::Unsigned(v)),
        Err(_) => None,
    }
}

/// `PREP_NUMBER` → `NUMBER`: determine integer vs. float, width and
/// signedness from the literal's suffix per the C lexical rules, parse
/// the magnitude, and stamp `Token.value`. A literal that looks like a
/// pp-number but doesn't parse (a malformed suffix, digits out of range
/// for their radix) reports a non-fatal diagnostic and falls back to
/// zero rather than stopping preprocessing.
pub fn convert_preprocessing_number(mut tok: Token, interner: &mut Interner, diagnostics: &mut Diagnostics) -> Token {
    let raw = interner.raw(tok.text).to_string();
    let floaty_body = raw.trim_end_matches(['f', 'F', 'l', 'L']);

    let value = if is_floating_literal(floaty_body) {
        let is_single = raw.ends_with('f') || raw.ends_with('F');
        let is_long = raw.ends_with('l') || raw.ends_with('L');
        match floaty_body.parse::<f64>() {
            Ok(v) if is_single => NumberValue::Float(v as f32),
            Ok(v) if is_long => NumberValue::LongDouble(v),
            Ok(v) => NumberValue::Double(v),
            Err(_) => {
                diagnostics.report(
                    &ErrorKind::DiagnosticWarning(format!("cannot parse floating constant \"{raw}\", treating as 0.0")),
                    tok.line,
                );
                NumberValue::Double(0.0)
            }
        }
    } else {
        let (body, unsigned) = strip_integer_suffix(&raw);
        parse_integer(body, unsigned).unwrap_or_else(|| {
            diagnostics.report(
                &ErrorKind::DiagnosticWarning(format!("cannot parse integer constant \"{raw}\", treating as 0")),
                tok.line,
            );
            NumberValue::Signed(0)
        })
    };

    tok.kind = TokenKind::Number;
    tok.value = Some(value);
    tok
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Strips the outer quotes (and any `L`/`u`/`U`/`u8` encoding prefix)
/// and resolves backslash escapes.
fn strip_and_unescape(raw: &str, quote: char) -> String {
    let body = raw.trim_start_matches(|c: char| c != quote);
    let inner = body.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)).unwrap_or(body);
    unescape(inner)
}

/// `PREP_CHAR` → `CHAR`.
pub fn convert_preprocessing_char(mut tok: Token, interner: &mut Interner) -> Token {
    let raw = interner.raw(tok.text).to_string();
    let resolved = strip_and_unescape(&raw, '\'');
    tok.kind = TokenKind::Char;
    tok.text = interner.intern(&resolved);
    tok.value = Some(NumberValue::Signed(resolved.chars().next().map_or(0, |c| c as i64)));
    tok
}

/// `PREP_STRING` → `STRING`. The text payload is stored *without*
/// surrounding quotes; `-E` output re-adds them when rendering.
pub fn convert_preprocessing_string(mut tok: Token, interner: &mut Interner) -> Token {
    let raw = interner.raw(tok.text).to_string();
    let resolved = strip_and_unescape(&raw, '"');
    tok.kind = TokenKind::String;
    tok.text = interner.intern(&resolved);
    tok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;
    use bumpalo::Bump;

    fn mk(text: &str, kind: TokenKind, interner: &mut Interner) -> Token {
        let sym = interner.intern(text);
        Token::new(kind, sym, 1, 0)
    }

    #[test]
    fn decimal_integer() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let tok = mk("42", TokenKind::PrepNumber, &mut interner);
        let converted = convert_preprocessing_number(tok, &mut interner, &mut diagnostics);
        assert_eq!(converted.value, Some(NumberValue::Signed(42)));
        assert_eq!(diagnostics.error_count, 0);
    }

    #[test]
    fn hex_integer() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let tok = mk("0x2A", TokenKind::PrepNumber, &mut interner);
        let converted = convert_preprocessing_number(tok, &mut interner, &mut diagnostics);
        assert_eq!(converted.value, Some(NumberValue::Signed(42)));
    }

    #[test]
    fn unsigned_suffix() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let tok = mk("10u", TokenKind::PrepNumber, &mut interner);
        let converted = convert_preprocessing_number(tok, &mut interner, &mut diagnostics);
        assert_eq!(converted.value, Some(NumberValue::Unsigned(10)));
    }

    #[test]
    fn float_literal() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let tok = mk("1.5", TokenKind::PrepNumber, &mut interner);
        let converted = convert_preprocessing_number(tok, &mut interner, &mut diagnostics);
        assert_eq!(converted.value, Some(NumberValue::Double(1.5)));
    }

    #[test]
    fn unparseable_hex_digits_report_a_non_fatal_warning_and_default_to_zero() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let mut diagnostics = Diagnostics::new("<test>");
        let tok = mk("0xZZ", TokenKind::PrepNumber, &mut interner);
        let converted = convert_preprocessing_number(tok, &mut interner, &mut diagnostics);
        assert_eq!(converted.value, Some(NumberValue::Signed(0)));
        assert_eq!(diagnostics.error_count, 1);
    }

    #[test]
    fn string_unescapes_and_strips_quotes() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let tok = mk("\"a\\nb\"", TokenKind::PrepString, &mut interner);
        let converted = convert_preprocessing_string(tok, &mut interner);
        assert_eq!(interner.raw(converted.text), "a\nb");
    }

    #[test]
    fn char_literal_value() {
        let bump = Bump::new();
        let mut interner = Interner::new(&bump);
        let tok = mk("'a'", TokenKind::PrepChar, &mut interner);
        let converted = convert_preprocessing_char(tok, &mut interner);
        assert_eq!(converted.value, Some(NumberValue::Signed(b'a' as i64)));
    }
}
