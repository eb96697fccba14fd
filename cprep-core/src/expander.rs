use crate::error::{ErrorKind, PrepResult};
use crate::interner::Interner;
use crate::macro_table::{MacroKind, MacroTable};
use crate::token::{Token, TokenKind, TokenList};

/// Scans `line` left to right for one macro invocation to replace.
/// Returns `Ok(true)` if a splice happened (the caller should call again
/// to catch newly-exposed invocations), `Ok(false)` if nothing in the
/// line is currently expandable. A function-like name not yet followed
/// by a complete, balanced argument list is left untouched — the line
/// assembler is responsible for pulling more physical lines and calling
/// back in.
pub fn expand_once(line: &mut TokenList, macros: &MacroTable, interner: &mut Interner) -> PrepResult<bool> {
    let mut i = 0;
    while i < line.len() {
        let tok = *line.get(i).expect("i < len");
        if !tok.is_expandable || tok.disable_expand {
            i += 1;
            continue;
        }
        let Some(def) = macros.lookup(tok.text) else {
            i += 1;
            continue;
        };

        match &def.kind {
            MacroKind::ObjectLike => {
                let replacement = disable_recursion(def.replacement.clone());
                line.splice(i..i + 1, replacement);
                return Ok(true);
            }
            MacroKind::FunctionLike { params, variadic } => {
                let is_open_paren = matches!(line.get(i + 1), Some(t) if t.kind == TokenKind::LParen);
                if !is_open_paren {
                    i += 1;
                    continue;
                }
                let Some((args, close_idx)) = collect_arguments(line.as_slice(), i + 1) else {
                    i += 1;
                    continue;
                };
                let name = interner.raw(def.name).to_string();
                let args = normalize_arity(&name, args, params.len(), *variadic, interner)?;
                let replacement = def.substitute(&args, macros, interner)?;
                let replacement = disable_recursion(replacement);
                line.splice(i..close_idx + 1, replacement);
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Repeatedly applies [`expand_once`] until the token list stops
/// changing. Used both for the top-level logical line and to pre-expand
/// a macro argument before it is substituted into an enclosing call.
pub fn expand_to_fixpoint(tokens: Vec<Token>, macros: &MacroTable, interner: &mut Interner) -> PrepResult<Vec<Token>> {
    let mut list = TokenList::from_vec(tokens);
    while expand_once(&mut list, macros, interner)? {}
    Ok(list.into_vec())
}

fn disable_recursion(mut tokens: Vec<Token>) -> Vec<Token> {
    for tok in &mut tokens {
        tok.disable_expand = true;
    }
    tokens
}

/// Walks forward from the `(` at `open_idx`, splitting top-level commas
/// into separate arguments and tracking nesting depth so commas inside
/// a nested call stay part of one argument. Returns `None` if the
/// parenthesis never balances within the tokens currently available
/// (the line's terminating `Newline` is reached first); that is not an
/// error yet, just a sign more input is needed.
fn collect_arguments(toks: &[Token], open_idx: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut depth = 1;
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut idx = open_idx + 1;

    while idx < toks.len() {
        let tok = toks[idx];
        match tok.kind {
            TokenKind::LParen => {
                depth += 1;
                args.last_mut().expect("nonempty").push(tok);
            }
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some((args, idx));
                }
                args.last_mut().expect("nonempty").push(tok);
            }
            TokenKind::Comma if depth == 1 => {
                args.push(Vec::new());
            }
            TokenKind::Newline => return None,
            _ => args.last_mut().expect("nonempty").push(tok),
        }
        idx += 1;
    }
    None
}

/// A call with no parenthesized content at all, `M()`, collects as one
/// empty argument; for a zero-parameter, non-variadic macro that is the
/// same thing as zero arguments.
fn normalize_arity(
    name: &str,
    mut args: Vec<Vec<Token>>,
    expected: usize,
    variadic: bool,
    interner: &mut Interner,
) -> PrepResult<Vec<Vec<Token>>> {
    if expected == 0 && !variadic && args.len() == 1 && args[0].is_empty() {
        args.clear();
    }

    if variadic {
        if args.len() < expected {
            return Err(ErrorKind::ArityMismatch { name: name.to_string(), expected, got: args.len() });
        }
        if args.len() > expected {
            let tail = args.split_off(expected);
            let comma_sym = interner.intern(",");
            let mut joined = Vec::new();
            for (n, piece) in tail.into_iter().enumerate() {
                if n > 0 {
                    joined.push(Token::new(TokenKind::Comma, comma_sym, 0, 1));
                }
                joined.extend(piece);
            }
            args.push(joined);
        } else {
            args.push(Vec::new());
        }
        Ok(args)
    } else if args.len() == expected {
        Ok(args)
    } else {
        Err(ErrorKind::ArityMismatch { name: name.to_string(), expected, got: args.len() })
    }
}
