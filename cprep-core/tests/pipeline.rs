//! End-to-end scenarios driving the full pipeline (line assembly,
//! expansion, directive evaluation, post-processing) through the
//! public `Preprocessor` surface, the way a parser actually consumes it.

use bumpalo::Bump;
use cprep_core::error::PrepResult;
use cprep_core::interner::Interner;
use cprep_core::line_source::VecLineSource;
use cprep_core::token::TokenKind;
use cprep_core::Preprocessor;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn run(source: &str) -> PrepResult<Vec<(TokenKind, String)>> {
    let bump = Bump::new();
    let mut interner = Interner::new(&bump);
    let src = VecLineSource::from_text(source);
    let mut pp = Preprocessor::new(Box::new(src), PathBuf::from("<test>"), &mut interner);

    let mut out = Vec::new();
    loop {
        let tok = pp.next()?;
        if tok.kind == TokenKind::End {
            break;
        }
        out.push((tok.kind, interner.raw(tok.text).to_string()));
    }
    Ok(out)
}

fn kinds_and_text(toks: &[(TokenKind, String)]) -> Vec<(TokenKind, &str)> {
    toks.iter().map(|(k, t)| (*k, t.as_str())).collect()
}

#[test]
fn object_like_macro_substitutes_into_expression() {
    let toks = run("#define X 42\nint a = X;\n").unwrap();
    assert_eq!(
        kinds_and_text(&toks),
        vec![
            (TokenKind::Identifier, "int"),
            (TokenKind::Identifier, "a"),
            (TokenKind::Assign, "="),
            (TokenKind::Number, "42"),
            (TokenKind::Semicolon, ";"),
        ]
    );
}

#[test]
fn function_like_invocation_spans_physical_lines() {
    let toks = run("#define ADD(a,b) a+b\nint c = ADD(\n 1 , 2 );\n").unwrap();
    assert_eq!(
        kinds_and_text(&toks),
        vec![
            (TokenKind::Identifier, "int"),
            (TokenKind::Identifier, "c"),
            (TokenKind::Assign, "="),
            (TokenKind::Number, "1"),
            (TokenKind::Plus, "+"),
            (TokenKind::Number, "2"),
            (TokenKind::Semicolon, ";"),
        ]
    );
}

#[test]
fn conditional_block_follows_defined_operator() {
    let toks = run("#define Q\n#if defined(Q)\nA\n#else\nB\n#endif\n").unwrap();
    assert_eq!(kinds_and_text(&toks), vec![(TokenKind::Identifier, "A")]);
}

#[test]
fn ifndef_else_picks_the_undefined_branch() {
    let toks = run("#ifndef Q\nA\n#else\nB\n#endif\n").unwrap();
    assert_eq!(kinds_and_text(&toks), vec![(TokenKind::Identifier, "A")]);
}

#[test]
fn elif_chain_skips_dead_ancestor() {
    let source = "#if 0\n#if 1\nINNER\n#elif 1\nSHOULD_NOT_APPEAR\n#endif\n#endif\n";
    let toks = run(source).unwrap();
    assert!(toks.is_empty());
}

#[test]
fn adjacent_string_literals_merge_into_one_token() {
    let toks = run("\"foo\" \"bar\"\n").unwrap();
    assert_eq!(kinds_and_text(&toks), vec![(TokenKind::String, "foobar")]);
}

#[test]
fn self_referential_macro_expands_exactly_one_hygiene_step() {
    let toks = run("#define F(x) F(x+1)\nF(0)\n").unwrap();
    assert_eq!(
        kinds_and_text(&toks),
        vec![
            (TokenKind::Identifier, "F"),
            (TokenKind::LParen, "("),
            (TokenKind::Number, "0"),
            (TokenKind::Plus, "+"),
            (TokenKind::Number, "1"),
            (TokenKind::RParen, ")"),
        ]
    );
}

#[test]
fn nested_invocation_expands_inner_argument_before_substitution() {
    let toks = run("#define MAX(a,b) ((a)>(b)?(a):(b))\nMAX( MAX(10,12), 20 )\n").unwrap();
    let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
    assert!(!texts.contains(&"MAX"));
    // `a` appears twice in the outer replacement, each substituted with the
    // fully-expanded inner invocation, so its operands show up twice each.
    assert_eq!(texts.iter().filter(|t| **t == "10").count(), 2);
    assert_eq!(texts.iter().filter(|t| **t == "12").count(), 2);
    assert_eq!(texts.iter().filter(|t| **t == "20").count(), 2);
}

#[test]
fn variadic_macro_substitutes_va_args() {
    let toks = run("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\nLOG(\"%d %d\", 1, 2)\n").unwrap();
    let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(texts, vec!["printf", "(", "%d %d", ",", "1", ",", "2", ")"]);
}

#[test]
fn stringify_and_paste_operators() {
    let toks = run("#define STR(x) #x\n#define GLUE(a,b) a##b\nSTR(hello)\nGLUE(fo,o)\n").unwrap();
    assert_eq!(
        kinds_and_text(&toks),
        vec![(TokenKind::String, "hello"), (TokenKind::Identifier, "foo")]
    );
}

#[test]
fn builtin_definition_is_visible_before_first_real_line() {
    let bump = Bump::new();
    let mut interner = Interner::new(&bump);
    let src = VecLineSource::from_text("int a = PLATFORM;\n");
    let mut pp = Preprocessor::new(Box::new(src), PathBuf::from("<test>"), &mut interner);
    pp.define_builtin("PLATFORM", Some("7"));

    let mut out = Vec::new();
    loop {
        let tok = pp.next().unwrap();
        if tok.kind == TokenKind::End {
            break;
        }
        out.push((tok.kind, interner.raw(tok.text).to_string()));
    }
    assert_eq!(
        kinds_and_text(&out),
        vec![
            (TokenKind::Identifier, "int"),
            (TokenKind::Identifier, "a"),
            (TokenKind::Assign, "="),
            (TokenKind::Number, "7"),
            (TokenKind::Semicolon, ";"),
        ]
    );
}

#[test]
fn undef_removes_a_macro_definition() {
    let toks = run("#define X 1\n#undef X\n#ifdef X\nSHOULD_NOT_APPEAR\n#else\nGONE\n#endif\n").unwrap();
    assert_eq!(kinds_and_text(&toks), vec![(TokenKind::Identifier, "GONE")]);
}

#[test]
fn arity_mismatch_is_reported_as_an_error() {
    let err = run("#define ADD(a,b) a+b\nADD(1)\n").unwrap_err();
    assert!(matches!(err, cprep_core::error::ErrorKind::ArityMismatch { .. }));
}

#[test]
fn lookahead_peek_does_not_consume() {
    let bump = Bump::new();
    let mut interner = Interner::new(&bump);
    let src = VecLineSource::from_text("a b c\n");
    let mut pp = Preprocessor::new(Box::new(src), PathBuf::from("<test>"), &mut interner);

    let p1 = pp.peek_at(1).unwrap();
    let p2 = pp.peek_at(2).unwrap();
    assert_eq!(interner.raw(p1.text), "a");
    assert_eq!(interner.raw(p2.text), "b");

    let n1 = pp.next().unwrap();
    let n2 = pp.next().unwrap();
    assert_eq!(interner.raw(n1.text), "a");
    assert_eq!(interner.raw(n2.text), "b");
}

#[test]
fn preprocess_emit_mode_round_trips_against_direct_token_stream() {
    let source = "#define X 42\nint a = X + 1;\n";
    let direct = run(source).unwrap();

    let bump = Bump::new();
    let mut interner = Interner::new(&bump);
    let src = VecLineSource::from_text(source);
    let mut pp = Preprocessor::new(Box::new(src), PathBuf::from("<test>"), &mut interner);
    let mut buf = Vec::new();
    pp.preprocess(&mut buf).unwrap();
    let rendered = String::from_utf8(buf).unwrap();

    // re-tokenizing the `-E` text should reproduce the same (kind, text)
    // stream preprocessing produced directly: nothing left to expand, so
    // it's a pure re-lex of already-final tokens.
    let rerun = run(&rendered).unwrap();
    assert_eq!(kinds_and_text(&direct), kinds_and_text(&rerun));
}

#[test]
fn unbalanced_invocation_is_reported_as_an_error() {
    let err = run("#define ADD(a,b) a+b\nADD(1,2\n").unwrap_err();
    assert!(matches!(err, cprep_core::error::ErrorKind::UnbalancedInvocation));
}

#[test]
fn bad_defined_without_identifier_is_reported_as_an_error() {
    let err = run("#if defined +\nA\n#endif\n").unwrap_err();
    assert!(matches!(err, cprep_core::error::ErrorKind::BadDefined));
}
