//! Integration tests for the CSL lexer

use csl_lexer::{
    CtrlKeyword, DefKeyword, Lexer, Operator, Separator, TokenKind, ValType, Value,
};
use pretty_assertions::assert_eq;

fn kinds(source: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(source);
    let mut out = Vec::new();
    loop {
        let token = lexer.get_token().expect("tokenization should succeed");
        let eof = matches!(token.value, TokenKind::Eof);
        out.push(token.value);
        if eof {
            break;
        }
    }
    out
}

#[test]
fn test_basic_statement() {
    assert_eq!(
        kinds("int x = 3;"),
        vec![
            TokenKind::Type(ValType::Int),
            TokenKind::Name("x".to_string()),
            TokenKind::Op(Operator::Asn),
            TokenKind::Val(Value::Int(3)),
            TokenKind::Eol,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_function_head() {
    assert_eq!(
        kinds("def add(a: int, b: int): int {"),
        vec![
            TokenKind::Def(DefKeyword::Def),
            TokenKind::Name("add".to_string()),
            TokenKind::Op(Operator::LBra),
            TokenKind::Name("a".to_string()),
            TokenKind::Sep(Separator::Colon),
            TokenKind::Type(ValType::Int),
            TokenKind::Sep(Separator::Comma),
            TokenKind::Name("b".to_string()),
            TokenKind::Sep(Separator::Colon),
            TokenKind::Type(ValType::Int),
            TokenKind::Op(Operator::RBra),
            TokenKind::Sep(Separator::Colon),
            TokenKind::Type(ValType::Int),
            TokenKind::Sep(Separator::LBrace),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_maximal_munch_operators() {
    assert_eq!(
        kinds("a+++b"),
        vec![
            TokenKind::Name("a".to_string()),
            TokenKind::Op(Operator::Inc),
            TokenKind::Op(Operator::Add),
            TokenKind::Name("b".to_string()),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds("a<=b"),
        vec![
            TokenKind::Name("a".to_string()),
            TokenKind::Op(Operator::Le),
            TokenKind::Name("b".to_string()),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds("x %= 2"),
        vec![
            TokenKind::Name("x".to_string()),
            TokenKind::Op(Operator::RemAsn),
            TokenKind::Val(Value::Int(2)),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_numeric_literals() {
    assert_eq!(
        kinds("42 3.5 .5 1e3 2.5e-2"),
        vec![
            TokenKind::Val(Value::Int(42)),
            TokenKind::Val(Value::Float(3.5)),
            TokenKind::Val(Value::Float(0.5)),
            TokenKind::Val(Value::Float(1000.0)),
            TokenKind::Val(Value::Float(0.025)),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_member_vs_float() {
    // a trailing dot after digits stays with the number only if followed
    // by more digits; `5.` is a value then a member operator
    assert_eq!(
        kinds("a.b"),
        vec![
            TokenKind::Name("a".to_string()),
            TokenKind::Op(Operator::Mber),
            TokenKind::Name("b".to_string()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_keyword_priority() {
    assert_eq!(kinds("if")[0], TokenKind::Ctrl(CtrlKeyword::If));
    assert_eq!(kinds("def")[0], TokenKind::Def(DefKeyword::Def));
    assert_eq!(kinds("float")[0], TokenKind::Type(ValType::Float));
    assert_eq!(kinds("and")[0], TokenKind::Op(Operator::And));
    assert_eq!(kinds("not")[0], TokenKind::Op(Operator::Not));
    // prefixes of keywords are plain names
    assert_eq!(kinds("iff")[0], TokenKind::Name("iff".to_string()));
    assert_eq!(kinds("intx")[0], TokenKind::Name("intx".to_string()));
}

#[test]
fn test_lookahead_queue() {
    let mut lexer = Lexer::new("a b c");
    assert_eq!(lexer.look_ahead().unwrap().value, TokenKind::Name("a".into()));
    assert_eq!(lexer.look_ahead().unwrap().value, TokenKind::Name("b".into()));
    // get_token is unaffected by lookahead and resets the look cursor
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Name("a".into()));
    assert_eq!(lexer.look_ahead().unwrap().value, TokenKind::Name("b".into()));
    lexer.unlook_ahead();
    assert_eq!(lexer.look_ahead().unwrap().value, TokenKind::Name("b".into()));
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Name("b".into()));
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Name("c".into()));
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Eof);
}

#[test]
fn test_get_all_batch_consumes() {
    let mut lexer = Lexer::new("x y z");
    lexer.look_ahead().unwrap();
    lexer.look_ahead().unwrap();
    let batch = lexer.get_all();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].value, TokenKind::Name("x".into()));
    assert_eq!(batch[1].value, TokenKind::Name("y".into()));
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Name("z".into()));
}

#[test]
fn test_span_round_trip() {
    // concatenating token source slices reproduces the input modulo whitespace
    let source = "def main ( ) : int { return 1 + 2 ; }";
    let mut lexer = Lexer::new(source);
    let mut pieces = Vec::new();
    loop {
        let token = lexer.get_token().unwrap();
        if matches!(token.value, TokenKind::Eof) {
            break;
        }
        pieces.push(&source[token.span.start.offset..token.span.end.offset]);
    }
    let joined = pieces.join("");
    let stripped: String = source.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!(joined, stripped);
}

#[test]
fn test_unrecognized_input_reports_offset() {
    let mut lexer = Lexer::new("x = @");
    lexer.get_token().unwrap();
    lexer.get_token().unwrap();
    let err = lexer.get_token().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("offset 4"), "{}", msg);
}

#[test]
fn test_eof_is_repeatable() {
    let mut lexer = Lexer::new("");
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Eof);
    assert_eq!(lexer.get_token().unwrap().value, TokenKind::Eof);
}
