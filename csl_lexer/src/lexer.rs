//! The CSL tokenizer
//!
//! Tokenization is greedy longest-match against an ordered set of anchored
//! regular patterns: whitespace, end-of-statement, numeric literal,
//! operator, separator, identifier. Identifiers are cross-checked against
//! the keyword tables. A token queue with two cursors provides arbitrary
//! lookahead on top of single-token fetching.

use crate::keyword::Separator;
use crate::op::Operator;
use crate::reader::StrReader;
use crate::token::{Token, TokenKind};
use crate::value::Value;
use csl_common::{CslError, CslResult, Position, Span};
use regex::Regex;
use std::collections::VecDeque;

pub struct Lexer<'a> {
    reader: StrReader<'a>,
    // tokens fetched but not yet consumed; index 0 is the next get position
    queue: VecDeque<Token>,
    next_get_pos: usize,
    next_look_pos: usize,
    patterns: Patterns,
}

struct Patterns {
    ws: Regex,
    eol: Regex,
    val: Regex,
    op: Regex,
    sep: Regex,
    id: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            ws: Regex::new(r"\A[ \t\r\n]+").unwrap(),
            eol: Regex::new(r"\A;").unwrap(),
            val: Regex::new(r"\A(\d*\.)?\d+([eE][+-]?\d+)?").unwrap(),
            // multi-character operators before their prefixes
            op: Regex::new(r"\A(\+\+|--|==|!=|<=|>=|\+=|-=|\*=|/=|%=|\^=|[-+*/%^=<>.()\[\]])")
                .unwrap(),
            sep: Regex::new(r"\A[{},:]").unwrap(),
            id: Regex::new(r"\A[A-Za-z_]\w*").unwrap(),
        }
    }
}

/// Match an anchored pattern at the cursor. On success the cursor moves past
/// the match and the matched slice is returned.
fn match_at<'a>(reader: &mut StrReader<'a>, re: &Regex) -> Option<&'a str> {
    let rest = reader.rest();
    let m = re.find(rest)?;
    reader.advance(m.end());
    Some(&rest[..m.end()])
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            reader: StrReader::new(input),
            queue: VecDeque::new(),
            next_get_pos: 0,
            next_look_pos: 0,
            patterns: Patterns::new(),
        }
    }

    /// The position the lexer has read up to
    pub fn pos(&self) -> Position {
        self.reader.position()
    }

    /// Get the next token after the last `get_token`, regardless of how far
    /// the look cursor has advanced. Resets the look cursor.
    pub fn get_token(&mut self) -> CslResult<Token> {
        let token = match self.queue.pop_front() {
            Some(token) => token,
            None => self.next_token()?,
        };
        self.next_get_pos += 1;
        self.next_look_pos = self.next_get_pos;
        Ok(token)
    }

    /// Look one token further ahead without consuming anything
    pub fn look_ahead(&mut self) -> CslResult<Token> {
        let buf_idx = self.next_look_pos - self.next_get_pos;
        if buf_idx == self.queue.len() {
            let token = self.next_token()?;
            self.queue.push_back(token);
        }
        self.next_look_pos += 1;
        Ok(self.queue[buf_idx].clone())
    }

    /// Step the look cursor back by one token
    pub fn unlook_ahead(&mut self) {
        assert!(self.next_look_pos > self.next_get_pos, "cannot unlook");
        self.next_look_pos -= 1;
    }

    /// Batch-consume every token between the get cursor and the look cursor
    pub fn get_all(&mut self) -> Vec<Token> {
        let n = (self.next_look_pos - self.next_get_pos).min(self.queue.len());
        self.next_get_pos += n;
        self.queue.drain(..n).collect()
    }

    /// Lex one token from the unread input
    fn next_token(&mut self) -> CslResult<Token> {
        let _ = match_at(&mut self.reader, &self.patterns.ws);

        let start = self.reader.position();
        if self.reader.eof() {
            return Ok(Token::new(TokenKind::Eof, Span::single(start)));
        }

        if match_at(&mut self.reader, &self.patterns.eol).is_some() {
            return Ok(self.token(TokenKind::Eol, start));
        }
        if let Some(text) = match_at(&mut self.reader, &self.patterns.val) {
            let value = Value::parse(text)?;
            return Ok(self.token(TokenKind::Val(value), start));
        }
        if let Some(text) = match_at(&mut self.reader, &self.patterns.op) {
            let op = Operator::from_symbol(text)
                .ok_or_else(|| CslError::syntax(format!("unrecognized operator: {}", text), start))?;
            return Ok(self.token(TokenKind::Op(op), start));
        }
        if let Some(text) = match_at(&mut self.reader, &self.patterns.sep) {
            let sep = Separator::from_symbol(text)
                .ok_or_else(|| CslError::syntax(format!("unrecognized separator: {}", text), start))?;
            return Ok(self.token(TokenKind::Sep(sep), start));
        }
        if let Some(text) = match_at(&mut self.reader, &self.patterns.id) {
            return Ok(self.token(TokenKind::from_ident(text), start));
        }

        let next = self.reader.rest().chars().next().unwrap_or('\0');
        Err(CslError::syntax(format!("unrecognized token: {:?}", next), start))
    }

    fn token(&self, kind: TokenKind, start: Position) -> Token {
        Token::new(kind, Span::new(start, self.reader.position()))
    }
}
