//! Parser implementation
//!
//! Recursive descent over the token stream, except for expression bodies
//! where an operator/value stack pair performs precedence climbing.

use crate::ast::{Ast, AstKind, DeclKind};
use csl_common::{CslError, CslResult};
use csl_lexer::{
    CtrlKeyword, DefKeyword, Lexer, OpAssoc, Operator, Separator, Token, TokenKind, ValType,
    Value,
};

/// Parse a compilation unit into a ROOT tree
pub fn parse(source: &str) -> CslResult<Ast> {
    Parser::new(source)?.parse()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    next: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> CslResult<Self> {
        let mut lexer = Lexer::new(source);
        let next = lexer.get_token()?;
        Ok(Self { lexer, next })
    }

    /// Parse a compilation unit.
    ///
    /// ```text
    /// root := (func_def | decl ';' | ';')* EOF
    /// ```
    pub fn parse(&mut self) -> CslResult<Ast> {
        let mut root = Ast::new(AstKind::Root);
        loop {
            if self.check_def(DefKeyword::Def) {
                root.push(self.parse_func_or_decl()?);
            } else if self.check_type() {
                let decl = self.parse_decl()?;
                root.push(decl);
                if !self.check_eof() {
                    self.expect_eol()?;
                }
            } else if self.eat_eol()? {
                continue;
            } else if self.check_eof() {
                break;
            } else if self.check_def(DefKeyword::Class) {
                return Err(self.err("class definitions are not supported"));
            } else {
                return Err(self.err(format!("unrecognized head: {}", self.next.value)));
            }
        }
        Ok(root)
    }

    /// Parse a function definition or forward declaration.
    ///
    /// ```text
    /// func_def := 'def' NAME '(' param_list? ')' (':' TYPE)? (block | ';')
    /// param    := NAME (':' TYPE)?
    /// ```
    fn parse_func_or_decl(&mut self) -> CslResult<Ast> {
        self.expect_def(DefKeyword::Def)?;
        let name = self.expect_name()?;

        let mut head = Ast::new(AstKind::Decl(DeclKind::FuncDecl));
        head.push(Ast::new(AstKind::Name(name)));

        let mut params = Ast::new(AstKind::List);
        self.expect_op(Operator::LBra)?;
        if !self.eat_op(Operator::RBra)? {
            loop {
                let pname = self.expect_name()?;
                let mut param = Ast::new(AstKind::Decl(DeclKind::DeclElem));
                param.push(Ast::new(AstKind::Name(pname)));
                if self.eat_sep(Separator::Colon)? {
                    let ty = self.expect_type()?;
                    param.push(Ast::new(AstKind::Type(ty)));
                }
                params.push(param);
                if !self.eat_sep(Separator::Comma)? {
                    break;
                }
            }
            self.expect_op(Operator::RBra)?;
        }
        head.push(params);

        if self.eat_sep(Separator::Colon)? {
            let ret = self.expect_type()?;
            head.push(Ast::new(AstKind::Type(ret)));
        }

        let mut func = Ast::new(AstKind::Func);
        func.push(head);

        if self.eat_eol()? {
            return Ok(func); // declaration only
        }
        func.push(self.parse_compound_stmt()?);
        Ok(func)
    }

    /// Parse a statement with compound brackets.
    ///
    /// ```text
    /// block := '{' (stmt | decl ';' | ';')* '}'
    /// ```
    fn parse_compound_stmt(&mut self) -> CslResult<Ast> {
        self.expect_sep(Separator::LBrace)?;
        let mut block = Ast::new(AstKind::Block);
        loop {
            if self.eat_sep(Separator::RBrace)? {
                break;
            } else if self.eat_eol()? {
                continue;
            } else if self.check_sep(Separator::LBrace) {
                block.push(self.parse_compound_stmt()?);
            } else if self.check_type() {
                block.push(self.parse_decl()?);
                self.expect_eol()?;
            } else {
                block.push(self.parse_stmt()?);
            }
        }
        Ok(block)
    }

    /// Parse a statement.
    ///
    /// ```text
    /// stmt := block | if_stmt | while_stmt | for_stmt
    ///       | 'break' ';' | 'continue' ';' | 'return' expr? ';'
    ///       | expr ';'
    /// ```
    fn parse_stmt(&mut self) -> CslResult<Ast> {
        if self.eat_ctrl(CtrlKeyword::If)? {
            let mut stmt = Ast::new(AstKind::Ctrl(CtrlKeyword::If));
            self.expect_op(Operator::LBra)?;
            stmt.push(self.parse_expr()?);
            self.expect_op(Operator::RBra)?;
            stmt.push(self.parse_stmt()?);
            if self.eat_ctrl(CtrlKeyword::Else)? {
                stmt.push(self.parse_stmt()?);
            }
            return Ok(stmt);
        }

        if self.eat_ctrl(CtrlKeyword::While)? {
            let mut stmt = Ast::new(AstKind::Ctrl(CtrlKeyword::While));
            self.expect_op(Operator::LBra)?;
            stmt.push(self.parse_expr()?);
            self.expect_op(Operator::RBra)?;
            stmt.push(self.parse_stmt()?);
            return Ok(stmt);
        }

        if self.eat_ctrl(CtrlKeyword::For)? {
            let mut stmt = Ast::new(AstKind::Ctrl(CtrlKeyword::For));
            self.expect_op(Operator::LBra)?;
            if self.check_type() {
                stmt.push(self.parse_decl()?);
            } else {
                stmt.push(self.parse_expr()?);
            }
            self.expect_eol()?;
            stmt.push(self.parse_expr()?);
            self.expect_eol()?;
            stmt.push(self.parse_expr()?);
            self.expect_op(Operator::RBra)?;
            stmt.push(self.parse_stmt()?);
            return Ok(stmt);
        }

        if self.eat_ctrl(CtrlKeyword::Break)? {
            self.expect_eol()?;
            return Ok(Ast::new(AstKind::Ctrl(CtrlKeyword::Break)));
        }
        if self.eat_ctrl(CtrlKeyword::Continue)? {
            self.expect_eol()?;
            return Ok(Ast::new(AstKind::Ctrl(CtrlKeyword::Continue)));
        }

        if self.eat_ctrl(CtrlKeyword::Return)? {
            let mut stmt = Ast::new(AstKind::Ctrl(CtrlKeyword::Return));
            if self.eat_eol()? {
                return Ok(stmt);
            }
            stmt.push(self.parse_expr()?);
            self.expect_eol()?;
            return Ok(stmt);
        }

        if self.check_sep(Separator::LBrace) {
            return self.parse_compound_stmt();
        }

        let expr = self.parse_expr()?;
        self.expect_eol()?;
        Ok(expr)
    }

    /// Parse an expression, including assignment.
    ///
    /// ```text
    /// expr := simple_expr (assign_op expr)?    // right-associative
    /// ```
    ///
    /// An assignment is only accepted when the left side did not climb
    /// through any binary operator (its `maxpred` stayed at postfix level),
    /// which is exactly the lvalue-shaped subset of expressions.
    fn parse_expr(&mut self) -> CslResult<Ast> {
        let (ast, maxpred) = self.parse_simple_expr()?;

        if let Some(op) = self.peek_op() {
            if op.is_binary_assignment() {
                if maxpred > 1 {
                    return Err(self.err("lvalue required for assignment"));
                }
                self.advance()?;
                let rhs = self.parse_expr()?;
                return Ok(Ast::with_children(AstKind::Op(op), vec![ast, rhs]));
            }
        }
        Ok(ast)
    }

    /// Parse an expression without assignment, precedence-climbing style.
    /// Returns the tree and the maximum operator precedence encountered.
    fn parse_simple_expr(&mut self) -> CslResult<(Ast, u8)> {
        let mut op_stack: Vec<Operator> = Vec::new();
        let mut var_stack: Vec<Ast> = Vec::new();
        let mut maxpred = 0u8;

        loop {
            var_stack.push(self.parse_unary_expr()?);

            let Some(op) = self.peek_op() else { break };
            // assignments and right brackets terminate the expression body
            if op.is_binary_assignment() || op == Operator::RBra || op == Operator::RSub {
                break;
            }
            self.advance()?;

            if op.arity() != 2 || op.assoc() != OpAssoc::Left {
                return Err(self.err(format!("incorrect operator: {}", op)));
            }

            let curpred = op.precedence();
            maxpred = maxpred.max(curpred);

            // reduce every stacked operator that binds at least as tightly
            while let Some(&top) = op_stack.last() {
                if curpred >= top.precedence() {
                    if !Self::reduce(&mut op_stack, &mut var_stack) {
                        return Err(self.err("binary operator not match"));
                    }
                } else {
                    break;
                }
            }
            op_stack.push(op);
        }

        while !op_stack.is_empty() {
            if !Self::reduce(&mut op_stack, &mut var_stack) {
                return Err(self.err("binary operator not match"));
            }
        }

        match (var_stack.pop(), var_stack.is_empty()) {
            (Some(ast), true) => Ok((ast, maxpred)),
            _ => Err(self.err("binary operator not match")),
        }
    }

    fn reduce(op_stack: &mut Vec<Operator>, var_stack: &mut Vec<Ast>) -> bool {
        let (Some(op), Some(rv), Some(lv)) = (op_stack.pop(), var_stack.pop(), var_stack.pop())
        else {
            return false;
        };
        var_stack.push(Ast::with_children(AstKind::Op(op), vec![lv, rv]));
        true
    }

    /// Parse a unary expression.
    ///
    /// ```text
    /// unary   := ('++' | '--' | '+' | '-' | 'not') unary | postfix
    /// postfix := primary ('[' expr ']' | '(' args? ')' | '.' NAME | '++' | '--')*
    /// primary := NAME | VAL | '(' expr ')'
    /// ```
    fn parse_unary_expr(&mut self) -> CslResult<Ast> {
        let mut prefix: Vec<Operator> = Vec::new();
        loop {
            if self.eat_op(Operator::Inc)? {
                prefix.push(Operator::Inc);
            } else if self.eat_op(Operator::Dec)? {
                prefix.push(Operator::Dec);
            } else if self.eat_op(Operator::Add)? {
                prefix.push(Operator::Plus);
            } else if self.eat_op(Operator::Sub)? {
                prefix.push(Operator::Minus);
            } else if self.eat_op(Operator::Not)? {
                prefix.push(Operator::Not);
            } else {
                break;
            }
        }

        let mut node = if let Some(name) = self.eat_name()? {
            Ast::new(AstKind::Name(name))
        } else if let Some(value) = self.eat_val()? {
            Ast::new(AstKind::Val(value))
        } else if self.eat_op(Operator::LBra)? {
            let inner = self.parse_expr()?;
            self.expect_op(Operator::RBra)?;
            inner
        } else {
            return Err(self.err(format!("unrecognized token: {}", self.next.value)));
        };

        loop {
            if self.eat_op(Operator::LSub)? {
                let index = self.parse_expr()?;
                self.expect_op(Operator::RSub)?;
                node = Ast::with_children(AstKind::Op(Operator::LSub), vec![node, index]);
            } else if self.eat_op(Operator::LBra)? {
                let mut call = Ast::with_children(AstKind::Call, vec![node]);
                if !self.eat_op(Operator::RBra)? {
                    loop {
                        call.push(self.parse_expr()?);
                        if !self.eat_sep(Separator::Comma)? {
                            break;
                        }
                    }
                    self.expect_op(Operator::RBra)?;
                }
                node = call;
            } else if self.eat_op(Operator::Mber)? {
                let member = self.expect_name()?;
                node = Ast::with_children(
                    AstKind::Op(Operator::Mber),
                    vec![node, Ast::new(AstKind::Name(member))],
                );
            } else if self.eat_op(Operator::Inc)? {
                node = Ast::with_children(AstKind::Op(Operator::PostInc), vec![node]);
            } else if self.eat_op(Operator::Dec)? {
                node = Ast::with_children(AstKind::Op(Operator::PostDec), vec![node]);
            } else {
                break;
            }
        }

        for op in prefix.into_iter().rev() {
            node = Ast::with_children(AstKind::Op(op), vec![node]);
        }
        Ok(node)
    }

    /// Parse a variable declaration without the trailing end-of-statement.
    ///
    /// ```text
    /// decl        := TYPE decl_elem (',' decl_elem)*
    /// decl_elem   := declarator ('=' initializer)?
    /// declarator  := NAME ('[' expr ']')*
    /// ```
    fn parse_decl(&mut self) -> CslResult<Ast> {
        let ty = self.expect_type()?;
        let mut decl = Ast::new(AstKind::Decl(DeclKind::VarDecl));
        decl.push(Ast::new(AstKind::Type(ty)));

        loop {
            let mut elem = Ast::new(AstKind::Decl(DeclKind::DeclElem));
            elem.push(self.parse_declarator()?);
            if self.eat_op(Operator::Asn)? {
                elem.push(self.parse_initializer()?);
            }
            decl.push(elem);
            if !self.eat_sep(Separator::Comma)? {
                break;
            }
        }
        Ok(decl)
    }

    /// Parse a declarator: a name with its array dimensions as children
    fn parse_declarator(&mut self) -> CslResult<Ast> {
        let name = self.expect_name()?;
        let mut declarator = Ast::new(AstKind::Name(name));
        while self.eat_op(Operator::LSub)? {
            let (dim, _) = self.parse_simple_expr()?;
            self.expect_op(Operator::RSub)?;
            declarator.push(dim);
        }
        Ok(declarator)
    }

    /// Parse an initializer.
    ///
    /// ```text
    /// initializer := expr | '{' initializer (',' initializer)* '}'
    /// ```
    fn parse_initializer(&mut self) -> CslResult<Ast> {
        if self.eat_sep(Separator::LBrace)? {
            let mut list = Ast::new(AstKind::List);
            loop {
                list.push(self.parse_initializer()?);
                if !self.eat_sep(Separator::Comma)? {
                    break;
                }
            }
            self.expect_sep(Separator::RBrace)?;
            return Ok(list);
        }
        self.parse_expr()
    }

    // token cursor helpers

    fn advance(&mut self) -> CslResult<Token> {
        let next = self.lexer.get_token()?;
        Ok(std::mem::replace(&mut self.next, next))
    }

    fn err(&self, message: impl Into<String>) -> CslError {
        CslError::syntax(message, self.next.span.start)
    }

    fn peek_op(&self) -> Option<Operator> {
        match &self.next.value {
            TokenKind::Op(op) => Some(*op),
            _ => None,
        }
    }

    fn check_type(&self) -> bool {
        matches!(&self.next.value, TokenKind::Type(_))
    }

    fn check_eof(&self) -> bool {
        matches!(&self.next.value, TokenKind::Eof)
    }

    fn check_def(&self, kwd: DefKeyword) -> bool {
        matches!(&self.next.value, TokenKind::Def(d) if *d == kwd)
    }

    fn check_sep(&self, sep: Separator) -> bool {
        matches!(&self.next.value, TokenKind::Sep(s) if *s == sep)
    }

    fn eat_op(&mut self, op: Operator) -> CslResult<bool> {
        if matches!(&self.next.value, TokenKind::Op(o) if *o == op) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_sep(&mut self, sep: Separator) -> CslResult<bool> {
        if self.check_sep(sep) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_ctrl(&mut self, kwd: CtrlKeyword) -> CslResult<bool> {
        if matches!(&self.next.value, TokenKind::Ctrl(k) if *k == kwd) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_eol(&mut self) -> CslResult<bool> {
        if matches!(&self.next.value, TokenKind::Eol) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_name(&mut self) -> CslResult<Option<String>> {
        if let TokenKind::Name(name) = &self.next.value {
            let name = name.clone();
            self.advance()?;
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn eat_val(&mut self) -> CslResult<Option<Value>> {
        if let TokenKind::Val(value) = &self.next.value {
            let value = *value;
            self.advance()?;
            return Ok(Some(value));
        }
        Ok(None)
    }

    fn eat_type(&mut self) -> CslResult<Option<ValType>> {
        if let TokenKind::Type(ty) = &self.next.value {
            let ty = *ty;
            self.advance()?;
            return Ok(Some(ty));
        }
        Ok(None)
    }

    fn expect_op(&mut self, op: Operator) -> CslResult<()> {
        if !self.eat_op(op)? {
            return Err(self.err(format!("operator not match: {} required, got {}", op, self.next.value)));
        }
        Ok(())
    }

    fn expect_sep(&mut self, sep: Separator) -> CslResult<()> {
        if !self.eat_sep(sep)? {
            return Err(self.err(format!("separator not match: {} required, got {}", sep, self.next.value)));
        }
        Ok(())
    }

    fn expect_eol(&mut self) -> CslResult<()> {
        if !self.eat_eol()? {
            return Err(self.err(format!("token not match: ; required, got {}", self.next.value)));
        }
        Ok(())
    }

    fn expect_def(&mut self, kwd: DefKeyword) -> CslResult<()> {
        if matches!(&self.next.value, TokenKind::Def(d) if *d == kwd) {
            self.advance()?;
            return Ok(());
        }
        Err(self.err(format!("keyword not match: {} required, got {}", kwd, self.next.value)))
    }

    fn expect_name(&mut self) -> CslResult<String> {
        match self.eat_name()? {
            Some(name) => Ok(name),
            None => Err(self.err(format!("name required, got {}", self.next.value))),
        }
    }

    fn expect_type(&mut self) -> CslResult<ValType> {
        match self.eat_type()? {
            Some(ty) => Ok(ty),
            None => Err(self.err(format!("type name required, got {}", self.next.value))),
        }
    }
}
