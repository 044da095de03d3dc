//! Translation of the syntax tree into three-address IR
//!
//! The translator owns all compilation state: the global symbol table, the
//! function table, the per-function register table, lexical scopes, the
//! label pool and the loop-label stack. Lowering walks the tree top-down;
//! expressions return an operand handle and carry an explicit side marker
//! distinguishing storage (LHS) from value (RHS) context.

use crate::eval::eval_op;
use crate::ir::{
    BinOp, CastOp, CmpOp, FunctionBlock, FunctionDef, GlobalInit, GlobalVar, Ident, Inst,
    IrType, LabelId, Module, Operand, RegSlot, Signature,
};
use csl_common::{CslError, CslResult};
use csl_lexer::{CtrlKeyword, Operator, ValType, Value};
use csl_parser::{Ast, AstKind, DeclKind};
use hashbrown::HashMap;

/// Largest allowed element count of a declared array
pub const ARRAY_SIZE_LIMIT: usize = 16384;

/// Translation policy flags
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Lower `and`/`or` with short-circuit blocks joined by phi
    pub lazy_bool: bool,
    /// Allow pointer +/- integer and pointer difference
    pub pointer_arithmetic: bool,
    /// Allow conversion between pointers and integers
    pub pointer_to_val: bool,
    /// Allow an array storage pointer to decay to an element pointer
    pub array_pointer_decay: bool,
    /// Require every declared variable and parameter type to be explicit
    /// and non-void
    pub explicit_type: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            lazy_bool: false,
            pointer_arithmetic: true,
            pointer_to_val: false,
            array_pointer_decay: false,
            explicit_type: true,
        }
    }
}

/// Expression-lowering context: storage handle or computed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lhs,
    Rhs,
}

/// Translate a ROOT tree into a module
pub fn translate(ast: &Ast, options: TranslateOptions) -> CslResult<Module> {
    let mut translator = Translator::new(options);
    translator.translate(ast)?;
    Ok(translator.finish())
}

/// Per-function lowering state
struct FuncCx {
    block: FunctionBlock,
    /// Innermost scope last; maps a name to its pointer register
    scopes: Vec<HashMap<String, usize>>,
    /// Labels awaiting attachment to the next emitted instruction
    pending: Vec<LabelId>,
    /// Register row of the marker created at the most recent address, for
    /// de-duplicating labels that resolve to the same place
    last_marker: Option<(usize, usize)>,
    /// The label of the basic block currently being emitted
    last_label: Option<LabelId>,
    /// (continue target, break target) per enclosing loop
    loop_labels: Vec<(LabelId, LabelId)>,
    ret_ty: ValType,
}

impl Default for FuncCx {
    fn default() -> Self {
        Self {
            block: FunctionBlock::default(),
            scopes: Vec::new(),
            pending: Vec::new(),
            last_marker: None,
            last_label: None,
            loop_labels: Vec::new(),
            ret_ty: ValType::Void,
        }
    }
}

pub struct Translator {
    options: TranslateOptions,
    globals: Vec<GlobalVar>,
    global_syms: HashMap<String, IrType>,
    functions: Vec<FunctionDef>,
    cur: FuncCx,
}

impl Translator {
    pub fn new(options: TranslateOptions) -> Self {
        Self {
            options,
            globals: Vec::new(),
            global_syms: HashMap::new(),
            functions: Vec::new(),
            cur: FuncCx::default(),
        }
    }

    /// Translate a whole compilation unit
    pub fn translate(&mut self, ast: &Ast) -> CslResult<()> {
        if ast.kind != AstKind::Root {
            return Err(CslError::compile("expected a root node"));
        }
        for node in &ast.children {
            match &node.kind {
                AstKind::Decl(DeclKind::VarDecl) => self.translate_global_decl(node)?,
                AstKind::Func => self.translate_function(node)?,
                _ => return Err(CslError::compile("invalid code at top level")),
            }
        }
        Ok(())
    }

    /// Consume the translator, yielding the finished module
    pub fn finish(self) -> Module {
        Module { globals: self.globals, functions: self.functions }
    }

    // function lowering

    fn translate_function(&mut self, ast: &Ast) -> CslResult<()> {
        let (sig, param_names) = self.build_signature(&ast.children[0])?;

        if ast.children.len() == 1 {
            // forward declaration
            self.declare_function(&sig)?;
            return Ok(());
        }

        let func_idx = self.define_function(&sig)?;

        self.cur = FuncCx { ret_ty: sig.ret, ..FuncCx::default() };
        self.cur.scopes.push(HashMap::new());

        // incoming argument value registers occupy the head of the table
        let incoming: Vec<usize> = sig
            .params
            .iter()
            .map(|ty| self.create_reg(IrType::Val(*ty)))
            .collect();

        let entry = self.create_label();
        self.insert_label(entry);

        // every parameter gets a stack slot so that assignment to it works
        // like any other local
        for ((name, ty), arg_reg) in param_names.iter().zip(&sig.params).zip(incoming) {
            let slot = self.create_reg(IrType::ptr(IrType::Val(*ty)));
            self.emit(Inst::Alloc { ret: slot, ty: IrType::Val(*ty) });
            self.emit(Inst::Store {
                value: Operand::Id(Ident::Local(arg_reg)),
                addr: Operand::Id(Ident::Local(slot)),
            });
            self.bind_local(name, slot)?;
        }

        self.translate_stmt(&ast.children[1])?;

        if !matches!(self.cur.block.code.last(), Some(Inst::Ret(_))) {
            if self.cur.ret_ty == ValType::Void {
                self.emit(Inst::Ret(None));
            } else {
                return Err(CslError::compile(format!(
                    "missing return in non-void function '{}'",
                    sig.name
                )));
            }
        }

        self.cur.scopes.pop();
        debug_assert!(self.cur.loop_labels.is_empty());

        self.functions[func_idx].block = Some(std::mem::take(&mut self.cur.block));
        Ok(())
    }

    fn build_signature(&self, head: &Ast) -> CslResult<(Signature, Vec<String>)> {
        let name = head.children[0]
            .name()
            .ok_or_else(|| CslError::compile("invalid function head"))?
            .to_string();

        let mut params = Vec::new();
        let mut param_names = Vec::new();
        for elem in &head.children[1].children {
            let pname = elem.children[0]
                .name()
                .ok_or_else(|| CslError::compile("invalid parameter"))?;
            let ty = match elem.children.get(1).and_then(Ast::val_type) {
                Some(ty) => ty,
                None if self.options.explicit_type => {
                    return Err(CslError::compile(format!(
                        "parameter '{}' requires an explicit type",
                        pname
                    )));
                }
                None => ValType::Void,
            };
            if self.options.explicit_type && ty == ValType::Void {
                return Err(CslError::compile(format!(
                    "void type in parameter '{}'",
                    pname
                )));
            }
            params.push(ty);
            param_names.push(pname.to_string());
        }

        let ret = head.children.get(2).and_then(Ast::val_type).unwrap_or(ValType::Void);
        Ok((Signature { name, params, ret }, param_names))
    }

    /// Admit a signature into the function table. Two functions may share a
    /// name only if their argument-type tuples differ.
    fn declare_function(&mut self, sig: &Signature) -> CslResult<usize> {
        if let Some(idx) = self
            .functions
            .iter()
            .position(|f| f.sig.name == sig.name && f.sig.params == sig.params)
        {
            if self.functions[idx].sig.ret != sig.ret {
                return Err(CslError::compile(format!(
                    "conflicting declaration of function '{}'",
                    sig.name
                )));
            }
            return Ok(idx);
        }
        if self.global_syms.contains_key(&sig.name) {
            return Err(CslError::compile(format!(
                "symbol '{}' is already defined",
                sig.name
            )));
        }
        self.functions.push(FunctionDef { sig: sig.clone(), block: None });
        Ok(self.functions.len() - 1)
    }

    fn define_function(&mut self, sig: &Signature) -> CslResult<usize> {
        let idx = self.declare_function(sig)?;
        if self.functions[idx].block.is_some() {
            return Err(CslError::compile(format!(
                "function '{}' is already defined",
                sig.name
            )));
        }
        Ok(idx)
    }

    // statement lowering

    fn translate_stmt(&mut self, ast: &Ast) -> CslResult<()> {
        match &ast.kind {
            AstKind::Block => {
                self.cur.scopes.push(HashMap::new());
                for node in &ast.children {
                    if self.terminated() {
                        // unreachable tail after break/continue/return
                        break;
                    }
                    match &node.kind {
                        AstKind::Decl(DeclKind::VarDecl) => self.translate_local_decl(node)?,
                        _ => self.translate_stmt(node)?,
                    }
                }
                self.cur.scopes.pop();
                Ok(())
            }
            AstKind::Decl(DeclKind::VarDecl) => self.translate_local_decl(ast),
            AstKind::Ctrl(kwd) => self.translate_ctrl(*kwd, ast),
            _ => {
                self.translate_expr(ast, Side::Rhs)?;
                Ok(())
            }
        }
    }

    fn translate_ctrl(&mut self, kwd: CtrlKeyword, ast: &Ast) -> CslResult<()> {
        match kwd {
            CtrlKeyword::If => {
                let cond = self.translate_cond(&ast.children[0])?;
                let tt = self.create_label();
                let ff = self.create_label();
                self.emit(Inst::CondBr { cond, tt, ff });

                self.insert_label(tt);
                self.translate_stmt(&ast.children[1])?;

                if ast.children.len() == 3 {
                    let end = self.create_label();
                    if !self.terminated() {
                        self.emit(Inst::Br { target: end });
                    }
                    self.insert_label(ff);
                    self.translate_stmt(&ast.children[2])?;
                    if !self.terminated() {
                        self.emit(Inst::Br { target: end });
                    }
                    self.insert_label(end);
                } else {
                    // without an else branch the end label is ff itself
                    if !self.terminated() {
                        self.emit(Inst::Br { target: ff });
                    }
                    self.insert_label(ff);
                }
                Ok(())
            }

            CtrlKeyword::While => {
                let begin = self.create_label();
                let body = self.create_label();
                let end = self.create_label();

                self.emit(Inst::Br { target: begin });
                self.insert_label(begin);
                let cond = self.translate_cond(&ast.children[0])?;
                self.emit(Inst::CondBr { cond, tt: body, ff: end });

                self.cur.loop_labels.push((begin, end));
                self.insert_label(body);
                self.translate_stmt(&ast.children[1])?;
                if !self.terminated() {
                    self.emit(Inst::Br { target: begin });
                }
                self.insert_label(end);
                self.cur.loop_labels.pop();
                Ok(())
            }

            CtrlKeyword::For => {
                // the whole statement, including an init declaration, runs
                // in its own scope
                self.cur.scopes.push(HashMap::new());

                match &ast.children[0].kind {
                    AstKind::Decl(DeclKind::VarDecl) => {
                        self.translate_local_decl(&ast.children[0])?
                    }
                    _ => {
                        self.translate_expr(&ast.children[0], Side::Rhs)?;
                    }
                }

                let begin = self.create_label();
                let body = self.create_label();
                let ctn = self.create_label();
                let end = self.create_label();

                self.emit(Inst::Br { target: begin });
                self.insert_label(begin);
                let cond = self.translate_cond(&ast.children[1])?;
                self.emit(Inst::CondBr { cond, tt: body, ff: end });

                // continue jumps to the step, not the condition
                self.cur.loop_labels.push((ctn, end));
                self.insert_label(body);
                self.translate_stmt(&ast.children[3])?;
                if !self.terminated() {
                    self.emit(Inst::Br { target: ctn });
                }
                self.insert_label(ctn);
                self.translate_expr(&ast.children[2], Side::Rhs)?;
                self.emit(Inst::Br { target: begin });
                self.insert_label(end);
                self.cur.loop_labels.pop();

                self.cur.scopes.pop();
                Ok(())
            }

            CtrlKeyword::Break => {
                let Some(&(_, end)) = self.cur.loop_labels.last() else {
                    return Err(CslError::compile("'break' must be inside loop"));
                };
                self.emit(Inst::Br { target: end });
                Ok(())
            }

            CtrlKeyword::Continue => {
                let Some(&(ctn, _)) = self.cur.loop_labels.last() else {
                    return Err(CslError::compile("'continue' must be inside loop"));
                };
                self.emit(Inst::Br { target: ctn });
                Ok(())
            }

            CtrlKeyword::Return => {
                if self.cur.ret_ty == ValType::Void {
                    if !ast.children.is_empty() {
                        return Err(CslError::compile(
                            "cannot return a value from a void function",
                        ));
                    }
                    self.emit(Inst::Ret(None));
                } else {
                    let Some(expr) = ast.children.first() else {
                        return Err(CslError::compile("return value required"));
                    };
                    let value = self.translate_expr(expr, Side::Rhs)?;
                    let value = self.cast_operand(value, IrType::Val(self.cur.ret_ty))?;
                    self.emit(Inst::Ret(Some(value)));
                }
                Ok(())
            }

            CtrlKeyword::Else => Err(CslError::compile("stray 'else'")),
        }
    }

    /// Lower a branch condition and coerce it to bool
    fn translate_cond(&mut self, ast: &Ast) -> CslResult<Operand> {
        let cond = self.translate_expr(ast, Side::Rhs)?;
        self.cast_operand(cond, IrType::Val(ValType::Bool))
    }

    // expression lowering

    fn translate_expr(&mut self, ast: &Ast, side: Side) -> CslResult<Operand> {
        match &ast.kind {
            AstKind::Op(op) => self.translate_op(ast, *op, side),
            AstKind::Val(value) => {
                if side == Side::Lhs {
                    return Err(CslError::compile("cannot assign to constant"));
                }
                Ok(Operand::Val(*value))
            }
            AstKind::Name(name) => self.translate_var(name, side),
            AstKind::Call => {
                if side == Side::Lhs {
                    return Err(CslError::compile("expression is not assignable"));
                }
                self.translate_call(ast)
            }
            _ => Err(CslError::compile("cannot translate expression")),
        }
    }

    fn translate_var(&mut self, name: &str, side: Side) -> CslResult<Operand> {
        let storage = self
            .cur
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .map(Ident::Local)
            .or_else(|| {
                self.global_syms
                    .contains_key(name)
                    .then(|| Ident::Global(name.to_string()))
            });

        let Some(storage) = storage else {
            if self.functions.iter().any(|f| f.sig.name == name) {
                return Err(CslError::compile(format!(
                    "cannot use function '{}' as a value",
                    name
                )));
            }
            return Err(CslError::compile(format!("variable '{}' not defined", name)));
        };

        match side {
            Side::Lhs => Ok(Operand::Id(storage)),
            Side::Rhs => self.load(Operand::Id(storage)),
        }
    }

    fn translate_call(&mut self, ast: &Ast) -> CslResult<Operand> {
        let callee = &ast.children[0];
        let Some(name) = callee.name() else {
            return Err(CslError::compile(format!("not a function: {}", callee)));
        };

        let mut args = Vec::new();
        for node in &ast.children[1..] {
            args.push(self.translate_expr(node, Side::Rhs)?);
        }

        // resolution is by name against the function table; the first
        // matching signature wins
        let Some(func_idx) = self.functions.iter().position(|f| f.sig.name == name) else {
            if self.global_syms.contains_key(name) {
                return Err(CslError::compile(format!("cannot call variable '{}'", name)));
            }
            return Err(CslError::compile(format!(
                "function '{}' has not been declared",
                name
            )));
        };
        let sig = self.functions[func_idx].sig.clone();

        if args.len() != sig.params.len() {
            return Err(CslError::compile(format!(
                "function '{}' expects {} arguments, got {}",
                name,
                sig.params.len(),
                args.len()
            )));
        }
        let args = args
            .into_iter()
            .zip(&sig.params)
            .map(|(arg, ty)| self.cast_operand(arg, IrType::Val(*ty)))
            .collect::<CslResult<Vec<_>>>()?;

        if sig.ret == ValType::Void {
            self.emit(Inst::Call { ret: None, func: func_idx, args });
            Ok(Operand::Val(Value::Void))
        } else {
            let ret = self.create_reg(IrType::Val(sig.ret));
            self.emit(Inst::Call { ret: Some(ret), func: func_idx, args });
            Ok(Operand::Id(Ident::Local(ret)))
        }
    }

    fn translate_op(&mut self, ast: &Ast, op: Operator, side: Side) -> CslResult<Operand> {
        if op.arity() as usize != ast.children.len() {
            return Err(CslError::compile(format!("operator arity not match: {}", op)));
        }

        if op == Operator::LSub {
            return self.translate_subscript(ast, side);
        }
        if op == Operator::Mber {
            return Err(CslError::compile("member access is not supported"));
        }

        if op.is_assignment() {
            if side == Side::Lhs {
                return Err(CslError::compile("expression is not assignable"));
            }
            return self.translate_assignment(ast, op);
        }

        let lhs = self.translate_expr(&ast.children[0], Side::Rhs)?;

        // unary operators
        if op.arity() == 1 {
            if let Operand::Val(value) = &lhs {
                return eval_op(op, *value, None).map(Operand::Val);
            }
            return match op {
                Operator::Plus => Ok(lhs),
                Operator::Minus => {
                    let ty = self.scalar_type(&lhs)?.max(ValType::Char);
                    let operand = self.cast_operand(lhs, IrType::Val(ty))?;
                    let ret = self.create_reg(IrType::Val(ty));
                    self.emit(Inst::Binary {
                        op: BinOp::Sub,
                        ret,
                        lhs: Operand::Val(Value::zero(ty)),
                        rhs: operand,
                    });
                    Ok(Operand::Id(Ident::Local(ret)))
                }
                Operator::Not => {
                    let operand = self.cast_operand(lhs, IrType::Val(ValType::Bool))?;
                    let ret = self.create_reg(IrType::Val(ValType::Bool));
                    self.emit(Inst::Not { ret, operand });
                    Ok(Operand::Id(Ident::Local(ret)))
                }
                _ => Err(CslError::compile(format!("operator {} is not valid", op))),
            };
        }

        // short-circuit lowering takes over before the right side is touched
        if self.options.lazy_bool && matches!(op, Operator::And | Operator::Or) {
            return self.translate_lazy_bool(op, lhs, &ast.children[1]);
        }

        let rhs = self.translate_expr(&ast.children[1], Side::Rhs)?;

        // constant folding
        if let (Operand::Val(a), Operand::Val(b)) = (&lhs, &rhs) {
            return eval_op(op, *a, Some(*b)).map(Operand::Val);
        }

        if op.is_comparison() {
            let target = self.scalar_type(&lhs)?.max(self.scalar_type(&rhs)?);
            let lhs = self.cast_operand(lhs, IrType::Val(target))?;
            let rhs = self.cast_operand(rhs, IrType::Val(target))?;
            let ret = self.create_reg(IrType::Val(ValType::Bool));
            self.emit(Inst::Cmp { op: cmp_code(op)?, ret, lhs, rhs });
            return Ok(Operand::Id(Ident::Local(ret)));
        }

        if matches!(op, Operator::And | Operator::Or | Operator::Xor) {
            let lhs = self.cast_operand(lhs, IrType::Val(ValType::Bool))?;
            let rhs = self.cast_operand(rhs, IrType::Val(ValType::Bool))?;
            let ret = self.create_reg(IrType::Val(ValType::Bool));
            let code = match op {
                Operator::And => BinOp::And,
                Operator::Or => BinOp::Or,
                _ => BinOp::Xor,
            };
            self.emit(Inst::Binary { op: code, ret, lhs, rhs });
            return Ok(Operand::Id(Ident::Local(ret)));
        }

        // remaining binary arithmetic
        let code = arith_code(op)
            .ok_or_else(|| CslError::compile(format!("operator {} is not valid", op)))?;
        let target = self.arith_target_type(&lhs, &rhs, op)?;
        let lhs = self.cast_arith_operand(lhs, target)?;
        let rhs = self.cast_arith_operand(rhs, target)?;
        let ret = self.create_reg(IrType::Val(target));
        self.emit(Inst::Binary { op: code, ret, lhs, rhs });
        Ok(Operand::Id(Ident::Local(ret)))
    }

    fn translate_assignment(&mut self, ast: &Ast, op: Operator) -> CslResult<Operand> {
        // ++/--, prefix and postfix
        if op.arity() == 1 {
            let addr = self.translate_expr(&ast.children[0], Side::Lhs)?;
            let ty = self.pointee_scalar(&addr)?;
            let old = self.create_reg(IrType::Val(ty));
            self.emit(Inst::Load { ret: old, addr: addr.clone() });
            let code = if matches!(op, Operator::Inc | Operator::PostInc) {
                BinOp::Add
            } else {
                BinOp::Sub
            };
            let ret = self.create_reg(IrType::Val(ty));
            self.emit(Inst::Binary {
                op: code,
                ret,
                lhs: Operand::Id(Ident::Local(old)),
                rhs: Operand::Val(Value::one(ty)),
            });
            self.emit(Inst::Store { value: Operand::Id(Ident::Local(ret)), addr });
            return Ok(Operand::Id(Ident::Local(match op {
                Operator::Inc | Operator::Dec => ret,
                _ => old,
            })));
        }

        // =, +=, -=, ...
        let rhs = self.translate_expr(&ast.children[1], Side::Rhs)?;
        let addr = self.translate_expr(&ast.children[0], Side::Lhs)?;
        let ty = self.pointee_scalar(&addr)?;

        match op {
            Operator::Asn => {
                let value = self.cast_operand(rhs, IrType::Val(ty))?;
                self.emit(Inst::Store { value: value.clone(), addr });
                Ok(value)
            }
            _ => {
                let code = arith_code(op)
                    .ok_or_else(|| CslError::compile(format!("operator {} is not valid", op)))?;
                let old = self.create_reg(IrType::Val(ty));
                self.emit(Inst::Load { ret: old, addr: addr.clone() });
                let rhs = self.cast_operand(rhs, IrType::Val(ty))?;
                let ret = self.create_reg(IrType::Val(ty));
                self.emit(Inst::Binary {
                    op: code,
                    ret,
                    lhs: Operand::Id(Ident::Local(old)),
                    rhs,
                });
                self.emit(Inst::Store { value: Operand::Id(Ident::Local(ret)), addr });
                Ok(Operand::Id(Ident::Local(ret)))
            }
        }
    }

    /// Lower a chain of consecutive subscripts into one GETPTR
    fn translate_subscript(&mut self, ast: &Ast, side: Side) -> CslResult<Operand> {
        let mut index_nodes = Vec::new();
        let mut base = ast;
        while let (AstKind::Op(Operator::LSub), [inner, index]) =
            (&base.kind, base.children.as_slice())
        {
            index_nodes.push(index);
            base = inner;
        }
        index_nodes.reverse();

        let base_val = self.translate_expr(base, Side::Lhs)?;

        // the leading zero selects the aggregate itself
        let mut indices = vec![Operand::Val(Value::Int(0))];
        for node in index_nodes.iter() {
            let index = self.translate_expr(node, Side::Rhs)?;
            indices.push(self.cast_operand(index, IrType::Val(ValType::Int))?);
        }

        let base_ty = self.operand_type(&base_val)?;
        let Some(mut elem) = base_ty.unref().cloned() else {
            return Err(CslError::compile("cannot subscript a non-pointer value"));
        };
        for _ in 0..index_nodes.len() {
            elem = match elem {
                IrType::Array(inner, _) => *inner,
                _ => return Err(CslError::compile("cannot subscript a non-array value")),
            };
        }

        let ptr = self.create_reg(IrType::ptr(elem.clone()));
        self.emit(Inst::GetPtr { ret: ptr, base: base_val, indices });

        match side {
            Side::Lhs => Ok(Operand::Id(Ident::Local(ptr))),
            Side::Rhs => {
                if elem.as_val().is_none() {
                    return Err(CslError::compile("array used as a value"));
                }
                self.load(Operand::Id(Ident::Local(ptr)))
            }
        }
    }

    /// Short-circuit lowering of `and`/`or`: branch around the right side
    /// and join with a phi over the predecessor blocks
    fn translate_lazy_bool(
        &mut self,
        op: Operator,
        lhs: Operand,
        rhs_ast: &Ast,
    ) -> CslResult<Operand> {
        let lhs = self.cast_operand(lhs, IrType::Val(ValType::Bool))?;
        let prev = self.current_label()?;

        let rhs_block = self.create_label();
        let skip = self.create_label();

        match op {
            Operator::And => {
                self.emit(Inst::CondBr { cond: lhs.clone(), tt: rhs_block, ff: skip })
            }
            _ => self.emit(Inst::CondBr { cond: lhs.clone(), tt: skip, ff: rhs_block }),
        }

        self.insert_label(rhs_block);
        let rhs = self.translate_expr(rhs_ast, Side::Rhs)?;
        let rhs = self.cast_operand(rhs, IrType::Val(ValType::Bool))?;
        self.emit(Inst::Br { target: skip });
        // the right side may itself have branched; its value lives in
        // whatever block we are in now
        let rhs_label = self.current_label()?;

        self.insert_label(skip);
        let ret = self.create_reg(IrType::Val(ValType::Bool));
        self.emit(Inst::Phi { ret, pairs: vec![(lhs, prev), (rhs, rhs_label)] });
        Ok(Operand::Id(Ident::Local(ret)))
    }

    // declarations

    fn translate_global_decl(&mut self, ast: &Ast) -> CslResult<()> {
        let base = self.decl_base_type(ast)?;
        for elem in &ast.children[1..] {
            self.translate_global_elem(elem, base)?;
        }
        Ok(())
    }

    fn translate_global_elem(&mut self, elem: &Ast, base: ValType) -> CslResult<()> {
        let (name, shape, full_ty) = self.decl_element(elem, base)?;

        if self.global_syms.contains_key(&name)
            || self.functions.iter().any(|f| f.sig.name == name)
        {
            return Err(CslError::compile(format!(
                "variable '{}' is already defined",
                name
            )));
        }

        let init = if shape.is_empty() {
            match elem.children.get(1) {
                None => GlobalInit::Scalar(Value::zero(base)),
                Some(node) if node.kind == AstKind::List => {
                    return Err(CslError::compile(format!(
                        "cannot initialize scalar '{}' with a list",
                        name
                    )));
                }
                Some(node) => GlobalInit::Scalar(self.eval_ast(node)?.cast(base)?),
            }
        } else {
            match elem.children.get(1) {
                None => GlobalInit::Zero,
                Some(node) => {
                    if node.kind != AstKind::List {
                        return Err(CslError::compile("array must be initialized by list"));
                    }
                    let paths = collect_init_paths(node, &shape)?;
                    let total: usize = shape.iter().product();
                    let mut values = vec![Value::zero(base); total];
                    for (coord, leaf) in paths {
                        let value = self.eval_ast(leaf)?.cast(base)?;
                        values[flat_index(&coord, &shape)] = value;
                    }
                    GlobalInit::Array { shape: shape.clone(), values }
                }
            }
        };

        self.globals.push(GlobalVar { name: name.clone(), ty: full_ty.clone(), init });
        self.global_syms.insert(name, full_ty);
        Ok(())
    }

    fn translate_local_decl(&mut self, ast: &Ast) -> CslResult<()> {
        let base = self.decl_base_type(ast)?;
        for elem in &ast.children[1..] {
            self.translate_local_elem(elem, base)?;
        }
        Ok(())
    }

    fn translate_local_elem(&mut self, elem: &Ast, base: ValType) -> CslResult<()> {
        let (name, shape, full_ty) = self.decl_element(elem, base)?;

        let ptr = self.create_reg(IrType::ptr(full_ty.clone()));
        self.emit(Inst::Alloc { ret: ptr, ty: full_ty });
        self.bind_local(&name, ptr)?;

        let Some(init) = elem.children.get(1) else {
            return Ok(());
        };

        if shape.is_empty() {
            if init.kind == AstKind::List {
                return Err(CslError::compile(format!(
                    "cannot initialize scalar '{}' with a list",
                    name
                )));
            }
            let value = self.translate_expr(init, Side::Rhs)?;
            let value = self.cast_operand(value, IrType::Val(base))?;
            self.emit(Inst::Store { value, addr: Operand::Id(Ident::Local(ptr)) });
            return Ok(());
        }

        if init.kind != AstKind::List {
            return Err(CslError::compile("array must be initialized by list"));
        }
        let paths = collect_init_paths(init, &shape)?;
        let mut lowered = Vec::with_capacity(paths.len());
        for (coord, leaf) in paths {
            let value = self.translate_expr(leaf, Side::Rhs)?;
            lowered.push((coord, value));
        }
        for (coord, value) in lowered {
            let mut indices = vec![Operand::Val(Value::Int(0))];
            indices.extend(coord.iter().map(|&c| Operand::Val(Value::Int(c as i64))));
            let elem_ptr = self.create_reg(IrType::ptr(IrType::Val(base)));
            self.emit(Inst::GetPtr {
                ret: elem_ptr,
                base: Operand::Id(Ident::Local(ptr)),
                indices,
            });
            let value = self.cast_operand(value, IrType::Val(base))?;
            self.emit(Inst::Store { value, addr: Operand::Id(Ident::Local(elem_ptr)) });
        }
        Ok(())
    }

    fn decl_base_type(&self, ast: &Ast) -> CslResult<ValType> {
        let base = ast.children[0]
            .val_type()
            .ok_or_else(|| CslError::compile("invalid declaration"))?;
        if ast.children.len() < 2 {
            return Err(CslError::compile("invalid declaration"));
        }
        if self.options.explicit_type && base == ValType::Void {
            return Err(CslError::compile("void type in declaration"));
        }
        Ok(base)
    }

    /// Resolve a declaration element's name, array shape and full type
    fn decl_element(&self, elem: &Ast, base: ValType) -> CslResult<(String, Vec<usize>, IrType)> {
        let declarator = &elem.children[0];
        let name = declarator
            .name()
            .ok_or_else(|| CslError::compile("invalid declaration"))?
            .to_string();

        let mut shape = Vec::new();
        for dim in &declarator.children {
            let len = self.eval_ast(dim)?;
            if !len.ty().is_integer() {
                return Err(CslError::compile(format!(
                    "array size of '{}' must be an integer",
                    name
                )));
            }
            let len = len.as_i64();
            if len <= 0 {
                return Err(CslError::compile(format!("invalid array size of '{}'", name)));
            }
            shape.push(len as usize);
        }

        if !shape.is_empty() && shape.iter().product::<usize>() > ARRAY_SIZE_LIMIT {
            return Err(CslError::compile(format!(
                "array too large ({})",
                shape.iter().product::<usize>()
            )));
        }

        let mut full_ty = IrType::Val(base);
        for &dim in shape.iter().rev() {
            full_ty = IrType::array(full_ty, dim);
        }
        Ok((name, shape, full_ty))
    }

    /// Evaluate a constant expression tree
    fn eval_ast(&self, ast: &Ast) -> CslResult<Value> {
        match &ast.kind {
            AstKind::Val(value) => Ok(*value),
            AstKind::Op(op) => {
                if op.is_assignment() {
                    return Err(CslError::compile("cannot evaluate assignment"));
                }
                let lhs = self.eval_ast(&ast.children[0])?;
                let rhs = match ast.children.get(1) {
                    Some(node) => Some(self.eval_ast(node)?),
                    None => None,
                };
                eval_op(*op, lhs, rhs)
            }
            _ => Err(CslError::compile("cannot evaluate non-constant expression")),
        }
    }

    // types and casts

    /// Type of an operand as seen by the current function
    fn operand_type(&self, operand: &Operand) -> CslResult<IrType> {
        match operand {
            Operand::Val(value) => Ok(IrType::Val(value.ty())),
            Operand::Id(Ident::Local(idx)) => self
                .cur
                .block
                .reg_type(*idx)
                .cloned()
                .ok_or_else(|| CslError::compile("unknown register")),
            Operand::Id(Ident::Global(name)) => self
                .global_syms
                .get(name)
                .map(|ty| IrType::ptr(ty.clone()))
                .ok_or_else(|| CslError::compile(format!("variable '{}' not defined", name))),
        }
    }

    /// The scalar value type of an operand; pointers and arrays are rejected
    fn scalar_type(&self, operand: &Operand) -> CslResult<ValType> {
        match self.operand_type(operand)? {
            IrType::Val(ValType::Void) => Err(CslError::compile("need value type")),
            IrType::Val(ty) => Ok(ty),
            ty => Err(CslError::compile(format!("need value type, got {}", ty))),
        }
    }

    /// The scalar pointee of a storage operand
    fn pointee_scalar(&self, operand: &Operand) -> CslResult<ValType> {
        let ty = self.operand_type(operand)?;
        match ty.unref() {
            Some(IrType::Val(ty)) if *ty != ValType::Void => Ok(*ty),
            Some(_) => Err(CslError::compile("cannot assign to an array")),
            None => Err(CslError::compile("lvalue required")),
        }
    }

    /// Common target type of a binary arithmetic operation, including the
    /// pointer-arithmetic special cases
    fn arith_target_type(
        &self,
        lhs: &Operand,
        rhs: &Operand,
        op: Operator,
    ) -> CslResult<ValType> {
        let lt = self.operand_type(lhs)?;
        let rt = self.operand_type(rhs)?;

        match (&lt, &rt) {
            (IrType::Val(a), IrType::Val(b)) => {
                if *a == ValType::Void || *b == ValType::Void {
                    return Err(CslError::compile("need value type"));
                }
                Ok((*a).max(*b).max(ValType::Char))
            }
            (IrType::Ptr(a), IrType::Ptr(b)) => {
                if !self.options.pointer_arithmetic {
                    return Err(CslError::compile("pointer arithmetic is disabled"));
                }
                if op != Operator::Sub {
                    return Err(CslError::compile(format!(
                        "operator {} is not valid for pointers",
                        op
                    )));
                }
                if a != b {
                    return Err(CslError::compile("pointer types do not match"));
                }
                Ok(ValType::Int)
            }
            (IrType::Ptr(_), IrType::Val(b)) | (IrType::Val(b), IrType::Ptr(_)) => {
                if !self.options.pointer_arithmetic {
                    return Err(CslError::compile("pointer arithmetic is disabled"));
                }
                if !matches!(op, Operator::Add | Operator::Sub) {
                    return Err(CslError::compile(format!(
                        "operator {} is not valid for pointers",
                        op
                    )));
                }
                if !b.is_integer() {
                    return Err(CslError::compile("pointer offset must be an integer"));
                }
                Ok(ValType::Int)
            }
            _ => Err(CslError::compile("need value type")),
        }
    }

    /// Cast an arithmetic operand to the target scalar type; pointers go
    /// through PTOI under the pointer-arithmetic policy
    fn cast_arith_operand(&mut self, operand: Operand, target: ValType) -> CslResult<Operand> {
        if matches!(self.operand_type(&operand)?, IrType::Ptr(_)) {
            let ret = self.create_reg(IrType::Val(ValType::Int));
            self.emit(Inst::Cast {
                op: CastOp::Ptoi,
                ret,
                value: operand,
                to: IrType::Val(ValType::Int),
            });
            return self.cast_operand(Operand::Id(Ident::Local(ret)), IrType::Val(target));
        }
        self.cast_operand(operand, IrType::Val(target))
    }

    /// Insert an implicit cast from the operand's type to `to`, selecting
    /// the cast opcode by source and destination kind. Constants convert at
    /// compile time.
    fn cast_operand(&mut self, operand: Operand, to: IrType) -> CslResult<Operand> {
        let from = self.operand_type(&operand)?;
        if from == to {
            return Ok(operand);
        }

        if let (Operand::Val(value), IrType::Val(ty)) = (&operand, &to) {
            return Ok(Operand::Val(value.cast(*ty)?));
        }

        match (&from, &to) {
            (IrType::Val(a), IrType::Val(b)) => {
                if *a == ValType::Void || *b == ValType::Void {
                    return Err(CslError::compile(format!("cannot convert {} to {}", a, b)));
                }
                // numeric-to-bool is a comparison against zero so that the
                // result agrees with compile-time truth
                if *b == ValType::Bool {
                    let ret = self.create_reg(IrType::Val(ValType::Bool));
                    self.emit(Inst::Cmp {
                        op: CmpOp::Ne,
                        ret,
                        lhs: operand,
                        rhs: Operand::Val(Value::zero(*a)),
                    });
                    return Ok(Operand::Id(Ident::Local(ret)));
                }
                let op = match (a, b) {
                    (ValType::Float, _) => CastOp::Ftoi,
                    (_, ValType::Float) => CastOp::Itof,
                    (a, b) if a.bit_width() < b.bit_width() => CastOp::Ext,
                    _ => CastOp::Trunc,
                };
                let ret = self.create_reg(to.clone());
                self.emit(Inst::Cast { op, ret, value: operand, to: to.clone() });
                Ok(Operand::Id(Ident::Local(ret)))
            }
            (IrType::Ptr(_), IrType::Val(ValType::Int)) => {
                if !self.options.pointer_to_val {
                    return Err(CslError::compile("pointer conversion is disabled"));
                }
                let ret = self.create_reg(to.clone());
                self.emit(Inst::Cast { op: CastOp::Ptoi, ret, value: operand, to: to.clone() });
                Ok(Operand::Id(Ident::Local(ret)))
            }
            (IrType::Val(ValType::Int), IrType::Ptr(_)) => {
                if !self.options.pointer_to_val {
                    return Err(CslError::compile("pointer conversion is disabled"));
                }
                let ret = self.create_reg(to.clone());
                self.emit(Inst::Cast { op: CastOp::Itop, ret, value: operand, to: to.clone() });
                Ok(Operand::Id(Ident::Local(ret)))
            }
            (IrType::Ptr(inner), IrType::Ptr(elem)) => {
                // an array storage pointer decays to an element pointer
                // through an all-zero GEP
                if let IrType::Array(arr_elem, _) = inner.as_ref() {
                    if arr_elem.as_ref() == elem.as_ref() {
                        if !self.options.array_pointer_decay {
                            return Err(CslError::compile("array decay is disabled"));
                        }
                        let ret = self.create_reg(to.clone());
                        self.emit(Inst::GetPtr {
                            ret,
                            base: operand,
                            indices: vec![
                                Operand::Val(Value::Int(0)),
                                Operand::Val(Value::Int(0)),
                            ],
                        });
                        return Ok(Operand::Id(Ident::Local(ret)));
                    }
                }
                let ret = self.create_reg(to.clone());
                self.emit(Inst::Cast { op: CastOp::Bitc, ret, value: operand, to: to.clone() });
                Ok(Operand::Id(Ident::Local(ret)))
            }
            _ => Err(CslError::compile(format!("cannot convert {} to {}", from, to))),
        }
    }

    /// Load through a storage pointer, returning the loaded register
    fn load(&mut self, addr: Operand) -> CslResult<Operand> {
        let ty = self.operand_type(&addr)?;
        let Some(pointee) = ty.unref().cloned() else {
            return Err(CslError::compile("cannot load a non-pointer value"));
        };
        let ret = self.create_reg(pointee);
        self.emit(Inst::Load { ret, addr });
        Ok(Operand::Id(Ident::Local(ret)))
    }

    // registers, labels and scopes

    fn create_reg(&mut self, ty: IrType) -> usize {
        self.flush_labels();
        self.cur.block.regs.push(RegSlot::Value(ty));
        self.cur.block.regs.len() - 1
    }

    fn emit(&mut self, inst: Inst) {
        self.flush_labels();
        self.cur.block.code.push(inst);
    }

    fn create_label(&mut self) -> LabelId {
        self.cur.block.labels.push(None);
        LabelId(self.cur.block.labels.len() - 1)
    }

    /// Attach a label to the next code to be emitted
    fn insert_label(&mut self, label: LabelId) {
        self.cur.pending.push(label);
    }

    /// Resolve pending labels to the address of the next instruction.
    /// Labels resolving to an address that already carries a marker reuse
    /// the existing marker's register index.
    fn flush_labels(&mut self) {
        if self.cur.pending.is_empty() {
            return;
        }
        let addr = self.cur.block.code.len();
        let reg = match self.cur.last_marker {
            Some((marker_addr, reg)) if marker_addr == addr => reg,
            _ => {
                self.cur.block.regs.push(RegSlot::Label(addr));
                let reg = self.cur.block.regs.len() - 1;
                self.cur.last_marker = Some((addr, reg));
                reg
            }
        };
        for label in self.cur.pending.drain(..) {
            self.cur.block.labels[label.0] = Some(reg);
            self.cur.last_label = Some(label);
        }
    }

    /// The label of the basic block currently being emitted
    fn current_label(&mut self) -> CslResult<LabelId> {
        self.flush_labels();
        self.cur
            .last_label
            .ok_or_else(|| CslError::compile("no basic block is active"))
    }

    /// Whether the current block already ends in a terminator with no
    /// pending label opening a new block
    fn terminated(&self) -> bool {
        self.cur.pending.is_empty()
            && self.cur.block.code.last().is_some_and(Inst::is_terminator)
    }

    fn bind_local(&mut self, name: &str, reg: usize) -> CslResult<()> {
        let scope = self
            .cur
            .scopes
            .last_mut()
            .ok_or_else(|| CslError::compile("no active scope"))?;
        if scope.contains_key(name) {
            return Err(CslError::compile(format!(
                "variable '{}' is already defined",
                name
            )));
        }
        scope.insert(name.to_string(), reg);
        Ok(())
    }
}

/// Arithmetic opcode of an operator; `None` for plain assignment
fn arith_code(op: Operator) -> Option<BinOp> {
    use Operator::*;
    Some(match op {
        Add | AddAsn | Inc | PostInc => BinOp::Add,
        Sub | SubAsn | Dec | PostDec => BinOp::Sub,
        Mul | MulAsn => BinOp::Mul,
        Div | DivAsn => BinOp::Div,
        Rem | RemAsn => BinOp::Rem,
        Pow | PowAsn => BinOp::Pow,
        And => BinOp::And,
        Or => BinOp::Or,
        Xor => BinOp::Xor,
        _ => return None,
    })
}

fn cmp_code(op: Operator) -> CslResult<CmpOp> {
    use Operator::*;
    Ok(match op {
        Eq => CmpOp::Eq,
        Ne => CmpOp::Ne,
        Lt => CmpOp::Lt,
        Le => CmpOp::Le,
        Gt => CmpOp::Gt,
        Ge => CmpOp::Ge,
        _ => return Err(CslError::compile(format!("operator {} is not a comparison", op))),
    })
}

/// Walk a nested initializer list, producing one full index path per leaf.
/// A leaf whose path is shorter than the array rank is treated as a linear
/// index into the trailing dimensions.
fn collect_init_paths<'a>(
    list: &'a Ast,
    shape: &[usize],
) -> CslResult<Vec<(Vec<usize>, &'a Ast)>> {
    fn walk<'a>(node: &'a Ast, coord: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, &'a Ast)>) {
        for (i, child) in node.children.iter().enumerate() {
            coord.push(i);
            if child.kind == AstKind::List {
                walk(child, coord, out);
            } else {
                out.push((coord.clone(), child));
            }
            coord.pop();
        }
    }

    fn unflatten(index: usize, dims: &[usize], coord: &mut Vec<usize>) {
        if dims.len() > 1 {
            coord.push(index / dims[0]);
            unflatten(index % dims[0], &dims[1..], coord);
        } else if dims.len() == 1 {
            coord.push(index);
        }
    }

    let mut raw = Vec::new();
    walk(list, &mut Vec::new(), &mut raw);

    let mut out = Vec::with_capacity(raw.len());
    for (coord, leaf) in raw {
        if coord.len() > shape.len() {
            return Err(CslError::compile("too many nested lists in initializer"));
        }
        let full = if coord.len() < shape.len() {
            let mut full = coord[..coord.len() - 1].to_vec();
            unflatten(coord[coord.len() - 1], &shape[coord.len() - 1..], &mut full);
            full
        } else {
            coord
        };
        for (c, s) in full.iter().zip(shape) {
            if c >= s {
                return Err(CslError::compile("too many values in initialization list"));
            }
        }
        out.push((full, leaf));
    }
    Ok(out)
}

/// Row-major flat index of a full coordinate
fn flat_index(coord: &[usize], shape: &[usize]) -> usize {
    let mut index = 0;
    for (c, s) in coord.iter().zip(shape) {
        index = index * s + c;
    }
    index
}
