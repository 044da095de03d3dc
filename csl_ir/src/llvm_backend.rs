//! Textual LLVM IR emission
//!
//! Renders a translated module to LLVM's textual form: globals first, then
//! `declare` lines for forward-declared functions, then one `define` block
//! per lowered function. Operand types are looked up in the translator's
//! register tables, never re-inferred. After every branch a predecessor
//! comment names the next basic block by the register index of its label
//! marker, which matches LLVM's implicit value numbering.

use crate::ir::{
    BinOp, CastOp, CmpOp, FunctionBlock, GlobalInit, Ident, Inst, IrType, LabelId, Module,
    Operand, Signature,
};
use csl_common::{CslError, CslResult};
use csl_lexer::{ValType, Value};
use std::io::Write;

pub struct LlvmBackend<'a> {
    module: &'a Module,
}

impl<'a> LlvmBackend<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    /// Render the module into a writer. The writer is flushed on success.
    pub fn write<W: Write>(&self, out: &mut W) -> CslResult<()> {
        for global in &self.module.globals {
            let init = match &global.init {
                GlobalInit::Zero => "zeroinitializer".to_string(),
                GlobalInit::Scalar(value) => fmt_value(value),
                GlobalInit::Array { values, .. } => self.fmt_aggregate(&global.ty, values)?,
            };
            writeln!(out, "@{} = global {} {}", global.name, fmt_type(&global.ty), init)?;
        }

        for func in &self.module.functions {
            if func.block.is_none() {
                writeln!(out, "declare {}", fmt_signature(&func.sig))?;
            }
        }

        for func in &self.module.functions {
            let Some(block) = &func.block else { continue };
            writeln!(out)?;
            writeln!(out, "define {} {{", fmt_signature(&func.sig))?;
            for (idx, inst) in block.code.iter().enumerate() {
                writeln!(out, "  {}", self.fmt_inst(block, inst)?)?;
                if matches!(inst, Inst::Br { .. } | Inst::CondBr { .. }) {
                    if let Some(reg) = block.marker_at(idx + 1) {
                        writeln!(out, "; <label>:{}:", reg)?;
                    }
                }
            }
            writeln!(out, "}}")?;
        }

        out.flush()?;
        Ok(())
    }

    /// Render the module to a string
    pub fn emit_to_string(&self) -> CslResult<String> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf).map_err(|_| CslError::io("emitted IR is not valid UTF-8"))
    }

    fn fmt_inst(&self, block: &FunctionBlock, inst: &Inst) -> CslResult<String> {
        match inst {
            Inst::Hlt => Ok("unreachable".to_string()),

            Inst::Ret(None) => Ok("ret void".to_string()),
            Inst::Ret(Some(value)) => Ok(format!("ret {}", self.fmt_typed(block, value)?)),

            Inst::Br { target } => {
                Ok(format!("br label {}", self.label_ref(block, *target)?))
            }
            Inst::CondBr { cond, tt, ff } => Ok(format!(
                "br {}, label {}, label {}",
                self.fmt_typed(block, cond)?,
                self.label_ref(block, *tt)?,
                self.label_ref(block, *ff)?
            )),

            Inst::Alloc { ret, ty } => Ok(format!("%{} = alloca {}", ret, fmt_type(ty))),

            Inst::Load { ret, addr } => {
                let ty = self.reg_type(block, *ret)?;
                Ok(format!(
                    "%{} = load {}, {}",
                    ret,
                    fmt_type(ty),
                    self.fmt_typed(block, addr)?
                ))
            }

            Inst::Store { value, addr } => Ok(format!(
                "store {}, {}",
                self.fmt_typed(block, value)?,
                self.fmt_typed(block, addr)?
            )),

            Inst::GetPtr { ret, base, indices } => {
                let base_ty = self.operand_type(block, base)?;
                let pointee = base_ty
                    .unref()
                    .ok_or_else(|| CslError::compile("getelementptr through a non-pointer"))?;
                let mut line = format!(
                    "%{} = getelementptr {}, {}",
                    ret,
                    fmt_type(pointee),
                    self.fmt_typed(block, base)?
                );
                for index in indices {
                    line.push_str(", ");
                    line.push_str(&self.fmt_typed(block, index)?);
                }
                Ok(line)
            }

            Inst::Binary { op, ret, lhs, rhs } => {
                let ty = self.reg_type(block, *ret)?;
                let is_float = ty.as_val() == Some(ValType::Float);
                let opcode = match (op, is_float) {
                    (BinOp::Add, false) => "add",
                    (BinOp::Add, true) => "fadd",
                    (BinOp::Sub, false) => "sub",
                    (BinOp::Sub, true) => "fsub",
                    (BinOp::Mul, false) => "mul",
                    (BinOp::Mul, true) => "fmul",
                    (BinOp::Div, false) => "sdiv",
                    (BinOp::Div, true) => "fdiv",
                    (BinOp::Rem, false) => "srem",
                    (BinOp::Rem, true) => "frem",
                    (BinOp::And, _) => "and",
                    (BinOp::Or, _) => "or",
                    (BinOp::Xor, _) => "xor",
                    (BinOp::Pow, _) => {
                        return Err(CslError::compile(
                            "operator ^ is not implemented in LLVM IR emission",
                        ));
                    }
                };
                Ok(format!(
                    "%{} = {} {} {}, {}",
                    ret,
                    opcode,
                    fmt_type(ty),
                    fmt_operand(lhs),
                    fmt_operand(rhs)
                ))
            }

            Inst::Not { ret, operand } => {
                Ok(format!("%{} = xor i1 {}, true", ret, fmt_operand(operand)))
            }

            Inst::Cmp { op, ret, lhs, rhs } => {
                let ty = self.operand_type(block, lhs)?;
                let is_float = ty.as_val() == Some(ValType::Float);
                let pred = match (op, is_float) {
                    (CmpOp::Eq, false) => "eq",
                    (CmpOp::Ne, false) => "ne",
                    (CmpOp::Lt, false) => "slt",
                    (CmpOp::Le, false) => "sle",
                    (CmpOp::Gt, false) => "sgt",
                    (CmpOp::Ge, false) => "sge",
                    (CmpOp::Eq, true) => "ueq",
                    (CmpOp::Ne, true) => "une",
                    (CmpOp::Lt, true) => "ult",
                    (CmpOp::Le, true) => "ule",
                    (CmpOp::Gt, true) => "ugt",
                    (CmpOp::Ge, true) => "uge",
                };
                let family = if is_float { "fcmp" } else { "icmp" };
                Ok(format!(
                    "%{} = {} {} {} {}, {}",
                    ret,
                    family,
                    pred,
                    fmt_type(&ty),
                    fmt_operand(lhs),
                    fmt_operand(rhs)
                ))
            }

            Inst::Cast { op, ret, value, to } => {
                let from = self.operand_type(block, value)?;
                let opcode = match op {
                    // widening from i1 must not sign-extend
                    CastOp::Ext if from.as_val() == Some(ValType::Bool) => "zext",
                    CastOp::Ext => "sext",
                    CastOp::Trunc => "trunc",
                    CastOp::Itof => "sitofp",
                    CastOp::Ftoi => "fptosi",
                    CastOp::Itop => "inttoptr",
                    CastOp::Ptoi => "ptrtoint",
                    CastOp::Bitc => "bitcast",
                };
                Ok(format!(
                    "%{} = {} {} to {}",
                    ret,
                    opcode,
                    self.fmt_typed(block, value)?,
                    fmt_type(to)
                ))
            }

            Inst::Phi { ret, pairs } => {
                let ty = self.reg_type(block, *ret)?;
                let mut line = format!("%{} = phi {} ", ret, fmt_type(ty));
                for (i, (value, label)) in pairs.iter().enumerate() {
                    if i > 0 {
                        line.push_str(", ");
                    }
                    line.push_str(&format!(
                        "[ {}, {} ]",
                        fmt_operand(value),
                        self.label_ref(block, *label)?
                    ));
                }
                Ok(line)
            }

            Inst::Call { ret, func, args } => {
                let sig = &self
                    .module
                    .functions
                    .get(*func)
                    .ok_or_else(|| CslError::compile("call to an unknown function"))?
                    .sig;
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    rendered.push(self.fmt_typed(block, arg)?);
                }
                let call = format!(
                    "call {} @{}({})",
                    fmt_val_type(sig.ret),
                    sig.name,
                    rendered.join(", ")
                );
                match ret {
                    Some(reg) => Ok(format!("%{} = {}", reg, call)),
                    None => Ok(call),
                }
            }
        }
    }

    /// Operand rendered with its type, `type value`
    fn fmt_typed(&self, block: &FunctionBlock, operand: &Operand) -> CslResult<String> {
        if let Operand::Val(Value::Void) = operand {
            return Ok("void".to_string());
        }
        let ty = self.operand_type(block, operand)?;
        Ok(format!("{} {}", fmt_type(&ty), fmt_operand(operand)))
    }

    fn operand_type(&self, block: &FunctionBlock, operand: &Operand) -> CslResult<IrType> {
        match operand {
            Operand::Val(value) => Ok(IrType::Val(value.ty())),
            Operand::Id(Ident::Local(idx)) => self.reg_type(block, *idx).cloned(),
            Operand::Id(Ident::Global(name)) => self
                .module
                .global_type(name)
                .ok_or_else(|| CslError::compile(format!("unknown global '{}'", name))),
        }
    }

    fn reg_type<'b>(&self, block: &'b FunctionBlock, idx: usize) -> CslResult<&'b IrType> {
        block
            .reg_type(idx)
            .ok_or_else(|| CslError::compile(format!("unknown register %{}", idx)))
    }

    fn label_ref(&self, block: &FunctionBlock, label: LabelId) -> CslResult<String> {
        block
            .label_reg(label)
            .map(|reg| format!("%{}", reg))
            .ok_or_else(|| CslError::compile("branch to an unresolved label"))
    }

    /// Nested aggregate initializer of a global array
    fn fmt_aggregate(&self, ty: &IrType, values: &[Value]) -> CslResult<String> {
        match ty {
            IrType::Array(elem, size) => {
                if *size == 0 || values.len() % size != 0 {
                    return Err(CslError::compile("malformed array initializer"));
                }
                let chunk = values.len() / size;
                let mut parts = Vec::with_capacity(*size);
                for i in 0..*size {
                    parts.push(format!(
                        "{} {}",
                        fmt_type(elem),
                        self.fmt_aggregate(elem, &values[i * chunk..(i + 1) * chunk])?
                    ));
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            _ => match values.first() {
                Some(value) => Ok(fmt_value(value)),
                None => Err(CslError::compile("malformed array initializer")),
            },
        }
    }
}

/// LLVM spelling of a value type
fn fmt_val_type(ty: ValType) -> &'static str {
    match ty {
        ValType::Void => "void",
        ValType::Bool => "i1",
        ValType::Char => "i8",
        ValType::Int => "i32",
        ValType::Float => "float",
    }
}

/// LLVM spelling of an IR type
fn fmt_type(ty: &IrType) -> String {
    match ty {
        IrType::Val(ty) => fmt_val_type(*ty).to_string(),
        IrType::Ptr(inner) => format!("{}*", fmt_type(inner)),
        IrType::Array(elem, size) => format!("[{} x {}]", size, fmt_type(elem)),
    }
}

/// LLVM spelling of an immediate: integers and bools as decimals, floats
/// as the big-endian hex of their IEEE-754 double encoding
fn fmt_value(value: &Value) -> String {
    match value {
        Value::Void => "void".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Char(c) => format!("{}", c),
        Value::Int(i) => format!("{}", i),
        Value::Float(f) => format!("0x{:016X}", f.to_bits()),
    }
}

fn fmt_operand(operand: &Operand) -> String {
    match operand {
        Operand::Id(id) => format!("{}", id),
        Operand::Val(value) => fmt_value(value),
    }
}

fn fmt_signature(sig: &Signature) -> String {
    let params: Vec<&str> = sig.params.iter().map(|ty| fmt_val_type(*ty)).collect();
    format!("{} @{}({})", fmt_val_type(sig.ret), sig.name, params.join(", "))
}
