//! Intermediate representation definitions
//!
//! Registers and labels of a function share one table indexed by integer,
//! so instructions reference labels the same way they reference registers.
//! Label resolution goes through a per-function pool: branches hold pool
//! ids, and the pool maps each id to the register-table row of the label
//! marker once the label's target address is known.

use csl_lexer::{ValType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of an IR operand or register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrType {
    Val(ValType),
    Ptr(Box<IrType>),
    Array(Box<IrType>, usize),
}

impl IrType {
    pub fn ptr(inner: IrType) -> IrType {
        IrType::Ptr(Box::new(inner))
    }

    pub fn array(elem: IrType, size: usize) -> IrType {
        IrType::Array(Box::new(elem), size)
    }

    /// The pointee of a pointer type
    pub fn unref(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// The scalar value type, if this is one
    pub fn as_val(&self) -> Option<ValType> {
        match self {
            IrType::Val(ty) => Some(*ty),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Val(ty) => write!(f, "{}", ty),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
            IrType::Array(elem, size) => write!(f, "[{} x {}]", size, elem),
        }
    }
}

/// A reference to storage: a local register index or a global name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ident {
    Local(usize),
    Global(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Local(idx) => write!(f, "%{}", idx),
            Ident::Global(name) => write!(f, "@{}", name),
        }
    }
}

/// An instruction operand: either a storage reference or an immediate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Id(Ident),
    Val(Value),
}

impl From<Ident> for Operand {
    fn from(id: Ident) -> Self {
        Operand::Id(id)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Val(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Id(id) => write!(f, "{}", id),
            Operand::Val(v) => write!(f, "{}", v),
        }
    }
}

/// An unresolved label reference into a function's label pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelId(pub usize);

/// A row of the per-function register table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegSlot {
    /// A value register holding one typed result
    Value(IrType),
    /// A label marker carrying its target code offset
    Label(usize),
}

/// Binary arithmetic and bitwise opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    And,
    Or,
    Xor,
}

/// Comparison opcodes; signed for integers, unordered for floats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Cast opcodes, selected by source and destination kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOp {
    Ext,
    Trunc,
    Itof,
    Ftoi,
    Itop,
    Ptoi,
    Bitc,
}

/// A three-address instruction, one variant per opcode family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inst {
    /// Halt; rendered as `unreachable`
    Hlt,
    /// Return, with `None` standing for `ret void`
    Ret(Option<Operand>),
    /// Unconditional branch
    Br { target: LabelId },
    /// Conditional branch
    CondBr { cond: Operand, tt: LabelId, ff: LabelId },
    /// Binary arithmetic/bitwise operation
    Binary { op: BinOp, ret: usize, lhs: Operand, rhs: Operand },
    /// Logical negation of a bool operand
    Not { ret: usize, operand: Operand },
    /// Comparison producing a bool
    Cmp { op: CmpOp, ret: usize, lhs: Operand, rhs: Operand },
    /// Reserve a stack slot of the given type
    Alloc { ret: usize, ty: IrType },
    /// Load through a pointer
    Load { ret: usize, addr: Operand },
    /// Store through a pointer
    Store { value: Operand, addr: Operand },
    /// Indexed address computation; the leading zero index is included
    GetPtr { ret: usize, base: Operand, indices: Vec<Operand> },
    /// Explicit type conversion
    Cast { op: CastOp, ret: usize, value: Operand, to: IrType },
    /// Control-flow merge of per-predecessor values
    Phi { ret: usize, pairs: Vec<(Operand, LabelId)> },
    /// Function call; `func` indexes the module's function table and
    /// `ret` is absent for void-returning calls
    Call { ret: Option<usize>, func: usize, args: Vec<Operand> },
}

impl Inst {
    /// Whether this instruction always transfers control away
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Hlt | Inst::Ret(_) | Inst::Br { .. } | Inst::CondBr { .. })
    }
}

/// A function signature: the triple identifying a function uniquely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ValType>,
    pub ret: ValType,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// The lowered body of one function: an ordered register table (value
/// registers and label markers interleaved), the code sequence, and the
/// label pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionBlock {
    pub regs: Vec<RegSlot>,
    pub code: Vec<Inst>,
    /// Pool id -> register-table row of the resolved label marker.
    /// Unreferenced labels may stay unresolved.
    pub labels: Vec<Option<usize>>,
}

impl FunctionBlock {
    /// Type of a value register
    pub fn reg_type(&self, idx: usize) -> Option<&IrType> {
        match self.regs.get(idx) {
            Some(RegSlot::Value(ty)) => Some(ty),
            _ => None,
        }
    }

    /// The register-table row of a resolved label
    pub fn label_reg(&self, label: LabelId) -> Option<usize> {
        self.labels.get(label.0).copied().flatten()
    }

    /// The register-table row of the label marker resolved to `addr`
    pub fn marker_at(&self, addr: usize) -> Option<usize> {
        self.regs
            .iter()
            .position(|slot| matches!(slot, RegSlot::Label(a) if *a == addr))
    }
}

/// How a global variable is initialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GlobalInit {
    /// All-zero contents
    Zero,
    Scalar(Value),
    /// Row-major flattened array contents
    Array { shape: Vec<usize>, values: Vec<Value> },
}

/// A global variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVar {
    pub name: String,
    pub ty: IrType,
    pub init: GlobalInit,
}

/// A function-table entry: a signature, optionally carrying a lowered body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub sig: Signature,
    pub block: Option<FunctionBlock>,
}

/// A fully translated compilation unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<FunctionDef>,
}

impl Module {
    /// Type of a global variable's storage (a pointer to its declared type)
    pub fn global_type(&self, name: &str) -> Option<IrType> {
        self.globals
            .iter()
            .find(|g| g.name == name)
            .map(|g| IrType::ptr(g.ty.clone()))
    }
}
