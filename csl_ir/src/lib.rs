//! Intermediate representation and code generation for the CSL language
//!
//! The translator lowers the syntax tree into a typed, block-structured
//! three-address IR; the LLVM backend renders that IR to textual LLVM form.

pub mod eval;
pub mod ir;
pub mod llvm_backend;
pub mod translate;

pub use eval::*;
pub use ir::*;
pub use llvm_backend::*;
pub use translate::*;
