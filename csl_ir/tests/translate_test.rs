//! Translation-level tests: symbol resolution, control flow, terminators
//! and type soundness of the emitted IR

use csl_ir::{
    translate, FunctionBlock, Ident, Inst, IrType, Module, Operand, TranslateOptions,
};
use csl_lexer::ValType;
use csl_parser::parse;

fn translate_source(source: &str) -> Result<Module, csl_common::CslError> {
    let ast = parse(source).expect("parse should succeed");
    translate(&ast, TranslateOptions::default())
}

fn module(source: &str) -> Module {
    translate_source(source).expect("translation should succeed")
}

fn operand_type(module: &Module, block: &FunctionBlock, operand: &Operand) -> IrType {
    match operand {
        Operand::Val(value) => IrType::Val(value.ty()),
        Operand::Id(Ident::Local(idx)) => block.reg_type(*idx).expect("typed register").clone(),
        Operand::Id(Ident::Global(name)) => module.global_type(name).expect("known global"),
    }
}

#[test]
fn test_undefined_variable() {
    let err = translate_source("def f(): int { return y; }").unwrap_err();
    assert!(err.to_string().contains("'y' not defined"), "{}", err);
}

#[test]
fn test_redefined_variable_in_scope() {
    let err = translate_source("def f() { int x; int x; }").unwrap_err();
    assert!(err.to_string().contains("already defined"), "{}", err);
    // shadowing in an inner scope is allowed
    module("def f() { int x; { int x; } }");
}

#[test]
fn test_redefined_function() {
    let err = translate_source("def f(): int { return 1; } def f(): int { return 2; }")
        .unwrap_err();
    assert!(err.to_string().contains("already defined"), "{}", err);
}

#[test]
fn test_forward_declaration_then_definition() {
    let m = module("def f(a: int): int; def f(a: int): int { return a; }");
    assert_eq!(m.functions.len(), 1);
    assert!(m.functions[0].block.is_some());
}

#[test]
fn test_overload_by_argument_types() {
    let m = module("def f(a: int): int { return a; } def f(a: float): int { return 1; }");
    assert_eq!(m.functions.len(), 2);
}

#[test]
fn test_break_outside_loop() {
    let err = translate_source("def bad() { break; }").unwrap_err();
    assert!(err.to_string().contains("'break' must be inside loop"), "{}", err);
}

#[test]
fn test_continue_outside_loop() {
    let err = translate_source("def bad() { continue; }").unwrap_err();
    assert!(err.to_string().contains("'continue' must be inside loop"), "{}", err);
}

#[test]
fn test_missing_return_in_non_void() {
    let err = translate_source("def f(): int { int x = 1; }").unwrap_err();
    assert!(err.to_string().contains("missing return"), "{}", err);
}

#[test]
fn test_void_function_gets_synthesized_return() {
    let m = module("def f() { int x = 1; }");
    let block = m.functions[0].block.as_ref().unwrap();
    assert_eq!(block.code.last(), Some(&Inst::Ret(None)));
}

#[test]
fn test_return_value_from_void_function() {
    let err = translate_source("def f() { return 1; }").unwrap_err();
    assert!(err.to_string().contains("void"), "{}", err);
}

#[test]
fn test_bare_return_in_non_void_function() {
    let err = translate_source("def f(): int { return; }").unwrap_err();
    assert!(err.to_string().contains("return value required"), "{}", err);
}

#[test]
fn test_call_undeclared_function() {
    let err = translate_source("def f(): int { return g(); }").unwrap_err();
    assert!(err.to_string().contains("has not been declared"), "{}", err);
}

#[test]
fn test_call_variable() {
    let err = translate_source("int x; def f() { x(); }").unwrap_err();
    assert!(err.to_string().contains("cannot call variable"), "{}", err);
}

#[test]
fn test_argument_count_mismatch() {
    let err =
        translate_source("def g(a: int): int { return a; } def f() { g(1, 2); }").unwrap_err();
    assert!(err.to_string().contains("expects 1 arguments"), "{}", err);
}

#[test]
fn test_assignment_to_constant() {
    let err = translate_source("def f() { 3 = 4; }").unwrap_err();
    assert!(err.to_string().contains("cannot assign to constant"), "{}", err);
}

#[test]
fn test_assignment_to_computed_value() {
    let err = translate_source("def f() { int a; (a + 1) = 2; }").unwrap_err();
    assert!(err.to_string().contains("lvalue required"), "{}", err);
}

#[test]
fn test_array_too_large() {
    let err = translate_source("int a[200][200];").unwrap_err();
    assert!(err.to_string().contains("array too large"), "{}", err);
}

#[test]
fn test_array_initializer_overflow() {
    let err = translate_source("int a[2] = {1, 2, 3};").unwrap_err();
    assert!(
        err.to_string().contains("too many values in initialization list"),
        "{}",
        err
    );
}

#[test]
fn test_subscript_of_scalar() {
    let err = translate_source("def f() { int x; x[0] = 1; }").unwrap_err();
    assert!(err.to_string().contains("subscript"), "{}", err);
}

#[test]
fn test_global_array_needs_list_initializer() {
    let err = translate_source("int a[4] = 0;").unwrap_err();
    assert!(err.to_string().contains("initialized by list"), "{}", err);
}

#[test]
fn test_global_initializer_must_be_constant() {
    let err = translate_source("int x = 1; int y = x;").unwrap_err();
    assert!(err.to_string().contains("non-constant"), "{}", err);
}

#[test]
fn test_void_declaration_rejected() {
    let err = translate_source("def f() { void x; }").unwrap_err();
    assert!(err.to_string().contains("void type"), "{}", err);
}

#[test]
fn test_parameter_requires_type() {
    let err = translate_source("def f(a) { }").unwrap_err();
    assert!(err.to_string().contains("explicit type"), "{}", err);
}

#[test]
fn test_member_access_unsupported() {
    let err = translate_source("def f() { int x; x.y = 1; }").unwrap_err();
    assert!(err.to_string().contains("member access"), "{}", err);
}

#[test]
fn test_for_init_declaration_is_loop_scoped() {
    // `i` is not visible after the loop
    let err = translate_source(
        "def f(): int { for (int i = 0; i < 3; i = i + 1) { } return i; }",
    )
    .unwrap_err();
    assert!(err.to_string().contains("'i' not defined"), "{}", err);
}

#[test]
fn test_terminators_close_every_block() {
    let m = module(
        "def f(n: int): int {
            int s = 0;
            for (int i = 0; i < n; i = i + 1) {
                if (i % 2 == 0) { s = s + i; } else { s = s - 1; }
                while (s > 100) { s = s - 10; }
            }
            return s;
        }",
    );
    let block = m.functions[0].block.as_ref().unwrap();
    assert!(block.code.last().unwrap().is_terminator());
    // every labeled block (except the entry) is entered by a jump, never by
    // fallthrough: the instruction before each marker is a terminator
    for addr in 1..block.code.len() {
        if block.marker_at(addr).is_some() {
            assert!(
                block.code[addr - 1].is_terminator(),
                "fallthrough into block at {}",
                addr
            );
        }
    }
}

#[test]
fn test_load_store_type_soundness() {
    let m = module(
        "int g = 2;
        def f(a: float, n: int): float {
            float t[4] = { 1.5, 2.5, 3.5, 4.5 };
            t[n] = a + g;
            return t[0];
        }",
    );
    let block = m.functions[0].block.as_ref().unwrap();
    for inst in &block.code {
        match inst {
            Inst::Load { ret, addr } => {
                let ret_ty = block.reg_type(*ret).unwrap().clone();
                let addr_ty = operand_type(&m, block, addr);
                assert_eq!(addr_ty.unref(), Some(&ret_ty));
            }
            Inst::Store { value, addr } => {
                let value_ty = operand_type(&m, block, value);
                let addr_ty = operand_type(&m, block, addr);
                assert_eq!(addr_ty.unref(), Some(&value_ty));
            }
            Inst::Binary { ret, lhs, rhs, .. } => {
                let ret_ty = block.reg_type(*ret).unwrap().clone();
                assert_eq!(operand_type(&m, block, lhs), ret_ty);
                assert_eq!(operand_type(&m, block, rhs), ret_ty);
            }
            _ => {}
        }
    }
}

#[test]
fn test_branch_labels_resolve() {
    let m = module("def f(n: int): int { while (n > 0) { n = n - 1; } return n; }");
    let block = m.functions[0].block.as_ref().unwrap();
    for inst in &block.code {
        match inst {
            Inst::Br { target } => assert!(block.label_reg(*target).is_some()),
            Inst::CondBr { tt, ff, .. } => {
                assert!(block.label_reg(*tt).is_some());
                assert!(block.label_reg(*ff).is_some());
            }
            _ => {}
        }
    }
}

#[test]
fn test_global_scalar_constant_folding() {
    let m = module("int x = 3 + 4 * 2;");
    assert_eq!(m.globals.len(), 1);
    assert_eq!(m.globals[0].ty, IrType::Val(ValType::Int));
    match &m.globals[0].init {
        csl_ir::GlobalInit::Scalar(value) => {
            assert_eq!(*value, csl_lexer::Value::Int(11));
        }
        init => panic!("unexpected initializer {:?}", init),
    }
}

#[test]
fn test_flat_initializer_unflattens() {
    // a leaf with a short path indexes the trailing dimensions linearly
    let m = module("int a[2][3] = { 1, 2 };");
    match &m.globals[0].init {
        csl_ir::GlobalInit::Array { shape, values } => {
            assert_eq!(shape, &vec![2, 3]);
            // linear index i maps to [i / 2, i % 2]
            assert_eq!(values[0], csl_lexer::Value::Int(1));
            assert_eq!(values[1], csl_lexer::Value::Int(2));
            assert_eq!(values[2], csl_lexer::Value::Int(0));
        }
        init => panic!("unexpected initializer {:?}", init),
    }
}

#[test]
fn test_parameter_assignment_through_slot() {
    // parameters are spilled to stack slots, so assigning one works
    let m = module("def f(a: int): int { a = a + 1; return a; }");
    let block = m.functions[0].block.as_ref().unwrap();
    let stores = block
        .code
        .iter()
        .filter(|inst| matches!(inst, Inst::Store { .. }))
        .count();
    assert_eq!(stores, 2); // incoming spill + the assignment
}
