//! Constant-expression evaluation (spec.md §4.1 / §4.3 point 1): global
//! initializers and data/element offsets are evaluated over the small
//! `{const, global.get, ref.null, ref.func, end}` subset, plus the
//! extended-const arithmetic the bulk-memory proposal allows.

use crate::decode::Module;
use crate::error::CompileError;
use crate::opcode::{Instr, InstrReader};

/// A constant value produced by evaluating an init expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// A reference: either a function index (`ref.func`) or null.
    RefFunc(Option<u32>),
    RefNull,
}

/// Evaluate a raw init-expression byte sequence. `func_idx` identifies the
/// owning construct purely for diagnostics (e.g. which global failed).
pub fn eval_const_expr(module: &Module, bytes: &[u8], context_idx: u32) -> Result<ConstValue, CompileError> {
    let mut reader = InstrReader::new(bytes);
    let mut stack: Vec<ConstValue> = Vec::new();

    loop {
        let (offset, instr) = match reader.next() {
            Ok(Some(pair)) => pair,
            Ok(None) => break,
            Err(e) => {
                return Err(CompileError::new(context_idx, e.offset, None, e.message));
            }
        };
        match instr {
            Instr::End => break,
            Instr::I32Const(v) => stack.push(ConstValue::I32(v)),
            Instr::I64Const(v) => stack.push(ConstValue::I64(v)),
            Instr::F32Const(v) => stack.push(ConstValue::F32(v)),
            Instr::F64Const(v) => stack.push(ConstValue::F64(v)),
            Instr::RefNull(_) => stack.push(ConstValue::RefNull),
            Instr::RefFunc(idx) => stack.push(ConstValue::RefFunc(Some(idx))),
            Instr::RefIsNull => {
                let v = pop(&mut stack, context_idx, offset)?;
                let is_null = matches!(v, ConstValue::RefNull);
                stack.push(ConstValue::I32(is_null as i32));
            }
            Instr::GlobalGet(idx) => {
                // Per spec.md §9's Open Question: an imported global's init
                // value is not known at compile time, so it evaluates to
                // zero and the runtime is expected to populate it later.
                // A defined global referenced here must itself be an
                // immutable import per the core wasm validation rules;
                // this core does not re-evaluate its initializer
                // transitively, matching the "load zero" policy.
                let _ = idx;
                stack.push(ConstValue::I32(0));
            }
            Instr::BinOp(ty, op) => {
                let rhs = pop(&mut stack, context_idx, offset)?;
                let lhs = pop(&mut stack, context_idx, offset)?;
                stack.push(eval_extended_const_binop(ty, op, lhs, rhs, context_idx, offset)?);
            }
            other => {
                return Err(CompileError::new(
                    context_idx,
                    offset,
                    None,
                    format!("opcode {other:?} is not valid in a constant expression"),
                ));
            }
        }
    }

    pop(&mut stack, context_idx, bytes.len())
}

fn pop(stack: &mut Vec<ConstValue>, func_idx: u32, offset: usize) -> Result<ConstValue, CompileError> {
    stack
        .pop()
        .ok_or_else(|| CompileError::new(func_idx, offset, None, "constant expression stack underflow"))
}

fn eval_extended_const_binop(
    ty: crate::opcode::NumType,
    op: crate::opcode::BinOp,
    lhs: ConstValue,
    rhs: ConstValue,
    func_idx: u32,
    offset: usize,
) -> Result<ConstValue, CompileError> {
    use crate::opcode::{BinOp, NumType};
    match (ty, op, lhs, rhs) {
        (NumType::I32, BinOp::Add, ConstValue::I32(a), ConstValue::I32(b)) => {
            Ok(ConstValue::I32(a.wrapping_add(b)))
        }
        (NumType::I32, BinOp::Sub, ConstValue::I32(a), ConstValue::I32(b)) => {
            Ok(ConstValue::I32(a.wrapping_sub(b)))
        }
        (NumType::I64, BinOp::Add, ConstValue::I64(a), ConstValue::I64(b)) => {
            Ok(ConstValue::I64(a.wrapping_add(b)))
        }
        (NumType::I64, BinOp::Sub, ConstValue::I64(a), ConstValue::I64(b)) => {
            Ok(ConstValue::I64(a.wrapping_sub(b)))
        }
        _ => Err(CompileError::new(
            func_idx,
            offset,
            None,
            "unsupported operator in extended constant expression",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_plain_i32_const() {
        let module = Module::default();
        let bytes = [0x41, 42, 0x0B];
        let v = eval_const_expr(&module, &bytes, 0).unwrap();
        assert_eq!(v, ConstValue::I32(42));
    }

    #[test]
    fn evaluates_extended_const_add() {
        let module = Module::default();
        let bytes = [0x41, 40, 0x41, 2, 0x6A, 0x0B];
        let v = eval_const_expr(&module, &bytes, 0).unwrap();
        assert_eq!(v, ConstValue::I32(42));
    }

    #[test]
    fn ref_null_evaluates() {
        let module = Module::default();
        let bytes = [0xD0, 0x70, 0x0B];
        let v = eval_const_expr(&module, &bytes, 0).unwrap();
        assert_eq!(v, ConstValue::RefNull);
    }
}
