//! Reference instructions (spec.md §4.3): null/function references are
//! plain pointer-width values; `br_on_null`/`br_on_non_null` are
//! conditional branches fused with the branch's value-passing convention.

use crate::error::CompileError;
use crate::il::{CmpKind, Global, IlType, Inst, Label, Terminator, Value};
use crate::opcode::Instr;

use super::state::CompileState;

pub fn translate_reference(cg: &mut CompileState, offset: usize, instr: &Instr) -> Result<(), CompileError> {
    match instr {
        Instr::RefNull(_) => {
            cg.push_value(Value::IntConst(0), IlType::L);
            Ok(())
        }
        Instr::RefIsNull => {
            let v = cg.pop_value(offset)?;
            let t = cg.fresh_temp();
            cg.emit(Inst::Comparison { result: t, operand_ty: IlType::L, op: CmpKind::Eq, lhs: v.value, rhs: Value::IntConst(0) });
            cg.push_value(Value::Temp(t), IlType::W);
            Ok(())
        }
        Instr::RefFunc(func_idx) => {
            let symbol = super::calls::callee_symbol(cg, *func_idx);
            cg.push_value(Value::Global(Global(symbol)), IlType::L);
            Ok(())
        }
        Instr::RefEq => {
            let rhs = cg.pop_value(offset)?;
            let lhs = cg.pop_value(offset)?;
            let t = cg.fresh_temp();
            cg.emit(Inst::Comparison { result: t, operand_ty: IlType::L, op: CmpKind::Eq, lhs: lhs.value, rhs: rhs.value });
            cg.push_value(Value::Temp(t), IlType::W);
            Ok(())
        }
        Instr::RefAsNonNull => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_ref_as_non_null", vec![(IlType::L, v.value)], Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::BrOnNull(depth) => {
            let v = cg.pop_value(offset)?;
            let is_null = cg.fresh_temp();
            cg.emit(Inst::Comparison { result: is_null, operand_ty: IlType::L, op: CmpKind::Eq, lhs: v.value.clone(), rhs: Value::IntConst(0) });
            let target = branch_label(cg, offset, *depth)?;
            let fallthrough = cg.fresh_label();
            cg.terminate(offset, Terminator::Branch { cond: Value::Temp(is_null), if_true: target, if_false: fallthrough })?;
            cg.start_block(fallthrough);
            cg.push_value(v.value, IlType::L);
            Ok(())
        }
        Instr::BrOnNonNull(depth) => {
            let v = cg.pop_value(offset)?;
            let is_null = cg.fresh_temp();
            cg.emit(Inst::Comparison { result: is_null, operand_ty: IlType::L, op: CmpKind::Eq, lhs: v.value.clone(), rhs: Value::IntConst(0) });
            let target = branch_label(cg, offset, *depth)?;
            let fallthrough = cg.fresh_label();
            cg.push_value(v.value, IlType::L);
            cg.terminate(offset, Terminator::Branch { cond: Value::Temp(is_null), if_true: fallthrough, if_false: target })?;
            cg.start_block(fallthrough);
            cg.pop_value(offset)?;
            Ok(())
        }
        _ => unreachable!("translate_reference called with a non-reference instruction"),
    }
}

fn branch_label(cg: &CompileState, offset: usize, depth: u32) -> Result<Label, CompileError> {
    let len = cg.control_stack.len();
    if depth as usize >= len {
        return Err(cg.err(offset, format!("branch depth {depth} exceeds control stack")));
    }
    Ok(cg.control_stack[len - 1 - depth as usize].branch_label)
}
