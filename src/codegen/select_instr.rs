//! `select`/`select t*` (spec.md §4.3): a three-operand ternary that the IL
//! represents as a [`Inst::Phi`] across two synthetic single-instruction
//! arms, reusing the same merge shape `if`/`else` uses rather than
//! inventing a dedicated select instruction.

use crate::error::CompileError;
use crate::il::{IlType, Inst, Terminator, Value};

use super::state::CompileState;

pub fn translate_select(cg: &mut CompileState, offset: usize, declared_ty: Option<crate::types::ValueType>) -> Result<(), CompileError> {
    let cond = cg.pop_value(offset)?;
    let on_false = cg.pop_value(offset)?;
    let on_true = cg.pop_value(offset)?;
    let ty = declared_ty.map(IlType::from_value_type).unwrap_or(on_true.ty);

    let then_label = cg.fresh_label();
    let else_label = cg.fresh_label();
    let end_label = cg.fresh_label();

    cg.terminate(offset, Terminator::Branch { cond: cond.value, if_true: then_label, if_false: else_label })?;

    cg.start_block(then_label);
    cg.terminate(offset, Terminator::Jump(end_label))?;

    cg.start_block(else_label);
    cg.terminate(offset, Terminator::Jump(end_label))?;

    cg.start_block(end_label);
    let result = cg.fresh_temp();
    cg.emit(Inst::Phi {
        result,
        ty,
        incoming: vec![(then_label, on_true.value), (else_label, on_false.value)],
    });
    cg.push_value(Value::Temp(result), ty);
    Ok(())
}
