//! The per-instruction dispatcher: constants, locals/globals, structured
//! control flow, and calls live here; the other instruction families are
//! split into sibling modules (spec.md §4.3).

use crate::error::CompileError;
use crate::il::{IlType, Inst, Label, Terminator, Value};
use crate::opcode::Instr;
use crate::types::ValueType;

use super::state::{
    collect_return_values, emit_return, CodegenFrame, CompileState, FrameKind, StackSlot,
};

pub fn translate_instr(cg: &mut CompileState, offset: usize, instr: &Instr) -> Result<(), CompileError> {
    use Instr::*;
    match instr {
        Unreachable => {
            cg.emit_runtime_call("__wasm_trap_unreachable", vec![], None);
            cg.terminate(offset, Terminator::Halt)?;
            set_unreachable(cg);
        }
        Nop => {}

        Block(bt) => translate_block(cg, offset, *bt)?,
        Loop(bt) => translate_loop(cg, offset, *bt)?,
        If(bt) => translate_if(cg, offset, *bt)?,
        Else => translate_else(cg, offset)?,
        End => translate_end(cg, offset)?,

        Br(depth) => translate_br(cg, offset, *depth)?,
        BrIf(depth) => translate_br_if(cg, offset, *depth)?,
        BrTable(targets, default) => translate_br_table(cg, offset, targets, *default)?,
        Return => {
            let func_type = cg.func_type.clone();
            let results = collect_return_values(cg, offset, &func_type)?;
            emit_return(cg, offset, results)?;
            set_unreachable(cg);
        }

        Call(func_idx) => super::calls::translate_call(cg, offset, *func_idx, false)?,
        ReturnCall(func_idx) => super::calls::translate_call(cg, offset, *func_idx, true)?,
        CallIndirect(type_idx, table) => {
            super::calls::translate_call_indirect(cg, offset, *type_idx, *table, false)?
        }
        ReturnCallIndirect(type_idx, table) => {
            super::calls::translate_call_indirect(cg, offset, *type_idx, *table, true)?
        }
        CallRef(type_idx) => super::calls::translate_call_ref(cg, offset, *type_idx, false)?,
        ReturnCallRef(type_idx) => super::calls::translate_call_ref(cg, offset, *type_idx, true)?,

        Try(bt) => super::exceptions::translate_try(cg, offset, *bt)?,
        Catch(tag) => super::exceptions::translate_catch(cg, offset, *tag)?,
        CatchAll => super::exceptions::translate_catch_all(cg, offset)?,
        Delegate(depth) => super::exceptions::translate_delegate(cg, offset, *depth)?,
        Throw(tag) => {
            super::exceptions::translate_throw(cg, offset, *tag)?;
            set_unreachable(cg);
        }
        Rethrow(depth) => {
            super::exceptions::translate_rethrow(cg, offset, *depth)?;
            set_unreachable(cg);
        }

        Drop => {
            cg.pop_value(offset)?;
        }
        Select => super::select_instr::translate_select(cg, offset, None)?,
        SelectTyped(types) => {
            super::select_instr::translate_select(cg, offset, types.first().copied())?
        }

        LocalGet(idx) => translate_local_get(cg, offset, *idx)?,
        LocalSet(idx) => translate_local_set(cg, offset, *idx)?,
        LocalTee(idx) => translate_local_tee(cg, offset, *idx)?,
        GlobalGet(idx) => super::globals::translate_global_get(cg, offset, *idx)?,
        GlobalSet(idx) => super::globals::translate_global_set(cg, offset, *idx)?,

        I32Const(v) => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Copy { result: t, ty: IlType::W, value: Value::IntConst(*v as i64) });
            cg.push_value(Value::Temp(t), IlType::W);
        }
        I64Const(v) => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Copy { result: t, ty: IlType::L, value: Value::IntConst(*v) });
            cg.push_value(Value::Temp(t), IlType::L);
        }
        F32Const(v) => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Copy { result: t, ty: IlType::S, value: Value::FloatConst(*v as f64) });
            cg.push_value(Value::Temp(t), IlType::S);
        }
        F64Const(v) => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Copy { result: t, ty: IlType::D, value: Value::FloatConst(*v) });
            cg.push_value(Value::Temp(t), IlType::D);
        }

        UnOp(..) | BinOp(..) | TestOp(..) | RelOp(..) | Convert(..) | SatConvert(..)
        | Extend8S(..) | Extend16S(..) | Extend32S => super::numeric::translate_numeric(cg, offset, instr)?,

        Load(..) | Load8S(..) | Load8U(..) | Load16S(..) | Load16U(..) | Load32S(..)
        | Load32U(..) | Store(..) | Store8(..) | Store16(..) | Store32(..) | MemorySize(..)
        | MemoryGrow(..) | MemoryInit(..) | DataDrop(..) | MemoryCopy(..) | MemoryFill(..) => {
            super::memory::translate_memory(cg, offset, instr)?
        }

        TableGet(..) | TableSet(..) | TableInit(..) | ElemDrop(..) | TableCopy(..)
        | TableGrow(..) | TableSize(..) | TableFill(..) => {
            super::table::translate_table(cg, offset, instr)?
        }

        RefNull(..) | RefIsNull | RefFunc(..) | RefEq | RefAsNonNull | BrOnNull(..)
        | BrOnNonNull(..) => super::reference::translate_reference(cg, offset, instr)?,

        StructNew(..) | StructNewDefault(..) | StructGet(..) | StructGetS(..) | StructGetU(..)
        | StructSet(..) | ArrayNew(..) | ArrayNewDefault(..) | ArrayNewFixed(..) | ArrayGet(..)
        | ArrayGetS(..) | ArrayGetU(..) | ArraySet(..) | ArrayLen | RefI31 | I31GetS | I31GetU
        | RefTest(..) | RefCast(..) | AnyConvertExtern | ExternConvertAny => {
            super::gc::translate_gc(cg, offset, instr)?
        }
    }
    Ok(())
}

pub fn set_unreachable(cg: &mut CompileState) {
    if let Some(frame) = cg.control_stack.last_mut() {
        frame.unreachable = true;
        cg.value_stack.truncate(frame.stack_floor);
    }
}

pub(super) fn block_signature(cg: &CompileState, bt: crate::types::BlockType) -> Result<(Vec<ValueType>, Vec<ValueType>), CompileError> {
    bt.params_results(&cg.module.types)
        .map(|(p, r)| (p.to_vec(), r.to_vec()))
        .map_err(|msg| cg.err(0, msg))
}

fn open_frame(cg: &mut CompileState, kind: FrameKind, bt: crate::types::BlockType, branch_label: Label, end_label: Label) -> Result<(), CompileError> {
    let (params, results) = block_signature(cg, bt)?;
    let mut param_values = Vec::with_capacity(params.len());
    for _ in &params {
        param_values.push(cg.pop_value(0)?);
    }
    param_values.reverse();
    let stack_floor = cg.value_stack.len();
    for slot in &param_values {
        cg.push_value(slot.value.clone(), slot.ty);
    }
    cg.control_stack.push(CodegenFrame {
        kind,
        result_types: results,
        branch_label,
        end_label,
        else_label: None,
        param_values,
        stack_floor,
        then_snapshot: None,
        unreachable: false,
        next_catch_test: None,
        handler_popped: false,
    });
    Ok(())
}

fn translate_block(cg: &mut CompileState, _offset: usize, bt: crate::types::BlockType) -> Result<(), CompileError> {
    let end_label = cg.fresh_label();
    open_frame(cg, FrameKind::Block, bt, end_label, end_label)
}

fn translate_loop(cg: &mut CompileState, offset: usize, bt: crate::types::BlockType) -> Result<(), CompileError> {
    let header = cg.fresh_label();
    cg.terminate(offset, Terminator::Jump(header))?;
    cg.start_block(header);
    open_frame(cg, FrameKind::Loop, bt, header, header)
}

fn translate_if(cg: &mut CompileState, offset: usize, bt: crate::types::BlockType) -> Result<(), CompileError> {
    let cond = cg.pop_value(offset)?;
    let then_label = cg.fresh_label();
    let else_label = cg.fresh_label();
    let end_label = cg.fresh_label();
    cg.terminate(offset, Terminator::Branch { cond: cond.value, if_true: then_label, if_false: else_label })?;
    cg.start_block(then_label);
    open_frame(cg, FrameKind::If, bt, end_label, end_label)?;
    if let Some(frame) = cg.control_stack.last_mut() {
        frame.else_label = Some(else_label);
    }
    Ok(())
}

fn translate_else(cg: &mut CompileState, offset: usize) -> Result<(), CompileError> {
    let frame_idx = cg.control_stack.len().checked_sub(1).ok_or_else(|| cg.err(offset, "else without matching if"))?;
    if cg.control_stack[frame_idx].kind != FrameKind::If {
        return Err(cg.err(offset, "else without matching if"));
    }

    let (result_types, stack_floor, else_label, param_values) = {
        let frame = &cg.control_stack[frame_idx];
        (frame.result_types.clone(), frame.stack_floor, frame.else_label.unwrap(), frame.param_values.clone())
    };

    let mut then_values = Vec::with_capacity(result_types.len());
    for _ in &result_types {
        then_values.push(cg.pop_value(offset)?);
    }
    then_values.reverse();

    if !cg.is_current_block_terminated() {
        let end_label = cg.control_stack[frame_idx].end_label;
        cg.terminate(offset, Terminator::Jump(end_label))?;
    }
    let then_block_label = cg.current_block_label();

    cg.value_stack.truncate(stack_floor);
    cg.start_block(else_label);
    for slot in &param_values {
        cg.push_value(slot.value.clone(), slot.ty);
    }

    let frame = &mut cg.control_stack[frame_idx];
    frame.kind = FrameKind::IfElse;
    frame.unreachable = false;
    frame.then_snapshot = Some((then_block_label, then_values));
    Ok(())
}

fn translate_end(cg: &mut CompileState, offset: usize) -> Result<(), CompileError> {
    let frame = cg.control_stack.pop().ok_or_else(|| cg.err(offset, "end without matching block"))?;

    match frame.kind {
        FrameKind::Loop => {
            // A loop's result flows through fall-through; nothing terminal
            // is required beyond letting the current block continue.
        }
        FrameKind::Block => {
            close_straight_line_frame(cg, offset, &frame)?;
        }
        FrameKind::Try => {
            super::exceptions::finalize_try(cg, offset, frame)?;
        }
        FrameKind::If => {
            // `if` closed without an `else`: params and results must match
            // (validator-enforced), so the untaken else arm is an identity
            // pass-through of the captured params.
            let else_label = frame.else_label.unwrap();
            if !cg.is_current_block_terminated() {
                cg.terminate(offset, Terminator::Jump(frame.end_label))?;
            }
            let then_label = cg.current_block_label();
            let then_values: Vec<StackSlot> = frame.param_values.clone();
            cg.value_stack.truncate(frame.stack_floor);
            cg.start_block(else_label);
            cg.terminate(offset, Terminator::Jump(frame.end_label))?;

            cg.start_block(frame.end_label);
            emit_phis_for_merge(cg, &frame.result_types, then_label, &then_values, else_label, &frame.param_values);
        }
        FrameKind::IfElse => {
            let (then_label, then_values) = frame.then_snapshot.clone().unwrap();
            let mut else_values = Vec::with_capacity(frame.result_types.len());
            for _ in &frame.result_types {
                else_values.push(cg.pop_value(offset)?);
            }
            else_values.reverse();
            if !cg.is_current_block_terminated() {
                cg.terminate(offset, Terminator::Jump(frame.end_label))?;
            }
            let else_label = cg.current_block_label();
            cg.value_stack.truncate(frame.stack_floor);
            cg.start_block(frame.end_label);
            emit_phis_for_merge(cg, &frame.result_types, then_label, &then_values, else_label, &else_values);
        }
    }

    Ok(())
}

/// Shared `block`/`try` close-out: terminate with a jump to the end label if
/// not already terminated, start the end block, and push the frame's result
/// values back onto the stack (they are exactly what's on top already).
fn close_straight_line_frame(cg: &mut CompileState, offset: usize, frame: &CodegenFrame) -> Result<(), CompileError> {
    let mut results = Vec::with_capacity(frame.result_types.len());
    for _ in &frame.result_types {
        results.push(cg.pop_value(offset)?);
    }
    results.reverse();
    if !cg.is_current_block_terminated() {
        cg.terminate(offset, Terminator::Jump(frame.end_label))?;
    }
    cg.value_stack.truncate(frame.stack_floor);
    cg.start_block(frame.end_label);
    for slot in results {
        cg.push_value(slot.value, slot.ty);
    }
    Ok(())
}

fn emit_phis_for_merge(
    cg: &mut CompileState,
    result_types: &[ValueType],
    then_label: Label,
    then_values: &[StackSlot],
    else_label: Label,
    else_values: &[StackSlot],
) {
    for (i, &ty) in result_types.iter().enumerate() {
        let il_ty = IlType::from_value_type(ty);
        let result = cg.fresh_temp();
        cg.emit(Inst::Phi {
            result,
            ty: il_ty,
            incoming: vec![
                (then_label, then_values[i].value.clone()),
                (else_label, else_values[i].value.clone()),
            ],
        });
        cg.push_value(Value::Temp(result), il_ty);
    }
}

fn translate_br(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(), CompileError> {
    let target = branch_target_values(cg, offset, depth)?;
    let (label, exiting_values) = target;
    store_loop_backedge_values(cg, depth, &exiting_values);
    cg.terminate(offset, Terminator::Jump(label))?;
    set_unreachable(cg);
    Ok(())
}

fn translate_br_if(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(), CompileError> {
    let cond = cg.pop_value(offset)?;
    let (label, exiting_values) = branch_target_values_peek(cg, offset, depth)?;
    let taken = cg.fresh_label();
    let fallthrough = cg.fresh_label();
    cg.terminate(offset, Terminator::Branch { cond: cond.value, if_true: taken, if_false: fallthrough })?;

    cg.start_block(taken);
    store_loop_backedge_values(cg, depth, &exiting_values);
    cg.terminate(offset, Terminator::Jump(label))?;

    cg.start_block(fallthrough);
    Ok(())
}

fn translate_br_table(cg: &mut CompileState, offset: usize, targets: &[u32], default: u32) -> Result<(), CompileError> {
    let index = cg.pop_value(offset)?;
    // Linear chain of compare-equal/conditional-branch pairs (spec.md §4.3
    // "br_table"): correct, not optimal; dense cases could later become a
    // jump table.
    for (i, &depth) in targets.iter().enumerate() {
        let eq = cg.fresh_temp();
        cg.emit(Inst::Comparison {
            result: eq,
            operand_ty: IlType::W,
            op: crate::il::CmpKind::Eq,
            lhs: index.value.clone(),
            rhs: Value::IntConst(i as i64),
        });
        let taken = cg.fresh_label();
        let next = cg.fresh_label();
        cg.terminate(offset, Terminator::Branch { cond: Value::Temp(eq), if_true: taken, if_false: next })?;

        cg.start_block(taken);
        let (label, exiting_values) = branch_target_values_peek(cg, offset, depth)?;
        store_loop_backedge_values(cg, depth, &exiting_values);
        cg.terminate(offset, Terminator::Jump(label))?;

        cg.start_block(next);
    }
    let (label, exiting_values) = branch_target_values_peek(cg, offset, default)?;
    store_loop_backedge_values(cg, default, &exiting_values);
    cg.terminate(offset, Terminator::Jump(label))?;
    set_unreachable(cg);
    Ok(())
}

/// Loop branch targets carry no payload values through a phi (a loop's
/// label is its header, re-entering with the locals already holding the
/// live values via ordinary stores); every other frame type's target
/// consumes its result arity off the stack. Returns the branch's label and
/// the consumed values, and pops them off the (conceptual) live stack.
fn branch_target_values(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(Label, Vec<StackSlot>), CompileError> {
    let frame_idx = resolve_frame(cg, offset, depth)?;
    let (label, arity) = {
        let frame = &cg.control_stack[frame_idx];
        let arity = if frame.kind == FrameKind::Loop { 0 } else { frame.result_types.len() };
        (frame.branch_label, arity)
    };
    let mut values = Vec::with_capacity(arity);
    for _ in 0..arity {
        values.push(cg.pop_value(offset)?);
    }
    values.reverse();
    for slot in &values {
        cg.push_value(slot.value.clone(), slot.ty);
    }
    Ok((label, values))
}

/// Same as [`branch_target_values`] but used by conditional branches, which
/// must leave the stack as-is for the fallthrough path (the values are
/// "peeked", not popped).
fn branch_target_values_peek(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(Label, Vec<StackSlot>), CompileError> {
    branch_target_values(cg, offset, depth)
}

/// Branching to a loop re-enters its header; live values transferred across
/// the back-edge are exactly the loop's own locals (stack-allocated, per
/// spec.md §9), so no explicit transfer is needed beyond the stack values
/// already represented by their existing temporaries. This is a no-op
/// placeholder kept for symmetry with the non-loop branch paths.
fn store_loop_backedge_values(_cg: &mut CompileState, _depth: u32, _values: &[StackSlot]) {}

fn resolve_frame(cg: &CompileState, offset: usize, depth: u32) -> Result<usize, CompileError> {
    let len = cg.control_stack.len();
    if depth as usize >= len {
        return Err(cg.err(offset, format!("branch depth {depth} exceeds control stack")));
    }
    Ok(len - 1 - depth as usize)
}

/// A local's debug name from the `name` section's local subsection
/// (SPEC_FULL.md §E.4), for diagnostics only — `"0"`-style indices read
/// fine, but `"$counter"` is what the author actually wrote.
fn local_debug_ref(cg: &CompileState, idx: u32) -> String {
    match cg.module.local_names.get(&(cg.func_idx, idx)) {
        Some(name) => format!("{idx} (${name})"),
        None => idx.to_string(),
    }
}

fn translate_local_get(cg: &mut CompileState, offset: usize, idx: u32) -> Result<(), CompileError> {
    let ty = *cg.locals.get(idx as usize).ok_or_else(|| cg.err(offset, format!("local {} out of bounds", local_debug_ref(cg, idx))))?;
    let slot = cg.local_slots[idx as usize];
    let result = cg.fresh_temp();
    let il_ty = IlType::from_value_type(ty);
    cg.emit(Inst::Load {
        result,
        load_type: super::state::mem_type_for(ty),
        result_ty: il_ty,
        address: Value::Temp(slot),
    });
    cg.push_value(Value::Temp(result), il_ty);
    Ok(())
}

fn translate_local_set(cg: &mut CompileState, offset: usize, idx: u32) -> Result<(), CompileError> {
    let ty = *cg.locals.get(idx as usize).ok_or_else(|| cg.err(offset, format!("local {} out of bounds", local_debug_ref(cg, idx))))?;
    let slot = cg.local_slots[idx as usize];
    let value = cg.pop_value(offset)?;
    cg.emit(Inst::Store { store_type: super::state::mem_type_for(ty), value: value.value, address: Value::Temp(slot) });
    Ok(())
}

fn translate_local_tee(cg: &mut CompileState, offset: usize, idx: u32) -> Result<(), CompileError> {
    let ty = *cg.locals.get(idx as usize).ok_or_else(|| cg.err(offset, format!("local {} out of bounds", local_debug_ref(cg, idx))))?;
    let slot = cg.local_slots[idx as usize];
    let top = cg.value_stack.last().cloned().ok_or_else(|| cg.err(offset, "local.tee on empty stack"))?;
    cg.emit(Inst::Store { store_type: super::state::mem_type_for(ty), value: top.value, address: Value::Temp(slot) });
    let _ = ty;
    Ok(())
}
