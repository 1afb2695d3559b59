//! Exception-handling instructions (spec.md §4.3, SPEC_FULL.md §E.3):
//! `try`/`catch`/`catch_all`/`delegate`/`throw`/`rethrow`. A `try` behaves
//! like a `block` with one extra twist: instead of two merge arms (`if`'s
//! then/else) it has N (the body plus each catch clause), dispatched by a
//! landing-pad chain of tag comparisons built incrementally as each
//! `catch` is decoded, and merged at `end` the same way `if`/`else` merges
//! its two.

use crate::error::CompileError;
use crate::il::{CmpKind, IlType, Inst, Label, Terminator, Value};

use super::state::{CodegenFrame, CompileState, FrameKind, StackSlot};
use super::translate::{block_signature, set_unreachable};

pub fn translate_try(cg: &mut CompileState, offset: usize, bt: crate::types::BlockType) -> Result<(), CompileError> {
    let (params, results) = block_signature(cg, bt)?;
    let mut param_values = Vec::with_capacity(params.len());
    for _ in &params {
        param_values.push(cg.pop_value(offset)?);
    }
    param_values.reverse();
    let stack_floor = cg.value_stack.len();
    for slot in &param_values {
        cg.push_value(slot.value.clone(), slot.ty);
    }

    let landing_pad = cg.fresh_label();
    let end_label = cg.fresh_label();
    cg.emit_runtime_call(
        "__wasm_push_exception_handler",
        vec![(IlType::W, Value::IntConst(landing_pad.0 as i64))],
        None,
    );

    cg.control_stack.push(CodegenFrame {
        kind: FrameKind::Try,
        result_types: results,
        branch_label: end_label,
        end_label,
        else_label: None,
        param_values,
        stack_floor,
        then_snapshot: None,
        unreachable: false,
        next_catch_test: Some(landing_pad),
        handler_popped: false,
    });
    cg.exception_arms.push(Vec::new());
    Ok(())
}

fn try_frame_idx(cg: &CompileState, offset: usize) -> Result<usize, CompileError> {
    let idx = cg.control_stack.len().checked_sub(1).ok_or_else(|| cg.err(offset, "catch without matching try"))?;
    if cg.control_stack[idx].kind != FrameKind::Try {
        return Err(cg.err(offset, "catch without matching try"));
    }
    Ok(idx)
}

/// Close whichever arm (try-body or a prior catch handler) is currently
/// open: pop its result values, jump to the frame's end label, and record
/// `(arm_label, values)` in the innermost open try's arm list for the
/// final merge at `end`.
fn close_current_arm(cg: &mut CompileState, offset: usize, frame_idx: usize) -> Result<(), CompileError> {
    let (result_types, stack_floor, end_label) = {
        let f = &cg.control_stack[frame_idx];
        (f.result_types.clone(), f.stack_floor, f.end_label)
    };
    let mut values = Vec::with_capacity(result_types.len());
    for _ in &result_types {
        values.push(cg.pop_value(offset)?);
    }
    values.reverse();
    if !cg.is_current_block_terminated() {
        cg.terminate(offset, Terminator::Jump(end_label))?;
    }
    let arm_label = cg.current_block_label();
    cg.value_stack.truncate(stack_floor);
    cg.exception_arms.last_mut().expect("try frame has an arm list").push((arm_label, values));
    Ok(())
}

fn pop_handler_once(cg: &mut CompileState, frame_idx: usize) {
    if !cg.control_stack[frame_idx].handler_popped {
        cg.emit_runtime_call("__wasm_pop_exception_handler", vec![], None);
        cg.control_stack[frame_idx].handler_popped = true;
    }
}

pub fn translate_catch(cg: &mut CompileState, offset: usize, tag: u32) -> Result<(), CompileError> {
    let frame_idx = try_frame_idx(cg, offset)?;
    close_current_arm(cg, offset, frame_idx)?;
    pop_handler_once(cg, frame_idx);

    let test_label = cg.control_stack[frame_idx]
        .next_catch_test
        .take()
        .ok_or_else(|| cg.err(offset, "catch after catch_all"))?;
    cg.start_block(test_label);

    let current_tag = cg.emit_runtime_call("__wasm_get_exception_tag", vec![], Some(IlType::W)).unwrap();
    let matches = cg.fresh_temp();
    cg.emit(Inst::Comparison {
        result: matches,
        operand_ty: IlType::W,
        op: CmpKind::Eq,
        lhs: current_tag,
        rhs: Value::IntConst(tag as i64),
    });
    let handler_label = cg.fresh_label();
    let next_test = cg.fresh_label();
    cg.terminate(offset, Terminator::Branch { cond: Value::Temp(matches), if_true: handler_label, if_false: next_test })?;
    cg.control_stack[frame_idx].next_catch_test = Some(next_test);

    cg.start_block(handler_label);
    let payload = cg.emit_runtime_call("__wasm_get_exception", vec![], Some(IlType::L)).unwrap();
    cg.push_value(payload, IlType::L);
    Ok(())
}

pub fn translate_catch_all(cg: &mut CompileState, offset: usize) -> Result<(), CompileError> {
    let frame_idx = try_frame_idx(cg, offset)?;
    close_current_arm(cg, offset, frame_idx)?;
    pop_handler_once(cg, frame_idx);

    let test_label = cg.control_stack[frame_idx]
        .next_catch_test
        .take()
        .ok_or_else(|| cg.err(offset, "catch_all after another catch_all"))?;
    cg.start_block(test_label);
    let payload = cg.emit_runtime_call("__wasm_get_exception", vec![], Some(IlType::L)).unwrap();
    cg.push_value(payload, IlType::L);
    Ok(())
}

/// `try ... delegate d` has no catch clauses of its own: unhandled
/// exceptions from the body are forwarded straight to the enclosing
/// handler at depth `d` rather than dispatched locally (spec.md §9's
/// "delegate is not stubbed" requirement, SPEC_FULL.md §E.3). There is no
/// landing pad left to synthesize, so the push/pop pair this try opened is
/// implicitly retired by the delegate call itself.
pub fn translate_delegate(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(), CompileError> {
    let frame_idx = try_frame_idx(cg, offset)?;
    close_current_arm(cg, offset, frame_idx)?;
    cg.emit_runtime_call("__wasm_delegate_exception_handler", vec![(IlType::W, Value::IntConst(depth as i64))], None);

    let frame = cg.control_stack.pop().unwrap();
    let arms = cg.exception_arms.pop().unwrap();
    finish_merge(cg, frame, arms)
}

pub fn finalize_try(cg: &mut CompileState, offset: usize, frame: CodegenFrame) -> Result<(), CompileError> {
    let mut arms = cg.exception_arms.pop().ok_or_else(|| cg.err(offset, "try frame has no recorded arms"))?;

    // If no `catch`/`catch_all` ever ran, the body's normal-exit path never
    // got its handler popped (that only happens inside `pop_handler_once`,
    // called from those two).
    if !frame.handler_popped {
        cg.emit_runtime_call("__wasm_pop_exception_handler", vec![], None);
    }
    close_open_arm(cg, offset, &frame, &mut arms)?;

    if let Some(test_label) = frame.next_catch_test {
        // Either no catch clause ever appeared (this is the original
        // landing pad) or the last `catch`'s tag test's false-branch was
        // never closed (no `catch_all` followed it): either way, an
        // exception can reach here unmatched and must keep propagating.
        cg.start_block(test_label);
        cg.emit_runtime_call("__wasm_pop_exception_handler", vec![], None);
        cg.emit_runtime_call("__wasm_rethrow", vec![], None);
        cg.terminate(offset, Terminator::Halt)?;
    }

    finish_merge(cg, frame, arms)
}

/// Like [`close_current_arm`] but for use after the frame has already been
/// popped off `control_stack` (as `finalize_try` receives it), appending
/// directly into a caller-owned arm list instead of `cg.exception_arms`.
fn close_open_arm(cg: &mut CompileState, offset: usize, frame: &CodegenFrame, arms: &mut Vec<(Label, Vec<StackSlot>)>) -> Result<(), CompileError> {
    let mut values = Vec::with_capacity(frame.result_types.len());
    for _ in &frame.result_types {
        values.push(cg.pop_value(offset)?);
    }
    values.reverse();
    if !cg.is_current_block_terminated() {
        cg.terminate(offset, Terminator::Jump(frame.end_label))?;
    }
    let arm_label = cg.current_block_label();
    cg.value_stack.truncate(frame.stack_floor);
    arms.push((arm_label, values));
    Ok(())
}

fn finish_merge(cg: &mut CompileState, frame: CodegenFrame, arms: Vec<(Label, Vec<StackSlot>)>) -> Result<(), CompileError> {
    cg.start_block(frame.end_label);
    for (i, &ty) in frame.result_types.iter().enumerate() {
        let il_ty = IlType::from_value_type(ty);
        let result = cg.fresh_temp();
        let incoming = arms.iter().map(|(label, values)| (*label, values[i].value.clone())).collect();
        cg.emit(Inst::Phi { result, ty: il_ty, incoming });
        cg.push_value(Value::Temp(result), il_ty);
    }
    Ok(())
}

pub fn translate_throw(cg: &mut CompileState, offset: usize, tag: u32) -> Result<(), CompileError> {
    // Tag signatures aren't tracked by the decoded `Module` (no tag
    // section today); a valid program has the stack holding exactly the
    // enclosing frame's floor plus the tag's own operands at this point,
    // so everything above the floor is forwarded as payload.
    let floor = cg.control_stack.last().map_or(0, |f| f.stack_floor);
    let mut payload = Vec::new();
    while cg.value_stack.len() > floor {
        payload.push(cg.value_stack.pop().unwrap());
    }
    payload.reverse();
    let mut args = vec![(IlType::W, Value::IntConst(tag as i64))];
    args.extend(payload.into_iter().map(|s| (s.ty, s.value)));
    cg.emit_runtime_call("__wasm_throw", args, None);
    cg.terminate(offset, Terminator::Halt)?;
    set_unreachable(cg);
    Ok(())
}

pub fn translate_rethrow(cg: &mut CompileState, offset: usize, depth: u32) -> Result<(), CompileError> {
    cg.emit_runtime_call("__wasm_rethrow", vec![(IlType::W, Value::IntConst(depth as i64))], None);
    cg.terminate(offset, Terminator::Halt)?;
    set_unreachable(cg);
    Ok(())
}
