//! `call`/`call_indirect`/`call_ref` and their `return_call` variants
//! (spec.md §4.3 "Calls"), including the self-tail-call-as-loop rewrite
//! spec.md §9 calls out as the one required peephole optimization.

use crate::error::CompileError;
use crate::il::{CallTarget, Global, IlType, Inst, Terminator, Value};
use crate::types::{CompositeType, FuncType};

use super::state::{mem_type_for, CompileState};
use super::{mangle, translate};

fn resolve_func_type<'a>(cg: &CompileState<'a>, func_idx: u32) -> Result<FuncType, CompileError> {
    let type_idx = cg
        .module
        .func_type_index(func_idx)
        .ok_or_else(|| cg.err(0, format!("call target {func_idx} has no resolvable type")))?;
    cg.module
        .types
        .get(type_idx as usize)
        .and_then(CompositeType::as_func)
        .cloned()
        .ok_or_else(|| cg.err(0, "call target type index is not a function type"))
}

pub fn callee_symbol(cg: &CompileState, func_idx: u32) -> String {
    let num_imported = cg.module.num_imported_funcs();
    if func_idx < num_imported {
        // Imported functions keep their field name verbatim (mangle.rs).
        let mut seen = 0u32;
        for import in &cg.module.imports {
            if let crate::decode::ImportDesc::Func(_) = &import.desc {
                if seen == func_idx {
                    return mangle::mangle_imported_func(&import.field);
                }
                seen += 1;
            }
        }
        return format!("__wasm_import_{func_idx}");
    }
    let exported = cg
        .module
        .exports
        .iter()
        .find(|e| e.kind == crate::decode::ExportKind::Func && e.index == func_idx);
    match exported {
        Some(e) => mangle::mangle_exported_func(&e.name),
        None => mangle::mangle_internal_func(cg.module.func_names.get(&func_idx).map(|s| s.as_str()), func_idx),
    }
}

/// Pop the call's argument values (in declared order) and collect them as
/// typed `(IlType, Value)` pairs, plus fresh out-pointer temporaries for
/// results 2..n.
fn prepare_args(
    cg: &mut CompileState,
    offset: usize,
    func_type: &FuncType,
) -> Result<(Vec<(IlType, Value)>, Vec<crate::il::Temporary>), CompileError> {
    let mut operands = Vec::with_capacity(func_type.params.len());
    for _ in &func_type.params {
        operands.push(cg.pop_value(offset)?);
    }
    operands.reverse();
    let args = operands
        .iter()
        .map(|s| (s.ty, s.value.clone()))
        .collect();

    let mut out_temps = Vec::new();
    for _ in 0..func_type.results.len().saturating_sub(1) {
        let t = cg.fresh_temp();
        cg.emit(Inst::Alloc { result: t, size: 8, align: 8 });
        out_temps.push(t);
    }
    Ok((args, out_temps))
}

fn push_results(cg: &mut CompileState, func_type: &FuncType, direct: Option<Value>, out_temps: &[crate::il::Temporary]) {
    if let Some(&first_ty) = func_type.results.first() {
        let il_ty = IlType::from_value_type(first_ty);
        let v = direct.unwrap_or(Value::IntConst(0));
        cg.push_value(v, il_ty);
    }
    for (i, &ty) in func_type.results.iter().enumerate().skip(1) {
        let il_ty = IlType::from_value_type(ty);
        let result = cg.fresh_temp();
        cg.emit(Inst::Load {
            result,
            load_type: mem_type_for(ty),
            result_ty: il_ty,
            address: Value::Temp(out_temps[i - 1]),
        });
        cg.push_value(Value::Temp(result), il_ty);
    }
}

pub fn translate_call(cg: &mut CompileState, offset: usize, func_idx: u32, is_return: bool) -> Result<(), CompileError> {
    if is_return && func_idx == cg.func_idx {
        return translate_self_tail_call(cg, offset, func_idx);
    }

    let func_type = resolve_func_type(cg, func_idx)?;
    let symbol = callee_symbol(cg, func_idx);
    let (mut args, out_temps) = prepare_args(cg, offset, &func_type)?;
    for &t in &out_temps {
        args.push((IlType::L, Value::Temp(t)));
    }

    let result_ty = func_type.results.first().map(|&t| IlType::from_value_type(t));
    let result = result_ty.map(|ty| (cg.fresh_temp(), ty));
    cg.emit(Inst::Call {
        target: CallTarget::Direct(Global(symbol)),
        args,
        result,
    });

    if is_return {
        let direct = result.map(|(t, _)| Value::Temp(t));
        forward_as_return(cg, offset, &func_type, direct, &out_temps)
    } else {
        push_results(cg, &func_type, result.map(|(t, _)| Value::Temp(t)), &out_temps);
        Ok(())
    }
}

/// `return_call self_func(...)` becomes a back-edge to the function's entry
/// block instead of a real call: the one loop-rewrite peephole spec.md §9
/// requires (self-recursive tail calls otherwise blow the native stack the
/// same way the source's unbounded recursion would).
fn translate_self_tail_call(cg: &mut CompileState, offset: usize, func_idx: u32) -> Result<(), CompileError> {
    let func_type = resolve_func_type(cg, func_idx)?;
    let mut operands = Vec::with_capacity(func_type.params.len());
    for _ in &func_type.params {
        operands.push(cg.pop_value(offset)?);
    }
    operands.reverse();

    // Store the new argument values into the existing local slots (params
    // occupy locals 0..params.len()), then jump back to the entry block.
    for (i, slot) in operands.iter().enumerate() {
        let local_slot = cg.local_slots[i];
        cg.emit(Inst::Store {
            store_type: mem_type_for(func_type.params[i]),
            value: slot.value.clone(),
            address: Value::Temp(local_slot),
        });
    }
    cg.terminate(offset, Terminator::Jump(crate::il::Label(0)))?;
    translate::set_unreachable(cg);
    let _ = func_idx;
    Ok(())
}

fn forward_as_return(
    cg: &mut CompileState,
    offset: usize,
    func_type: &FuncType,
    direct: Option<Value>,
    out_temps: &[crate::il::Temporary],
) -> Result<(), CompileError> {
    for (i, &ty) in func_type.results.iter().enumerate().skip(1) {
        let loaded = cg.fresh_temp();
        cg.emit(Inst::Load {
            result: loaded,
            load_type: mem_type_for(ty),
            result_ty: IlType::from_value_type(ty),
            address: Value::Temp(out_temps[i - 1]),
        });
        let out_slot = cg.out_param_slots[i - 1];
        cg.emit(Inst::Store {
            store_type: mem_type_for(ty),
            value: Value::Temp(loaded),
            address: Value::Temp(out_slot),
        });
    }
    cg.terminate(offset, Terminator::Return(direct))?;
    translate::set_unreachable(cg);
    Ok(())
}

pub fn translate_call_indirect(
    cg: &mut CompileState,
    offset: usize,
    type_idx: u32,
    table: u32,
    is_return: bool,
) -> Result<(), CompileError> {
    let func_type = cg
        .module
        .types
        .get(type_idx as usize)
        .and_then(CompositeType::as_func)
        .cloned()
        .ok_or_else(|| cg.err(offset, "call_indirect type index is not a function type"))?;

    let table_idx = cg.pop_value(offset)?;
    let callee = cg
        .emit_runtime_call(
            "__wasm_table_get_func",
            vec![(IlType::W, Value::IntConst(table as i64)), (table_idx.ty, table_idx.value)],
            Some(IlType::L),
        )
        .unwrap();

    let (mut args, out_temps) = prepare_args(cg, offset, &func_type)?;
    for &t in &out_temps {
        args.push((IlType::L, Value::Temp(t)));
    }
    let result_ty = func_type.results.first().map(|&t| IlType::from_value_type(t));
    let result = result_ty.map(|ty| (cg.fresh_temp(), ty));
    cg.emit(Inst::Call {
        target: CallTarget::Indirect(callee),
        args,
        result,
    });

    if is_return {
        forward_as_return(cg, offset, &func_type, result.map(|(t, _)| Value::Temp(t)), &out_temps)
    } else {
        push_results(cg, &func_type, result.map(|(t, _)| Value::Temp(t)), &out_temps);
        Ok(())
    }
}

pub fn translate_call_ref(cg: &mut CompileState, offset: usize, type_idx: u32, is_return: bool) -> Result<(), CompileError> {
    let func_type = cg
        .module
        .types
        .get(type_idx as usize)
        .and_then(CompositeType::as_func)
        .cloned()
        .ok_or_else(|| cg.err(offset, "call_ref type index is not a function type"))?;

    let callee_ref = cg.pop_value(offset)?;
    let (mut args, out_temps) = prepare_args(cg, offset, &func_type)?;
    for &t in &out_temps {
        args.push((IlType::L, Value::Temp(t)));
    }
    let result_ty = func_type.results.first().map(|&t| IlType::from_value_type(t));
    let result = result_ty.map(|ty| (cg.fresh_temp(), ty));
    cg.emit(Inst::Call {
        target: CallTarget::Indirect(callee_ref.value),
        args,
        result,
    });

    if is_return {
        forward_as_return(cg, offset, &func_type, result.map(|(t, _)| Value::Temp(t)), &out_temps)
    } else {
        push_results(cg, &func_type, result.map(|(t, _)| Value::Temp(t)), &out_temps);
        Ok(())
    }
}
