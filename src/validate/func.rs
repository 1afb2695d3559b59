//! The structural validator (spec.md §4.2): walks one function body's
//! [`InstrReader`] stream and checks stack/type/branch-depth soundness,
//! grounded on `validation/func.rs`'s giant opcode match in the teacher
//! crate, extended here for GC / exception-handling / tail-call opcodes.

use crate::decode::Module;
use crate::error::ValidationResult;
use crate::opcode::{BinOp, Instr, InstrReader, NumType, RelOp, TestOp, UnOp};
use crate::types::{CompositeType, ValueType};
use crate::validate::context::{ControlFrame, FrameKind, FuncValidationContext};

/// Validate every defined function in the module, collecting all issues
/// rather than stopping at the first (spec.md §4.2: "accumulates every
/// violation it finds rather than stopping at the first").
pub fn validate_module(module: &Module) -> ValidationResult {
    let mut result = ValidationResult::default();
    let num_imported = module.num_imported_funcs();

    let num_memories = module.num_imported_memories() + module.memories.len() as u32;
    if num_memories > 1 {
        result.push(crate::error::Issue::warning(
            crate::error::Location::module(),
            format!("module declares {num_memories} memories (multi-memory proposal)"),
        ));
    }

    for (i, body) in module.code.iter().enumerate() {
        let func_idx = num_imported + i as u32;
        let issues = validate_function(module, func_idx, body);
        for issue in issues {
            result.push(issue);
        }
    }

    for (idx, global) in module.globals.iter().enumerate() {
        let issues = validate_const_expr(
            module,
            &global.init_expr,
            global.ty.value_type,
            Some(num_imported + module.func_types.len() as u32),
        );
        for mut issue in issues {
            issue.location.func_idx = None;
            issue.message = format!("global {idx}: {}", issue.message);
            result.push(issue);
        }
    }

    result
}

fn validate_function(
    module: &Module,
    func_idx: u32,
    body: &crate::decode::FunctionBody,
) -> Vec<crate::error::Issue> {
    let type_idx = match module.func_type_index(func_idx) {
        Some(t) => t,
        None => {
            return vec![crate::error::Issue::error(
                crate::error::Location::in_func(func_idx, 0),
                "function has no resolvable type",
            )]
        }
    };
    let func_type = match module.types.get(type_idx as usize).and_then(CompositeType::as_func) {
        Some(f) => f.clone(),
        None => {
            return vec![crate::error::Issue::error(
                crate::error::Location::in_func(func_idx, 0),
                format!("type index {type_idx} is not a function type"),
            )]
        }
    };

    let mut locals = func_type.params.clone();
    locals.extend(body.expand_locals());

    let mut ctx = FuncValidationContext::new(module, func_idx, locals);
    ctx.control_stack.push(ControlFrame {
        kind: FrameKind::Block,
        start_depth: 0,
        result_types: func_type.results.clone(),
        unreachable: false,
    });

    let mut reader = InstrReader::new(&body.code);
    loop {
        match reader.next() {
            Ok(Some((offset, instr))) => {
                validate_instr(&mut ctx, offset, &instr);
            }
            Ok(None) => break,
            Err(e) => {
                ctx.error(e.offset, e.message.clone());
                break;
            }
        }
    }

    if !ctx.control_stack.is_empty() {
        ctx.error(body.code.len(), "function body ends with unclosed control frames");
    }

    ctx.issues
}

fn validate_instr(ctx: &mut FuncValidationContext, offset: usize, instr: &Instr) {
    use Instr::*;
    match instr {
        Unreachable => ctx.set_unreachable(),
        Nop => {}

        Block(bt) => ctx.push_frame(FrameKind::Block, *bt, offset),
        Loop(bt) => ctx.push_frame(FrameKind::Loop, *bt, offset),
        If(bt) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.push_frame(FrameKind::If, *bt, offset);
        }
        Else => end_if_arm(ctx, offset),
        End => end_frame(ctx, offset),
        Try(bt) => ctx.push_frame(FrameKind::Try, *bt, offset),
        Catch(_tag) => {
            // A caught exception's payload types would need the tag's
            // signature; this core treats catch as re-entering the frame's
            // param-less region (spec.md Non-goal: exception payload typing
            // is approximate).
            pop_frame_for_catch(ctx, offset);
        }
        CatchAll => {
            pop_frame_for_catch(ctx, offset);
        }
        Delegate(depth) => {
            check_branch_depth(ctx, offset, *depth);
            pop_top_frame(ctx);
        }
        Throw(_tag) => ctx.set_unreachable(),
        Rethrow(depth) => {
            check_branch_depth(ctx, offset, *depth);
            ctx.set_unreachable();
        }

        Br(depth) => {
            branch_to(ctx, offset, *depth);
            ctx.set_unreachable();
        }
        BrIf(depth) => {
            ctx.pop_value(offset, ValueType::I32);
            branch_to(ctx, offset, *depth);
        }
        BrTable(targets, default) => {
            ctx.pop_value(offset, ValueType::I32);
            for d in targets {
                branch_to(ctx, offset, *d);
            }
            branch_to(ctx, offset, *default);
            ctx.set_unreachable();
        }
        Return => {
            let results = outermost_results(ctx);
            for ty in results.into_iter().rev() {
                ctx.pop_value(offset, ty);
            }
            ctx.set_unreachable();
        }

        Call(func_idx) => call_like(ctx, offset, *func_idx, false),
        ReturnCall(func_idx) => call_like(ctx, offset, *func_idx, true),
        CallIndirect(type_idx, _table) => {
            ctx.pop_value(offset, ValueType::I32);
            call_type_like(ctx, offset, *type_idx, false);
        }
        ReturnCallIndirect(type_idx, _table) => {
            ctx.pop_value(offset, ValueType::I32);
            call_type_like(ctx, offset, *type_idx, true);
        }
        CallRef(type_idx) => {
            ctx.pop_value(offset, ValueType::FuncRef);
            call_type_like(ctx, offset, *type_idx, false);
        }
        ReturnCallRef(type_idx) => {
            ctx.pop_value(offset, ValueType::FuncRef);
            call_type_like(ctx, offset, *type_idx, true);
        }

        RefNull(ty) => ctx.push_value(*ty),
        RefIsNull => {
            ctx.pop_any(offset);
            ctx.push_value(ValueType::I32);
        }
        RefFunc(func_idx) => {
            if ctx.module.func_type_index(*func_idx).is_none() {
                ctx.error(offset, format!("ref.func index {func_idx} out of bounds"));
            }
            ctx.push_value(ValueType::FuncRef);
        }
        RefEq => {
            ctx.pop_value(offset, ValueType::EqRef);
            ctx.pop_value(offset, ValueType::EqRef);
            ctx.push_value(ValueType::I32);
        }
        RefAsNonNull => {
            let v = ctx.pop_any(offset);
            match v {
                crate::validate::context::StackValueType::Concrete(ty) => ctx.push_value(ty),
                crate::validate::context::StackValueType::Bottom => ctx.push_value(ValueType::AnyRef),
            }
        }
        BrOnNull(depth) => {
            let v = ctx.pop_any(offset);
            if let crate::validate::context::StackValueType::Concrete(ty) = v {
                ctx.push_value(ty);
            }
            branch_to(ctx, offset, *depth);
        }
        BrOnNonNull(depth) => {
            branch_to(ctx, offset, *depth);
        }

        Drop => {
            ctx.pop_any(offset);
        }
        Select => {
            ctx.pop_value(offset, ValueType::I32);
            let b = ctx.pop_any(offset);
            let a = ctx.pop_any(offset);
            if let (
                crate::validate::context::StackValueType::Concrete(a),
                crate::validate::context::StackValueType::Concrete(b),
            ) = (a, b)
            {
                if a != b {
                    ctx.error(offset, "select operands have mismatched types");
                }
                ctx.push_value(a);
            } else {
                ctx.push_value(ValueType::I32);
            }
        }
        SelectTyped(types) => {
            ctx.pop_value(offset, ValueType::I32);
            for &ty in types.iter().rev() {
                ctx.pop_value(offset, ty);
            }
            for &ty in types {
                ctx.push_value(ty);
            }
        }

        LocalGet(idx) => match ctx.locals.get(*idx as usize).copied() {
            Some(ty) => ctx.push_value(ty),
            None => ctx.error(offset, format!("local index {idx} out of bounds")),
        },
        LocalSet(idx) => match ctx.locals.get(*idx as usize).copied() {
            Some(ty) => ctx.pop_value(offset, ty),
            None => ctx.error(offset, format!("local index {idx} out of bounds")),
        },
        LocalTee(idx) => match ctx.locals.get(*idx as usize).copied() {
            Some(ty) => {
                ctx.pop_value(offset, ty);
                ctx.push_value(ty);
            }
            None => ctx.error(offset, format!("local index {idx} out of bounds")),
        },
        GlobalGet(idx) => match ctx.module.global_type(*idx) {
            Some(g) => ctx.push_value(g.value_type),
            None => ctx.error(offset, format!("global index {idx} out of bounds")),
        },
        GlobalSet(idx) => match ctx.module.global_type(*idx) {
            Some(g) => {
                if !g.mutable {
                    ctx.error(offset, format!("global {idx} is immutable"));
                }
                ctx.pop_value(offset, g.value_type);
            }
            None => ctx.error(offset, format!("global index {idx} out of bounds")),
        },

        TableGet(idx) => match ctx.module.table_type(*idx) {
            Some(t) => {
                ctx.pop_value(offset, ValueType::I32);
                ctx.push_value(t.element_type);
            }
            None => ctx.error(offset, format!("table index {idx} out of bounds")),
        },
        TableSet(idx) => match ctx.module.table_type(*idx) {
            Some(t) => {
                ctx.pop_value(offset, t.element_type);
                ctx.pop_value(offset, ValueType::I32);
            }
            None => ctx.error(offset, format!("table index {idx} out of bounds")),
        },
        TableInit(_elem, _table) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
        }
        ElemDrop(_elem) => {}
        TableCopy(_dst, _src) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
        }
        TableGrow(idx) => match ctx.module.table_type(*idx) {
            Some(t) => {
                ctx.pop_value(offset, ValueType::I32);
                ctx.pop_value(offset, t.element_type);
                ctx.push_value(ValueType::I32);
            }
            None => ctx.error(offset, format!("table index {idx} out of bounds")),
        },
        TableSize(_idx) => ctx.push_value(ValueType::I32),
        TableFill(idx) => match ctx.module.table_type(*idx) {
            Some(t) => {
                ctx.pop_value(offset, ValueType::I32);
                ctx.pop_value(offset, t.element_type);
                ctx.pop_value(offset, ValueType::I32);
            }
            None => ctx.error(offset, format!("table index {idx} out of bounds")),
        },

        Load(nt, _arg) => {
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
            ctx.push_value(num_type_to_value(*nt));
        }
        Load8S(it, _arg) | Load8U(it, _arg) | Load16S(it, _arg) | Load16U(it, _arg) => {
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
            ctx.push_value(int_type_to_value(*it));
        }
        Load32S(_arg) | Load32U(_arg) => {
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
            ctx.push_value(ValueType::I64);
        }
        Store(nt, _arg) => {
            ctx.pop_value(offset, num_type_to_value(*nt));
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
        }
        Store8(it, _arg) | Store16(it, _arg) => {
            ctx.pop_value(offset, int_type_to_value(*it));
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
        }
        Store32(_arg) => {
            ctx.pop_value(offset, ValueType::I64);
            ctx.pop_value(offset, mem_addr_type(ctx, offset));
        }
        MemorySize(idx) => ctx.push_value(mem_index_result_type(ctx, *idx)),
        MemoryGrow(idx) => {
            let ty = mem_addr_type_for(ctx, *idx);
            ctx.pop_value(offset, ty);
            ctx.push_value(ty);
        }
        MemoryInit(_data, _mem) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
        }
        DataDrop(_data) => {}
        MemoryCopy(_dst, _src) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
        }
        MemoryFill(_mem) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::I32);
        }

        I32Const(_) => ctx.push_value(ValueType::I32),
        I64Const(_) => ctx.push_value(ValueType::I64),
        F32Const(_) => ctx.push_value(ValueType::F32),
        F64Const(_) => ctx.push_value(ValueType::F64),

        UnOp(nt, op) => {
            let ty = num_type_to_value(*nt);
            ctx.pop_value(offset, ty);
            ctx.push_value(unop_result_type(*nt, *op));
        }
        BinOp(nt, op) => {
            let ty = num_type_to_value(*nt);
            ctx.pop_value(offset, ty);
            ctx.pop_value(offset, ty);
            ctx.push_value(binop_result_type(*nt, *op));
        }
        TestOp(it, TestOp::Eqz) => {
            ctx.pop_value(offset, int_type_to_value(*it));
            ctx.push_value(ValueType::I32);
        }
        RelOp(nt, op) => {
            let ty = num_type_to_value(*nt);
            ctx.pop_value(offset, ty);
            ctx.pop_value(offset, ty);
            let _ = op;
            ctx.push_value(ValueType::I32);
        }
        Convert(op) => {
            let (from, to) = convert_types(*op);
            ctx.pop_value(offset, from);
            ctx.push_value(to);
        }
        SatConvert(op) => {
            let (from, to) = sat_convert_types(*op);
            ctx.pop_value(offset, from);
            ctx.push_value(to);
        }
        Extend8S(it) | Extend16S(it) => {
            let ty = int_type_to_value(*it);
            ctx.pop_value(offset, ty);
            ctx.push_value(ty);
        }
        Extend32S => {
            ctx.pop_value(offset, ValueType::I64);
            ctx.push_value(ValueType::I64);
        }

        StructNew(ty) => {
            let fields = struct_fields(ctx, offset, *ty);
            for field in fields.into_iter().rev() {
                ctx.pop_value(offset, unpacked(field));
            }
            ctx.push_value(ValueType::StructRef);
        }
        StructNewDefault(_ty) => ctx.push_value(ValueType::StructRef),
        StructGet(ty, field) | StructGetS(ty, field) | StructGetU(ty, field) => {
            ctx.pop_value(offset, ValueType::StructRef);
            let result = struct_field(ctx, offset, *ty, *field).map(unpacked).unwrap_or(ValueType::I32);
            ctx.push_value(result);
        }
        StructSet(ty, field) => {
            let result = struct_field(ctx, offset, *ty, *field).map(unpacked).unwrap_or(ValueType::I32);
            ctx.pop_value(offset, result);
            ctx.pop_value(offset, ValueType::StructRef);
        }
        ArrayNew(ty) => {
            ctx.pop_value(offset, ValueType::I32);
            let elem = array_elem(ctx, offset, *ty).map(unpacked).unwrap_or(ValueType::I32);
            ctx.pop_value(offset, elem);
            ctx.push_value(ValueType::ArrayRef);
        }
        ArrayNewDefault(_ty) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.push_value(ValueType::ArrayRef);
        }
        ArrayNewFixed(ty, count) => {
            let elem = array_elem(ctx, offset, *ty).map(unpacked).unwrap_or(ValueType::I32);
            for _ in 0..*count {
                ctx.pop_value(offset, elem);
            }
            ctx.push_value(ValueType::ArrayRef);
        }
        ArrayGet(ty) | ArrayGetS(ty) | ArrayGetU(ty) => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::ArrayRef);
            let elem = array_elem(ctx, offset, *ty).map(unpacked).unwrap_or(ValueType::I32);
            ctx.push_value(elem);
        }
        ArraySet(ty) => {
            let elem = array_elem(ctx, offset, *ty).map(unpacked).unwrap_or(ValueType::I32);
            ctx.pop_value(offset, elem);
            ctx.pop_value(offset, ValueType::I32);
            ctx.pop_value(offset, ValueType::ArrayRef);
        }
        ArrayLen => {
            ctx.pop_value(offset, ValueType::ArrayRef);
            ctx.push_value(ValueType::I32);
        }
        RefI31 => {
            ctx.pop_value(offset, ValueType::I32);
            ctx.push_value(ValueType::I31Ref);
        }
        I31GetS | I31GetU => {
            ctx.pop_value(offset, ValueType::I31Ref);
            ctx.push_value(ValueType::I32);
        }
        RefTest(_ty, _nullable) => {
            ctx.pop_any(offset);
            ctx.push_value(ValueType::I32);
        }
        RefCast(_ty, _nullable) => {
            let v = ctx.pop_any(offset);
            match v {
                crate::validate::context::StackValueType::Concrete(ty) => ctx.push_value(ty),
                crate::validate::context::StackValueType::Bottom => ctx.push_value(ValueType::AnyRef),
            }
        }
        AnyConvertExtern => {
            ctx.pop_value(offset, ValueType::ExternRef);
            ctx.push_value(ValueType::AnyRef);
        }
        ExternConvertAny => {
            ctx.pop_value(offset, ValueType::AnyRef);
            ctx.push_value(ValueType::ExternRef);
        }
    }
}

fn pop_top_frame(ctx: &mut FuncValidationContext) {
    ctx.control_stack.pop();
}

fn end_if_arm(ctx: &mut FuncValidationContext, offset: usize) {
    let Some(frame) = ctx.control_stack.last().cloned() else {
        ctx.error(offset, "else without matching if");
        return;
    };
    if frame.kind != FrameKind::If {
        ctx.error(offset, "else without matching if");
        return;
    }
    // Close out the `then` arm exactly as `end` would, then reopen a fresh
    // `else` arm with the same params already consumed.
    for &ty in frame.result_types.iter().rev() {
        ctx.pop_value(offset, ty);
    }
    if ctx.value_stack.len() != frame.start_depth && !ctx.current_frame_unreachable() {
        ctx.error(offset, "then-arm leaves extra values on the stack");
    }
    ctx.value_stack.truncate(frame.start_depth);
    if let Some(top) = ctx.control_stack.last_mut() {
        top.kind = FrameKind::IfElse;
        top.unreachable = false;
    }
}

fn end_frame(ctx: &mut FuncValidationContext, offset: usize) {
    let Some(frame) = ctx.control_stack.pop() else {
        ctx.error(offset, "end without matching block");
        return;
    };
    for &ty in frame.result_types.iter().rev() {
        ctx.pop_value(offset, ty);
    }
    let floor = ctx.control_stack.last().map(|f| f.start_depth).unwrap_or(0);
    if ctx.value_stack.len() != frame.start_depth.max(floor) && !frame.unreachable {
        ctx.error(offset, "end leaves extra values on the stack");
    }
    for &ty in &frame.result_types {
        ctx.push_value(ty);
    }
    if ctx.control_stack.is_empty() {
        // Outer function-level frame closing: nothing further to reopen.
    }
}

fn pop_frame_for_catch(ctx: &mut FuncValidationContext, offset: usize) {
    if let Some(frame) = ctx.control_stack.last() {
        let start_depth = frame.start_depth;
        ctx.value_stack.truncate(start_depth);
        if let Some(top) = ctx.control_stack.last_mut() {
            top.unreachable = false;
        }
    } else {
        ctx.error(offset, "catch without matching try");
    }
}

fn check_branch_depth(ctx: &mut FuncValidationContext, offset: usize, depth: u32) {
    if ctx.label_at(depth).is_none() {
        ctx.error(offset, format!("branch depth {depth} exceeds control stack"));
    }
}

fn branch_to(ctx: &mut FuncValidationContext, offset: usize, depth: u32) {
    let Some(frame) = ctx.label_at(depth) else {
        ctx.error(offset, format!("branch depth {depth} exceeds control stack"));
        return;
    };
    // A `loop` frame's branch target arity is its *parameter* arity (the
    // loop re-enters at its start), every other frame's is its result arity.
    let expected = if frame.kind == FrameKind::Loop {
        Vec::new()
    } else {
        frame.result_types.clone()
    };
    for ty in expected.into_iter().rev() {
        ctx.pop_value(offset, ty);
    }
}

fn outermost_results(ctx: &FuncValidationContext) -> Vec<ValueType> {
    ctx.control_stack
        .first()
        .map(|f| f.result_types.clone())
        .unwrap_or_default()
}

fn call_like(ctx: &mut FuncValidationContext, offset: usize, func_idx: u32, is_tail: bool) {
    let Some(type_idx) = ctx.module.func_type_index(func_idx) else {
        ctx.error(offset, format!("call target {func_idx} out of bounds"));
        return;
    };
    call_type_like(ctx, offset, type_idx, is_tail);
}

fn call_type_like(ctx: &mut FuncValidationContext, offset: usize, type_idx: u32, is_tail: bool) {
    let Some(func) = ctx.module.types.get(type_idx as usize).and_then(CompositeType::as_func) else {
        ctx.error(offset, format!("type index {type_idx} is not a function type"));
        return;
    };
    let (params, results) = (func.params.clone(), func.results.clone());
    for ty in params.into_iter().rev() {
        ctx.pop_value(offset, ty);
    }
    if is_tail {
        ctx.set_unreachable();
    } else {
        for ty in results {
            ctx.push_value(ty);
        }
    }
}

fn mem_addr_type(ctx: &mut FuncValidationContext, _offset: usize) -> ValueType {
    mem_addr_type_for(ctx, 0)
}

fn mem_addr_type_for(ctx: &FuncValidationContext, mem_idx: u32) -> ValueType {
    match ctx.module.memory_type(mem_idx) {
        Some(m) if m.is_memory64 => ValueType::I64,
        _ => ValueType::I32,
    }
}

fn mem_index_result_type(ctx: &FuncValidationContext, mem_idx: u32) -> ValueType {
    mem_addr_type_for(ctx, mem_idx)
}

fn num_type_to_value(nt: NumType) -> ValueType {
    match nt {
        NumType::I32 => ValueType::I32,
        NumType::I64 => ValueType::I64,
        NumType::F32 => ValueType::F32,
        NumType::F64 => ValueType::F64,
    }
}

fn int_type_to_value(it: crate::opcode::IntType) -> ValueType {
    match it {
        crate::opcode::IntType::I32 => ValueType::I32,
        crate::opcode::IntType::I64 => ValueType::I64,
    }
}

fn unop_result_type(nt: NumType, _op: UnOp) -> ValueType {
    num_type_to_value(nt)
}

fn binop_result_type(nt: NumType, _op: BinOp) -> ValueType {
    num_type_to_value(nt)
}

fn convert_types(op: crate::opcode::ConvertOp) -> (ValueType, ValueType) {
    use crate::opcode::ConvertOp::*;
    match op {
        I32WrapI64 => (ValueType::I64, ValueType::I32),
        I64ExtendI32S | I64ExtendI32U => (ValueType::I32, ValueType::I64),
        I32TruncF32S | I32TruncF32U => (ValueType::F32, ValueType::I32),
        I32TruncF64S | I32TruncF64U => (ValueType::F64, ValueType::I32),
        I64TruncF32S | I64TruncF32U => (ValueType::F32, ValueType::I64),
        I64TruncF64S | I64TruncF64U => (ValueType::F64, ValueType::I64),
        F32ConvertI32S | F32ConvertI32U => (ValueType::I32, ValueType::F32),
        F32ConvertI64S | F32ConvertI64U => (ValueType::I64, ValueType::F32),
        F64ConvertI32S | F64ConvertI32U => (ValueType::I32, ValueType::F64),
        F64ConvertI64S | F64ConvertI64U => (ValueType::I64, ValueType::F64),
        F32DemoteF64 => (ValueType::F64, ValueType::F32),
        F64PromoteF32 => (ValueType::F32, ValueType::F64),
        I32ReinterpretF32 => (ValueType::F32, ValueType::I32),
        I64ReinterpretF64 => (ValueType::F64, ValueType::I64),
        F32ReinterpretI32 => (ValueType::I32, ValueType::F32),
        F64ReinterpretI64 => (ValueType::I64, ValueType::F64),
    }
}

fn sat_convert_types(op: crate::opcode::SatConvertOp) -> (ValueType, ValueType) {
    use crate::opcode::SatConvertOp::*;
    match op {
        I32TruncSatF32S | I32TruncSatF32U => (ValueType::F32, ValueType::I32),
        I32TruncSatF64S | I32TruncSatF64U => (ValueType::F64, ValueType::I32),
        I64TruncSatF32S | I64TruncSatF32U => (ValueType::F32, ValueType::I64),
        I64TruncSatF64S | I64TruncSatF64U => (ValueType::F64, ValueType::I64),
    }
}

fn unpacked(field: crate::types::FieldType) -> ValueType {
    match field.storage {
        ValueType::I8 | ValueType::I16 => ValueType::I32,
        other => other,
    }
}

fn struct_fields(ctx: &mut FuncValidationContext, offset: usize, ty: u32) -> Vec<crate::types::FieldType> {
    match ctx.module.types.get(ty as usize).and_then(CompositeType::as_struct) {
        Some(s) => s.fields.clone(),
        None => {
            ctx.error(offset, format!("type index {ty} is not a struct type"));
            Vec::new()
        }
    }
}

fn struct_field(
    ctx: &mut FuncValidationContext,
    offset: usize,
    ty: u32,
    field: u32,
) -> Option<crate::types::FieldType> {
    match ctx.module.types.get(ty as usize).and_then(CompositeType::as_struct) {
        Some(s) => match s.fields.get(field as usize) {
            Some(f) => Some(*f),
            None => {
                ctx.error(offset, format!("struct field index {field} out of bounds"));
                None
            }
        },
        None => {
            ctx.error(offset, format!("type index {ty} is not a struct type"));
            None
        }
    }
}

fn array_elem(ctx: &mut FuncValidationContext, offset: usize, ty: u32) -> Option<crate::types::FieldType> {
    match ctx.module.types.get(ty as usize).and_then(CompositeType::as_array) {
        Some(a) => Some(a.element),
        None => {
            ctx.error(offset, format!("type index {ty} is not an array type"));
            None
        }
    }
}

/// Validate a raw init-expression byte sequence against its expected result
/// type, reusing the same instruction-level checks as function bodies but
/// over the tiny constant-expression opcode subset (spec.md §4.1).
fn validate_const_expr(
    module: &Module,
    bytes: &[u8],
    expected: ValueType,
    _num_funcs: Option<u32>,
) -> Vec<crate::error::Issue> {
    let mut ctx = FuncValidationContext::new(module, u32::MAX, Vec::new());
    ctx.control_stack.push(ControlFrame {
        kind: FrameKind::Block,
        start_depth: 0,
        result_types: vec![expected],
        unreachable: false,
    });
    let mut reader = InstrReader::new(bytes);
    loop {
        match reader.next() {
            Ok(Some((offset, instr))) => match &instr {
                Instr::End => break,
                other => validate_instr(&mut ctx, offset, other),
            },
            Ok(None) => break,
            Err(e) => {
                ctx.error(e.offset, e.message.clone());
                break;
            }
        }
    }
    ctx.pop_value(bytes.len(), expected);
    ctx.issues
}
