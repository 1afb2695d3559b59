//! End-to-end scenarios from spec.md §8: build a minimal module byte-by-byte
//! (no `wat2wasm` dependency in this crate, so bytes are assembled directly,
//! the way `decode::tests` already does) and assert on the shape of the
//! rendered QBE IL text rather than executing it.

use wasm2qbe_core::{compile_module, TargetTag};

mod wasm_builder {
    pub const SEC_TYPE: u8 = 1;
    pub const SEC_FUNCTION: u8 = 3;
    pub const SEC_MEMORY: u8 = 5;
    pub const SEC_GLOBAL: u8 = 6;
    pub const SEC_EXPORT: u8 = 7;
    pub const SEC_CODE: u8 = 10;

    pub const I32: u8 = 0x7F;

    pub fn uleb(mut n: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
        out
    }

    pub fn header() -> Vec<u8> {
        let mut bytes = b"\0asm".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes
    }

    /// Append a section with id `id` and payload `payload`, length-prefixed.
    pub fn section(bytes: &mut Vec<u8>, id: u8, payload: &[u8]) {
        bytes.push(id);
        bytes.extend(uleb(payload.len() as u64));
        bytes.extend_from_slice(payload);
    }

    pub fn vec_section(items: &[Vec<u8>]) -> Vec<u8> {
        let mut out = uleb(items.len() as u64);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    /// A single `(params) -> (results)` func type entry (tag `0x60`).
    pub fn func_type(params: &[u8], results: &[u8]) -> Vec<u8> {
        let mut out = vec![0x60];
        out.extend(uleb(params.len() as u64));
        out.extend_from_slice(params);
        out.extend(uleb(results.len() as u64));
        out.extend_from_slice(results);
        out
    }

    pub fn export(name: &str, kind: u8, index: u32) -> Vec<u8> {
        let mut out = uleb(name.len() as u64);
        out.extend_from_slice(name.as_bytes());
        out.push(kind);
        out.extend(uleb(index as u64));
        out
    }

    /// A function body with no local groups beyond `params`/declared
    /// locals, given raw instruction bytes (including the trailing `end`).
    pub fn code(extra_locals: &[(u32, u8)], instrs: &[u8]) -> Vec<u8> {
        let mut body = uleb(extra_locals.len() as u64);
        for &(count, ty) in extra_locals {
            body.extend(uleb(count as u64));
            body.push(ty);
        }
        body.extend_from_slice(instrs);
        let mut out = uleb(body.len() as u64);
        out.extend_from_slice(&body);
        out
    }

    pub fn build(type_section: &[Vec<u8>], functions: &[u32], exports: &[Vec<u8>], code_bodies: &[Vec<u8>]) -> Vec<u8> {
        build_full(type_section, functions, exports, code_bodies, None, None)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_full(
        type_section: &[Vec<u8>],
        functions: &[u32],
        exports: &[Vec<u8>],
        code_bodies: &[Vec<u8>],
        memory: Option<(u32, Option<u32>)>,
        global: Option<(u8, bool, Vec<u8>)>,
    ) -> Vec<u8> {
        let mut bytes = header();
        section(&mut bytes, SEC_TYPE, &vec_section(type_section));

        let func_indices: Vec<Vec<u8>> = functions.iter().map(|&idx| uleb(idx as u64)).collect();
        section(&mut bytes, SEC_FUNCTION, &vec_section(&func_indices));

        if let Some((min, max)) = memory {
            let mut mem_entry = Vec::new();
            match max {
                Some(max) => {
                    mem_entry.push(0x01);
                    mem_entry.extend(uleb(min as u64));
                    mem_entry.extend(uleb(max as u64));
                }
                None => {
                    mem_entry.push(0x00);
                    mem_entry.extend(uleb(min as u64));
                }
            }
            section(&mut bytes, SEC_MEMORY, &vec_section(&[mem_entry]));
        }

        if let Some((value_type, mutable, init_expr)) = global {
            let mut entry = vec![value_type, mutable as u8];
            entry.extend_from_slice(&init_expr);
            section(&mut bytes, SEC_GLOBAL, &vec_section(&[entry]));
        }

        section(&mut bytes, SEC_EXPORT, &vec_section(exports));
        section(&mut bytes, SEC_CODE, &vec_section(code_bodies));
        bytes
    }
}

use wasm_builder::*;

/// 1. Return constant: `(func (export "main") (result i32) i32.const 42)`.
#[test]
fn return_constant_42() {
    let bytes = build(
        &[func_type(&[], &[I32])],
        &[0],
        &[export("main", 0x00, 0)],
        &[code(&[], &[0x41, 42, 0x0B])],
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("export function w $wasm_main()"), "{il}");
    assert!(il.contains("copy 42"), "{il}");
    assert!(il.contains("ret"), "{il}");
}

/// 2. Addition: `(func (export "add") (param i32 i32) (result i32) local.get 0 local.get 1 i32.add)`.
#[test]
fn addition() {
    let bytes = build(
        &[func_type(&[I32, I32], &[I32])],
        &[0],
        &[export("add", 0x00, 0)],
        &[code(&[], &[0x20, 0, 0x20, 1, 0x6A, 0x0B])],
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("export function w $wasm_add("), "{il}");
    assert!(il.contains("add "), "{il}");
}

/// 3. Recursive factorial-shaped function: `n == 0 ? 1 : n * fact(n - 1)`,
/// exercising `if`/`else` phi merge and a self-recursive `call`.
#[test]
fn recursive_factorial_shape() {
    let instrs = vec![
        0x20, 0, // local.get 0
        0x45, // i32.eqz
        0x04, I32, // if (result i32)
        0x41, 1, // i32.const 1
        0x05, // else
        0x20, 0, // local.get 0
        0x20, 0, // local.get 0
        0x41, 1, // i32.const 1
        0x6B, // i32.sub
        0x10, 0, // call 0 (self)
        0x6C, // i32.mul
        0x0B, // end (if)
        0x0B, // end (func)
    ];
    let bytes = build(
        &[func_type(&[I32], &[I32])],
        &[0],
        &[export("fact", 0x00, 0)],
        &[code(&[], &instrs)],
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("phi"), "{il}");
    assert!(il.contains("call $wasm_fact"), "{il}");
    assert!(il.contains("mul"), "{il}");
}

/// 4. Iterative sum 1..=10 using `block`/`loop`/`br_if`, with an
/// accumulator and a loop counter as locals.
#[test]
fn iterative_sum() {
    // locals: 0 = i, 1 = sum (both zero-initialized, then i set to 1 below)
    let instrs = vec![
        0x41, 1, 0x21, 0, // i32.const 1; local.set 0   (i = 1)
        0x02, 0x40, // block (empty)
        0x03, 0x40, // loop (empty)
        0x20, 0, 0x41, 10, 0x4A, // local.get 0; i32.const 10; i32.gt_s
        0x0D, 1, // br_if 1 (exit block when i > 10)
        0x20, 1, 0x20, 0, 0x6A, 0x21, 1, // sum += i
        0x20, 0, 0x41, 1, 0x6A, 0x21, 0, // i += 1
        0x0C, 0, // br 0 (continue loop)
        0x0B, // end loop
        0x0B, // end block
        0x20, 1, // local.get sum
        0x0B, // end func
    ];
    let bytes = build(
        &[func_type(&[], &[I32])],
        &[0],
        &[export("sum_to_ten", 0x00, 0)],
        &[code(&[(2, I32)], &instrs)],
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("export function w $wasm_sum_to_ten()"), "{il}");
    assert!(il.matches("jnz").count() >= 2 || il.matches("jmp").count() >= 2, "{il}");
}

/// 5. Memory store/load: store 42 at address 0 and 58 at address 4, load
/// both back and sum them.
#[test]
fn memory_store_load() {
    let instrs = vec![
        0x41, 0, 0x41, 42, 0x36, 0x02, 0, // i32.store(0, 42) [align=2, offset=0]
        0x41, 4, 0x41, 58, 0x36, 0x02, 0, // i32.store(4, 58)
        0x41, 0, 0x28, 0x02, 0, // i32.load(0)
        0x41, 4, 0x28, 0x02, 0, // i32.load(4)
        0x6A, // i32.add
        0x0B,
    ];
    let bytes = build_full(
        &[func_type(&[], &[I32])],
        &[0],
        &[export("store_load", 0x00, 0)],
        &[code(&[], &instrs)],
        Some((1, None)),
        None,
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("storew"), "{il}");
    assert!(il.contains("loadw"), "{il}");
}

/// 6. Mutable global incremented four times by an exported function.
#[test]
fn mutable_global_increment() {
    let instrs = vec![
        0x23, 0, 0x41, 1, 0x6A, 0x24, 0, // global += 1 (x1)
        0x23, 0, 0x41, 1, 0x6A, 0x24, 0, // x2
        0x23, 0, 0x41, 1, 0x6A, 0x24, 0, // x3
        0x23, 0, 0x41, 1, 0x6A, 0x24, 0, // x4
        0x23, 0, // global.get 0
        0x0B,
    ];
    let bytes = build_full(
        &[func_type(&[], &[I32])],
        &[0],
        &[export("bump_four_times", 0x00, 0)],
        &[code(&[], &instrs)],
        None,
        Some((I32, true, vec![0x41, 0, 0x0B])),
    );
    let il = compile_module(&bytes, TargetTag::X86_64).expect("compiles");
    assert!(il.contains("data $"), "{il}");
    assert!(il.matches("storew").count() >= 4, "{il}");
}
