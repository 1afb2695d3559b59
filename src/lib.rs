//! # wasm2qbe-core
//!
//! Decoder, structural validator and stack-to-SSA code generator that
//! translate a WebAssembly binary module into QBE-flavored typed
//! intermediate language (spec.md §1, §2).
//!
//! The pipeline is deliberately linear and has no side effects beyond
//! `log` tracing: `decode` builds a [`decode::Module`] from raw bytes,
//! `validate` checks it for stack/type soundness, and `codegen` walks the
//! now-trusted module once per function to emit an [`il::IlModule`]. Each
//! stage's error type composes into the top-level [`Error`] via `?`.
//!
//! ```no_run
//! use wasm2qbe_core::{compile_module, TargetTag};
//!
//! # fn main() -> Result<(), wasm2qbe_core::Error> {
//! let wasm_bytes = std::fs::read("module.wasm").unwrap();
//! let qbe_il = compile_module(&wasm_bytes, TargetTag::X86_64)?;
//! println!("{qbe_il}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod codegen;
pub mod decode;
pub mod error;
pub mod il;
mod interp_const;
mod leb;
pub mod opcode;
pub mod types;
pub mod validate;

pub use codegen::TargetTag;
pub use error::Error;
pub use il::IlModule;

/// Run the full pipeline: decode, validate, and generate QBE IL text.
///
/// Returns [`Error::Parse`] on a malformed binary, [`Error::Validation`]
/// if the (well-formed) module fails structural validation, or
/// [`Error::Compile`] if code generation hits an instruction or invariant
/// the core doesn't support.
pub fn compile_module(bytes: &[u8], target: TargetTag) -> Result<String, Error> {
    let module = decode::decode(bytes)?;

    let result = validate::validate_module(&module);
    if !result.is_ok() {
        return Err(Error::Validation(result));
    }

    let il = codegen::compile(&module, target)?;
    Ok(il.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_only() -> Vec<u8> {
        let mut bytes = b"\0asm".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes
    }

    #[test]
    fn empty_module_compiles_to_empty_il() {
        let il = compile_module(&header_only(), TargetTag::X86_64).expect("empty module compiles");
        assert!(il.trim().is_empty());
    }

    #[test]
    fn malformed_binary_is_a_parse_error() {
        let err = compile_module(b"not wasm", TargetTag::X86_64).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
