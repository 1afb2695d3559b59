//! The binary decoder (spec.md §4.1): `decode(bytes) -> Module`.

mod module;
mod name_section;
mod reader;
mod sections;

pub use module::*;

use crate::error::ParseError;
use reader::Reader;

const WASM_MAGIC: [u8; 4] = *b"\0asm";
const WASM_VERSION: u32 = 1;

const SEC_CUSTOM: u8 = 0;
const SEC_TYPE: u8 = 1;
const SEC_IMPORT: u8 = 2;
const SEC_FUNCTION: u8 = 3;
const SEC_TABLE: u8 = 4;
const SEC_MEMORY: u8 = 5;
const SEC_GLOBAL: u8 = 6;
const SEC_EXPORT: u8 = 7;
const SEC_START: u8 = 8;
const SEC_ELEMENT: u8 = 9;
const SEC_CODE: u8 = 10;
const SEC_DATA: u8 = 11;
const SEC_DATA_COUNT: u8 = 12;

/// Decode a complete WebAssembly binary module (spec.md §4.1's public
/// contract). Fails on the first malformed byte; never panics on
/// adversarial input.
pub fn decode(bytes: &[u8]) -> Result<Module, ParseError> {
    let mut r = Reader::new(bytes);
    read_header(&mut r)?;

    let mut module = Module::default();
    let mut seen_function_count: Option<usize> = None;
    let mut seen_code_count: Option<usize> = None;

    while !r.at_end() {
        let id = r.read_u8()?;
        let size = r.read_u32()? as usize;
        let section_start = r.offset();
        log::trace!("decoding section id={id} size={size} at offset 0x{section_start:x}");
        let payload = r.read_bytes(size)?;
        let mut sr = Reader::new(payload);

        match id {
            SEC_CUSTOM => {
                let name = sr.read_name()?;
                if name == "name" {
                    let rest_start = sr.offset();
                    let rest = &payload[rest_start..];
                    let data = name_section::parse_name_section(rest)?;
                    module.func_names = data.func_names;
                    module.local_names = data.local_names;
                }
                // Every other custom section (including unknown ones) is
                // preserved only in the sense that it is skipped without
                // error; its raw bytes are not retained by this core.
            }
            SEC_TYPE => module.types = sections::parse_type_section(&mut sr)?,
            SEC_IMPORT => module.imports = sections::parse_import_section(&mut sr)?,
            SEC_FUNCTION => {
                module.func_types = sections::parse_function_section(&mut sr)?;
                seen_function_count = Some(module.func_types.len());
            }
            SEC_TABLE => module.tables = sections::parse_table_section(&mut sr)?,
            SEC_MEMORY => module.memories = sections::parse_memory_section(&mut sr)?,
            SEC_GLOBAL => module.globals = sections::parse_global_section(&mut sr)?,
            SEC_EXPORT => module.exports = sections::parse_export_section(&mut sr)?,
            SEC_START => module.start = Some(sr.read_u32()?),
            SEC_ELEMENT => module.elements = sections::parse_element_section(&mut sr)?,
            SEC_CODE => {
                module.code = sections::parse_code_section(&mut sr)?;
                seen_code_count = Some(module.code.len());
            }
            SEC_DATA => module.data = sections::parse_data_section(&mut sr)?,
            SEC_DATA_COUNT => module.data_count = Some(sr.read_u32()?),
            // Unknown section ids are skipped entirely (spec.md §4.1).
            _ => {}
        }

        if !sr.at_end() && id != SEC_CUSTOM {
            return Err(sr.err("section payload has trailing bytes"));
        }
    }

    check_invariants(&module, seen_function_count, seen_code_count)?;
    Ok(module)
}

fn read_header(r: &mut Reader) -> Result<(), ParseError> {
    let magic = r.read_bytes(4)?;
    if magic != WASM_MAGIC {
        return Err(ParseError::new(0, "bad magic number: not a WebAssembly module"));
    }
    let version_bytes = r.read_bytes(4)?;
    let version = u32::from_le_bytes(version_bytes.try_into().unwrap());
    if version != WASM_VERSION {
        return Err(ParseError::new(4, format!("unsupported version {version}")));
    }
    Ok(())
}

fn check_invariants(
    module: &Module,
    seen_function_count: Option<usize>,
    seen_code_count: Option<usize>,
) -> Result<(), ParseError> {
    if seen_function_count.unwrap_or(0) != seen_code_count.unwrap_or(0) {
        return Err(ParseError::new(
            0,
            "code section function count does not match function section count",
        ));
    }

    for ty_idx in &module.func_types {
        if module.types.get(*ty_idx as usize).and_then(|t| t.as_func()).is_none() {
            return Err(ParseError::new(
                0,
                format!("function type index {ty_idx} is out of bounds or not a func type"),
            ));
        }
    }

    for memory in &module.memories {
        if let Some(max) = memory.max {
            if max < memory.min {
                return Err(ParseError::new(0, "memory max is less than min"));
            }
        }
        if !memory.is_memory64 && memory.min > 65536 {
            return Err(ParseError::new(0, "32-bit memory min exceeds 65536 pages"));
        }
    }

    let mut export_names = std::collections::BTreeSet::new();
    for export in &module.exports {
        if !export_names.insert(export.name.as_str()) {
            return Err(ParseError::new(
                0,
                format!("duplicate export name {:?}", export.name),
            ));
        }
    }

    if let Some(start) = module.start {
        match module.func_type_index(start).and_then(|t| module.types.get(t as usize)) {
            Some(crate::types::CompositeType::Func(f))
                if f.params.is_empty() && f.results.is_empty() => {}
            _ => {
                return Err(ParseError::new(0, "start function must have signature () -> ()"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_only() -> Vec<u8> {
        let mut bytes = WASM_MAGIC.to_vec();
        bytes.extend_from_slice(&WASM_VERSION.to_le_bytes());
        bytes
    }

    #[test]
    fn empty_module_decodes() {
        let module = decode(&header_only()).expect("empty module should decode");
        assert!(module.types.is_empty());
        assert!(module.code.is_empty());
    }

    #[test]
    fn rejects_short_input() {
        for len in 0..8 {
            let bytes = header_only();
            assert!(decode(&bytes[..len]).is_err());
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_only();
        bytes[0] = b'X';
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = header_only();
        bytes[4] = 2;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn decodes_single_const_function() {
        let mut bytes = header_only();
        // type section: one func type () -> (i32)
        bytes.extend_from_slice(&[SEC_TYPE, 5, 1, 0x60, 0, 1, 0x7F]);
        // function section: one function using type 0
        bytes.extend_from_slice(&[SEC_FUNCTION, 2, 1, 0]);
        // export section: export func 0 as "main"
        bytes.extend_from_slice(&[SEC_EXPORT, 8, 1, 4, b'm', b'a', b'i', b'n', 0x00, 0]);
        // code section: one body, no locals, i32.const 42; end
        bytes.extend_from_slice(&[SEC_CODE, 7, 1, 5, 0, 0x41, 42, 0x0B]);

        let module = decode(&bytes).unwrap();
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.func_types, vec![0]);
        assert_eq!(module.exports.len(), 1);
        assert_eq!(module.exports[0].name, "main");
        assert_eq!(module.code.len(), 1);
        assert_eq!(module.code[0].code, vec![0x41, 42, 0x0B]);
    }

    #[test]
    fn rejects_duplicate_export_names() {
        let mut bytes = header_only();
        bytes.extend_from_slice(&[SEC_TYPE, 5, 1, 0x60, 0, 1, 0x7F]);
        bytes.extend_from_slice(&[SEC_FUNCTION, 3, 2, 0, 0]);
        bytes.extend_from_slice(&[
            SEC_EXPORT, 14, 2, 4, b'm', b'a', b'i', b'n', 0x00, 0, 4, b'm', b'a', b'i', b'n',
            0x00, 1,
        ]);
        bytes.extend_from_slice(&[SEC_CODE, 12, 2, 5, 0, 0x41, 42, 0x0B, 5, 0, 0x41, 1, 0x0B]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_mismatched_function_and_code_counts() {
        let mut bytes = header_only();
        bytes.extend_from_slice(&[SEC_TYPE, 5, 1, 0x60, 0, 1, 0x7F]);
        bytes.extend_from_slice(&[SEC_FUNCTION, 2, 1, 0]);
        // no code section at all
        assert!(decode(&bytes).is_err());
    }
}
