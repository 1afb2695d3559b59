//! The `name` custom section: function and local debug names
//! (spec.md §4.1 id 0, SPEC_FULL.md §E.4).

use super::reader::Reader;
use crate::error::ParseError;
use std::collections::BTreeMap;

const SUBSECTION_FUNCTION_NAMES: u8 = 1;
const SUBSECTION_LOCAL_NAMES: u8 = 2;

pub struct NameData {
    pub func_names: BTreeMap<u32, String>,
    pub local_names: BTreeMap<(u32, u32), String>,
}

/// Parse the nested subsection stream of a `name` custom section. Unknown
/// subsection ids are skipped, matching the decoder's general
/// unknown-section tolerance (spec.md §4.1).
pub fn parse_name_section(payload: &[u8]) -> Result<NameData, ParseError> {
    let mut r = Reader::new(payload);
    let mut func_names = BTreeMap::new();
    let mut local_names = BTreeMap::new();

    while !r.at_end() {
        let id = r.read_u8()?;
        let size = r.read_u32()? as usize;
        let start = r.offset();
        match id {
            SUBSECTION_FUNCTION_NAMES => {
                let entries = r.read_vec(|r| {
                    let idx = r.read_u32()?;
                    let name = r.read_name()?;
                    Ok((idx, name))
                })?;
                for (idx, name) in entries {
                    func_names.insert(idx, name);
                }
            }
            SUBSECTION_LOCAL_NAMES => {
                let per_func = r.read_vec(|r| {
                    let func_idx = r.read_u32()?;
                    let locals = r.read_vec(|r| {
                        let local_idx = r.read_u32()?;
                        let name = r.read_name()?;
                        Ok((local_idx, name))
                    })?;
                    Ok((func_idx, locals))
                })?;
                for (func_idx, locals) in per_func {
                    for (local_idx, name) in locals {
                        local_names.insert((func_idx, local_idx), name);
                    }
                }
            }
            _ => {
                // Skip the subsection's payload without interpreting it.
                let consumed = r.offset() - start;
                if consumed < size {
                    r.read_bytes(size - consumed)?;
                }
                continue;
            }
        }
        let consumed = r.offset() - start;
        if consumed > size {
            return Err(r.err("name subsection overran its declared size"));
        }
        if consumed < size {
            r.read_bytes(size - consumed)?;
        }
    }

    Ok(NameData { func_names, local_names })
}
