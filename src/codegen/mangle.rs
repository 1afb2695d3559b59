//! Symbol name mangling (spec.md §4.3 point 3) plus the QBE identifier
//! length limit workaround (spec.md §9, SPEC_FULL.md §E.1).

/// QBE's own symbol-length limit, per `original_source`.
const QBE_IDENT_LIMIT: usize = 255;

/// FNV-1a, the zero-dependency hash the pack reaches for when content
/// addressing doesn't need cryptographic strength (mirrors its use in
/// `FuelLabs-fuel-vm` for short deterministic tags).
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Truncate `name` to fit within [`QBE_IDENT_LIMIT`], appending a
/// deterministic 8-hex-digit hash suffix of the *original* name so distinct
/// long names never collide after truncation.
fn limit_length(name: String) -> String {
    if name.len() <= QBE_IDENT_LIMIT {
        return name;
    }
    let hash = fnv1a(name.as_bytes());
    let suffix = format!("_{hash:08x}");
    let keep = QBE_IDENT_LIMIT - suffix.len();
    let mut truncated = String::with_capacity(QBE_IDENT_LIMIT);
    truncated.push_str(&name[..keep.min(name.len())]);
    truncated.push_str(&suffix);
    truncated
}

/// Mangle an exported function name (spec.md §4.3 point 3): `wasm_`-prefixed
/// unless already `_start` or `wasm_`/`__wasm_`-prefixed.
pub fn mangle_exported_func(name: &str) -> String {
    let mangled = if name == "_start" || name.starts_with("wasm_") || name.starts_with("__wasm_") {
        name.to_string()
    } else {
        format!("wasm_{name}")
    };
    limit_length(mangled)
}

/// Mangle an internal (non-exported) function: `__wasm_<debug-name-or-idx>`.
pub fn mangle_internal_func(debug_name: Option<&str>, func_idx: u32) -> String {
    let base = match debug_name {
        Some(n) => format!("__wasm_{n}"),
        None => format!("__wasm_{func_idx}"),
    };
    limit_length(base)
}

/// Imported functions keep their import field name verbatim; the linker
/// resolves them against the host.
pub fn mangle_imported_func(field: &str) -> String {
    field.to_string()
}

/// Mangle an exported global: keeps its export name.
pub fn mangle_exported_global(name: &str) -> String {
    limit_length(name.to_string())
}

/// Mangle an internal global: `__wasm_global_<idx>`.
pub fn mangle_internal_global(idx: u32) -> String {
    format!("__wasm_global_{idx}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_name_gets_prefixed() {
        assert_eq!(mangle_exported_func("main"), "wasm_main");
    }

    #[test]
    fn start_symbol_is_not_prefixed() {
        assert_eq!(mangle_exported_func("_start"), "_start");
    }

    #[test]
    fn already_prefixed_name_is_untouched() {
        assert_eq!(mangle_exported_func("wasm_main"), "wasm_main");
        assert_eq!(mangle_exported_func("__wasm_helper"), "__wasm_helper");
    }

    #[test]
    fn internal_name_uses_debug_name_when_present() {
        assert_eq!(mangle_internal_func(Some("helper"), 7), "__wasm_helper");
        assert_eq!(mangle_internal_func(None, 7), "__wasm_7");
    }

    #[test]
    fn long_names_are_hashed_and_truncated() {
        let long_name = "x".repeat(400);
        let mangled = mangle_exported_func(&long_name);
        assert_eq!(mangled.len(), 255);
        assert!(mangled.ends_with_hash_suffix());
    }

    trait EndsWithHashSuffix {
        fn ends_with_hash_suffix(&self) -> bool;
    }

    impl EndsWithHashSuffix for str {
        fn ends_with_hash_suffix(&self) -> bool {
            self.rsplit('_').next().map_or(false, |tail| {
                tail.len() == 8 && tail.chars().all(|c| c.is_ascii_hexdigit())
            })
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let a = fnv1a(b"hello world");
        let b = fnv1a(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, fnv1a(b"hello worlD"));
    }
}
