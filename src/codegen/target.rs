//! `TargetTag`: the only configuration knob the core takes (SPEC_FULL.md §D).

use std::fmt;
use std::str::FromStr;

/// Selects the backend target. Affects only symbol mangling/exit-convention
/// details the codegen notes in spec.md §4.3 call out; IL emission itself is
/// target-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetTag {
    X86_64,
    Arm64,
    Riscv64,
}

impl fmt::Display for TargetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetTag::X86_64 => "x86_64",
            TargetTag::Arm64 => "arm64",
            TargetTag::Riscv64 => "riscv64",
        };
        f.write_str(s)
    }
}

impl FromStr for TargetTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" => Ok(TargetTag::X86_64),
            "arm64" => Ok(TargetTag::Arm64),
            "riscv64" => Ok(TargetTag::Riscv64),
            other => Err(format!("unknown target tag {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags() {
        assert_eq!("x86_64".parse::<TargetTag>().unwrap(), TargetTag::X86_64);
        assert_eq!("arm64".parse::<TargetTag>().unwrap(), TargetTag::Arm64);
        assert_eq!("riscv64".parse::<TargetTag>().unwrap(), TargetTag::Riscv64);
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!("sparc".parse::<TargetTag>().is_err());
    }
}
