//! MIPS CPU registers, with the conventional names.

use std::fmt::{self, Display};

/// One of the 32 MIPS CPU registers.
///
/// This compiler only ever touches `$zero`, `$v0`, `$a0`-`$a3`,
/// `$t0`-`$t9`, `$sp`, `$fp` and `$ra`. `$t0`-`$t7` are the allocatable
/// pool; `$t8` is reserved for immediates and `$t9` for address
/// computation, so neither ever enters allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    pub const ZERO: Self = Self(0);
    pub const V0: Self = Self(2);
    pub const A0: Self = Self(4);
    pub const T8: Self = Self(24);
    pub const T9: Self = Self(25);
    pub const SP: Self = Self(29);
    pub const FP: Self = Self(30);
    pub const RA: Self = Self(31);

    /// `$a0`-`$a3`.
    pub fn arg(index: usize) -> Self {
        debug_assert!(index < 4);
        Self(4 + index as u8)
    }

    /// `$t0`-`$t7`, the allocatable pool.
    pub fn temp_pool() -> impl Iterator<Item = Reg> {
        (8..16).map(Reg)
    }
}

const NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(NAMES[self.0 as usize])
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Reg::ZERO.to_string(), "$zero");
        assert_eq!(Reg::arg(2).to_string(), "$a2");
        assert_eq!(Reg::T8.to_string(), "$t8");
        assert_eq!(Reg::FP.to_string(), "$fp");
        let pool: Vec<String> = Reg::temp_pool().map(|r| r.to_string()).collect();
        assert_eq!(pool.first().unwrap(), "$t0");
        assert_eq!(pool.last().unwrap(), "$t7");
        assert_eq!(pool.len(), 8);
    }
}
