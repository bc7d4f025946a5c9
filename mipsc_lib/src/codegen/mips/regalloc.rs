//! FIFO register allocation with dirty-bit write-back.
//!
//! Eight general-purpose registers (`$t0`-`$t7`) hold variable and
//! temporary values. When the pool runs dry the oldest busy register
//! is spilled; only registers actually written since their load are
//! stored back. `$t8` (immediates) and `$t9` (address scratch) never
//! enter the pool, so a spill's address computation cannot clobber a
//! loaded immediate.

use std::collections::{HashMap, HashSet, VecDeque};

use log::trace;

use super::reg::Reg;
use super::{mips_label, Asm};
use crate::ir::{FrameInfo, Operand};
use crate::symbols::{SymbolId, SymbolTable};

/// What the allocator needs to turn a name back into a memory address:
/// the current function's frame table and the symbol table for
/// globals/statics.
pub(super) struct AddrEnv<'a> {
    pub frame: Option<&'a FrameInfo>,
    pub table: &'a SymbolTable,
}

impl AddrEnv<'_> {
    /// Resolves the home location of a value. Frame slots become
    /// `-offset($fp)`; globals and statics load their label's address
    /// into `temp_reg` and become `0(temp_reg)`. A temporary that is
    /// not in the frame table is a compiler bug.
    pub fn address_of(
        &self,
        name: &str,
        symbol: Option<SymbolId>,
        temp_reg: Reg,
        asm: &mut Asm,
    ) -> String {
        if let Some(slot) = self.frame.and_then(|frame| frame.slot(name)) {
            return format!("-{}($fp)", slot.offset);
        }

        let Some(id) = symbol else {
            panic!("no home location for operand `{name}`");
        };
        let sym = self.table.symbol(id);
        let is_static = sym.kind.is_static();
        if !is_static && (sym.is_param || sym.scope > SymbolTable::GLOBAL_SCOPE) {
            panic!("no home location for operand `{name}`");
        }

        let label = sym.label.as_deref().unwrap_or(name);
        asm.line(format!("la {temp_reg}, {}", mips_label(label)));
        format!("0({temp_reg})")
    }
}

pub(super) struct RegisterAllocator {
    free: VecDeque<Reg>,
    /// Busy registers in allocation order; the front is evicted first.
    busy: VecDeque<Reg>,
    var_to_reg: HashMap<String, Reg>,
    reg_to_var: HashMap<Reg, String>,
    /// Symbol handles kept per name so a spill can resolve the home
    /// address after the original operand is gone.
    var_symbol: HashMap<String, SymbolId>,
    dirty: HashSet<Reg>,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self {
            free: Reg::temp_pool().collect(),
            busy: VecDeque::new(),
            var_to_reg: HashMap::new(),
            reg_to_var: HashMap::new(),
            var_symbol: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    /// Returns a register holding the operand's value. Immediates go
    /// through `$t8`. A variable already in a register is returned as
    /// is; otherwise one is allocated (spilling FIFO if needed) and,
    /// when `load` is set, filled from the home location.
    pub fn get_reg(&mut self, op: &Operand, load: bool, env: &AddrEnv, asm: &mut Asm) -> Reg {
        if let Some(value) = op.imm_value() {
            asm.line(format!("li {}, {value}", Reg::T8));
            return Reg::T8;
        }

        let name = op
            .value_name()
            .unwrap_or_else(|| panic!("operand `{op}` cannot live in a register"));
        if let Some(&reg) = self.var_to_reg.get(&name) {
            return reg;
        }

        let reg = self.take_reg(env, asm);
        self.bind(reg, name.clone(), op.symbol());
        // Fresh from memory (or about to be): matches its home slot.
        self.dirty.remove(&reg);

        if load {
            let addr = env.address_of(&name, op.symbol(), Reg::T9, asm);
            asm.line(format!("lw {reg}, {addr}"));
        }
        reg
    }

    /// Like [`get_reg`] but for a destination: no load, and the
    /// register is dirty because the caller is about to write it.
    ///
    /// [`get_reg`]: Self::get_reg
    pub fn allocate_reg(&mut self, result: &Operand, env: &AddrEnv, asm: &mut Asm) -> Reg {
        let name = result
            .value_name()
            .unwrap_or_else(|| panic!("operand `{result}` cannot live in a register"));
        if let Some(&reg) = self.var_to_reg.get(&name) {
            self.dirty.insert(reg);
            return reg;
        }
        let reg = self.take_reg(env, asm);
        self.bind(reg, name, result.symbol());
        self.dirty.insert(reg);
        reg
    }

    fn take_reg(&mut self, env: &AddrEnv, asm: &mut Asm) -> Reg {
        if let Some(reg) = self.free.pop_front() {
            return reg;
        }
        let reg = self.busy.pop_front().expect("register pool exhausted");
        trace!("spilling {reg} ({})", self.reg_to_var[&reg]);
        self.spill_reg(reg, env, asm);
        reg
    }

    fn bind(&mut self, reg: Reg, name: String, symbol: Option<SymbolId>) {
        if let Some(id) = symbol {
            self.var_symbol.insert(name.clone(), id);
        }
        self.var_to_reg.insert(name.clone(), reg);
        self.reg_to_var.insert(reg, name);
        self.busy.push_back(reg);
    }

    /// Writes the register back to its home slot if dirty and drops
    /// the mapping. Address computation goes through `$t9` so a
    /// pending immediate in `$t8` survives.
    fn spill_reg(&mut self, reg: Reg, env: &AddrEnv, asm: &mut Asm) {
        let Some(name) = self.reg_to_var.remove(&reg) else {
            return;
        };
        if self.dirty.remove(&reg) {
            let symbol = self.var_symbol.get(&name).copied();
            let addr = env.address_of(&name, symbol, Reg::T9, asm);
            asm.line(format!("sw {reg}, {addr}"));
        }
        self.var_to_reg.remove(&name);
        self.var_symbol.remove(&name);
    }

    /// Writes back every dirty register and returns the whole pool to
    /// the free list. Called before jumps, branches, calls, I/O and at
    /// labels, so memory is authoritative across block boundaries.
    pub fn spill_all(&mut self, env: &AddrEnv, asm: &mut Asm) {
        let active: Vec<Reg> = self.busy.iter().copied().collect();
        for reg in active {
            self.spill_reg(reg, env, asm);
            self.free.push_back(reg);
        }
        self.busy.clear();
        self.dirty.clear();
    }

    /// Drops all mappings without writing anything back. Used at
    /// function entry where the new frame's contents are undefined.
    pub fn clear_map(&mut self) {
        for reg in self.busy.drain(..) {
            self.free.push_back(reg);
        }
        self.var_to_reg.clear();
        self.reg_to_var.clear();
        self.var_symbol.clear();
        self.dirty.clear();
    }

    /// Binds an incoming parameter to a pool register by copying it out
    /// of its argument register. The prologue already stored the value
    /// to the home slot, so the register starts clean.
    pub fn map_param_to_reg(&mut self, name: &str, src: Reg, env: &AddrEnv, asm: &mut Asm) {
        let reg = self.take_reg(env, asm);
        asm.line(format!("move {reg}, {src}"));
        self.bind(reg, name.to_owned(), None);
        self.dirty.remove(&reg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FrameSlot;

    fn frame_with(names: &[(&str, i32)]) -> FrameInfo {
        let mut frame = FrameInfo {
            func_name: "f".into(),
            frame_size: 64,
            params: Vec::new(),
            slots: HashMap::new(),
        };
        for &(name, offset) in names {
            frame.slots.insert(
                name.to_owned(),
                FrameSlot {
                    name: name.to_owned(),
                    offset,
                    size: 4,
                    is_param: false,
                    is_temp: true,
                },
            );
        }
        frame
    }

    #[test]
    fn immediate_goes_through_t8() {
        let table = SymbolTable::new();
        let frame = frame_with(&[]);
        let env = AddrEnv {
            frame: Some(&frame),
            table: &table,
        };
        let mut asm = Asm::new();
        let mut regs = RegisterAllocator::new();
        let reg = regs.get_reg(&Operand::Imm(42), true, &env, &mut asm);
        assert_eq!(reg, Reg::T8);
        assert_eq!(asm.text(), "    li $t8, 42\n");
    }

    #[test]
    fn fifo_eviction_spills_only_dirty() {
        let table = SymbolTable::new();
        let slots: Vec<(String, i32)> = (0..9).map(|n| (format!("t{n}"), 12 + 4 * n)).collect();
        let slot_refs: Vec<(&str, i32)> = slots.iter().map(|(n, o)| (n.as_str(), *o)).collect();
        let frame = frame_with(&slot_refs);
        let env = AddrEnv {
            frame: Some(&frame),
            table: &table,
        };
        let mut asm = Asm::new();
        let mut regs = RegisterAllocator::new();

        // Fill the pool with clean loads.
        for n in 0..8 {
            regs.get_reg(&Operand::Temp(n), true, &env, &mut asm);
        }
        // The ninth value evicts $t0 (oldest). It is clean: no sw.
        let before = asm.text().to_owned();
        let reg = regs.get_reg(&Operand::Temp(8), true, &env, &mut asm);
        assert_eq!(reg.to_string(), "$t0");
        let added = &asm.text()[before.len()..];
        assert!(!added.contains("sw "), "clean eviction must not store: {added}");
        assert!(added.contains("lw $t0, -44($fp)"));
    }

    #[test]
    fn dirty_register_is_written_back_on_spill_all() {
        let table = SymbolTable::new();
        let frame = frame_with(&[("t0", 12)]);
        let env = AddrEnv {
            frame: Some(&frame),
            table: &table,
        };
        let mut asm = Asm::new();
        let mut regs = RegisterAllocator::new();
        regs.allocate_reg(&Operand::Temp(0), &env, &mut asm);
        regs.spill_all(&env, &mut asm);
        assert!(asm.text().contains("sw $t0, -12($fp)"));
        // A second spill_all has nothing left to do.
        let len = asm.text().len();
        regs.spill_all(&env, &mut asm);
        assert_eq!(asm.text().len(), len);
    }

    #[test]
    fn clear_map_forgets_without_stores() {
        let table = SymbolTable::new();
        let frame = frame_with(&[("t0", 12)]);
        let env = AddrEnv {
            frame: Some(&frame),
            table: &table,
        };
        let mut asm = Asm::new();
        let mut regs = RegisterAllocator::new();
        regs.allocate_reg(&Operand::Temp(0), &env, &mut asm);
        regs.clear_map();
        assert!(!asm.text().contains("sw"));
        // The pool is whole again: eight distinct registers available.
        for n in 1..9 {
            regs.get_reg(&Operand::Temp(n % 8), false, &env, &mut asm);
        }
    }

    #[test]
    #[should_panic(expected = "no home location")]
    fn unregistered_temporary_is_fatal() {
        let table = SymbolTable::new();
        let frame = frame_with(&[]);
        let env = AddrEnv {
            frame: Some(&frame),
            table: &table,
        };
        let mut asm = Asm::new();
        env.address_of("t7", None, Reg::T9, &mut asm);
    }
}
