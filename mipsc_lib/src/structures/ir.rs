//! The three-address IR: operands, instructions, per-function frame
//! layout, and the textual form used by the `ir.txt` dump.

use std::collections::HashMap;
use std::fmt::{self, Display};

use crate::symbols::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // logical / compare
    Not,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Neq,
    // memory and assignment
    Assign,
    Load,
    Store,
    GetAddr,
    // control
    Label,
    Jump,
    Beqz,
    // calls
    Param,
    Call,
    Ret,
    FuncEntry,
    FuncExit,
    // I/O
    GetInt,
    PrintInt,
    PrintStr,
    // introduced by strength reduction only
    Sll,
    Sra,
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::Not => "NOT",
            Opcode::Gt => "GT",
            Opcode::Ge => "GE",
            Opcode::Lt => "LT",
            Opcode::Le => "LE",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Assign => "ASSIGN",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::GetAddr => "GET_ADDR",
            Opcode::Label => "LABEL",
            Opcode::Jump => "JUMP",
            Opcode::Beqz => "BEQZ",
            Opcode::Param => "PARAM",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::FuncEntry => "FUNC_ENTRY",
            Opcode::FuncExit => "FUNC_EXIT",
            Opcode::GetInt => "GETINT",
            Opcode::PrintInt => "PRINTINT",
            Opcode::PrintStr => "PRINTSTR",
            Opcode::Sll => "SLL",
            Opcode::Sra => "SRA",
        }
    }

    /// `true` for the opcodes whose `result` field is a *use* (a value
    /// that is read), not a definition: `store` (value to store),
    /// `ret` (value to return), `param` (value passed), `printint` and
    /// `printstr` (value printed), `beqz` (condition). Every pass that
    /// substitutes, invalidates or collects uses must consult this.
    pub fn result_is_use(&self) -> bool {
        matches!(
            self,
            Opcode::Store
                | Opcode::Ret
                | Opcode::Param
                | Opcode::PrintInt
                | Opcode::PrintStr
                | Opcode::Beqz
        )
    }

    /// `true` when `result` is a definition for this opcode.
    pub fn defines_result(&self) -> bool {
        !self.result_is_use() && !matches!(self, Opcode::Label | Opcode::Jump)
    }

    /// The base-address argument (`arg1`) of these opcodes must never
    /// be replaced by an immediate.
    pub fn arg1_is_mem_base(&self) -> bool {
        matches!(self, Opcode::Store | Opcode::Load | Opcode::GetAddr)
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, Opcode::Add | Opcode::Mul)
    }

    /// Opcodes that may not be deleted by dead-code elimination.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Opcode::Call
                | Opcode::Store
                | Opcode::PrintInt
                | Opcode::PrintStr
                | Opcode::GetInt
                | Opcode::Ret
                | Opcode::Jump
                | Opcode::Beqz
                | Opcode::FuncEntry
                | Opcode::FuncExit
                | Opcode::Label
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An IR value.
///
/// `Var` carries both the mangled name (unique across the IR namespace)
/// and a handle into the symbol table, because the back end needs the
/// storage metadata long after lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Imm(i32),
    Temp(u32),
    Var { name: String, symbol: SymbolId },
    Label(String),
}

impl Operand {
    pub fn imm_value(&self) -> Option<i32> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Operand::Temp(_))
    }

    /// The printed name of a temp or variable — the key used by all
    /// name-indexed maps (constant tables, register maps, frame slots).
    pub fn value_name(&self) -> Option<String> {
        match self {
            Operand::Temp(_) | Operand::Var { .. } => Some(self.to_string()),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Operand::Var { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    pub fn label_name(&self) -> Option<&str> {
        match self {
            Operand::Label(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "#{v}"),
            Operand::Temp(n) => write!(f, "t{n}"),
            Operand::Var { name, .. } => f.write_str(name),
            Operand::Label(name) => f.write_str(name),
        }
    }
}

/// A four-tuple instruction. Which fields are meaningful, and whether
/// `result` is a def or a use, depends on the opcode (see
/// [`Opcode::result_is_use`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub result: Option<Operand>,
    pub arg1: Option<Operand>,
    pub arg2: Option<Operand>,
}

impl Instr {
    pub fn new(
        op: Opcode,
        result: Option<Operand>,
        arg1: Option<Operand>,
        arg2: Option<Operand>,
    ) -> Self {
        Self {
            op,
            result,
            arg1,
            arg2,
        }
    }

    /// The name this instruction defines, if any.
    pub fn defined_name(&self) -> Option<String> {
        if !self.op.defines_result() {
            return None;
        }
        self.result.as_ref().and_then(Operand::value_name)
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(op: &Option<Operand>) -> String {
            op.as_ref().map_or_else(|| "-".to_owned(), |o| o.to_string())
        }
        if self.op == Opcode::Label {
            return write!(f, "{}:", field(&self.result));
        }
        write!(
            f,
            "{} {}, {}, {}",
            self.op,
            field(&self.result),
            field(&self.arg1),
            field(&self.arg2)
        )
    }
}

/// One slot of a function's frame: a parameter, local or temporary,
/// keyed by mangled name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    pub name: String,
    /// Byte offset below `$fp` (the emitted address is `-offset($fp)`).
    pub offset: i32,
    pub size: i32,
    pub is_param: bool,
    pub is_temp: bool,
}

/// Per-function code-generation info consumed by the MIPS back end.
#[derive(Debug, Clone, Default)]
pub struct FrameInfo {
    pub func_name: String,
    /// Total frame size in bytes; always a multiple of 4. Grows as
    /// temporaries are registered.
    pub frame_size: i32,
    /// Mangled parameter names in declaration order (binding them to
    /// `$a0..$a3` and the caller stack).
    pub params: Vec<String>,
    pub slots: HashMap<String, FrameSlot>,
}

impl FrameInfo {
    pub fn slot(&self, name: &str) -> Option<&FrameSlot> {
        self.slots.get(name)
    }
}

/// The lowered program: the linear instruction stream plus everything
/// the back end needs alongside it.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub instrs: Vec<Instr>,
    /// Interned string constants in first-appearance order:
    /// `(label, content)`.
    pub string_constants: Vec<(String, String)>,
    /// Frame layout per function name.
    pub frames: HashMap<String, FrameInfo>,
}

impl IrModule {
    /// The stable dump format behind `ir.txt` and
    /// `testfilei_opt_after.txt`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if !self.string_constants.is_empty() {
            out.push_str("#String Constants (.data)\n");
            for (label, content) in &self.string_constants {
                out.push_str(label);
                out.push_str(": \"");
                for c in content.chars() {
                    if c == '\n' {
                        out.push_str("\\n");
                    } else {
                        out.push(c);
                    }
                }
                out.push_str("\"\n");
            }
            out.push_str("\n#Instructions (.text)\n");
        }
        for instr in &self.instrs {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }
}
