//! MIPS assembly emission for the SPIM/MARS conventions.

mod generator;
mod reg;
mod regalloc;

use crate::ir::IrModule;
use crate::symbols::SymbolTable;
use generator::Generator;

pub fn build_from_ir(module: &IrModule, table: &SymbolTable) -> String {
    Generator::new(module, table).generate()
}

/// Every user-visible label except `main` gets a leading underscore so
/// a source name like `div` or `add` cannot collide with a mnemonic.
pub(crate) fn mips_label(name: &str) -> String {
    if name == "main" {
        name.to_owned()
    } else {
        format!("_{name}")
    }
}

/// Assembly text under construction.
pub(crate) struct Asm {
    text: String,
}

impl Asm {
    pub fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// One indented instruction or directive line.
    pub fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str("    ");
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    /// An unindented line (labels, section markers).
    pub fn raw(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn label(&mut self, label: impl AsRef<str>) {
        self.text.push_str(label.as_ref());
        self.text.push_str(":\n");
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_is_never_prefixed() {
        assert_eq!(mips_label("main"), "main");
        assert_eq!(mips_label("div"), "_div");
        assert_eq!(mips_label("L0"), "_L0");
    }
}
