use std::fmt::{self, Display};

/// Single-letter diagnostic codes, fixed by the grading interface of the
/// source language. The letter is what ends up in `error.txt`.
// WARNING: Don't change the letters, they are part of the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Code {
    /// Illegal symbol (stray character, lone `&`/`|`, unterminated
    /// comment or string).
    IllegalSymbol,
    /// Redefinition of a name within one scope.
    Redefined,
    /// Use of an undefined name.
    Undefined,
    /// Wrong number of arguments in a call.
    ArgCountMismatch,
    /// Wrong kind of argument in a call (array vs. scalar).
    ArgKindMismatch,
    /// `return Exp;` inside a `void` function.
    ValueReturnInVoid,
    /// An `int` function whose body may fall through without `return`.
    MissingReturn,
    /// Assignment to a `const`.
    AssignToConst,
    /// Missing `;`.
    MissingSemicolon,
    /// Missing `)`.
    MissingRightParen,
    /// Missing `]`.
    MissingRightBracket,
    /// `printf` format specifier count differs from argument count.
    PrintfArgMismatch,
    /// `break`/`continue` outside of a loop.
    JumpOutsideLoop,
}

impl Code {
    pub fn letter(&self) -> char {
        match self {
            Code::IllegalSymbol => 'a',
            Code::Redefined => 'b',
            Code::Undefined => 'c',
            Code::ArgCountMismatch => 'd',
            Code::ArgKindMismatch => 'e',
            Code::ValueReturnInVoid => 'f',
            Code::MissingReturn => 'g',
            Code::AssignToConst => 'h',
            Code::MissingSemicolon => 'i',
            Code::MissingRightParen => 'j',
            Code::MissingRightBracket => 'k',
            Code::PrintfArgMismatch => 'l',
            Code::JumpOutsideLoop => 'm',
        }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A user-program diagnostic: a source line and a letter code, plus a
/// human-readable message for terminal reporting. Only line and letter
/// are authoritative (they form `error.txt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    line: u32,
    code: Code,
    message: String,
}

impl Diagnostic {
    pub fn new(line: u32, code: Code, message: impl Into<String>) -> Self {
        Self {
            line,
            code,
            message: message.into(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A result combining a value with aggregated diagnostics.
///
/// Unlike a `Result`, the value is always present: every stage of this
/// compiler recovers and produces *something*, and the driver decides
/// which downstream stages still make sense. A result with no
/// diagnostics is a clean build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult<T> {
    value: T,
    diagnostics: Vec<Diagnostic>,
}

impl<T> AggregateResult<T> {
    /// Creates an `AggregateResult` in a clean state containing the
    /// specified value.
    pub fn new_ok(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// `true` if no diagnostics were collected.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Maps the contained value, leaving diagnostics untouched.
    #[must_use]
    pub fn map<U, F>(self, op: F) -> AggregateResult<U>
    where
        F: FnOnce(T) -> U,
    {
        AggregateResult {
            value: op(self.value),
            diagnostics: self.diagnostics,
        }
    }

    /// Calls `op` on the value, aggregating the diagnostics of `self`
    /// with those of the result returned by `op`.
    #[must_use]
    pub fn and_then<U, F>(mut self, op: F) -> AggregateResult<U>
    where
        F: FnOnce(T) -> AggregateResult<U>,
    {
        let mut other = op(self.value);
        self.diagnostics.append(&mut other.diagnostics);
        AggregateResult {
            value: other.value,
            diagnostics: self.diagnostics,
        }
    }

    /// Moves the diagnostics of `other` into `self`, returning
    /// `other`'s value.
    pub fn absorb<U>(&mut self, mut other: AggregateResult<U>) -> U {
        self.diagnostics.append(&mut other.diagnostics);
        other.value
    }
}

/// Sorts diagnostics by line and keeps at most one per line (the first
/// one encountered), which is the `error.txt` contract.
pub fn sort_and_dedup(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by_key(|d| d.line);
    diagnostics.dedup_by_key(|d| d.line);
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_per_line() {
        let diags = vec![
            Diagnostic::new(3, Code::MissingSemicolon, ""),
            Diagnostic::new(1, Code::Redefined, ""),
            Diagnostic::new(3, Code::Undefined, ""),
        ];
        let out = sort_and_dedup(diags);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].line(), 1);
        assert_eq!(out[1].line(), 3);
        assert_eq!(out[1].code(), Code::MissingSemicolon);
    }

    #[test]
    fn aggregate_threads_diagnostics() {
        let mut res = AggregateResult::new_ok(1);
        res.add_diagnostic(Diagnostic::new(1, Code::IllegalSymbol, "bad"));
        let res = res.and_then(|v| {
            let mut inner = AggregateResult::new_ok(v + 1);
            inner.add_diagnostic(Diagnostic::new(2, Code::Redefined, "again"));
            inner
        });
        assert_eq!(*res.value(), 2);
        assert_eq!(res.diagnostics().count(), 2);
    }
}
