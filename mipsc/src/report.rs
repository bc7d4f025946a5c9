use codespan_reporting::{
    diagnostic::{Label, Severity},
    files::{Files, SimpleFile},
    term,
};

use mipsc_lib::diagnostic::Diagnostic;

/// Renders the collected diagnostics to stderr with the offending
/// source line highlighted. The per-line letter codes in `error.txt`
/// stay the authoritative output; this is for humans.
pub fn eprint_diagnostics(diagnostics: &[Diagnostic], file: &SimpleFile<String, String>) {
    let mut writer = term::termcolor::StandardStream::stderr(term::termcolor::ColorChoice::Auto);
    let config = term::Config::default();

    for d in diagnostics {
        let span = file
            .line_range((), d.line().saturating_sub(1) as usize)
            .unwrap_or(0..0);

        let diagnostic = codespan_reporting::diagnostic::Diagnostic::new(Severity::Error)
            .with_message(d.message())
            .with_code(d.code().to_string())
            .with_labels(vec![Label::primary((), span)]);

        let _ = term::emit(&mut writer, &config, file, &diagnostic);
    }
}
