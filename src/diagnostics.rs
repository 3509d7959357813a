use crate::language::errors::SyntaxError;
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: "here".to_string(),
        }
    }
}

pub fn emit_syntax_errors(name: &str, source: &str, errors: &[SyntaxError]) {
    let src = NamedSource::new(name, source.to_string());
    for err in errors {
        let diagnostic = SyntaxDiagnostic::from_error(src.clone(), err);
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct RuntimeDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("while evaluating this")]
    span: SourceSpan,
    message: String,
}

pub fn report_runtime_error(name: &str, source: &str, error: &RuntimeError) {
    if let RuntimeError::ParseFailed { diagnostics } = error {
        emit_syntax_errors(name, source, diagnostics);
        return;
    }
    match error.range() {
        Some(range) => {
            let diagnostic = RuntimeDiagnostic {
                src: NamedSource::new(name, source.to_string()),
                span: (range.start.byte, range.len().max(1)).into(),
                message: error.to_string(),
            };
            eprintln!("{:?}", Report::new(diagnostic));
        }
        None => eprintln!("Runtime error: {error}"),
    }
}
