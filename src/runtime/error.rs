use crate::language::{ast::AstError, errors::SyntaxError, span::Range};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("source did not parse")]
    ParseFailed { diagnostics: Vec<SyntaxError> },
    #[error("cannot {op} values of type {operands}")]
    TypeError {
        op: String,
        operands: String,
        range: Option<Range>,
    },
    #[error("name `{name}` is not defined")]
    NameError { name: String, range: Option<Range> },
    #[error("failed to call `{callee}`: {cause}")]
    CallError {
        callee: String,
        cause: String,
        range: Option<Range>,
    },
    #[error("'break' outside of a loop")]
    LoopMisuse { range: Option<Range> },
    #[error("evaluation cancelled by host")]
    Cancelled,
    #[error("internal invariant violated: {message}")]
    InternalInvariantViolated {
        message: String,
        range: Option<Range>,
    },
    #[error("{message}")]
    Runtime {
        message: String,
        range: Option<Range>,
    },
}

impl RuntimeError {
    pub fn type_error(op: impl Into<String>, operands: impl Into<String>, range: Range) -> Self {
        RuntimeError::TypeError {
            op: op.into(),
            operands: operands.into(),
            range: Some(range),
        }
    }

    pub fn runtime(message: impl Into<String>, range: Option<Range>) -> Self {
        RuntimeError::Runtime {
            message: message.into(),
            range,
        }
    }

    pub fn range(&self) -> Option<Range> {
        match self {
            RuntimeError::ParseFailed { diagnostics } => diagnostics.first().map(|d| d.range),
            RuntimeError::TypeError { range, .. }
            | RuntimeError::NameError { range, .. }
            | RuntimeError::CallError { range, .. }
            | RuntimeError::LoopMisuse { range }
            | RuntimeError::InternalInvariantViolated { range, .. }
            | RuntimeError::Runtime { range, .. } => *range,
            RuntimeError::Cancelled => None,
        }
    }
}

impl From<AstError> for RuntimeError {
    fn from(err: AstError) -> Self {
        RuntimeError::InternalInvariantViolated {
            message: err.message,
            range: Some(err.range),
        }
    }
}
