use crate::parser::ParseError;
use crate::types::JsValue;

/// Failures surfaced to the embedding host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Malformed or unsupported program shape found while evaluating.
    #[error("SyntaxError: {0}")]
    SyntaxViolation(String),

    /// Misuse of a suspended computation, e.g. stepping a finished generator.
    #[error("SuspensionProtocolError: {0}")]
    SuspensionProtocol(String),

    /// A guest value that was thrown and never caught.
    #[error("Uncaught {message}")]
    Uncaught { message: String, value: JsValue },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a failed evaluation step.
///
/// `Thrown` is an ordinary guest exception that `try`/`catch` can intercept;
/// `Fatal` skips every `catch` clause (finally blocks still run).
#[derive(Debug)]
pub enum EvalError {
    Thrown(JsValue),
    Fatal(EngineError),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl From<EngineError> for EvalError {
    fn from(e: EngineError) -> Self {
        EvalError::Fatal(e)
    }
}

impl EvalError {
    pub fn syntax(message: impl Into<String>) -> Self {
        EvalError::Fatal(EngineError::SyntaxViolation(message.into()))
    }

    pub fn suspension(message: impl Into<String>) -> Self {
        EvalError::Fatal(EngineError::SuspensionProtocol(message.into()))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::Fatal(_))
    }
}
