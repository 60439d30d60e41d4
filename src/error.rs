use thiserror::Error;

/// Top-level error type for the dxir pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", format_error_pretty("pass error", &format!("{}", _0)))]
    Pass(#[from] PassError),

    #[error("{}", format_error_pretty("interpreter error", &format!("{}", _0)))]
    Interp(#[from] InterpError),

    #[error("{}", format_error_pretty("print error", &format!("{}", _0)))]
    Print(#[from] std::fmt::Error),
}

/// Formats a pipeline error with its category prefix.
fn format_error_pretty(category: &str, msg: &str) -> String {
    format!("[{}] {}", category, msg)
}

// ---------------------------------------------------------------------------
// Pass errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PassError {
    #[error("unsupported shader in function '{func}': {detail}")]
    UnsupportedShader { func: String, detail: String },

    #[error("in function '{func}': {signature} signature has no element with id {id}")]
    UnknownSignatureElement {
        func: String,
        signature: &'static str,
        id: u32,
    },

    #[error("internal error in function '{func}': no output element for signature id {id}")]
    MissingOutputElement { func: String, id: u32 },

    #[error("internal error in function '{func}': {detail}")]
    Internal { func: String, detail: String },

    #[error("in function '{func}': output row index is {width}-bit but the scratch index is 32-bit")]
    IndexWidthMismatch { func: String, width: u32 },

    #[error("in function '{func}': value '{value}' is used before it has been defined")]
    UseBeforeDef { func: String, value: String },

    #[error("in function '{func}': value '{value}' is defined more than once")]
    MultipleDefinition { func: String, value: String },

    #[error("type error in function '{func}': {detail}")]
    TypeError { func: String, detail: String },

    #[error("in function '{func}': block '{block}' does not end with exactly one terminator")]
    MissingTerminator { func: String, block: String },

    #[error("no pass is registered under '{arg}'")]
    UnknownPass { arg: String },

    #[error("a pass is already registered under '{arg}'")]
    DuplicateRegistration { arg: String },

    #[error("pass '{pass}' must not run more than once in a pipeline")]
    PassScheduledTwice { pass: String },
}

// ---------------------------------------------------------------------------
// Interpreter errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InterpError {
    #[error("internal error: undefined value %{id}")]
    UndefinedValue { id: u32 },

    #[error("invalid pointer access: {detail}")]
    InvalidPointer { detail: String },

    #[error("type error: {detail}")]
    TypeError { detail: String },

    #[error("not supported by the interpreter: {detail}")]
    Unsupported { detail: String },
}

impl Error {
    /// Returns a stable diagnostic code for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Pass(p) => match p {
                PassError::UnsupportedShader { .. } => "E0200",
                PassError::UnknownSignatureElement { .. } => "E0201",
                PassError::MissingOutputElement { .. } => "E0202",
                PassError::IndexWidthMismatch { .. } => "E0203",
                PassError::Internal { .. } => "E0204",
                PassError::UseBeforeDef { .. } => "E0210",
                PassError::MultipleDefinition { .. } => "E0211",
                PassError::TypeError { .. } => "E0212",
                PassError::MissingTerminator { .. } => "E0213",
                PassError::UnknownPass { .. } => "E0220",
                PassError::DuplicateRegistration { .. } => "E0221",
                PassError::PassScheduledTwice { .. } => "E0222",
            },
            Error::Interp(_) => "E0400",
            Error::Print(_) => "E0500",
        }
    }
}
