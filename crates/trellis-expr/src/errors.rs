use thiserror::Error;

/// Compilation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The source text does not conform to the expression grammar.
    #[error("invalid expression \"{source_text}\": {message}")]
    Invalid {
        source_text: String,
        message: String,
    },
}

/// Evaluation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A referenced variable is not defined in the store (strict mode only).
    #[error("variable '{name}' is not defined")]
    MissingVariable { name: String },

    /// An operator was applied to a value it is not defined for.
    #[error("operator '{op}' is not defined for {found}")]
    TypeMismatch { op: &'static str, found: &'static str },

    /// The whole expression produced a non-boolean result.
    #[error("expression evaluated to {found}, expected a boolean")]
    NotBoolean { found: &'static str },
}
