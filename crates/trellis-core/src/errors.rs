use thiserror::Error;

/// Result type alias using TrellisError
pub type Result<T> = std::result::Result<T, TrellisError>;

/// Stable error classification.
///
/// Every [`TrellisError`] variant maps onto exactly one kind; the kind (and
/// its `code()` string) is the contract for programmatic handling, while the
/// variant carries the human-readable context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A native value of unsupported shape reached the loader or the
    /// materializer was asked to produce a mapping from a non-mapping root.
    BadType,
    /// A path walk met a non-container where a container was expected, or a
    /// sequence was addressed by a non-numeric component.
    BadSelector,
    /// A `condition` key held an unsupported value, or its expression failed
    /// to compile or evaluate.
    BadCondition,
    /// A variable reference did not resolve and had no fallback.
    MissingVariable,
    /// A rule met a precondition violation at the addressed path.
    RuleFailed,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadType => "ERR_BAD_TYPE",
            ErrorKind::BadSelector => "ERR_BAD_SELECTOR",
            ErrorKind::BadCondition => "ERR_BAD_CONDITION",
            ErrorKind::MissingVariable => "ERR_MISSING_VARIABLE",
            ErrorKind::RuleFailed => "ERR_RULE_FAILED",
        }
    }
}

/// Error taxonomy for tree operations
///
/// Errors are never recovered internally: every operation surfaces the first
/// error it encounters and the caller decides what to do with it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrellisError {
    // ===== Loading / materializing =====
    /// The materializer was asked for a mapping but the root is not one
    #[error("expected a mapping at the root, found {found}")]
    NotAMapping { found: &'static str },

    /// The loader received a native value it cannot represent
    #[error("unsupported native value for key '{key}'")]
    UnsupportedValue { key: String },

    // ===== Selectors =====
    /// A selector walked into a node that cannot hold children
    #[error("selector '{selector}': expected a collection at '{component}', found {found}")]
    NotACollection {
        selector: String,
        component: String,
        found: &'static str,
    },

    /// A sequence was addressed with something that is not a valid index
    #[error("selector '{selector}': '{component}' is not a valid sequence position")]
    ListIndex {
        selector: String,
        component: String,
    },

    /// The terminal position of an insert selector is not a keyed entry
    #[error("selector '{selector}': cannot insert at {found}")]
    InsertTarget {
        selector: String,
        found: &'static str,
    },

    // ===== Conditions =====
    /// A condition string failed to compile
    #[error("invalid condition \"{source_text}\": {reason}")]
    InvalidCondition { source_text: String, reason: String },

    /// A condition expression failed to evaluate
    #[error("condition \"{source_text}\" evaluation failed: {reason}")]
    ConditionEval { source_text: String, reason: String },

    /// A condition key held something other than a boolean or a string
    #[error("condition value must be a boolean or a string, found {found}")]
    ConditionValue { found: &'static str },

    // ===== Variable references =====
    /// No alternative of a variable reference resolved
    #[error("no provider resolved variable reference '{reference}'")]
    MissingVariable { reference: String },

    /// A string holds a malformed variable reference
    #[error("malformed variable reference in \"{value}\": {reason}")]
    BadReference { value: String, reason: String },

    // ===== Rules =====
    /// A rule's precondition did not hold at the addressed path
    #[error("rule {rule} failed: {reason}")]
    RuleFailed { rule: &'static str, reason: String },
}

impl TrellisError {
    /// Get the stable kind classifying this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrellisError::NotAMapping { .. } | TrellisError::UnsupportedValue { .. } => {
                ErrorKind::BadType
            }
            TrellisError::NotACollection { .. }
            | TrellisError::ListIndex { .. }
            | TrellisError::InsertTarget { .. } => ErrorKind::BadSelector,
            TrellisError::InvalidCondition { .. }
            | TrellisError::ConditionEval { .. }
            | TrellisError::ConditionValue { .. } => ErrorKind::BadCondition,
            TrellisError::MissingVariable { .. } | TrellisError::BadReference { .. } => {
                ErrorKind::MissingVariable
            }
            TrellisError::RuleFailed { .. } => ErrorKind::RuleFailed,
        }
    }

    /// Get the stable error code for this error
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}
