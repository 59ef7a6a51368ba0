use crate::diagnostics::codes;

pub type ParseResult<T> = Result<T, SyntaxError>;
pub type EvalResult<T> = Result<T, EvalError>;

/// A lexical or grammatical failure. `offset` is a byte offset into the parsed text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Errors raised while building tables or other host-side model data.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("schema mismatch for {table}: expected {expected} values, got {actual}")]
    SchemaMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("duplicate column {table}.{column}")]
    DuplicateColumn { table: String, column: String },

    #[error("invalid type declaration '{0}'")]
    InvalidType(String),
}

/// A runtime evaluation failure.
///
/// Each variant maps to exactly one stable code (see [`EvalError::code`]). Errors raised by
/// std functions that don't fit a dedicated variant use [`EvalError::Function`]; anything else
/// falls back to [`EvalError::Eval`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("non-finite result in {0}")]
    NonFinite(String),

    #[error("array length mismatch: {left} vs {right} elements")]
    LengthMismatch { left: usize, right: usize },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: String, len: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("disallowed call: {0}")]
    DisallowedCall(String),

    #[error("banned identifier '{0}'")]
    BannedIdentifier(String),

    #[error("{function} expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("{function}: {message}")]
    Function { function: String, message: String },

    #[error("evaluation nesting exceeds {0} levels")]
    NestingLimit(usize),

    #[error("upstream error in {0}")]
    Upstream(String),

    #[error("row {label}: {source}")]
    Row {
        label: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("{0}")]
    Eval(String),
}

impl EvalError {
    /// The stable diagnostic code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::DivisionByZero => codes::DIVISION_BY_ZERO,
            EvalError::NonFinite(_) => codes::NON_FINITE,
            EvalError::LengthMismatch { .. } => codes::LENGTH_MISMATCH,
            EvalError::UnknownIdentifier(_) => codes::UNKNOWN_IDENTIFIER,
            EvalError::UnknownProperty(_) => codes::UNKNOWN_PROPERTY,
            EvalError::IndexOutOfRange { .. } => codes::INDEX_OUT_OF_RANGE,
            EvalError::TypeMismatch(_) => codes::TYPE_MISMATCH,
            EvalError::DisallowedCall(_) => codes::DISALLOWED_CALL,
            EvalError::BannedIdentifier(_) => codes::BANNED_IDENTIFIER,
            EvalError::Arity { .. } => codes::ARITY,
            EvalError::Function { .. } => codes::FUNCTION_ERROR,
            EvalError::NestingLimit(_) => codes::NESTING_LIMIT,
            EvalError::Upstream(_) => codes::UPSTREAM_ERROR,
            EvalError::Row { source, .. } => source.code(),
            EvalError::Eval(_) => codes::EVAL_ERROR,
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch(message.into())
    }

    pub(crate) fn in_row(self, label: impl Into<String>) -> Self {
        EvalError::Row {
            label: label.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_errors_keep_the_inner_code() {
        let err = EvalError::UnknownProperty("price".into()).in_row("\"sku-1\"");
        assert_eq!(err.code(), codes::UNKNOWN_PROPERTY);
        assert_eq!(err.to_string(), "row \"sku-1\": unknown property 'price'");
    }

    #[test]
    fn upstream_message_names_the_failed_node() {
        let err = EvalError::Upstream("x".into());
        assert_eq!(err.to_string(), "upstream error in x");
        assert_eq!(err.code(), codes::UPSTREAM_ERROR);
    }
}
