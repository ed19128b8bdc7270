use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("syntax error at byte {offset}: {detail}")]
    Syntax { offset: usize, detail: String },

    #[error("expression nesting exceeds the maximum depth of {max_depth}")]
    TooDeep { max_depth: usize },

    #[error("predicate programs must produce a boolean value")]
    NotBoolean,

    #[error("trailing input after expression: {rest:?}")]
    TrailingInput { rest: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown binding: {0}")]
    UnknownBinding(String),

    #[error("field {field:?} not found on {on}")]
    NoSuchField { on: String, field: String },

    #[error("type error: expected {expected}, found {found}")]
    TypeError { expected: String, found: String },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("function {name} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("evaluation exceeded the step budget of {budget}")]
    StepBudgetExceeded { budget: u32 },

    #[error("a link() marker must be a non-empty string")]
    EmptyLinkMarker,
}
