//! Error types for the authorization core

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for policy generation, compilation, and evaluation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A policy rule references a criterion that is not registered
    #[error("unknown criterion '{name}' in '{action}' rule")]
    UnknownCriterion { name: String, action: String },

    /// A criterion was given configuration it cannot lower
    #[error("invalid criterion '{name}': {message}")]
    InvalidCriterion { name: String, message: String },

    /// The policy document itself is malformed
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Rule source failed to parse or failed semantic checks
    #[error("compile error: {0}")]
    Compile(String),

    /// One script unit failed while the evaluator was being constructed
    #[error("failed to compile policy script {index} ({origin}): {source}")]
    Script {
        index: usize,
        origin: String,
        #[source]
        source: Box<Error>,
    },

    /// The rule engine failed while executing a query
    #[error("evaluation error: {0}")]
    Eval(String),

    /// A query produced no result (the engine guarantees at least one)
    #[error("unexpected empty result from policy script {index}")]
    EmptyResult { index: usize },

    /// One query failed during evaluation
    #[error("error evaluating policy script {index}: {source}")]
    Query {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// The operation ran past its deadline
    #[error("operation timed out")]
    Timeout,
}

/// The phase an error belongs to.
///
/// Construction errors block policy activation, evaluation errors abort a
/// single authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Construction,
    Evaluation,
    Other,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Construction => "construction",
            Self::Evaluation => "evaluation",
            Self::Other => "other",
        }
    }
}

impl Error {
    /// Create a new invalid-criterion error
    pub fn invalid_criterion(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCriterion {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid-policy error
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    /// Create a new compile error
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Create a new evaluation error
    pub fn eval(msg: impl Into<String>) -> Self {
        Self::Eval(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a construction failure of one script unit
    pub fn script(index: usize, origin: impl Into<String>, source: Error) -> Self {
        Self::Script {
            index,
            origin: origin.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an evaluation failure of one query
    pub fn query(index: usize, source: Error) -> Self {
        Self::Query {
            index,
            source: Box::new(source),
        }
    }

    /// Classify the error by the phase that produced it
    pub fn phase(&self) -> Phase {
        match self {
            Self::UnknownCriterion { .. }
            | Self::InvalidCriterion { .. }
            | Self::InvalidPolicy(_)
            | Self::Compile(_)
            | Self::Script { .. } => Phase::Construction,
            Self::Eval(_) | Self::EmptyResult { .. } | Self::Query { .. } => Phase::Evaluation,
            Self::Cancelled
            | Self::Timeout
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Yaml(_) => Phase::Other,
        }
    }
}
