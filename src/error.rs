//! Error types for model loading, policy management and enforcement

use thiserror::Error;

/// Errors raised by the decision engine
#[derive(Error, Debug)]
pub enum WardenError {
    /// Model text could not be parsed
    #[error("Model parse error at line {line}: {message}")]
    ModelParse { line: usize, message: String },

    /// Model is missing a required section
    #[error("Model is missing required section: {0}")]
    MissingSection(String),

    /// Assertion (section + type) not present in the model
    #[error("Assertion not found: {section}.{key}")]
    AssertionNotFound { section: String, key: String },

    /// Role definition referenced but never declared
    #[error("Role type not found: {0}")]
    RoleTypeNotFound(String),

    /// Unknown policy effect expression
    #[error("Unsupported policy effect: {0}")]
    UnsupportedEffect(String),

    /// `eval()` used in the matcher but no policy row supplied a rule
    #[error("eval() rule missing: make sure the rule exists in the policy when using eval() in a matcher")]
    EvalRuleMissing,

    /// Matcher calls a function that was never registered
    #[error("Unknown function in matcher: {0}")]
    UnknownFunction(String),

    /// Request has fewer values than the request definition declares
    #[error("Invalid request size: expected {expected}, got {actual}")]
    RequestArity { expected: usize, actual: usize },

    /// Policy row has fewer values than the policy definition declares
    #[error("Invalid policy size: expected {expected}, got {actual}")]
    PolicyArity { expected: usize, actual: usize },

    /// Matcher expression is syntactically invalid
    #[error("Expression parse error at offset {offset}: {message}")]
    ExpressionParse { offset: usize, message: String },

    /// Matcher references a field the model does not declare
    #[error("Unknown token in matcher: {0}")]
    UnknownToken(String),

    /// Matcher expression evaluated to an unexpected type
    #[error("Expression type error: {0}")]
    ExpressionType(String),

    /// Function called with the wrong number of arguments
    #[error("Function {name} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        name: String,
        expected: String,
        actual: usize,
    },

    /// Malformed IP address or CIDR literal
    #[error("Invalid IP address or CIDR: {0}")]
    InvalidIp(String),

    /// Pattern could not be compiled to a regex
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Malformed glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),

    /// Role graph edit on an unknown role
    #[error("Name not found in role graph: {0}")]
    NameNotFound(String),

    /// Priority column holds a non-integer value
    #[error("Invalid priority value: {0}")]
    InvalidPriority(String),

    /// Configuration failed to parse or validate
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML deserialization failed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Adapter operation failed
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Watcher notification failed
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// JSON request object could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
