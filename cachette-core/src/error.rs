use thiserror::Error;

/// Errors detected while resolving a cache declaration.
///
/// Configuration errors are surfaced at declaration resolution time, the
/// earliest possible point. A declaration that fails to resolve is disabled
/// for the lifetime of the process; calls through it run uncached.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The declaration (or the global default) names a serialization policy
    /// that is not registered.
    #[error("unknown serial policy `{0}`")]
    UnknownSerialPolicy(String),

    /// The declaration (or the global default) names a key convertor that is
    /// not registered.
    #[error("unknown key convertor `{0}`")]
    UnknownKeyConvertor(String),

    /// The declaration needs a remote tier but no remote store was registered
    /// for its area in the global configuration.
    #[error("no remote store registered for area `{0}`")]
    NoRemoteStore(String),

    /// Two distinct declarations ended up with the same `(area, name)` pair
    /// and at least one of the names was auto-derived. Sharing an explicit
    /// name is intentional; colliding auto-derived names are a bug.
    #[error("cache name `{area}/{name}` is claimed by both `{first}` and `{second}`")]
    NameCollision {
        area: String,
        name: String,
        first: String,
        second: String,
    },

    /// A `key`, `condition` or `post_condition` expression failed to compile.
    #[error("invalid `{attribute}` expression: {source}")]
    Expression {
        attribute: &'static str,
        #[source]
        source: ExprError,
    },
}

/// Errors raised by the expression engine.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("type error: {0}")]
    Type(String),

    /// A `condition` or `post_condition` evaluated to a non-boolean value.
    /// There is no truthiness coercion; this fails closed.
    #[error("expression result is not a boolean")]
    NotBoolean,
}

impl ExprError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        ExprError::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        ExprError::Type(message.into())
    }
}

/// Errors raised while deriving a cache key from a call's arguments.
///
/// A key derivation failure disables caching for that single call; the real
/// computation still runs.
#[derive(Debug, Error)]
pub enum KeyError {
    /// An argument could not be captured into a structural value.
    #[error("argument `{name}` cannot be captured: {message}")]
    Capture { name: &'static str, message: String },

    /// The `key` expression failed to evaluate.
    #[error("key expression failed: {0}")]
    Expression(#[from] ExprError),

    /// The `none` key convertor requires a single string/number/bool argument.
    #[error("key convertor `none` requires a single primitive argument")]
    NotPrimitive,
}

/// Errors raised by a cache tier.
///
/// Tier errors never reach the caller of a cached function: a read failure
/// is folded into a miss and a write failure only skips the write.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("deserialization failed: {0}")]
    Deserialize(String),

    #[error("remote store error: {0}")]
    Store(String),
}
