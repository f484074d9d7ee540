use super::expression::ArgumentKind;

/// Failure to turn a policy expression into a load balancing policy.
///
/// Every variant is terminal for the expression that produced it: the input is
/// static configuration, so callers should surface it at startup rather than retry.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Unbalanced parentheses or quotes, empty arguments, trailing text
    #[error("malformed policy expression `{expression}`: {reason}")]
    MalformedExpression {
        expression: String,
        reason: &'static str,
    },

    /// No registry entry for the (qualified) policy name
    #[error("unknown load balancing policy `{0}`")]
    UnknownPolicy(String),

    /// The argument kinds match none of the policy's constructors
    #[error("no constructor of `{policy}` accepts ({})", signature(.kinds))]
    ArgumentTypeMismatch {
        policy: String,
        kinds: Vec<ArgumentKind>,
    },

    /// A literal that cannot be read, or a value out of range for its parameter
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// A child policy failed to build; the cause is available via `source()`
    #[error("failed to build child policy of `{policy}`")]
    NestedConstructionFailure {
        policy: String,
        #[source]
        source: Box<PolicyError>,
    },

    /// Returned by `PolicyParser::parse_required` for input that names no policy
    #[error("no load balancing policy specified in `{0}`")]
    NoPolicySpecified(String),
}

impl PolicyError {
    pub(crate) fn malformed(expression: &str, reason: &'static str) -> Self {
        Self::MalformedExpression {
            expression: expression.to_string(),
            reason,
        }
    }

    pub(crate) fn invalid(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error, following nested construction failures.
    pub fn root_cause(&self) -> &PolicyError {
        match self {
            Self::NestedConstructionFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn signature(kinds: &[ArgumentKind]) -> String {
    kinds
        .iter()
        .map(ArgumentKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
