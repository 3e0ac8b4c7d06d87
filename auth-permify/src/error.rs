use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where a remote authorization call failed: operation, tenant and the
/// entity it was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub operation: &'static str,
    pub tenant: String,
    pub entity: Option<String>,
}

impl OperationContext {
    pub fn new(operation: &'static str, tenant: impl Into<String>) -> Self {
        Self {
            operation,
            tenant: tenant.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl fmt::Display) -> Self {
        self.entity = Some(entity.to_string());
        self
    }
}

impl fmt::Display for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(ref entity) => write!(f, "{} [tenant={}, entity={}]", self.operation, self.tenant, entity),
            None => write!(f, "{} [tenant={}]", self.operation, self.tenant),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("{operation}: invalid input: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },

    #[error("{context}: transport failure: {message}")]
    Transport {
        context: OperationContext,
        message: String,
    },

    #[error("{context}: deadline of {after:?} elapsed")]
    Timeout {
        context: OperationContext,
        after: Duration,
    },

    #[error("{context}: engine rejected request (code {code}): {message}")]
    Engine {
        context: OperationContext,
        code: i32,
        message: String,
    },
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any remote call.
    Validation,
    /// The engine could not be asked (includes timeouts).
    Transport,
    /// The engine was asked and refused.
    Engine,
}

impl AuthzError {
    pub fn validation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            operation,
            message: message.into(),
        }
    }

    pub fn transport(context: OperationContext, message: impl Into<String>) -> Self {
        Self::Transport {
            context,
            message: message.into(),
        }
    }

    pub fn engine(context: OperationContext, code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            context,
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::Validation { .. } => ErrorKind::Validation,
            AuthzError::Transport { .. } | AuthzError::Timeout { .. } => ErrorKind::Transport,
            AuthzError::Engine { .. } => ErrorKind::Engine,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthzError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transport_kind() {
        let err = AuthzError::Timeout {
            context: OperationContext::new("permission.check", "t1"),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_context_in_message() {
        let err = AuthzError::engine(
            OperationContext::new("data.write", "t1").with_entity("post:42"),
            3,
            "relation not found",
        );
        let message = err.to_string();
        assert!(message.contains("data.write"));
        assert!(message.contains("tenant=t1"));
        assert!(message.contains("post:42"));
        assert_eq!(err.kind(), ErrorKind::Engine);
    }
}
