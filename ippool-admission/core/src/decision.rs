use crate::{lifecycle::Reconcile, pool::PoolSpec};
use http::StatusCode;
use std::fmt;

/// Reason given when a request does not change any pool.
pub const BY_PASS: &str = "by pass";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// The outcome of inspecting a single admission request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow(String),
    Forward(Forward),
    Reject(Rejection),
}

/// A pool change handed to the [`Reconcile`] implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Forward {
    Create {
        pool: PoolSpec,
        namespace: String,
    },
    Update {
        old: PoolSpec,
        new: PoolSpec,
        namespace: String,
    },
    Delete {
        pool: PoolSpec,
        namespace: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

/// The final admission outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow(String),
    Reject(Rejection),
}

// === impl Operation ===

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Decision ===

impl Decision {
    pub fn by_pass() -> Self {
        Self::Allow(BY_PASS.to_string())
    }

    pub(crate) fn bad_request(error: impl fmt::Display) -> Self {
        Self::Reject(Rejection::new(StatusCode::BAD_REQUEST, error))
    }

    /// A short label for the decision, suitable for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow(_) => "bypass",
            Self::Forward(_) => "forward",
            Self::Reject(_) => "reject",
        }
    }

    /// Turns the decision into a verdict, invoking `gateway` when the pool
    /// changed. The gateway's verdict is returned as-is.
    pub async fn resolve<R>(self, gateway: &R) -> Verdict
    where
        R: Reconcile + ?Sized,
    {
        match self {
            Self::Allow(reason) => Verdict::Allow(reason),
            Self::Reject(rejection) => Verdict::Reject(rejection),
            Self::Forward(Forward::Create { pool, namespace }) => {
                gateway.on_create(&pool, &namespace).await
            }
            Self::Forward(Forward::Update {
                old,
                new,
                namespace,
            }) => gateway.on_update(&old, &new, &namespace).await,
            Self::Forward(Forward::Delete { pool, namespace }) => {
                gateway.on_delete(&pool, &namespace).await
            }
        }
    }
}

// === impl Forward ===

impl Forward {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
        }
    }
}

// === impl Rejection ===

impl Rejection {
    pub fn new(status: StatusCode, message: impl fmt::Display) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

// === impl Verdict ===

impl Verdict {
    pub fn by_pass() -> Self {
        Self::Allow(BY_PASS.to_string())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}
