//! Link-graph mutation core.
//!
//! # Responsibility
//! - Decide which directional edges realize a connect/disconnect request.
//! - Execute those writes against the per-type stores in a fixed order.
//! - Surface partial writes distinctly so callers can repair them.
//!
//! # Invariants
//! - Self-links are rejected before any store call.
//! - Within one request, the source-side write always precedes the
//!   target-side write.
//! - Repeating a completed connect is a no-op success unless strict
//!   semantics were requested.

use crate::model::entity::{EntityId, EntityType};
use crate::repo::entity_store::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod protocol;
pub mod registry;
pub mod service;

pub use protocol::{DirectedWrite, LinkMutation, LinkPlan, PlanKind};
pub use service::{LinkOutcome, LinkSaga, LinkService};

pub type LinkResult<T> = Result<T, LinkError>;

/// Link operation error taxonomy.
#[derive(Debug)]
pub enum LinkError {
    /// An endpoint id does not resolve in its store.
    TargetNotFound { id: EntityId, kind: EntityType },
    /// Source and target ids are identical.
    InvalidSelfLink(EntityId),
    /// An endpoint exists but is archived or deleted.
    InactiveEndpoint { id: EntityId, kind: EntityType },
    /// Source already lists the target and the caller asked for strict mode.
    AlreadyLinked {
        source: EntityId,
        target: EntityId,
    },
    /// The source-side write landed but the target-side write failed.
    ///
    /// The graph holds a one-directional edge until `pending` is applied.
    PartialLinkFailure {
        completed: DirectedWrite,
        pending: DirectedWrite,
        error: RepoError,
    },
    /// Store rejected a call for reasons unrelated to graph validation.
    StoreUnavailable(RepoError),
}

impl LinkError {
    /// The missing write of a partial failure, if any.
    pub fn pending_write(&self) -> Option<&DirectedWrite> {
        match self {
            Self::PartialLinkFailure { pending, .. } => Some(pending),
            _ => None,
        }
    }

    /// Stable snake_case code for envelopes and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TargetNotFound { .. } => "target_not_found",
            Self::InvalidSelfLink(_) => "invalid_self_link",
            Self::InactiveEndpoint { .. } => "inactive_endpoint",
            Self::AlreadyLinked { .. } => "already_linked",
            Self::PartialLinkFailure { .. } => "partial_link_failure",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Whether the error was raised before any store mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound { .. }
                | Self::InvalidSelfLink(_)
                | Self::InactiveEndpoint { .. }
                | Self::AlreadyLinked { .. }
        )
    }
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetNotFound { id, kind } => write!(f, "link target not found: {kind} {id}"),
            Self::InvalidSelfLink(id) => write!(f, "cannot link {id} to itself"),
            Self::InactiveEndpoint { id, kind } => {
                write!(f, "link endpoint is archived or deleted: {kind} {id}")
            }
            Self::AlreadyLinked { source, target } => {
                write!(f, "{source} is already linked to {target}")
            }
            Self::PartialLinkFailure {
                completed,
                pending,
                error,
            } => write!(
                f,
                "partial link failure: {} written, {} pending: {error}",
                completed.describe(),
                pending.describe()
            ),
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PartialLinkFailure { error, .. } => Some(error),
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LinkError {
    fn from(value: RepoError) -> Self {
        Self::StoreUnavailable(value)
    }
}
