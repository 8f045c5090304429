//! Link use-case service.
//!
//! # Responsibility
//! - Execute resolved link plans against per-type stores.
//! - Record saga progress so a failed second write is reported, not hidden.
//! - Complete one-directional links left behind by earlier failures.
//!
//! # Invariants
//! - Validation (self-link, missing or inactive endpoint) happens before any
//!   store write.
//! - Writes are issued sequentially: primary, then secondary.
//! - No compensating rollback: a failed secondary write leaves the primary in
//!   place and is returned as `PartialLinkFailure`.

use crate::link::protocol::{
    resolve_connect, resolve_disconnect, DirectedWrite, LinkPlan, PlanKind,
};
use crate::link::registry::find_asymmetric_edges;
use crate::link::{LinkError, LinkResult};
use crate::model::entity::{now_epoch_ms, Entity};
use crate::model::link::{LinkRequest, NodeKey};
use crate::repo::entity_store::{load_snapshot, EntityStores};
use log::{error, info, warn};
use std::time::Instant;

/// Progress record of one two-step link operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSaga {
    pub plan: LinkPlan,
    pub primary_written: bool,
    pub secondary_written: bool,
}

impl LinkSaga {
    fn new(plan: LinkPlan) -> Self {
        Self {
            plan,
            primary_written: false,
            secondary_written: false,
        }
    }

    /// Number of store writes actually issued.
    pub fn writes(&self) -> usize {
        usize::from(self.primary_written) + usize::from(self.secondary_written)
    }

    /// Whether the request changed nothing.
    pub fn is_noop(&self) -> bool {
        self.writes() == 0
    }
}

/// Result of a completed connect/disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    /// Source entity as persisted after the operation.
    pub source: Entity,
    /// Target entity after the operation; `None` when a disconnect found the
    /// target already gone.
    pub target: Option<Entity>,
    pub saga: LinkSaga,
}

/// Connect/disconnect entry points over a set of entity stores.
pub struct LinkService<S: EntityStores> {
    stores: S,
}

impl<S: EntityStores> LinkService<S> {
    pub fn new(stores: S) -> Self {
        Self { stores }
    }

    /// Connects source and target, writing whichever directions are missing.
    ///
    /// # Errors
    /// - `InvalidSelfLink`, `TargetNotFound`, `InactiveEndpoint` before any
    ///   write.
    /// - `AlreadyLinked` in strict mode when the source already lists the
    ///   target.
    /// - `PartialLinkFailure` when only the primary write landed.
    /// - `StoreUnavailable` for any other store rejection.
    pub fn connect(&self, request: &LinkRequest) -> LinkResult<LinkOutcome> {
        let started_at = Instant::now();
        info!(
            "event=link_connect module=link status=start source_type={} target_type={} link_type={} strict={}",
            request.source_type, request.target_type, request.link_type, request.strict
        );
        let result = self.connect_inner(request);
        log_result("link_connect", started_at, &result);
        result
    }

    /// Removes the link between source and target in both directions.
    ///
    /// Absent edges are a no-op; a target that no longer resolves is skipped
    /// so dangling edges can still be removed from the source.
    pub fn disconnect(&self, request: &LinkRequest) -> LinkResult<LinkOutcome> {
        let started_at = Instant::now();
        info!(
            "event=link_disconnect module=link status=start source_type={} target_type={}",
            request.source_type, request.target_type
        );
        let result = self.disconnect_inner(request);
        log_result("link_disconnect", started_at, &result);
        result
    }

    /// Applies one pending write, typically taken from a
    /// `PartialLinkFailure`. Idempotent.
    pub fn repair(&self, pending: &DirectedWrite) -> LinkResult<Entity> {
        self.lookup(pending.owner_key())?
            .ok_or(LinkError::TargetNotFound {
                id: pending.owner_id,
                kind: pending.owner_type,
            })?;

        match pending.apply(&self.stores) {
            Ok(entity) => {
                info!(
                    "event=link_repair module=link status=ok owner_type={} target_type={}",
                    pending.owner_type,
                    pending.target_key().kind
                );
                Ok(entity)
            }
            Err(err) => {
                error!(
                    "event=link_repair module=link status=error owner_type={} error={err}",
                    pending.owner_type
                );
                Err(LinkError::StoreUnavailable(err))
            }
        }
    }

    /// Scans every store for one-directional edges and writes the missing
    /// reciprocals. Returns the number of edges written.
    pub fn repair_asymmetric(&self) -> LinkResult<usize> {
        let snapshot = load_snapshot(&self.stores)?;
        let missing = find_asymmetric_edges(&snapshot);
        if missing.is_empty() {
            return Ok(0);
        }

        warn!(
            "event=link_repair_scan module=link status=asymmetric count={}",
            missing.len()
        );
        for write in &missing {
            self.repair(write)?;
        }
        Ok(missing.len())
    }

    fn connect_inner(&self, request: &LinkRequest) -> LinkResult<LinkOutcome> {
        let now = now_epoch_ms();
        let plan = resolve_connect(request, now)?;
        let source = self.require_active(request.source_key())?;
        let target = self.require_active(request.target_key())?;

        let need_primary = plan.primary.is_needed_for(&source);
        let need_secondary = plan.secondary.is_needed_for(&target);

        if !need_primary && request.strict {
            return Err(LinkError::AlreadyLinked {
                source: request.source_id,
                target: request.target_id,
            });
        }

        let mut saga = LinkSaga::new(plan);
        if !need_primary && !need_secondary {
            return Ok(LinkOutcome {
                source,
                target: Some(target),
                saga,
            });
        }

        if saga.plan.kind == PlanKind::Mirrored && need_primary && need_secondary {
            let mirrored = self.stores.store(request.source_type).persist_mirror_add(
                request.source_id,
                request.target_id,
                request.link_type,
                now,
            )?;
            if let Some((source, target)) = mirrored {
                saga.primary_written = true;
                saga.secondary_written = true;
                return Ok(LinkOutcome {
                    source,
                    target: Some(target),
                    saga,
                });
            }
        }

        self.run_saga(saga, source, Some(target), need_primary, need_secondary)
    }

    fn disconnect_inner(&self, request: &LinkRequest) -> LinkResult<LinkOutcome> {
        let plan = resolve_disconnect(request)?;
        let source = self
            .lookup(request.source_key())?
            .ok_or(LinkError::TargetNotFound {
                id: request.source_id,
                kind: request.source_type,
            })?;
        let target = self.lookup(request.target_key())?;

        let need_primary = plan.primary.is_needed_for(&source);
        let need_secondary = target
            .as_ref()
            .is_some_and(|target| plan.secondary.is_needed_for(target));

        self.run_saga(
            LinkSaga::new(plan),
            source,
            target,
            need_primary,
            need_secondary,
        )
    }

    fn run_saga(
        &self,
        mut saga: LinkSaga,
        mut source: Entity,
        mut target: Option<Entity>,
        need_primary: bool,
        need_secondary: bool,
    ) -> LinkResult<LinkOutcome> {
        if need_primary {
            source = saga.plan.primary.apply(&self.stores)?;
            saga.primary_written = true;
        }

        if need_secondary {
            match saga.plan.secondary.apply(&self.stores) {
                Ok(updated) => {
                    target = Some(updated);
                    saga.secondary_written = true;
                }
                Err(error) if saga.primary_written => {
                    return Err(LinkError::PartialLinkFailure {
                        completed: saga.plan.primary,
                        pending: saga.plan.secondary,
                        error,
                    });
                }
                Err(error) => return Err(LinkError::StoreUnavailable(error)),
            }
        }

        Ok(LinkOutcome {
            source,
            target,
            saga,
        })
    }

    fn lookup(&self, key: NodeKey) -> LinkResult<Option<Entity>> {
        Ok(self.stores.store(key.kind).find_by_id(key.id)?)
    }

    fn require_active(&self, key: NodeKey) -> LinkResult<Entity> {
        let entity = self.lookup(key)?.ok_or(LinkError::TargetNotFound {
            id: key.id,
            kind: key.kind,
        })?;
        if !entity.is_active() {
            return Err(LinkError::InactiveEndpoint {
                id: key.id,
                kind: key.kind,
            });
        }
        Ok(entity)
    }
}

fn log_result(event: &str, started_at: Instant, result: &LinkResult<LinkOutcome>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(outcome) => info!(
            "event={event} module=link status=ok duration_ms={duration_ms} writes={} noop={}",
            outcome.saga.writes(),
            outcome.saga.is_noop()
        ),
        Err(err) if err.is_validation() => warn!(
            "event={event} module=link status=rejected duration_ms={duration_ms} error_code={}",
            err.code()
        ),
        Err(err) => error!(
            "event={event} module=link status=error duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
}
