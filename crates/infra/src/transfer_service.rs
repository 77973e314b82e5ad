//! Transfer request operations over the event store and the stock ledger.
//!
//! Every transition runs inside one commit section:
//!
//! ```text
//! load + rehydrate
//!   ↓
//! expected version check           (stale snapshot → ConcurrencyConflict)
//!   ↓
//! handle (pure decision)           (rule failure → Validation / InvalidTransition)
//!   ↓
//! stock movements, all or nothing  (short stock → InsufficientStock; approval reserves what is left)
//!   ↓
//! append with exact version        (failure → movements reverted)
//!   ↓
//! summary projection + bus publish
//! ```
//!
//! A failed call leaves both the request and the stock untouched.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use stockmove_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion, LocationId, ProductId,
    UserId,
};
use stockmove_events::{EventBus, EventEnvelope};
use stockmove_inventory::{LocationType, StockError, StockKey, StockMovement};
use stockmove_transfers::{
    AGGREGATE_TYPE, ActivityLogEntry, AddLine, ApproveTransfer, CancelTransfer, CreateTransfer,
    LineDraft, LineQuantity, ReceiveTransfer, RejectTransfer, RemoveLine, ShipTransfer,
    SubmitTransfer, TransferCommand, TransferError, TransferEvent, TransferFilter,
    TransferOperation, TransferPriority, TransferReason, TransferRequest, TransferRequestId,
    TransferStatus, TransferSummary, ValidationIssue, ValidationResult, history_from_events,
    stock_movements,
};

use crate::config::TransferConfig;
use crate::event_store::{EventStore, EventStoreError, StoredEvent};
use crate::numbering::RequestNumberGenerator;
use crate::projections::{TransferSummariesProjection, TransferSummaryProjectionError};
use crate::read_model::{InMemoryReadModelStore, ReadModelStore};
use crate::repository::{Repository, RepositoryError};
use crate::stock_ledger::{ReservationGrant, StockLedger, StockLedgerError};

/// Summary store for tests and single-process deployments.
pub type SummaryStore = InMemoryReadModelStore<TransferRequestId, TransferSummary>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Structural or quantity rules failed; nothing changed.
    #[error("validation failed: {0}")]
    Validation(ValidationResult),

    #[error("cannot {operation} a transfer request that is {from}")]
    InvalidTransition {
        from: TransferStatus,
        operation: TransferOperation,
    },

    /// The caller's snapshot is stale; reload and retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error(transparent)]
    InsufficientStock(StockError),

    #[error("transfer request not found")]
    NotFound,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("event store failure: {0}")]
    Store(String),

    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// Committed, but publication to the bus failed.
    #[error("event publication failed: {0}")]
    Publish(String),

    #[error("stock ledger failure: {0}")]
    Ledger(String),

    #[error("read model failure: {0}")]
    Projection(String),
}

impl ServiceError {
    /// Whether reloading and retrying the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }
}

impl From<TransferError> for ServiceError {
    fn from(value: TransferError) -> Self {
        match value {
            TransferError::Validation(result) => ServiceError::Validation(result),
            TransferError::InvalidTransition { from, operation } => {
                ServiceError::InvalidTransition { from, operation }
            }
            TransferError::Domain(err) => err.into(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                let mut result = ValidationResult::new();
                result.error(ValidationIssue::request(msg));
                ServiceError::Validation(result)
            }
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::Conflict(msg) => ServiceError::ConcurrencyConflict(msg),
            DomainError::NotFound => ServiceError::NotFound,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Store(EventStoreError::Concurrency(msg)) => {
                ServiceError::ConcurrencyConflict(msg)
            }
            RepositoryError::Store(err) => ServiceError::Store(err.to_string()),
            RepositoryError::Deserialize { .. } => ServiceError::Deserialize(value.to_string()),
            RepositoryError::CorruptStream(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        RepositoryError::from(value).into()
    }
}

impl From<StockLedgerError> for ServiceError {
    fn from(value: StockLedgerError) -> Self {
        match value {
            StockLedgerError::Stock(err) => ServiceError::InsufficientStock(err),
            StockLedgerError::Unavailable(msg) => ServiceError::Ledger(msg),
        }
    }
}

impl From<TransferSummaryProjectionError> for ServiceError {
    fn from(value: TransferSummaryProjectionError) -> Self {
        ServiceError::Projection(value.to_string())
    }
}

/// Header and lines of a new draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub requesting_location_id: LocationId,
    pub source_location_id: LocationId,
    pub source_location_type: LocationType,
    pub priority: TransferPriority,
    pub reason: TransferReason,
    pub requested_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<LineDraft>,
}

impl NewTransfer {
    pub fn new(
        requesting_location_id: LocationId,
        source_location_id: LocationId,
        source_location_type: LocationType,
        lines: Vec<LineDraft>,
    ) -> Self {
        Self {
            requesting_location_id,
            source_location_id,
            source_location_type,
            priority: TransferPriority::Normal,
            reason: TransferReason::Replenishment,
            requested_delivery_date: None,
            notes: None,
            lines,
        }
    }
}

/// Reviewer input for `approve`. Lines without a proposal are approved at
/// their requested quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Approval {
    pub proposals: Vec<LineQuantity>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// One delivery at the requesting location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub quantities: Vec<LineQuantity>,
    pub notes: Option<String>,
    pub idempotency_token: Option<String>,
    pub close_with_shortage: bool,
}

impl Receipt {
    pub fn new(quantities: Vec<LineQuantity>) -> Self {
        Self {
            quantities,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }

    pub fn closing_with_shortage(mut self) -> Self {
        self.close_with_shortage = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub request: TransferRequest,
    /// Non-blocking findings (e.g. requested more than the source holds).
    pub warnings: Vec<ValidationIssue>,
}

/// Read-only view of transfer requests. Holds no handle to any transition.
#[derive(Debug)]
pub struct TransferReader<S, R>
where
    R: ReadModelStore<TransferRequestId, TransferSummary>,
{
    repository: Repository<Arc<S>>,
    summaries: Arc<TransferSummariesProjection<R>>,
}

impl<S, R> Clone for TransferReader<S, R>
where
    R: ReadModelStore<TransferRequestId, TransferSummary>,
{
    fn clone(&self) -> Self {
        Self {
            repository: Repository::new(Arc::clone(self.repository.store())),
            summaries: Arc::clone(&self.summaries),
        }
    }
}

impl<S, R> TransferReader<S, R>
where
    S: EventStore,
    R: ReadModelStore<TransferRequestId, TransferSummary>,
{
    /// Current snapshot, rebuilt from the event stream.
    pub fn get(&self, id: TransferRequestId) -> Result<TransferRequest, ServiceError> {
        let request = self.repository.load(id.0, || TransferRequest::empty(id))?;
        if request.exists() {
            Ok(request)
        } else {
            Err(ServiceError::NotFound)
        }
    }

    pub fn query(&self, filter: &TransferFilter) -> Vec<TransferSummary> {
        self.summaries.query(filter)
    }

    /// Activity log, oldest first.
    pub fn history(&self, id: TransferRequestId) -> Result<Vec<ActivityLogEntry>, ServiceError> {
        let events: Vec<TransferEvent> = self.repository.load_events(id.0)?;
        if events.is_empty() {
            return Err(ServiceError::NotFound);
        }
        Ok(history_from_events(id, &events))
    }
}

/// The exposed transfer operations.
///
/// Collaborators are injected: the event store (`S`), the stock ledger
/// (`L`), the outward event bus (`B`) and the summary read model store
/// (`R`).
#[derive(Debug)]
pub struct TransferService<S, L, B, R>
where
    R: ReadModelStore<TransferRequestId, TransferSummary>,
{
    repository: Repository<Arc<S>>,
    ledger: L,
    bus: B,
    summaries: Arc<TransferSummariesProjection<R>>,
    numbers: RequestNumberGenerator,
    config: TransferConfig,
    commit: Mutex<()>,
}

impl<S, L, B, R> TransferService<S, L, B, R>
where
    S: EventStore,
    L: StockLedger,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadModelStore<TransferRequestId, TransferSummary>,
{
    /// Open the service over `store`.
    ///
    /// Requests already in the store are replayed into `summaries` and the
    /// request number counter resumes after the highest issued number.
    pub fn new(
        store: Arc<S>,
        ledger: L,
        bus: B,
        summaries: R,
        config: TransferConfig,
    ) -> Result<Self, ServiceError> {
        let service = Self {
            repository: Repository::new(store),
            ledger,
            bus,
            summaries: Arc::new(TransferSummariesProjection::new(summaries)),
            numbers: RequestNumberGenerator::new(config.request_prefix.clone()),
            config,
            commit: Mutex::new(()),
        };
        service.rebuild_read_models()?;
        Ok(service)
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn reader(&self) -> TransferReader<S, R> {
        TransferReader {
            repository: Repository::new(Arc::clone(self.repository.store())),
            summaries: Arc::clone(&self.summaries),
        }
    }

    pub fn get(&self, id: TransferRequestId) -> Result<TransferRequest, ServiceError> {
        self.reader().get(id)
    }

    pub fn query(&self, filter: &TransferFilter) -> Vec<TransferSummary> {
        self.summaries.query(filter)
    }

    pub fn history(&self, id: TransferRequestId) -> Result<Vec<ActivityLogEntry>, ServiceError> {
        self.reader().history(id)
    }

    /// Replay every stored request into the summary read model and move the
    /// request number counter past every number already issued.
    pub fn rebuild_read_models(&self) -> Result<usize, ServiceError> {
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);

        self.summaries.reset()?;
        let streams = self.repository.store().load_by_type(AGGREGATE_TYPE)?;

        for stream in &streams {
            for stored in stream {
                self.summaries.apply_envelope(&stored.to_envelope())?;
            }
            if let Some(first) = stream.first() {
                let id = TransferRequestId::new(first.aggregate_id);
                if let Some(seq) = self
                    .summaries
                    .get(&id)
                    .and_then(|s| self.numbers.parse_sequence(&s.request_number))
                {
                    self.numbers.observe(seq);
                }
            }
        }

        info!(requests = streams.len(), "transfer read models rebuilt");
        Ok(streams.len())
    }

    /// Create a Draft. Each line snapshots the live transferable stock at
    /// the source for display.
    pub fn create_draft(&self, draft: NewTransfer, actor: UserId) -> Result<TransferRequest, ServiceError> {
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let request_id = TransferRequestId::new(AggregateId::new());

        let lines = draft
            .lines
            .into_iter()
            .map(|mut line| {
                line.source_available_stock =
                    Some(self.ledger.available(draft.source_location_id, line.product_id)?);
                Ok(line)
            })
            .collect::<Result<Vec<_>, StockLedgerError>>()?;

        let command = TransferCommand::CreateTransfer(CreateTransfer {
            request_id,
            request_number: self.numbers.next(now.date_naive()),
            requesting_location_id: draft.requesting_location_id,
            source_location_id: draft.source_location_id,
            source_location_type: draft.source_location_type,
            priority: draft.priority,
            reason: draft.reason,
            requested_delivery_date: draft.requested_delivery_date,
            notes: draft.notes,
            lines,
            actor_id: actor,
            occurred_at: now,
        });

        let (request, _) = self.try_commit(&TransferRequest::empty(request_id), &command, &[])?;
        Ok(request)
    }

    pub fn add_line(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        product_id: ProductId,
        quantity: i64,
        unit_cost: i64,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        self.transition(id, expected, |request| {
            let mut line = LineDraft::new(product_id, quantity, unit_cost);
            if let Some(source) = request.source_location_id() {
                line.source_available_stock = Some(self.ledger.available(source, product_id)?);
            }
            Ok(TransferCommand::AddLine(AddLine {
                request_id: id,
                line,
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    pub fn remove_line(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        line_no: u32,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        self.transition(id, expected, |_| {
            Ok(TransferCommand::RemoveLine(RemoveLine {
                request_id: id,
                line_no,
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    /// Draft → Submitted. Short stock at the source only warns.
    pub fn submit(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        actor: UserId,
    ) -> Result<SubmitOutcome, ServiceError> {
        let (request, events) = self.transition(id, expected, |request| {
            Ok(TransferCommand::SubmitTransfer(SubmitTransfer {
                request_id: id,
                live_stock: self.live_stock(request)?,
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })?;

        let warnings = events
            .into_iter()
            .find_map(|ev| match ev {
                TransferEvent::TransferSubmitted(e) => Some(e.warnings),
                _ => None,
            })
            .unwrap_or_default();

        for warning in &warnings {
            warn!(request_id = %id, warning = %warning, "transfer request submitted with warning");
        }

        Ok(SubmitOutcome { request, warnings })
    }

    /// Submitted → Approved | PartiallyApproved | Rejected.
    ///
    /// The proposed quantities are reserved at the source in one ledger
    /// call that cuts each line down to what is still transferable. The
    /// decision is built from those grants, so an unrelated deduction can
    /// only lower the outcome, never fail it.
    pub fn approve(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        approval: Approval,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        let (request, events) = self.transition(id, expected, |_| {
            Ok(TransferCommand::ApproveTransfer(ApproveTransfer {
                request_id: id,
                proposals: approval.proposals.clone(),
                live_stock: BTreeMap::new(),
                expected_delivery_date: approval.expected_delivery_date,
                notes: approval.notes.clone(),
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })?;

        for ev in &events {
            if let TransferEvent::ApprovalRecorded(e) = ev {
                for r in &e.auto_reductions {
                    warn!(
                        request_id = %id,
                        line_no = r.line_no,
                        product_id = %r.product_id,
                        proposed = r.proposed,
                        approved = r.approved,
                        available = r.available,
                        "approval reduced to available stock"
                    );
                }
            }
        }

        Ok(request)
    }

    pub fn reject(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        reason: impl Into<String>,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        let reason = reason.into();
        self.transition(id, expected, |_| {
            Ok(TransferCommand::RejectTransfer(RejectTransfer {
                request_id: id,
                reason: reason.clone(),
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    /// Approved | PartiallyApproved → InTransit. Fails as a whole with
    /// `InsufficientStock` if the source no longer holds the goods.
    pub fn ship(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        quantities: Vec<LineQuantity>,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        self.transition(id, expected, |_| {
            Ok(TransferCommand::ShipTransfer(ShipTransfer {
                request_id: id,
                quantities: quantities.clone(),
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    /// InTransit | PartiallyReceived → PartiallyReceived | Received.
    ///
    /// A replay of an already recorded token returns the current snapshot
    /// and changes nothing, even when `expected` is stale.
    pub fn receive(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        receipt: Receipt,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        let has_token = receipt
            .idempotency_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if self.config.require_receipt_token && !has_token {
            let mut result = ValidationResult::new();
            result.error(ValidationIssue::request("an idempotency token is required"));
            return Err(ServiceError::Validation(result));
        }

        self.transition(id, expected, |_| {
            Ok(TransferCommand::ReceiveTransfer(ReceiveTransfer {
                request_id: id,
                quantities: receipt.quantities.clone(),
                notes: receipt.notes.clone(),
                idempotency_token: receipt.idempotency_token.clone(),
                close_with_shortage: receipt.close_with_shortage,
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    /// Any non-terminal status → Cancelled. Releases reservations of an
    /// approved request; dispatched goods are not pulled back.
    pub fn cancel(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        reason: Option<String>,
        actor: UserId,
    ) -> Result<TransferRequest, ServiceError> {
        self.transition(id, expected, |_| {
            Ok(TransferCommand::CancelTransfer(CancelTransfer {
                request_id: id,
                reason: reason.clone(),
                actor_id: actor,
                occurred_at: Utc::now(),
            }))
        })
        .map(|(request, _)| request)
    }

    /// Transferable stock at the source for every product on the request.
    fn live_stock(&self, request: &TransferRequest) -> Result<BTreeMap<ProductId, i64>, ServiceError> {
        let source = request.source_location_id().ok_or(ServiceError::NotFound)?;
        let mut stock = BTreeMap::new();
        for line in request.lines() {
            if !stock.contains_key(&line.product_id) {
                stock.insert(line.product_id, self.ledger.available(source, line.product_id)?);
            }
        }
        Ok(stock)
    }

    /// Run one transition on an existing request inside the commit section.
    fn transition<F>(
        &self,
        id: TransferRequestId,
        expected: ExpectedVersion,
        build: F,
    ) -> Result<(TransferRequest, Vec<TransferEvent>), ServiceError>
    where
        F: FnOnce(&TransferRequest) -> Result<TransferCommand, ServiceError>,
    {
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);

        let request = self.reader().get(id)?;
        let mut command = build(&request)?;

        if command.is_receipt_replay(&request) {
            info!(
                request_id = %id,
                request_number = %request.request_number(),
                version = request.version(),
                "receipt already recorded; returning current snapshot"
            );
            return Ok((request, vec![]));
        }

        if let Err(err) = expected.check(request.version()) {
            warn!(
                request_id = %id,
                operation = %command.operation(),
                expected = ?expected,
                actual = request.version(),
                "stale transfer request version"
            );
            return Err(err.into());
        }

        let reserved = match &mut command {
            TransferCommand::ApproveTransfer(cmd) => self.reserve_for_approval(&request, cmd)?,
            _ => Vec::new(),
        };

        self.try_commit(&request, &command, &reserved)
    }

    /// Reserve the proposed quantities of a Submitted request, each cut to
    /// what is still transferable, and hand the stock seen by the ledger to
    /// the command. The aggregate then decides exactly what was granted.
    ///
    /// Returns the reservations applied.
    fn reserve_for_approval(
        &self,
        request: &TransferRequest,
        cmd: &mut ApproveTransfer,
    ) -> Result<Vec<StockMovement>, ServiceError> {
        let Some(source) = request.source_location_id() else {
            return Ok(Vec::new());
        };
        if request.status() != TransferStatus::Submitted {
            return Ok(Vec::new());
        }

        let proposals: BTreeMap<u32, i64> =
            cmd.proposals.iter().map(|p| (p.line_no, p.quantity)).collect();
        let wanted: Vec<(StockKey, i64)> = request
            .lines()
            .iter()
            .map(|line| {
                let proposed = proposals
                    .get(&line.line_no)
                    .copied()
                    .unwrap_or(line.requested_quantity)
                    .min(line.requested_quantity)
                    .max(0);
                (StockKey::new(source, line.product_id), proposed)
            })
            .collect();

        let grants = self.ledger.reserve_available(&wanted)?;

        cmd.live_stock.clear();
        for grant in &grants {
            cmd.live_stock
                .entry(grant.key.product_id)
                .or_insert(grant.available);
            if grant.is_reduced() {
                debug!(
                    request_id = %request.id_typed(),
                    product_id = %grant.key.product_id,
                    requested = grant.requested,
                    granted = grant.granted,
                    "reservation cut to available stock"
                );
            }
        }

        Ok(grants
            .iter()
            .map(ReservationGrant::movement)
            .filter(|m| !m.is_noop())
            .collect())
    }

    /// Decide, move stock, append, then project and publish.
    ///
    /// `reserved` holds movements already applied for this command (the
    /// approval reservations); they are released if the command fails.
    fn try_commit(
        &self,
        request: &TransferRequest,
        command: &TransferCommand,
        reserved: &[StockMovement],
    ) -> Result<(TransferRequest, Vec<TransferEvent>), ServiceError> {
        let id = request.id_typed();
        let operation = command.operation();

        let decided = request
            .handle(command)
            .map_err(|err| {
                debug!(request_id = %id, operation = %operation, error = %err, "transfer command refused");
                ServiceError::from(err)
            })
            .and_then(|events| {
                let mut next = request.clone();
                let mut movements: Vec<StockMovement> = Vec::new();
                for ev in &events {
                    movements.extend(stock_movements(&next, ev));
                    next.apply(ev);
                }
                next.check_invariants()
                    .map_err(|err| ServiceError::InvariantViolation(err.to_string()))?;
                Ok((next, events, movements))
            });

        let (next, events, movements) = match decided {
            Ok(decided) => decided,
            Err(err) => {
                self.release(id, reserved);
                return Err(err);
            }
        };
        if events.is_empty() {
            self.release(id, reserved);
            return Ok((request.clone(), events));
        }

        if operation == TransferOperation::Approve {
            if movements != reserved {
                self.release(id, reserved);
                return Err(ServiceError::InvariantViolation(
                    "approved quantities differ from the reserved stock".to_string(),
                ));
            }
        } else if let Err(err) = self.ledger.apply(&movements) {
            warn!(request_id = %id, operation = %operation, error = %err, "stock movement refused");
            return Err(err.into());
        }

        let stored = match self.repository.append(
            id.0,
            AGGREGATE_TYPE,
            &events,
            ExpectedVersion::Exact(request.version()),
        ) {
            Ok(stored) => stored,
            Err(err) => {
                self.compensate(id, &movements, &err);
                return Err(err.into());
            }
        };

        info!(
            request_id = %id,
            request_number = %next.request_number(),
            operation = %operation,
            from = %request.status(),
            to = %next.status(),
            version = next.version(),
            actor = %command.actor_id(),
            "transfer request updated"
        );

        self.project_and_publish(&stored)?;
        Ok((next, events))
    }

    /// Undo reservations taken for a command that was then refused.
    fn release(&self, id: TransferRequestId, reserved: &[StockMovement]) {
        if reserved.is_empty() {
            return;
        }
        if let Err(err) = self.ledger.revert(reserved) {
            error!(request_id = %id, error = %err, "reservations of a refused command could not be released");
        }
    }

    fn compensate(&self, id: TransferRequestId, movements: &[StockMovement], cause: &RepositoryError) {
        if movements.is_empty() {
            return;
        }
        match self.ledger.revert(movements) {
            Ok(()) => warn!(request_id = %id, error = %cause, "append failed; stock movements reverted"),
            Err(revert_err) => error!(
                request_id = %id,
                error = %cause,
                revert_error = %revert_err,
                "append failed and stock movements could not be reverted"
            ),
        }
    }

    fn project_and_publish(&self, stored: &[StoredEvent]) -> Result<(), ServiceError> {
        for event in stored {
            let envelope = event.to_envelope();
            if let Err(err) = self.summaries.apply_envelope(&envelope) {
                error!(
                    aggregate_id = %event.aggregate_id,
                    sequence_number = event.sequence_number,
                    error = %err,
                    "summary projection failed; rebuild read models"
                );
            }
            self.bus
                .publish(envelope)
                .map_err(|e| ServiceError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}
