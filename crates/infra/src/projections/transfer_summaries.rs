use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockmove_core::{Aggregate, AggregateId, AggregateRoot};
use stockmove_events::EventEnvelope;
use stockmove_transfers::{
    AGGREGATE_TYPE, TransferEvent, TransferFilter, TransferRequest, TransferRequestId,
    TransferSummary,
};

use crate::read_model::ReadModelStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferSummaryProjectionError {
    #[error("failed to deserialize transfer event: {0}")]
    Deserialize(String),
    #[error("event request_id does not match envelope aggregate_id {0}")]
    StreamMismatch(AggregateId),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error("projection state unavailable")]
    Poisoned,
}

/// List rows for every transfer request.
///
/// Each stream is folded into a `TransferRequest`; its version is the
/// stream cursor.
#[derive(Debug)]
pub struct TransferSummariesProjection<S>
where
    S: ReadModelStore<TransferRequestId, TransferSummary>,
{
    store: S,
    streams: RwLock<HashMap<AggregateId, TransferRequest>>,
}

impl<S> TransferSummariesProjection<S>
where
    S: ReadModelStore<TransferRequestId, TransferSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &TransferRequestId) -> Option<TransferSummary> {
        self.store.get(id)
    }

    /// Matching rows, newest first.
    pub fn query(&self, filter: &TransferFilter) -> Vec<TransferSummary> {
        filter.apply(self.store.list().iter())
    }

    /// Last applied sequence number of a stream (0 when unseen).
    pub fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.streams.read() {
            Ok(streams) => streams.get(&aggregate_id).map(|r| r.version()).unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Forget everything (before a replay). Also clears a poisoned state.
    pub fn reset(&self) -> Result<(), TransferSummaryProjectionError> {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        streams.clear();
        self.streams.clear_poison();
        self.store.clear();
        Ok(())
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TransferSummaryProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut streams = self
            .streams
            .write()
            .map_err(|_| TransferSummaryProjectionError::Poisoned)?;
        let request = streams
            .entry(aggregate_id)
            .or_insert_with(|| TransferRequest::empty(TransferRequestId::new(aggregate_id)));

        let last = request.version();
        if seq <= last && seq != 0 {
            // Redelivery.
            return Ok(());
        }
        if seq != last + 1 {
            return Err(TransferSummaryProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: TransferEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| TransferSummaryProjectionError::Deserialize(e.to_string()))?;
        if ev.request_id().0 != aggregate_id {
            return Err(TransferSummaryProjectionError::StreamMismatch(aggregate_id));
        }

        request.apply(&ev);

        if let Some(summary) = TransferSummary::from_request(request) {
            self.store.upsert(summary.id, summary);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use uuid::Uuid;

    use stockmove_core::{LocationId, ProductId, UserId};
    use stockmove_events::Event;
    use stockmove_inventory::LocationType;
    use stockmove_transfers::{
        CreateTransfer, LineDraft, SubmitTransfer, TransferCommand, TransferPriority,
        TransferReason, TransferStatus,
    };

    use crate::read_model::InMemoryReadModelStore;

    use super::*;

    fn envelopes(id: TransferRequestId) -> Vec<EventEnvelope<JsonValue>> {
        let actor = UserId::new();
        let mut request = TransferRequest::empty(id);
        let mut out = Vec::new();

        let commands = [
            TransferCommand::CreateTransfer(CreateTransfer {
                request_id: id,
                request_number: "TR-20260105-000042".to_string(),
                requesting_location_id: LocationId::new(),
                source_location_id: LocationId::new(),
                source_location_type: LocationType::Headquarters,
                priority: TransferPriority::High,
                reason: TransferReason::Emergency,
                requested_delivery_date: None,
                notes: Some("Weekend event".to_string()),
                lines: vec![LineDraft::new(ProductId::new(), 12, 300)],
                actor_id: actor,
                occurred_at: Utc::now(),
            }),
            TransferCommand::SubmitTransfer(SubmitTransfer {
                request_id: id,
                live_stock: BTreeMap::new(),
                actor_id: actor,
                occurred_at: Utc::now(),
            }),
        ];

        for command in commands {
            for ev in stockmove_events::execute(&mut request, &command).unwrap() {
                out.push(EventEnvelope::new(
                    Uuid::now_v7(),
                    id.0,
                    AGGREGATE_TYPE,
                    request.version(),
                    ev.event_type(),
                    ev.occurred_at(),
                    serde_json::to_value(&ev).unwrap(),
                ));
            }
        }
        out
    }

    fn projection() -> TransferSummariesProjection<InMemoryReadModelStore<TransferRequestId, TransferSummary>> {
        TransferSummariesProjection::new(InMemoryReadModelStore::new())
    }

    #[test]
    fn envelopes_build_a_summary() {
        let projection = projection();
        let id = TransferRequestId::new(AggregateId::new());

        for env in envelopes(id) {
            projection.apply_envelope(&env).unwrap();
        }

        let summary = projection.get(&id).unwrap();
        assert_eq!(summary.status, TransferStatus::Submitted);
        assert_eq!(summary.total_estimated_value, 3600);
        assert_eq!(projection.cursor(id.0), 2);
    }

    #[test]
    fn redelivery_is_ignored() {
        let projection = projection();
        let id = TransferRequestId::new(AggregateId::new());
        let envs = envelopes(id);

        for env in envs.iter().chain(envs.iter()) {
            projection.apply_envelope(env).unwrap();
        }

        assert_eq!(projection.cursor(id.0), 2);
        assert_eq!(projection.query(&TransferFilter::default()).len(), 1);
    }

    #[test]
    fn gaps_are_rejected() {
        let projection = projection();
        let id = TransferRequestId::new(AggregateId::new());
        let envs = envelopes(id);

        let err = projection.apply_envelope(&envs[1]).unwrap_err();
        assert_eq!(
            err,
            TransferSummaryProjectionError::NonMonotonicSequence { last: 0, found: 2 }
        );
    }

    #[test]
    fn reset_clears_rows_and_cursors() {
        let projection = projection();
        let id = TransferRequestId::new(AggregateId::new());
        for env in envelopes(id) {
            projection.apply_envelope(&env).unwrap();
        }

        projection.reset().unwrap();

        assert!(projection.get(&id).is_none());
        assert_eq!(projection.cursor(id.0), 0);
    }
}
