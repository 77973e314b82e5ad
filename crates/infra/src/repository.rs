//! Loading and saving event-sourced aggregates.
//!
//! ```text
//! load:   load_stream → validate ordering → deserialize → apply in order
//! append: serialize decided events → append with expected version
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use stockmove_core::{Aggregate, AggregateId, ExpectedVersion};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// A stored payload no longer matches the aggregate's event type.
    #[error("failed to deserialize event {sequence_number}: {message}")]
    Deserialize { sequence_number: u64, message: String },

    /// The store returned events out of order or from another stream.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),
}

#[derive(Debug, Clone)]
pub struct Repository<S> {
    store: S,
}

impl<S> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: EventStore> Repository<S> {
    /// Typed events of a stream, in order.
    pub fn load_events<E>(&self, aggregate_id: AggregateId) -> Result<Vec<E>, RepositoryError>
    where
        E: DeserializeOwned,
    {
        let stream = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &stream)?;
        decode_stream(&stream)
    }

    /// Rehydrate an aggregate by replaying its stream onto `make_aggregate()`.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<A, RepositoryError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let mut aggregate = make_aggregate();
        for event in self.load_events::<A::Event>(aggregate_id)? {
            aggregate.apply(&event);
        }
        Ok(aggregate)
    }

    /// Append decided events; nothing is written when the stream moved past
    /// `expected_version`.
    pub fn append<E>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        events: &[E],
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, RepositoryError>
    where
        E: stockmove_events::Event + Serialize,
    {
        let uncommitted = events
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.store.append(uncommitted, expected_version)?)
    }
}

/// Deserialize a stream already known to be ordered.
pub fn decode_stream<E>(stream: &[StoredEvent]) -> Result<Vec<E>, RepositoryError>
where
    E: DeserializeOwned,
{
    stream
        .iter()
        .map(|stored| {
            serde_json::from_value(stored.payload.clone()).map_err(|e| {
                RepositoryError::Deserialize {
                    sequence_number: stored.sequence_number,
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

/// The stream must belong to `aggregate_id` and be numbered 1, 2, 3, ...
pub fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), RepositoryError> {
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(RepositoryError::CorruptStream(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(RepositoryError::CorruptStream(format!(
                "expected sequence_number {expected} at index {idx}, found {}",
                e.sequence_number
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn stored(aggregate_id: AggregateId, sequence_number: u64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: "t".to_string(),
            sequence_number,
            event_type: "t.e".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!(sequence_number),
        }
    }

    #[test]
    fn gaps_and_foreign_events_are_corruption() {
        let id = AggregateId::new();

        assert!(validate_loaded_stream(id, &[stored(id, 1), stored(id, 2)]).is_ok());
        assert!(matches!(
            validate_loaded_stream(id, &[stored(id, 1), stored(id, 3)]),
            Err(RepositoryError::CorruptStream(_))
        ));
        assert!(matches!(
            validate_loaded_stream(id, &[stored(AggregateId::new(), 1)]),
            Err(RepositoryError::CorruptStream(_))
        ));
    }

    #[test]
    fn undecodable_payload_names_its_position() {
        let id = AggregateId::new();
        let err = decode_stream::<String>(&[stored(id, 1)]).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Deserialize { sequence_number: 1, .. }
        ));
    }
}
