//! Integration tests for the transfer pipeline.
//!
//! Tests: TransferService → StockLedger → EventStore → EventBus / Projection
//!
//! Verifies:
//! - Workflow scenarios end to end, including stock movements
//! - A failed call leaves request and stock untouched
//! - Optimistic concurrency conflicts are detected
//! - Concurrent approvals never over-reserve the source
//! - A restarted service resumes read models and numbering from the store

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use stockmove_core::{AggregateId, AggregateRoot, ExpectedVersion, LocationId, ProductId, UserId};
    use stockmove_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use stockmove_inventory::{LocationType, StockKey, StockLevel, StockMovement};
    use stockmove_transfers::{
        LineDraft, LineQuantity, TransferFilter, TransferOperation, TransferRequest, TransferRequestId,
        TransferStatus,
    };

    use crate::config::TransferConfig;
    use crate::event_store::{
        EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
    };
    use crate::read_model::ReadModelStore;
    use crate::stock_ledger::{InMemoryStockLedger, ReservationGrant, StockLedger, StockLedgerError};
    use crate::transfer_service::{
        Approval, NewTransfer, Receipt, ServiceError, SummaryStore, TransferService,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
    type Service<S, L, R = SummaryStore> = TransferService<S, L, Bus, R>;

    struct World {
        source: LocationId,
        store: LocationId,
        product: ProductId,
        actor: UserId,
    }

    impl World {
        fn new() -> Self {
            stockmove_observability::init_for_tests();
            Self {
                source: LocationId::new(),
                store: LocationId::new(),
                product: ProductId::new(),
                actor: UserId::new(),
            }
        }

        fn new_transfer(&self, lines: Vec<LineDraft>) -> NewTransfer {
            NewTransfer::new(self.store, self.source, LocationType::Warehouse, lines)
        }

        fn line(&self, quantity: i64) -> LineDraft {
            LineDraft::new(self.product, quantity, 10)
        }
    }

    fn service_with<S: EventStore, L: StockLedger>(
        store: Arc<S>,
        ledger: L,
        config: TransferConfig,
    ) -> (Service<S, L>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service =
            TransferService::new(store, ledger, bus.clone(), SummaryStore::new(), config).unwrap();
        (service, bus)
    }

    fn setup(
        world: &World,
        source_stock: i64,
    ) -> (Service<InMemoryEventStore, Arc<InMemoryStockLedger>>, Arc<InMemoryStockLedger>) {
        let ledger = Arc::new(InMemoryStockLedger::new());
        ledger.set_on_hand(world.source, world.product, source_stock).unwrap();
        let (service, _) = service_with(
            Arc::new(InMemoryEventStore::new()),
            ledger.clone(),
            TransferConfig::default(),
        );
        (service, ledger)
    }

    fn at(request: &TransferRequest) -> ExpectedVersion {
        ExpectedVersion::Exact(request.version())
    }

    fn submitted<S: EventStore, L: StockLedger>(
        service: &Service<S, L>,
        world: &World,
        quantity: i64,
    ) -> TransferRequest {
        let draft = service
            .create_draft(world.new_transfer(vec![world.line(quantity)]), world.actor)
            .unwrap();
        service.submit(draft.id_typed(), at(&draft), world.actor).unwrap().request
    }

    fn level<L: StockLedger>(ledger: &L, location: LocationId, product: ProductId) -> StockLevel {
        ledger.level(StockKey::new(location, product)).unwrap()
    }

    #[test]
    fn short_stock_approval_becomes_partial() {
        let world = World::new();
        let (service, ledger) = setup(&world, 30);

        let draft = service
            .create_draft(world.new_transfer(vec![world.line(50)]), world.actor)
            .unwrap();
        assert_eq!(draft.status(), TransferStatus::Draft);
        assert_eq!(draft.lines()[0].source_available_stock, Some(30));

        let outcome = service.submit(draft.id_typed(), at(&draft), world.actor).unwrap();
        assert_eq!(outcome.request.status(), TransferStatus::Submitted);
        assert_eq!(outcome.warnings.len(), 1);

        let approved = service
            .approve(
                draft.id_typed(),
                at(&outcome.request),
                Approval::default(),
                world.actor,
            )
            .unwrap();

        assert_eq!(approved.status(), TransferStatus::PartiallyApproved);
        assert_eq!(approved.lines()[0].approved_quantity, 30);
        assert_eq!(approved.approved_by(), Some(world.actor));
        assert_eq!(level(&ledger, world.source, world.product).reserved, 30);
    }

    #[test]
    fn shipping_moves_stock_out_of_the_source() {
        let world = World::new();
        let (service, ledger) = setup(&world, 30);
        let request = submitted(&service, &world, 30);
        let approved = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        assert_eq!(approved.status(), TransferStatus::Approved);

        let shipped = service
            .ship(
                approved.id_typed(),
                at(&approved),
                vec![LineQuantity::new(1, 30)],
                world.actor,
            )
            .unwrap();

        assert_eq!(shipped.status(), TransferStatus::InTransit);
        assert_eq!(level(&ledger, world.source, world.product), StockLevel::new(0));
    }

    #[test]
    fn receipts_accumulate_until_received() {
        let world = World::new();
        let (service, ledger) = setup(&world, 30);
        let request = submitted(&service, &world, 30);
        let request = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        let request = service
            .ship(request.id_typed(), at(&request), vec![LineQuantity::new(1, 30)], world.actor)
            .unwrap();

        let first = service
            .receive(
                request.id_typed(),
                at(&request),
                Receipt::new(vec![LineQuantity::new(1, 28)]),
                world.actor,
            )
            .unwrap();
        assert_eq!(first.status(), TransferStatus::PartiallyReceived);
        assert_eq!(first.lines()[0].issue_quantity(), 2);

        let second = service
            .receive(
                first.id_typed(),
                at(&first),
                Receipt::new(vec![LineQuantity::new(1, 2)]),
                world.actor,
            )
            .unwrap();
        assert_eq!(second.status(), TransferStatus::Received);
        assert_eq!(second.lines()[0].received_quantity, 30);
        assert_eq!(second.lines()[0].issue_quantity(), 0);
        assert_eq!(level(&ledger, world.store, world.product).on_hand, 30);
        assert_eq!(ledger.total_on_hand(world.product).unwrap(), 30);
    }

    #[test]
    fn cancelled_draft_cannot_be_submitted() {
        let world = World::new();
        let (service, _) = setup(&world, 10);
        let draft = service
            .create_draft(world.new_transfer(vec![world.line(5)]), world.actor)
            .unwrap();

        let cancelled = service
            .cancel(
                draft.id_typed(),
                at(&draft),
                Some("duplicate entry".to_string()),
                world.actor,
            )
            .unwrap();
        assert_eq!(cancelled.status(), TransferStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason(), Some("duplicate entry"));

        let err = service
            .submit(cancelled.id_typed(), at(&cancelled), world.actor)
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::InvalidTransition {
                from: TransferStatus::Cancelled,
                operation: TransferOperation::Submit,
            }
        );
    }

    #[test]
    fn cancelling_an_approval_releases_the_reservation() {
        let world = World::new();
        let (service, ledger) = setup(&world, 20);
        let request = submitted(&service, &world, 20);
        let approved = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        assert_eq!(ledger.available(world.source, world.product).unwrap(), 0);

        service
            .cancel(approved.id_typed(), at(&approved), None, world.actor)
            .unwrap();

        assert_eq!(level(&ledger, world.source, world.product), StockLevel::new(20));
    }

    #[test]
    fn replayed_receipt_token_changes_nothing() {
        let world = World::new();
        let (service, ledger) = setup(&world, 10);
        let request = submitted(&service, &world, 10);
        let request = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        let in_transit = service
            .ship(request.id_typed(), at(&request), vec![LineQuantity::new(1, 10)], world.actor)
            .unwrap();

        let receipt = Receipt::new(vec![LineQuantity::new(1, 4)]).with_token("dock-7/0001");
        let first = service
            .receive(in_transit.id_typed(), at(&in_transit), receipt.clone(), world.actor)
            .unwrap();

        // Same token, stale version: still accepted as a no-op.
        let replay = service
            .receive(in_transit.id_typed(), at(&in_transit), receipt, world.actor)
            .unwrap();

        assert_eq!(replay, first);
        assert_eq!(replay.lines()[0].received_quantity, 4);
        assert_eq!(level(&ledger, world.store, world.product).on_hand, 4);
    }

    #[test]
    fn receipt_token_can_be_required_by_config() {
        let world = World::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        ledger.set_on_hand(world.source, world.product, 5).unwrap();
        let config = TransferConfig {
            require_receipt_token: true,
            ..TransferConfig::default()
        };
        let (service, _) = service_with(Arc::new(InMemoryEventStore::new()), ledger, config);
        let request = submitted(&service, &world, 5);
        let request = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        let request = service
            .ship(request.id_typed(), at(&request), vec![LineQuantity::new(1, 5)], world.actor)
            .unwrap();

        let err = service
            .receive(
                request.id_typed(),
                at(&request),
                Receipt::new(vec![LineQuantity::new(1, 5)]).with_token("  "),
                world.actor,
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let received = service
            .receive(
                request.id_typed(),
                at(&request),
                Receipt::new(vec![LineQuantity::new(1, 5)]).with_token("r-1"),
                world.actor,
            )
            .unwrap();
        assert_eq!(received.status(), TransferStatus::Received);
    }

    #[test]
    fn shortage_close_conserves_stock_minus_the_loss() {
        let world = World::new();
        let (service, ledger) = setup(&world, 40);
        let request = submitted(&service, &world, 40);
        let request = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();
        let request = service
            .ship(request.id_typed(), at(&request), vec![LineQuantity::new(1, 40)], world.actor)
            .unwrap();

        let closed = service
            .receive(
                request.id_typed(),
                at(&request),
                Receipt::new(vec![LineQuantity::new(1, 37)]).closing_with_shortage(),
                world.actor,
            )
            .unwrap();

        assert_eq!(closed.status(), TransferStatus::Received);
        assert_eq!(closed.lines()[0].shortage_quantity, 3);
        assert_eq!(closed.total_issue_quantity(), 3);
        assert_eq!(ledger.total_on_hand(world.product).unwrap(), 37);
    }

    #[test]
    fn stale_version_is_a_retryable_conflict() {
        let world = World::new();
        let (service, _) = setup(&world, 10);
        let draft = service
            .create_draft(world.new_transfer(vec![world.line(5)]), world.actor)
            .unwrap();

        service
            .add_line(draft.id_typed(), at(&draft), ProductId::new(), 3, 7, world.actor)
            .unwrap();
        let err = service
            .add_line(draft.id_typed(), at(&draft), ProductId::new(), 4, 7, world.actor)
            .unwrap_err();

        assert!(matches!(err, ServiceError::ConcurrencyConflict(_)));
        assert!(err.is_retryable());
        assert_eq!(service.get(draft.id_typed()).unwrap().lines().len(), 2);
    }

    #[test]
    fn rejected_ship_leaves_request_and_stock_untouched() {
        let world = World::new();
        let (service, ledger) = setup(&world, 10);
        let request = submitted(&service, &world, 10);
        let approved = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();

        // Stock vanishes at the source after approval.
        ledger.set_on_hand(world.source, world.product, 4).unwrap();

        let err = service
            .ship(approved.id_typed(), at(&approved), vec![LineQuantity::new(1, 10)], world.actor)
            .unwrap_err();

        assert!(matches!(err, ServiceError::InsufficientStock(_)));
        assert_eq!(service.get(approved.id_typed()).unwrap(), approved);
        assert_eq!(
            level(&ledger, world.source, world.product),
            StockLevel { on_hand: 4, reserved: 10 }
        );
    }

    #[test]
    fn concurrent_approvals_never_over_reserve() {
        let world = World::new();
        let (service, ledger) = setup(&world, 50);
        let service = Arc::new(service);

        let requests: Vec<TransferRequest> =
            (0..4).map(|_| submitted(&service, &world, 20)).collect();

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let service = Arc::clone(&service);
                let actor = world.actor;
                thread::spawn(move || {
                    service
                        .approve(request.id_typed(), at(&request), Approval::default(), actor)
                        .unwrap()
                })
            })
            .collect();

        let approved: i64 = handles
            .into_iter()
            .map(|h| h.join().unwrap().total_approved_quantity())
            .sum();

        assert_eq!(approved, 50);
        assert_eq!(level(&ledger, world.source, world.product).reserved, 50);
    }

    #[test]
    fn racing_reviewers_of_one_request_first_commit_wins() {
        let world = World::new();
        let (service, ledger) = setup(&world, 100);
        let service = Arc::new(service);
        let request = submitted(&service, &world, 40);

        let handles: Vec<_> = [Some(10), None]
            .into_iter()
            .map(|proposal| {
                let service = Arc::clone(&service);
                let request = request.clone();
                let actor = world.actor;
                thread::spawn(move || {
                    let approval = Approval {
                        proposals: proposal
                            .map(|q| vec![LineQuantity::new(1, q)])
                            .unwrap_or_default(),
                        ..Approval::default()
                    };
                    service.approve(request.id_typed(), at(&request), approval, actor)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&TransferRequest> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();

        assert_eq!(winners.len(), 1);
        assert!(outcomes.iter().any(|o| matches!(o, Err(ServiceError::ConcurrencyConflict(_)))));
        assert_eq!(
            level(&ledger, world.source, world.product).reserved,
            winners[0].total_approved_quantity()
        );
    }

    /// Event store whose appends can be switched off.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemoryEventStore,
        failing: AtomicBool,
    }

    impl EventStore for FlakyStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventStoreError::Unavailable("disk full".to_string()));
            }
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }

        fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<Vec<StoredEvent>>, EventStoreError> {
            self.inner.load_by_type(aggregate_type)
        }
    }

    #[test]
    fn failed_append_reverts_stock_movements() {
        let world = World::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        ledger.set_on_hand(world.source, world.product, 25).unwrap();
        let store = Arc::new(FlakyStore::default());
        let (service, _) = service_with(store.clone(), ledger.clone(), TransferConfig::default());
        let request = submitted(&service, &world, 25);

        store.failing.store(true, Ordering::SeqCst);
        let err = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert_eq!(level(&ledger, world.source, world.product), StockLevel::new(25));

        store.failing.store(false, Ordering::SeqCst);
        let current = service.get(request.id_typed()).unwrap();
        assert_eq!(current.status(), TransferStatus::Submitted);
        let approved = service
            .approve(current.id_typed(), at(&current), Approval::default(), world.actor)
            .unwrap();
        assert_eq!(approved.status(), TransferStatus::Approved);
    }

    /// Ledger that lets an unrelated sale land right before the next batch.
    #[derive(Debug, Default)]
    struct RacingLedger {
        inner: InMemoryStockLedger,
        pending_sale: Mutex<Option<(LocationId, ProductId, i64)>>,
    }

    impl StockLedger for RacingLedger {
        fn level(&self, key: StockKey) -> Result<StockLevel, StockLedgerError> {
            self.inner.level(key)
        }

        fn apply(&self, movements: &[StockMovement]) -> Result<(), StockLedgerError> {
            self.settle_pending_sale()?;
            self.inner.apply(movements)
        }

        fn reserve_available(
            &self,
            requests: &[(StockKey, i64)],
        ) -> Result<Vec<ReservationGrant>, StockLedgerError> {
            self.settle_pending_sale()?;
            self.inner.reserve_available(requests)
        }
    }

    impl RacingLedger {
        fn settle_pending_sale(&self) -> Result<(), StockLedgerError> {
            if let Some((location, product, units)) = self.pending_sale.lock().unwrap().take() {
                self.inner.adjust(location, product, -units)?;
            }
            Ok(())
        }
    }

    #[test]
    fn approval_is_cut_to_stock_left_by_a_concurrent_sale() {
        let world = World::new();
        let ledger = Arc::new(RacingLedger::default());
        ledger.inner.set_on_hand(world.source, world.product, 50).unwrap();
        let (service, _) = service_with(
            Arc::new(InMemoryEventStore::new()),
            ledger.clone(),
            TransferConfig::default(),
        );
        let request = submitted(&service, &world, 50);

        *ledger.pending_sale.lock().unwrap() = Some((world.source, world.product, 20));
        let approved = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();

        assert_eq!(approved.status(), TransferStatus::PartiallyApproved);
        assert_eq!(approved.lines()[0].approved_quantity, 30);
        assert_eq!(
            level(&ledger, world.source, world.product),
            StockLevel { on_hand: 30, reserved: 30 }
        );
    }

    #[test]
    fn sale_that_empties_the_source_turns_approval_into_rejection() {
        let world = World::new();
        let ledger = Arc::new(RacingLedger::default());
        ledger.inner.set_on_hand(world.source, world.product, 50).unwrap();
        let (service, _) = service_with(
            Arc::new(InMemoryEventStore::new()),
            ledger.clone(),
            TransferConfig::default(),
        );
        let request = submitted(&service, &world, 40);

        *ledger.pending_sale.lock().unwrap() = Some((world.source, world.product, 50));
        let decided = service
            .approve(request.id_typed(), at(&request), Approval::default(), world.actor)
            .unwrap();

        assert_eq!(decided.status(), TransferStatus::Rejected);
        assert_eq!(decided.lines()[0].approved_quantity, 0);
        assert_eq!(
            decided.rejection_reason(),
            Some("insufficient stock at source for every line")
        );
        assert_eq!(
            level(&ledger, world.source, world.product),
            StockLevel { on_hand: 0, reserved: 0 }
        );
    }

    #[test]
    fn refused_approval_releases_its_reservations() {
        let world = World::new();
        let (service, ledger) = setup(&world, 50);
        let request = submitted(&service, &world, 20);

        let err = service
            .approve(
                request.id_typed(),
                at(&request),
                Approval {
                    proposals: vec![LineQuantity::new(1, 10), LineQuantity::new(9, 1)],
                    ..Approval::default()
                },
                world.actor,
            )
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(level(&ledger, world.source, world.product), StockLevel::new(50));
        assert_eq!(service.get(request.id_typed()).unwrap().status(), TransferStatus::Submitted);
    }

    #[test]
    fn committed_events_are_published_in_order() {
        let world = World::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        let (service, bus) =
            service_with(Arc::new(InMemoryEventStore::new()), ledger, TransferConfig::default());
        let subscription = bus.subscribe();

        let request = submitted(&service, &world, 5);
        service
            .reject(request.id_typed(), at(&request), "not this week", world.actor)
            .unwrap();

        let envelopes = subscription.drain();
        let types: Vec<&str> = envelopes.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "transfers.request.created",
                "transfers.request.submitted",
                "transfers.request.rejected",
            ]
        );
        assert!(envelopes.iter().all(|e| e.aggregate_id() == request.id_typed().0));
    }

    #[test]
    fn reader_serves_queries_and_history() {
        let world = World::new();
        let (service, _) = setup(&world, 100);
        let first = submitted(&service, &world, 10);
        let second = service
            .create_draft(world.new_transfer(vec![world.line(3)]), world.actor)
            .unwrap();
        let reader = service.reader();

        let drafts = reader.query(&TransferFilter {
            status: Some(TransferStatus::Draft),
            ..TransferFilter::default()
        });
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, second.id_typed());

        let by_number = reader.query(&TransferFilter {
            search_term: Some(first.request_number().to_lowercase()),
            ..TransferFilter::default()
        });
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].total_requested_quantity, 10);

        let history = reader.history(first.id_typed()).unwrap();
        let statuses: Vec<TransferStatus> = history.iter().map(|h| h.to_status).collect();
        assert_eq!(statuses, vec![TransferStatus::Draft, TransferStatus::Submitted]);
        assert_eq!(history[1].from_status, Some(TransferStatus::Draft));

        let unknown = TransferRequestId::new(AggregateId::new());
        assert_eq!(reader.get(unknown), Err(ServiceError::NotFound));
        assert_eq!(reader.history(unknown), Err(ServiceError::NotFound));
    }

    #[test]
    fn rebuild_restores_read_models_and_numbering() {
        let world = World::new();
        let store = Arc::new(InMemoryEventStore::new());
        let ledger = Arc::new(InMemoryStockLedger::new());
        let (before, _) = service_with(store.clone(), ledger.clone(), TransferConfig::default());
        let first = submitted(&before, &world, 5);
        let second = submitted(&before, &world, 6);

        let (after, _) = service_with(store, ledger, TransferConfig::default());
        assert_eq!(after.query(&TransferFilter::default()).len(), 2);

        assert_eq!(after.rebuild_read_models().unwrap(), 2);
        assert_eq!(after.query(&TransferFilter::default()).len(), 2);

        let third = after
            .create_draft(world.new_transfer(vec![world.line(1)]), world.actor)
            .unwrap();
        for earlier in [&first, &second] {
            assert_ne!(third.request_number(), earlier.request_number());
        }
        assert!(third.request_number().ends_with("-000003"));
    }

    #[test]
    fn second_service_on_one_store_continues_numbering() {
        let world = World::new();
        let store = Arc::new(InMemoryEventStore::new());
        let ledger = Arc::new(InMemoryStockLedger::new());
        let (first_service, _) = service_with(store.clone(), ledger.clone(), TransferConfig::default());
        let first = first_service
            .create_draft(world.new_transfer(vec![world.line(1)]), world.actor)
            .unwrap();

        let (second_service, _) = service_with(store, ledger, TransferConfig::default());
        let second = second_service
            .create_draft(world.new_transfer(vec![world.line(1)]), world.actor)
            .unwrap();

        assert!(first.request_number().ends_with("-000001"));
        assert!(second.request_number().ends_with("-000002"));
    }

    #[test]
    fn summaries_are_written_to_the_injected_store() {
        let world = World::new();
        let summaries = Arc::new(SummaryStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service: Service<InMemoryEventStore, InMemoryStockLedger, Arc<SummaryStore>> =
            TransferService::new(
                Arc::new(InMemoryEventStore::new()),
                InMemoryStockLedger::new(),
                bus,
                Arc::clone(&summaries),
                TransferConfig::default(),
            )
            .unwrap();

        let draft = service
            .create_draft(world.new_transfer(vec![world.line(4)]), world.actor)
            .unwrap();

        let rows = summaries.list();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, draft.id_typed());
        assert_eq!(rows[0].total_requested_quantity, 4);
    }

    #[test]
    fn oversized_line_is_refused_and_read_models_keep_working() {
        let world = World::new();
        let (service, _) = setup(&world, 10);

        let err = service
            .create_draft(
                world.new_transfer(vec![LineDraft::new(
                    world.product,
                    10_000_000_000,
                    10_000_000_000,
                )]),
                world.actor,
            )
            .unwrap_err();
        match err {
            ServiceError::Validation(result) => assert_eq!(result.for_line(1).count(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }

        let draft = service
            .create_draft(world.new_transfer(vec![world.line(2)]), world.actor)
            .unwrap();
        assert_eq!(service.query(&TransferFilter::default()).len(), 1);
        assert_eq!(service.rebuild_read_models().unwrap(), 1);
        assert_eq!(service.query(&TransferFilter::default())[0].id, draft.id_typed());
    }
}
