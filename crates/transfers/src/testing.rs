//! Shared builders for the unit tests of this crate.

use std::collections::BTreeMap;

use chrono::Utc;

use stockmove_core::{AggregateId, LocationId, ProductId, UserId};
use stockmove_events::execute;
use stockmove_inventory::LocationType;

use crate::classification::{TransferPriority, TransferReason};
use crate::commands::{
    ApproveTransfer, CreateTransfer, LineDraft, LineQuantity, ReceiveTransfer, ShipTransfer,
    SubmitTransfer, TransferCommand,
};
use crate::request::{TransferRequest, TransferRequestId};

pub struct Fixture {
    pub request_id: TransferRequestId,
    pub requesting_location_id: LocationId,
    pub source_location_id: LocationId,
    pub product_id: ProductId,
    pub actor_id: UserId,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            request_id: TransferRequestId::new(AggregateId::new()),
            requesting_location_id: LocationId::new(),
            source_location_id: LocationId::new(),
            product_id: ProductId::new(),
            actor_id: UserId::new(),
        }
    }

    pub fn create_command(&self, lines: Vec<LineDraft>) -> CreateTransfer {
        CreateTransfer {
            request_id: self.request_id,
            request_number: "TR-20260101-000001".to_string(),
            requesting_location_id: self.requesting_location_id,
            source_location_id: self.source_location_id,
            source_location_type: LocationType::Warehouse,
            priority: TransferPriority::Normal,
            reason: TransferReason::Replenishment,
            requested_delivery_date: None,
            notes: None,
            lines,
            actor_id: self.actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn empty_draft(&self) -> TransferRequest {
        self.draft(vec![])
    }

    pub fn draft_with_line(&self, quantity: i64, unit_cost: i64) -> TransferRequest {
        self.draft(vec![LineDraft::new(self.product_id, quantity, unit_cost)])
    }

    pub fn draft(&self, lines: Vec<LineDraft>) -> TransferRequest {
        let mut request = TransferRequest::empty(self.request_id);
        self.run(
            &mut request,
            TransferCommand::CreateTransfer(self.create_command(lines)),
        );
        request
    }

    pub fn submitted(&self, quantity: i64, unit_cost: i64) -> TransferRequest {
        let mut request = self.draft_with_line(quantity, unit_cost);
        self.submit(&mut request);
        request
    }

    pub fn submit(&self, request: &mut TransferRequest) {
        self.run(
            request,
            TransferCommand::SubmitTransfer(SubmitTransfer {
                request_id: self.request_id,
                live_stock: BTreeMap::new(),
                actor_id: self.actor_id,
                occurred_at: Utc::now(),
            }),
        );
    }

    /// Single-line request approved in full against ample stock.
    pub fn approved(&self, quantity: i64) -> TransferRequest {
        let mut request = self.submitted(quantity, 10);
        self.run(
            &mut request,
            TransferCommand::ApproveTransfer(
                self.approve_command(vec![], BTreeMap::from([(self.product_id, quantity)])),
            ),
        );
        request
    }

    /// Single-line request with `shipped` of `approved` units in transit.
    pub fn shipped(&self, approved: i64, shipped: i64) -> TransferRequest {
        let mut request = self.approved(approved);
        self.run(
            &mut request,
            TransferCommand::ShipTransfer(self.ship_command(vec![LineQuantity::new(1, shipped)])),
        );
        request
    }

    pub fn approve_command(
        &self,
        proposals: Vec<LineQuantity>,
        live_stock: BTreeMap<ProductId, i64>,
    ) -> ApproveTransfer {
        ApproveTransfer {
            request_id: self.request_id,
            proposals,
            live_stock,
            expected_delivery_date: None,
            notes: None,
            actor_id: self.actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn ship_command(&self, quantities: Vec<LineQuantity>) -> ShipTransfer {
        ShipTransfer {
            request_id: self.request_id,
            quantities,
            actor_id: self.actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn receive_command(&self, quantities: Vec<LineQuantity>) -> ReceiveTransfer {
        ReceiveTransfer {
            request_id: self.request_id,
            quantities,
            notes: None,
            idempotency_token: None,
            close_with_shortage: false,
            actor_id: self.actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn run(&self, request: &mut TransferRequest, command: TransferCommand) {
        if let Err(err) = execute(request, &command) {
            panic!("fixture command {command:?} failed: {err}");
        }
    }
}
