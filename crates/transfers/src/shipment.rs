use crate::commands::{LineQuantity, ShipTransfer};
use crate::error::{TransferError, TransferOperation};
use crate::events::{TransferEvent, TransferShipped};
use crate::request::TransferRequest;
use crate::status::TransferStatus;
use crate::validation::{ValidationIssue, ValidationResult};

impl TransferRequest {
    /// Dispatch approved stock from the source.
    ///
    /// A line may ship less than approved (the rest of its reservation is
    /// released) but never more.
    pub(crate) fn handle_ship(&self, cmd: &ShipTransfer) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(
            TransferOperation::Ship,
            &[TransferStatus::Approved, TransferStatus::PartiallyApproved],
        )?;
        self.ensure_structurally_valid()?;

        let mut result = ValidationResult::new();
        let quantities = self.index_line_quantities(&cmd.quantities, &mut result);

        for (line_no, quantity) in &quantities {
            let Some(line) = self.line(*line_no) else {
                continue;
            };
            if *quantity < 0 {
                result.error(ValidationIssue::line(
                    *line_no,
                    "shipped quantity cannot be negative",
                ));
            } else if *quantity > line.approved_quantity {
                result.error(ValidationIssue::line(
                    *line_no,
                    format!(
                        "cannot ship {quantity}, only {} approved",
                        line.approved_quantity
                    ),
                ));
            }
        }

        if result.is_valid() && quantities.values().all(|q| *q == 0) {
            result.error(ValidationIssue::request(
                "a shipment must dispatch at least one unit",
            ));
        }
        if !result.is_valid() {
            return Err(result.into());
        }

        let lines = self
            .lines()
            .iter()
            .map(|l| LineQuantity::new(l.line_no, quantities.get(&l.line_no).copied().unwrap_or(0)))
            .collect();

        Ok(vec![TransferEvent::TransferShipped(TransferShipped {
            request_id: cmd.request_id,
            lines,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use stockmove_events::execute;

    use crate::commands::TransferCommand;
    use crate::testing::Fixture;

    use super::*;

    #[test]
    fn shipping_moves_to_in_transit() {
        let fx = Fixture::new();
        let mut request = fx.approved(30);

        execute(
            &mut request,
            &TransferCommand::ShipTransfer(fx.ship_command(vec![LineQuantity::new(1, 30)])),
        )
        .unwrap();

        assert_eq!(request.status(), TransferStatus::InTransit);
        assert_eq!(request.lines()[0].shipped_quantity, 30);
        assert_eq!(request.shipped_by(), Some(fx.actor_id));
        assert_eq!(request.total_shipped_quantity(), 30);
    }

    #[test]
    fn short_shipment_is_allowed() {
        let fx = Fixture::new();
        let request = fx.shipped(30, 20);

        assert_eq!(request.lines()[0].shipped_quantity, 20);
        assert_eq!(request.lines()[0].approved_quantity, 30);
        request.check_invariants().unwrap();
    }

    #[test]
    fn over_shipment_is_refused() {
        let fx = Fixture::new();
        let request = fx.approved(30);

        let err = request
            .handle_ship(&fx.ship_command(vec![LineQuantity::new(1, 31)]))
            .unwrap_err();

        match err {
            TransferError::Validation(result) => {
                assert_eq!(result.errors[0].line_no, Some(1));
                assert!(result.errors[0].message.contains("only 30 approved"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_shipment_is_refused() {
        let fx = Fixture::new();
        let request = fx.approved(30);

        let err = request.handle_ship(&fx.ship_command(vec![])).unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));
    }

    #[test]
    fn shipping_twice_is_an_invalid_transition() {
        let fx = Fixture::new();
        let request = fx.shipped(30, 30);

        let err = request
            .handle_ship(&fx.ship_command(vec![LineQuantity::new(1, 1)]))
            .unwrap_err();
        assert_eq!(
            err,
            TransferError::invalid_transition(TransferStatus::InTransit, TransferOperation::Ship)
        );
    }
}
