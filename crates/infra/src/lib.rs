//! Infrastructure layer: event store, stock ledger, read models, config and
//! the transfer service that ties them together.

pub mod config;
pub mod event_store;
pub mod numbering;
pub mod projections;
pub mod read_model;
pub mod repository;
pub mod stock_ledger;
pub mod transfer_service;

pub use config::{ConfigError, TransferConfig};
pub use transfer_service::{
    Approval, NewTransfer, Receipt, ServiceError, SubmitOutcome, SummaryStore, TransferReader,
    TransferService,
};

#[cfg(test)]
mod integration_tests;
