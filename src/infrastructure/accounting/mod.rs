//! Accounting service client

mod api_client;

pub use api_client::AccountingClient;
