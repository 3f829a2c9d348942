mod auth;
mod client;

pub use client::SheetsClient;

// Re-export clear_tokens for CLI usage
pub use auth::clear_tokens as clear_sheets_tokens;

use crate::error::Result;
use async_trait::async_trait;

/// The one read+update pair the pipeline needs from the tabular store.
#[async_trait]
pub trait SheetOperations {
    /// All current rows in the configured range.
    async fn read_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Replace the addressed block starting at the range's first cell with
    /// `rows`, returning the store-reported number of updated cells.
    async fn write_rows(&self, rows: Vec<Vec<String>>) -> Result<u64>;
}
