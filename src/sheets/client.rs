use super::SheetOperations;
use super::auth::create_and_verify_authenticator;
use crate::config::{GoogleConfig, SheetConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets, ValueRange};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, instrument};

// Read/write access to the target spreadsheet.
pub(crate) const AUTH_SCOPE: Scope = Scope::Spreadsheet;

pub struct SheetsClient {
    hub: Sheets<HttpsConnector<HttpConnector>>,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    /// Create a new SheetsClient with authenticated access
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn new(google: &GoogleConfig, sheet: &SheetConfig) -> Result<Self> {
        let auth = create_and_verify_authenticator(google).await?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .unwrap()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        Ok(Self {
            hub: Sheets::new(client, auth),
            spreadsheet_id: sheet.spreadsheet_id.clone(),
            range: sheet.range.clone(),
        })
    }
}

/// Start cell of a range: updates address the block from here, replacing it
/// in place rather than inserting.
fn range_start(range: &str) -> &str {
    range.split_once(':').map_or(range, |(start, _)| start)
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetOperations for SheetsClient {
    #[instrument(name = "Reading sheet range", skip_all)]
    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let (_, response) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &self.range)
            .major_dimension("ROWS")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| {
                AppError::Sheets(format!("Failed to read range '{}': {}", self.range, e))
            })?;

        // Values are Option<Vec<Vec<serde_json::Value>>>
        let values = response.values.unwrap_or_default();
        Ok(values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    #[instrument(name = "Writing sheet range", skip_all, fields(rows = rows.len()))]
    async fn write_rows(&self, rows: Vec<Vec<String>>) -> Result<u64> {
        let start = range_start(&self.range).to_string();

        let values = rows
            .into_iter()
            .map(|row| row.into_iter().map(serde_json::Value::String).collect())
            .collect();

        let value_range = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            range: Some(start.clone()),
            values: Some(values),
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .values_update(value_range, &self.spreadsheet_id, &start)
            .value_input_option("RAW")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| AppError::Sheets(format!("Failed to update range '{}': {}", start, e)))?;

        let updated_cells = response.updated_cells.unwrap_or_default() as u64;
        debug!(updated_cells, "Sheet updated");

        Ok(updated_cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_start_strips_end_cell() {
        assert_eq!(range_start("Sheet1!A1:D1"), "Sheet1!A1");
        assert_eq!(range_start("Prices!B2:Z100"), "Prices!B2");
    }

    #[test]
    fn test_range_start_passes_through_bare_ranges() {
        assert_eq!(range_start("Sheet1!A1"), "Sheet1!A1");
        assert_eq!(range_start("Sheet1"), "Sheet1");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(
            cell_to_string(serde_json::Value::String("$63000".to_string())),
            "$63000"
        );
        assert_eq!(cell_to_string(serde_json::json!(45.2)), "45.2");
        assert_eq!(cell_to_string(serde_json::Value::Bool(true)), "true");
    }
}
