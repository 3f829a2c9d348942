use crate::capture::PageSnapshot;
use crate::error::{AppError, Result};
use crate::models::PriceReading;
use crate::sheets::SheetOperations;
use crate::vision::ValueExtraction;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, instrument};

/// Outcome of one pipeline run.
///
/// `updated_cells` echoes the store-reported count. `None` means the append
/// failed and the row is not durably recorded; the error has been logged.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub reading: PriceReading,
    pub updated_cells: Option<u64>,
}

pub struct Pipeline<PS, VE, SO> {
    page_url: String,
    snapshot_path: PathBuf,
    capture: PS,
    extractor: VE,
    sheets: SO,
}

impl<PS, VE, SO> Pipeline<PS, VE, SO>
where
    PS: PageSnapshot + Sync,
    VE: ValueExtraction + Sync,
    SO: SheetOperations + Sync,
{
    pub fn new(
        page_url: String,
        snapshot_path: PathBuf,
        capture: PS,
        extractor: VE,
        sheets: SO,
    ) -> Self {
        Self {
            page_url,
            snapshot_path,
            capture,
            extractor,
            sheets,
        }
    }

    /// Run the pipeline once: capture, extract, append.
    ///
    /// Steps run strictly in sequence. Nothing guards against overlapping
    /// invocations: two concurrent runs can read the same existing rows and
    /// each write back a set missing the other's row. Schedule runs one at a
    /// time if every row matters.
    #[instrument(name = "Run", skip_all)]
    pub async fn run(&self) -> Result<RunOutcome> {
        self.capture
            .capture(&self.page_url, &self.snapshot_path)
            .await?;

        let image = fs::read(&self.snapshot_path).map_err(|e| {
            AppError::Capture(format!(
                "Failed to read snapshot {:?}: {}",
                self.snapshot_path, e
            ))
        })?;

        let reading = self.extractor.extract(&image).await?;
        info!(
            btc_price = %reading.btc_price,
            hash_price = %reading.hash_price,
            "Prices extracted"
        );

        // Best-effort append: the reading is already paid for, so a store
        // failure is reported rather than failing the run
        let updated_cells = match self.append_row(reading.to_sheet_row()).await {
            Ok(updated_cells) => {
                info!(updated_cells, "Row appended");
                Some(updated_cells)
            }
            Err(e) => {
                error!("Failed to append row: {}", e);
                None
            }
        };

        Ok(RunOutcome {
            reading,
            updated_cells,
        })
    }

    /// Read the whole range, add one row, write the whole set back.
    async fn append_row(&self, row: Vec<String>) -> Result<u64> {
        let mut rows = self.sheets.read_rows().await?;
        rows.push(row);

        self.sheets.write_rows(rows).await
    }
}
