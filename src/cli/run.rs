use crate::capture::ChromiumCapture;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::sheets::SheetsClient;
use crate::vision::VisionExtractor;
use tracing::info;

pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let snapshot_path = Config::cache_file("snapshot.png")?;

    let capture = ChromiumCapture::new(config.capture.clone());
    let extractor = VisionExtractor::new(&config.openai)?;
    let sheets_client = SheetsClient::new(&config.google, &config.sheet).await?;

    let pipeline = Pipeline::new(
        config.capture.url.clone(),
        snapshot_path,
        capture,
        extractor,
        sheets_client,
    );
    let outcome = pipeline.run().await?;

    info!(
        btc_price = %outcome.reading.btc_price,
        hash_price = %outcome.reading.hash_price,
        "Run completed"
    );

    Ok(())
}
