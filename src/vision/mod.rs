mod client;
mod types;

pub use client::VisionExtractor;

use crate::error::Result;
use crate::models::PriceReading;
use async_trait::async_trait;

/// Strategy for turning a page snapshot into a price reading.
///
/// Vision inference is the shipped implementation; anything that can produce
/// two price strings from the image bytes satisfies the pipeline.
#[async_trait]
pub trait ValueExtraction {
    async fn extract(&self, image: &[u8]) -> Result<PriceReading>;
}
