mod chromium;

pub use chromium::ChromiumCapture;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Renders a remote page to a static image artifact at `dest`, overwriting
/// whatever was there. Retrying is the caller's decision.
#[async_trait]
pub trait PageSnapshot {
    async fn capture(&self, url: &str, dest: &Path) -> Result<()>;
}
