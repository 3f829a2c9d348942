use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One observation read off the dashboard.
///
/// Both prices keep whatever display formatting the model reported (e.g.
/// `"$63000"`): the destination sheet is text-oriented and the raw strings
/// are what operators expect to see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceReading {
    pub captured_at: DateTime<Utc>,
    pub btc_price: String,
    pub hash_price: String,
}

impl PriceReading {
    pub fn new(btc_price: String, hash_price: String) -> Self {
        PriceReading {
            captured_at: Utc::now(),
            btc_price,
            hash_price,
        }
    }

    /// Convert to the ordered cell values appended to the sheet.
    pub fn to_sheet_row(&self) -> Vec<String> {
        vec![
            self.captured_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            self.btc_price.clone(),
            self.hash_price.clone(),
        ]
    }
}
