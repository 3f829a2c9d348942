pub mod reading;

pub use reading::PriceReading;
