pub mod driver_loop;

pub use driver_loop::{DriverLoop, LoopSummary, OfferDecision, OfferPolicy};
