pub mod clock;
pub mod decimal_utils;
pub mod time_utils;

pub use clock::{Clock, ManualClock, SystemClock};
