pub mod error;
pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AppError, Result};
