pub mod payments;

pub use payments::{router, PaymentState};
