pub mod confirmation;

pub use confirmation::{ConfirmOutcome, ConfirmationError, PaymentConfirmationService};
