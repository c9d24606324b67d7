pub mod error;
pub mod logging;

pub use error::{get_request_id_from_headers, ErrorResponse};
pub use logging::{request_logging_middleware, UuidRequestId};
