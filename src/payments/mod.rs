pub mod epdq;
pub mod error;
pub mod response;
pub mod signature;
pub mod status;
