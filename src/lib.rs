//! Payment confirmation backend for the client-side matter-opening flow.
//!
//! Confirms card payments against the Barclaycard ePDQ DirectLink gateway
//! using tokenised aliases, records the outcome per order, and links paid
//! instructions to their CRM deals.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod secrets;
pub mod services;
