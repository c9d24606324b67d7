//! Storage contract consumed by the confirmation service.
//!
//! Kept as a trait so the service can be exercised against in-memory
//! doubles; the Postgres implementation lives in `instruction_repository`.

use crate::database::error::DatabaseError;
use crate::database::instruction_repository::{Instruction, PaymentStatus};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait InstructionStore: Send + Sync {
    /// Load the pending or completed instruction for an order, if any.
    async fn get_instruction(&self, order_id: &str)
        -> Result<Option<Instruction>, DatabaseError>;

    /// Record the terminal payment result for an order. Last-write-wins
    /// upsert keyed by `order_id`; calling it twice with the same status is
    /// a no-op.
    async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError>;

    /// Link a completed instruction to its CRM deal record.
    async fn attach_instruction_ref_to_deal(
        &self,
        instruction_ref: &str,
        deal_id: Uuid,
    ) -> Result<(), DatabaseError>;

    /// Close a deal. Only explicit deal-closing flows call this; the
    /// confirmation path never does.
    async fn close_deal(&self, deal_id: Uuid) -> Result<(), DatabaseError>;
}
