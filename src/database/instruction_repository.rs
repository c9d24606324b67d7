use crate::database::error::DatabaseError;
use crate::database::repository::InstructionStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Terminal (or pending-terminal) payment result for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Successful,
    Failed,
    Pending3ds,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Pending3ds => "pending-3ds",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "successful" => Some(PaymentStatus::Successful),
            "failed" => Some(PaymentStatus::Failed),
            "pending-3ds" => Some(PaymentStatus::Pending3ds),
            _ => None,
        }
    }
}

/// A matter-opening instruction awaiting (or past) payment.
///
/// Created when the client-side checkout step starts; the confirmation flow
/// only ever reads it and moves `payment_result` to a terminal state. Rows
/// are never deleted here.
#[derive(Debug, Clone, FromRow)]
pub struct Instruction {
    pub order_id: String,
    pub alias_id: Option<String>,
    pub email: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_result: Option<String>,
    pub instruction_ref: String,
    pub deal_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Instruction {
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment_result
            .as_deref()
            .and_then(PaymentStatus::parse)
    }
}

/// Postgres-backed instruction store.
pub struct InstructionRepository {
    pool: PgPool,
}

impl InstructionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstructionStore for InstructionRepository {
    async fn get_instruction(
        &self,
        order_id: &str,
    ) -> Result<Option<Instruction>, DatabaseError> {
        sqlx::query_as::<_, Instruction>(
            "SELECT order_id, alias_id, email, amount_minor, currency, payment_result,
                    instruction_ref, deal_id, created_at, updated_at
             FROM instructions
             WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO instructions (order_id, payment_result)
             VALUES ($1, $2)
             ON CONFLICT (order_id) DO UPDATE
             SET payment_result = EXCLUDED.payment_result, updated_at = NOW()",
        )
        .bind(order_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn attach_instruction_ref_to_deal(
        &self,
        instruction_ref: &str,
        deal_id: Uuid,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE deals
             SET instruction_ref = $1, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(instruction_ref)
        .bind(deal_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn close_deal(&self, deal_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE deals
             SET status = 'closed', closed_at = NOW(), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(deal_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }
}
