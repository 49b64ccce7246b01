//! Bet storage
//!
//! The repository trait is the seam between HTTP handlers and the ledger.
//! The only implementation is the in-memory ledger; nothing is persisted.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    context::{ContextError, OpContext},
    types::{Bet, ListBetsRequest, ListBetsResponse},
};

pub mod in_memory;
pub mod queries;

pub use in_memory::InMemoryBetRepository;

/// Errors surfaced by the ledger
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("bet {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Append-only bet ledger
#[async_trait]
pub trait BetRepository: Send + Sync {
    /// Record a new bet. Id and timestamp are assigned here.
    async fn create(
        &self,
        ctx: &OpContext,
        user_id: i64,
        amount: f64,
        crash_point: f64,
    ) -> Result<Bet, LedgerError>;

    /// Fetch an independent copy of a stored bet
    async fn get_by_id(&self, ctx: &OpContext, id: Uuid) -> Result<Bet, LedgerError>;

    /// Filter, sort and paginate stored bets
    async fn list(
        &self,
        ctx: &OpContext,
        request: &ListBetsRequest,
    ) -> Result<ListBetsResponse, LedgerError>;

    async fn health_check(&self, ctx: &OpContext) -> Result<(), LedgerError>;
}
