//! In-memory bet ledger with a per-user secondary index

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{queries, BetRepository, LedgerError};
use crate::{
    clock::{Clock, SystemClock},
    context::OpContext,
    types::{Bet, ListBetsRequest, ListBetsResponse},
};

/// Primary map and user index, always mutated together
#[derive(Debug, Default)]
struct Ledger {
    bets: HashMap<Uuid, Bet>,
    by_user: HashMap<i64, Vec<Uuid>>,
}

impl Ledger {
    fn insert(&mut self, bet: Bet) {
        self.by_user.entry(bet.user_id).or_default().push(bet.id);
        self.bets.insert(bet.id, bet);
    }

    fn bets_for_user(&self, user_id: i64) -> impl Iterator<Item = &Bet> {
        self.by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.bets.get(id))
    }
}

/// Append-only ledger guarded by a single lock.
///
/// One `RwLock` covers both the primary map and the index, so a reader never
/// sees a bet without its index entry or the reverse.
#[derive(Debug)]
pub struct InMemoryBetRepository {
    ledger: RwLock<Ledger>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBetRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            clock,
        }
    }

    /// Ids recorded for `user_id`, in insertion order
    pub async fn user_bet_ids(&self, user_id: i64) -> Vec<Uuid> {
        self.ledger
            .read()
            .await
            .by_user
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.ledger.read().await.bets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryBetRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BetRepository for InMemoryBetRepository {
    async fn create(
        &self,
        ctx: &OpContext,
        user_id: i64,
        amount: f64,
        crash_point: f64,
    ) -> Result<Bet, LedgerError> {
        ctx.check()?;

        let bet = Bet {
            id: Uuid::new_v4(),
            user_id,
            amount,
            crash_point,
            created_at: self.clock.utc_now(),
        };

        self.ledger.write().await.insert(bet.clone());
        debug!(bet_id = %bet.id, user_id, "bet recorded");

        Ok(bet)
    }

    async fn get_by_id(&self, ctx: &OpContext, id: Uuid) -> Result<Bet, LedgerError> {
        ctx.check()?;

        self.ledger
            .read()
            .await
            .bets
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn list(
        &self,
        ctx: &OpContext,
        request: &ListBetsRequest,
    ) -> Result<ListBetsResponse, LedgerError> {
        ctx.check()?;

        let ledger = self.ledger.read().await;
        let response = match request.filters.user_id {
            Some(user_id) => queries::execute(ledger.bets_for_user(user_id), request),
            None => queries::execute(ledger.bets.values(), request),
        };

        Ok(response)
    }

    async fn health_check(&self, ctx: &OpContext) -> Result<(), LedgerError> {
        ctx.check()?;

        let _ = self.ledger.read().await.bets.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        context::ContextError,
        types::{BetFilters, PaginationParams, SortField, SortOrder, SortParams},
    };
    use futures_util::future::join_all;
    use std::{collections::HashSet, time::Duration};
    use tokio_test::{assert_err, assert_ok};

    fn list_request(filters: BetFilters, sort: SortParams) -> ListBetsRequest {
        ListBetsRequest {
            filters,
            pagination: PaginationParams { page: 1, limit: 100 },
            sort,
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let repo = InMemoryBetRepository::new();
        let ctx = OpContext::background();

        let mut created = Vec::new();
        for (user_id, amount, crash_point) in [(1, 10.0, 1.5), (2, 250.0, 3.0), (1, 99.5, 42.0)] {
            created.push(repo.create(&ctx, user_id, amount, crash_point).await.unwrap());
        }

        for bet in &created {
            let fetched = repo.get_by_id(&ctx, bet.id).await.unwrap();
            assert_eq!(&fetched, bet);
        }

        let ids: HashSet<Uuid> = created.iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), created.len());
    }

    #[tokio::test]
    async fn test_returned_bet_is_a_copy() {
        let repo = InMemoryBetRepository::new();
        let ctx = OpContext::background();

        let bet = repo.create(&ctx, 5, 20.0, 2.0).await.unwrap();
        let mut fetched = repo.get_by_id(&ctx, bet.id).await.unwrap();
        fetched.amount = 1_000_000.0;
        fetched.user_id = 6;

        let again = repo.get_by_id(&ctx, bet.id).await.unwrap();
        assert_eq!(again, bet);
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let repo = InMemoryBetRepository::new();
        let id = Uuid::new_v4();

        let result = repo.get_by_id(&OpContext::background(), id).await;
        assert_eq!(result, Err(LedgerError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_cancelled_context_is_surfaced() {
        let repo = InMemoryBetRepository::new();
        let ctx = OpContext::background();
        ctx.cancel();

        let cancelled = LedgerError::Context(ContextError::Cancelled);
        assert_eq!(repo.create(&ctx, 1, 10.0, 2.0).await, Err(cancelled.clone()));
        assert_eq!(repo.get_by_id(&ctx, Uuid::new_v4()).await, Err(cancelled.clone()));
        assert_eq!(
            repo.list(&ctx, &ListBetsRequest::default()).await,
            Err(cancelled.clone())
        );
        assert_eq!(repo.health_check(&ctx).await, Err(cancelled));

        // Nothing was written
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_deadline_is_surfaced() {
        let repo = InMemoryBetRepository::new();
        let ctx = OpContext::with_timeout(Duration::ZERO);

        assert_eq!(
            repo.create(&ctx, 1, 10.0, 2.0).await,
            Err(LedgerError::Context(ContextError::DeadlineExceeded))
        );
        assert_err!(repo.health_check(&ctx).await);
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let repo = InMemoryBetRepository::new();
        let request = ListBetsRequest {
            filters: BetFilters {
                user_id: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };

        let by_user = repo.list(&OpContext::background(), &request).await.unwrap();
        assert_eq!(by_user.total, 0);
        assert!(by_user.bets.is_empty());

        let all = repo
            .list(&OpContext::background(), &ListBetsRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 0);
        assert_eq!((all.page, all.limit), (1, 10));
    }

    #[tokio::test]
    async fn test_list_by_user_with_amount_range() {
        let clock = Arc::new(ManualClock::new());
        let repo = InMemoryBetRepository::with_clock(clock.clone());
        let ctx = OpContext::background();

        for (user_id, amount) in [(1, 5.0), (2, 15.0), (1, 25.0), (1, 15.0), (2, 5.0)] {
            repo.create(&ctx, user_id, amount, 2.0).await.unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let filters = BetFilters {
            user_id: Some(1),
            min_amount: Some(10.0),
            max_amount: None,
        };
        let sort = SortParams {
            sort_by: SortField::CreatedAt,
            order: SortOrder::Asc,
        };
        let response = repo.list(&ctx, &list_request(filters, sort)).await.unwrap();

        assert_eq!(response.total, 2);
        let amounts: Vec<f64> = response.bets.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![25.0, 15.0]);
        assert!(response.bets.iter().all(|b| b.user_id == 1));
    }

    #[tokio::test]
    async fn test_list_sorted_by_amount() {
        let repo = InMemoryBetRepository::new();
        let ctx = OpContext::background();
        for amount in [50.0, 10.0, 30.0] {
            repo.create(&ctx, 9, amount, 2.0).await.unwrap();
        }

        let asc = SortParams {
            sort_by: SortField::Amount,
            order: SortOrder::Asc,
        };
        let response = repo
            .list(&ctx, &list_request(BetFilters::default(), asc))
            .await
            .unwrap();
        let amounts: Vec<f64> = response.bets.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![10.0, 30.0, 50.0]);
    }

    #[tokio::test]
    async fn test_default_sort_is_newest_first() {
        let clock = Arc::new(ManualClock::new());
        let repo = InMemoryBetRepository::with_clock(clock.clone());
        let ctx = OpContext::background();

        let mut ids = Vec::new();
        for amount in [1.0, 2.0, 3.0] {
            ids.push(repo.create(&ctx, 1, amount, 2.0).await.unwrap().id);
            clock.advance(Duration::from_millis(10));
        }

        let response = repo.list(&ctx, &ListBetsRequest::default()).await.unwrap();
        let listed: Vec<Uuid> = response.bets.iter().map(|b| b.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_keep_index_complete() {
        let repo = Arc::new(InMemoryBetRepository::new());
        let tasks = (0..8).map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let ctx = OpContext::background();
                let mut ids = Vec::new();
                for i in 0..50 {
                    ids.push(repo.create(&ctx, 42, 1.0 + i as f64, 2.0).await.unwrap().id);
                }
                ids
            })
        });

        let mut created = HashSet::new();
        for ids in join_all(tasks).await {
            created.extend(ids.unwrap());
        }

        let indexed = repo.user_bet_ids(42).await;
        let unique: HashSet<Uuid> = indexed.iter().copied().collect();

        assert_eq!(created.len(), 400);
        assert_eq!(indexed.len(), 400);
        assert_eq!(unique, created);
        assert_eq!(repo.len().await, 400);
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = InMemoryBetRepository::new();
        assert_ok!(repo.health_check(&OpContext::background()).await);
    }
}
