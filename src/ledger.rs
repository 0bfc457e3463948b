//! Credit ledger
//!
//! Single source of truth for the user's generation credits. The in-memory
//! balance is authoritative for the session; every mutation is mirrored to the
//! profile store in the background and a failed write is only logged.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::account::{PlanTier, ProfileStore, ProfileUpdate, User};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: u32, available: u32 },
    #[error("credit amounts must be positive")]
    InvalidAmount,
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub balance: u32,
    pub plan: PlanTier,
    /// Last balance the profile store acknowledged, if any write succeeded yet.
    pub confirmed: Option<u32>,
}

#[derive(Debug)]
struct Balances {
    local: u32,
    plan: PlanTier,
    confirmed: Option<u32>,
}

struct LedgerInner {
    user_id: String,
    balances: Mutex<Balances>,
    store: Arc<dyn ProfileStore>,
    runtime: Handle,
    /// Serialises profile writes so the last one to land carries the latest balance.
    write_lock: tokio::sync::Mutex<()>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to the user's credit balance.
///
/// Cloning is cheap; all clones see the same balance.
#[derive(Clone)]
pub struct CreditLedger {
    inner: Arc<LedgerInner>,
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger")
            .field("user_id", &self.inner.user_id)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl CreditLedger {
    /// Create a ledger seeded from the user's profile. Persistence tasks are
    /// spawned on `runtime`.
    pub fn new(user: &User, store: Arc<dyn ProfileStore>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                user_id: user.id.clone(),
                balances: Mutex::new(Balances {
                    local: user.credits,
                    plan: user.plan,
                    confirmed: Some(user.credits),
                }),
                store,
                runtime,
                write_lock: tokio::sync::Mutex::new(()),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn balance(&self) -> u32 {
        self.balances().local
    }

    pub fn plan(&self) -> PlanTier {
        self.balances().plan
    }

    /// Last balance the profile store acknowledged.
    pub fn confirmed_balance(&self) -> Option<u32> {
        self.balances().confirmed
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        cost == 0 || self.balance() >= cost
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let b = self.balances();
        LedgerSnapshot {
            balance: b.local,
            plan: b.plan,
            confirmed: b.confirmed,
        }
    }

    /// Remove `amount` credits.
    ///
    /// When the balance is too small nothing changes and
    /// [`LedgerError::InsufficientCredits`] is returned.
    pub fn debit(&self, amount: u32) -> Result<u32, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let new_balance = {
            let mut b = self.balances();
            if amount > b.local {
                return Err(LedgerError::InsufficientCredits {
                    needed: amount,
                    available: b.local,
                });
            }
            b.local -= amount;
            b.local
        };
        tracing::info!(user_id = %self.inner.user_id, amount, balance = new_balance, "credits debited");
        self.persist(false);
        Ok(new_balance)
    }

    /// Add `amount` credits, optionally switching the plan tier.
    pub fn credit(&self, amount: u32, plan: Option<PlanTier>) -> Result<u32, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let new_balance = {
            let mut b = self.balances();
            b.local = b.local.saturating_add(amount);
            if let Some(plan) = plan {
                b.plan = plan;
            }
            b.local
        };
        tracing::info!(
            user_id = %self.inner.user_id,
            amount,
            plan = ?plan,
            balance = new_balance,
            "credits added"
        );
        self.persist(plan.is_some());
        Ok(new_balance)
    }

    /// Wait for every profile write spawned so far.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "profile sync task aborted");
            }
        }
    }

    fn balances(&self) -> MutexGuard<'_, Balances> {
        self.inner
            .balances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, include_plan: bool) {
        let inner = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            let _guard = inner.write_lock.lock().await;
            let (credits, plan) = {
                let b = inner.balances.lock().unwrap_or_else(|p| p.into_inner());
                (b.local, b.plan)
            };
            let update = ProfileUpdate {
                credits: Some(credits),
                plan: include_plan.then_some(plan),
            };
            match inner.store.update(&inner.user_id, update).await {
                Ok(()) => {
                    let mut b = inner.balances.lock().unwrap_or_else(|p| p.into_inner());
                    b.confirmed = Some(credits);
                    tracing::debug!(user_id = %inner.user_id, credits, "profile synced");
                }
                Err(e) => {
                    tracing::warn!(user_id = %inner.user_id, error = %e, "failed to sync credits");
                }
            }
        });

        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}
