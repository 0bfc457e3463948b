//! Generation request coordinator
//!
//! Runs one generation attempt for a tool: checks credits, hands out a
//! [`Ticket`] for the external call, then applies the result and debits the
//! ledger only when the call succeeded.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam_channel::Sender;

use crate::adjust::AdjustableResult;
use crate::ledger::CreditLedger;
use crate::provider::ProviderError;
use crate::tools::Tool;

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    CreditCheck,
    InsufficientCredits,
    Requesting,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Side channel from the coordinator to the UI
pub trait Notifier: Send + Sync {
    /// Ask the UI to show the credit upsell.
    fn open_upsell(&self, tool: Tool, cost: u32);

    fn notify(&self, notice: Notice);
}

/// UI-bound notification events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiSignal {
    Upsell { tool: Tool, cost: u32 },
    Notice(Notice),
}

/// Forwards notifications over a crossbeam channel to the UI thread.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<UiSignal>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<UiSignal>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn open_upsell(&self, tool: Tool, cost: u32) {
        let _ = self.tx.send(UiSignal::Upsell { tool, cost });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.tx.send(UiSignal::Notice(notice));
    }
}

/// Keeps every signal in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    signals: Mutex<Vec<UiSignal>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<UiSignal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn upsell_count(&self) -> usize {
        self.signals()
            .iter()
            .filter(|s| matches!(s, UiSignal::Upsell { .. }))
            .count()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.signals()
            .into_iter()
            .filter_map(|s| match s {
                UiSignal::Notice(n) => Some(n),
                UiSignal::Upsell { .. } => None,
            })
            .collect()
    }

    fn push(&self, signal: UiSignal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn open_upsell(&self, tool: Tool, cost: u32) {
        self.push(UiSignal::Upsell { tool, cost });
    }

    fn notify(&self, notice: Notice) {
        self.push(UiSignal::Notice(notice));
    }
}

/// Why an attempt did not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Balance below cost; the upsell was opened.
    Upsell { needed: u32, available: u32 },
    /// A call for this tool is already in flight.
    Busy,
}

static NEXT_COORDINATOR: AtomicU64 = AtomicU64::new(1);

/// Permission to run one external call.
///
/// Must be handed back to [`GenerationCoordinator::finish`] of the
/// coordinator that issued it; any other coordinator refuses it.
#[derive(Debug)]
#[must_use = "an unfinished ticket leaves the coordinator busy"]
pub struct Ticket {
    cost: u32,
    owner: u64,
}

impl Ticket {
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

/// A successful call's payload
#[derive(Debug)]
pub enum Delivery<A> {
    /// The whole result arrived; the cost is charged.
    Complete(A),
    /// Usable result with a failed paid step; nothing is charged.
    Partial(A, ProviderError),
}

/// Per-tool coordinator owning the tool's adjustable result.
pub struct GenerationCoordinator<A> {
    id: u64,
    tool: Tool,
    ledger: CreditLedger,
    notifier: std::sync::Arc<dyn Notifier>,
    result: AdjustableResult<A>,
    phase: Phase,
    in_flight: bool,
}

impl<A> fmt::Debug for GenerationCoordinator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationCoordinator")
            .field("tool", &self.tool)
            .field("phase", &self.phase)
            .field("in_flight", &self.in_flight)
            .field("has_artifact", &self.result.has_artifact())
            .finish()
    }
}

impl<A> GenerationCoordinator<A> {
    pub fn new(
        tool: Tool,
        ledger: CreditLedger,
        notifier: std::sync::Arc<dyn Notifier>,
        result: AdjustableResult<A>,
    ) -> Self {
        Self {
            id: NEXT_COORDINATOR.fetch_add(1, Ordering::Relaxed),
            tool,
            ledger,
            notifier,
            result,
            phase: Phase::Idle,
            in_flight: false,
        }
    }

    /// Whether `ticket` was issued by this coordinator.
    pub fn owns(&self, ticket: &Ticket) -> bool {
        ticket.owner == self.id
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn result(&self) -> &AdjustableResult<A> {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut AdjustableResult<A> {
        &mut self.result
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Check credits and reserve the in-flight slot.
    pub fn begin(&mut self, cost: u32) -> Result<Ticket, Gate> {
        if self.in_flight {
            tracing::debug!(tool = %self.tool, "generation already in flight");
            return Err(Gate::Busy);
        }

        self.phase = Phase::CreditCheck;
        let available = self.ledger.balance();
        if cost > 0 && available < cost {
            self.phase = Phase::InsufficientCredits;
            tracing::info!(tool = %self.tool, cost, available, "insufficient credits");
            self.notifier.open_upsell(self.tool, cost);
            return Err(Gate::Upsell { needed: cost, available });
        }

        self.phase = Phase::Requesting;
        self.in_flight = true;
        tracing::info!(tool = %self.tool, cost, "generation requested");
        Ok(Ticket { cost, owner: self.id })
    }

    /// Drop a finished attempt's outcome so the tool reads as idle again.
    /// An attempt still in flight is left alone.
    pub fn clear_outcome(&mut self) {
        if !self.in_flight {
            self.phase = Phase::Idle;
        }
    }

    fn refuse(&self, ticket: &Ticket) -> bool {
        if self.owns(ticket) {
            return false;
        }
        tracing::warn!(tool = %self.tool, cost = ticket.cost, "ignoring result issued by another coordinator");
        true
    }

    /// Apply the call result: replace the artifact and debit on success.
    pub fn finish(&mut self, ticket: Ticket, result: Result<A, ProviderError>) -> Phase {
        self.finish_delivery(ticket, result.map(Delivery::Complete))
    }

    /// A ticket from another coordinator changes nothing.
    pub fn finish_delivery(&mut self, ticket: Ticket, result: Result<Delivery<A>, ProviderError>) -> Phase {
        if self.refuse(&ticket) {
            return self.phase;
        }
        self.in_flight = false;
        match result {
            Ok(Delivery::Complete(artifact)) => {
                self.result.set_artifact(artifact);
                self.charge(ticket.cost);
                self.phase = Phase::Success;
                tracing::info!(tool = %self.tool, cost = ticket.cost, "generation succeeded");
            }
            Ok(Delivery::Partial(artifact, error)) => {
                self.result.set_artifact(artifact);
                self.phase = Phase::Success;
                tracing::warn!(tool = %self.tool, error = %error, "generation partially succeeded");
                self.notifier.notify(Notice::error(format!(
                    "{}: generated without the paid step ({}). No credits were used.",
                    self.tool.name(),
                    error
                )));
            }
            Err(error) => {
                self.phase = Phase::Failed;
                tracing::warn!(tool = %self.tool, error = %error, "generation failed");
                self.notifier
                    .notify(Notice::error(format!("{} failed: {}", self.tool.name(), error)));
            }
        }
        self.phase
    }

    /// Patch the current artifact with `result` instead of replacing it.
    ///
    /// Adjustments are kept. Used for follow-up calls that refresh part of an
    /// existing artifact; fails like [`finish`](Self::finish) when there is
    /// nothing to patch.
    pub fn finish_update<B>(
        &mut self,
        ticket: Ticket,
        result: Result<B, ProviderError>,
        apply: impl FnOnce(&mut A, B),
    ) -> Phase {
        if self.refuse(&ticket) {
            return self.phase;
        }
        self.in_flight = false;
        match result {
            Ok(_) if !self.result.has_artifact() => {
                self.phase = Phase::Failed;
                self.notifier
                    .notify(Notice::error(format!("{}: nothing to update yet", self.tool.name())));
            }
            Ok(update) => {
                self.result.update_artifact(|artifact| apply(artifact, update));
                self.charge(ticket.cost);
                self.phase = Phase::Success;
                tracing::info!(tool = %self.tool, cost = ticket.cost, "artifact updated");
            }
            Err(error) => {
                self.phase = Phase::Failed;
                tracing::warn!(tool = %self.tool, error = %error, "update failed");
                self.notifier
                    .notify(Notice::error(format!("{} failed: {}", self.tool.name(), error)));
            }
        }
        self.phase
    }

    /// Run one attempt end to end. `call` is only invoked when the attempt
    /// passes the credit check.
    pub async fn generate<F, Fut>(&mut self, cost: u32, call: F) -> Result<Phase, Gate>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<A, ProviderError>>,
    {
        let ticket = self.begin(cost)?;
        let result = call().await;
        Ok(self.finish(ticket, result))
    }

    fn charge(&mut self, cost: u32) {
        if cost == 0 {
            return;
        }
        if let Err(e) = self.ledger.debit(cost) {
            // balance moved under us between check and completion
            tracing::warn!(tool = %self.tool, error = %e, "debit after success failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryProfileStore, PlanTier, User};
    use crate::adjust::{Adjustment, AdjustmentLimits};
    use std::sync::Arc;
    use tokio::runtime::Handle;

    fn coordinator(credits: u32) -> (GenerationCoordinator<u32>, Arc<RecordingNotifier>) {
        coordinator_for("u1", credits)
    }

    fn coordinator_for(id: &str, credits: u32) -> (GenerationCoordinator<u32>, Arc<RecordingNotifier>) {
        let user = User {
            id: id.into(),
            email: "chef@example.com".into(),
            name: "Chef".into(),
            plan: PlanTier::Free,
            credits,
        };
        let ledger = CreditLedger::new(&user, Arc::new(MemoryProfileStore::new()), Handle::current());
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = GenerationCoordinator::new(
            Tool::Logo,
            ledger,
            notifier.clone(),
            AdjustableResult::new(AdjustmentLimits::FREE_TRANSFORM),
        );
        (coordinator, notifier)
    }

    #[tokio::test]
    async fn test_success_debits_once() {
        let (mut c, _) = coordinator(5);
        let phase = c.generate(1, || async { Ok(7) }).await.unwrap();
        assert_eq!(phase, Phase::Success);
        assert_eq!(c.ledger().balance(), 4);
        assert_eq!(c.result().artifact(), Some(&7));
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn test_zero_balance_opens_upsell_without_call() {
        let (mut c, notifier) = coordinator(0);
        let mut called = false;
        let gate = c
            .generate(1, || {
                called = true;
                async { Ok(1) }
            })
            .await;
        assert_eq!(gate, Err(Gate::Upsell { needed: 1, available: 0 }));
        assert!(!called);
        assert_eq!(c.phase(), Phase::InsufficientCredits);
        assert_eq!(notifier.upsell_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_artifact_and_balance() {
        let (mut c, notifier) = coordinator(5);
        c.generate(1, || async { Ok(1) }).await.unwrap();
        let phase = c
            .generate(1, || async { Err(ProviderError::NoImage) })
            .await
            .unwrap();
        assert_eq!(phase, Phase::Failed);
        assert_eq!(c.result().artifact(), Some(&1));
        assert_eq!(c.ledger().balance(), 4);
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_second_begin_is_busy() {
        let (mut c, _) = coordinator(5);
        let first = c.begin(1).unwrap();
        assert_eq!(c.begin(1).unwrap_err(), Gate::Busy);
        assert_eq!(c.finish(first, Ok(3)), Phase::Success);
        assert_eq!(c.ledger().balance(), 4);
    }

    #[tokio::test]
    async fn test_free_update_keeps_adjustments() {
        let (mut c, _) = coordinator(1);
        c.generate(1, || async { Ok(10) }).await.unwrap();
        c.result_mut().set_adjustment(Adjustment::Rotation(15.0));
        let ticket = c.begin(0).unwrap();
        let phase = c.finish_update(ticket, Ok(5), |a, b| *a += b);
        assert_eq!(phase, Phase::Success);
        assert_eq!(c.result().artifact(), Some(&15));
        assert_eq!(c.result().adjustments().rotation, 15.0);
        assert_eq!(c.ledger().balance(), 0);
    }

    #[tokio::test]
    async fn test_update_without_artifact_fails() {
        let (mut c, notifier) = coordinator(1);
        let ticket = c.begin(0).unwrap();
        assert_eq!(c.finish_update(ticket, Ok(5), |a, b| *a += b), Phase::Failed);
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_delivery_is_free() {
        let (mut c, notifier) = coordinator(2);
        let ticket = c.begin(1).unwrap();
        c.finish_delivery(ticket, Ok(Delivery::Partial(9, ProviderError::NoImage)));
        assert_eq!(c.result().artifact(), Some(&9));
        assert_eq!(c.ledger().balance(), 2);
        assert_eq!(notifier.notices()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_new_artifact_resets_adjustments() {
        let (mut c, _) = coordinator(5);
        c.generate(1, || async { Ok(1) }).await.unwrap();
        c.result_mut().set_adjustment(Adjustment::Scale(1.7));
        c.generate(1, || async { Ok(2) }).await.unwrap();
        assert_eq!(c.result().adjustments().scale, 1.0);
        assert_eq!(c.ledger().balance(), 3);
    }

    #[tokio::test]
    async fn test_foreign_ticket_is_refused() {
        let (mut first, _) = coordinator_for("u1", 5);
        let (mut second, notifier) = coordinator_for("u2", 5);
        let stale = first.begin(1).unwrap();
        assert!(!second.owns(&stale));

        let own = second.begin(1).unwrap();
        assert_eq!(second.finish(stale, Ok(42)), Phase::Requesting);
        assert!(second.is_busy());
        assert!(!second.result().has_artifact());
        assert_eq!(second.ledger().balance(), 5);
        assert!(notifier.notices().is_empty());

        // the issuing coordinator still holds its slot
        assert_eq!(first.begin(0).unwrap_err(), Gate::Busy);
        assert_eq!(second.finish(own, Ok(1)), Phase::Success);
        assert_eq!(second.ledger().balance(), 4);
    }

    #[tokio::test]
    async fn test_foreign_update_is_refused() {
        let (mut first, _) = coordinator_for("u1", 5);
        let (mut second, _) = coordinator_for("u2", 5);
        second.generate(0, || async { Ok(10) }).await.unwrap();
        let stale = first.begin(0).unwrap();
        second.finish_update(stale, Ok(5), |a, b| *a += b);
        assert_eq!(second.result().artifact(), Some(&10));
    }

    #[tokio::test]
    async fn test_clear_outcome_returns_to_idle() {
        let (mut c, _) = coordinator(5);
        c.generate(1, || async { Err(ProviderError::NoImage) }).await.unwrap();
        assert_eq!(c.phase(), Phase::Failed);
        c.clear_outcome();
        assert_eq!(c.phase(), Phase::Idle);

        let ticket = c.begin(1).unwrap();
        c.clear_outcome();
        assert_eq!(c.phase(), Phase::Requesting);
        assert_eq!(c.finish(ticket, Ok(2)), Phase::Success);
    }
}
