use crate::core::board::OrderBoard;
use crate::core::fare::FareSchedule;
use crate::core::generator::OrderGenerator;
use crate::core::lifecycle::OrderStep;
use crate::core::session::{DriverSession, SessionEvent, SessionStats, Timings};
use crate::core::Storage;
use crate::domain::model::{format_money, Order, Transaction};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Stand-in for the driver pressing accept or reject on an offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfferPolicy {
    AcceptAll,
    RejectAll,
    /// Let every offer run out.
    Ignore,
    MinEarningsPerKm(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    Accept,
    Reject,
    Wait,
}

impl OfferPolicy {
    pub fn decide(&self, order: &Order) -> OfferDecision {
        match self {
            Self::AcceptAll => OfferDecision::Accept,
            Self::RejectAll => OfferDecision::Reject,
            Self::Ignore => OfferDecision::Wait,
            Self::MinEarningsPerKm(min) => {
                if order.fare.earnings_per_km() >= *min {
                    OfferDecision::Accept
                } else {
                    OfferDecision::Reject
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopSummary {
    pub stats: SessionStats,
    pub offers: u32,
    pub transactions: Vec<Transaction>,
}

/// Online driver: polls the order board, falls back to generated orders and
/// walks each accepted order to completion.
pub struct DriverLoop<S: Storage, R: Rng> {
    board: OrderBoard<S>,
    session: DriverSession,
    generator: OrderGenerator<R>,
    policy: OfferPolicy,
    timings: Timings,
    max_orders: u32,
    max_ticks: u64,
}

impl<S: Storage, R: Rng> DriverLoop<S, R> {
    pub fn new(storage: S, rng: R, schedule: FareSchedule, timings: Timings) -> Self {
        Self {
            board: OrderBoard::new(storage),
            session: DriverSession::new(timings),
            generator: OrderGenerator::new(rng, schedule),
            policy: OfferPolicy::AcceptAll,
            timings,
            max_orders: 1,
            max_ticks: 100_000,
        }
    }

    pub fn with_policy(mut self, policy: OfferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_orders(mut self, max_orders: u32) -> Self {
        self.max_orders = max_orders;
        self
    }

    /// Starts the shift clock at `start` instead of the current time.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.session = DriverSession::starting_at(self.timings, start);
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub async fn run(mut self) -> Result<LoopSummary> {
        let tick = self.timings.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut summary = LoopSummary::default();
        let mut resolved = 0u32;
        let mut last_step = self.session.step();
        let mut in_step_for = Duration::ZERO;

        self.session.go_online();
        tracing::info!("🚀 Driver loop started, working {} order(s)", self.max_orders);

        for _ in 0..self.max_ticks {
            if self.session.step() == OrderStep::Idle && resolved >= self.max_orders {
                break;
            }

            let events = self.act(in_step_for, &mut summary).await?;
            resolved += self.handle_events(events, &mut summary).await?;

            ticker.tick().await;
            let events = self.session.advance(tick);
            resolved += self.handle_events(events, &mut summary).await?;

            let step = self.session.step();
            if step != last_step {
                last_step = step;
                in_step_for = Duration::ZERO;
            } else {
                in_step_for += tick;
            }
        }

        if resolved < self.max_orders {
            tracing::warn!(
                "⚠️ Driver loop stopped after {} tick(s) with {}/{} orders resolved",
                self.max_ticks,
                resolved,
                self.max_orders
            );
        }

        self.session.go_offline();
        summary.stats = self.session.stats().clone();
        tracing::info!(
            "✅ Shift finished: {} accepted, {} rejected ({} timed out), earnings {}",
            summary.stats.accepted,
            summary.stats.rejected,
            summary.stats.timed_out,
            format_money(summary.stats.earnings)
        );
        Ok(summary)
    }

    /// Whatever the driver would do right now in the current step.
    async fn act(
        &mut self,
        in_step_for: Duration,
        summary: &mut LoopSummary,
    ) -> Result<Vec<SessionEvent>> {
        let step = self.session.step();
        match step {
            OrderStep::Idle => {
                let order = match self.board.take().await? {
                    Some(order) => Some(order),
                    None if in_step_for >= self.timings.generate_after => {
                        Some(self.generator.generate()?)
                    }
                    None => None,
                };
                match order {
                    Some(order) => {
                        summary.offers += 1;
                        self.session.receive_offer(order)
                    }
                    None => Ok(Vec::new()),
                }
            }
            OrderStep::Offering if !self.session.is_accepting() => {
                let decision = self
                    .session
                    .order()
                    .map(|order| self.policy.decide(order))
                    .unwrap_or(OfferDecision::Wait);
                match decision {
                    OfferDecision::Accept => self.session.accept(),
                    OfferDecision::Reject => self.session.reject(),
                    OfferDecision::Wait => Ok(Vec::new()),
                }
            }
            step if step.is_on_trip() && in_step_for >= self.timings.step_delay => {
                let now = self.session.clock();
                match step {
                    OrderStep::GoingToStore => self.session.arrive_at_store(),
                    OrderStep::AtStore => self.session.collect_order(),
                    OrderStep::Delivering => self.session.arrive_at_customer(),
                    OrderStep::AtCustomer => self.session.complete_delivery(now),
                    _ => self.session.confirm_machine_return(now),
                }
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Persists completed deliveries; returns how many offers were resolved.
    async fn handle_events(
        &self,
        events: Vec<SessionEvent>,
        summary: &mut LoopSummary,
    ) -> Result<u32> {
        let mut resolved = 0;
        for event in events {
            match event {
                SessionEvent::Completed { transaction } => {
                    self.board.record_transaction(&transaction).await?;
                    tracing::info!(
                        "💰 Recorded {} for {}",
                        format_money(transaction.amount),
                        transaction.restaurant
                    );
                    summary.transactions.push(transaction);
                    resolved += 1;
                }
                SessionEvent::Rejected { .. } => resolved += 1,
                _ => {}
            }
        }
        Ok(resolved)
    }
}
