use crate::core::lifecycle::{transition, DriverEvent, OrderStep};
use crate::domain::model::{Order, Transaction};
use crate::utils::error::{CourierError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timer lengths used by the driver session and loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    pub offer_window: Duration,
    pub accept_delay: Duration,
    pub completion_display: Duration,
    pub arrival_window: Duration,
    pub poll_interval: Duration,
    pub generate_after: Duration,
    pub step_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            offer_window: Duration::from_secs(15),
            accept_delay: Duration::from_millis(1500),
            completion_display: Duration::from_secs(4),
            arrival_window: Duration::from_secs(11 * 60),
            poll_interval: Duration::from_secs(1),
            generate_after: Duration::from_secs(4),
            step_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    OfferStarted { order_id: String },
    Accepted { order_id: String },
    Rejected { order_id: String, reason: RejectReason },
    StepChanged { from: OrderStep, to: OrderStep },
    Completed { transaction: Transaction },
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub accepted: u32,
    pub rejected: u32,
    pub timed_out: u32,
    pub earnings: f64,
}

/// One driver's shift: the lifecycle automaton plus its countdowns, counters
/// and the order currently on screen. Time only moves through [`advance`].
///
/// [`advance`]: DriverSession::advance
#[derive(Debug)]
pub struct DriverSession {
    timings: Timings,
    online: bool,
    step: OrderStep,
    order: Option<Order>,
    offer_remaining: Duration,
    accepting_remaining: Option<Duration>,
    completion_remaining: Option<Duration>,
    arrival_remaining: Duration,
    stats: SessionStats,
    clock: DateTime<Utc>,
}

impl DriverSession {
    pub fn new(timings: Timings) -> Self {
        Self::starting_at(timings, Utc::now())
    }

    /// Session whose clock starts at `start` and only moves with [`advance`].
    ///
    /// [`advance`]: DriverSession::advance
    pub fn starting_at(timings: Timings, start: DateTime<Utc>) -> Self {
        Self {
            timings,
            online: false,
            step: OrderStep::Idle,
            order: None,
            offer_remaining: Duration::ZERO,
            accepting_remaining: None,
            completion_remaining: None,
            arrival_remaining: Duration::ZERO,
            stats: SessionStats::default(),
            clock: start,
        }
    }

    /// Shift time: the start instant plus everything passed to `advance`.
    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    pub fn step(&self) -> OrderStep {
        self.step
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting_remaining.is_some()
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn offer_remaining(&self) -> Duration {
        self.offer_remaining
    }

    pub fn arrival_remaining(&self) -> Duration {
        self.arrival_remaining
    }

    pub fn go_online(&mut self) {
        if !self.online {
            tracing::info!("🟢 Driver is online");
        }
        self.online = true;
    }

    /// Drops any offer or trip in progress and cancels every timer.
    pub fn go_offline(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let from = self.step;
        self.step = transition(self.step, DriverEvent::GoOffline, false)
            .unwrap_or(OrderStep::Idle);
        if from != self.step {
            events.push(SessionEvent::StepChanged {
                from,
                to: self.step,
            });
        }
        if self.order.take().is_some() {
            events.push(SessionEvent::Cleared);
        }
        self.accepting_remaining = None;
        self.completion_remaining = None;
        self.offer_remaining = Duration::ZERO;
        self.online = false;
        tracing::info!("🔴 Driver is offline");
        events
    }

    pub fn receive_offer(&mut self, order: Order) -> Result<Vec<SessionEvent>> {
        if !self.online {
            return Err(CourierError::InvalidTransition {
                from: "offline".to_string(),
                event: DriverEvent::OrderOffered.to_string(),
            });
        }
        let needs_machine = order.needs_machine();
        let next = transition(self.step, DriverEvent::OrderOffered, needs_machine)?;

        tracing::info!(
            "🔔 New offer {} from {}: {} for {}",
            order.id,
            order.restaurant,
            crate::domain::model::format_money(order.driver_fee()),
            order.distance_label()
        );

        let order_id = order.id.clone();
        self.order = Some(order);
        self.offer_remaining = self.timings.offer_window;
        let mut events = vec![SessionEvent::OfferStarted { order_id }];
        events.push(self.move_to(next));
        Ok(events)
    }

    /// Starts the short "accepting" animation; the trip begins once it has
    /// elapsed. The offer countdown is frozen meanwhile.
    pub fn accept(&mut self) -> Result<Vec<SessionEvent>> {
        if self.step != OrderStep::Offering || self.is_accepting() {
            return Err(self.invalid(DriverEvent::Accept));
        }
        self.accepting_remaining = Some(self.timings.accept_delay);
        tracing::debug!("Accepting order, starting in {:?}", self.timings.accept_delay);
        if self.timings.accept_delay.is_zero() {
            return Ok(self.finish_accepting());
        }
        Ok(Vec::new())
    }

    pub fn reject(&mut self) -> Result<Vec<SessionEvent>> {
        if self.is_accepting() {
            return Err(self.invalid(DriverEvent::Reject));
        }
        self.resolve_rejection(DriverEvent::Reject, RejectReason::Manual)
    }

    pub fn arrive_at_store(&mut self) -> Result<Vec<SessionEvent>> {
        self.manual(DriverEvent::ArriveAtStore)
    }

    pub fn collect_order(&mut self) -> Result<Vec<SessionEvent>> {
        self.manual(DriverEvent::CollectOrder)
    }

    pub fn arrive_at_customer(&mut self) -> Result<Vec<SessionEvent>> {
        self.manual(DriverEvent::ArriveAtCustomer)
    }

    /// Hands the order over. Orders paid with a card machine wait for the
    /// machine to be returned before they complete.
    pub fn complete_delivery(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEvent>> {
        let mut events = self.manual(DriverEvent::CompleteDelivery)?;
        if self.step == OrderStep::Completed {
            events.extend(self.finish_order(false, now));
        }
        Ok(events)
    }

    pub fn confirm_machine_return(&mut self, now: DateTime<Utc>) -> Result<Vec<SessionEvent>> {
        let mut events = self.manual(DriverEvent::ConfirmMachineReturn)?;
        events.extend(self.finish_order(true, now));
        Ok(events)
    }

    /// Runs every countdown forward by `elapsed`.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.clock = chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| self.clock.checked_add_signed(delta))
            .unwrap_or(self.clock);

        let mut elapsed = elapsed;
        if let Some(remaining) = self.accepting_remaining {
            if elapsed < remaining {
                self.accepting_remaining = Some(remaining - elapsed);
                return events;
            }
            // 剩餘時間算進剛開始的抵達倒數
            elapsed -= remaining;
            events.extend(self.finish_accepting());
        }

        match self.step {
            OrderStep::Offering => {
                self.offer_remaining = self.offer_remaining.saturating_sub(elapsed);
                if self.offer_remaining.is_zero() {
                    tracing::info!("⏰ Offer expired");
                    if let Ok(rejected) =
                        self.resolve_rejection(DriverEvent::OfferTimeout, RejectReason::Timeout)
                    {
                        events.extend(rejected);
                    }
                }
            }
            OrderStep::Completed => {
                let left = self
                    .completion_remaining
                    .unwrap_or_default()
                    .saturating_sub(elapsed);
                if left.is_zero() {
                    self.completion_remaining = None;
                    if let Ok(next) = transition(self.step, DriverEvent::DisplayElapsed, false) {
                        events.push(self.move_to(next));
                    }
                    if self.order.take().is_some() {
                        events.push(SessionEvent::Cleared);
                    }
                } else {
                    self.completion_remaining = Some(left);
                }
            }
            step if step.is_on_trip() => {
                self.arrival_remaining = self.arrival_remaining.saturating_sub(elapsed);
            }
            _ => {}
        }

        events
    }

    fn finish_accepting(&mut self) -> Vec<SessionEvent> {
        self.accepting_remaining = None;
        let needs_machine = self.needs_machine();
        let mut events = Vec::new();
        if let Ok(next) = transition(self.step, DriverEvent::Accept, needs_machine) {
            if let Some(order) = &self.order {
                events.push(SessionEvent::Accepted {
                    order_id: order.id.clone(),
                });
                tracing::info!("✅ Accepted order {}, heading to {}", order.id, order.restaurant_address);
            }
            self.arrival_remaining = self.timings.arrival_window;
            events.push(self.move_to(next));
        }
        events
    }

    fn resolve_rejection(
        &mut self,
        event: DriverEvent,
        reason: RejectReason,
    ) -> Result<Vec<SessionEvent>> {
        let next = transition(self.step, event, self.needs_machine())?;
        let order_id = self.order.take().map(|o| o.id).unwrap_or_default();

        self.stats.rejected += 1;
        if reason == RejectReason::Timeout {
            self.stats.timed_out += 1;
        }
        self.offer_remaining = Duration::ZERO;
        tracing::info!("❌ Order {} rejected ({:?})", order_id, reason);

        Ok(vec![
            SessionEvent::Rejected { order_id, reason },
            self.move_to(next),
            SessionEvent::Cleared,
        ])
    }

    fn finish_order(&mut self, machine_returned: bool, now: DateTime<Utc>) -> Vec<SessionEvent> {
        let Some(order) = &self.order else {
            return Vec::new();
        };

        let mut amount = order.driver_fee();
        if machine_returned {
            amount += order.fare.machine_bonus;
        }

        self.stats.accepted += 1;
        self.stats.earnings += amount;
        self.completion_remaining = Some(self.timings.completion_display);

        tracing::info!(
            "🏁 Delivered order {}: +{}",
            order.id,
            crate::domain::model::format_money(amount)
        );

        vec![SessionEvent::Completed {
            transaction: Transaction::delivery(order, amount, now),
        }]
    }

    fn manual(&mut self, event: DriverEvent) -> Result<Vec<SessionEvent>> {
        let next = transition(self.step, event, self.needs_machine())?;
        Ok(vec![self.move_to(next)])
    }

    fn move_to(&mut self, next: OrderStep) -> SessionEvent {
        let from = self.step;
        self.step = next;
        tracing::debug!("Order step {} -> {}", from, next);
        SessionEvent::StepChanged { from, to: next }
    }

    fn needs_machine(&self) -> bool {
        self.order.as_ref().map(Order::needs_machine).unwrap_or(false)
    }

    fn invalid(&self, event: DriverEvent) -> CourierError {
        CourierError::InvalidTransition {
            from: self.step.to_string(),
            event: event.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fare::FareSchedule;
    use crate::domain::model::{OrderOrigin, PaymentMethod, RouteType};

    fn order(payment: PaymentMethod) -> Order {
        let fare = FareSchedule::default()
            .quote(5.0, RouteType::Single, payment)
            .unwrap();
        Order {
            id: "#1234".to_string(),
            origin: OrderOrigin::Generated,
            restaurant: "Burger King".to_string(),
            restaurant_address: "Av. Paulista, 1230".to_string(),
            customer_name: "Juliana Martins".to_string(),
            customer_address: "Rua Augusta, 1500".to_string(),
            distance_km: 5.0,
            route_type: RouteType::Single,
            payment_method: payment,
            sub_orders: Vec::new(),
            fare,
            pickup_code: "4321".to_string(),
            estimated_minutes: 21,
        }
    }

    fn online_session() -> DriverSession {
        let mut session = DriverSession::new(Timings::default());
        session.go_online();
        session
    }

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn drive_to_customer(session: &mut DriverSession) {
        session.accept().unwrap();
        session.advance(Duration::from_millis(1500));
        session.arrive_at_store().unwrap();
        session.collect_order().unwrap();
        session.arrive_at_customer().unwrap();
    }

    #[test]
    fn test_offline_driver_cannot_receive_orders() {
        let mut session = DriverSession::new(Timings::default());
        assert!(session.receive_offer(order(PaymentMethod::App)).is_err());
        assert_eq!(session.step(), OrderStep::Idle);
    }

    #[test]
    fn test_offer_times_out_after_window() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        assert_eq!(session.offer_remaining(), Duration::from_secs(15));

        for _ in 0..14 {
            assert!(session.advance(Duration::from_secs(1)).is_empty());
        }
        assert_eq!(session.step(), OrderStep::Offering);

        let events = session.advance(Duration::from_secs(1));
        assert!(events.contains(&SessionEvent::Rejected {
            order_id: "#1234".to_string(),
            reason: RejectReason::Timeout,
        }));
        assert_eq!(session.step(), OrderStep::Idle);
        assert!(session.order().is_none());
        assert_eq!(session.stats().rejected, 1);
        assert_eq!(session.stats().timed_out, 1);
    }

    #[test]
    fn test_accept_waits_for_delay_and_freezes_countdown() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        session.advance(Duration::from_secs(14));
        session.accept().unwrap();

        // 倒數凍結：不會逾時，也不能再拒絕
        assert!(session.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(session.step(), OrderStep::Offering);
        assert!(session.reject().is_err());

        let events = session.advance(Duration::from_millis(500));
        assert_eq!(session.step(), OrderStep::GoingToStore);
        assert!(events.contains(&SessionEvent::Accepted {
            order_id: "#1234".to_string()
        }));
        assert_eq!(session.stats().rejected, 0);
        assert_eq!(session.arrival_remaining(), Duration::from_secs(660));
    }

    #[test]
    fn test_accept_delay_leftover_counts_toward_arrival() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        session.accept().unwrap();

        session.advance(Duration::from_secs(2));
        assert_eq!(session.step(), OrderStep::GoingToStore);
        assert_eq!(session.arrival_remaining(), Duration::from_millis(659_500));
    }

    #[test]
    fn test_clock_moves_only_with_advance() {
        let mut session = DriverSession::starting_at(Timings::default(), now());
        assert_eq!(session.clock(), now());

        session.advance(Duration::from_millis(1500));
        session.advance(Duration::from_secs(60));
        assert_eq!(
            session.clock(),
            "2024-05-01T12:01:01.500Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_manual_reject_counts_and_clears() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        session.reject().unwrap();

        assert_eq!(session.step(), OrderStep::Idle);
        assert_eq!(session.stats().rejected, 1);
        assert_eq!(session.stats().timed_out, 0);
        assert!(session.order().is_none());
    }

    #[test]
    fn test_app_order_completes_and_returns_to_idle() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        drive_to_customer(&mut session);

        let events = session.complete_delivery(now()).unwrap();
        assert_eq!(session.step(), OrderStep::Completed);
        let tx = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::Completed { transaction } => Some(transaction.clone()),
                _ => None,
            })
            .unwrap();
        assert!((tx.amount - 6.90).abs() < 1e-9);
        assert_eq!(tx.is_app_payment, Some(true));
        assert_eq!(session.stats().accepted, 1);

        session.advance(Duration::from_secs(3));
        assert_eq!(session.step(), OrderStep::Completed);
        let events = session.advance(Duration::from_secs(1));
        assert!(events.contains(&SessionEvent::Cleared));
        assert_eq!(session.step(), OrderStep::Idle);
        assert!(session.order().is_none());
    }

    #[test]
    fn test_machine_order_pays_bonus_after_return() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::MachineDebit)).unwrap();
        drive_to_customer(&mut session);

        let events = session.complete_delivery(now()).unwrap();
        assert_eq!(session.step(), OrderStep::ReturningMachine);
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::Completed { .. })));

        let events = session.confirm_machine_return(now()).unwrap();
        assert_eq!(session.step(), OrderStep::Completed);
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Completed { transaction } if (transaction.amount - 8.90).abs() < 1e-9
        )));
        assert!((session.stats().earnings - 8.90).abs() < 1e-9);
    }

    #[test]
    fn test_going_offline_cancels_trip() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        session.accept().unwrap();

        let events = session.go_offline();
        assert!(events.contains(&SessionEvent::Cleared));
        assert_eq!(session.step(), OrderStep::Idle);
        assert!(!session.is_accepting());
        assert!(session.advance(Duration::from_secs(5)).is_empty());
        assert_eq!(session.step(), OrderStep::Idle);
    }

    #[test]
    fn test_second_offer_is_refused_while_offering() {
        let mut session = online_session();
        session.receive_offer(order(PaymentMethod::App)).unwrap();
        assert!(session.receive_offer(order(PaymentMethod::Cash)).is_err());
        assert_eq!(session.order().unwrap().payment_method, PaymentMethod::App);
    }
}
