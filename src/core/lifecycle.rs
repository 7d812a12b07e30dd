use crate::utils::error::{CourierError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the driver is in the current delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    Idle,
    Offering,
    GoingToStore,
    AtStore,
    Delivering,
    AtCustomer,
    ReturningMachine,
    Completed,
}

impl OrderStep {
    /// Steps where the driver is carrying out an accepted order.
    pub fn is_on_trip(self) -> bool {
        matches!(
            self,
            Self::GoingToStore
                | Self::AtStore
                | Self::Delivering
                | Self::AtCustomer
                | Self::ReturningMachine
        )
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Offering => "offering",
            Self::GoingToStore => "going_to_store",
            Self::AtStore => "at_store",
            Self::Delivering => "delivering",
            Self::AtCustomer => "at_customer",
            Self::ReturningMachine => "returning_machine",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverEvent {
    OrderOffered,
    Accept,
    Reject,
    OfferTimeout,
    ArriveAtStore,
    CollectOrder,
    ArriveAtCustomer,
    CompleteDelivery,
    ConfirmMachineReturn,
    DisplayElapsed,
    GoOffline,
}

impl fmt::Display for DriverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OrderOffered => "receive an order",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::OfferTimeout => "time out the offer",
            Self::ArriveAtStore => "arrive at the store",
            Self::CollectOrder => "collect the order",
            Self::ArriveAtCustomer => "arrive at the customer",
            Self::CompleteDelivery => "complete the delivery",
            Self::ConfirmMachineReturn => "confirm the card machine return",
            Self::DisplayElapsed => "close the summary",
            Self::GoOffline => "go offline",
        };
        f.write_str(name)
    }
}

/// Pure transition function. `needs_machine` decides whether a completed
/// hand-off detours through `ReturningMachine`.
pub fn transition(step: OrderStep, event: DriverEvent, needs_machine: bool) -> Result<OrderStep> {
    use DriverEvent as E;
    use OrderStep as S;

    let next = match (step, event) {
        (_, E::GoOffline) => S::Idle,
        (S::Idle, E::OrderOffered) => S::Offering,
        (S::Offering, E::Accept) => S::GoingToStore,
        (S::Offering, E::Reject | E::OfferTimeout) => S::Idle,
        (S::GoingToStore, E::ArriveAtStore) => S::AtStore,
        (S::AtStore, E::CollectOrder) => S::Delivering,
        (S::Delivering, E::ArriveAtCustomer) => S::AtCustomer,
        (S::AtCustomer, E::CompleteDelivery) if needs_machine => S::ReturningMachine,
        (S::AtCustomer, E::CompleteDelivery) => S::Completed,
        (S::ReturningMachine, E::ConfirmMachineReturn) => S::Completed,
        (S::Completed, E::DisplayElapsed) => S::Idle,
        (from, event) => {
            return Err(CourierError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STEPS: [OrderStep; 8] = [
        OrderStep::Idle,
        OrderStep::Offering,
        OrderStep::GoingToStore,
        OrderStep::AtStore,
        OrderStep::Delivering,
        OrderStep::AtCustomer,
        OrderStep::ReturningMachine,
        OrderStep::Completed,
    ];

    const ALL_EVENTS: [DriverEvent; 11] = [
        DriverEvent::OrderOffered,
        DriverEvent::Accept,
        DriverEvent::Reject,
        DriverEvent::OfferTimeout,
        DriverEvent::ArriveAtStore,
        DriverEvent::CollectOrder,
        DriverEvent::ArriveAtCustomer,
        DriverEvent::CompleteDelivery,
        DriverEvent::ConfirmMachineReturn,
        DriverEvent::DisplayElapsed,
        DriverEvent::GoOffline,
    ];

    fn run(events: &[DriverEvent], needs_machine: bool) -> Vec<OrderStep> {
        let mut step = OrderStep::Idle;
        let mut visited = vec![step];
        for event in events {
            step = transition(step, *event, needs_machine).unwrap();
            visited.push(step);
        }
        visited
    }

    #[test]
    fn test_app_payment_skips_machine_return() {
        let visited = run(
            &[
                DriverEvent::OrderOffered,
                DriverEvent::Accept,
                DriverEvent::ArriveAtStore,
                DriverEvent::CollectOrder,
                DriverEvent::ArriveAtCustomer,
                DriverEvent::CompleteDelivery,
                DriverEvent::DisplayElapsed,
            ],
            false,
        );

        assert_eq!(
            visited,
            vec![
                OrderStep::Idle,
                OrderStep::Offering,
                OrderStep::GoingToStore,
                OrderStep::AtStore,
                OrderStep::Delivering,
                OrderStep::AtCustomer,
                OrderStep::Completed,
                OrderStep::Idle,
            ]
        );
    }

    #[test]
    fn test_machine_payment_returns_machine_before_completion() {
        let visited = run(
            &[
                DriverEvent::OrderOffered,
                DriverEvent::Accept,
                DriverEvent::ArriveAtStore,
                DriverEvent::CollectOrder,
                DriverEvent::ArriveAtCustomer,
                DriverEvent::CompleteDelivery,
                DriverEvent::ConfirmMachineReturn,
            ],
            true,
        );

        assert_eq!(visited[6], OrderStep::ReturningMachine);
        assert_eq!(visited[7], OrderStep::Completed);
    }

    #[test]
    fn test_returning_machine_reachable_only_with_machine() {
        for step in ALL_STEPS {
            for event in ALL_EVENTS {
                if let Ok(next) = transition(step, event, false) {
                    assert_ne!(next, OrderStep::ReturningMachine, "{step} + {event:?}");
                }
            }
        }
        assert_eq!(
            transition(OrderStep::AtCustomer, DriverEvent::CompleteDelivery, true).unwrap(),
            OrderStep::ReturningMachine
        );
    }

    #[test]
    fn test_offer_resolutions() {
        assert_eq!(
            transition(OrderStep::Offering, DriverEvent::Reject, false).unwrap(),
            OrderStep::Idle
        );
        assert_eq!(
            transition(OrderStep::Offering, DriverEvent::OfferTimeout, false).unwrap(),
            OrderStep::Idle
        );
        assert_eq!(
            transition(OrderStep::Offering, DriverEvent::Accept, false).unwrap(),
            OrderStep::GoingToStore
        );
    }

    #[test]
    fn test_going_offline_always_returns_to_idle() {
        for step in ALL_STEPS {
            assert_eq!(
                transition(step, DriverEvent::GoOffline, true).unwrap(),
                OrderStep::Idle
            );
        }
    }

    #[test]
    fn test_out_of_order_events_are_rejected() {
        let err = transition(OrderStep::Idle, DriverEvent::Accept, false).unwrap_err();
        assert!(matches!(err, CourierError::InvalidTransition { .. }));

        assert!(transition(OrderStep::GoingToStore, DriverEvent::CollectOrder, false).is_err());
        assert!(transition(OrderStep::AtCustomer, DriverEvent::ConfirmMachineReturn, true).is_err());
        assert!(transition(OrderStep::Offering, DriverEvent::OrderOffered, false).is_err());
    }
}
