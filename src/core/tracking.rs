use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Store-side view of a dispatched order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Searching,
    GoingToStore,
    AtStore,
    Delivering,
    Completed,
}

impl TrackingStatus {
    fn next(self) -> Self {
        match self {
            Self::Searching => Self::GoingToStore,
            Self::GoingToStore => Self::AtStore,
            Self::AtStore => Self::Delivering,
            Self::Delivering | Self::Completed => Self::Completed,
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Searching => "searching for a driver",
            Self::GoingToStore => "driver heading to store",
            Self::AtStore => "driver at store",
            Self::Delivering => "out for delivery",
            Self::Completed => "delivered",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct StoreTracker {
    status: TrackingStatus,
    remaining: Duration,
    search_delay: Duration,
    step_interval: Duration,
}

impl StoreTracker {
    pub const SEARCH_DELAY: Duration = Duration::from_secs(4);
    pub const STEP_INTERVAL: Duration = Duration::from_secs(15);

    pub fn new() -> Self {
        Self::with_intervals(Self::SEARCH_DELAY, Self::STEP_INTERVAL)
    }

    pub fn with_intervals(search_delay: Duration, step_interval: Duration) -> Self {
        Self {
            status: TrackingStatus::Searching,
            remaining: search_delay,
            search_delay,
            step_interval,
        }
    }

    pub fn status(&self) -> TrackingStatus {
        self.status
    }

    pub fn search_delay(&self) -> Duration {
        self.search_delay
    }

    /// Moves forward, carrying leftover time into the following steps.
    /// Returns every status entered on the way.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TrackingStatus> {
        let mut entered = Vec::new();
        let mut budget = elapsed;

        while self.status != TrackingStatus::Completed && budget >= self.remaining {
            budget -= self.remaining;
            self.status = self.status.next();
            self.remaining = self.step_interval;
            entered.push(self.status);
        }

        if self.status != TrackingStatus::Completed {
            self.remaining -= budget;
        }
        entered
    }
}

impl Default for StoreTracker {
    fn default() -> Self {
        Self::new()
    }
}
