use crate::domain::model::{FareBreakdown, PaymentMethod, RouteType};
use crate::utils::error::{CourierError, Result};
use crate::utils::validation::{validate_distance, validate_non_negative, validate_positive, Validate};
use serde::{Deserialize, Serialize};

/// Pricing constants. Defaults match the platform's global settings and can be
/// overridden from the `[fares]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FareSchedule {
    pub single_min_fee: f64,
    pub double_min_fee: f64,
    pub triple_min_fee: f64,
    pub rate_per_km: f64,
    pub long_distance_threshold_km: f64,
    pub long_distance_rate: f64,
    pub machine_bonus: f64,
    pub profit_base: f64,
    pub profit_step_km: f64,
    pub triple_app_bonus: f64,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            single_min_fee: 6.90,
            double_min_fee: 10.50,
            triple_min_fee: 14.50,
            rate_per_km: 1.30,
            long_distance_threshold_km: 8.0,
            long_distance_rate: 0.25,
            machine_bonus: 2.00,
            profit_base: 1.36,
            profit_step_km: 4.0,
            triple_app_bonus: 1.00,
        }
    }
}

impl FareSchedule {
    pub fn min_fee(&self, route: RouteType) -> f64 {
        match route {
            RouteType::Single => self.single_min_fee,
            RouteType::Double => self.double_min_fee,
            RouteType::Triple => self.triple_min_fee,
        }
    }

    /// 超過門檻的每公里額外補貼
    pub fn long_distance_bonus(&self, distance_km: f64) -> f64 {
        if distance_km > self.long_distance_threshold_km {
            (distance_km - self.long_distance_threshold_km) * self.long_distance_rate
        } else {
            0.0
        }
    }

    pub fn distance_cost(&self, distance_km: f64) -> f64 {
        distance_km * self.rate_per_km + self.long_distance_bonus(distance_km)
    }

    pub fn driver_base_fee(&self, distance_km: f64, route: RouteType) -> f64 {
        self.min_fee(route).max(self.distance_cost(distance_km))
    }

    pub fn machine_bonus_for(&self, payment: PaymentMethod) -> f64 {
        if payment.requires_machine() {
            self.machine_bonus
        } else {
            0.0
        }
    }

    /// 平台利潤每 `profit_step_km` 公里一級，至少一級
    pub fn app_fee(&self, distance_km: f64, route: RouteType) -> f64 {
        let steps = (distance_km / self.profit_step_km).ceil().max(1.0);
        let mut fee = self.profit_base * steps;
        if route == RouteType::Triple {
            fee += self.triple_app_bonus;
        }
        fee
    }

    pub fn quote(
        &self,
        distance_km: f64,
        route: RouteType,
        payment: PaymentMethod,
    ) -> Result<FareBreakdown> {
        validate_distance(distance_km)?;

        let applied_min_fee = self.min_fee(route);
        let long_distance_bonus = self.long_distance_bonus(distance_km);
        let distance_cost = self.distance_cost(distance_km);
        let driver_base_fee = applied_min_fee.max(distance_cost);
        let machine_bonus = self.machine_bonus_for(payment);
        let driver_total = driver_base_fee + machine_bonus;
        let app_fee = self.app_fee(distance_km, route);

        Ok(FareBreakdown {
            distance_km,
            applied_min_fee,
            distance_cost,
            long_distance_bonus,
            driver_base_fee,
            machine_bonus,
            driver_total,
            app_fee,
            total: driver_total + app_fee,
        })
    }
}

impl Validate for FareSchedule {
    fn validate(&self) -> Result<()> {
        validate_non_negative("fares.single_min_fee", self.single_min_fee)?;
        validate_non_negative("fares.double_min_fee", self.double_min_fee)?;
        validate_non_negative("fares.triple_min_fee", self.triple_min_fee)?;
        validate_non_negative("fares.rate_per_km", self.rate_per_km)?;
        validate_non_negative("fares.long_distance_threshold_km", self.long_distance_threshold_km)?;
        validate_non_negative("fares.long_distance_rate", self.long_distance_rate)?;
        validate_non_negative("fares.machine_bonus", self.machine_bonus)?;
        validate_non_negative("fares.profit_base", self.profit_base)?;
        validate_positive("fares.profit_step_km", self.profit_step_km)?;
        validate_non_negative("fares.triple_app_bonus", self.triple_app_bonus)?;

        if self.single_min_fee > self.double_min_fee || self.double_min_fee > self.triple_min_fee {
            return Err(CourierError::ConfigValidationError {
                field: "fares".to_string(),
                message: "minimum fees must not decrease from single to double to triple"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Quote with the default schedule.
pub fn quote(distance_km: f64, route: RouteType, payment: PaymentMethod) -> Result<FareBreakdown> {
    FareSchedule::default().quote(distance_km, route, payment)
}
