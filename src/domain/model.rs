use crate::utils::error::{CourierError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grouping of 1-3 deliveries into one trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Single,
    Double,
    Triple,
}

impl RouteType {
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            _ => None,
        }
    }

    pub fn delivery_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }

    pub fn is_grouped(self) -> bool {
        self != Self::Single
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Triple => "triple",
        };
        f.write_str(name)
    }
}

impl FromStr for RouteType {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "1" => Ok(Self::Single),
            "double" | "2" => Ok(Self::Double),
            "triple" | "3" => Ok(Self::Triple),
            other => Err(CourierError::validation(format!(
                "unknown route type '{}' (expected single, double or triple)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    App,
    Cash,
    MachineDebit,
    MachineCredit,
}

impl PaymentMethod {
    /// 需要外送員攜帶刷卡機
    pub fn requires_machine(self) -> bool {
        matches!(self, Self::MachineDebit | Self::MachineCredit)
    }

    pub fn is_app_payment(self) -> bool {
        self == Self::App
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::App => "Paid in app",
            Self::Cash => "Cash",
            Self::MachineDebit => "Card machine (debit)",
            Self::MachineCredit => "Card machine (credit)",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::App => "app",
            Self::Cash => "cash",
            Self::MachineDebit => "machine_debit",
            Self::MachineCredit => "machine_credit",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentMethod {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "app" => Ok(Self::App),
            "cash" | "money" => Ok(Self::Cash),
            "machine_debit" | "debit" => Ok(Self::MachineDebit),
            "machine_credit" | "credit" => Ok(Self::MachineCredit),
            other => Err(CourierError::validation(format!(
                "unknown payment method '{}' (expected app, cash, machine-debit or machine-credit)",
                other
            ))),
        }
    }
}

/// Derived prices for one trip. Produced by [`crate::core::fare::FareSchedule::quote`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub distance_km: f64,
    pub applied_min_fee: f64,
    pub distance_cost: f64,
    pub long_distance_bonus: f64,
    pub driver_base_fee: f64,
    pub machine_bonus: f64,
    pub driver_total: f64,
    pub app_fee: f64,
    pub total: f64,
}

impl FareBreakdown {
    pub fn earnings_per_km(&self) -> f64 {
        if self.distance_km > 0.0 {
            self.driver_base_fee / self.distance_km
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubOrder {
    pub id: String,
    pub customer_name: String,
    pub customer_address: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub quantity: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOrigin {
    Store,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub origin: OrderOrigin,
    pub restaurant: String,
    pub restaurant_address: String,
    pub customer_name: String,
    pub customer_address: String,
    pub distance_km: f64,
    pub route_type: RouteType,
    pub payment_method: PaymentMethod,
    pub sub_orders: Vec<SubOrder>,
    pub fare: FareBreakdown,
    pub pickup_code: String,
    pub estimated_minutes: u32,
}

impl Order {
    pub fn needs_machine(&self) -> bool {
        self.payment_method.requires_machine()
    }

    /// 不含刷卡機補貼的司機收入；補貼在歸還刷卡機後才入帳
    pub fn driver_fee(&self) -> f64 {
        self.fare.driver_base_fee
    }

    pub fn distance_label(&self) -> String {
        format!("{:.1} km", self.distance_km)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Delivery,
    Tip,
    Bonus,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Processing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub restaurant: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_app_payment: Option<bool>,
}

impl Transaction {
    pub fn delivery(order: &Order, amount: f64, date: DateTime<Utc>) -> Self {
        Self {
            id: format!(
                "{}-{}",
                date.timestamp_millis(),
                order.id.trim_start_matches('#')
            ),
            restaurant: order.restaurant.clone(),
            amount,
            date,
            kind: TransactionKind::Delivery,
            status: TransactionStatus::Completed,
            distance: Some(order.distance_label()),
            is_app_payment: Some(order.payment_method.is_app_payment()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverLevel {
    Bronze,
    Gold,
    Diamond,
}

impl fmt::Display for DriverLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bronze => "Bronze",
            Self::Gold => "Gold",
            Self::Diamond => "Diamond",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NextLevel {
    pub name: &'static str,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub score: u32,
    pub acceptance_rate: f64,
    pub cancellation_rate: f64,
    pub on_time_rate: f64,
    pub customer_rating: f64,
    pub total_deliveries: u32,
    pub level: DriverLevel,
}

impl DriverStats {
    pub fn next_level(&self) -> NextLevel {
        match self.level {
            DriverLevel::Bronze => NextLevel {
                name: "Gold",
                points: 500,
            },
            DriverLevel::Gold => NextLevel {
                name: "Diamond",
                points: 1000,
            },
            DriverLevel::Diamond => NextLevel {
                name: "Legend",
                points: 1500,
            },
        }
    }

    pub fn progress_percent(&self) -> f64 {
        let target = self.next_level().points as f64;
        (self.score as f64 / target * 100.0).min(100.0)
    }
}

impl Default for DriverStats {
    fn default() -> Self {
        Self {
            score: 850,
            acceptance_rate: 92.0,
            cancellation_rate: 1.5,
            on_time_rate: 98.0,
            customer_rating: 4.92,
            total_deliveries: 1243,
            level: DriverLevel::Gold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: String,
    pub requester: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub status: String,
    pub kind: String,
}

impl SupportTicket {
    pub fn open(requester: &str, message: &str, kind: &str, date: DateTime<Utc>) -> Self {
        Self {
            id: date.timestamp_millis().to_string(),
            requester: requester.to_string(),
            message: message.to_string(),
            date,
            status: "open".to_string(),
            kind: kind.to_string(),
        }
    }
}

/// `R$ 9,62`
pub fn format_money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}R$ {:.2}", sign, amount.abs()).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_type_parsing() {
        assert_eq!("single".parse::<RouteType>().unwrap(), RouteType::Single);
        assert_eq!("Triple".parse::<RouteType>().unwrap(), RouteType::Triple);
        assert_eq!("2".parse::<RouteType>().unwrap(), RouteType::Double);
        assert!("quad".parse::<RouteType>().is_err());
        assert_eq!(RouteType::from_count(4), None);
        assert_eq!(RouteType::Triple.delivery_count(), 3);
    }

    #[test]
    fn test_payment_method_machine_flag() {
        assert!(!PaymentMethod::App.requires_machine());
        assert!(!PaymentMethod::Cash.requires_machine());
        assert!(PaymentMethod::MachineDebit.requires_machine());
        assert!(PaymentMethod::MachineCredit.requires_machine());
        assert_eq!(
            "machine-credit".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::MachineCredit
        );
        assert_eq!("money".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(9.62), "R$ 9,62");
        assert_eq!(format_money(21.58), "R$ 21,58");
        assert_eq!(format_money(-150.0), "-R$ 150,00");
    }

    #[test]
    fn test_driver_level_progress() {
        let stats = DriverStats::default();
        assert_eq!(stats.next_level().name, "Diamond");
        assert!((stats.progress_percent() - 85.0).abs() < 1e-9);

        let bronze = DriverStats {
            score: 900,
            level: DriverLevel::Bronze,
            ..DriverStats::default()
        };
        assert_eq!(bronze.progress_percent(), 100.0);
    }

    #[test]
    fn test_transaction_serializes_kind_as_type() {
        let tx = Transaction {
            id: "t1".to_string(),
            restaurant: "Burger King".to_string(),
            amount: 6.90,
            date: "2023-10-26T14:30:00Z".parse().unwrap(),
            kind: TransactionKind::Delivery,
            status: TransactionStatus::Completed,
            distance: Some("3.2 km".to_string()),
            is_app_payment: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "delivery");
        assert_eq!(json["status"], "completed");
        assert!(json.get("is_app_payment").is_none());
    }
}
