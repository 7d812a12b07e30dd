use crate::core::fare::FareSchedule;
use crate::core::generator::pickup_code;
use crate::domain::model::{Order, OrderItem, OrderOrigin, PaymentMethod, RouteType, SubOrder};
use crate::utils::error::{CourierError, Result};
use crate::utils::validation::validate_distance;
use chrono::{DateTime, Utc};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryInput {
    pub name: String,
    pub address: String,
}

/// What a store fills in to request a driver.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub store_name: String,
    pub store_address: String,
    pub deliveries: Vec<DeliveryInput>,
    pub distance_km: f64,
    pub route_type: RouteType,
    pub payment_method: PaymentMethod,
}

impl DispatchRequest {
    pub fn validate(&self) -> Result<()> {
        validate_distance(self.distance_km)?;
        if self.distance_km == 0.0 {
            return Err(CourierError::validation("distance must be greater than 0 km"));
        }

        let expected = self.route_type.delivery_count();
        if self.deliveries.len() != expected {
            return Err(CourierError::validation(format!(
                "a {} route needs {} deliveries, got {}",
                self.route_type,
                expected,
                self.deliveries.len()
            )));
        }

        if let Some(index) = self
            .deliveries
            .iter()
            .position(|d| d.address.trim().is_empty())
        {
            return Err(CourierError::validation(format!(
                "delivery {} has no address",
                index + 1
            )));
        }

        Ok(())
    }
}

/// Turns a store request into the order payload posted to the board.
pub fn build_store_order<R: Rng + ?Sized>(
    request: &DispatchRequest,
    schedule: &FareSchedule,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Order> {
    request.validate()?;

    let fare = schedule.quote(request.distance_km, request.route_type, request.payment_method)?;
    let stamp = now.timestamp_millis();
    let count = request.route_type.delivery_count();

    let sub_orders: Vec<SubOrder> = request
        .deliveries
        .iter()
        .enumerate()
        .map(|(i, d)| SubOrder {
            id: format!("#{}-{}", stamp, i),
            customer_name: if d.name.trim().is_empty() {
                format!("Customer {}", i + 1)
            } else {
                d.name.trim().to_string()
            },
            customer_address: d.address.trim().to_string(),
            items: vec![OrderItem {
                quantity: 1,
                name: "Store order".to_string(),
            }],
        })
        .collect();

    let (customer_name, customer_address) = if count == 1 {
        let name = request.deliveries[0].name.trim();
        (
            if name.is_empty() {
                "Store customer".to_string()
            } else {
                name.to_string()
            },
            sub_orders[0].customer_address.clone(),
        )
    } else {
        let first_names: Vec<&str> = request
            .deliveries
            .iter()
            .map(|d| d.name.split_whitespace().next().unwrap_or("Customer"))
            .collect();
        (
            format!("{} customers ({})", count, first_names.join(", ")),
            format!("Route with {} stops", count),
        )
    };

    Ok(Order {
        id: stamp.to_string(),
        origin: OrderOrigin::Store,
        restaurant: request.store_name.clone(),
        restaurant_address: request.store_address.clone(),
        customer_name,
        customer_address,
        distance_km: request.distance_km,
        route_type: request.route_type,
        payment_method: request.payment_method,
        sub_orders,
        fare,
        pickup_code: pickup_code(rng),
        estimated_minutes: (request.distance_km * 3.0 + 10.0).round() as u32,
    })
}
