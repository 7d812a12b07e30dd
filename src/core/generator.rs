use crate::core::fare::FareSchedule;
use crate::domain::model::{
    Order, OrderItem, OrderOrigin, PaymentMethod, RouteType, SubOrder,
};
use crate::utils::error::Result;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct StoreInfo {
    pub name: &'static str,
    pub address: &'static str,
}

pub const STORES: [StoreInfo; 5] = [
    StoreInfo {
        name: "Burger King",
        address: "Av. Paulista, 1230",
    },
    StoreInfo {
        name: "Sushi House",
        address: "Rua Augusta, 500",
    },
    StoreInfo {
        name: "McDonalds",
        address: "Shopping Center 3",
    },
    StoreInfo {
        name: "Pizza Hut",
        address: "Al. Santos, 800",
    },
    StoreInfo {
        name: "Açaí do Jota",
        address: "Rua da Consolação, 100",
    },
];

const CUSTOMERS: [(&str, &str); 4] = [
    ("Juliana Martins", "Rua Augusta, 1500"),
    ("Roberto Carlos", "Al. Santos, 800"),
    ("Ana Pereira", "Rua Frei Caneca, 300"),
    ("Marcos Souza", "Rua da Consolação, 900"),
];

const MIN_LEG_KM: f64 = 1.5;
const LEG_SPREAD_KM: f64 = 3.0;
const MACHINE_CHANCE: f64 = 0.3;

/// 取貨碼：四位數 1000-9999
pub fn pickup_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(1000..=9999).to_string()
}

/// 70% single, 20% double, 10% triple
pub fn random_route<R: Rng + ?Sized>(rng: &mut R) -> RouteType {
    let roll: f64 = rng.gen();
    if roll > 0.9 {
        RouteType::Triple
    } else if roll > 0.7 {
        RouteType::Double
    } else {
        RouteType::Single
    }
}

/// Builds the random orders that keep an online driver busy when no store
/// has posted one.
pub struct OrderGenerator<R: Rng> {
    rng: R,
    schedule: FareSchedule,
}

impl<R: Rng> OrderGenerator<R> {
    pub fn new(rng: R, schedule: FareSchedule) -> Self {
        Self { rng, schedule }
    }

    pub fn generate(&mut self) -> Result<Order> {
        let route_type = random_route(&mut self.rng);
        let legs = route_type.delivery_count();

        let store = STORES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(STORES[0]);

        let mut customers = CUSTOMERS.to_vec();
        customers.shuffle(&mut self.rng);

        let mut distance_km = 0.0;
        let mut sub_orders = Vec::with_capacity(legs);
        for (name, address) in customers.iter().take(legs) {
            distance_km += MIN_LEG_KM + self.rng.gen::<f64>() * LEG_SPREAD_KM;
            sub_orders.push(SubOrder {
                id: format!("#{}", self.rng.gen_range(1000..=9999)),
                customer_name: name.to_string(),
                customer_address: address.to_string(),
                items: vec![OrderItem {
                    quantity: 1,
                    name: "Standard combo".to_string(),
                }],
            });
        }

        let payment_method = if self.rng.gen_bool(MACHINE_CHANCE) {
            PaymentMethod::MachineCredit
        } else {
            PaymentMethod::App
        };
        let fare = self.schedule.quote(distance_km, route_type, payment_method)?;
        let estimated_minutes = (distance_km * 2.5 + 5.0 + 3.0 * legs as f64).round() as u32;

        let restaurant = if route_type.is_grouped() {
            format!("{} ({} orders)", store.name, legs)
        } else {
            store.name.to_string()
        };
        let customer_name = if route_type.is_grouped() {
            format!("{} customers", legs)
        } else {
            sub_orders[0].customer_name.clone()
        };

        Ok(Order {
            id: sub_orders[0].id.clone(),
            origin: OrderOrigin::Generated,
            restaurant,
            restaurant_address: store.address.to_string(),
            customer_name,
            customer_address: sub_orders[0].customer_address.clone(),
            distance_km,
            route_type,
            payment_method,
            sub_orders,
            fare,
            pickup_code: pickup_code(&mut self.rng),
            estimated_minutes,
        })
    }
}
