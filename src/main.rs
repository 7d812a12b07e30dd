use chrono::Utc;
use clap::Parser;
use courier_sim::app::{DriverLoop, OfferPolicy};
use courier_sim::config::{Command, PolicyArg};
use courier_sim::core::advice::GenerativeAdvisor;
use courier_sim::core::dispatch::{build_store_order, DeliveryInput, DispatchRequest};
use courier_sim::core::tracking::{StoreTracker, TrackingStatus};
use courier_sim::core::wallet::WalletSummary;
use courier_sim::core::{AdviceProvider, ConfigProvider, PaymentMethod, RouteType, Storage};
use courier_sim::domain::model::{format_money, DriverStats, FareBreakdown, SupportTicket};
use courier_sim::utils::error::{CourierError, ErrorSeverity};
use courier_sim::utils::{logger, validation::Validate};
use courier_sim::{CliConfig, LocalStorage, OrderBoard, Result, TomlConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    match &cli.command {
        Command::Drive { json_logs: true, .. } => logger::init_json_logger(),
        _ => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("Starting courier-sim CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let mut config = TomlConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    let storage = LocalStorage::new(config.data_dir().to_string());

    match cli.command {
        Command::Quote {
            distance,
            route,
            payment,
            json,
        } => {
            let route: RouteType = route.parse()?;
            let payment: PaymentMethod = payment.parse()?;
            let fare = config.fare_schedule().quote(distance, route, payment)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fare)?);
            } else {
                print_fare(&fare, route, payment);
            }
        }
        Command::Dispatch {
            distance,
            route,
            payment,
            deliveries,
            track,
        } => {
            let request = DispatchRequest {
                store_name: config.store.name.clone(),
                store_address: config.store.address.clone(),
                deliveries: deliveries
                    .iter()
                    .map(String::as_str)
                    .map(parse_delivery)
                    .collect::<Result<Vec<_>>>()?,
                distance_km: distance,
                route_type: route.parse()?,
                payment_method: payment.parse()?,
            };
            let order = build_store_order(
                &request,
                config.fare_schedule(),
                &mut StdRng::from_entropy(),
                Utc::now(),
            )?;

            let board = OrderBoard::new(storage);
            board.post(&order).await?;
            println!(
                "📮 Order {} posted: {} to the driver, pickup code {}",
                order.id,
                format_money(order.driver_fee()),
                order.pickup_code
            );

            if track {
                track_order().await;
            }
        }
        Command::Drive {
            orders,
            policy,
            min_per_km,
            seed,
            json_logs: _,
        } => {
            let policy = match policy {
                PolicyArg::AcceptAll => OfferPolicy::AcceptAll,
                PolicyArg::RejectAll => OfferPolicy::RejectAll,
                PolicyArg::Ignore => OfferPolicy::Ignore,
                PolicyArg::MinPerKm => OfferPolicy::MinEarningsPerKm(min_per_km),
            };
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let summary = DriverLoop::new(
                storage,
                rng,
                config.fare_schedule().clone(),
                config.timings(),
            )
            .with_policy(policy)
            .with_max_orders(orders)
            .run()
            .await?;

            println!("✅ Shift finished");
            println!("   Offers:    {}", summary.offers);
            println!("   Accepted:  {}", summary.stats.accepted);
            println!(
                "   Rejected:  {} ({} timed out)",
                summary.stats.rejected, summary.stats.timed_out
            );
            println!("   Earnings:  {}", format_money(summary.stats.earnings));
        }
        Command::Wallet { export } => {
            let board = OrderBoard::new(storage);
            let summary = WalletSummary::build(board.transactions().await?, Utc::now().date_naive());

            println!("💰 Period total: {}", format_money(summary.period_total));
            println!("   Today:        {}", format_money(summary.today_total));
            println!("   Next payout:  {}", summary.next_payout.format("%d/%m/%Y"));
            for day in summary.by_day() {
                println!("\n{}  {}", day.day.format("%d/%m"), format_money(day.total));
                for tx in &day.transactions {
                    println!(
                        "   {}  {:<28} {:>12}  {}",
                        tx.date.format("%H:%M"),
                        tx.restaurant,
                        format_money(tx.amount),
                        tx.distance.as_deref().unwrap_or("")
                    );
                }
            }

            if export {
                let key = summary.export_statement(board.storage()).await?;
                println!(
                    "\n📁 Statement saved to: {}",
                    board.storage().full_path(&key).display()
                );
            }
        }
        Command::Advice { speak } => {
            let advisor = GenerativeAdvisor::new(config.advice.clone());
            let stats = DriverStats::default();
            let next = stats.next_level();
            println!(
                "🏅 {} · {} pts ({:.0}% to {} at {})",
                stats.level,
                stats.score,
                stats.progress_percent(),
                next.name,
                next.points
            );
            let advice = advisor.driver_advice(&stats).await;
            println!("{}", advice);

            if let Some(key) = speak {
                match advisor.generate_speech(&advice).await {
                    Some(wav) => {
                        storage.write_file(&key, &wav).await?;
                        println!("🔊 Voice tip saved to: {}", storage.full_path(&key).display());
                    }
                    None => println!("🔇 Voice tip unavailable"),
                }
            }
        }
        Command::Places { query, lat, lng } => {
            let advisor = GenerativeAdvisor::new(config.advice.clone());
            let places = advisor.nearby_places(&query, lat, lng).await;
            println!("{}", places.text);
            for link in places.links {
                println!("   🔗 {} {}", link.title, link.uri);
            }
        }
        Command::Ticket {
            requester,
            message,
            kind,
        } => {
            if message.trim().is_empty() {
                return Err(CourierError::validation("ticket message is empty"));
            }
            let ticket = SupportTicket::open(&requester, &message, &kind, Utc::now());
            let board = OrderBoard::new(storage);
            board.open_ticket(&ticket).await?;
            println!("🎫 Ticket {} opened for {}", ticket.id, ticket.requester);
        }
    }

    Ok(())
}

fn print_fare(fare: &FareBreakdown, route: RouteType, payment: PaymentMethod) {
    println!("🧾 {} km · {} · {}", fare.distance_km, route, payment.label());
    println!("   Minimum fee:         {}", format_money(fare.applied_min_fee));
    println!("   Distance cost:       {}", format_money(fare.distance_cost));
    if fare.long_distance_bonus > 0.0 {
        println!("   Long distance bonus: {}", format_money(fare.long_distance_bonus));
    }
    println!("   Driver fee:          {}", format_money(fare.driver_base_fee));
    if fare.machine_bonus > 0.0 {
        println!("   Machine bonus:       {}", format_money(fare.machine_bonus));
    }
    println!("   App fee:             {}", format_money(fare.app_fee));
    println!("   Total:               {}", format_money(fare.total));
}

/// "Name|Address"; a bare value is taken as the address.
fn parse_delivery(raw: &str) -> Result<DeliveryInput> {
    let (name, address) = match raw.split_once('|') {
        Some((name, address)) => (name.trim(), address.trim()),
        None => ("", raw.trim()),
    };
    if address.is_empty() {
        return Err(CourierError::validation(format!(
            "delivery '{}' has no address",
            raw
        )));
    }
    Ok(DeliveryInput {
        name: name.to_string(),
        address: address.to_string(),
    })
}

async fn track_order() {
    let mut tracker = StoreTracker::new();
    let tick = Duration::from_secs(1);
    println!("🔎 {}", tracker.status());
    while tracker.status() != TrackingStatus::Completed {
        tokio::time::sleep(tick).await;
        for status in tracker.advance(tick) {
            println!("🛵 {}", status);
        }
    }
}
