pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "courier-sim")]
#[command(about = "Delivery fare calculator and driver/store order simulator")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override storage.data_dir from the config file
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Price a trip
    Quote {
        #[arg(long)]
        distance: f64,
        #[arg(long, default_value = "single")]
        route: String,
        #[arg(long, default_value = "app")]
        payment: String,
        /// Print the breakdown as JSON
        #[arg(long)]
        json: bool,
    },
    /// Post a store order to the board for a driver to pick up
    Dispatch {
        #[arg(long)]
        distance: f64,
        #[arg(long, default_value = "single")]
        route: String,
        #[arg(long, default_value = "app")]
        payment: String,
        /// "Name|Address", once per delivery
        #[arg(long = "delivery", required = true)]
        deliveries: Vec<String>,
        /// Follow the order status after posting
        #[arg(long)]
        track: bool,
    },
    /// Go online and work through a number of orders
    Drive {
        #[arg(long, default_value = "3")]
        orders: u32,
        #[arg(long, value_enum, default_value = "accept-all")]
        policy: PolicyArg,
        /// Threshold for --policy min-per-km
        #[arg(long, default_value = "1.5")]
        min_per_km: f64,
        /// Seed for generated orders
        #[arg(long)]
        seed: Option<u64>,
        /// Emit JSON logs
        #[arg(long)]
        json_logs: bool,
    },
    /// Show earnings and optionally export a statement
    Wallet {
        #[arg(long)]
        export: bool,
    },
    /// Ask for a coaching tip based on driver stats
    Advice {
        /// Also read the tip aloud into this WAV file under the data dir
        #[arg(long)]
        speak: Option<String>,
    },
    /// Search places near a location
    Places {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "-23.561")]
        lat: f64,
        #[arg(long, default_value = "-46.656")]
        lng: f64,
    },
    /// Open a support ticket
    Ticket {
        #[arg(long)]
        requester: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "driver")]
        kind: String,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    AcceptAll,
    RejectAll,
    Ignore,
    MinPerKm,
}
