//! `coop`: the cooperative management client on the command line.
//!
//! Each invocation restores the persisted session, runs one page controller
//! step and prints what the page would show.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coop_core::{Config, CropType, Services};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "coop")]
#[command(author, version, about = "Cooperative farmer and crop management", long_about = None)]
struct Cli {
    /// API base URL (overrides API_BASE_URL)
    #[arg(long, env = "API_BASE_URL")]
    api_url: Option<String>,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COOP_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a farmer account and log into it
    Register(FarmerArgs),

    /// Forget the persisted session
    Logout,

    /// Show the logged-in account
    Whoami,

    /// Headline numbers for the logged-in account
    Dashboard,

    /// Manage farmers (admin)
    #[command(subcommand)]
    Farmers(FarmersCommand),

    /// Manage all crops (admin)
    #[command(subcommand)]
    Crops(CropsCommand),

    /// Manage your own crops (farmer)
    #[command(subcommand)]
    MyCrops(MyCropsCommand),

    /// Your farmer profile (farmer)
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args, Debug)]
struct FarmerArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "COOP_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: Option<String>,
    #[arg(long)]
    national_id: Option<String>,
    /// Hectares
    #[arg(long)]
    farm_size: Option<String>,
    #[arg(long)]
    farm_location: Option<String>,
}

/// Profile fields to change; anything left out keeps its current value.
#[derive(Args, Debug)]
struct ProfileEdits {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: Option<String>,
    #[arg(long)]
    national_id: Option<String>,
    /// Hectares
    #[arg(long)]
    farm_size: Option<String>,
    #[arg(long)]
    farm_location: Option<String>,
}

#[derive(Args, Debug)]
struct CropArgs {
    #[arg(long)]
    name: String,
    /// CEREALS, VEGETABLES, FRUITS, LEGUMES, CASH_CROPS or OTHER
    #[arg(long = "type")]
    crop_type: CropType,
    #[arg(long)]
    quantity: String,
    #[arg(long, default_value = "kg")]
    unit: String,
}

#[derive(Subcommand, Debug)]
enum FarmersCommand {
    List,
    Add(FarmerArgs),
    /// Change a farmer's profile fields
    Edit {
        id: String,
        #[command(flatten)]
        edits: ProfileEdits,
    },
    /// Delete a farmer and all of their crops
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CropsCommand {
    List,
    Add {
        #[command(flatten)]
        crop: CropArgs,
        /// Owning farmer id
        #[arg(long)]
        farmer: String,
    },
    /// Change a crop's quantity
    SetQuantity { id: String, quantity: String },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum MyCropsCommand {
    List,
    Add(CropArgs),
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    /// Change your profile fields
    Edit(ProfileEdits),
    /// Change the account password
    Password {
        #[arg(long, env = "COOP_PASSWORD", hide_env_values = true)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    let log_level = cli.log_level.as_ref().unwrap_or(&config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let services = Services::from_config(&config);
    tracing::debug!(api = %config.api_base_url, "starting");

    match cli.command {
        Command::Login { email, password } => commands::login(&services, &email, &password),
        Command::Register(args) => commands::register(&services, args),
        Command::Logout => {
            services.session.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => commands::whoami(&services),
        Command::Dashboard => commands::dashboard(&services),
        Command::Farmers(cmd) => commands::farmers(&services, cmd),
        Command::Crops(cmd) => commands::crops(&services, cmd),
        Command::MyCrops(cmd) => commands::my_crops(&services, cmd),
        Command::Profile(cmd) => commands::profile(&services, cmd),
    }
}
