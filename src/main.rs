use anyhow::{Context, Result};
use auroratrip::api::{auth, bookings, catalog, profile, vehicles, wallet};
use auroratrip::redact::redact_secrets;
use auroratrip::state::MemorySecretStore;
use auroratrip::types::{NewDriver, NewUser, TransportType, UserRole, VehicleInput};
use auroratrip::{ApiClient, NavigationBus, NavigationEvent, SecretStore, Settings, TokenManager};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(name = "auroratrip", version, about = "AuroraTrip marketplace client")]
struct Cli {
    /// Repeat for more log output (-v warn, -vv info, -vvv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long, default_value = "user")]
        role: UserRole,
        #[arg(long)]
        username: String,
        #[arg(long, env = "AURORATRIP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Create a tourist or driver account.
    Register {
        #[arg(long, default_value = "user")]
        role: UserRole,
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "AURORATRIP_PASSWORD", hide_env_values = true)]
        password: String,
        /// Required for drivers: buggy, lancha or 4x4.
        #[arg(long, value_parser = parse_transport)]
        transport_type: Option<TransportType>,
    },
    Profile,
    Packages,
    TouristPoints,
    Bookings,
    Book {
        package_tour_id: String,
        #[arg(long, default_value_t = 1)]
        seats: u32,
    },
    CancelBooking {
        booking_id: String,
    },
    Vehicles {
        #[command(subcommand)]
        action: Option<VehicleAction>,
    },
    Wallet,
    Transactions {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = wallet::DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum VehicleAction {
    Add {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        capacity: u32,
    },
    Update {
        vehicle_id: String,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        capacity: u32,
    },
    Remove {
        vehicle_id: String,
    },
}

fn parse_transport(raw: &str) -> Result<TransportType, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .map_err(|_| format!("unknown transport type {raw:?}; expected buggy, lancha or 4x4"))
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // stdout carries command output
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = Registry::default().with(fmt_layer).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(feature = "keyring")]
fn secret_store(settings: &Settings) -> Arc<dyn SecretStore> {
    let store = auroratrip::state::KeyringSecretStore::new(settings.keyring_service.clone());
    if store.is_available() {
        return Arc::new(store);
    }
    tracing::warn!("system keyring unavailable; the session ends with this process");
    Arc::new(MemorySecretStore::new())
}

#[cfg(not(feature = "keyring"))]
fn secret_store(_settings: &Settings) -> Arc<dyn SecretStore> {
    Arc::new(MemorySecretStore::new())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Login {
            role,
            username,
            password,
        } => {
            auth::login(client, role, &username, &password).await?;
            print_json(&serde_json::json!({ "signedIn": true, "role": role }))
        }
        Command::Logout => {
            auth::logout(client).await;
            Ok(())
        }
        Command::Register {
            role,
            username,
            name,
            email,
            phone,
            password,
            transport_type,
        } => {
            match role {
                UserRole::User => {
                    let user = NewUser {
                        username,
                        name,
                        email,
                        phone,
                        password,
                    };
                    auth::register_user(client, &user).await?;
                }
                UserRole::Driver => {
                    let driver = NewDriver {
                        username,
                        name,
                        email,
                        phone,
                        password,
                        transport_type: transport_type
                            .context("--transport-type is required for drivers")?,
                    };
                    auth::register_driver(client, &driver).await?;
                }
            }
            print_json(&serde_json::json!({ "registered": true, "role": role }))
        }
        Command::Profile => print_json(&profile::my_profile(client).await?),
        Command::Packages => print_json(&catalog::package_tours(client).await?),
        Command::TouristPoints => print_json(&catalog::tourist_points(client).await?),
        Command::Bookings => print_json(&bookings::my_bookings(client).await?),
        Command::Book {
            package_tour_id,
            seats,
        } => {
            bookings::create_booking(client, &package_tour_id, seats).await?;
            Ok(())
        }
        Command::CancelBooking { booking_id } => {
            bookings::cancel_booking(client, &booking_id).await?;
            Ok(())
        }
        Command::Vehicles { action: None } => print_json(&vehicles::my_vehicles(client).await?),
        Command::Vehicles {
            action:
                Some(VehicleAction::Add {
                    kind,
                    model,
                    capacity,
                }),
        } => {
            let input = VehicleInput {
                kind,
                vehicle_model: model,
                capacity,
            };
            vehicles::create_vehicle(client, &input).await?;
            Ok(())
        }
        Command::Vehicles {
            action:
                Some(VehicleAction::Update {
                    vehicle_id,
                    kind,
                    model,
                    capacity,
                }),
        } => {
            let input = VehicleInput {
                kind,
                vehicle_model: model,
                capacity,
            };
            vehicles::update_vehicle(client, &vehicle_id, &input).await?;
            Ok(())
        }
        Command::Vehicles {
            action: Some(VehicleAction::Remove { vehicle_id }),
        } => {
            vehicles::delete_vehicle(client, &vehicle_id).await?;
            Ok(())
        }
        Command::Wallet => print_json(&wallet::wallet(client).await?),
        Command::Transactions { page, limit } => {
            print_json(&wallet::transactions(client, page, limit).await?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("could not initialise logging: {e}");
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let tokens = TokenManager::new(secret_store(&settings));
    let (bus, mut nav) = NavigationBus::new();
    let client = match ApiClient::new(&settings, tokens, Arc::new(bus)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let explicit_logout = matches!(cli.command, Command::Logout);
    let result = run(&client, cli.command).await;

    if !explicit_logout && nav.try_recv() == Ok(NavigationEvent::Login) {
        eprintln!("session expired, please log in");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = match e.downcast_ref::<auroratrip::ApiError>() {
                Some(api) => api
                    .user_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| api.to_string()),
                None => format!("{e:#}"),
            };
            eprintln!("error: {}", redact_secrets(&message));
            ExitCode::FAILURE
        }
    }
}
