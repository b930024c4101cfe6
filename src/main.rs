//! JoslaSync CLI - terminal client for the back-office API
//!
//! Clients, company profile and session management from the command line.

mod api;
mod auth;
mod config;
mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use api::{CompanyFields, CompanyRegistration, ListParams};
use models::{ClientCreate, ClientDetails, ClientStatus, ClientUpdate};

#[derive(Parser)]
#[command(name = "joslasync")]
#[command(about = "Terminal client for the JoslaSync back-office API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with username and password
    Login {
        #[arg(short, long)]
        username: String,

        /// Read from JOSLASYNC_PASSWORD when omitted
        #[arg(short, long, env = "JOSLASYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show current authentication status
    Status {
        /// Also validate the session against the server
        #[arg(long)]
        check: bool,
    },

    /// Show current user and tenant (verify auth works)
    Whoami,

    /// Create a user account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "JOSLASYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Manage client records
    Clients {
        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Company profile
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Show or change settings
    Config {
        /// Base URL of the API, e.g. http://localhost:8000
        #[arg(long)]
        api_url: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List clients
    List {
        /// Search name, email or company
        #[arg(short, long)]
        q: Option<String>,

        #[arg(short, long, value_enum)]
        status: Option<ClientStatus>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        page_size: u32,
    },

    /// Show one client
    Show { id: Uuid },

    /// Create a client
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: String,

        #[command(flatten)]
        details: ClientArgs,
    },

    /// Update fields of a client
    Edit {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long, value_enum)]
        status: Option<ClientStatus>,

        #[command(flatten)]
        details: ClientArgs,
    },

    /// Delete a client
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Show the company profile
    Show,

    /// Update profile fields
    Update {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Replace the logo image
        #[arg(long)]
        logo: Option<PathBuf>,
    },

    /// Register a new company and its admin user
    Register {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Logo image to upload
        #[arg(long)]
        logo: PathBuf,

        #[arg(long)]
        admin_username: String,

        #[arg(long)]
        admin_email: String,

        #[arg(long, env = "JOSLASYNC_PASSWORD", hide_env_values = true)]
        admin_password: String,
    },
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long)]
    company: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    joined_date: Option<NaiveDate>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    address2: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    postal_code: Option<String>,

    /// Two-letter country code
    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    tax_id: Option<String>,

    /// Three-letter currency code, e.g. USD
    #[arg(long)]
    currency: Option<String>,

    /// Default tax rate in percent
    #[arg(long)]
    tax_rate: Option<f64>,

    /// e.g. "Net 30"
    #[arg(long)]
    payment_terms: Option<String>,

    /// Discount in percent
    #[arg(long)]
    discount_rate: Option<f64>,
}

impl From<ClientArgs> for ClientDetails {
    fn from(a: ClientArgs) -> Self {
        Self {
            company: a.company,
            notes: a.notes,
            joined_date: a.joined_date,
            address_line1: a.address,
            address_line2: a.address2,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
            country: a.country,
            tax_id: a.tax_id,
            default_currency: a.currency,
            default_tax_rate: a.tax_rate,
            payment_terms: a.payment_terms,
            discount_rate: a.discount_rate,
        }
    }
}

#[derive(Args)]
struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    mobile: Option<String>,

    #[arg(long)]
    address1: Option<String>,

    #[arg(long)]
    address2: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    zip_code: Option<String>,

    /// Percentage, e.g. 7.5
    #[arg(long)]
    tax_rate: Option<f64>,

    #[arg(long)]
    status: Option<String>,
}

impl From<ProfileArgs> for CompanyFields {
    fn from(a: ProfileArgs) -> Self {
        Self {
            company_name: a.name,
            company_email: a.email,
            company_mobile: a.mobile,
            address1: a.address1,
            address2: a.address2,
            city: a.city,
            state: a.state,
            zip_code: a.zip_code,
            tax_rate: a.tax_rate,
            status: a.status,
        }
    }
}

fn run_config(api_url: Option<String>, timeout: Option<u64>) -> Result<()> {
    let mut cfg = config::Config::load()?;
    let changed = api_url.is_some() || timeout.is_some();
    if let Some(url) = api_url {
        url::Url::parse(&url).with_context(|| format!("Invalid API URL '{}'", url))?;
        cfg.api_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(secs) = timeout {
        cfg.timeout_secs = Some(secs);
    }
    if changed {
        cfg.save()?;
        println!("Configuration saved.");
    }

    println!("api_url:      {}", cfg.api_url.as_deref().unwrap_or("(unset)"));
    println!("timeout_secs: {}", cfg.timeout().as_secs());
    println!("refresh cookie: {}", cfg.refresh_cookie_name());
    if std::env::var(config::API_URL_ENV).is_ok() {
        println!("({} is set and overrides api_url)", config::API_URL_ENV);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login { username, password } => {
            tracing::info!("Logging in...");
            auth::login(&username, &password).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status { check } => {
            auth::status(check).await?;
        }
        Commands::Whoami => {
            api::whoami().await?;
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            auth::register(&username, &email, &password).await?;
        }
        Commands::Clients { command } => match command {
            ClientCommands::List {
                q,
                status,
                page,
                page_size,
            } => {
                api::list_clients(ListParams {
                    q,
                    status,
                    page,
                    page_size,
                })
                .await?;
            }
            ClientCommands::Show { id } => {
                api::show_client(id).await?;
            }
            ClientCommands::Add {
                name,
                email,
                phone,
                details,
            } => {
                api::add_client(ClientCreate {
                    name,
                    email,
                    phone,
                    details: details.into(),
                })
                .await?;
            }
            ClientCommands::Edit {
                id,
                name,
                email,
                phone,
                status,
                details,
            } => {
                api::edit_client(
                    id,
                    ClientUpdate {
                        name,
                        email,
                        phone,
                        status,
                        details: details.into(),
                    },
                )
                .await?;
            }
            ClientCommands::Delete { id } => {
                api::delete_client(id).await?;
            }
        },
        Commands::Company { command } => match command {
            CompanyCommands::Show => {
                api::show_company().await?;
            }
            CompanyCommands::Update { profile, logo } => {
                api::update_company(profile.into(), logo).await?;
            }
            CompanyCommands::Register {
                profile,
                logo,
                admin_username,
                admin_email,
                admin_password,
            } => {
                tracing::info!("Registering company...");
                api::register_company(CompanyRegistration {
                    profile: profile.into(),
                    logo,
                    admin_username,
                    admin_email,
                    admin_password,
                })
                .await?;
            }
        },
        Commands::Config { api_url, timeout } => {
            run_config(api_url, timeout)?;
        }
    }

    Ok(())
}
