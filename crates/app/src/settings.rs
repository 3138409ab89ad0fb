//! Settings for the application.
//!
//! Layered, lowest first: built-in defaults, `config/spinwheel.toml` (or the
//! file given with `--config`), `SPINWHEEL_*` environment variables, then
//! command line flags. Nested keys use `__` in the environment, e.g.
//! `SPINWHEEL_SERVER__PORT=4000`.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use server::{BranchSeed, PrizeSeed, Seed};
use uuid::Uuid;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/spinwheel.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level for the workspace crates.
    pub level: String,
    pub base_url: String,
    /// `{ "ip": ... }` endpoint used for the per-address quota.
    pub lookup_url: Option<String>,
    pub timeout_secs: u64,
    pub download_dir: PathBuf,
    pub skip_review: bool,
    /// Deep link carrying the session token.
    pub link: Option<String>,
    pub server: Option<ServerSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            base_url: "http://127.0.0.1:3000".to_string(),
            lookup_url: None,
            timeout_secs: 10,
            download_dir: PathBuf::from("vouchers"),
            skip_review: false,
            link: None,
            server: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub voucher_prefix: Option<String>,
    pub branches: Vec<BranchSeed>,
    pub prizes: Vec<PrizeSeed>,
}

/// A single demo branch, usable with the token `demo`.
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            admin_username: None,
            admin_password: None,
            voucher_prefix: None,
            branches: vec![BranchSeed {
                id: Uuid::new_v4(),
                name: "Demo".to_string(),
                review_url: "https://example.com/review".to_string(),
                tokens: vec!["demo".to_string()],
            }],
            prizes: [
                ("Free coffee", "#e4572e"),
                ("Dessert", "#29335c"),
                ("10% off", "#f3a712"),
                ("Juice", "#669bbc"),
            ]
            .into_iter()
            .map(|(name, color)| PrizeSeed {
                name: name.to_string(),
                color: color.to_string(),
                active: true,
            })
            .collect(),
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn seed(&self) -> Seed {
        Seed {
            branches: self.branches.clone(),
            prizes: self.prizes.clone(),
            voucher_prefix: self.voucher_prefix.clone(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "spinwheel", version)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the reward backend URL (e.g. http://127.0.0.1:3000).
    #[arg(long)]
    base_url: Option<String>,
    /// Deep link with the session token (e.g. https://spin.example.com/?token=...).
    #[arg(long)]
    link: Option<String>,
    /// Go straight to the wheel after registration.
    #[arg(long)]
    skip_review: bool,
    /// Run the in-memory reference backend.
    #[arg(long)]
    serve: bool,
}

pub fn load() -> Result<Settings> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(
        config::Environment::with_prefix("SPINWHEEL")
            .prefix_separator("_")
            .separator("__"),
    );
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(link) = args.link {
        settings.link = Some(link);
    }
    if args.skip_review {
        settings.skip_review = true;
    }
    if args.serve && settings.server.is_none() {
        settings.server = Some(ServerSettings::default());
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                r##"
                base_url = "http://backend:8080"
                skip_review = true

                [server]
                port = 4000

                [[server.prizes]]
                name = "Cake"
                color = "#ffffff"
                "##,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.base_url, "http://backend:8080");
        assert!(settings.skip_review);
        assert_eq!(settings.timeout_secs, 10);
        let server = settings.server.unwrap();
        assert_eq!(server.addr(), "127.0.0.1:4000");
        assert_eq!(server.prizes.len(), 1);
        assert!(server.prizes[0].active);
        // Unset lists keep the demo branch.
        assert_eq!(server.branches[0].tokens, ["demo"]);
    }
}
