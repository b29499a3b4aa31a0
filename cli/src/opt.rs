// SPDX-FileCopyrightText: © 2022 ChiselStrike <info@chiselstrike.com>

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use structopt::StructOpt;
use structopt_toml::StructOptToml;

#[derive(StructOpt, Debug, Clone, StructOptToml, Deserialize, Serialize)]
#[structopt(name = "mortar")]
#[serde(deny_unknown_fields, default)]
pub struct Opt {
    /// What to do: `plan` prints the pending migration, `migrate` applies and records it,
    /// `history` lists the recorded migrations.
    #[structopt(default_value = "plan", possible_values = &["plan", "migrate", "history"])]
    #[serde(skip)]
    pub command: Command,
    /// Database URI.
    #[structopt(long, default_value = "sqlite://mortar.db?mode=rwc", env = "MORTAR_DB_URI")]
    pub db_uri: String,
    /// Application directory; migrations are stored in its `migrations` subdirectory.
    #[structopt(long, default_value = ".")]
    pub app_dir: PathBuf,
    /// Model manifest, relative to the application directory.
    #[structopt(long, default_value = "models.toml")]
    pub models: PathBuf,
    /// size of database connection pool.
    #[structopt(short, long, default_value = "1")]
    pub nr_connections: u32,
    /// Read default configuration from this toml configuration file
    #[structopt(long, short)]
    #[serde(skip)]
    pub config: Option<PathBuf>,
    /// Prints the configuration resulting from the merging of all the configuration sources,
    /// including default values, in the JSON format.
    #[structopt(long)]
    #[serde(skip)]
    pub show_config: bool,
}

impl Opt {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path).await?;
        let content = std::str::from_utf8(&content)?;

        Self::from_args_with_toml(content).map_err(|e| anyhow!(e.to_string()))
    }

    /// Configuration file used when `--config` is not given: `<config dir>/mortar/config.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("mortar").join("config.toml");
        path.exists().then_some(path)
    }

    pub fn models_path(&self) -> PathBuf {
        self.app_dir.join(&self.models)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Plan,
    Migrate,
    History,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "plan" => Self::Plan,
            "migrate" => Self::Migrate,
            "history" => Self::History,
            _ => bail!("unknown command {:?}", s),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plan => "plan",
            Self::Migrate => "migrate",
            Self::History => "history",
        })
    }
}
