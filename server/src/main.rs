//! Gleichklang – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den
//! gewaehlten Modus.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gleichklang_observability::logging_initialisieren;
use gleichklang_server::config::GleichklangConfig;
use gleichklang_server::{connector_ausfuehren, listener_ausfuehren};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gleichklang", version, about = "Synchrone Wiedergabe im Cluster")]
struct Cli {
    /// Konfigurationsdatei
    #[arg(long, env = "GK_CONFIG", default_value = "gleichklang.toml")]
    config: PathBuf,

    #[command(subcommand)]
    modus: Modus,
}

#[derive(Subcommand)]
enum Modus {
    /// Membership-Service starten
    Connector {
        /// Port des Membership-Service
        #[arg(long)]
        port: Option<u16>,
    },
    /// Wiedergabe-Knoten starten
    Listener {
        /// Adresse des Membership-Service (Host:Port)
        #[arg(long)]
        connector: Option<String>,
        /// Lokaler Port des Knotens
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = GleichklangConfig::laden(&cli.config)?;

    match &cli.modus {
        Modus::Connector { port } => {
            if let Some(p) = port {
                config.netzwerk.connector_port = *p;
            }
        }
        Modus::Listener { connector, port } => {
            if let Some(c) = connector {
                config.listener.connector = c.clone();
            }
            if let Some(p) = port {
                config.netzwerk.listener_port = *p;
            }
        }
    }

    logging_initialisieren(
        &config.logging.level,
        &config.logging.format,
        config.logging.datei.as_deref().map(Path::new),
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Gleichklang wird initialisiert"
    );

    match cli.modus {
        Modus::Connector { .. } => connector_ausfuehren(config).await,
        Modus::Listener { .. } => listener_ausfuehren(config).await,
    }
}
