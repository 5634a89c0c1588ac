//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `GK_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard: info
//! - `GK_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Ist eine Log-Datei angegeben, wird dorthin statt nach stdout geschrieben.

use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// `GK_LOG_LEVEL` und `GK_LOG_FORMAT` haben Vorrang vor den Argumenten.
/// Schlaegt fehl, wenn die Log-Datei nicht geoeffnet werden kann oder
/// bereits ein Subscriber installiert ist.
pub fn logging_initialisieren(level: &str, format: &str, datei: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("GK_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());
    let json = format == "json";

    let ergebnis = match datei {
        Some(pfad) => {
            let datei = OpenOptions::new()
                .create(true)
                .append(true)
                .open(pfad)
                .with_context(|| format!("Log-Datei {} nicht zu oeffnen", pfad.display()))?;
            let writer = Mutex::new(datei);
            if json {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_thread_names(true)
                    .with_writer(writer)
                    .try_init()
            } else {
                fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .try_init()
            }
        }
        None => {
            if json {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_thread_names(true)
                    .try_init()
            } else {
                fmt().with_env_filter(filter).with_target(true).try_init()
            }
        }
    };

    ergebnis.map_err(|e| anyhow!("Logging nicht initialisierbar: {e}"))
}

/// Log-Format aus `GK_LOG_FORMAT`, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var("GK_LOG_FORMAT").ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
