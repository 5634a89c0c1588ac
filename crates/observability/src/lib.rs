//! # gleichklang-observability
//!
//! Structured Logging via tracing-subscriber. Bibliotheks-Crates senden nur
//! `tracing`-Events; den Subscriber installiert einmalig das Binary.

pub mod logging;

pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
