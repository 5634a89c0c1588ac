//! Prozess-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass beide Modi ohne Konfigurationsdatei
//! lauffaehig sind. Kommandozeilen-Argumente ueberschreiben einzelne Werte.

use gleichklang_connector::ConnectorConfig;
use gleichklang_core::MAX_PEERS;
use gleichklang_listener::ListenerConfig;
use gleichklang_observability::{log_format_gueltig, log_level_gueltig};
use gleichklang_player::PlayerConfig;
use gleichklang_transport::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GleichklangConfig {
    pub netzwerk: NetzwerkEinstellungen,
    pub connector: ConnectorEinstellungen,
    pub listener: ListenerEinstellungen,
    pub player: PlayerEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port des Membership-Service
    pub connector_port: u16,
    /// Port, auf dem jeder Knoten lauscht
    pub listener_port: u16,
    /// Zeitlimit fuer ausgehende Verbindungen in Millisekunden
    pub verbindungs_zeitlimit_ms: u64,
    /// Maximale gleichzeitige Sitzungen pro Server
    pub max_sitzungen: usize,
    /// Eingehende Sitzung ohne Daten wird nach dieser Zeit geschlossen
    pub leerlauf_zeitlimit_ms: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            connector_port: 1738,
            listener_port: 43210,
            verbindungs_zeitlimit_ms: 1000,
            max_sitzungen: 64,
            leerlauf_zeitlimit_ms: 5000,
        }
    }
}

/// Einstellungen des Membership-Service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorEinstellungen {
    pub klopf_intervall_ms: u64,
    pub herzschlag_timeout_ms: u64,
    pub bereinigungs_intervall_ms: u64,
    pub max_peers: usize,
}

impl Default for ConnectorEinstellungen {
    fn default() -> Self {
        Self {
            klopf_intervall_ms: 1000,
            herzschlag_timeout_ms: 3000,
            bereinigungs_intervall_ms: 2000,
            max_peers: MAX_PEERS,
        }
    }
}

/// Einstellungen eines Wiedergabe-Knotens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerEinstellungen {
    /// Adresse des Membership-Service (Host:Port)
    pub connector: String,
    pub elapsed_toleranz_sek: u32,
    /// SEND_STATUS nur vom Koordinator uebernehmen
    pub status_nur_vom_koordinator: bool,
    /// Abstand zwischen zwei Anzeige-Zeilen im Log, 0 = aus
    pub anzeige_intervall_sek: u64,
}

impl Default for ListenerEinstellungen {
    fn default() -> Self {
        Self {
            connector: "127.0.0.1:1738".into(),
            elapsed_toleranz_sek: 1,
            status_nur_vom_koordinator: false,
            anzeige_intervall_sek: 5,
        }
    }
}

/// Player-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerEinstellungen {
    pub start_song: i32,
    pub tick_ms: u64,
}

impl Default for PlayerEinstellungen {
    fn default() -> Self {
        Self {
            start_song: 1,
            tick_ms: 1000,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
    /// Log-Datei-Pfad (leer = nur stdout)
    pub datei: Option<String>,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            datei: None,
        }
    }
}

impl GleichklangConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                config.pruefen().map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abweisen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!(
                "[logging] level '{}' ungueltig (trace, debug, info, warn, error)",
                self.logging.level
            );
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!(
                "[logging] format '{}' ungueltig (text, json)",
                self.logging.format
            );
        }
        Ok(())
    }

    /// Bind-Adresse des Membership-Service
    pub fn connector_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.connector_port)
    }

    /// Bind-Adresse eines Knotens
    pub fn listener_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.listener_port)
    }

    fn verbindungs_zeitlimit(&self) -> Duration {
        Duration::from_millis(self.netzwerk.verbindungs_zeitlimit_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_sitzungen: self.netzwerk.max_sitzungen,
            leerlauf_zeitlimit: Duration::from_millis(self.netzwerk.leerlauf_zeitlimit_ms),
        }
    }

    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig {
            klopf_intervall: Duration::from_millis(self.connector.klopf_intervall_ms),
            herzschlag_timeout: Duration::from_millis(self.connector.herzschlag_timeout_ms),
            bereinigungs_intervall: Duration::from_millis(self.connector.bereinigungs_intervall_ms),
            verbindungs_zeitlimit: self.verbindungs_zeitlimit(),
            max_peers: self.connector.max_peers,
        }
    }

    /// `listen_port` ist der tatsaechlich gebundene Port
    pub fn listener_config(&self, listen_port: u16) -> ListenerConfig {
        ListenerConfig {
            listen_port,
            verbindungs_zeitlimit: self.verbindungs_zeitlimit(),
            elapsed_toleranz_sek: self.listener.elapsed_toleranz_sek,
            status_nur_vom_koordinator: self.listener.status_nur_vom_koordinator,
        }
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            start_song: self.player.start_song,
            tick: Duration::from_millis(self.player.tick_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = GleichklangConfig::default();
        assert_eq!(cfg.netzwerk.connector_port, 1738);
        assert_eq!(cfg.netzwerk.listener_port, 43210);
        assert_eq!(cfg.connector.max_peers, MAX_PEERS);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.listener.status_nur_vom_koordinator);
    }

    #[test]
    fn bind_adressen() {
        let cfg = GleichklangConfig::default();
        assert_eq!(cfg.connector_bind_adresse(), "0.0.0.0:1738");
        assert_eq!(cfg.listener_bind_adresse(), "0.0.0.0:43210");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            connector_port = 2000

            [listener]
            connector = "192.168.1.10:2000"
            status_nur_vom_koordinator = true

            [player]
            tick_ms = 250
        "#;
        let cfg: GleichklangConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.connector_port, 2000);
        assert_eq!(cfg.listener.connector, "192.168.1.10:2000");
        assert!(cfg.listener.status_nur_vom_koordinator);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.listener_port, 43210);
        assert_eq!(cfg.player.start_song, 1);
        assert_eq!(cfg.player_config().tick, Duration::from_millis(250));
    }

    #[test]
    fn umrechnung_in_bibliotheks_configs() {
        let cfg = GleichklangConfig::default();
        let connector = cfg.connector_config();
        assert_eq!(connector.herzschlag_timeout, Duration::from_secs(3));
        assert_eq!(connector.bereinigungs_intervall, Duration::from_secs(2));

        let listener = cfg.listener_config(5555);
        assert_eq!(listener.listen_port, 5555);
        assert_eq!(listener.verbindungs_zeitlimit, Duration::from_secs(1));
        assert_eq!(cfg.session_config().max_sitzungen, 64);
        assert_eq!(cfg.session_config().leerlauf_zeitlimit, Duration::from_secs(5));
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = GleichklangConfig::laden(Path::new("/gibt/es/nicht/gleichklang.toml")).unwrap();
        assert_eq!(cfg.netzwerk.connector_port, 1738);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("gk-config-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[netzwerk\nconnector_port = ").unwrap();
        let ergebnis = GleichklangConfig::laden(&pfad);
        std::fs::remove_file(&pfad).ok();
        assert!(ergebnis.is_err());
    }

    fn laden_aus(name: &str, inhalt: &str) -> anyhow::Result<GleichklangConfig> {
        let pfad = std::env::temp_dir().join(format!("gk-{name}-{}.toml", std::process::id()));
        std::fs::write(&pfad, inhalt).unwrap();
        let ergebnis = GleichklangConfig::laden(&pfad);
        std::fs::remove_file(&pfad).ok();
        ergebnis
    }

    #[test]
    fn ungueltiges_log_level_wird_abgewiesen() {
        let fehler = laden_aus("level", "[logging]\nlevel = \"laut\"\n").unwrap_err();
        assert!(fehler.to_string().contains("level 'laut'"), "{fehler}");
    }

    #[test]
    fn ungueltiges_log_format_wird_abgewiesen() {
        let fehler = laden_aus("format", "[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(fehler.to_string().contains("format 'xml'"), "{fehler}");
    }

    #[test]
    fn gueltige_logging_sektion_wird_geladen() {
        let cfg = laden_aus("logging", "[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
        assert!(GleichklangConfig::default().pruefen().is_ok());
    }
}
