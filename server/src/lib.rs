//! gleichklang-server – Bibliotheks-Root
//!
//! Startet je nach Modus den Membership-Service oder einen
//! Wiedergabe-Knoten und laeuft bis Ctrl-C bzw. `quit`.

pub mod config;
pub mod konsole;

use anyhow::{anyhow, Context, Result};
use config::GleichklangConfig;
use gleichklang_connector::ConnectorService;
use gleichklang_listener::Node;
use gleichklang_player::MusicPlayer;
use gleichklang_transport::{SessionServer, TcpOutbox};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Hinweis bei fehlgeschlagener Anmeldung; einen automatischen Neuversuch gibt es nicht
const REGISTRIERUNG_FEHLGESCHLAGEN: &str =
    "Registrierung fehlgeschlagen, Knoten spielt lokal (mit 'register' erneut versuchen)";

/// Loest `host:port` auf, erste gefundene Adresse gewinnt
pub async fn adresse_aufloesen(adresse: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(adresse)
        .await
        .with_context(|| format!("Adresse '{adresse}' nicht aufloesbar"))?
        .next()
        .ok_or_else(|| anyhow!("Adresse '{adresse}' liefert keinen Eintrag"))
}

// ---------------------------------------------------------------------------
// Connector-Modus
// ---------------------------------------------------------------------------

/// Membership-Service bis Ctrl-C
pub async fn connector_ausfuehren(config: GleichklangConfig) -> Result<()> {
    let bind = adresse_aufloesen(&config.connector_bind_adresse()).await?;
    let server = SessionServer::binden(bind, config.session_config()).await?;
    let lokal = server.lokale_adresse()?;

    let connector_config = config.connector_config();
    let outbox = Arc::new(TcpOutbox::neu(connector_config.verbindungs_zeitlimit));
    let dienst = Arc::new(ConnectorService::neu(connector_config, outbox));

    tracing::info!(adresse = %lokal, "Connector laeuft");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let accept = tokio::spawn(Arc::clone(&dienst).starten(server, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown-Signal empfangen, Connector wird beendet");

    shutdown_tx.send(true).ok();
    accept.await??;
    Ok(())
}

// ---------------------------------------------------------------------------
// Listener-Modus
// ---------------------------------------------------------------------------

/// Wiedergabe-Knoten mit Konsolensteuerung bis `quit` oder Ctrl-C
pub async fn listener_ausfuehren(config: GleichklangConfig) -> Result<()> {
    let connector = adresse_aufloesen(&config.listener.connector).await?;
    let bind = adresse_aufloesen(&config.listener_bind_adresse()).await?;
    let server = SessionServer::binden(bind, config.session_config()).await?;
    let lokal = server.lokale_adresse()?;

    let player = MusicPlayer::neu(config.player_config())?;
    let listener_config = config.listener_config(lokal.port());
    let outbox = Arc::new(TcpOutbox::neu(listener_config.verbindungs_zeitlimit));
    let node = Arc::new(Node::neu(listener_config, player, outbox));

    tracing::info!(adresse = %lokal, connector = %connector, "Knoten laeuft");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let accept = tokio::spawn(Arc::clone(&node).starten(server, shutdown_rx));

    if let Err(e) = node.registrieren(connector).await {
        tracing::warn!(fehler = %e, "{REGISTRIERUNG_FEHLGESCHLAGEN}");
    }

    let anzeige = match config.listener.anzeige_intervall_sek {
        0 => None,
        sek => Some(tokio::spawn(anzeige_schleife(
            Arc::clone(&node),
            Duration::from_secs(sek),
        ))),
    };

    println!("{}", konsole::HILFE);
    tokio::select! {
        _ = konsole::schleife(&node, connector) => {
            tracing::info!("Konsole beendet");
        }
        ergebnis = tokio::signal::ctrl_c() => {
            ergebnis?;
            tracing::info!("Shutdown-Signal empfangen, Knoten wird beendet");
        }
    }

    if let Some(task) = anzeige {
        task.abort();
    }

    if node.zustand().ist_registriert() {
        if let Err(e) = node.abmelden(connector).await {
            tracing::warn!(fehler = %e, "Abmeldung fehlgeschlagen");
        }
    }

    shutdown_tx.send(true).ok();
    accept.await??;
    Ok(())
}

async fn anzeige_schleife(node: Arc<Node>, intervall: Duration) {
    let mut takt = tokio::time::interval(intervall);
    takt.tick().await;
    loop {
        takt.tick().await;
        let anzeige = node.anzeige();
        tracing::info!(
            song = anzeige.song_id,
            elapsed = anzeige.elapsed_sek,
            paused = anzeige.paused,
            peers = anzeige.peers.len(),
            "{anzeige}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numerische_adresse_wird_aufgeloest() {
        let adresse = adresse_aufloesen("127.0.0.1:1738").await.unwrap();
        assert_eq!(adresse, "127.0.0.1:1738".parse().unwrap());
    }

    #[tokio::test]
    async fn adresse_ohne_port_ist_fehler() {
        assert!(adresse_aufloesen("127.0.0.1").await.is_err());
    }

    #[test]
    fn registrierungshinweis_nennt_konsolenbefehl() {
        assert!(REGISTRIERUNG_FEHLGESCHLAGEN.contains("mit 'register' erneut versuchen"));
        assert_eq!(
            "register".parse::<konsole::Befehl>().unwrap(),
            konsole::Befehl::Registrieren
        );
    }
}
