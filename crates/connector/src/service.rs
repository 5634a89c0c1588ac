//! ConnectorService – Nachrichtenbehandlung und Bereinigung
//!
//! Der Dienst ist selbst der `SessionHandler` fuer den Connector-Port.
//! Die Bereinigung laeuft als eigener Task neben der Accept-Loop.

use bytes::BytesMut;
use gleichklang_core::MAX_PEERS;
use gleichklang_protocol::{decode, encode_into, ClientList, Message};
use gleichklang_transport::{Outbox, SessionHandler, SessionServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::broadcast::tabelle_verteilen;
use crate::knocker::KlopferAufsicht;
use crate::registry::{PeerRegistry, Registrierung};

/// Konfiguration des Membership-Service
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Abstand zwischen zwei QUERY_STATUS eines Klopfers
    pub klopf_intervall: Duration,
    /// Ohne Herzschlag seit dieser Dauer gilt ein Peer als tot
    pub herzschlag_timeout: Duration,
    /// Abstand zwischen zwei Bereinigungslaeufen
    pub bereinigungs_intervall: Duration,
    /// Zeitlimit fuer ausgehende Verbindungen
    pub verbindungs_zeitlimit: Duration,
    pub max_peers: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            klopf_intervall: Duration::from_secs(1),
            herzschlag_timeout: Duration::from_secs(3),
            bereinigungs_intervall: Duration::from_secs(2),
            verbindungs_zeitlimit: Duration::from_secs(1),
            max_peers: MAX_PEERS,
        }
    }
}

/// Membership-Service
pub struct ConnectorService {
    registry: Arc<PeerRegistry>,
    klopfer: KlopferAufsicht,
    outbox: Arc<dyn Outbox>,
    config: ConnectorConfig,
    abbruch: CancellationToken,
}

impl ConnectorService {
    pub fn neu(config: ConnectorConfig, outbox: Arc<dyn Outbox>) -> Self {
        let abbruch = CancellationToken::new();
        Self {
            registry: Arc::new(PeerRegistry::mit_wurzel(config.max_peers, abbruch.child_token())),
            klopfer: KlopferAufsicht::neu(config.klopf_intervall, config.verbindungs_zeitlimit),
            outbox,
            config,
            abbruch,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn klopfer(&self) -> &KlopferAufsicht {
        &self.klopfer
    }

    // -----------------------------------------------------------------------
    // Nachrichten
    // -----------------------------------------------------------------------

    /// Verarbeitet eine eingehende Nachricht auf dem Connector-Port
    pub fn nachricht_verarbeiten(
        &self,
        empfangen: &[u8],
        antwort: &mut BytesMut,
        peer: SocketAddr,
    ) -> bool {
        let nachricht = match decode(empfangen) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Nachricht nicht dekodierbar");
                return false;
            }
        };

        match nachricht {
            Message::Connect { listen_port } => {
                self.bei_connect(SocketAddr::new(peer.ip(), listen_port), antwort)
            }
            Message::Disconnect { listen_port } => {
                self.bei_disconnect(SocketAddr::new(peer.ip(), listen_port));
                false
            }
            Message::SendStatus(_) => {
                let erneuert = self.registry.herzschlag_von_ip(peer.ip());
                tracing::trace!(peer = %peer, erneuert, "Herzschlag");
                false
            }
            andere => {
                tracing::debug!(peer = %peer, typ = ?andere.message_type(), "Nachricht ignoriert");
                false
            }
        }
    }

    fn bei_connect(&self, endpunkt: SocketAddr, antwort: &mut BytesMut) -> bool {
        let eigener = match self.registry.registrieren(endpunkt) {
            Registrierung::Neu(p) => {
                tracing::info!(endpunkt = %endpunkt, id = %p.id, "Peer registriert");
                p
            }
            Registrierung::Bekannt(p) => {
                tracing::info!(endpunkt = %endpunkt, id = %p.id, "Peer erneut angemeldet");
                p
            }
            Registrierung::Voll => {
                tracing::warn!(
                    endpunkt = %endpunkt,
                    max = self.config.max_peers,
                    "Peer-Tabelle voll – Registrierung abgelehnt"
                );
                return false;
            }
        };
        self.klopfer.sicherstellen(endpunkt, &self.registry);

        let tabelle = self.registry.tabelle();
        let liste = Message::ClientList(ClientList {
            own_id: eigener.id,
            tabelle: tabelle.clone(),
        });
        let geantwortet = match encode_into(&liste, antwort) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(fehler = %e, "ClientList nicht kodierbar");
                false
            }
        };

        tabelle_verteilen(self.outbox.as_ref(), &tabelle.peers);
        geantwortet
    }

    fn bei_disconnect(&self, endpunkt: SocketAddr) {
        match self.registry.entfernen(&endpunkt) {
            Some(p) => {
                tracing::info!(endpunkt = %endpunkt, id = %p.id, "Peer abgemeldet");
                tabelle_verteilen(self.outbox.as_ref(), &self.registry.snapshot());
            }
            None => {
                tracing::debug!(endpunkt = %endpunkt, "DISCONNECT fuer unbekannten Peer");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Bereinigung
    // -----------------------------------------------------------------------

    /// Ein Bereinigungslauf; gibt die Anzahl entfernter Peers zurueck
    ///
    /// Wurde mindestens ein Peer entfernt, geht genau ein Broadcast an die
    /// verbleibenden Peers.
    pub fn bereinigen(&self) -> usize {
        let entfernt = self
            .registry
            .abgelaufene_entfernen(self.config.herzschlag_timeout);
        if entfernt.is_empty() {
            return 0;
        }

        for peer in &entfernt {
            tracing::info!(endpunkt = %peer.endpunkt(), id = %peer.id, "Peer ohne Herzschlag entfernt");
        }
        tabelle_verteilen(self.outbox.as_ref(), &self.registry.snapshot());
        entfernt.len()
    }

    async fn bereinigungs_schleife(self: Arc<Self>) {
        let intervall = self.config.bereinigungs_intervall;
        let mut takt = tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.abbruch.cancelled() => break,
                _ = takt.tick() => {
                    self.bereinigen();
                }
            }
        }
        tracing::debug!("Bereinigung beendet");
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Fuehrt Accept-Loop und Bereinigung aus, bis `shutdown_rx` `true` meldet
    pub async fn starten(
        self: Arc<Self>,
        server: SessionServer,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let bereinigung = tokio::spawn(Arc::clone(&self).bereinigungs_schleife());

        let ergebnis = server.starten(Arc::clone(&self), shutdown_rx).await;

        self.beenden();
        if let Err(e) = bereinigung.await {
            tracing::error!(fehler = %e, "Bereinigungs-Task abgebrochen");
        }
        tracing::info!("Connector gestoppt");
        ergebnis
    }

    /// Beendet Bereinigung und alle Klopfer
    pub fn beenden(&self) {
        self.abbruch.cancel();
        self.klopfer.alle_beenden();
    }
}

impl SessionHandler for ConnectorService {
    fn on_message(&self, empfangen: &[u8], antwort: &mut BytesMut, peer: SocketAddr) -> bool {
        self.nachricht_verarbeiten(empfangen, antwort, peer)
    }
}
