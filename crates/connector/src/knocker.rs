//! Klopfer – Lebendigkeitspruefung pro Peer
//!
//! Fuer jeden registrierten Peer laeuft genau ein Klopfer-Task. Er sendet
//! im festen Intervall `QUERY_STATUS` an den Listener des Peers; eine
//! `SEND_STATUS`-Antwort erneuert den Herzschlag in der Registry.
//!
//! Das `CancellationToken` eines Klopfers gehoert dem Registry-Eintrag und
//! wird beim Entfernen des Eintrags abgebrochen. Die Aufsicht merkt sich nur,
//! welches Token gerade einen laufenden Task hat.

use bytes::{Bytes, BytesMut};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gleichklang_protocol::{decode, encode, Message};
use gleichklang_transport::connect;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::PeerRegistry;

/// Beaufsichtigt alle Klopfer-Tasks, einer pro Peer-Endpunkt
pub struct KlopferAufsicht {
    klopfer: Arc<DashMap<SocketAddr, CancellationToken>>,
    intervall: Duration,
    zeitlimit: Duration,
}

impl KlopferAufsicht {
    pub fn neu(intervall: Duration, zeitlimit: Duration) -> Self {
        Self {
            klopfer: Arc::new(DashMap::new()),
            intervall,
            zeitlimit,
        }
    }

    /// Startet den Klopfer fuer den aktuellen Registry-Eintrag von `ziel`
    ///
    /// Ohne Eintrag passiert nichts. Laeuft fuer das Token des Eintrags
    /// bereits ein Task, ebenfalls nicht. Gibt `true` zurueck, wenn ein Task
    /// gestartet wurde.
    pub fn sicherstellen(&self, ziel: SocketAddr, registry: &Arc<PeerRegistry>) -> bool {
        match registry.klopfer_token(&ziel) {
            Some(token) => self.starten(ziel, token, Arc::clone(registry)),
            None => false,
        }
    }

    /// Startet einen Klopfer, der bis zum Abbruch von `token` laeuft
    pub fn starten(&self, ziel: SocketAddr, token: CancellationToken, registry: Arc<PeerRegistry>) -> bool {
        if token.is_cancelled() {
            return false;
        }
        let laufzeit = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                tracing::error!(ziel = %ziel, "Klopfer ausserhalb einer tokio-Runtime nicht startbar");
                return false;
            }
        };

        // Ein nicht abgebrochenes Token gehoert immer zum aktuellen Eintrag
        match self.klopfer.entry(ziel) {
            Entry::Occupied(e) if !e.get().is_cancelled() => return false,
            Entry::Occupied(mut e) => {
                e.insert(token.clone());
            }
            Entry::Vacant(e) => {
                e.insert(token.clone());
            }
        }

        let klopfer = Arc::clone(&self.klopfer);
        let intervall = self.intervall;
        let zeitlimit = self.zeitlimit;
        laufzeit.spawn(async move {
            klopf_schleife(ziel, registry, intervall, zeitlimit, token).await;
            klopfer.remove_if(&ziel, |_, t| t.is_cancelled());
        });
        tracing::info!(ziel = %ziel, "Klopfer gestartet");
        true
    }

    /// Beendet alle Klopfer
    pub fn alle_beenden(&self) {
        self.klopfer.retain(|_, token| {
            token.cancel();
            false
        });
    }

    /// `true`, solange fuer `ziel` ein nicht abgebrochener Klopfer existiert
    pub fn laeuft(&self, ziel: &SocketAddr) -> bool {
        self.klopfer.get(ziel).is_some_and(|t| !t.is_cancelled())
    }

    pub fn anzahl(&self) -> usize {
        self.klopfer.iter().filter(|e| !e.value().is_cancelled()).count()
    }
}

async fn klopf_schleife(
    ziel: SocketAddr,
    registry: Arc<PeerRegistry>,
    intervall: Duration,
    zeitlimit: Duration,
    token: CancellationToken,
) {
    let anfrage: Bytes = match encode(&Message::QueryStatus) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(fehler = %e, "QUERY_STATUS nicht kodierbar");
            return;
        }
    };

    let handler = |empfangen: &[u8], ausgang: &mut BytesMut, _: SocketAddr| -> bool {
        if empfangen.is_empty() {
            ausgang.extend_from_slice(&anfrage);
            return true;
        }
        match decode(empfangen) {
            Ok(Message::SendStatus(_)) => {
                registry.herzschlag(&ziel);
            }
            Ok(andere) => {
                tracing::debug!(ziel = %ziel, typ = ?andere.message_type(), "Unerwartete Klopf-Antwort");
            }
            Err(e) => {
                tracing::debug!(ziel = %ziel, fehler = %e, "Klopf-Antwort nicht dekodierbar");
            }
        }
        false
    };

    let mut takt = tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = takt.tick() => {}
        }

        tracing::trace!(ziel = %ziel, "Klopfe");
        tokio::select! {
            _ = token.cancelled() => break,
            ergebnis = connect(ziel, &handler, || {}, zeitlimit) => {
                if let Err(e) = ergebnis {
                    tracing::debug!(ziel = %ziel, fehler = %e, "Klopfen fehlgeschlagen");
                }
            }
        }
    }

    tracing::debug!(ziel = %ziel, "Klopf-Schleife beendet");
}
