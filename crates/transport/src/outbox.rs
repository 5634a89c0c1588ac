//! Outbox – Fire-and-forget-Zustellung einzelner Nachrichten
//!
//! Connector und Listener senden Broadcasts und Weiterleitungen ueber eine
//! `Outbox`. `TcpOutbox` oeffnet pro Sendung einen eigenen Austausch,
//! `SammelOutbox` zeichnet Sendungen nur auf (Tests, Simulation).

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::connect;

/// Zustellweg fuer ausgehende Nachrichten
pub trait Outbox: Send + Sync {
    /// Stellt `daten` an `ziel` zu, ohne auf das Ergebnis zu warten
    fn zustellen(&self, ziel: SocketAddr, daten: Bytes);
}

// ---------------------------------------------------------------------------
// TcpOutbox
// ---------------------------------------------------------------------------

/// Stellt jede Nachricht ueber einen eigenen TCP-Austausch zu
///
/// Fehlgeschlagene Zustellungen werden nur protokolliert. Eine Antwort des
/// Empfaengers wird verworfen.
#[derive(Debug, Clone)]
pub struct TcpOutbox {
    zeitlimit: Duration,
}

impl TcpOutbox {
    pub fn neu(zeitlimit: Duration) -> Self {
        Self { zeitlimit }
    }
}

impl Outbox for TcpOutbox {
    fn zustellen(&self, ziel: SocketAddr, daten: Bytes) {
        let laufzeit = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(ziel = %ziel, "Zustellung ausserhalb einer tokio-Runtime verworfen");
                return;
            }
        };

        let zeitlimit = self.zeitlimit;
        laufzeit.spawn(async move {
            let handler = move |empfangen: &[u8], ausgang: &mut BytesMut, _: SocketAddr| {
                if !empfangen.is_empty() {
                    return false;
                }
                ausgang.extend_from_slice(&daten);
                true
            };
            let bei_zeitlimit = || tracing::debug!(ziel = %ziel, "Zustellung: Zeitlimit");

            if let Err(e) = connect(ziel, &handler, bei_zeitlimit, zeitlimit).await {
                tracing::debug!(ziel = %ziel, fehler = %e, "Zustellung fehlgeschlagen");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// SammelOutbox
// ---------------------------------------------------------------------------

/// Zeichnet alle Sendungen in Reihenfolge auf, ohne zu senden
#[derive(Debug, Default)]
pub struct SammelOutbox {
    gesendet: Mutex<Vec<(SocketAddr, Bytes)>>,
}

impl SammelOutbox {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Entnimmt alle bisher aufgezeichneten Sendungen
    pub fn entnehmen(&self) -> Vec<(SocketAddr, Bytes)> {
        std::mem::take(&mut *self.gesendet.lock())
    }

    pub fn anzahl(&self) -> usize {
        self.gesendet.lock().len()
    }
}

impl Outbox for SammelOutbox {
    fn zustellen(&self, ziel: SocketAddr, daten: Bytes) {
        self.gesendet.lock().push((ziel, daten));
    }
}
