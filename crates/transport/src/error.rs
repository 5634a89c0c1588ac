//! Fehlertypen fuer den Session-Transport

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Fehlertyp fuer den Transport
///
/// Ein Fehler betrifft immer nur die eine Sitzung bzw. den einen Austausch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Verbindungsaufbau oder Antwort hat das Zeitlimit ueberschritten
    #[error("Zeitlimit ({zeitlimit:?}) bei {peer} ueberschritten")]
    Zeitlimit { peer: SocketAddr, zeitlimit: Duration },

    /// Sonstiger IO-Fehler waehrend der Sitzung
    #[error("Peer {peer} nicht erreichbar: {quelle}")]
    PeerNichtErreichbar {
        peer: SocketAddr,
        #[source]
        quelle: io::Error,
    },

    /// Listener-Socket konnte nicht gebunden werden
    #[error("Bind auf {adresse} fehlgeschlagen: {quelle}")]
    Bind {
        adresse: SocketAddr,
        #[source]
        quelle: io::Error,
    },
}

impl TransportError {
    pub fn ist_zeitlimit(&self) -> bool {
        matches!(self, Self::Zeitlimit { .. })
    }
}

/// Result-Typ fuer den Transport
pub type TransportResult<T> = Result<T, TransportError>;
