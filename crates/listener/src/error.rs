//! Fehlertypen fuer den Koordinationsknoten

use gleichklang_protocol::{DecodeError, EncodeError, MessageType};
use gleichklang_transport::TransportError;
use thiserror::Error;

/// Fehlertyp fuer den Listener
///
/// Betrifft immer nur den einen Austausch mit dem Connector; der Knoten
/// laeuft danach weiter.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Connector nicht erreichbar oder Zeitlimit ueberschritten
    #[error("Transportfehler: {0}")]
    Transport(#[from] TransportError),

    /// Connector hat die Verbindung ohne Antwort geschlossen
    #[error("Keine Antwort vom Connector")]
    KeineAntwort,

    #[error("Unerwartete Antwort vom Typ {0:?}")]
    UnerwarteteAntwort(MessageType),

    #[error("Antwort nicht dekodierbar: {0}")]
    Decode(#[from] DecodeError),

    #[error("Nachricht nicht kodierbar: {0}")]
    Encode(#[from] EncodeError),
}

pub type ListenerResult<T> = Result<T, ListenerError>;
