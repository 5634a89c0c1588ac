//! Tabellen-Broadcast an alle Peers
//!
//! Die Nachricht wird einmal kodiert und an jeden Peer des Snapshots
//! ueber die Outbox zugestellt. Fehlgeschlagene Zustellungen an einen Peer
//! beeinflussen die anderen nicht.

use gleichklang_core::Peer;
use gleichklang_protocol::{encode, Message};
use gleichklang_transport::Outbox;

/// Sendet `ClientListUpdate{peers}` an jeden Peer in `peers`
///
/// Gibt die Anzahl angestossener Zustellungen zurueck.
pub fn tabelle_verteilen(outbox: &dyn Outbox, peers: &[Peer]) -> usize {
    let nachricht = Message::ClientListUpdate {
        peers: peers.to_vec(),
    };
    let daten = match encode(&nachricht) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(fehler = %e, peers = peers.len(), "Tabelle nicht kodierbar");
            return 0;
        }
    };

    for peer in peers {
        outbox.zustellen(peer.endpunkt(), daten.clone());
    }

    tracing::debug!(empfaenger = peers.len(), "Peer-Tabelle verteilt");
    peers.len()
}
