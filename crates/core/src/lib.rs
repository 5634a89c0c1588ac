//! gleichklang-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die Membership-Service,
//! Listener und Wire-Codec gemeinsam nutzen: Peer-IDs, Peer-Eintraege und
//! die Peer-Tabelle samt Koordinator-Bestimmung.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{Peer, PeerId, PeerTable, MAX_PEERS};
