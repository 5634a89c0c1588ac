//! gleichklang-connector – Membership-Service
//!
//! Der Connector ist der Treffpunkt des Clusters. Er vergibt Peer-IDs,
//! haelt die massgebliche Peer-Tabelle, prueft die Lebendigkeit jedes
//! Peers ueber einen eigenen Klopfer und verteilt jede Aenderung der
//! Tabelle an alle bekannten Peers.
//!
//! ## Ablauf
//!
//! ```text
//! CONNECT{port}     -> Eintrag anlegen, Klopfer starten,
//!                      ClientList inline antworten, Tabelle broadcasten
//! DISCONNECT{port}  -> Eintrag entfernen, Klopfer beenden, broadcasten
//! SEND_STATUS       -> Herzschlag aller Eintraege mit dieser IP erneuern
//!
//! Bereinigung (alle 2 s): Eintraege ohne Herzschlag seit > 3 s entfernen,
//!                         einmal pro Durchlauf broadcasten
//! ```

pub mod broadcast;
pub mod knocker;
pub mod registry;
pub mod service;

pub use knocker::KlopferAufsicht;
pub use registry::{PeerRegistry, Registrierung};
pub use service::{ConnectorConfig, ConnectorService};
