//! gleichklang-listener – Koordinationsknoten
//!
//! Jeder Wiedergabe-Peer betreibt einen `Node`. Er meldet sich beim
//! Connector an, haelt die zuletzt empfangene Peer-Tabelle, leitet daraus
//! den Koordinator ab und gleicht den lokalen Player mit ihm ab.
//!
//! ## Nachrichtenfluss
//!
//! ```text
//! CONTROL_MUSIC  Koordinator:       lokal anwenden, an alle anderen relayen
//!                kein Koordinator:  lokal anwenden, SEND_STATUS an Koordinator
//! SEND_STATUS    Koordinator:       vergleichen, bei Abweichung eigenen
//!                                   Status an alle anderen (Desync-Reparatur)
//!                kein Koordinator:  lokalen Status ueberschreiben
//! QUERY_STATUS   SEND_STATUS inline antworten
//! CONNECTOR_LIST / _UPDATE  Peer-Tabelle uebernehmen
//! ```

pub mod anzeige;
pub mod error;
pub mod handler;
pub mod node;
pub mod state;

pub use anzeige::Anzeige;
pub use error::{ListenerError, ListenerResult};
pub use node::{ListenerConfig, Node};
pub use state::NodeState;
