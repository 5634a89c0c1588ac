//! gleichklang-transport – TCP-Session-Transport
//!
//! Der Transport kennt keine Nachrichtensemantik. Er reicht empfangene
//! Bytes an einen `SessionHandler` und schreibt dessen Antwort zurueck.
//!
//! ## Architektur
//!
//! ```text
//! SessionServer (Accept-Loop, begrenzte Anzahl Sitzungen)
//!     |
//!     v
//! Sitzung (pro Verbindung ein Task)
//!     |  lesen -> SessionHandler::on_message -> ggf. Antwort schreiben
//!     |  bis der Peer die Verbindung schliesst
//!
//! connect()   – ein ausgehender Austausch mit Zeitlimit
//! Outbox      – Fire-and-forget-Zustellung, ein Task pro Sendung
//! ```

pub mod connection;
pub mod error;
pub mod outbox;
pub mod server;

// Bequeme Re-Exporte
pub use connection::{connect, SessionHandler, PUFFER_GROESSE};
pub use error::{TransportError, TransportResult};
pub use outbox::{Outbox, SammelOutbox, TcpOutbox};
pub use server::{SessionConfig, SessionServer};
