//! TCP-Session-Server – Bindet Socket, akzeptiert Sitzungen
//!
//! Jede eingehende Verbindung laeuft als eigener tokio-Task. Die Anzahl
//! gleichzeitiger Sitzungen ist durch ein Semaphore begrenzt; ist es
//! erschoepft, wird die Verbindung sofort geschlossen.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};

use crate::connection::{sitzung_verarbeiten, SessionHandler};
use crate::error::{TransportError, TransportResult};

/// Konfiguration eines Session-Servers
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximale Anzahl gleichzeitig offener Sitzungen
    pub max_sitzungen: usize,
    /// Eine Sitzung ohne eingehende Daten wird nach dieser Zeit geschlossen
    pub leerlauf_zeitlimit: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sitzungen: 64,
            leerlauf_zeitlimit: Duration::from_secs(5),
        }
    }
}

/// TCP-Session-Server
///
/// Wird in zwei Schritten benutzt: `binden` reserviert den Port (damit die
/// tatsaechliche Adresse vor dem Start bekannt ist), `starten` fuehrt die
/// Accept-Loop aus.
pub struct SessionServer {
    listener: TcpListener,
    config: SessionConfig,
}

impl SessionServer {
    /// Bindet den Server an `adresse`
    pub async fn binden(adresse: SocketAddr, config: SessionConfig) -> TransportResult<Self> {
        let listener = TcpListener::bind(adresse)
            .await
            .map_err(|e| TransportError::Bind { adresse, quelle: e })?;
        Ok(Self { listener, config })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten<H>(
        self,
        handler: Arc<H>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()>
    where
        H: SessionHandler + 'static,
    {
        let lokale_addr = self.listener.local_addr()?;
        let sitzungen = Arc::new(Semaphore::new(self.config.max_sitzungen));
        let leerlauf = self.config.leerlauf_zeitlimit;

        tracing::info!(
            adresse = %lokale_addr,
            max_sitzungen = self.config.max_sitzungen,
            "Session-Server gestartet"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let erlaubnis = match Arc::clone(&sitzungen).try_acquire_owned() {
                                Ok(erlaubnis) => erlaubnis,
                                Err(_) => {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        max = self.config.max_sitzungen,
                                        "Sitzungslimit erreicht – Verbindung abgelehnt"
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            tracing::trace!(peer = %peer_addr, "Verbindung akzeptiert");
                            let handler = Arc::clone(&handler);

                            tokio::spawn(async move {
                                let _erlaubnis = erlaubnis;
                                if let Err(e) =
                                    sitzung_verarbeiten(stream, peer_addr, handler.as_ref(), leerlauf).await
                                {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Sitzungsfehler");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(adresse = %lokale_addr, "Session-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(adresse = %lokale_addr, "Session-Server gestoppt");
        Ok(())
    }
}
