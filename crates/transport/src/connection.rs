//! Sitzungen – eingehende Lese-Schleife und ausgehender Austausch
//!
//! Eine Sitzung liest Bloecke von hoechstens `PUFFER_GROESSE` Bytes und
//! reicht jeden Block an den `SessionHandler`. Jeder Block wird als genau
//! eine Nachricht behandelt; eine Rahmung gibt es auf dem Draht nicht.
//!
//! ## Ausgehender Austausch (`connect`)
//! ```text
//! Verbinden (mit Zeitlimit)
//!   -> handler(leer)        Handler legt die Anfrage in den Puffer
//!   -> Anfrage schreiben
//!   -> Schreibseite schliessen (Half-Close)
//!   -> Antwort bis EOF lesen (mit Zeitlimit)
//!   -> handler(antwort)     einmal, falls eine Antwort kam
//! ```

use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{TransportError, TransportResult};

/// Groesse des Lese- und Schreibpuffers einer Sitzung
pub const PUFFER_GROESSE: usize = 1024;

/// Verarbeitet empfangene Bytes einer Sitzung
///
/// `empfangen` ist beim ersten Aufruf eines ausgehenden Austauschs leer.
/// Der Handler schreibt eine optionale Antwort nach `antwort` und gibt
/// `true` zurueck, wenn diese gesendet werden soll.
pub trait SessionHandler: Send + Sync {
    fn on_message(&self, empfangen: &[u8], antwort: &mut BytesMut, peer: SocketAddr) -> bool;
}

impl<F> SessionHandler for F
where
    F: Fn(&[u8], &mut BytesMut, SocketAddr) -> bool + Send + Sync,
{
    fn on_message(&self, empfangen: &[u8], antwort: &mut BytesMut, peer: SocketAddr) -> bool {
        self(empfangen, antwort, peer)
    }
}

/// Fehler, die das regulaere Ende einer Verbindung durch den Peer anzeigen
pub(crate) fn ist_verbindungsende(fehler: &io::Error) -> bool {
    matches!(
        fehler.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

// ---------------------------------------------------------------------------
// Eingehende Sitzung
// ---------------------------------------------------------------------------

/// Liest Nachrichten bis der Peer die Verbindung schliesst
///
/// Ein normales Verbindungsende ist kein Fehler und wird nur auf
/// Debug-Level protokolliert. Kommt innerhalb von `leerlauf` nichts an,
/// wird die Sitzung ebenfalls beendet.
pub(crate) async fn sitzung_verarbeiten<H>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: &H,
    leerlauf: Duration,
) -> TransportResult<()>
where
    H: SessionHandler + ?Sized,
{
    let mut lese_puffer = [0u8; PUFFER_GROESSE];
    let mut antwort = BytesMut::with_capacity(PUFFER_GROESSE);

    loop {
        let gelesen = match tokio::time::timeout(leerlauf, stream.read(&mut lese_puffer)).await {
            Ok(gelesen) => gelesen,
            Err(_) => {
                tracing::debug!(peer = %peer, ?leerlauf, "Sitzung im Leerlauf geschlossen");
                return Ok(());
            }
        };
        let n = match gelesen {
            Ok(0) => {
                tracing::debug!(peer = %peer, "Sitzung vom Peer beendet");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if ist_verbindungsende(&e) => {
                tracing::debug!(peer = %peer, fehler = %e, "Sitzung abgebrochen");
                return Ok(());
            }
            Err(e) => return Err(TransportError::PeerNichtErreichbar { peer, quelle: e }),
        };

        antwort.clear();
        if !handler.on_message(&lese_puffer[..n], &mut antwort, peer) || antwort.is_empty() {
            continue;
        }

        if let Err(e) = stream.write_all(&antwort).await {
            if ist_verbindungsende(&e) {
                tracing::debug!(peer = %peer, "Peer vor der Antwort getrennt");
                return Ok(());
            }
            return Err(TransportError::PeerNichtErreichbar { peer, quelle: e });
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgehender Austausch
// ---------------------------------------------------------------------------

/// Fuehrt einen ausgehenden Austausch mit `ziel` durch
///
/// `bei_zeitlimit` wird aufgerufen, wenn die Verbindung nicht innerhalb von
/// `zeitlimit` zustande kommt; der Versuch wird dann verworfen. Eine Antwort,
/// die nicht innerhalb des Zeitlimits vollstaendig ist, wird ebenfalls
/// verworfen.
pub async fn connect<H, T>(
    ziel: SocketAddr,
    handler: &H,
    bei_zeitlimit: T,
    zeitlimit: Duration,
) -> TransportResult<()>
where
    H: SessionHandler + ?Sized,
    T: FnOnce(),
{
    let mut stream = match tokio::time::timeout(zeitlimit, TcpStream::connect(ziel)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(TransportError::PeerNichtErreichbar { peer: ziel, quelle: e }),
        Err(_) => {
            tracing::debug!(peer = %ziel, ?zeitlimit, "Verbindungsaufbau: Zeitlimit");
            bei_zeitlimit();
            return Err(TransportError::Zeitlimit { peer: ziel, zeitlimit });
        }
    };

    let mut anfrage = BytesMut::with_capacity(PUFFER_GROESSE);
    if handler.on_message(&[], &mut anfrage, ziel) && !anfrage.is_empty() {
        stream
            .write_all(&anfrage)
            .await
            .map_err(|e| TransportError::PeerNichtErreichbar { peer: ziel, quelle: e })?;
    }

    // Half-Close: signalisiert dem Peer das Ende der Anfrage
    if let Err(e) = stream.shutdown().await {
        if !ist_verbindungsende(&e) {
            return Err(TransportError::PeerNichtErreichbar { peer: ziel, quelle: e });
        }
    }

    let mut antwort = BytesMut::with_capacity(PUFFER_GROESSE);
    let lesen = async {
        while antwort.len() < PUFFER_GROESSE {
            if stream.read_buf(&mut antwort).await? == 0 {
                break;
            }
        }
        Ok::<(), io::Error>(())
    };

    match tokio::time::timeout(zeitlimit, lesen).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if ist_verbindungsende(&e) => {}
        Ok(Err(e)) => return Err(TransportError::PeerNichtErreichbar { peer: ziel, quelle: e }),
        Err(_) => {
            tracing::debug!(peer = %ziel, "Antwort: Zeitlimit");
            return Err(TransportError::Zeitlimit { peer: ziel, zeitlimit });
        }
    }

    if !antwort.is_empty() {
        // Die Schreibseite ist geschlossen, eine weitere Antwort wird verworfen
        let mut verworfen = BytesMut::new();
        if handler.on_message(&antwort, &mut verworfen, ziel) && !verworfen.is_empty() {
            tracing::debug!(peer = %ziel, "Antwort auf Antwort verworfen");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::net::TcpListener;

    #[test]
    fn verbindungsende_erkennung() {
        assert!(ist_verbindungsende(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(ist_verbindungsende(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(!ist_verbindungsende(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn closure_ist_handler() {
        let handler = |e: &[u8], a: &mut BytesMut, _: SocketAddr| {
            a.extend_from_slice(e);
            true
        };
        let mut puffer = BytesMut::new();
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert!(handler.on_message(b"hallo", &mut puffer, peer));
        assert_eq!(&puffer[..], b"hallo");
    }

    #[tokio::test]
    async fn connect_ohne_lauschenden_peer_schlaegt_fehl() {
        // Port belegen und wieder freigeben, damit niemand lauscht
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ziel = listener.local_addr().unwrap();
        drop(listener);

        let zeitlimit_ausgeloest = AtomicBool::new(false);
        let handler = |_: &[u8], _: &mut BytesMut, _: SocketAddr| false;
        let ergebnis = connect(
            ziel,
            &handler,
            || zeitlimit_ausgeloest.store(true, Ordering::SeqCst),
            Duration::from_secs(1),
        )
        .await;

        assert!(ergebnis.is_err());
        assert!(!zeitlimit_ausgeloest.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn ausbleibende_antwort_ist_zeitlimit_ohne_callback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ziel = listener.local_addr().unwrap();

        // Nimmt an, antwortet aber nie und schliesst nicht
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let zeitlimit_ausgeloest = AtomicBool::new(false);
        let handler = |e: &[u8], a: &mut BytesMut, _: SocketAddr| {
            a.extend_from_slice(b"anfrage");
            e.is_empty()
        };
        let fehler = connect(
            ziel,
            &handler,
            || zeitlimit_ausgeloest.store(true, Ordering::SeqCst),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();

        assert!(fehler.ist_zeitlimit());
        assert!(!zeitlimit_ausgeloest.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn connect_liest_antwort_bis_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ziel = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut puffer = Vec::new();
            stream.read_to_end(&mut puffer).await.unwrap();
            assert_eq!(puffer, b"anfrage");
            stream.write_all(b"antwort").await.unwrap();
        });

        let erhalten = parking_lot::Mutex::new(Vec::<Vec<u8>>::new());
        let handler = |e: &[u8], a: &mut BytesMut, _: SocketAddr| {
            erhalten.lock().push(e.to_vec());
            if e.is_empty() {
                a.extend_from_slice(b"anfrage");
                true
            } else {
                false
            }
        };

        connect(ziel, &handler, || {}, Duration::from_secs(2))
            .await
            .unwrap();

        let aufrufe = erhalten.lock();
        assert_eq!(aufrufe.len(), 2);
        assert!(aufrufe[0].is_empty());
        assert_eq!(aufrufe[1], b"antwort");
    }
}
