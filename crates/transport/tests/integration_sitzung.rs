//! Integrationstests: SessionServer und connect gegeneinander

use bytes::BytesMut;
use gleichklang_transport::{connect, SessionConfig, SessionServer, TransportError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

async fn server_starten<H>(handler: H) -> (SocketAddr, watch::Sender<bool>)
where
    H: gleichklang_transport::SessionHandler + 'static,
{
    server_mit_config(SessionConfig::default(), handler).await
}

async fn server_mit_config<H>(config: SessionConfig, handler: H) -> (SocketAddr, watch::Sender<bool>)
where
    H: gleichklang_transport::SessionHandler + 'static,
{
    let server = SessionServer::binden("127.0.0.1:0".parse().unwrap(), config)
        .await
        .unwrap();
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(Arc::new(handler), shutdown_rx));
    (adresse, shutdown_tx)
}

#[tokio::test]
async fn echo_austausch_ueber_connect() {
    let (adresse, _shutdown) = server_starten(|e: &[u8], a: &mut BytesMut, _: SocketAddr| {
        a.extend_from_slice(b"echo:");
        a.extend_from_slice(e);
        true
    })
    .await;

    let antwort = parking_lot::Mutex::new(Vec::new());
    let handler = |e: &[u8], a: &mut BytesMut, _: SocketAddr| {
        if e.is_empty() {
            a.extend_from_slice(b"ping");
            return true;
        }
        antwort.lock().extend_from_slice(e);
        false
    };

    connect(adresse, &handler, || {}, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(&antwort.lock()[..], b"echo:ping");
}

#[tokio::test]
async fn handler_ohne_antwort_schliesst_sauber() {
    let aufrufe = Arc::new(AtomicUsize::new(0));
    let zaehler = Arc::clone(&aufrufe);
    let (adresse, _shutdown) = server_starten(move |_: &[u8], _: &mut BytesMut, _: SocketAddr| {
        zaehler.fetch_add(1, Ordering::SeqCst);
        false
    })
    .await;

    let mut stream = TcpStream::connect(adresse).await.unwrap();
    stream.write_all(b"einweg").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(aufrufe.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_beendet_accept_loop() {
    let server = SessionServer::binden("127.0.0.1:0".parse().unwrap(), SessionConfig::default())
        .await
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(|_: &[u8], _: &mut BytesMut, _: SocketAddr| false);
    let task = tokio::spawn(server.starten(handler, shutdown_rx));

    shutdown_tx.send(true).unwrap();
    let ergebnis = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("Server muss nach Shutdown enden")
        .unwrap();
    assert!(ergebnis.is_ok());
}

fn echo(e: &[u8], a: &mut BytesMut, _: SocketAddr) -> bool {
    a.extend_from_slice(b"echo:");
    a.extend_from_slice(e);
    true
}

/// Schreibt `daten` und liest die Echo-Antwort auf derselben Sitzung
async fn echo_auf_sitzung(stream: &mut TcpStream, daten: &[u8]) -> Vec<u8> {
    stream.write_all(daten).await.unwrap();
    let mut antwort = vec![0u8; 5 + daten.len()];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut antwort))
        .await
        .expect("Echo muss ankommen")
        .unwrap();
    antwort
}

/// Wiederholt einen Austausch, bis der Server wieder eine Sitzung annimmt
async fn echo_mit_wiederholung(adresse: SocketAddr) -> Vec<u8> {
    for _ in 0..40 {
        let mut stream = TcpStream::connect(adresse).await.unwrap();
        if stream.write_all(b"neu").await.is_ok() {
            let mut antwort = Vec::new();
            let gelesen = tokio::time::timeout(Duration::from_millis(500), async {
                stream.shutdown().await?;
                stream.read_to_end(&mut antwort).await
            })
            .await;
            if matches!(gelesen, Ok(Ok(n)) if n > 0) {
                return antwort;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Server nimmt keine Sitzung mehr an");
}

#[tokio::test]
async fn sitzungslimit_schliesst_ueberzaehlige_verbindung() {
    let config = SessionConfig {
        max_sitzungen: 1,
        leerlauf_zeitlimit: Duration::from_secs(10),
    };
    let (adresse, _shutdown) = server_mit_config(config, echo).await;

    // Erste Sitzung belegt die einzige Erlaubnis
    let mut erster = TcpStream::connect(adresse).await.unwrap();
    assert_eq!(echo_auf_sitzung(&mut erster, b"a").await, b"echo:a");

    // Die zweite Verbindung wird angenommen und sofort geschlossen
    let mut zweiter = TcpStream::connect(adresse).await.unwrap();
    let mut puffer = [0u8; 16];
    let gelesen = tokio::time::timeout(Duration::from_secs(2), zweiter.read(&mut puffer))
        .await
        .expect("Ueberzaehlige Verbindung muss geschlossen werden");
    assert!(matches!(gelesen, Ok(0) | Err(_)), "{gelesen:?}");

    // Die bestehende Sitzung arbeitet weiter
    assert_eq!(echo_auf_sitzung(&mut erster, b"b").await, b"echo:b");

    // Nach dem Ende der ersten Sitzung ist die Erlaubnis wieder frei
    drop(erster);
    assert_eq!(echo_mit_wiederholung(adresse).await, b"echo:neu");
}

#[tokio::test]
async fn leerlauf_sitzung_wird_geschlossen_und_gibt_erlaubnis_frei() {
    let config = SessionConfig {
        max_sitzungen: 1,
        leerlauf_zeitlimit: Duration::from_millis(100),
    };
    let (adresse, _shutdown) = server_mit_config(config, echo).await;

    // Stumme Verbindung: der Server schliesst sie nach dem Leerlauf-Zeitlimit
    let mut stumm = TcpStream::connect(adresse).await.unwrap();
    let mut puffer = [0u8; 16];
    let gelesen = tokio::time::timeout(Duration::from_secs(2), stumm.read(&mut puffer))
        .await
        .expect("Leerlauf-Sitzung muss vom Server geschlossen werden");
    assert!(matches!(gelesen, Ok(0) | Err(_)), "{gelesen:?}");

    assert_eq!(echo_mit_wiederholung(adresse).await, b"echo:neu");
}

#[tokio::test]
async fn connect_ruft_bei_zeitlimit_den_callback() {
    // Listener mit Backlog 1, der nie akzeptiert: sobald die Warteschlange
    // voll ist, bleibt jeder weitere Verbindungsaufbau haengen
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let adresse = listener.local_addr().unwrap();

    let mut gehalten = Vec::new();
    let mut voll = false;
    for _ in 0..64 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(adresse)).await {
            Ok(Ok(stream)) => gehalten.push(stream),
            Ok(Err(_)) => {}
            Err(_) => {
                voll = true;
                break;
            }
        }
    }
    assert!(voll, "Backlog muss sich fuellen lassen");

    let ausgeloest = AtomicUsize::new(0);
    let handler = |_: &[u8], a: &mut BytesMut, _: SocketAddr| {
        a.extend_from_slice(b"nie gesendet");
        true
    };
    let zeitlimit = Duration::from_millis(200);
    let ergebnis = connect(
        adresse,
        &handler,
        || {
            ausgeloest.fetch_add(1, Ordering::SeqCst);
        },
        zeitlimit,
    )
    .await;

    let fehler = ergebnis.unwrap_err();
    assert!(fehler.ist_zeitlimit(), "{fehler}");
    assert!(matches!(
        fehler,
        TransportError::Zeitlimit { peer, zeitlimit: z } if peer == adresse && z == zeitlimit
    ));
    assert_eq!(ausgeloest.load(Ordering::SeqCst), 1);
    drop(listener);
}
