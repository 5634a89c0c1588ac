//! Node – ein Koordinationsknoten mit Player, Peer-Sicht und Outbox
//!
//! Eingehende Nachrichten verarbeitet `handler.rs`. Hier liegen
//! Lebenszyklus (Anmelden, Abmelden, Accept-Loop), die lokalen
//! Steuerhaken und die Sendehilfen.

use bytes::BytesMut;
use gleichklang_core::Peer;
use gleichklang_player::MusicPlayer;
use gleichklang_protocol::{decode, encode, encode_into, ControlOperation, DecodeError, Message};
use gleichklang_transport::{connect, Outbox, SessionServer};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::anzeige::Anzeige;
use crate::error::{ListenerError, ListenerResult};
use crate::state::NodeState;

/// Konfiguration eines Koordinationsknotens
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Port, auf dem der Knoten lauscht; wird dem Connector mitgeteilt
    pub listen_port: u16,
    /// Zeitlimit fuer ausgehende Verbindungen
    pub verbindungs_zeitlimit: Duration,
    /// Erlaubte Abweichung von `elapsed_time` beim Desync-Vergleich
    pub elapsed_toleranz_sek: u32,
    /// SEND_STATUS nur vom Koordinator uebernehmen
    pub status_nur_vom_koordinator: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_port: 43210,
            verbindungs_zeitlimit: Duration::from_secs(1),
            elapsed_toleranz_sek: 1,
            status_nur_vom_koordinator: false,
        }
    }
}

/// Koordinationsknoten
pub struct Node {
    pub(crate) zustand: NodeState,
    pub(crate) player: MusicPlayer,
    pub(crate) outbox: Arc<dyn Outbox>,
    pub(crate) config: ListenerConfig,
}

impl Node {
    pub fn neu(config: ListenerConfig, player: MusicPlayer, outbox: Arc<dyn Outbox>) -> Self {
        Self {
            zustand: NodeState::neu(),
            player,
            outbox,
            config,
        }
    }

    pub fn zustand(&self) -> &NodeState {
        &self.zustand
    }

    pub fn player(&self) -> &MusicPlayer {
        &self.player
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Meldet den Knoten per CONNECT beim Connector an
    ///
    /// Die inline empfangene ClientList wird uebernommen. Ein Fehler betrifft
    /// nur diesen Versuch; der Knoten laeuft ohne Tabelle weiter.
    pub async fn registrieren(&self, connector: SocketAddr) -> ListenerResult<()> {
        let anfrage = Message::Connect {
            listen_port: self.config.listen_port,
        };
        let antwort = self
            .austausch(connector, &anfrage, || {
                tracing::warn!(connector = %connector, "Registrierung: Zeitlimit");
            })
            .await?;

        match antwort {
            Some(Ok(Message::ClientList(liste))) => {
                tracing::info!(
                    connector = %connector,
                    id = %liste.own_id,
                    peers = liste.tabelle.len(),
                    "Beim Connector registriert"
                );
                self.zustand.client_list_uebernehmen(liste);
                Ok(())
            }
            Some(Ok(andere)) => Err(ListenerError::UnerwarteteAntwort(andere.message_type())),
            Some(Err(e)) => Err(ListenerError::Decode(e)),
            None => Err(ListenerError::KeineAntwort),
        }
    }

    /// Meldet den Knoten per DISCONNECT ab und vergisst die Tabelle
    pub async fn abmelden(&self, connector: SocketAddr) -> ListenerResult<()> {
        let anfrage = Message::Disconnect {
            listen_port: self.config.listen_port,
        };
        let ergebnis = self.austausch(connector, &anfrage, || {}).await;
        self.zustand.zuruecksetzen();
        ergebnis?;
        tracing::info!(connector = %connector, "Beim Connector abgemeldet");
        Ok(())
    }

    /// Ein ausgehender Austausch; liefert die dekodierte Antwort, falls eine kam
    async fn austausch<T: FnOnce()>(
        &self,
        ziel: SocketAddr,
        nachricht: &Message,
        bei_zeitlimit: T,
    ) -> ListenerResult<Option<Result<Message, DecodeError>>> {
        let daten = encode(nachricht)?;
        let antwort = Mutex::new(None);
        let handler = |empfangen: &[u8], ausgang: &mut BytesMut, _: SocketAddr| {
            if empfangen.is_empty() {
                ausgang.extend_from_slice(&daten);
                return true;
            }
            *antwort.lock() = Some(decode(empfangen));
            false
        };

        connect(ziel, &handler, bei_zeitlimit, self.config.verbindungs_zeitlimit).await?;
        Ok(antwort.into_inner())
    }

    /// Fuehrt die Accept-Loop aus, bis `shutdown_rx` `true` meldet
    pub async fn starten(
        self: Arc<Self>,
        server: SessionServer,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let ergebnis = server.starten(Arc::clone(&self), shutdown_rx).await;
        self.player.stop();
        ergebnis
    }

    // -----------------------------------------------------------------------
    // Lokale Steuerhaken
    // -----------------------------------------------------------------------

    /// Pause umschalten: STOP wenn gerade gespielt wird, sonst START
    pub fn pause_umschalten(&self) {
        let op = if self.player.ist_pausiert() {
            ControlOperation::Start
        } else {
            ControlOperation::Stop
        };
        self.steuern(op);
    }

    pub fn ueberspringen(&self) {
        self.steuern(ControlOperation::Skip);
    }

    /// Reiht einen Song lokal und bei allen anderen Peers ein
    pub fn song_einreihen(&self, song_id: i32) -> bool {
        let angenommen = self.player.add_to_queue(song_id);
        self.an_peers_senden(&self.zustand.andere_peers(), &Message::einreihen(song_id));
        angenommen
    }

    /// Lokaler Steuerbefehl
    ///
    /// Ohne Tabelle wirkt er nur lokal. Der Koordinator wendet ihn an und
    /// relayt ihn; alle anderen leiten ihn an den Koordinator weiter.
    pub fn steuern(&self, op: ControlOperation) {
        let Some(eigene_id) = self.zustand.eigene_id() else {
            self.operation_anwenden(op);
            return;
        };

        match self.zustand.koordinator() {
            Some(k) if k.id != eigene_id => {
                tracing::debug!(op = %op, koordinator = %k.id, "Steuerbefehl an Koordinator");
                self.an_peers_senden(std::slice::from_ref(&k), &Message::control(op));
            }
            Some(_) => {
                self.operation_anwenden(op);
                self.an_peers_senden(&self.zustand.andere_peers(), &Message::control(op));
            }
            None => self.operation_anwenden(op),
        }
    }

    /// Momentaufnahme fuer die Anzeige
    pub fn anzeige(&self) -> Anzeige {
        Anzeige::erstellen(
            &self.player.get_status(),
            self.player.wartet_auf_song(),
            &self.zustand,
        )
    }

    // -----------------------------------------------------------------------
    // Hilfen
    // -----------------------------------------------------------------------

    /// Wendet einen Steuerbefehl auf den lokalen Player an
    pub(crate) fn operation_anwenden(&self, op: ControlOperation) {
        match op {
            ControlOperation::Start => {
                self.player.pause_setzen(false);
            }
            ControlOperation::Stop => {
                self.player.pause_setzen(true);
            }
            ControlOperation::Skip => {
                self.player.skip();
            }
        }
    }

    /// Kodiert einmal und stellt an jeden Peer zu
    pub(crate) fn an_peers_senden(&self, peers: &[Peer], nachricht: &Message) {
        if peers.is_empty() {
            return;
        }
        let daten = match encode(nachricht) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(fehler = %e, typ = ?nachricht.message_type(), "Nachricht nicht kodierbar");
                return;
            }
        };
        for peer in peers {
            self.outbox.zustellen(peer.endpunkt(), daten.clone());
        }
    }

    /// Schreibt den aktuellen Status als SEND_STATUS in `antwort`
    pub(crate) fn status_schreiben(&self, antwort: &mut BytesMut) -> bool {
        let status = Message::SendStatus(self.player.get_status());
        match encode_into(&status, antwort) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(fehler = %e, "Status nicht kodierbar");
                false
            }
        }
    }
}
