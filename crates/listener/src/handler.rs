//! Nachrichtenbehandlung des Koordinationsknotens

use bytes::BytesMut;
use gleichklang_protocol::{decode, ChangeSong, ControlOperation, Message, PlaybackStatus};
use gleichklang_transport::SessionHandler;
use std::net::SocketAddr;

use crate::node::Node;

impl Node {
    /// Verarbeitet eine eingehende Nachricht; `true` wenn `antwort` gesendet werden soll
    pub fn nachricht_verarbeiten(
        &self,
        empfangen: &[u8],
        antwort: &mut BytesMut,
        peer: SocketAddr,
    ) -> bool {
        let nachricht = match decode(empfangen) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Nachricht nicht dekodierbar");
                return false;
            }
        };
        tracing::trace!(peer = %peer, typ = ?nachricht.message_type(), "Nachricht empfangen");

        match nachricht {
            Message::ControlMusic { op } => {
                self.bei_control_music(op, peer);
                false
            }
            Message::ChangeSong(ChangeSong {
                song_id,
                add_to_queue,
            }) => {
                if add_to_queue {
                    self.player.add_to_queue(song_id);
                } else {
                    tracing::debug!(song_id, "CHANGE_SONG ohne Einreihen ignoriert");
                }
                false
            }
            Message::QueryStatus => self.status_schreiben(antwort),
            Message::SendStatus(status) => {
                self.bei_send_status(status, peer);
                false
            }
            Message::ClientList(liste) => {
                tracing::info!(id = %liste.own_id, peers = liste.tabelle.len(), "ClientList empfangen");
                self.zustand.client_list_uebernehmen(liste);
                false
            }
            Message::ClientListUpdate { peers } => {
                tracing::debug!(peers = peers.len(), "Peer-Tabelle aktualisiert");
                self.zustand.peers_ersetzen(peers);
                false
            }
            Message::Connect { .. } | Message::Disconnect { .. } | Message::Bully { .. } => {
                tracing::debug!(peer = %peer, "Nachricht ohne Wirkung auf dem Listener");
                false
            }
        }
    }

    fn bei_control_music(&self, op: ControlOperation, peer: SocketAddr) {
        tracing::info!(op = %op, peer = %peer, "CONTROL_MUSIC");
        self.operation_anwenden(op);

        if self.zustand.ist_koordinator() {
            self.an_peers_senden(&self.zustand.andere_peers(), &Message::control(op));
        } else if let Some(koordinator) = self.zustand.koordinator() {
            let status = Message::SendStatus(self.player.get_status());
            self.an_peers_senden(std::slice::from_ref(&koordinator), &status);
        }
    }

    fn bei_send_status(&self, fremd: PlaybackStatus, peer: SocketAddr) {
        if self.zustand.ist_koordinator() {
            let eigen = self.player.get_status();
            if eigen.stimmt_ueberein(&fremd, self.config.elapsed_toleranz_sek) {
                tracing::trace!(peer = %peer, "Status synchron");
                return;
            }
            tracing::info!(
                peer = %peer,
                eigener_song = eigen.current_song_id,
                fremder_song = fremd.current_song_id,
                "Desync erkannt, verteile eigenen Status"
            );
            self.an_peers_senden(&self.zustand.andere_peers(), &Message::SendStatus(eigen));
            return;
        }

        if self.config.status_nur_vom_koordinator {
            let vom_koordinator = self
                .zustand
                .koordinator()
                .is_some_and(|k| k.adresse == peer.ip());
            if !vom_koordinator {
                tracing::warn!(peer = %peer, "SEND_STATUS nicht vom Koordinator verworfen");
                return;
            }
        }

        self.player.set_status(&fremd);
    }
}

impl SessionHandler for Node {
    fn on_message(&self, empfangen: &[u8], antwort: &mut BytesMut, peer: SocketAddr) -> bool {
        self.nachricht_verarbeiten(empfangen, antwort, peer)
    }
}
