//! NodeState – die Mitgliedschafts-Sicht eines Knotens

use gleichklang_core::{Peer, PeerId, PeerTable};
use gleichklang_protocol::ClientList;
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct Sicht {
    /// `None` bis zur ersten ClientList
    eigene_id: Option<PeerId>,
    tabelle: PeerTable,
}

/// Zuletzt empfangene Peer-Tabelle plus eigene ID
///
/// Der Koordinator wird bei jeder Abfrage aus der aktuellen Peer-Liste
/// abgeleitet, nicht aus dem mitgesendeten Hinweis.
#[derive(Debug, Default)]
pub struct NodeState {
    sicht: RwLock<Sicht>,
}

impl NodeState {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Uebernimmt eine vollstaendige ClientList (eigene ID, Hinweis, Peers)
    pub fn client_list_uebernehmen(&self, liste: ClientList) {
        let mut sicht = self.sicht.write();
        sicht.eigene_id = Some(liste.own_id);
        sicht.tabelle = liste.tabelle;
    }

    /// Ersetzt nur die Peer-Liste; eigene ID und Hinweis bleiben
    pub fn peers_ersetzen(&self, peers: Vec<Peer>) {
        self.sicht.write().tabelle.peers = peers;
    }

    /// Vergisst ID und Tabelle (nach der Abmeldung)
    pub fn zuruecksetzen(&self) {
        *self.sicht.write() = Sicht::default();
    }

    pub fn eigene_id(&self) -> Option<PeerId> {
        self.sicht.read().eigene_id
    }

    pub fn ist_registriert(&self) -> bool {
        self.sicht.read().eigene_id.is_some()
    }

    /// Kopie der aktuellen Tabelle
    pub fn tabelle(&self) -> PeerTable {
        self.sicht.read().tabelle.clone()
    }

    pub fn koordinator(&self) -> Option<Peer> {
        self.sicht.read().tabelle.koordinator().cloned()
    }

    pub fn ist_koordinator(&self) -> bool {
        let sicht = self.sicht.read();
        sicht
            .eigene_id
            .is_some_and(|id| sicht.tabelle.ist_koordinator(id))
    }

    /// Alle Peers ausser diesem Knoten
    pub fn andere_peers(&self) -> Vec<Peer> {
        let sicht = self.sicht.read();
        match sicht.eigene_id {
            Some(id) => sicht.tabelle.ausser(id).cloned().collect(),
            None => sicht.tabelle.peers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(oktett: u8, id: u16) -> Peer {
        Peer::neu(format!("10.0.0.{oktett}").parse().unwrap(), 43210, PeerId(id))
    }

    fn liste(own: u16, peers: Vec<Peer>) -> ClientList {
        ClientList {
            own_id: PeerId(own),
            tabelle: PeerTable::neu(peers),
        }
    }

    #[test]
    fn unregistriert_ist_nie_koordinator() {
        let state = NodeState::neu();
        assert!(!state.ist_registriert());
        assert!(!state.ist_koordinator());
        assert!(state.koordinator().is_none());
        assert!(state.andere_peers().is_empty());
    }

    #[test]
    fn hoechste_id_ist_koordinator() {
        let a = NodeState::neu();
        let b = NodeState::neu();
        let peers = vec![peer(1, 9), peer(2, 5)];
        a.client_list_uebernehmen(liste(9, peers.clone()));
        b.client_list_uebernehmen(liste(5, peers));

        assert!(a.ist_koordinator());
        assert!(!b.ist_koordinator());
        assert_eq!(b.koordinator().unwrap().id, PeerId(9));
        assert_eq!(b.andere_peers(), vec![peer(1, 9)]);
    }

    #[test]
    fn update_behaelt_id_und_hinweis() {
        let state = NodeState::neu();
        state.client_list_uebernehmen(liste(5, vec![peer(1, 9), peer(2, 5)]));
        let hinweis = state.tabelle().koordinator_hinweis;

        // Koordinator verlaesst den Cluster
        state.peers_ersetzen(vec![peer(2, 5)]);
        assert_eq!(state.eigene_id(), Some(PeerId(5)));
        assert_eq!(state.tabelle().koordinator_hinweis, hinweis);
        assert!(state.ist_koordinator());
    }

    #[test]
    fn zuruecksetzen_vergisst_alles() {
        let state = NodeState::neu();
        state.client_list_uebernehmen(liste(5, vec![peer(2, 5)]));
        state.zuruecksetzen();
        assert!(!state.ist_registriert());
        assert!(state.tabelle().is_empty());
    }
}
