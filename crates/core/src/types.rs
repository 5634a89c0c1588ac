//! Identifikations- und Tabellentypen fuer Gleichklang
//!
//! Peer-IDs verwenden das Newtype-Pattern, damit sie nicht mit Ports oder
//! Song-IDs verwechselt werden koennen.
//!
//! Der Koordinator wird nie gespeichert, sondern aus der Tabelle abgeleitet:
//! der Peer mit der numerisch hoechsten ID. Jeder Knoten berechnet ihn
//! unabhaengig aus seiner letzten bekannten Tabelle.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Maximale Anzahl Peers in einer Tabelle (muss in eine 1024-Byte-Nachricht passen)
pub const MAX_PEERS: usize = 16;

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Vom Membership-Service vergebene Peer-ID (16 Bit)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PeerId(pub u16);

impl PeerId {
    /// Gibt den rohen Zahlenwert zurueck
    pub fn inner(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// Ein Eintrag der Peer-Tabelle
///
/// `port` ist der Listener-Port des Peers, nicht der Quellport der
/// Verbindung, ueber die er sich angemeldet hat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub adresse: IpAddr,
    pub port: u16,
    pub id: PeerId,
}

impl Peer {
    pub fn neu(adresse: IpAddr, port: u16, id: PeerId) -> Self {
        Self { adresse, port, id }
    }

    /// Socket-Adresse, unter der der Peer erreichbar ist
    pub fn endpunkt(&self) -> SocketAddr {
        SocketAddr::new(self.adresse, self.port)
    }

    /// Tabellen-Gleichheit: Adresse und Port, niemals die ID
    pub fn gleicher_endpunkt(&self, endpunkt: &SocketAddr) -> bool {
        self.adresse == endpunkt.ip() && self.port == endpunkt.port()
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.adresse, self.port, self.id)
    }
}

// ---------------------------------------------------------------------------
// PeerTable
// ---------------------------------------------------------------------------

/// Mitgliedschafts-Sicht: Koordinator-Hinweis plus geordnete Peer-Liste
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerTable {
    /// Vom Membership-Service beim Versand berechneter Koordinator
    pub koordinator_hinweis: PeerId,
    pub peers: Vec<Peer>,
}

impl PeerTable {
    pub fn neu(peers: Vec<Peer>) -> Self {
        let mut tabelle = Self {
            koordinator_hinweis: PeerId::default(),
            peers,
        };
        tabelle.koordinator_hinweis = tabelle.koordinator().map(|p| p.id).unwrap_or_default();
        tabelle
    }

    /// Leitet den Koordinator ab: hoechste ID, bei Gleichstand hoechster Endpunkt
    ///
    /// Der Gleichstand-Vergleich haelt die Auswahl auch bei ID-Kollisionen
    /// auf allen Knoten identisch.
    pub fn koordinator(&self) -> Option<&Peer> {
        self.peers
            .iter()
            .max_by(|a, b| (a.id, a.adresse, a.port).cmp(&(b.id, b.adresse, b.port)))
    }

    /// Prueft ob die gegebene ID die Koordinator-ID ist
    pub fn ist_koordinator(&self, id: PeerId) -> bool {
        self.koordinator().is_some_and(|k| k.id == id)
    }

    /// Sucht einen Peer ueber seinen Endpunkt
    pub fn finden(&self, endpunkt: &SocketAddr) -> Option<&Peer> {
        self.peers.iter().find(|p| p.gleicher_endpunkt(endpunkt))
    }

    /// Alle Peers deren ID sich von `id` unterscheidet
    pub fn ausser(&self, id: PeerId) -> impl Iterator<Item = &Peer> {
        self.peers.iter().filter(move |p| p.id != id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn peer(letztes_oktett: u8, port: u16, id: u16) -> Peer {
        Peer::neu(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, letztes_oktett)),
            port,
            PeerId(id),
        )
    }

    #[test]
    fn koordinator_ist_hoechste_id() {
        let tabelle = PeerTable::neu(vec![peer(1, 4001, 17), peer(2, 4001, 900), peer(3, 4001, 5)]);
        assert_eq!(tabelle.koordinator().map(|p| p.id), Some(PeerId(900)));
        assert_eq!(tabelle.koordinator_hinweis, PeerId(900));
        assert!(tabelle.ist_koordinator(PeerId(900)));
        assert!(!tabelle.ist_koordinator(PeerId(17)));
    }

    #[test]
    fn koordinator_unabhaengig_von_reihenfolge() {
        let a = PeerTable::neu(vec![peer(1, 4001, 3), peer(2, 4001, 3), peer(3, 4001, 1)]);
        let b = PeerTable::neu(vec![peer(3, 4001, 1), peer(2, 4001, 3), peer(1, 4001, 3)]);
        // Kollision bei ID 3: beide Sichten waehlen denselben Endpunkt
        assert_eq!(a.koordinator(), b.koordinator());
        assert_eq!(a.koordinator().map(|p| p.adresse.to_string()), Some("10.0.0.2".into()));
    }

    #[test]
    fn leere_tabelle_hat_keinen_koordinator() {
        let tabelle = PeerTable::default();
        assert!(tabelle.koordinator().is_none());
        assert!(!tabelle.ist_koordinator(PeerId(0)));
    }

    #[test]
    fn endpunkt_gleichheit_ignoriert_id() {
        let p = peer(1, 4001, 10);
        assert!(p.gleicher_endpunkt(&"10.0.0.1:4001".parse().unwrap()));
        assert!(!p.gleicher_endpunkt(&"10.0.0.1:4002".parse().unwrap()));
    }

    #[test]
    fn ausser_filtert_nach_id() {
        let tabelle = PeerTable::neu(vec![peer(1, 4001, 1), peer(2, 4001, 2)]);
        let andere: Vec<_> = tabelle.ausser(PeerId(2)).collect();
        assert_eq!(andere.len(), 1);
        assert_eq!(andere[0].id, PeerId(1));
    }

    #[test]
    fn peer_tabelle_ist_serde_kompatibel() {
        let tabelle = PeerTable::neu(vec![peer(1, 4001, 42)]);
        let json = serde_json::to_string(&tabelle).unwrap();
        let zurueck: PeerTable = serde_json::from_str(&json).unwrap();
        assert_eq!(tabelle, zurueck);
    }
}
