//! PeerRegistry – die massgebliche Peer-Tabelle des Connectors
//!
//! Alle Aenderungen (Einfuegen, Entfernen, Herzschlag) laufen ueber ein
//! einziges Lock und sind damit total geordnet. Nach aussen gehen nur
//! Kopien; das Lock wird vor jedem Versand freigegeben.
//!
//! Jeder Eintrag besitzt das `CancellationToken` seines Klopfers. Es entsteht
//! beim Einfuegen und wird beim Entfernen unter demselben Lock abgebrochen,
//! sodass ein Klopfer nie den Eintrag ueberlebt, fuer den er gestartet wurde.

use gleichklang_core::{Peer, PeerId, PeerTable, MAX_PEERS};
use parking_lot::Mutex;
use rand::Rng;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Versuche, eine freie ID zu ziehen, bevor eine Kollision hingenommen wird
const ID_VERSUCHE: usize = 8;

/// Ergebnis einer Registrierung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registrierung {
    /// Neuer Eintrag wurde angelegt
    Neu(Peer),
    /// Endpunkt war bereits registriert; der bestehende Eintrag gilt
    Bekannt(Peer),
    /// Tabelle ist voll, nichts wurde veraendert
    Voll,
}

impl Registrierung {
    pub fn peer(&self) -> Option<&Peer> {
        match self {
            Self::Neu(p) | Self::Bekannt(p) => Some(p),
            Self::Voll => None,
        }
    }
}

#[derive(Debug)]
struct Eintrag {
    peer: Peer,
    letzter_herzschlag: Instant,
    klopfer: CancellationToken,
}

impl Eintrag {
    fn abbrechen(self) -> Peer {
        self.klopfer.cancel();
        self.peer
    }
}

/// Thread-sichere Peer-Tabelle mit Herzschlag-Zeitstempeln
#[derive(Debug)]
pub struct PeerRegistry {
    eintraege: Mutex<Vec<Eintrag>>,
    max_peers: usize,
    /// Eltern-Token aller Klopfer-Tokens
    wurzel: CancellationToken,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::neu(MAX_PEERS)
    }
}

impl PeerRegistry {
    pub fn neu(max_peers: usize) -> Self {
        Self::mit_wurzel(max_peers, CancellationToken::new())
    }

    /// Klopfer-Tokens werden von `wurzel` abgeleitet
    pub fn mit_wurzel(max_peers: usize, wurzel: CancellationToken) -> Self {
        Self {
            eintraege: Mutex::new(Vec::new()),
            max_peers: max_peers.min(MAX_PEERS),
            wurzel,
        }
    }

    /// Registriert `endpunkt` mit einer zufaelligen ID aus `1..=u16::MAX`
    pub fn registrieren(&self, endpunkt: SocketAddr) -> Registrierung {
        let mut rng = rand::thread_rng();
        self.registrieren_mit(endpunkt, || PeerId(rng.gen_range(1..=u16::MAX)))
    }

    /// Registriert `endpunkt` mit IDs aus `id_ziehen`
    ///
    /// Eine bereits vergebene ID wird bis zu `ID_VERSUCHE` mal neu gezogen;
    /// danach wird die Kollision mit einer Warnung hingenommen.
    pub fn registrieren_mit(
        &self,
        endpunkt: SocketAddr,
        mut id_ziehen: impl FnMut() -> PeerId,
    ) -> Registrierung {
        let mut eintraege = self.eintraege.lock();

        if let Some(e) = eintraege.iter().find(|e| e.peer.gleicher_endpunkt(&endpunkt)) {
            return Registrierung::Bekannt(e.peer.clone());
        }

        if eintraege.len() >= self.max_peers {
            return Registrierung::Voll;
        }

        let mut id = id_ziehen();
        let mut versuche = 1;
        while eintraege.iter().any(|e| e.peer.id == id) {
            if versuche >= ID_VERSUCHE {
                tracing::warn!(id = %id, endpunkt = %endpunkt, "ID-Kollision hingenommen");
                break;
            }
            id = id_ziehen();
            versuche += 1;
        }

        let peer = Peer::neu(endpunkt.ip(), endpunkt.port(), id);
        eintraege.push(Eintrag {
            peer: peer.clone(),
            letzter_herzschlag: Instant::now(),
            klopfer: self.wurzel.child_token(),
        });
        Registrierung::Neu(peer)
    }

    /// Entfernt den Eintrag mit genau diesem Endpunkt und bricht seinen Klopfer ab
    pub fn entfernen(&self, endpunkt: &SocketAddr) -> Option<Peer> {
        let mut eintraege = self.eintraege.lock();
        let index = eintraege
            .iter()
            .position(|e| e.peer.gleicher_endpunkt(endpunkt))?;
        Some(eintraege.remove(index).abbrechen())
    }

    /// Klopfer-Token des aktuellen Eintrags; `None` wenn der Endpunkt fehlt
    pub fn klopfer_token(&self, endpunkt: &SocketAddr) -> Option<CancellationToken> {
        self.eintraege
            .lock()
            .iter()
            .find(|e| e.peer.gleicher_endpunkt(endpunkt))
            .map(|e| e.klopfer.clone())
    }

    /// Erneuert den Herzschlag des Eintrags mit genau diesem Endpunkt
    pub fn herzschlag(&self, endpunkt: &SocketAddr) -> bool {
        let mut eintraege = self.eintraege.lock();
        match eintraege
            .iter_mut()
            .find(|e| e.peer.gleicher_endpunkt(endpunkt))
        {
            Some(e) => {
                e.letzter_herzschlag = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Erneuert den Herzschlag aller Eintraege mit dieser IP
    ///
    /// Gibt die Anzahl erneuerter Eintraege zurueck.
    pub fn herzschlag_von_ip(&self, ip: IpAddr) -> usize {
        let jetzt = Instant::now();
        let mut eintraege = self.eintraege.lock();
        let mut anzahl = 0;
        for e in eintraege.iter_mut().filter(|e| e.peer.adresse == ip) {
            e.letzter_herzschlag = jetzt;
            anzahl += 1;
        }
        anzahl
    }

    /// Entfernt alle Eintraege, deren letzter Herzschlag aelter als `timeout` ist
    pub fn abgelaufene_entfernen(&self, timeout: Duration) -> Vec<Peer> {
        self.abgelaufene_entfernen_zum(Instant::now(), timeout)
    }

    /// Wie `abgelaufene_entfernen`, mit explizitem Zeitpunkt
    pub fn abgelaufene_entfernen_zum(&self, jetzt: Instant, timeout: Duration) -> Vec<Peer> {
        let mut eintraege = self.eintraege.lock();
        let mut entfernt = Vec::new();
        eintraege.retain(|e| {
            let abgelaufen = jetzt.saturating_duration_since(e.letzter_herzschlag) > timeout;
            if abgelaufen {
                e.klopfer.cancel();
                entfernt.push(e.peer.clone());
            }
            !abgelaufen
        });
        entfernt
    }

    /// Kopie der Peer-Liste in Registrierungsreihenfolge
    pub fn snapshot(&self) -> Vec<Peer> {
        self.eintraege.lock().iter().map(|e| e.peer.clone()).collect()
    }

    /// Kopie als `PeerTable` inklusive Koordinator-Hinweis
    pub fn tabelle(&self) -> PeerTable {
        PeerTable::neu(self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn feste_ids(ids: &[u16]) -> impl FnMut() -> PeerId + '_ {
        let mut i = 0;
        move || {
            let id = ids[i.min(ids.len() - 1)];
            i += 1;
            PeerId(id)
        }
    }

    #[test]
    fn registrieren_und_entfernen() {
        let reg = PeerRegistry::default();
        let a = reg.registrieren(addr("10.0.0.1:4001"));
        let b = reg.registrieren(addr("10.0.0.2:4001"));
        assert!(matches!(a, Registrierung::Neu(_)));
        assert!(matches!(b, Registrierung::Neu(_)));
        assert_eq!(reg.len(), 2);

        let entfernt = reg.entfernen(&addr("10.0.0.1:4001")).unwrap();
        assert_eq!(entfernt.adresse, addr("10.0.0.1:4001").ip());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.snapshot()[0].endpunkt(), addr("10.0.0.2:4001"));
    }

    #[test]
    fn zufaellige_ids_sind_nie_null() {
        let reg = PeerRegistry::default();
        for port in 0..MAX_PEERS as u16 {
            let r = reg.registrieren(SocketAddr::new("10.0.0.1".parse().unwrap(), 5000 + port));
            assert_ne!(r.peer().unwrap().id, PeerId(0));
        }
    }

    #[test]
    fn doppelter_endpunkt_bekommt_bestehende_id() {
        let reg = PeerRegistry::default();
        let erst = reg.registrieren_mit(addr("10.0.0.1:4001"), feste_ids(&[10]));
        let zweit = reg.registrieren_mit(addr("10.0.0.1:4001"), feste_ids(&[20]));
        assert_eq!(erst, Registrierung::Neu(Peer::neu("10.0.0.1".parse().unwrap(), 4001, PeerId(10))));
        assert_eq!(zweit.peer().unwrap().id, PeerId(10));
        assert!(matches!(zweit, Registrierung::Bekannt(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn gleiche_ip_anderer_port_ist_eigener_eintrag() {
        let reg = PeerRegistry::default();
        reg.registrieren(addr("10.0.0.1:4001"));
        reg.registrieren(addr("10.0.0.1:4002"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn id_kollision_wird_neu_gezogen() {
        let reg = PeerRegistry::default();
        reg.registrieren_mit(addr("10.0.0.1:4001"), feste_ids(&[7]));
        let r = reg.registrieren_mit(addr("10.0.0.2:4001"), feste_ids(&[7, 7, 9]));
        assert_eq!(r.peer().unwrap().id, PeerId(9));
    }

    #[test]
    fn dauerhafte_kollision_erzeugt_keinen_doppelten_endpunkt() {
        let reg = PeerRegistry::default();
        reg.registrieren_mit(addr("10.0.0.1:4001"), feste_ids(&[7]));
        let r = reg.registrieren_mit(addr("10.0.0.2:4001"), feste_ids(&[7]));
        assert_eq!(r.peer().unwrap().id, PeerId(7));

        let snapshot = reg.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_ne!(snapshot[0].endpunkt(), snapshot[1].endpunkt());
    }

    #[test]
    fn tabelle_ist_begrenzt() {
        let reg = PeerRegistry::neu(2);
        reg.registrieren(addr("10.0.0.1:4001"));
        reg.registrieren(addr("10.0.0.2:4001"));
        assert_eq!(reg.registrieren(addr("10.0.0.3:4001")), Registrierung::Voll);
        assert_eq!(reg.len(), 2);
        // bekannte Endpunkte bleiben auch bei voller Tabelle erreichbar
        assert!(matches!(reg.registrieren(addr("10.0.0.1:4001")), Registrierung::Bekannt(_)));
    }

    #[test]
    fn abgelaufene_werden_entfernt() {
        let reg = PeerRegistry::default();
        reg.registrieren(addr("10.0.0.1:4001"));
        reg.registrieren(addr("10.0.0.2:4001"));

        let spaeter = Instant::now() + Duration::from_secs(4);
        let entfernt = reg.abgelaufene_entfernen_zum(Instant::now(), Duration::from_secs(3));
        assert!(entfernt.is_empty());

        let entfernt = reg.abgelaufene_entfernen_zum(spaeter, Duration::from_secs(3));
        assert_eq!(entfernt.len(), 2);
        assert!(reg.is_empty());
    }

    #[test]
    fn entfernen_bricht_klopfer_token_ab() {
        let reg = PeerRegistry::default();
        reg.registrieren(addr("10.0.0.1:4001"));
        reg.registrieren(addr("10.0.0.2:4001"));
        let a = reg.klopfer_token(&addr("10.0.0.1:4001")).unwrap();
        let b = reg.klopfer_token(&addr("10.0.0.2:4001")).unwrap();
        assert!(!a.is_cancelled());

        reg.entfernen(&addr("10.0.0.1:4001"));
        assert!(a.is_cancelled());
        assert!(reg.klopfer_token(&addr("10.0.0.1:4001")).is_none());

        reg.abgelaufene_entfernen_zum(Instant::now() + Duration::from_secs(4), Duration::from_secs(3));
        assert!(b.is_cancelled());
    }

    #[test]
    fn neuer_eintrag_bekommt_frisches_token() {
        let reg = PeerRegistry::default();
        reg.registrieren(addr("10.0.0.1:4001"));
        let alt = reg.klopfer_token(&addr("10.0.0.1:4001")).unwrap();
        reg.entfernen(&addr("10.0.0.1:4001"));

        reg.registrieren(addr("10.0.0.1:4001"));
        let neu = reg.klopfer_token(&addr("10.0.0.1:4001")).unwrap();
        assert!(alt.is_cancelled());
        assert!(!neu.is_cancelled());
    }

    #[test]
    fn wurzel_bricht_alle_tokens_ab() {
        let wurzel = CancellationToken::new();
        let reg = PeerRegistry::mit_wurzel(MAX_PEERS, wurzel.clone());
        reg.registrieren(addr("10.0.0.1:4001"));
        let token = reg.klopfer_token(&addr("10.0.0.1:4001")).unwrap();
        wurzel.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn herzschlag_von_ip_trifft_alle_ports() {
        let reg = PeerRegistry::default();
        reg.registrieren(addr("10.0.0.1:4001"));
        reg.registrieren(addr("10.0.0.1:4002"));
        reg.registrieren(addr("10.0.0.2:4001"));

        assert_eq!(reg.herzschlag_von_ip("10.0.0.1".parse().unwrap()), 2);
        assert_eq!(reg.herzschlag_von_ip("10.0.0.9".parse().unwrap()), 0);
        assert!(reg.herzschlag(&addr("10.0.0.2:4001")));
        assert!(!reg.herzschlag(&addr("10.0.0.2:4999")));
    }

    #[test]
    fn tabelle_traegt_koordinator_hinweis() {
        let reg = PeerRegistry::default();
        reg.registrieren_mit(addr("10.0.0.1:4001"), feste_ids(&[100]));
        reg.registrieren_mit(addr("10.0.0.2:4001"), feste_ids(&[300]));
        reg.registrieren_mit(addr("10.0.0.3:4001"), feste_ids(&[200]));

        let tabelle = reg.tabelle();
        assert_eq!(tabelle.koordinator_hinweis, PeerId(300));
        assert_eq!(tabelle.peers.len(), 3);
    }
}
