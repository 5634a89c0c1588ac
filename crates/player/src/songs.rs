//! Statischer Song-Katalog
//!
//! Es gibt keine Audiodaten; ein Song besteht nur aus Metadaten und einer
//! festen Laufzeit in Sekunden.

use serde::Serialize;

/// Metadaten eines Songs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i32,
    pub kuenstler: &'static str,
    pub titel: &'static str,
    /// Laufzeit in Sekunden
    pub dauer_sek: u32,
}

pub const KATALOG: &[Song] = &[
    Song { id: 1, kuenstler: "Die Gleichtakter", titel: "Metronom im Regen", dauer_sek: 15 },
    Song { id: 2, kuenstler: "Nachbars Katze", titel: "Fensterbrett-Serenade", dauer_sek: 20 },
    Song { id: 3, kuenstler: "Quarzuhr Quartett", titel: "Synchron", dauer_sek: 42 },
    Song { id: 4, kuenstler: "Paketverlust", titel: "Drei Sekunden Stille", dauer_sek: 30 },
    Song { id: 5, kuenstler: "Die Gleichtakter", titel: "Koordinatorwahl", dauer_sek: 95 },
    Song { id: 6, kuenstler: "Halbduplex", titel: "Antwort bis EOF", dauer_sek: 64 },
    Song { id: 7, kuenstler: "Kurzwelle", titel: "Pausenzeichen", dauer_sek: 3 },
];

/// Sucht einen Song im Katalog
pub fn finden(id: i32) -> Option<&'static Song> {
    KATALOG.iter().find(|s| s.id == id)
}

/// Laufzeit eines Songs; `None` fuer unbekannte IDs
pub fn dauer(id: i32) -> Option<u32> {
    finden(id).map(|s| s.dauer_sek)
}
