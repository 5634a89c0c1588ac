//! Fehlertypen fuer den Wire-Codec

use thiserror::Error;

/// Fehler beim Dekodieren eines Empfangspuffers
///
/// Betrifft immer nur den einen Austausch, nie den Prozess.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Leerer Puffer, kein Typ-Byte vorhanden
    #[error("Leerer Puffer")]
    Leer,

    /// Typ-Byte ist keinem Nachrichtentyp zugeordnet
    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(u8),

    /// Puffer endet vor dem naechsten Feld
    #[error("Nachricht abgeschnitten: {benoetigt} Bytes benoetigt, {vorhanden} vorhanden")]
    Abgeschnitten { benoetigt: usize, vorhanden: usize },

    /// Feldwert ausserhalb des gueltigen Bereichs
    #[error("Ungueltiger Wert: {0}")]
    UngueltigerWert(String),

    /// Nach der Nachricht folgen weitere Bytes
    #[error("{0} ueberzaehlige Bytes nach der Nachricht")]
    UeberzaehligeBytes(usize),
}

impl DecodeError {
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigerWert(msg.into())
    }
}

/// Fehler beim Kodieren einer Nachricht
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Kodierte Nachricht ueberschreitet die feste Puffergroesse
    #[error("Nachricht zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    #[error("Zu viele Peers: {0}")]
    ZuVielePeers(usize),

    #[error("Warteschlange zu lang: {0}")]
    WarteschlangeZuLang(usize),

    /// Zeichenkette laenger als 255 Bytes
    #[error("Zeichenkette zu lang: {0} Bytes")]
    ZeichenketteZuLang(usize),
}
