//! Anzeige – lesende Momentaufnahme fuer eine Oberflaeche oder das Log

use gleichklang_core::{Peer, PeerId};
use gleichklang_player::songs;
use gleichklang_protocol::PlaybackStatus;
use serde::Serialize;
use std::fmt;

use crate::state::NodeState;

/// Alles, was eine Oberflaeche zur Darstellung braucht
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anzeige {
    pub song_id: i32,
    /// "Kuenstler - Titel", bei unbekannten Songs die ID
    pub song_name: String,
    pub elapsed_sek: u32,
    pub dauer_sek: Option<u32>,
    /// Fortschritt im Song zwischen 0.0 und 1.0
    pub fortschritt: f32,
    pub paused: bool,
    pub wartet_auf_song: bool,
    pub queue: Vec<i32>,
    pub peers: Vec<Peer>,
    pub eigene_id: Option<PeerId>,
    pub koordinator: Option<PeerId>,
}

impl Anzeige {
    pub(crate) fn erstellen(status: &PlaybackStatus, wartet_auf_song: bool, zustand: &NodeState) -> Self {
        let song = songs::finden(status.current_song_id);
        let song_name = match song {
            Some(s) => format!("{} - {}", s.kuenstler, s.titel),
            None => format!("Song {}", status.current_song_id),
        };
        let dauer_sek = song.map(|s| s.dauer_sek);
        let fortschritt = match dauer_sek {
            Some(d) if d > 0 => (status.elapsed_time as f32 / d as f32).clamp(0.0, 1.0),
            _ => 0.0,
        };
        let tabelle = zustand.tabelle();

        Self {
            song_id: status.current_song_id,
            song_name,
            elapsed_sek: status.elapsed_time,
            dauer_sek,
            fortschritt,
            paused: status.paused,
            wartet_auf_song,
            queue: status.queue.clone(),
            koordinator: tabelle.koordinator().map(|k| k.id),
            peers: tabelle.peers,
            eigene_id: zustand.eigene_id(),
        }
    }
}

impl fmt::Display for Anzeige {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zustand = if self.wartet_auf_song {
            "wartet"
        } else if self.paused {
            "pausiert"
        } else {
            "spielt"
        };
        write!(
            f,
            "[{zustand}] {} {:02}:{:02}",
            self.song_name,
            self.elapsed_sek / 60,
            self.elapsed_sek % 60
        )?;
        if let Some(d) = self.dauer_sek {
            write!(f, "/{:02}:{:02}", d / 60, d % 60)?;
        }
        write!(f, " | Warteschlange: {:?} | Peers: {}", self.queue, self.peers.len())?;
        match (self.eigene_id, self.koordinator) {
            (Some(id), Some(k)) if id == k => write!(f, " | {id} (Koordinator)"),
            (Some(id), Some(k)) => write!(f, " | {id}, Koordinator {k}"),
            _ => write!(f, " | nicht registriert"),
        }
    }
}
