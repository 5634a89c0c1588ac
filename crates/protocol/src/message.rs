//! Nachrichten des Clusterprotokolls
//!
//! Geschlossene Summe aller Nachrichtentypen. Genau eine Variante ist pro
//! Instanz aktiv; das Typ-Byte auf dem Draht entspricht `MessageType`.
//!
//! ## Typ-Bytes
//!
//! ```text
//! 0 CONTROL_MUSIC        5 SEND_STATUS
//! 1 CHANGE_SONG          6 BULLY (reserviert, wird nie gesendet)
//! 2 DISCONNECT           7 CONNECTOR_LIST
//! 3 CONNECT              8 CONNECTOR_LIST_UPDATE
//! 4 QUERY_STATUS
//! ```

use gleichklang_core::{Peer, PeerId, PeerTable};

/// Maximale Laenge der Song-Warteschlange
pub const MAX_WARTESCHLANGE: usize = 128;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Typ-Diskriminante, erstes Byte jeder Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ControlMusic = 0,
    ChangeSong = 1,
    Disconnect = 2,
    Connect = 3,
    QueryStatus = 4,
    SendStatus = 5,
    Bully = 6,
    ConnectorList = 7,
    ConnectorListUpdate = 8,
}

impl MessageType {
    /// Konvertiert ein Byte in einen `MessageType`.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::ControlMusic),
            1 => Some(Self::ChangeSong),
            2 => Some(Self::Disconnect),
            3 => Some(Self::Connect),
            4 => Some(Self::QueryStatus),
            5 => Some(Self::SendStatus),
            6 => Some(Self::Bully),
            7 => Some(Self::ConnectorList),
            8 => Some(Self::ConnectorListUpdate),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Steuerung
// ---------------------------------------------------------------------------

/// Wiedergabe-Steuerbefehl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlOperation {
    Start = 1,
    Stop = 2,
    Skip = 3,
}

impl ControlOperation {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Start),
            2 => Some(Self::Stop),
            3 => Some(Self::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Skip => "SKIP",
        };
        f.write_str(name)
    }
}

/// Song-Wechsel bzw. Einreihen in die Warteschlange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSong {
    pub song_id: i32,
    pub add_to_queue: bool,
}

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// Momentaufnahme des Wiedergabezustands eines Peers
///
/// Wird vom Player erzeugt und nur als Kopie ueber das Netz gereicht.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub current_song_id: i32,
    /// Vergangene Zeit im aktuellen Song in Sekunden
    pub elapsed_time: u32,
    pub paused: bool,
    pub queue: Vec<i32>,
}

impl PlaybackStatus {
    /// Vergleicht zwei Zustaende; `elapsed_time` darf um `toleranz_sek` abweichen
    ///
    /// Song, Pause-Zustand und Warteschlange muessen exakt uebereinstimmen.
    pub fn stimmt_ueberein(&self, andere: &PlaybackStatus, toleranz_sek: u32) -> bool {
        self.current_song_id == andere.current_song_id
            && self.paused == andere.paused
            && self.queue == andere.queue
            && self.elapsed_time.abs_diff(andere.elapsed_time) <= toleranz_sek
    }
}

// ---------------------------------------------------------------------------
// Bully (reserviert)
// ---------------------------------------------------------------------------

/// Phasen einer Bully-Wahl; das aktive Protokoll verwendet sie nicht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BullyKind {
    Election = 1,
    Answer = 2,
    Victory = 3,
}

impl BullyKind {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Election),
            2 => Some(Self::Answer),
            3 => Some(Self::Victory),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Peer-Listen
// ---------------------------------------------------------------------------

/// Vollstaendige Tabelle plus die frisch vergebene ID des Empfaengers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientList {
    pub own_id: PeerId,
    pub tabelle: PeerTable,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Alle Nachrichten des Clusterprotokolls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ControlMusic { op: ControlOperation },
    ChangeSong(ChangeSong),
    /// Abmeldung; `listen_port` identifiziert den Tabelleneintrag
    Disconnect { listen_port: u16 },
    /// Anmeldung; `listen_port` ist der Port, auf dem der Listener lauscht
    Connect { listen_port: u16 },
    QueryStatus,
    SendStatus(PlaybackStatus),
    Bully { kind: BullyKind },
    ClientList(ClientList),
    /// Ersetzt nur die Peer-Liste, ID und Hinweis bleiben beim Empfaenger
    ClientListUpdate { peers: Vec<Peer> },
}

impl Message {
    /// Gibt die Typ-Diskriminante der aktiven Variante zurueck
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ControlMusic { .. } => MessageType::ControlMusic,
            Self::ChangeSong(_) => MessageType::ChangeSong,
            Self::Disconnect { .. } => MessageType::Disconnect,
            Self::Connect { .. } => MessageType::Connect,
            Self::QueryStatus => MessageType::QueryStatus,
            Self::SendStatus(_) => MessageType::SendStatus,
            Self::Bully { .. } => MessageType::Bully,
            Self::ClientList(_) => MessageType::ConnectorList,
            Self::ClientListUpdate { .. } => MessageType::ConnectorListUpdate,
        }
    }

    pub fn control(op: ControlOperation) -> Self {
        Self::ControlMusic { op }
    }

    pub fn einreihen(song_id: i32) -> Self {
        Self::ChangeSong(ChangeSong {
            song_id,
            add_to_queue: true,
        })
    }
}
