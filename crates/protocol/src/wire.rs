//! Binaeres Wire-Format
//!
//! Jede Nachricht besteht aus einem Typ-Byte und den Feldern der aktiven
//! Variante. Integer sind big-endian, `bool` ist ein Byte (0/1),
//! Zeichenketten und Listen tragen ein `u8`-Laengenpraefix.
//!
//! ## Layout
//!
//! ```text
//! +------+---------------------------------------------+
//! | Typ  | Felder der Variante                         |
//! | 1 B  | fest oder laengenpraefixiert, max. 1023 B   |
//! +------+---------------------------------------------+
//!
//! Peer        = Adresse (u8 Laenge + UTF-8) | Port u16 | ID u16
//! SendStatus  = Song i32 | Elapsed u32 | Pausiert u8 | Anzahl u8 | Anzahl x i32
//! ClientList  = Eigene ID u16 | Koordinator u16 | Anzahl u8 | Anzahl x Peer
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use gleichklang_core::{Peer, PeerId, PeerTable, MAX_PEERS};
use std::net::IpAddr;

use crate::error::{DecodeError, EncodeError};
use crate::message::{
    BullyKind, ChangeSong, ClientList, ControlOperation, Message, MessageType, PlaybackStatus,
    MAX_WARTESCHLANGE,
};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Groesse der festen Lese-/Schreibpuffer pro Austausch
pub const MAX_NACHRICHT_GROESSE: usize = 1024;

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Kodiert eine Nachricht in einen neuen Puffer
pub fn encode(nachricht: &Message) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::with_capacity(64);
    encode_into(nachricht, &mut buf)?;
    Ok(buf.freeze())
}

/// Haengt die kodierte Nachricht an `dst` an
///
/// Bei einem Fehler bleibt `dst` unveraendert.
pub fn encode_into(nachricht: &Message, dst: &mut BytesMut) -> Result<(), EncodeError> {
    let start = dst.len();
    let ergebnis = felder_schreiben(nachricht, dst);

    let groesse = dst.len() - start;
    match ergebnis {
        Ok(()) if groesse <= MAX_NACHRICHT_GROESSE => Ok(()),
        Ok(()) => {
            dst.truncate(start);
            Err(EncodeError::ZuGross {
                groesse,
                maximum: MAX_NACHRICHT_GROESSE,
            })
        }
        Err(e) => {
            dst.truncate(start);
            Err(e)
        }
    }
}

fn felder_schreiben(nachricht: &Message, dst: &mut BytesMut) -> Result<(), EncodeError> {
    dst.put_u8(nachricht.message_type() as u8);

    match nachricht {
        Message::ControlMusic { op } => dst.put_u8(*op as u8),
        Message::ChangeSong(cs) => {
            dst.put_i32(cs.song_id);
            dst.put_u8(cs.add_to_queue as u8);
        }
        Message::Disconnect { listen_port } | Message::Connect { listen_port } => {
            dst.put_u16(*listen_port)
        }
        Message::QueryStatus => {}
        Message::SendStatus(status) => status_schreiben(status, dst)?,
        Message::Bully { kind } => dst.put_u8(*kind as u8),
        Message::ClientList(cl) => {
            dst.put_u16(cl.own_id.inner());
            dst.put_u16(cl.tabelle.koordinator_hinweis.inner());
            peers_schreiben(&cl.tabelle.peers, dst)?;
        }
        Message::ClientListUpdate { peers } => peers_schreiben(peers, dst)?,
    }

    Ok(())
}

fn status_schreiben(status: &PlaybackStatus, dst: &mut BytesMut) -> Result<(), EncodeError> {
    if status.queue.len() > MAX_WARTESCHLANGE {
        return Err(EncodeError::WarteschlangeZuLang(status.queue.len()));
    }
    dst.put_i32(status.current_song_id);
    dst.put_u32(status.elapsed_time);
    dst.put_u8(status.paused as u8);
    dst.put_u8(status.queue.len() as u8);
    for song in &status.queue {
        dst.put_i32(*song);
    }
    Ok(())
}

fn peers_schreiben(peers: &[Peer], dst: &mut BytesMut) -> Result<(), EncodeError> {
    if peers.len() > MAX_PEERS {
        return Err(EncodeError::ZuVielePeers(peers.len()));
    }
    dst.put_u8(peers.len() as u8);
    for peer in peers {
        let adresse = peer.adresse.to_string();
        if adresse.len() > u8::MAX as usize {
            return Err(EncodeError::ZeichenketteZuLang(adresse.len()));
        }
        dst.put_u8(adresse.len() as u8);
        dst.put_slice(adresse.as_bytes());
        dst.put_u16(peer.port);
        dst.put_u16(peer.id.inner());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Dekodiert genau eine Nachricht aus `buf`
///
/// # Fehler
/// - `Leer` / `UnbekannterTyp` wenn das Typ-Byte fehlt oder ungueltig ist
/// - `Abgeschnitten` wenn ein Feld ueber das Pufferende hinausreicht
/// - `UngueltigerWert` bei ungueltigen Enums, Bools oder Adressen
/// - `UeberzaehligeBytes` wenn nach der Nachricht noch Daten folgen
pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
    let (&typ_byte, rest) = buf.split_first().ok_or(DecodeError::Leer)?;
    let typ = MessageType::from_u8(typ_byte).ok_or(DecodeError::UnbekannterTyp(typ_byte))?;
    let mut leser = Leser::neu(rest);

    let nachricht = match typ {
        MessageType::ControlMusic => {
            let byte = leser.u8()?;
            let op = ControlOperation::from_u8(byte)
                .ok_or_else(|| DecodeError::ungueltig(format!("Steuerbefehl {byte}")))?;
            Message::ControlMusic { op }
        }
        MessageType::ChangeSong => Message::ChangeSong(ChangeSong {
            song_id: leser.i32()?,
            add_to_queue: leser.bool()?,
        }),
        MessageType::Disconnect => Message::Disconnect {
            listen_port: leser.u16()?,
        },
        MessageType::Connect => Message::Connect {
            listen_port: leser.u16()?,
        },
        MessageType::QueryStatus => Message::QueryStatus,
        MessageType::SendStatus => Message::SendStatus(status_lesen(&mut leser)?),
        MessageType::Bully => {
            let byte = leser.u8()?;
            let kind = BullyKind::from_u8(byte)
                .ok_or_else(|| DecodeError::ungueltig(format!("Bully-Phase {byte}")))?;
            Message::Bully { kind }
        }
        MessageType::ConnectorList => {
            let own_id = PeerId(leser.u16()?);
            let koordinator_hinweis = PeerId(leser.u16()?);
            let peers = peers_lesen(&mut leser)?;
            Message::ClientList(ClientList {
                own_id,
                tabelle: PeerTable {
                    koordinator_hinweis,
                    peers,
                },
            })
        }
        MessageType::ConnectorListUpdate => Message::ClientListUpdate {
            peers: peers_lesen(&mut leser)?,
        },
    };

    leser.ende()?;
    Ok(nachricht)
}

fn status_lesen(leser: &mut Leser<'_>) -> Result<PlaybackStatus, DecodeError> {
    let current_song_id = leser.i32()?;
    let elapsed_time = leser.u32()?;
    let paused = leser.bool()?;
    let anzahl = leser.u8()? as usize;
    if anzahl > MAX_WARTESCHLANGE {
        return Err(DecodeError::ungueltig(format!("Warteschlangenlaenge {anzahl}")));
    }
    let mut queue = Vec::with_capacity(anzahl);
    for _ in 0..anzahl {
        queue.push(leser.i32()?);
    }
    Ok(PlaybackStatus {
        current_song_id,
        elapsed_time,
        paused,
        queue,
    })
}

fn peers_lesen(leser: &mut Leser<'_>) -> Result<Vec<Peer>, DecodeError> {
    let anzahl = leser.u8()? as usize;
    if anzahl > MAX_PEERS {
        return Err(DecodeError::ungueltig(format!("Peer-Anzahl {anzahl}")));
    }
    let mut peers = Vec::with_capacity(anzahl);
    for _ in 0..anzahl {
        let laenge = leser.u8()? as usize;
        let roh = leser.bytes(laenge)?;
        let text = std::str::from_utf8(roh)
            .map_err(|_| DecodeError::ungueltig("Adresse ist kein UTF-8"))?;
        let adresse: IpAddr = text
            .parse()
            .map_err(|_| DecodeError::ungueltig(format!("Adresse '{text}'")))?;
        let port = leser.u16()?;
        let id = PeerId(leser.u16()?);
        peers.push(Peer::neu(adresse, port, id));
    }
    Ok(peers)
}

// ---------------------------------------------------------------------------
// Leser
// ---------------------------------------------------------------------------

/// Geprueftes Lesen aus einem Slice, jedes Feld prueft die Restlaenge
struct Leser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Leser<'a> {
    fn neu(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let vorhanden = self.buf.len() - self.pos;
        if vorhanden < n {
            return Err(DecodeError::Abgeschnitten {
                benoetigt: n,
                vorhanden,
            });
        }
        let stueck = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(stueck)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bool(&mut self) -> Result<bool, DecodeError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            andere => Err(DecodeError::ungueltig(format!("Bool-Byte {andere}"))),
        }
    }

    fn ende(&self) -> Result<(), DecodeError> {
        match self.buf.len() - self.pos {
            0 => Ok(()),
            rest => Err(DecodeError::UeberzaehligeBytes(rest)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
