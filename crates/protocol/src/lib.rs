//! gleichklang-protocol – Clusterprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichten, die zwischen Membership-Service
//! und Listenern ausgetauscht werden, sowie deren binaeres Wire-Format.

pub mod error;
pub mod message;
pub mod wire;

pub use error::{DecodeError, EncodeError};
pub use message::{
    BullyKind, ChangeSong, ClientList, ControlOperation, Message, MessageType, PlaybackStatus,
    MAX_WARTESCHLANGE,
};
pub use wire::{decode, encode, encode_into, MAX_NACHRICHT_GROESSE};
