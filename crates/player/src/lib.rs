//! gleichklang-player – Wiedergabe-Zustandsmaschine
//!
//! Simuliert die Wiedergabe ohne Audio-Ausgabe: ein Timer-Thread zaehlt
//! die vergangene Zeit des aktuellen Songs hoch und wechselt am Songende
//! zum naechsten Eintrag der Warteschlange.
//!
//! ```text
//!            toggle_pause
//!   Playing <------------> Paused
//!      |
//!      | Songende / skip / next_song
//!      v
//!   Warteschlange leer? -- ja --> wartet auf add_to_queue
//! ```

pub mod error;
pub mod player;
pub mod songs;

pub use error::{PlayerError, PlayerResult};
pub use player::{MusicPlayer, PlayerConfig};
pub use songs::Song;
