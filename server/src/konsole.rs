//! Konsolensteuerung eines Knotens
//!
//! Liest Befehle zeilenweise von stdin und leitet sie an den [`Node`] weiter.

use gleichklang_listener::Node;
use gleichklang_protocol::ControlOperation;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ein Konsolenbefehl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Befehl {
    /// Pause umschalten
    Pause,
    Start,
    Stop,
    Skip,
    Add(i32),
    Status,
    /// Erneut beim Connector anmelden
    Registrieren,
    Hilfe,
    Beenden,
}

/// Fehler beim Zerlegen einer Eingabezeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BefehlFehler {
    Leer,
    Unbekannt(String),
    FehlendeSongId,
    UngueltigeSongId(String),
}

impl fmt::Display for BefehlFehler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leer => f.write_str("leere Eingabe"),
            Self::Unbekannt(b) => write!(f, "unbekannter Befehl '{b}' (hilfe zeigt alle Befehle)"),
            Self::FehlendeSongId => f.write_str("add erwartet eine Song-ID"),
            Self::UngueltigeSongId(s) => write!(f, "'{s}' ist keine gueltige Song-ID"),
        }
    }
}

impl std::error::Error for BefehlFehler {}

impl FromStr for Befehl {
    type Err = BefehlFehler;

    fn from_str(zeile: &str) -> Result<Self, Self::Err> {
        let mut teile = zeile.split_whitespace();
        let Some(kopf) = teile.next() else {
            return Err(BefehlFehler::Leer);
        };
        let befehl = match kopf.to_ascii_lowercase().as_str() {
            "pause" | "p" => Self::Pause,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "skip" | "next" | "n" => Self::Skip,
            "add" | "a" => {
                let arg = teile.next().ok_or(BefehlFehler::FehlendeSongId)?;
                let id = arg
                    .parse::<i32>()
                    .map_err(|_| BefehlFehler::UngueltigeSongId(arg.to_string()))?;
                Self::Add(id)
            }
            "status" | "s" => Self::Status,
            "register" | "registrieren" => Self::Registrieren,
            "hilfe" | "help" | "?" => Self::Hilfe,
            "quit" | "exit" | "q" => Self::Beenden,
            andere => return Err(BefehlFehler::Unbekannt(andere.to_string())),
        };
        Ok(befehl)
    }
}

pub const HILFE: &str = "\
Befehle:
  pause          Pause umschalten
  start | stop   Wiedergabe fortsetzen bzw. anhalten
  skip           naechster Song aus der Warteschlange
  add <id>       Song einreihen
  status         aktuellen Zustand anzeigen
  register       erneut beim Connector anmelden
  quit           abmelden und beenden";

/// Ergebnis eines ausgefuehrten Befehls
#[derive(Debug, PartialEq, Eq)]
pub enum Fortsetzung {
    Weiter,
    Ende,
}

/// Fuehrt einen Befehl gegen den Knoten aus
pub async fn ausfuehren(befehl: Befehl, node: &Node, connector: SocketAddr) -> Fortsetzung {
    match befehl {
        Befehl::Pause => node.pause_umschalten(),
        Befehl::Start => node.steuern(ControlOperation::Start),
        Befehl::Stop => node.steuern(ControlOperation::Stop),
        Befehl::Skip => node.ueberspringen(),
        Befehl::Add(id) => {
            if !node.song_einreihen(id) {
                println!("Warteschlange voll, Song {id} nicht eingereiht");
            }
        }
        Befehl::Status => println!("{}", node.anzeige()),
        Befehl::Registrieren => match node.registrieren(connector).await {
            Ok(()) => println!("registriert"),
            Err(e) => println!("Registrierung fehlgeschlagen: {e}"),
        },
        Befehl::Hilfe => println!("{HILFE}"),
        Befehl::Beenden => return Fortsetzung::Ende,
    }
    Fortsetzung::Weiter
}

/// Liest stdin bis `quit` oder Eingabeende
pub async fn schleife(node: &Node, connector: SocketAddr) {
    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let zeile = match zeilen.next_line().await {
            Ok(Some(z)) => z,
            Ok(None) => {
                tracing::debug!("stdin geschlossen");
                // ohne Konsole laeuft der Knoten bis Ctrl-C weiter
                std::future::pending::<()>().await;
                return;
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "stdin nicht lesbar");
                std::future::pending::<()>().await;
                return;
            }
        };

        match zeile.parse::<Befehl>() {
            Ok(befehl) => {
                if ausfuehren(befehl, node, connector).await == Fortsetzung::Ende {
                    return;
                }
            }
            Err(BefehlFehler::Leer) => {}
            Err(e) => println!("{e}"),
        }
    }
}
