//! MusicPlayer – Besitzer des lokalen Wiedergabezustands
//!
//! Der Zustand liegt hinter einem `parking_lot::Mutex`. Der Timer-Thread
//! und alle Befehle serialisieren auf diesem Lock. Gewartet wird ueber eine
//! `Condvar`, die bei jeder Zustandsaenderung geweckt wird (Pause, neue
//! Songs in der Warteschlange, Stopp).
//!
//! Die Epoche zaehlt jede Aenderung, die den laufenden Tick ungueltig macht
//! (Songwechsel, `set_status`, Fortsetzen nach Pause). Ein Tick zaehlt nur,
//! wenn er vollstaendig innerhalb derselben Epoche abgelaufen ist.

use gleichklang_protocol::{PlaybackStatus, MAX_WARTESCHLANGE};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::PlayerResult;
use crate::songs;

/// Konfiguration des Players
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Song, mit dem die Wiedergabe beginnt
    pub start_song: i32,
    /// Dauer einer Zeiteinheit von `elapsed_time`
    pub tick: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_song: 1,
            tick: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Zustand {
    song_id: i32,
    elapsed: u32,
    paused: bool,
    queue: VecDeque<i32>,
    epoche: u64,
    /// Song ist zu Ende und die Warteschlange war leer
    wartet_auf_song: bool,
}

impl Zustand {
    /// Wechselt zum Kopf der Warteschlange; `false` wenn sie leer ist
    fn naechster_aus_warteschlange(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(id) => {
                self.song_id = id;
                self.elapsed = 0;
                self.epoche += 1;
                self.wartet_auf_song = false;
                info!(song_id = id, "Neuer Song");
                true
            }
            None => false,
        }
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            current_song_id: self.song_id,
            elapsed_time: self.elapsed,
            paused: self.paused,
            queue: self.queue.iter().copied().collect(),
        }
    }
}

struct Geteilt {
    zustand: Mutex<Zustand>,
    signal: Condvar,
    stopp: AtomicBool,
}

impl Geteilt {
    fn wecken(&self) {
        self.signal.notify_all();
    }
}

// ---------------------------------------------------------------------------
// MusicPlayer
// ---------------------------------------------------------------------------

/// Wiedergabe-Zustandsmaschine mit eigenem Timer-Thread
///
/// Kein async-Typ: der Timer laeuft in einem benannten std-Thread. Alle
/// Methoden sind kurz und blockieren nur fuer die Dauer des Locks.
pub struct MusicPlayer {
    geteilt: Arc<Geteilt>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MusicPlayer {
    /// Erstellt den Player und startet den Timer-Thread
    pub fn neu(config: PlayerConfig) -> PlayerResult<Self> {
        let geteilt = Arc::new(Geteilt {
            zustand: Mutex::new(Zustand {
                song_id: config.start_song,
                elapsed: 0,
                paused: false,
                queue: VecDeque::with_capacity(MAX_WARTESCHLANGE),
                epoche: 0,
                wartet_auf_song: false,
            }),
            signal: Condvar::new(),
            stopp: AtomicBool::new(false),
        });

        let geteilt_clone = Arc::clone(&geteilt);
        let tick = config.tick;
        let handle = std::thread::Builder::new()
            .name("gleichklang-player".to_string())
            .spawn(move || timer_thread(geteilt_clone, tick))?;

        info!(start_song = config.start_song, ?tick, "MusicPlayer gestartet");

        Ok(Self {
            geteilt,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Unveraenderliche Momentaufnahme; das Lock ist danach wieder frei
    pub fn get_status(&self) -> PlaybackStatus {
        self.geteilt.zustand.lock().status()
    }

    /// Ueberschreibt alle vier Felder atomar
    ///
    /// Eine zu lange Warteschlange wird auf `MAX_WARTESCHLANGE` gekuerzt.
    pub fn set_status(&self, status: &PlaybackStatus) {
        {
            let mut z = self.geteilt.zustand.lock();
            z.song_id = status.current_song_id;
            z.elapsed = status.elapsed_time;
            z.paused = status.paused;
            z.queue = status.queue.iter().copied().take(MAX_WARTESCHLANGE).collect();
            z.epoche += 1;
            z.wartet_auf_song = false;
        }
        self.geteilt.wecken();
        debug!(song_id = status.current_song_id, elapsed = status.elapsed_time, "Status uebernommen");
    }

    /// Wechselt zwischen Playing und Paused, `elapsed` bleibt erhalten
    ///
    /// Gibt den neuen Pause-Zustand zurueck.
    pub fn toggle_pause(&self) -> bool {
        let paused = {
            let mut z = self.geteilt.zustand.lock();
            z.paused = !z.paused;
            if !z.paused {
                z.epoche += 1;
            }
            z.paused
        };
        self.geteilt.wecken();
        info!(paused, "Pause umgeschaltet");
        paused
    }

    /// Setzt den Pause-Zustand; Pruefen und Setzen unter einem Lock
    ///
    /// Gibt `true` zurueck, wenn sich der Zustand geaendert hat.
    pub fn pause_setzen(&self, pausiert: bool) -> bool {
        let geaendert = {
            let mut z = self.geteilt.zustand.lock();
            if z.paused == pausiert {
                false
            } else {
                z.paused = pausiert;
                if !pausiert {
                    z.epoche += 1;
                }
                true
            }
        };
        if geaendert {
            self.geteilt.wecken();
            info!(paused = pausiert, "Pause gesetzt");
        }
        geaendert
    }

    pub fn ist_pausiert(&self) -> bool {
        self.geteilt.zustand.lock().paused
    }

    /// Springt zum naechsten Song der Warteschlange
    ///
    /// Bei leerer Warteschlange passiert nichts; Rueckgabe `false`.
    pub fn skip(&self) -> bool {
        let gesprungen = self.geteilt.zustand.lock().naechster_aus_warteschlange();
        if gesprungen {
            self.geteilt.wecken();
        } else {
            debug!("Warteschlange leer, skip ignoriert");
        }
        gesprungen
    }

    /// Haengt einen Song an die Warteschlange an
    ///
    /// Ist die Warteschlange voll, wird der Song verworfen (`false`).
    pub fn add_to_queue(&self, song_id: i32) -> bool {
        let angenommen = {
            let mut z = self.geteilt.zustand.lock();
            if z.queue.len() < MAX_WARTESCHLANGE {
                z.queue.push_back(song_id);
                true
            } else {
                false
            }
        };
        if angenommen {
            self.geteilt.wecken();
            debug!(song_id, "Song eingereiht");
        } else {
            debug!(song_id, max = MAX_WARTESCHLANGE, "Warteschlange voll, Song verworfen");
        }
        angenommen
    }

    /// Setzt die vergangene Zeit im aktuellen Song
    pub fn set_elapsed(&self, sekunden: u32) {
        {
            let mut z = self.geteilt.zustand.lock();
            z.elapsed = sekunden;
            z.epoche += 1;
        }
        self.geteilt.wecken();
        debug!(elapsed = sekunden, "Position geaendert");
    }

    /// `true`, solange der Player auf einen neuen Song wartet
    pub fn wartet_auf_song(&self) -> bool {
        self.geteilt.zustand.lock().wartet_auf_song
    }

    /// Stoppt den Timer-Thread und wartet auf sein Ende
    ///
    /// Mehrfache Aufrufe sind harmlos.
    pub fn stop(&self) {
        self.geteilt.stopp.store(true, Ordering::SeqCst);
        {
            // Lock nehmen, damit der Thread nicht zwischen Pruefung und Warten geweckt wird
            let _z = self.geteilt.zustand.lock();
            self.geteilt.wecken();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Timer-Thread ist abgestuerzt");
            }
            info!("MusicPlayer gestoppt");
        }
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Timer-Thread
// ---------------------------------------------------------------------------

fn timer_thread(geteilt: Arc<Geteilt>, tick: Duration) {
    let mut z = geteilt.zustand.lock();
    // (Epoche, Faelligkeit des naechsten Ticks)
    let mut laufender_tick: Option<(u64, Instant)> = None;

    loop {
        if geteilt.stopp.load(Ordering::SeqCst) {
            return;
        }

        if z.paused {
            laufender_tick = None;
            geteilt.signal.wait(&mut z);
            continue;
        }

        if z.wartet_auf_song {
            if !z.naechster_aus_warteschlange() {
                geteilt.signal.wait(&mut z);
            }
            continue;
        }

        let dauer = match songs::dauer(z.song_id) {
            Some(d) => d,
            None => {
                debug!(song_id = z.song_id, "Unbekannter Song, wird uebersprungen");
                song_beendet(&mut z);
                continue;
            }
        };

        let faellig = match laufender_tick {
            Some((epoche, faellig)) if epoche == z.epoche => faellig,
            _ => Instant::now() + tick,
        };
        laufender_tick = Some((z.epoche, faellig));

        if Instant::now() < faellig {
            let _ = geteilt.signal.wait_until(&mut z, faellig);
            continue;
        }

        laufender_tick = Some((z.epoche, faellig + tick));
        z.elapsed = z.elapsed.saturating_add(1);
        if z.elapsed > dauer {
            z.elapsed = dauer;
            song_beendet(&mut z);
        }
    }
}

fn song_beendet(z: &mut Zustand) {
    if !z.naechster_aus_warteschlange() {
        info!(song_id = z.song_id, "Warteschlange leer, warte auf neuen Song");
        z.wartet_auf_song = true;
    }
}
