//! Fehlertypen fuer den Player

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Timer-Thread konnte nicht gestartet werden: {0}")]
    ThreadStart(#[from] std::io::Error),
}

pub type PlayerResult<T> = Result<T, PlayerError>;
