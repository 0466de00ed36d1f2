use thiserror::Error;

use crate::host::HostError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("host: {0}")]
    Host(#[from] HostError),
    #[error("MIDI error: {0}")]
    Midi(String),
    #[error("no MIDI port matching {0:?}")]
    PortNotFound(String),
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio error: {0}")]
    Audio(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
