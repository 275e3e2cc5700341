//! Error types for the fallible edges of the engine (content on disk, config).
//! The engine operations themselves degrade in-band and never return these.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
  #[error("content root {path} is not a readable directory")]
  MissingRoot { path: PathBuf },

  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Toml {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error(transparent)]
  Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Toml {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

/// Request-level failures surfaced to the transport.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unknown step: {0}")]
  UnknownStep(String),

  #[error("unknown subject: {0}")]
  UnknownSubject(String),

  #[error(transparent)]
  Content(#[from] ContentError),
}
