//! Distributed tracing setup.
//!
//! The tracing directory is a mounted config map with one file per key:
//! `backend` (`zipkin` or `none`), `zipkin-endpoint` and `sample-rate`.
//! A missing directory or missing keys mean tracing stays disabled.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::lifecycle::resource::{CloseError, CloseStage, ResourceHandle};

const BACKEND_KEY: &str = "backend";
const ENDPOINT_KEY: &str = "zipkin-endpoint";
const SAMPLE_RATE_KEY: &str = "sample-rate";
const DEFAULT_SAMPLE_RATE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to read tracing setting {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown tracing backend {0:?}")]
    UnknownBackend(String),

    #[error("zipkin backend requires a zipkin-endpoint")]
    MissingEndpoint,

    #[error("sample-rate {0:?} must be a number between 0 and 1")]
    SampleRate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingBackend {
    None,
    Zipkin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    pub backend: TracingBackend,
    pub endpoint: Option<String>,
    pub sample_rate: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            backend: TracingBackend::None,
            endpoint: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl TracingConfig {
    pub fn from_dir(dir: &Path) -> Result<Self, TracingError> {
        let backend = match read_key(dir, BACKEND_KEY)?.as_deref() {
            None | Some("") | Some("none") => TracingBackend::None,
            Some("zipkin") => TracingBackend::Zipkin,
            Some(other) => return Err(TracingError::UnknownBackend(other.to_string())),
        };

        let endpoint = read_key(dir, ENDPOINT_KEY)?.filter(|e| !e.is_empty());
        if backend == TracingBackend::Zipkin && endpoint.is_none() {
            return Err(TracingError::MissingEndpoint);
        }

        let sample_rate = match read_key(dir, SAMPLE_RATE_KEY)? {
            None => DEFAULT_SAMPLE_RATE,
            Some(raw) => match raw.parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
                _ => return Err(TracingError::SampleRate(raw)),
            },
        };

        Ok(Self {
            backend,
            endpoint,
            sample_rate,
        })
    }

    /// Build the process tracer provider.
    pub fn setup(&self) -> TracerProvider {
        match self.backend {
            TracingBackend::None => tracing::info!("Tracing disabled"),
            TracingBackend::Zipkin => tracing::info!(
                endpoint = self.endpoint.as_deref().unwrap_or_default(),
                sample_rate = self.sample_rate,
                "Tracing enabled"
            ),
        }
        TracerProvider {
            config: self.clone(),
        }
    }
}

fn read_key(dir: &Path, key: &str) -> Result<Option<String>, TracingError> {
    let path = dir.join(key);
    match fs::read_to_string(&path) {
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TracingError::Io { path, source }),
    }
}

/// Process-wide tracer provider; flushed on close.
pub struct TracerProvider {
    config: TracingConfig,
}

impl ResourceHandle for TracerProvider {
    fn name(&self) -> &str {
        "tracer-provider"
    }

    fn stage(&self) -> CloseStage {
        CloseStage::Infrastructure
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            if self.config.backend == TracingBackend::Zipkin {
                tracing::info!(
                    endpoint = self.config.endpoint.as_deref().unwrap_or_default(),
                    "Tracer provider flushed"
                );
            }
            Ok(())
        })
    }
}
