// src/services/geolocation.rs
use async_trait::async_trait;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::{Mutex, PoisonError};

use crate::{errors::ClientError as AppError, models::ride::Coordinate};

/// Device position source. Each call is a one-shot query.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, AppError>;
}

/// Position from configuration, or `GeolocationDenied` when none is set.
#[derive(Debug, Clone, Default)]
pub struct FixedGeolocation {
    position: Option<Coordinate>,
}

impl FixedGeolocation {
    pub fn at(position: Coordinate) -> Self {
        Self {
            position: Some(position),
        }
    }

    pub fn denied() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl GeolocationSource for FixedGeolocation {
    async fn current_position(&self) -> Result<Coordinate, AppError> {
        self.position.ok_or(AppError::GeolocationDenied)
    }
}

/// Replays a sequence of fixes; the last one repeats once the sequence is
/// exhausted.
#[cfg(test)]
pub struct ScriptedGeolocation {
    fixes: Mutex<VecDeque<Result<Coordinate, String>>>,
    last: Mutex<Option<Coordinate>>,
}

#[cfg(test)]
impl ScriptedGeolocation {
    pub fn new(fixes: impl IntoIterator<Item = Result<Coordinate, String>>) -> Self {
        Self {
            fixes: Mutex::new(fixes.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl GeolocationSource for ScriptedGeolocation {
    async fn current_position(&self) -> Result<Coordinate, AppError> {
        let next = self
            .fixes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(Ok(fix)) => {
                *last = Some(fix);
                Ok(fix)
            }
            Some(Err(reason)) => Err(AppError::GeolocationUnavailable(reason)),
            None => last.ok_or(AppError::GeolocationDenied),
        }
    }
}
