//! Countdown timers, one tokio task each.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Duration must be greater than zero.")]
    ZeroDuration,

    #[error("Duration is too long.")]
    TooLong,

    #[error("Invalid or missing timer_id: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStarted {
    pub timer_id: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTimer {
    pub timer_id: String,
    pub remaining_seconds: u64,
}

struct Entry {
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<String, Entry>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self, hours: u64, minutes: u64, seconds: u64) -> Result<TimerStarted, TimerError> {
        let total = hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds);
        if total == 0 {
            return Err(TimerError::ZeroDuration);
        }

        let deadline = Instant::now()
            .checked_add(Duration::from_secs(total))
            .ok_or(TimerError::TooLong)?;
        let timer_id = Uuid::new_v4().to_string();
        let timers = Arc::clone(&self.timers);
        let id = timer_id.clone();

        let mut map = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            tracing::info!(timer_id = %id, "timer completed");
        });
        map.insert(
            timer_id.clone(),
            Entry { deadline, handle },
        );
        tracing::debug!(timer_id = %timer_id, seconds = total, "timer started");
        Ok(TimerStarted {
            timer_id,
            seconds: total,
        })
    }

    pub fn cancel(&self, timer_id: &str) -> Result<(), TimerError> {
        match self.lock().remove(timer_id) {
            Some(entry) => {
                entry.handle.abort();
                tracing::debug!(timer_id, "timer cancelled");
                Ok(())
            }
            None => Err(TimerError::NotFound(timer_id.to_string())),
        }
    }

    /// Active timers, soonest first.
    pub fn list(&self) -> Vec<ActiveTimer> {
        let now = Instant::now();
        let mut active: Vec<ActiveTimer> = self
            .lock()
            .iter()
            .map(|(id, entry)| ActiveTimer {
                timer_id: id.clone(),
                remaining_seconds: entry.deadline.saturating_duration_since(now).as_secs(),
            })
            .collect();
        active.sort_by(|a, b| {
            a.remaining_seconds
                .cmp(&b.remaining_seconds)
                .then_with(|| a.timer_id.cmp(&b.timer_id))
        });
        active
    }
}
