use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::session_manager::SessionManager;

/// Background driver for the idle-session sweep.
pub struct SessionSweeper {
    sessions: Arc<SessionManager>,
    period: Duration,
    cancellation: CancellationToken,
}

impl SessionSweeper {
    pub fn new(
        sessions: Arc<SessionManager>,
        period: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            sessions,
            period,
            cancellation,
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    tracing::info!("session sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    pub(crate) async fn tick(&self) {
        match self.sessions.sweep_expired_if_due().await {
            Ok(Some(expired)) => tracing::debug!(expired, "session sweep completed"),
            Ok(None) => tracing::debug!("session sweep skipped; ran recently"),
            Err(e) => tracing::warn!("session sweep failed: {e}"),
        }
    }
}
