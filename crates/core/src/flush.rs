use std::{sync::Arc, time::Duration};

use {
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::controller::IntakeController;

/// Timer driving batch flushes.
///
/// The interval must exceed the longest gap between messages of one send,
/// otherwise a group is split across two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSchedule {
    pub first_delay: Duration,
    pub interval: Duration,
}

impl Default for FlushSchedule {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(3),
            interval: Duration::from_secs(2),
        }
    }
}

/// Spawn the periodic flush task.
///
/// Ticks that fall behind are delayed rather than bursted. When `cancel`
/// fires, every open group is flushed one last time before the task ends.
pub fn spawn_flush_loop(
    controller: Arc<IntakeController>,
    schedule: FlushSchedule,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = schedule.interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        info!(
            first_delay_ms = schedule.first_delay.as_millis() as u64,
            interval_ms = period.as_millis() as u64,
            "starting flush loop"
        );
        let start = tokio::time::Instant::now() + schedule.first_delay;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let reports = controller.flush_all().await;
                    info!(flushed = reports.len(), "flush loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let reports = controller.flush().await;
                    if !reports.is_empty() {
                        debug!(processed = reports.len(), "flush tick");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            controller::ControllerSettings,
            testing::{MemoryLedger, MemoryStorage, RecordingTransport, photo},
        },
    };

    fn controller(ledger: Arc<MemoryLedger>) -> Arc<IntakeController> {
        Arc::new(IntakeController::new(
            ControllerSettings {
                parent_folder_id: "root".into(),
                quiet_period: Duration::ZERO,
            },
            Arc::new(RecordingTransport::default()),
            Arc::new(MemoryStorage::default()),
            ledger,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_group_is_processed_on_first_tick() {
        let ledger = Arc::new(MemoryLedger::default());
        let controller = controller(ledger.clone());
        let cancel = CancellationToken::new();
        let handle = spawn_flush_loop(
            Arc::clone(&controller),
            FlushSchedule::default(),
            cancel.clone(),
        );

        controller
            .handle(photo(1, Some("g"), Some("ID001 John Smith")))
            .await
            .unwrap();
        controller.handle(photo(2, Some("g"), None)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(controller.open_batches(), 1, "not flushed before first tick");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.open_batches(), 0);
        assert_eq!(ledger.rows().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_flushes_what_is_left() {
        let ledger = Arc::new(MemoryLedger::default());
        let controller = controller(ledger.clone());
        let cancel = CancellationToken::new();
        let handle = spawn_flush_loop(
            Arc::clone(&controller),
            FlushSchedule {
                first_delay: Duration::from_secs(60),
                interval: Duration::from_secs(60),
            },
            cancel.clone(),
        );

        controller
            .handle(photo(1, Some("g"), Some("ID001 John Smith")))
            .await
            .unwrap();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(controller.open_batches(), 0);
        assert_eq!(ledger.rows().len(), 1);
    }
}
