//! Reminder delivery loop.
//!
//! Polls `due_reminders` on an interval, hands each reminder to a
//! `ReminderDispatcher` and records `sent` or `failed`. No retries: a
//! failed reminder stays failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::core_state::{CoreError, CoreState};
use crate::models::Reminder;
use crate::notify::{MessageSink, Notification};

/// Channel sender (email, SMS, push, WhatsApp) owned outside the engine.
pub trait ReminderDispatcher: Send + Sync {
    /// Deliver one reminder. `Err` carries the failure reason to record.
    fn dispatch(&self, reminder: &Reminder) -> Result<(), String>;
}

/// Dispatcher that only announces the reminder on the message sink.
pub struct SinkDispatcher {
    sink: Arc<dyn MessageSink>,
}

impl SinkDispatcher {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }
}

impl ReminderDispatcher for SinkDispatcher {
    fn dispatch(&self, reminder: &Reminder) -> Result<(), String> {
        tracing::info!(
            reminder_id = %reminder.id,
            channel = reminder.channel.as_str(),
            user_id = %reminder.user_id,
            "Dispatching reminder"
        );
        self.sink.publish(Notification::ReminderDue {
            reminder_id: reminder.id.clone(),
            appointment_id: reminder.appointment_id.clone(),
            user_id: reminder.user_id.clone(),
            channel: reminder.channel,
        });
        Ok(())
    }
}

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Deliver every reminder due at `now`.
pub fn run_delivery_cycle(
    core: &CoreState,
    dispatcher: &dyn ReminderDispatcher,
    now: DateTime<Utc>,
) -> Result<DeliveryReport, CoreError> {
    let due = core.due_reminders_at(now)?;
    let mut report = DeliveryReport {
        due: due.len(),
        ..DeliveryReport::default()
    };

    for reminder in &due {
        match dispatcher.dispatch(reminder) {
            Ok(()) => {
                core.mark_reminder_sent(&reminder.id, Utc::now())?;
                report.sent += 1;
            }
            Err(reason) => {
                tracing::warn!(reminder_id = %reminder.id, %reason, "Reminder delivery failed");
                core.mark_reminder_failed(&reminder.id, &reason)?;
                report.failed += 1;
            }
        }
    }

    if report.due > 0 {
        tracing::info!(
            due = report.due,
            sent = report.sent,
            failed = report.failed,
            "Reminder delivery cycle complete"
        );
    }
    Ok(report)
}

/// Handle for the background reminder worker.
///
/// Dropping the handle stops the worker.
pub struct ReminderWorkerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ReminderWorkerHandle {
    /// Signal shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Reminder worker shutdown signal sent");
        }
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Reminder worker task ended abnormally");
        }
    }
}

impl Drop for ReminderWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the polling loop on the current tokio runtime.
pub fn start_reminder_worker(
    core: Arc<CoreState>,
    dispatcher: Arc<dyn ReminderDispatcher>,
    interval: Duration,
) -> ReminderWorkerHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Reminder worker started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let core = core.clone();
                    let dispatcher = dispatcher.clone();
                    let cycle = tokio::task::spawn_blocking(move || {
                        run_delivery_cycle(&core, dispatcher.as_ref(), Utc::now())
                    })
                    .await;
                    match cycle {
                        Ok(Ok(_)) => (),
                        Ok(Err(e)) => tracing::error!(error = %e, "Reminder delivery cycle failed"),
                        Err(e) => tracing::error!(error = %e, "Reminder delivery task panicked"),
                    }
                }
            }
        }
        tracing::info!("Reminder worker shutting down");
    });

    ReminderWorkerHandle {
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}
