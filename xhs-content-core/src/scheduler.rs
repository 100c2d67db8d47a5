//! Daily trigger at 20:00 Beijing time.
//!
//! Wakes every 30 seconds and compares the wall clock with the next target,
//! so a suspended host simply skips a day instead of firing late.

use crate::orchestrator::{Workflow, WorkflowError, WorkflowResult};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use chrono_tz::{Asia::Shanghai, Tz};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const RUN_HOUR: u32 = 20;
pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);

fn run_window() -> ChronoDuration {
    ChronoDuration::seconds(60)
}

type Clock = Arc<dyn Fn() -> DateTime<Tz> + Send + Sync>;

fn target_on(date: NaiveDate) -> Option<DateTime<Tz>> {
    date.and_hms_opt(RUN_HOUR, 0, 0)?
        .and_local_timezone(Shanghai)
        .earliest()
}

/// Today's 20:00 if it has not passed yet, otherwise tomorrow's.
pub fn next_run(now: DateTime<Tz>) -> DateTime<Tz> {
    let date = now.date_naive();
    match target_on(date) {
        Some(today) if now <= today => today,
        _ => date
            .succ_opt()
            .and_then(target_on)
            .unwrap_or_else(|| now + ChronoDuration::days(1)),
    }
}

/// True inside `[target, target + 60s)`.
pub fn is_time_to_run(now: DateTime<Tz>, target: DateTime<Tz>) -> bool {
    now >= target && now < target + run_window()
}

pub struct Scheduler {
    workflow: Arc<dyn Workflow>,
    cancel: CancellationToken,
    check_interval: Duration,
    clock: Clock,
}

impl Scheduler {
    pub fn new(workflow: Arc<dyn Workflow>) -> Self {
        Self {
            workflow,
            cancel: CancellationToken::new(),
            check_interval: CHECK_INTERVAL,
            clock: Arc::new(|| Utc::now().with_timezone(&Shanghai)),
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Tz> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Token that stops [`Scheduler::start`] at its next check.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        tracing::info!("Stopping scheduler");
        self.cancel.cancel();
    }

    /// Run the workflow immediately.
    pub async fn run_once(&self) -> Result<WorkflowResult, WorkflowError> {
        tracing::info!("Running workflow immediately");
        self.workflow.run().await
    }

    /// Loop until cancelled. Workflow failures are logged and never end the
    /// loop.
    pub async fn start(&self) {
        let mut target = next_run((self.clock)());
        tracing::info!(next_run = %target, "Daily scheduler started");

        loop {
            let now = (self.clock)();

            if is_time_to_run(now, target) {
                tracing::info!(at = %now, "Executing scheduled run");
                match self.workflow.run().await {
                    Ok(result) => tracing::info!(
                        elapsed_ms = result.execution_time_ms,
                        "Scheduled workflow completed successfully"
                    ),
                    Err(e) => tracing::error!(error = %e, "Scheduled workflow failed"),
                }
                target = next_run(target + run_window());
                tracing::info!(next_run = %target, "Next scheduled run");
            } else if now >= target + run_window() {
                tracing::warn!(missed = %target, "Missed scheduled window, skipping to the next day");
                target = next_run(now);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::FakeWorkflow;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn beijing(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Tz> {
        Shanghai.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_next_run_before_eight_pm_is_today() {
        assert_eq!(
            next_run(beijing(2026, 10, 15, 9, 30, 0)),
            beijing(2026, 10, 15, 20, 0, 0)
        );
    }

    #[test]
    fn test_next_run_after_eight_pm_is_tomorrow() {
        assert_eq!(
            next_run(beijing(2026, 10, 15, 20, 0, 1)),
            beijing(2026, 10, 16, 20, 0, 0)
        );
        assert_eq!(
            next_run(beijing(2026, 12, 31, 23, 0, 0)),
            beijing(2027, 1, 1, 20, 0, 0)
        );
    }

    #[test]
    fn test_next_run_from_utc_instant() {
        // 13:00 UTC is 21:00 in Beijing.
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 13, 0, 0).unwrap();
        assert_eq!(
            next_run(now.with_timezone(&Shanghai)),
            beijing(2026, 10, 16, 20, 0, 0)
        );
    }

    #[test]
    fn test_run_window() {
        let target = beijing(2026, 10, 15, 20, 0, 0);
        assert!(is_time_to_run(target, target));
        assert!(is_time_to_run(beijing(2026, 10, 15, 20, 0, 59), target));
        assert!(!is_time_to_run(beijing(2026, 10, 15, 20, 1, 0), target));
        assert!(!is_time_to_run(beijing(2026, 10, 15, 19, 59, 59), target));
    }

    #[tokio::test]
    async fn test_start_runs_once_in_window_and_stops() {
        let workflow = Arc::new(FakeWorkflow::failing());
        let now = Arc::new(Mutex::new(beijing(2026, 10, 15, 19, 59, 50)));
        let clock = now.clone();

        let scheduler = Arc::new(
            Scheduler::new(workflow.clone())
                .with_check_interval(Duration::from_millis(10))
                .with_clock(move || *clock.lock().unwrap()),
        );
        let token = scheduler.cancellation_token();
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.start().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(workflow.runs(), 0);

        *now.lock().unwrap() = beijing(2026, 10, 15, 20, 0, 10);
        tokio::time::sleep(Duration::from_millis(100)).await;
        // A failing run does not stop the loop, and the window fires once.
        assert_eq!(workflow.runs(), 1);
        assert!(!handle.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_missed_window_is_skipped() {
        let workflow = Arc::new(FakeWorkflow::failing());
        let now = Arc::new(Mutex::new(beijing(2026, 10, 15, 19, 59, 50)));
        let clock = now.clone();

        let scheduler = Arc::new(
            Scheduler::new(workflow.clone())
                .with_check_interval(Duration::from_millis(10))
                .with_clock(move || *clock.lock().unwrap()),
        );
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.start().await }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        *now.lock().unwrap() = beijing(2026, 10, 15, 22, 0, 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(workflow.runs(), 0);

        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_once_delegates() {
        let workflow = Arc::new(FakeWorkflow::failing());
        let scheduler = Scheduler::new(workflow.clone());
        assert!(scheduler.run_once().await.is_err());
        assert_eq!(workflow.runs(), 1);
    }
}
