/**
 * ============================================================================
 * SESSION SCHEDULER MODULE
 * ============================================================================
 *
 * PURPOSE: Cancellable delayed-work queue polled by the session worker
 *
 * BEHAVIOR:
 * - post_delayed() schedules exactly one delivery of an action
 * - next_due() waits for the earliest action and hands it out
 * - stop() drops everything pending and refuses new work until start()
 *
 * The scheduler has no thread of its own. The worker task selects on
 * next_due() next to its command channel, so actions and commands are
 * serialized on the same task. A periodic timer is an action that posts
 * itself again when it runs.
 *
 * ============================================================================
 */

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
struct Delayed<A> {
    due: Instant,
    seq: u64,
    action: A,
}

#[derive(Debug)]
pub struct Scheduler<A> {
    pending: Vec<Delayed<A>>,
    started: bool,
    next_seq: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            started: false,
            next_seq: 0,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    // Cancel pending work; nothing is delivered until start() is called again
    pub fn stop(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("Scheduler stopped, dropping {} pending action(s)", self.pending.len());
        }
        self.pending.clear();
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    // Schedule `action` to run once after `delay`
    //
    // Returns false when the scheduler is stopped and the action was dropped.
    pub fn post_delayed(&mut self, action: A, delay: Duration) -> bool {
        if !self.started {
            log::warn!("Scheduler not started, dropping delayed action");
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending.push(Delayed {
            due: Instant::now() + delay,
            seq,
            action,
        });
        true
    }

    // Wait for the earliest due action
    //
    // Pends forever while nothing is scheduled. Cancel safe: an action is only
    // removed once its deadline has passed and the future completes.
    pub async fn next_due(&mut self) -> A {
        loop {
            match self.earliest() {
                Some((index, due)) => {
                    sleep_until(due).await;
                    return self.pending.swap_remove(index).action;
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    // Earliest deadline, ties broken by posting order
    fn earliest(&self) -> Option<(usize, Instant)> {
        self.pending
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| (d.due, d.seq))
            .map(|(index, d)| (index, d.due))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Tick {
        A,
        B,
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_after_delay() {
        let mut scheduler = Scheduler::new();
        scheduler.start();
        let posted_at = Instant::now();
        assert!(scheduler.post_delayed(Tick::A, Duration::from_secs(300)));

        assert_eq!(scheduler.next_due().await, Tick::A);
        assert!(posted_at.elapsed() >= Duration::from_secs(300));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earliest_first_then_posting_order() {
        let mut scheduler = Scheduler::new();
        scheduler.start();
        scheduler.post_delayed(Tick::B, Duration::from_secs(10));
        scheduler.post_delayed(Tick::A, Duration::from_secs(5));

        assert_eq!(scheduler.next_due().await, Tick::A);
        assert_eq!(scheduler.next_due().await, Tick::B);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending() {
        let mut scheduler = Scheduler::new();
        scheduler.start();
        scheduler.post_delayed(Tick::A, Duration::from_secs(1));
        scheduler.stop();

        assert_eq!(scheduler.pending(), 0);
        assert!(!scheduler.post_delayed(Tick::B, Duration::from_secs(1)));

        let waited = tokio::time::timeout(Duration::from_secs(60), scheduler.next_due()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_keeps_action() {
        let mut scheduler = Scheduler::new();
        scheduler.start();
        scheduler.post_delayed(Tick::A, Duration::from_secs(30));

        let early = tokio::time::timeout(Duration::from_secs(10), scheduler.next_due()).await;
        assert!(early.is_err());
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.next_due().await, Tick::A);
    }
}
