//! Prometheus metrics for the bridge tester.

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Bridge tester metrics
#[derive(Metrics, Clone)]
#[metrics(scope = "bridge_tester")]
pub struct TesterMetrics {
    /// Signed transactions broadcast, replacements included
    pub transactions_submitted: Counter,

    /// Logical transactions confirmed with a successful receipt
    pub transactions_confirmed: Counter,

    /// Logical transactions mined with a failed receipt
    pub transactions_reverted: Counter,

    /// Logical transactions given up on without inclusion
    pub transactions_abandoned: Counter,

    /// Fee bumps applied to a pending transaction
    pub fee_escalations: Counter,

    /// Bridge jobs finished with a confirmed outcome
    pub jobs_succeeded: Counter,

    /// Bridge jobs finished with any other outcome
    pub jobs_failed: Counter,

    /// Cross-chain credits observed on the destination chain
    pub settlements_observed: Counter,

    /// Settlement watches that ran out of time
    pub settlements_timed_out: Counter,

    /// RPC call latency in seconds
    pub rpc_latency_seconds: Histogram,

    /// Time from first broadcast to receipt in seconds
    pub confirmation_latency_seconds: Histogram,
}

impl TesterMetrics {
    #[inline]
    pub fn record_submission(&self) {
        self.transactions_submitted.increment(1);
    }

    #[inline]
    pub fn record_confirmed(&self, latency_secs: f64) {
        self.transactions_confirmed.increment(1);
        self.confirmation_latency_seconds.record(latency_secs);
    }

    #[inline]
    pub fn record_reverted(&self) {
        self.transactions_reverted.increment(1);
    }

    #[inline]
    pub fn record_abandoned(&self) {
        self.transactions_abandoned.increment(1);
    }

    #[inline]
    pub fn record_escalation(&self) {
        self.fee_escalations.increment(1);
    }

    /// Record a finished job
    #[inline]
    pub fn record_job(&self, succeeded: bool) {
        if succeeded {
            self.jobs_succeeded.increment(1);
        } else {
            self.jobs_failed.increment(1);
        }
    }

    /// Record the result of a settlement watch
    #[inline]
    pub fn record_settlement(&self, observed: bool) {
        if observed {
            self.settlements_observed.increment(1);
        } else {
            self.settlements_timed_out.increment(1);
        }
    }

    #[inline]
    pub fn record_rpc_latency(&self, duration_secs: f64) {
        self.rpc_latency_seconds.record(duration_secs);
    }
}
