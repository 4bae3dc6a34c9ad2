//! Sampling Orchestrator
//!
//! Fans a fixed number of trials out over a bounded number of concurrent
//! workers. Each trial is wrapped in the bounded retry; results are folded
//! in completion order. After the first unrecoverable failure no new trial
//! is started, in-flight ones are drained, and the failure is returned.

use super::series::{Distribution, SeriesAccumulator};
use crate::config::HarnessConfig;
use crate::result::{FlakeError, FlakeResult};
use crate::trial::{self, OutputDecoder, TrialExecutor, TrialSpec, TrialStatus, ValuePair};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// One attempt at one trial
#[async_trait]
pub trait TrialRunner: Send + Sync {
    /// What a successful attempt yields
    type Output: Send;

    /// Run attempt for trial number `trial` (0-based scheduling index)
    async fn run(&self, trial: usize) -> FlakeResult<Self::Output>;
}

/// Runs an instrumented test and decodes its value pairs
#[derive(Debug, Clone)]
pub struct ValueTrialRunner {
    executor: TrialExecutor,
    decoder: OutputDecoder,
    spec: TrialSpec,
}

impl ValueTrialRunner {
    /// Create a runner for `spec`
    #[must_use]
    pub const fn new(executor: TrialExecutor, decoder: OutputDecoder, spec: TrialSpec) -> Self {
        Self {
            executor,
            decoder,
            spec,
        }
    }
}

fn check_status(executor: &TrialExecutor, output: &trial::TrialOutput) -> FlakeResult<()> {
    match output.status {
        TrialStatus::Passed | TrialStatus::Failed => Ok(()),
        TrialStatus::TimedOut => Err(FlakeError::Timeout {
            secs: executor.timeout().as_secs(),
        }),
        TrialStatus::Unexpected(code) => Err(FlakeError::ExecutionFailure {
            code,
            detail: output.stderr_tail(5),
        }),
    }
}

#[async_trait]
impl TrialRunner for ValueTrialRunner {
    type Output = Vec<ValuePair>;

    async fn run(&self, trial: usize) -> FlakeResult<Vec<ValuePair>> {
        let output = self.executor.run(&self.spec).await?;
        check_status(&self.executor, &output)?;
        let pairs = self.decoder.decode(&output.stdout)?;
        tracing::debug!(trial, pairs = pairs.len(), "trial decoded");
        Ok(pairs)
    }
}

/// Runs an uninstrumented test and records whether it passed
#[derive(Debug, Clone)]
pub struct OutcomeTrialRunner {
    executor: TrialExecutor,
    spec: TrialSpec,
}

impl OutcomeTrialRunner {
    /// Create a runner for `spec`
    #[must_use]
    pub const fn new(executor: TrialExecutor, spec: TrialSpec) -> Self {
        Self { executor, spec }
    }
}

#[async_trait]
impl TrialRunner for OutcomeTrialRunner {
    type Output = bool;

    async fn run(&self, trial: usize) -> FlakeResult<bool> {
        let output = self.executor.run(&self.spec).await?;
        check_status(&self.executor, &output)?;
        tracing::debug!(trial, status = ?output.status, "trial finished");
        Ok(output.status == TrialStatus::Passed)
    }
}

/// Pass/fail outcomes of one sampling unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRate {
    /// Outcome per trial in completion order (`true` = passed)
    pub results: Vec<bool>,
}

impl PassRate {
    /// Number of passing trials
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|p| **p).count()
    }

    /// Fraction of passing trials, 0 when nothing ran
    #[must_use]
    pub fn rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.passed() as f64 / self.results.len() as f64
        }
    }
}

/// Trial fan-out settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOrchestrator {
    trials: usize,
    workers: usize,
    max_attempts: usize,
}

impl SamplingOrchestrator {
    /// Create an orchestrator; zero workers or attempts are raised to one
    #[must_use]
    pub fn new(trials: usize, workers: usize, max_attempts: usize) -> Self {
        Self {
            trials,
            workers: workers.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Settings from a harness configuration
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.trials,
            config.effective_workers(),
            config.max_attempts,
        )
    }

    /// Trials per unit
    #[must_use]
    pub const fn trials(&self) -> usize {
        self.trials
    }

    /// Concurrent trials
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Run every trial and fold outputs in completion order
    ///
    /// `fold` receives the 1-based completion count with each output;
    /// `progress` is called after each successful fold.
    pub async fn drive<R, F, P>(&self, runner: &R, mut fold: F, mut progress: P) -> FlakeResult<()>
    where
        R: TrialRunner,
        F: FnMut(usize, R::Output) -> FlakeResult<()>,
        P: FnMut(usize, usize),
    {
        let abort = AtomicBool::new(false);
        let abort_ref = &abort;
        let max_attempts = self.max_attempts;

        let mut results = stream::iter(0..self.trials)
            .map(|trial| async move {
                if abort_ref.load(Ordering::SeqCst) {
                    return None;
                }
                Some(trial::attempt(max_attempts, |_| runner.run(trial)).await)
            })
            .buffer_unordered(self.workers);

        let mut completed = 0;
        let mut failure = None;
        while let Some(result) = results.next().await {
            match result {
                None => {}
                Some(_) if failure.is_some() => {}
                Some(Ok(output)) => {
                    completed += 1;
                    match fold(completed, output) {
                        Ok(()) => progress(completed, self.trials),
                        Err(e) => {
                            abort.store(true, Ordering::SeqCst);
                            failure = Some(e);
                        }
                    }
                }
                Some(Err(e)) => {
                    abort.store(true, Ordering::SeqCst);
                    failure = Some(e);
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Sample value pairs into one series per parametrization index
    ///
    /// # Errors
    ///
    /// - [`FlakeError::RetryExhausted`] when a trial fails every attempt
    /// - [`FlakeError::AggregationInconsistency`] when pair counts differ
    pub async fn sample<R, P>(&self, runner: &R, progress: P) -> FlakeResult<Distribution>
    where
        R: TrialRunner<Output = Vec<ValuePair>>,
        P: FnMut(usize, usize),
    {
        let mut acc = SeriesAccumulator::new();
        self.drive(runner, |_, pairs| acc.push(&pairs), progress)
            .await?;
        let dist = acc.finish();
        tracing::info!(
            trials = dist.trials,
            series = dist.series.len(),
            "sampling complete"
        );
        Ok(dist)
    }

    /// Record pass/fail outcomes of every trial
    pub async fn pass_rate<R, P>(&self, runner: &R, progress: P) -> FlakeResult<PassRate>
    where
        R: TrialRunner<Output = bool>,
        P: FnMut(usize, usize),
    {
        let mut rate = PassRate::default();
        self.drive(
            runner,
            |_, passed| {
                rate.results.push(passed);
                Ok(())
            },
            progress,
        )
        .await?;
        tracing::info!(trials = rate.results.len(), rate = rate.rate(), "pass rate");
        Ok(rate)
    }
}
