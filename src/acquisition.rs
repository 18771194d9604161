//! Background acquisition loop.
//!
//! The [`AcquisitionController`] owns one background thread per session. While the
//! session is active the thread takes one sample per tick from its [`SampleSource`] and
//! hands it to every log component in the registry that is currently Running.
//!
//! ```text
//!   SampleSource ──► acquisition thread ──► write_if_running ──► log0, log1, ...
//!                          │                      │
//!                       Ticker              errors ──► AcquisitionObserver
//! ```
//!
//! Write failures never end the loop; they are counted and reported to the observer.
//! Stopping is cooperative: `stop()` clears the session flag, cancels the ticker and
//! joins the thread, which exits at its next iteration boundary.

use crate::core::DataRecord;
use crate::error::{CldError, CldResult};
use crate::object::RuntimeObject;
use crate::registry::ObjectRegistry;
use crate::ticker::Ticker;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Produces one record per acquisition tick.
pub trait SampleSource: Send {
    /// Take one sample. The registry is provided so sources can discover channels.
    fn sample(&mut self, registry: &ObjectRegistry) -> CldResult<DataRecord>;
}

/// Random values for every channel in the registry, passed through each channel's
/// calibration when it references one.
pub struct SimulatedSource {
    rng: StdRng,
    amplitude: f64,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSource {
    /// Source seeded from system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            amplitude: 10.0,
        }
    }

    /// Deterministic source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            amplitude: 10.0,
        }
    }

    /// Raw values are drawn from `-amplitude..=amplitude`.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.abs();
        self
    }
}

impl SampleSource for SimulatedSource {
    fn sample(&mut self, registry: &ObjectRegistry) -> CldResult<DataRecord> {
        let mut values = Vec::new();
        for (name, object) in registry.iter() {
            let Some(channel) = object.as_channel() else {
                continue;
            };
            let raw = self.rng.gen_range(-self.amplitude..=self.amplitude);
            let value = channel
                .calibration()
                .and_then(|cal| registry.get(cal))
                .and_then(RuntimeObject::as_calibration)
                .map_or(raw, |cal| cal.apply(raw));
            values.push((name.to_string(), value));
        }
        Ok(DataRecord::now(values))
    }
}

/// Receives the non-fatal errors of the acquisition loop.
pub trait AcquisitionObserver: Send + Sync {
    /// A write to log `log` failed.
    fn sink_write_failed(&self, log: &str, error: &CldError);

    /// The sample source failed.
    fn sample_failed(&self, error: &CldError) {
        let _ = error;
    }
}

/// Observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AcquisitionObserver for TracingObserver {
    fn sink_write_failed(&self, log: &str, error: &CldError) {
        warn!(log, error = %error, "Log write failed, acquisition continues");
    }

    fn sample_failed(&self, error: &CldError) {
        warn!(error = %error, "Sampling failed, acquisition continues");
    }
}

/// Counters accumulated over the controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Samples produced.
    pub samples: u64,
    /// Records accepted by Running logs.
    pub writes: u64,
    /// Failed log writes.
    pub write_errors: u64,
    /// Failed samples.
    pub sample_errors: u64,
}

#[derive(Default)]
struct Counters {
    samples: AtomicU64,
    writes: AtomicU64,
    write_errors: AtomicU64,
    sample_errors: AtomicU64,
}

struct Session {
    active: Arc<AtomicBool>,
    ticker: Ticker,
    handle: JoinHandle<()>,
}

/// Owns the acquisition thread. One per process, held by the [`Context`](crate::context::Context).
pub struct AcquisitionController {
    interval: Duration,
    source: Arc<Mutex<Box<dyn SampleSource>>>,
    observer: Arc<dyn AcquisitionObserver>,
    counters: Arc<Counters>,
    session: Mutex<Option<Session>>,
}

impl Default for AcquisitionController {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl AcquisitionController {
    /// Controller sampling every `interval` from a [`SimulatedSource`].
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            source: Arc::new(Mutex::new(Box::new(SimulatedSource::new()))),
            observer: Arc::new(TracingObserver),
            counters: Arc::new(Counters::default()),
            session: Mutex::new(None),
        }
    }

    /// Replace the sample source.
    pub fn with_source(mut self, source: impl SampleSource + 'static) -> Self {
        self.source = Arc::new(Mutex::new(Box::new(source)));
        self
    }

    /// Replace the error observer.
    pub fn with_observer(mut self, observer: Arc<dyn AcquisitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True while a session is running.
    pub fn is_active(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.active.load(Ordering::SeqCst))
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            samples: self.counters.samples.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            write_errors: self.counters.write_errors.load(Ordering::SeqCst),
            sample_errors: self.counters.sample_errors.load(Ordering::SeqCst),
        }
    }

    /// Start a session feeding the logs in `registry`.
    ///
    /// Fails with `InvalidState` if a session is already active.
    pub fn start(&self, registry: Arc<ObjectRegistry>) -> CldResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(CldError::invalid_state("acquisition", "start", "active"));
        }

        let active = Arc::new(AtomicBool::new(true));
        let ticker = Ticker::new(self.interval);

        let loop_active = Arc::clone(&active);
        let loop_ticker = ticker.clone();
        let source = Arc::clone(&self.source);
        let observer = Arc::clone(&self.observer);
        let counters = Arc::clone(&self.counters);

        let handle = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                acquisition_loop(&registry, &source, &*observer, &counters, &loop_active, &loop_ticker)
            })?;

        *session = Some(Session {
            active,
            ticker,
            handle,
        });

        info!(interval_ms = self.interval.as_millis() as u64, "Started acquisition");
        Ok(())
    }

    /// Stop the active session and join its thread. A no-op when idle.
    pub fn stop(&self) -> CldResult<()> {
        let mut guard = self.session.lock();
        let Some(session) = guard.take() else {
            return Ok(());
        };

        session.active.store(false, Ordering::SeqCst);
        session.ticker.cancel();

        if let Err(e) = session.handle.join() {
            error!("Acquisition thread panicked: {:?}", e);
        }
        drop(guard);

        let stats = self.stats();
        info!(
            samples = stats.samples,
            writes = stats.writes,
            write_errors = stats.write_errors,
            "Stopped acquisition"
        );
        Ok(())
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Error stopping acquisition on drop: {}", e);
        }
    }
}

fn acquisition_loop(
    registry: &ObjectRegistry,
    source: &Mutex<Box<dyn SampleSource>>,
    observer: &dyn AcquisitionObserver,
    counters: &Counters,
    active: &AtomicBool,
    ticker: &Ticker,
) {
    debug!("Acquisition thread started");

    while active.load(Ordering::SeqCst) {
        let sample = source.lock().sample(registry);
        match sample {
            Ok(record) => {
                counters.samples.fetch_add(1, Ordering::SeqCst);
                for (name, log) in registry.logs() {
                    match log.write_if_running(&record) {
                        Ok(true) => {
                            counters.writes.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            counters.write_errors.fetch_add(1, Ordering::SeqCst);
                            observer.sink_write_failed(name, &e);
                        }
                    }
                }
            }
            Err(e) => {
                counters.sample_errors.fetch_add(1, Ordering::SeqCst);
                observer.sample_failed(&e);
            }
        }

        if !ticker.wait() {
            break;
        }
    }

    debug!("Acquisition thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::document::load;

    const CHANNELS: &str = r#"
        [[object]]
        id = "cal0"
        type = "calibration"

          [[object.object]]
          id = "cft0"
          type = "coefficient"
          properties = { n = 0, value = 100.0 }

        [[object]]
        id = "ai0"
        type = "channel"
        properties = { calref = "/cal0" }

        [[object]]
        id = "ai1"
        type = "channel"
    "#;

    struct FailingSource;

    impl SampleSource for FailingSource {
        fn sample(&mut self, _: &ObjectRegistry) -> CldResult<DataRecord> {
            Err(CldError::SinkWrite {
                name: "source".into(),
                message: "offline".into(),
            })
        }
    }

    #[test]
    fn simulated_source_samples_every_channel() {
        let registry = build(&load(CHANNELS).unwrap()).unwrap();
        let record = SimulatedSource::seeded(7)
            .with_amplitude(1.0)
            .sample(&registry)
            .unwrap();
        let names: Vec<_> = record.values.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["ai0", "ai1"]);
        // cal0 maps every raw value to the constant 100.
        assert_eq!(record.value("ai0"), Some(100.0));
        assert!(record.value("ai1").unwrap().abs() <= 1.0);
    }

    #[test]
    fn second_start_is_rejected() {
        let registry = Arc::new(build(&load(CHANNELS).unwrap()).unwrap());
        let controller = AcquisitionController::new(Duration::from_millis(5));
        controller.start(Arc::clone(&registry)).unwrap();
        let err = controller.start(registry).unwrap_err();
        assert!(matches!(err, CldError::InvalidState { operation: "start", .. }));
        controller.stop().unwrap();
        assert!(!controller.is_active());
    }

    #[test]
    fn restart_after_stop() {
        let registry = Arc::new(build(&load(CHANNELS).unwrap()).unwrap());
        let controller = AcquisitionController::new(Duration::from_millis(5));
        for round in 1..=2 {
            controller.start(Arc::clone(&registry)).unwrap();
            assert!(controller.is_active());
            while controller.stats().samples < round {
                thread::sleep(Duration::from_millis(1));
            }
            controller.stop().unwrap();
            assert!(!controller.is_active());
        }
        assert!(controller.stats().samples >= 2);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let controller = AcquisitionController::default();
        controller.stop().unwrap();
        assert_eq!(controller.stats(), AcquisitionStats::default());
    }

    #[test]
    fn stop_returns_promptly_with_long_interval() {
        let registry = Arc::new(build(&load(CHANNELS).unwrap()).unwrap());
        let controller = AcquisitionController::new(Duration::from_secs(60));
        controller.start(registry).unwrap();
        thread::sleep(Duration::from_millis(20));
        let start = std::time::Instant::now();
        controller.stop().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn source_failures_do_not_end_the_loop() {
        let registry = Arc::new(build(&load(CHANNELS).unwrap()).unwrap());
        let controller =
            AcquisitionController::new(Duration::from_millis(2)).with_source(FailingSource);
        controller.start(registry).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(controller.is_active());
        controller.stop().unwrap();
        let stats = controller.stats();
        assert!(stats.sample_errors >= 2);
        assert_eq!(stats.samples, 0);
    }
}
