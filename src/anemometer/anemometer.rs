use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, error, warn};

use super::calibration::{calibration, CalibrationRecord};
use super::config::AnemometerConfig;
use super::error::{AnemometerError, Result};
use super::psychrometry::AmbientConditions;
use super::resolver::{TimeOfFlightResolver, WindSpeedResolver};
use super::{EchoSet, PerDirection, WindReading};

/// Delivers echo sets of one measurement cycle. Frames that fail the sanity
/// check upstream are simply left out, so fewer than `frames` (or none) may come back.
pub trait EchoSource: Send {
    fn acquire(&mut self, frames: usize) -> Result<Vec<EchoSet>>;
}

type SharedResolver = Arc<dyn WindSpeedResolver + Send + Sync>;

/// Latest state published by the measuring thread.
#[derive(Debug, Clone, Default)]
pub struct AnemometerData {
    pub reading: Option<WindReading>,
    pub measured_at: Option<Instant>,
    pub measurements: u64,
    pub last_error: Option<String>,
}

pub struct Anemometer<S: EchoSource + 'static> {
    source: Arc<Mutex<S>>,
    config: AnemometerConfig,
    resolver: Option<SharedResolver>,
    thread_handler: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    data: Arc<RwLock<AnemometerData>>,
}

impl<S: EchoSource + 'static> Anemometer<S> {
    pub fn new(source: S, config: AnemometerConfig) -> Result<Anemometer<S>> {
        config.validate()?;
        Ok(Anemometer {
            source: Arc::new(Mutex::new(source)),
            config,
            resolver: None,
            thread_handler: None,
            running: Arc::new(AtomicBool::new(false)),
            data: Arc::new(RwLock::new(AnemometerData::default())),
        })
    }

    /// Uses an existing calibration with the time-of-flight resolver.
    pub fn with_calibration(self, record: CalibrationRecord) -> Result<Anemometer<S>> {
        let resolver = TimeOfFlightResolver::new(record, self.config.clone())?;
        Ok(self.with_resolver(resolver))
    }

    pub fn with_resolver<R>(mut self, resolver: R) -> Anemometer<S>
    where
        R: WindSpeedResolver + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn config(&self) -> &AnemometerConfig {
        &self.config
    }

    /// One measurement cycle worth of echoes, retrying while the source comes
    /// back empty.
    pub fn acquire(&self) -> Result<Vec<EchoSet>> {
        acquire_from(&self.source, &self.config)
    }

    /// Calibrates against still air and keeps the record for later measurements.
    pub fn calibrate(
        &mut self,
        distance: &PerDirection<f64>,
        ambient: &AmbientConditions,
    ) -> Result<CalibrationRecord> {
        let frames = self.acquire()?;
        let record = calibration(&frames, distance, ambient, &self.config)?;
        let resolver = TimeOfFlightResolver::new(record.clone(), self.config.clone())?;
        self.resolver = Some(Arc::new(resolver));
        Ok(record)
    }

    pub fn measure_wind_speed(&self) -> Result<WindReading> {
        let resolver = self.resolver()?;
        let frames = self.acquire()?;
        resolver.resolve(&frames)
    }

    /// Starts measuring every `interval` on a worker thread; see `latest`.
    pub fn start_thread(&mut self, interval: Duration) -> Result<()> {
        if self.thread_handler.is_some() {
            if self.is_running() {
                return Ok(());
            }
            //the worker stopped on a fatal error, reap it before restarting
            self.stop();
        }
        let resolver = self.resolver()?;

        //copies of the shared state for the worker
        let source = self.source.clone();
        let config = self.config.clone();
        let data = self.data.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let thread_handle = thread::spawn(move || {
            thread_loop(source, resolver, config, data, running, interval)
        });

        self.thread_handler = Some(thread_handle);
        Ok(())
    }

    pub fn latest(&self) -> AnemometerData {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn latest_reading(&self) -> Option<WindReading> {
        self.latest().reading
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handler.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!("measuring thread panicked");
            }
        }
    }

    fn resolver(&self) -> Result<SharedResolver> {
        self.resolver
            .clone()
            .ok_or_else(|| AnemometerError::MissingCalibration("no calibration loaded".into()))
    }
}

impl<S: EchoSource + 'static> Drop for Anemometer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquire_from<S: EchoSource>(
    source: &Mutex<S>,
    config: &AnemometerConfig,
) -> Result<Vec<EchoSet>> {
    let mut source = source
        .lock()
        .map_err(|_| AnemometerError::LockPoisoned("echo source"))?;
    for attempt in 1..=config.max_acquisition_attempts {
        let frames = source.acquire(config.frames_per_measure)?;
        if !frames.is_empty() {
            debug!(attempt, frames = frames.len(), "acquired echoes");
            return Ok(frames);
        }
        warn!(attempt, "acquisition returned no valid echoes, retrying");
    }
    Err(AnemometerError::EmptyAcquisition {
        attempts: config.max_acquisition_attempts,
    })
}

fn thread_loop<S: EchoSource>(
    source: Arc<Mutex<S>>,
    resolver: SharedResolver,
    config: AnemometerConfig,
    data_arc: Arc<RwLock<AnemometerData>>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    //takes the write lock only for the update itself
    let update = |f: &dyn Fn(&mut AnemometerData)| {
        let mut data = data_arc
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut data);
    };

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        let result = acquire_from(&source, &config).and_then(|frames| resolver.resolve(&frames));

        match result {
            Ok(reading) => update(&|data| {
                data.reading = Some(reading.clone());
                data.measured_at = Some(Instant::now());
                data.measurements += 1;
                data.last_error = None;
            }),
            Err(err) if err.is_recoverable() => {
                warn!(%err, "measurement skipped");
                update(&|data| data.last_error = Some(err.to_string()));
            }
            Err(err) => {
                error!(%err, "measuring thread stopped");
                update(&|data| data.last_error = Some(err.to_string()));
                running.store(false, Ordering::SeqCst);
                break;
            }
        }

        //woken early by stop()
        if let Some(left) = interval.checked_sub(started.elapsed()) {
            thread::park_timeout(left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anemometer::WindSpeed;

    /// Comes back empty `misses` times before delivering frames.
    struct FlakySource {
        misses: u32,
        frame: EchoSet,
    }

    impl EchoSource for FlakySource {
        fn acquire(&mut self, _frames: usize) -> Result<Vec<EchoSet>> {
            if self.misses > 0 {
                self.misses -= 1;
                return Ok(Vec::new());
            }
            Ok(vec![self.frame.clone()])
        }
    }

    struct FixedResolver;

    impl WindSpeedResolver for FixedResolver {
        fn resolve(&self, frames: &[EchoSet]) -> Result<WindReading> {
            Ok(WindReading::new(vec![WindSpeed::new(frames.len() as f64)]))
        }
    }

    /// Fails fatally on the first call only.
    struct FailsOnceResolver {
        calls: std::sync::atomic::AtomicU32,
    }

    impl WindSpeedResolver for FailsOnceResolver {
        fn resolve(&self, _frames: &[EchoSet]) -> Result<WindReading> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AnemometerError::InvalidCalibration("stale record".into()));
            }
            Ok(WindReading::new(vec![WindSpeed::new(2.0)]))
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn source(misses: u32) -> FlakySource {
        FlakySource {
            misses,
            frame: PerDirection::splat(vec![0.0, 1.0, 0.0]),
        }
    }

    #[test]
    fn retries_until_echoes_arrive() {
        let anemometer = Anemometer::new(source(3), AnemometerConfig::default()).unwrap();
        assert_eq!(anemometer.acquire().unwrap().len(), 1);
    }

    #[test]
    fn gives_up_after_configured_attempts() {
        let config = AnemometerConfig {
            max_acquisition_attempts: 2,
            ..AnemometerConfig::default()
        };
        let anemometer = Anemometer::new(source(5), config).unwrap();
        assert!(matches!(
            anemometer.acquire(),
            Err(AnemometerError::EmptyAcquisition { attempts: 2 })
        ));
    }

    #[test]
    fn measuring_requires_calibration() {
        let mut anemometer = Anemometer::new(source(0), AnemometerConfig::default()).unwrap();
        assert!(matches!(
            anemometer.measure_wind_speed(),
            Err(AnemometerError::MissingCalibration(_))
        ));
        assert!(anemometer.start_thread(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn thread_publishes_readings() {
        let mut anemometer = Anemometer::new(source(0), AnemometerConfig::default())
            .unwrap()
            .with_resolver(FixedResolver);
        anemometer.start_thread(Duration::from_millis(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while anemometer.latest().measurements == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        anemometer.stop();

        let data = anemometer.latest();
        assert!(data.measurements > 0);
        assert_eq!(data.reading, anemometer.latest_reading());
        assert_eq!(data.reading.unwrap().components, vec![WindSpeed::new(1.0)]);
        assert!(!anemometer.is_running());
    }

    #[test]
    fn thread_survives_empty_acquisitions() {
        let config = AnemometerConfig {
            max_acquisition_attempts: 1,
            ..AnemometerConfig::default()
        };
        let mut anemometer = Anemometer::new(source(u32::MAX), config)
            .unwrap()
            .with_resolver(FixedResolver);
        anemometer.start_thread(Duration::from_millis(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while anemometer.latest().last_error.is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        // empty acquisitions are recoverable, the loop keeps going
        assert!(anemometer.is_running());
        assert!(anemometer.latest().last_error.is_some());
        assert_eq!(anemometer.latest().measurements, 0);
        anemometer.stop();
    }

    #[test]
    fn thread_restarts_after_fatal_error() {
        let mut anemometer = Anemometer::new(source(0), AnemometerConfig::default())
            .unwrap()
            .with_resolver(FailsOnceResolver {
                calls: Default::default(),
            });
        anemometer.start_thread(Duration::from_millis(1)).unwrap();
        wait_until(|| !anemometer.is_running());
        assert!(!anemometer.is_running());
        assert_eq!(anemometer.latest().measurements, 0);

        anemometer.start_thread(Duration::from_millis(1)).unwrap();
        assert!(anemometer.is_running());
        wait_until(|| anemometer.latest().measurements > 0);
        anemometer.stop();
        assert_eq!(
            anemometer.latest_reading().unwrap().components,
            vec![WindSpeed::new(2.0)]
        );
    }

    #[test]
    fn poisoned_source_stops_the_thread() {
        let mut anemometer = Anemometer::new(source(0), AnemometerConfig::default())
            .unwrap()
            .with_resolver(FixedResolver);
        let shared = anemometer.source.clone();
        let poisoner = thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("source driver crashed");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(
            anemometer.acquire(),
            Err(AnemometerError::LockPoisoned(_))
        ));
        anemometer.start_thread(Duration::from_millis(1)).unwrap();
        wait_until(|| !anemometer.is_running());
        assert!(!anemometer.is_running());
        assert!(anemometer.latest().last_error.unwrap().contains("poisoned"));
    }
}
