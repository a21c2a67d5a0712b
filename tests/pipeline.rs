use approx::assert_relative_eq;

use sonic_anemometer::anemometer::anemometer::Anemometer;
use sonic_anemometer::anemometer::psychrometry::{speed_of_sound, AmbientConditions};
use sonic_anemometer::anemometer::resolver::{
    PhaseDifferenceResolver, PhaseReference, WindSpeedResolver,
};
use sonic_anemometer::anemometer::storage::{
    load_calibration, load_phase_reference, save_json, FileEchoSource,
};
use sonic_anemometer::{AnemometerConfig, AnemometerError, EchoSet, PerDirection, WindSpeed};

const DISTANCE: f64 = 0.2;

/// Raw echo whose derivative is a decaying burst starting at `onset`.
fn echo(onset: usize) -> Vec<f64> {
    let mut level = 0.0;
    (0..400)
        .map(|i| {
            if i > onset {
                let t = (i - onset) as f64;
                let envelope = (t / 6.0).powi(2) * (-t / 12.0).exp();
                level += envelope * (t * std::f64::consts::PI / 5.0).sin();
            }
            level
        })
        .collect()
}

fn calm() -> EchoSet {
    PerDirection::splat(echo(120))
}

/// North echo arriving `lag` samples late.
fn north_late(lag: usize) -> EchoSet {
    let mut frame = calm();
    frame.north = echo(120 + lag);
    frame
}

fn ambient() -> AmbientConditions {
    AmbientConditions::new(20.0, 1013.25, 0.5)
}

fn config() -> AnemometerConfig {
    AnemometerConfig {
        frames_per_measure: 1,
        max_acquisition_attempts: 2,
        ..AnemometerConfig::default()
    }
}

#[test]
fn calibrate_then_measure() {
    let frames = vec![calm(), calm(), north_late(7)];
    let mut anemometer = Anemometer::new(FileEchoSource::new(frames), config()).unwrap();

    let record = anemometer
        .calibrate(&PerDirection::splat(DISTANCE), &ambient())
        .unwrap();
    // identical echoes share one offset
    assert_eq!(record.delta_in_samples.north, record.delta_in_samples.south);

    let still = anemometer.measure_wind_speed().unwrap();
    assert!(!still.degraded);
    assert_eq!(still.components, vec![WindSpeed::new(0.0), WindSpeed::new(0.0)]);

    let windy = anemometer.measure_wind_speed().unwrap();
    assert!(!windy.degraded);

    // after calibration the corrected flight time is the still-air one plus
    // the quarter period of the derivative
    let config = config();
    let c = speed_of_sound(&ambient(), &config.gas).unwrap();
    let south = DISTANCE / c + config.excitation_period() / 4.0 / config.sampling_rate;
    let north = south + 7.0 / config.sampling_rate;
    let expected = DISTANCE / 2.0 * (1.0 / north - 1.0 / south);
    assert!(expected < 0.0);
    assert_relative_eq!(
        windy.components[0].meters_per_sec(),
        expected,
        max_relative = 1e-6
    );
    assert_eq!(windy.components[1], WindSpeed::new(0.0));

    assert!(matches!(
        anemometer.measure_wind_speed(),
        Err(AnemometerError::EmptyAcquisition { attempts: 2 })
    ));
}

#[test]
fn stored_calibration_drives_a_new_anemometer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");

    let mut calibrating = Anemometer::new(FileEchoSource::new(vec![calm()]), config()).unwrap();
    let record = calibrating
        .calibrate(&PerDirection::splat(DISTANCE), &ambient())
        .unwrap();
    save_json(&path, &record).unwrap();

    let measuring = Anemometer::new(FileEchoSource::new(vec![north_late(3)]), config())
        .unwrap()
        .with_calibration(load_calibration(&path).unwrap())
        .unwrap();
    let reading = measuring.measure_wind_speed().unwrap();
    assert!(reading.components[0].meters_per_sec() < 0.0);
    assert_eq!(reading.components[1], WindSpeed::new(0.0));
}

#[test]
fn corrupt_echo_reports_degraded_zero_wind() {
    let mut calibrating = Anemometer::new(FileEchoSource::new(vec![calm()]), config()).unwrap();
    let record = calibrating
        .calibrate(&PerDirection::splat(DISTANCE), &ambient())
        .unwrap();

    // the derivative crosses the threshold before any zero crossing
    let corrupt = PerDirection::splat(vec![0.0, 0.1, 1.1, 1.6, 1.5, 1.0]);
    let anemometer = Anemometer::new(FileEchoSource::new(vec![corrupt]), config())
        .unwrap()
        .with_calibration(record)
        .unwrap();
    let reading = anemometer.measure_wind_speed().unwrap();
    assert!(reading.degraded);
    assert_eq!(reading.components, vec![WindSpeed::new(0.0); 2]);
}

#[test]
fn phase_difference_against_stored_reference() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.json");
    let config = config();

    let reference = PhaseReference::capture(&[calm()], &ambient(), &config).unwrap();
    save_json(&path, &reference).unwrap();
    let resolver = PhaseDifferenceResolver::new(
        load_phase_reference(&path).unwrap(),
        PerDirection::splat(DISTANCE),
        config.clone(),
    )
    .unwrap();

    let still = resolver.resolve(&[calm()]).unwrap();
    assert!(!still.degraded);
    for component in &still.components {
        assert_relative_eq!(component.meters_per_sec(), 0.0, epsilon = 1e-12);
    }

    let windy = resolver.resolve(&[north_late(7)]).unwrap();
    let t1 = DISTANCE / reference.speed_of_sound;
    let dt = 7.0 / config.sampling_rate;
    let north = DISTANCE * dt / (t1 * (t1 + dt));
    assert_relative_eq!(
        windy.components[0].meters_per_sec(),
        -north / 2.0,
        max_relative = 1e-6
    );
    assert_relative_eq!(windy.components[1].meters_per_sec(), 0.0, epsilon = 1e-12);
}
