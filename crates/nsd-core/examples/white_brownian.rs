//! White plus Brownian noise: NSD estimate and RMS cross-check
//!
//! Run with: cargo run --release --example white_brownian -p nsd-core
//!
//! Optionally reads `./nsd.yaml` (or `$NSD_CONFIG`) for the estimator and
//! logging settings.

use nsd_core::config::NsdConfig;
use nsd_core::logging::init_logging;
use nsd_core::rms::{band_rms, nsd_rms, series_rms};
use nsd_core::synth::{nsd_noise, NoiseKind};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = NsdConfig::load()?;
    // Without a config file, sample at 50 Hz
    if config.sample_frequency == 1.0 {
        config.sample_frequency = 50.0;
    }
    init_logging(&config.logging);

    let samples = 1 << 20;
    let mut rng = StdRng::seed_from_u64(2024);
    let series = nsd_noise(samples, &[NoiseKind::White, NoiseKind::Brownian], &mut rng)?;

    let estimator = config.estimator()?;
    let nsd = estimator.estimate(&series)?;

    println!(
        "{} samples at {} Hz, {} NSD points from {:.4} Hz to {:.2} Hz",
        samples,
        config.sample_frequency,
        nsd.len(),
        nsd.frequencies()[0],
        nsd.frequencies()[nsd.len() - 1],
    );

    let time_rms = series_rms(&series);
    let freq_rms = nsd_rms(&nsd);
    println!("RMS from series:    {:.6e}", time_rms);
    println!("RMS from NSD:       {:.6e}", freq_rms);
    println!(
        "relative difference {:+.2} %",
        100.0 * (freq_rms - time_rms) / time_rms
    );

    let nyquist = config.sample_frequency / 2.0;
    for (low, high) in [(0.01, 0.1), (0.1, 1.0), (1.0, nyquist)] {
        println!(
            "band RMS {:>6.2} - {:>6.2} Hz: {:.4e}",
            low,
            high,
            band_rms(&nsd, low, high)?
        );
    }

    println!("\n{:>12}  {:>12}", "f [Hz]", "NSD [1/√Hz]");
    for (f, a) in config.smooth(&nsd)?.iter().step_by(4) {
        println!("{:>12.5}  {:>12.4e}", f, a);
    }

    Ok(())
}
