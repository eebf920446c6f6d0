//! Smoothing and fitting a 1/f + white NSD
//!
//! Run with: cargo run --release --example smooth_fit -p nsd-core
//!
//! Generates white plus pink noise, smooths the NSD onto geometric bins and
//! fits `slope/f^(n/2) + white` in both linear and log-log space.

use nsd_core::fit::{fit_in, FitResult, FitSpace};
use nsd_core::logging::{init_logging, LogConfig};
use nsd_core::nsd::NsdEstimator;
use nsd_core::smooth::{smooth, Aggregate, DEFAULT_SMOOTH_BINS};
use nsd_core::synth::{nsd_noise, NoiseKind};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn report(label: &str, result: &FitResult) {
    let model = &result.model;
    let rel = result.relative_errors();
    println!("{} fit ({} iterations):", label, result.iterations);
    println!("  slope        {:.4e}  ± {:.1} %", model.slope, 100.0 * rel[0]);
    println!("  exponent     {:.4}      ± {:.1} %", model.freq_exponent, 100.0 * rel[1]);
    println!("  white floor  {:.4e}  ± {:.1} %", model.white_floor, 100.0 * rel[2]);
    match model.corner_frequency() {
        Some(fc) => println!("  corner       {:.4} Hz", fc),
        None => println!("  corner       undefined"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::development());

    let fs = 50.0;
    let mut rng = StdRng::seed_from_u64(5);
    let series = nsd_noise(1 << 20, &[NoiseKind::White, NoiseKind::Pink], &mut rng)?;
    let nsd = NsdEstimator::new(fs).with_bins(1 << 16).estimate(&series)?;

    let smoothed = smooth(&nsd, DEFAULT_SMOOTH_BINS, &Aggregate::Median)?;
    println!("{} NSD points smoothed to {}\n", nsd.len(), smoothed.len());

    for (label, space) in [("linear", FitSpace::Linear), ("log-log", FitSpace::LogLog)] {
        match fit_in(&smoothed, space) {
            Ok(result) => report(label, &result),
            Err(e) => println!("{} fit failed: {}", label, e),
        }
    }

    Ok(())
}
