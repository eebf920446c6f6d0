//! Two tones over a quantized noise floor
//!
//! Run with: cargo run --release --example two_tones -p nsd-core
//!
//! A 1234 Hz and a 2500.2157 Hz tone sampled at 10 kHz with 1 mV white noise,
//! quantized to a 1 mV step. The NSD shows both lines standing well above the
//! floor; the floor level follows from the noise density plus the
//! quantization noise `lsb/√(6·fs)`.

use nsd_core::logging::{init_logging, LogConfig};
use nsd_core::nsd::NsdEstimator;
use nsd_core::synth::{gaussian_noise, quantize, tone};
use nsd_core::windows::SpectralWindow;
use rand::rngs::StdRng;
use rand::SeedableRng;

const FS: f64 = 10_000.0;
const SAMPLES: usize = 1_000_000;
const LSB: f64 = 1e-3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::default());

    let mut rng = StdRng::seed_from_u64(11);
    let noise = gaussian_noise(SAMPLES, &mut rng);
    let first = tone(1.0, 1234.0, FS, SAMPLES);
    let second = tone(0.5, 2500.2157, FS, SAMPLES);
    let analog: Vec<f64> = noise
        .iter()
        .zip(first.iter().zip(&second))
        .map(|(n, (a, b))| n * 1e-3 + a + b)
        .collect();
    let series = quantize(&analog, LSB)?;

    let nsd = NsdEstimator::new(FS)
        .with_window(SpectralWindow::hft90d())
        .with_bins(1 << 14)
        .estimate(&series)?;

    let expected_floor = (1e-6 * 2.0 / FS + LSB * LSB / (6.0 * FS)).sqrt();
    let mut amplitudes = nsd.amplitudes().to_vec();
    amplitudes.sort_by(f64::total_cmp);
    let floor = amplitudes[amplitudes.len() / 2];
    println!("noise floor: {:.3e} /√Hz (expected {:.3e})", floor, expected_floor);

    for target in [1234.0, 2500.2157] {
        let (f, a) = nsd
            .iter()
            .filter(|(f, _)| (f - target).abs() < 5.0)
            .fold((0.0, 0.0), |best, p| if p.1 > best.1 { p } else { best });
        println!(
            "tone {:>10.4} Hz: peak {:.4e} at {:.3} Hz, {:.0} x floor",
            target,
            a,
            f,
            a / floor
        );
    }

    Ok(())
}
