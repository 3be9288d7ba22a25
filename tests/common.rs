/// Shared helpers: synthetic subjects with known event structure.
use erp::io::{Event, Recording};
use ndarray::Array2;
use std::path::Path;

/// Deterministic pseudo-noise in [-0.5, 0.5), decorrelated across (c, t).
pub fn noise(c: usize, t: usize) -> f64 {
    let h = (c.wrapping_mul(2654435761).wrapping_add(t.wrapping_mul(40503))) % 10007;
    h as f64 / 10007.0 - 0.5
}

/// A plausible clean recording: one oscillation per channel plus low-level
/// noise, everything on the microvolt scale so nothing trips the 120 µV
/// rejection threshold.
#[allow(unused)]
pub fn synthetic_recording(
    n_ch: usize,
    n_t: usize,
    sfreq: f64,
    events: Vec<Event>,
) -> Recording {
    let data = Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let time = t as f64 / sfreq;
        let freq = 6.0 + 2.0 * c as f64;
        20e-6 * (2.0 * std::f64::consts::PI * freq * time).sin() + 2e-6 * noise(c, t)
    });
    Recording {
        data,
        sfreq,
        ch_names: (0..n_ch).map(|i| format!("Ch{}", i + 1)).collect(),
        chan_pos: Array2::from_shape_fn((n_ch, 2), |(c, d)| {
            if d == 0 { (c as f64).cos() } else { (c as f64).sin() }
        }),
        events,
    }
}

/// Evenly spaced events of one marker code, all with in-bounds epoch windows.
#[allow(unused)]
pub fn events_for_code(code: i32, n_events: usize, first: i64, spacing: i64) -> Vec<Event> {
    (0..n_events)
        .map(|i| Event { sample: first + i as i64 * spacing, code })
        .collect()
}

/// Write a subject's raw file where the pipeline expects it.
#[allow(unused)]
pub fn write_subject(data_dir: &Path, subject: &str, rec: &Recording) {
    std::fs::create_dir_all(data_dir).unwrap();
    rec.save(&data_dir.join(format!("sub-{subject}_raw.safetensors")))
        .unwrap();
}
