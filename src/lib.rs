//! # erp: multi-subject ERP preprocessing and grand averaging in pure Rust
//!
//! `erp` implements the event-related-potential pipeline for the casino
//! gambling study: per-subject cleaning (FIR filtering + FastICA artifact
//! removal), event-locked epoching with amplitude-based rejection,
//! per-condition averaging, and a grand average across subjects.  Every DSP
//! step follows the [MNE-Python](https://mne.tools) reference behaviour.
//!
//! ## Pipeline overview
//!
//! ```text
//! sub-{id}_raw.safetensors
//!   │
//!   ├─ io::Recording::load()      continuous signal + events + sensor layout
//!   ├─ resample::resample()       FFT polyphase → target_sfreq (default 250 Hz)
//!   ├─ band-pass (FIR)            firwin + overlap-add → 0.1–100 Hz
//!   ├─ notch (FIR)                50 Hz mains
//!   ├─ reference                  per-timepoint channel mean removed
//!   ├─ ica                        FastICA, blink components subtracted
//!   ├─ low-pass (FIR)             30 Hz
//!   ├─ epoch                      (−0.2, 0.6) s windows per condition,
//!   │                             baseline (None, 0), 120 µV p-p rejection
//!   └─ evoked                     per-condition average → sub-{id}_{cond}-ave
//!        │
//!        └─→ aggregate::grand_average()   mean across subjects + plots
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use erp::{process_subject, run_subjects, PipelineConfig};
//! use erp::aggregate::grand_average;
//! use erp::epoch::Condition;
//!
//! let cfg = PipelineConfig::default();
//!
//! // Stages 1+2 for twelve subjects (data-parallel, subject-isolated).
//! let subjects: Vec<String> = (1..=12).map(|i| format!("{i:02}")).collect();
//! let outcomes = run_subjects(&cfg, &subjects);
//! for (subject, result) in &outcomes {
//!     if let Err(e) = result {
//!         eprintln!("subject {subject} failed: {e:#}");
//!     }
//! }
//!
//! // Stage 3: grand average over whatever evoked files exist.
//! let ga = grand_average(&cfg, &subjects, Condition::Feedback).unwrap();
//! println!("{} subjects in the grand average", ga.inputs.len());
//! ```

pub mod aggregate;
pub mod config;
pub mod epoch;
pub mod evoked;
pub mod filter;
pub mod ica;
pub mod io;
pub mod reference;
pub mod resample;
pub mod spectrum;
pub mod vis;

use anyhow::{Context, Result};
use rayon::prelude::*;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `erp::Foo` without having to know the internal module layout.

// config
pub use config::{EpochWindow, IcaConfig, PipelineConfig};

// io
pub use io::{Event, Recording, StWriter};

// epoch / evoked / aggregate
pub use aggregate::{combine, grand_average, GrandAverage};
pub use epoch::{extract_epochs, Condition, EpochSet};
pub use evoked::Evoked;

// dsp building blocks
pub use filter::{
    apply_fir_zero_phase, design_bandpass, design_highpass, design_lowpass, design_notch,
};
pub use ica::{remove_artifacts, IcaReport};
pub use reference::average_reference_inplace;
pub use resample::resample;
pub use spectrum::{welch_psd, Psd};

/// How one condition of one subject went through the epoch builder.
#[derive(Debug, Clone)]
pub struct ConditionSummary {
    pub condition: Condition,
    /// Epochs retained and averaged; `0` means no evoked file was written.
    pub n_epochs: usize,
    pub n_rejected: usize,
    pub n_skipped: usize,
}

/// Per-subject outcome of stages 1 and 2.
#[derive(Debug, Clone)]
pub struct SubjectReport {
    pub subject: String,
    pub n_channels: usize,
    pub sfreq: f64,
    pub ica_excluded: Vec<usize>,
    pub conditions: Vec<ConditionSummary>,
}

/// Clean one loaded recording in place: resample, band-pass, notch, average
/// reference, ICA artifact removal, post-ICA low-pass.
///
/// Channel layout is untouched; the sampling rate afterwards is
/// `cfg.target_sfreq`.
pub fn preprocess(rec: &mut Recording, cfg: &PipelineConfig) -> Result<ica::IcaReport> {
    if (rec.sfreq - cfg.target_sfreq).abs() > 1e-3 {
        log::info!("resampling {} Hz → {} Hz", rec.sfreq, cfg.target_sfreq);
        let ratio = cfg.target_sfreq / rec.sfreq;
        rec.data = resample::resample(&rec.data, rec.sfreq, cfg.target_sfreq)?;
        // Event markers live on the sample axis and must follow it.
        for ev in &mut rec.events {
            ev.sample = (ev.sample as f64 * ratio).round() as i64;
        }
        rec.sfreq = cfg.target_sfreq;
    }

    let h = filter::design_bandpass(cfg.prefilter_l_freq, cfg.prefilter_h_freq, rec.sfreq);
    filter::apply_fir_zero_phase(&mut rec.data, &h)?;

    if let Some(f0) = cfg.notch_freq {
        let h = filter::design_notch(f0, rec.sfreq);
        filter::apply_fir_zero_phase(&mut rec.data, &h)?;
    }

    reference::average_reference_inplace(&mut rec.data);

    let report = ica::remove_artifacts(&mut rec.data, &cfg.ica)?;

    let h = filter::design_lowpass(cfg.post_lowpass, rec.sfreq);
    filter::apply_fir_zero_phase(&mut rec.data, &h)?;

    Ok(report)
}

/// Run stages 1 and 2 for one subject: load, clean, epoch, average, persist,
/// and write the diagnostic plots.
///
/// Every failure is scoped to this subject; other subjects' outputs are never
/// touched.  A condition with zero retained epochs is reported and skipped
/// without writing a file.
pub fn process_subject(cfg: &PipelineConfig, subject: &str) -> Result<SubjectReport> {
    let raw_path = cfg.raw_path(subject);
    log::info!("subject {subject}: loading {}", raw_path.display());
    let mut rec = Recording::load(&raw_path)?;
    let n_channels = rec.data.nrows();

    let ica_report = preprocess(&mut rec, cfg)?;
    debug_assert_eq!(rec.data.nrows(), n_channels);

    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating output directory {}", cfg.out_dir.display()))?;
    let plots = cfg.plots_dir();

    // PSD of the cleaned recording, one figure per subject.
    let psd = spectrum::welch_psd(&rec.data, rec.sfreq, 1024)?;
    vis::plot_psd(
        &psd,
        &rec.ch_names,
        &format!("sub-{subject} cleaned"),
        &plots.join(format!("sub-{subject}_psd.html")),
    )?;

    let mut conditions = Vec::with_capacity(Condition::ALL.len());
    for condition in Condition::ALL {
        let set = extract_epochs(&rec, condition, cfg)?;
        let summary = ConditionSummary {
            condition,
            n_epochs: set.n_epochs(),
            n_rejected: set.n_rejected,
            n_skipped: set.n_skipped,
        };

        match Evoked::from_epochs(&set, subject, &rec.ch_names) {
            Ok(evoked) => {
                evoked.save(&cfg.evoked_path(subject, condition.label()))?;
                vis::plot_evoked(
                    &evoked,
                    &plots.join(format!("sub-{subject}_{condition}_evoked.html")),
                )?;
                vis::plot_topography(
                    &evoked,
                    &rec.chan_pos,
                    &plots.join(format!("sub-{subject}_{condition}_topo.html")),
                )?;
            }
            Err(e) => {
                log::warn!("subject {subject}: {e:#}; no average written");
            }
        }
        conditions.push(summary);
    }

    Ok(SubjectReport {
        subject: subject.to_string(),
        n_channels,
        sfreq: rec.sfreq,
        ica_excluded: ica_report.excluded,
        conditions,
    })
}

/// Run [`process_subject`] for every subject, in parallel.
///
/// Subjects share nothing mutable, so a failure on one leaves the others'
/// outputs intact; each outcome is returned alongside its subject id.
pub fn run_subjects(
    cfg: &PipelineConfig,
    subjects: &[String],
) -> Vec<(String, Result<SubjectReport>)> {
    subjects
        .par_iter()
        .map(|subject| {
            let outcome = process_subject(cfg, subject);
            if let Err(e) = &outcome {
                log::error!("subject {subject} failed: {e:#}");
            }
            (subject.clone(), outcome)
        })
        .collect()
}
