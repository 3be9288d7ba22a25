//! Grand averaging across subjects (stage 3).
//!
//! Loads every subject's evoked file for one condition, checks each against
//! the first successfully loaded layout, and averages what remains.  Missing
//! or shape-mismatched subjects are reported and excluded instead of silently
//! skewing the group mean.
use anyhow::{bail, Result};
use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::epoch::Condition;
use crate::evoked::Evoked;

/// Result of aggregating one condition across subjects.
pub struct GrandAverage {
    /// The group-level mean, shaped like a per-subject evoked.
    pub evoked: Evoked,
    /// Per-subject evokeds that went into the mean (kept for plotting).
    pub inputs: Vec<Evoked>,
    /// Subjects left out, with the reason.
    pub excluded: Vec<(String, String)>,
}

/// Mean of per-subject evokeds, verifying layout consistency.
///
/// The first evoked defines the reference layout; later ones that disagree in
/// channel count, sample count or sampling rate are excluded with a reason.
/// Errors only when nothing usable remains.
pub fn combine(evokeds: Vec<Evoked>, condition: Condition) -> Result<GrandAverage> {
    let mut excluded: Vec<(String, String)> = Vec::new();
    let mut inputs: Vec<Evoked> = Vec::new();

    for ev in evokeds {
        if let Some(reference) = inputs.first() {
            if ev.data.dim() != reference.data.dim() {
                excluded.push((
                    ev.subject.clone(),
                    format!(
                        "shape {:?} does not match reference {:?}",
                        ev.data.dim(),
                        reference.data.dim()
                    ),
                ));
                continue;
            }
            if (ev.sfreq - reference.sfreq).abs() > 1e-9 {
                excluded.push((
                    ev.subject.clone(),
                    format!("sfreq {} does not match reference {}", ev.sfreq, reference.sfreq),
                ));
                continue;
            }
        }
        inputs.push(ev);
    }

    for (subject, reason) in &excluded {
        log::warn!("excluding subject {subject} from grand average: {reason}");
    }

    if inputs.is_empty() {
        bail!("no usable subjects for condition '{condition}'");
    }

    let reference = &inputs[0];
    let mut sum: Array2<f64> = Array2::zeros(reference.data.dim());
    for ev in &inputs {
        sum += &ev.data;
    }
    let data = sum / inputs.len() as f64;

    let evoked = Evoked {
        condition,
        subject: "grand".to_string(),
        data,
        tmin: reference.tmin,
        sfreq: reference.sfreq,
        ch_names: reference.ch_names.clone(),
        n_epochs: inputs.iter().map(|e| e.n_epochs).sum(),
    };

    log::info!(
        "grand average for '{condition}': {} subjects in, {} excluded",
        inputs.len(),
        excluded.len()
    );

    Ok(GrandAverage { evoked, inputs, excluded })
}

/// Load each subject's evoked file for `condition` and combine them.
///
/// A subject whose file is missing or unreadable is excluded with a reason,
/// not fatal to the aggregation.
pub fn grand_average(
    cfg: &PipelineConfig,
    subjects: &[String],
    condition: Condition,
) -> Result<GrandAverage> {
    let mut loaded: Vec<Evoked> = Vec::new();
    let mut load_failures: Vec<(String, String)> = Vec::new();

    for subject in subjects {
        let path = cfg.evoked_path(subject, condition.label());
        match Evoked::load(&path) {
            Ok(ev) => loaded.push(ev),
            Err(e) => {
                log::warn!("excluding subject {subject} from grand average: {e:#}");
                load_failures.push((subject.clone(), format!("{e:#}")));
            }
        }
    }

    let mut ga = combine(loaded, condition)?;
    ga.excluded.extend(load_failures);
    Ok(ga)
}
