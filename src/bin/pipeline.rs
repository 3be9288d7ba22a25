use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use erp::{run_subjects, PipelineConfig};

#[derive(Parser)]
#[command(name = "pipeline", about = "Per-subject ERP preprocessing (filter, ICA, epoch, average)")]
struct Args {
    /// Subject ids, comma-separated (e.g. 01,02,03)
    #[arg(long)]
    subjects: String,

    /// Directory containing sub-{id}_raw.safetensors files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for evoked files and plots
    #[arg(long, default_value = "derivatives")]
    out_dir: PathBuf,

    /// Target sampling rate in Hz
    #[arg(long, default_value_t = 250.0)]
    sfreq: f64,

    /// Peak-to-peak rejection threshold in volts (default: 120 µV)
    #[arg(long, default_value_t = 120e-6)]
    reject_ptp: f64,

    /// Mains notch frequency in Hz; 0 disables the notch
    #[arg(long, default_value_t = 50.0)]
    notch: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let subjects: Vec<String> = args
        .subjects
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let cfg = PipelineConfig {
        data_dir: args.data_dir,
        out_dir: args.out_dir,
        target_sfreq: args.sfreq,
        reject_ptp: args.reject_ptp,
        notch_freq: if args.notch > 0.0 { Some(args.notch) } else { None },
        ..PipelineConfig::default()
    };

    let outcomes = run_subjects(&cfg, &subjects);

    let mut n_failed = 0usize;
    for (subject, outcome) in &outcomes {
        match outcome {
            Ok(report) => {
                println!(
                    "subject {subject}: {} ch @ {} Hz, ICA removed {:?}",
                    report.n_channels, report.sfreq, report.ica_excluded
                );
                for c in &report.conditions {
                    println!(
                        "  {}: {} epochs ({} rejected, {} skipped)",
                        c.condition, c.n_epochs, c.n_rejected, c.n_skipped
                    );
                }
            }
            Err(e) => {
                n_failed += 1;
                eprintln!("subject {subject} FAILED: {e:#}");
            }
        }
    }

    println!("{}/{} subjects processed", outcomes.len() - n_failed, outcomes.len());
    Ok(())
}
