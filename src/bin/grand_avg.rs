use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use erp::epoch::Condition;
use erp::{grand_average, vis, PipelineConfig};

#[derive(Parser)]
#[command(name = "grand_avg", about = "Grand average across subjects' evoked files")]
struct Args {
    /// Subject ids, comma-separated (e.g. 01,02,03)
    #[arg(long)]
    subjects: String,

    /// Directory holding the evoked files written by `pipeline`
    #[arg(long, default_value = "derivatives")]
    out_dir: PathBuf,

    /// Channel name for the comparison plot (default: first channel)
    #[arg(long)]
    channel: Option<String>,
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
        out_dir: args.out_dir,
        ..PipelineConfig::default()
    };

    for condition in Condition::ALL {
        let ga = match grand_average(&cfg, &subjects, condition) {
            Ok(ga) => ga,
            Err(e) => {
                eprintln!("{condition}: {e:#}");
                continue;
            }
        };

        let channel = match &args.channel {
            Some(name) => ga
                .evoked
                .ch_names
                .iter()
                .position(|n| n == name)
                .with_context(|| format!("channel '{name}' not found"))?,
            None => 0,
        };

        vis::plot_grand_average(
            &ga,
            channel,
            &cfg.plots_dir().join(format!("grand_{condition}.html")),
        )?;

        println!(
            "{condition}: {} subjects averaged, {} excluded",
            ga.inputs.len(),
            ga.excluded.len()
        );
        for (subject, reason) in &ga.excluded {
            println!("  excluded sub-{subject}: {reason}");
        }
    }

    Ok(())
}
