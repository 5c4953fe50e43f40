//! Daily quote shorts: fetch a fresh quote and stock clip, render a vertical
//! short for each, deliver them and remember what was used.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use daily_quote_shorts::config::Config;
use daily_quote_shorts::init;
use daily_quote_shorts::logging::init_logging;
use daily_quote_shorts::pipeline::{RunOptions, run_generation};

#[derive(Parser)]
#[command(
    name = "daily-quote-shorts",
    about = "Generate vertical quote videos over stock footage",
    version
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Number of videos to produce (overrides videos_per_run)
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Add spoken narration to every video
    #[arg(long)]
    narrate: bool,

    /// Ignore and do not update the usage history
    #[arg(long)]
    no_history: bool,

    /// Skip e-mail delivery and publishing
    #[arg(long)]
    skip_delivery: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        if let Some(count) = self.count {
            cfg.videos_per_run = count;
        }
        if self.narrate {
            cfg.narration = true;
        }
        if self.no_history {
            cfg.dedup = false;
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut cfg = Config::load(&cli.config).await?;
    cli.apply(&mut cfg);
    init_logging(&cfg.logging);
    cfg.validate()?;

    init::ensure_directories(&cfg.output_dir, &cfg.font_path).await?;
    init::check_ffmpeg().await;

    let opts = RunOptions {
        skip_delivery: cli.skip_delivery,
    };
    let summary = run_generation(&cfg, &opts).await?;

    for video in &summary.videos {
        println!(
            "{}  ({:.1} MB)  \"{}\" — {}",
            video.video.path.display(),
            video.video.size_mb(),
            video.quote.content,
            video.quote.author
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[ERROR] {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["daily-quote-shorts", "--count", "1", "--narrate", "--no-history"]);
        let mut cfg = Config::default();
        cli.apply(&mut cfg);

        assert_eq!(cfg.videos_per_run, 1);
        assert!(cfg.narration);
        assert!(!cfg.dedup);
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn defaults_leave_config_alone() {
        let cli = Cli::parse_from(["daily-quote-shorts"]);
        let mut cfg = Config::default();
        cli.apply(&mut cfg);

        assert_eq!(cfg.videos_per_run, 3);
        assert!(!cfg.narration);
        assert!(cfg.dedup);
        assert!(!cli.skip_delivery);
    }
}
