// rootstrap/src/main.rs
use std::future::Future;
use std::process;

use clap::Parser;
use colored::Colorize;
use rootstrap_common::error::Result;
use rootstrap_common::{Cache, Config};
use tokio::signal::unix::{signal, SignalKind};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::CliArgs;

/// Exit status after an interrupting signal, as shells report SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("ROOTSTRAP_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

/// Runs the bootstrap until it finishes or `shutdown` resolves, whichever
/// comes first. The cache is consumed either way, so a temporary one never
/// outlives the run.
async fn run_until<F>(config: &Config, cache: Cache, shutdown: F) -> Result<i32>
where
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        biased;
        _ = shutdown => None,
        result = rootstrap_core::bootstrap(config, &cache) => Some(result),
    };

    match outcome {
        Some(result) => {
            result?;
            cache.close()?;
            Ok(0)
        }
        None => {
            warn!("Interrupted, cleaning up");
            drop(cache);
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

async fn run(cli_args: &CliArgs) -> Result<i32> {
    let config = cli_args.config()?;
    let cache = Cache::new(&config)?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
            _ = sigquit.recv() => {}
        }
    };

    run_until(&config, cache, shutdown).await
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    let code = match run(&cli_args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Bootstrap failed: {:#}", e);
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            1
        }
    };

    debug!("Exiting with status {}", code);
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(work: &std::path::Path) -> Config {
        Config::new(
            work.join("root"),
            Some("x86_64".parse().unwrap()),
            Some("http://127.0.0.1:9/archlinux".into()),
        )
        .unwrap()
        .with_chroot_program(PathBuf::from("/bin/false"))
    }

    #[tokio::test]
    async fn signal_removes_temporary_cache() {
        let work = tempfile::tempdir().unwrap();
        let cfg = config(work.path());
        let cache = Cache::new(&cfg).unwrap();
        let cache_dir = cache.get_dir().to_path_buf();
        assert!(cache_dir.is_dir());

        let code = run_until(&cfg, cache, std::future::ready(())).await.unwrap();

        assert_eq!(code, INTERRUPTED_EXIT_CODE);
        assert!(!cache_dir.exists());
    }

    #[tokio::test]
    async fn signal_keeps_preserved_cache() {
        let work = tempfile::tempdir().unwrap();
        let cfg = config(work.path()).with_cache_dir(Some(work.path().join("cache")));
        let cache = Cache::new(&cfg).unwrap();

        let code = run_until(&cfg, cache, std::future::ready(())).await.unwrap();

        assert_eq!(code, INTERRUPTED_EXIT_CODE);
        assert!(work.path().join("cache").is_dir());
    }

    #[tokio::test]
    async fn failed_run_removes_temporary_cache() {
        let work = tempfile::tempdir().unwrap();
        let cfg = config(work.path());
        let cache = Cache::new(&cfg).unwrap();
        let cache_dir = cache.get_dir().to_path_buf();

        // Nothing listens on the discard port, so the index fetch fails.
        let result = run_until(&cfg, cache, std::future::pending()).await;

        assert!(result.is_err());
        assert!(!cache_dir.exists());
    }
}
