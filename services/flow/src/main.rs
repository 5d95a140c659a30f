//! Flow daemon entry point
//!
//! Loads the configuration, starts the context and the pipeline, and runs
//! until interrupted. Startup failures print one diagnostic line and exit
//! with status 1.

use anyhow::{Context as _, Result};
use clap::Parser;
use flow_actors::{Context, Factories, Pipeline};
use flow_config::FlowConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides `log.level`
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    check: bool,

    /// List the built-in modules and exit
    #[arg(long)]
    list_modules: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("flow: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = FlowConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    if args.check {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let ctx = Context::new(config);
    let factories = Factories::from_context(&ctx);
    if args.list_modules {
        for module in factories.core_modules() {
            println!("{module}");
        }
        return Ok(());
    }

    ctx.start().context("failed to start logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting flow");

    let pipeline = match Pipeline::new(&ctx, factories).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            ctx.stop();
            return Err(e).context("failed to build pipeline");
        }
    };
    if let Err(e) = pipeline.start().await {
        let _ = pipeline.stop().await;
        ctx.stop();
        return Err(e).context("failed to start pipeline");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")?;
    info!("interrupt received, shutting down");

    let stopped = pipeline.stop().await;
    drop(pipeline);
    ctx.stop();
    stopped.context("pipeline stopped with errors")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::parse_from(["flow", "--config", "flow.toml", "-l", "debug"]);
        assert_eq!(args.config, Some(PathBuf::from("flow.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(!args.check);

        let args = Args::parse_from(["flow", "--check"]);
        assert!(args.check);
        assert!(args.config.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.toml");
        std::fs::write(
            &path,
            "[actors.a]\nmodule = \"core.nothing\"\n",
        )
        .unwrap();

        let args = Args::parse_from(["flow", "--config", path.to_str().unwrap()]);
        let err = run(args).await.unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("core.nothing"), "{text}");
    }
}
