use clap::Parser;
use keycase::config::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    log::info!(
        "Normalizing {} to {} keys with {} worker(s)",
        args.input,
        args.case,
        args.workers
    );

    let config = args.into_run_config()?;
    let summary = keycase::pipeline::run(config).await?;

    if summary.fell_back > 0 || summary.skipped > 0 {
        log::warn!(
            "{} records replaced by the fallback, {} malformed records dropped",
            summary.fell_back,
            summary.skipped
        );
    }
    log::info!("Everything is done!");

    Ok(())
}
