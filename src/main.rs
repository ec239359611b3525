mod browser;
mod cli;
mod engine;
mod error;
mod logging;
mod model;
mod orchestrator;
mod retry;
#[cfg(test)]
mod test_support;
mod text_summary;

use clap::Parser;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the real environment still applies.
    let _ = dotenvy::dotenv();
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(e) if cli::is_informational(&e) => e.exit(),
        Err(e) => {
            let message = e.to_string();
            match logging::init(&cli::fallback_log_dir()) {
                Ok(()) => tracing::error!("Process failed: {}", message.trim_end()),
                Err(log_err) => eprintln!("{log_err:#}\n{}", message.trim_end()),
            }
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&args.log_dir) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    match cli::run(args).await {
        Ok(()) => {
            tracing::info!("Process completed successfully");
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("Process failed: {e:#}");
            std::process::exit(1);
        }
    }
}
