use clap::Parser;
use rustdoc_implementors::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr; stdout carries the consumer's output
    rustdoc_implementors::tracing::init(args.verbose);

    let options = args.resolve()?;
    if options.fragments.is_empty() {
        tracing::warn!("No fragments given; nothing will be delivered");
    }

    let deliveries = cli::run(&options)?;
    tracing::debug!("Consumer received {} deliveries", deliveries);

    Ok(())
}
