//! conndash: terminal dashboard over a conndash-daemon.

use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use conndash::client::poll::{self, PollCommand};
use conndash::client::{DEFAULT_API_URL, tui};

#[derive(Parser, Debug)]
#[command(name = "conndash", about = "Terminal dashboard for conntrack data")]
struct Args {
    /// Base URL of the daemon API.
    #[arg(long, default_value = DEFAULT_API_URL, env = "CONNDASH_URL")]
    url: String,

    /// Seconds between automatic refreshes.
    #[arg(long, default_value_t = poll::DEFAULT_INTERVAL.as_secs())]
    interval: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();
    let args = Args::parse();

    let shared = poll::new_shared();
    let (tx, rx) = mpsc::channel::<PollCommand>(16);

    let poller = tokio::spawn(poll::run(
        args.url.clone(),
        Duration::from_secs(args.interval.max(1)),
        shared.clone(),
        rx,
    ));

    tui::run(shared, tx).await?;
    let _ = poller.await;
    Ok(())
}
