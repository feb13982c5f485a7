//! Drive a stock watcher from the terminal.
//!
//! Each input line is `<user> <command...>`, for example:
//!
//! ```text
//! root /add_channel @deals
//! root /add_product sensor https://shop.example/sensor
//! root /check_now
//! ```
//!
//! Replies, reports and service alerts are written to the log.
//!
//! Run with: cargo run --example console -- [settings file]
//!
//! Without a settings file, state lives in `./stockwatch-data` and `root`
//! is the root operator. `STOCKWATCH_*` variables override either.

use stockwatch::commands::Command;
use stockwatch::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,stockwatch=debug")),
        )
        .with_target(false)
        .init();

    let mut loader = Settings::loader()
        .with_default("data_dir", "./stockwatch-data")
        .with_default("root_user", "root");
    if let Some(path) = std::env::args().nth(1) {
        loader = loader.with_file(path);
    }
    let settings = loader.with_env_overrides("STOCKWATCH", "__").load()?;

    let watch = StockWatch::builder()
        .with_settings(settings)
        .with_sink(TracingSink)
        .build()
        .await?;

    println!("Commands:");
    for (token, description) in Command::catalogue() {
        println!("  {:<26} {}", token, description);
    }
    println!("Type `<user> <command>`, Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some((user, text)) = line.trim().split_once(' ') else {
            continue;
        };
        let request = CommandRequest::new(user, user, text);
        if !watch.handle(&request).await {
            println!("Not a command: {}", text);
        }
    }

    watch.shutdown().await;
    Ok(())
}
