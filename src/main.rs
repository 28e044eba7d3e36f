// Copyright 2026 Offerloop Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use offerloop::browser::chromium::ChromiumDom;
use offerloop::config::Config;
use offerloop::sink::sheets::SheetsSink;
use offerloop::{run, session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "offerloop",
    about = "Offerloop — card-linked offer discovery and enrollment",
    version,
    after_help = "Login stays manual: the browser opens the issuer home page and the run\nstarts once you have signed in. Ctrl-C at any point flushes pending rows."
)]
struct Cli {
    /// Card holder label recorded in every row (overrides OFFERLOOP_HOLDER)
    #[arg(long)]
    holder: Option<String>,

    /// Close the browser when the run finishes instead of holding the
    /// session open until Ctrl-C
    #[arg(long)]
    close_on_exit: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "offerloop=debug"
    } else if cli.quiet {
        "offerloop=warn"
    } else {
        "offerloop=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse().expect("log directive is valid")),
        )
        .init();

    let mut cfg = Config::from_env();
    if let Some(holder) = cli.holder {
        cfg.holder = holder;
    }
    if cli.close_on_exit {
        cfg.close_on_exit = true;
    }
    if cfg.holder.is_empty() {
        anyhow::bail!("no card holder configured (set OFFERLOOP_HOLDER or pass --holder)");
    }
    if cfg.sheet_id.is_empty() || cfg.sheet_token.is_empty() {
        anyhow::bail!("sink not configured (set OFFERLOOP_SHEET_ID and OFFERLOOP_SHEET_TOKEN)");
    }

    info!("starting offerloop v{}", env!("CARGO_PKG_VERSION"));
    let sink = SheetsSink::new(cfg.sheet_id.clone(), cfg.sheet_token.clone());
    let dom = ChromiumDom::launch().await.context("launching browser")?;

    // Ctrl-C sets the cooperative stop flag; the run drains at the next
    // offer boundary and flushes whatever is buffered.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current offer and flushing");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    if !session::establish_session(&dom, &cfg).await {
        dom.close().await.ok();
        anyhow::bail!("login was not completed within the window");
    }

    let summary = run::run(&dom, &sink, &cfg, &stop).await?;
    info!(
        "done: {} cards processed, {} skipped, {} rows added{}",
        summary.cards_processed,
        summary.cards_skipped,
        summary.rows_added,
        if summary.interrupted { " (interrupted)" } else { "" }
    );

    if cfg.close_on_exit || stop.load(Ordering::Relaxed) {
        dom.close().await.ok();
        return Ok(());
    }

    // hold the authenticated session open for inspection until Ctrl-C
    info!("run complete; browser stays open, Ctrl-C to exit");
    while !stop.load(Ordering::Relaxed) {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
    dom.close().await.ok();
    Ok(())
}
