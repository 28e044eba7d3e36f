//! Run orchestration: one full sweep over every configured card.
//!
//! A run is: repair headers, load the dedup baseline from the sink, then
//! for each account reach its categories page and drain it with the
//! enroll loop. A card that cannot be reached is skipped, never fatal.
//! The run ends with a guaranteed writer flush and, when it completed
//! normally, the sheet maintenance sweep (date normalization, exact
//! duplicate removal, filter reset).

use crate::browser::Dom;
use crate::config::Config;
use crate::enroll;
use crate::extract::dates;
use crate::finder;
use crate::fingerprint::DedupLedger;
use crate::nav;
use crate::poll::settle;
use crate::sink::writer::BatchWriter;
use crate::sink::{sink_log, OfferRow, Sink, SinkResult, DATE_COLUMNS};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cards_processed: usize,
    pub cards_skipped: usize,
    pub rows_added: usize,
    pub interrupted: bool,
}

/// Execute a full run against an already-authenticated session.
pub async fn run(
    dom: &dyn Dom,
    sink: &dyn Sink,
    cfg: &Config,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    sink.ensure_headers()
        .await
        .context("ensuring worksheet headers")?;

    let baseline: Vec<OfferRow> = sink
        .read_all()
        .await
        .context("loading dedup baseline")?
        .iter()
        .map(|cells| OfferRow::from_cells(cells))
        .collect();
    let mut ledger = DedupLedger::new();
    ledger.load_baseline(&baseline);
    tracing::info!("dedup baseline: {} keys from {} rows", ledger.len(), baseline.len());

    let mut writer = BatchWriter::new(sink, cfg.append_chunk_size);
    let mut summary = RunSummary::default();
    let today = chrono::Local::now().date_naive();

    // no accounts configured: process whatever card the hub lands on
    let accounts: Vec<String> = if cfg.accounts.is_empty() {
        vec![String::new()]
    } else {
        cfg.accounts.clone()
    };

    for account in &accounts {
        if stop.load(Ordering::Relaxed) {
            summary.interrupted = true;
            break;
        }
        let label = if account.is_empty() { "(default)" } else { account };
        if !go_to_offers(dom, cfg, account).await {
            tracing::warn!("card {label}: categories page unreachable, skipping");
            sink_log(sink, "WARNING", "go_to_offers", &format!("skipped card {label}")).await;
            summary.cards_skipped += 1;
            continue;
        }
        let added = enroll::enroll_all(dom, cfg, &mut ledger, &mut writer, today, stop).await;
        tracing::info!("card {label}: {added} new offers");
        sink_log(sink, "INFO", "enroll_all", &format!("card {label}: {added} new offers")).await;
        summary.cards_processed += 1;
        summary.rows_added += added;
        settle(cfg.card_settle).await;
    }
    if stop.load(Ordering::Relaxed) {
        summary.interrupted = true;
    }

    // rows must reach the sink even on the interrupt path
    if let Err(e) = writer.flush().await {
        tracing::error!("final flush left {} rows unpersisted: {e}", writer.pending());
        sink_log(sink, "ERROR", "run", &format!("final flush failed: {e}")).await;
    }

    if !summary.interrupted {
        run_maintenance(sink, today).await;
    }
    sink_log(
        sink,
        "INFO",
        "run",
        &format!(
            "run finished: {} cards, {} skipped, {} rows",
            summary.cards_processed, summary.cards_skipped, summary.rows_added
        ),
    )
    .await;
    Ok(summary)
}

/// Shadow-piercing lookup of the hub's card selector, choosing the option
/// whose value or label mentions `account_id`. Best-effort: markup drift
/// here degrades to the hash-route navigation below.
const SELECT_ACCOUNT_JS: &str = r#"
(function() {
    const deep = (root, sel, out) => {
        for (const el of root.querySelectorAll(sel)) out.push(el);
        for (const el of root.querySelectorAll('*')) {
            if (el.shadowRoot) deep(el.shadowRoot, sel, out);
        }
        return out;
    };
    const options = deep(document, 'mds-select-option, option', []);
    for (const opt of options) {
        const probe = (opt.getAttribute('value') || '') + ' ' + (opt.textContent || '');
        if (probe.includes('__ACCOUNT__')) {
            opt.click();
            return 'selected';
        }
    }
    return 'no-option';
})()
"#;

/// Reach the categories page for one card. Returns false when the page
/// never becomes ready; the caller skips the card.
async fn go_to_offers(dom: &dyn Dom, cfg: &Config, account: &str) -> bool {
    if !nav::goto_robust(dom, &cfg.offer_hub_url, 3, cfg.page_settle, cfg.poll_tick).await {
        return false;
    }
    nav::wait_ready(
        dom,
        &[
            finder::hub_shell(),
            finder::categories_shell(),
            finder::add_offer_buttons(),
        ],
        cfg.poll_tick,
        cfg.ready_wait,
    )
    .await;

    if !account.is_empty() {
        let script = SELECT_ACCOUNT_JS.replace("__ACCOUNT__", &crate::browser::escape_js(account));
        match dom.eval_string(&script).await {
            Ok(result) => tracing::debug!("card selector: {result}"),
            Err(e) => tracing::debug!("card selector script failed: {e}"),
        }
        if let Err(e) = dom.set_hash_route(&cfg.categories_route(account)).await {
            tracing::warn!("hash-route to categories failed: {e}");
        }
        settle(cfg.card_settle).await;
    }

    let ready_probes = [finder::categories_shell(), finder::add_offer_buttons()];
    if nav::wait_ready(dom, &ready_probes, cfg.poll_tick, cfg.ready_wait).await {
        return true;
    }
    // last nudge: follow an in-page link to the categories route
    for node in finder::categories_link().find_first(dom).await {
        if dom.click(node).await.unwrap_or(false) {
            settle(cfg.page_settle).await;
            break;
        }
    }
    nav::wait_ready(dom, &ready_probes, cfg.poll_tick, cfg.ready_wait).await
}

/// Post-run sheet maintenance. Each step is independent and best-effort.
pub async fn run_maintenance(sink: &dyn Sink, today: chrono::NaiveDate) {
    match normalize_sheet_dates(sink, today).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("normalized {n} date cells"),
        Err(e) => tracing::warn!("date normalization failed: {e}"),
    }
    match dedupe_exact_rows(sink).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("removed {n} exact duplicate rows"),
        Err(e) => tracing::warn!("duplicate sweep failed: {e}"),
    }
    if let Err(e) = refresh_filter(sink).await {
        tracing::warn!("filter reset failed: {e}");
    }
}

/// Rewrite every parseable date cell to the canonical format. Cells that
/// do not parse are left alone.
pub async fn normalize_sheet_dates(sink: &dyn Sink, today: chrono::NaiveDate) -> SinkResult<usize> {
    let rows = sink.read_all().await?;
    let mut updated = 0usize;
    for (r, cells) in rows.iter().enumerate() {
        for &c in DATE_COLUMNS.iter() {
            let Some(cell) = cells.get(c) else { continue };
            if cell.trim().is_empty() {
                continue;
            }
            let Some(date) = dates::parse_date_any(cell, today) else {
                continue;
            };
            let canonical = date.format(dates::CANONICAL_FORMAT).to_string();
            if canonical != *cell {
                sink.update_cell(r, c, &canonical).await?;
                updated += 1;
            }
        }
    }
    Ok(updated)
}

/// Remove rows whose full 10-cell tuple repeats, keeping the last
/// occurrence. Scans bottom-up so the kept row is the most recent append.
pub async fn dedupe_exact_rows(sink: &dyn Sink) -> SinkResult<usize> {
    let rows = sink.read_all().await?;
    let mut seen = std::collections::HashSet::new();
    let mut doomed = Vec::new();
    for (i, cells) in rows.iter().enumerate().rev() {
        if !seen.insert(cells.clone()) {
            doomed.push(i);
        }
    }
    // doomed is already highest-first, so earlier deletes don't shift
    // the remaining indices
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for i in &doomed {
        sink.delete_rows(*i, i + 1).await?;
    }
    Ok(doomed.len())
}

/// Re-apply the display filter over the sheet's current extent.
pub async fn refresh_filter(sink: &dyn Sink) -> SinkResult<()> {
    let rows = sink.read_all().await?.len();
    sink.reset_filter(rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::{MemorySink, SinkOp};
    use crate::testing::FakeDom;
    use chrono::NaiveDate;

    fn cfg() -> Config {
        Config {
            holder: "Andrew".into(),
            accounts: vec!["111".into(), "222".into()],
            tile_wait: std::time::Duration::from_millis(500),
            ready_wait: std::time::Duration::from_millis(500),
            ..Config::default()
        }
    }

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_enrolls_and_records_per_card() {
        let dom = FakeDom::new();
        dom.set_categories_ready(true);
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        dom.push_tile("Burger Barn\n$5 off", "Burger Barn");
        let sink = MemorySink::new();
        let stop = AtomicBool::new(false);

        let summary = run(&dom, &sink, &cfg(), &stop).await.unwrap();
        assert_eq!(summary.cards_processed, 2);
        assert_eq!(summary.cards_skipped, 0);
        // the second card finds the page already drained
        assert_eq!(summary.rows_added, 2);
        assert!(sink.headers_ensured());
        assert_eq!(sink.rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_unreachable_cards() {
        let dom = FakeDom::new();
        dom.fail_navigation(true);
        let sink = MemorySink::new();
        let stop = AtomicBool::new(false);

        let summary = run(&dom, &sink, &cfg(), &stop).await.unwrap();
        assert_eq!(summary.cards_processed, 0);
        assert_eq!(summary.cards_skipped, 2);
        assert!(sink.rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_baseline_suppresses_known_offers() {
        let dom = FakeDom::new();
        dom.set_categories_ready(true);
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        let sink = MemorySink::new();
        let known = OfferRow {
            holder: "Andrew".into(),
            last_four: "XXXX".into(),
            card_name: "Credit Card".into(),
            brand: "Coffee Shop".into(),
            discount: "10% cash back".into(),
            max_discount: String::new(),
            min_spend: "None".into(),
            date_added: "Dec 01, 2023".into(),
            expiration: String::new(),
            local: false,
        };
        sink.seed_rows(vec![known.to_cells()]);
        let stop = AtomicBool::new(false);

        let summary = run(&dom, &sink, &cfg(), &stop).await.unwrap();
        assert_eq!(summary.rows_added, 0);
        assert_eq!(sink.rows().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_between_cards_on_interrupt() {
        let dom = FakeDom::new();
        let sink = MemorySink::new();
        let stop = AtomicBool::new(true);

        let summary = run(&dom, &sink, &cfg(), &stop).await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.cards_processed, 0);
        // headers were repaired, but maintenance is skipped on interrupt
        assert_eq!(sink.ops(), vec![SinkOp::EnsureHeaders]);
    }

    #[tokio::test]
    async fn test_normalize_rewrites_parseable_dates_only() {
        let sink = MemorySink::new();
        sink.seed_rows(vec![
            cells_with_dates("01/31/2024", "expires in 30 days"),
            cells_with_dates("Jan 31, 2024", "not a date"),
        ]);

        let n = normalize_sheet_dates(&sink, jan1()).await.unwrap();
        assert_eq!(n, 2);
        let rows = sink.rows();
        assert_eq!(rows[0][7], "Jan 31, 2024");
        assert_eq!(rows[0][8], "Jan 31, 2024");
        assert_eq!(rows[1][7], "Jan 31, 2024"); // already canonical, untouched
        assert_eq!(rows[1][8], "not a date"); // unparseable, left alone
    }

    #[tokio::test]
    async fn test_dedupe_keeps_one_survivor_per_distinct_row() {
        let sink = MemorySink::new();
        let a = cells_with_dates("Jan 01, 2024", "");
        let mut b = a.clone();
        b[3] = "Brand B".into();
        let mut c = a.clone();
        c[3] = "Brand C".into();
        sink.seed_rows(vec![a.clone(), b.clone(), a.clone(), c.clone(), b.clone()]);

        let n = dedupe_exact_rows(&sink).await.unwrap();
        assert_eq!(n, 2);
        // last occurrence of each distinct tuple survives
        assert_eq!(sink.rows(), vec![a, c, b]);
    }

    #[tokio::test]
    async fn test_refresh_filter_spans_current_rows() {
        let sink = MemorySink::new();
        sink.seed_rows(vec![cells_with_dates("Jan 01, 2024", "")]);
        refresh_filter(&sink).await.unwrap();
        assert!(sink.ops().contains(&SinkOp::ResetFilter(1)));
    }

    fn cells_with_dates(added: &str, expiration: &str) -> Vec<String> {
        let row = OfferRow {
            holder: "Andrew".into(),
            last_four: "1234".into(),
            card_name: "Freedom Flex Card".into(),
            brand: "Coffee Shop".into(),
            discount: "10% cash back".into(),
            max_discount: String::new(),
            min_spend: "None".into(),
            date_added: added.into(),
            expiration: expiration.into(),
            local: false,
        };
        row.to_cells()
    }
}
