//! The enrollment loop.
//!
//! One call processes every enrollable offer currently reachable on the
//! categories page for one card. Each pass re-queries the live tile set,
//! skips tiles already attempted this pass (by fingerprint), clicks the
//! next fresh one, classifies the confirmation, extracts a row, and gates
//! it through the cross-run dedup ledger before queueing it for append.
//!
//! Termination is by idle cycles: several consecutive polls that surface
//! no fresh tile mean the page is drained. A hard click cap guards against
//! a page that keeps minting tiles.

use crate::browser::{Dom, NodeId};
use crate::config::Config;
use crate::confirm::{self, Confirmation};
use crate::extract::{self, TileFacts};
use crate::finder;
use crate::fingerprint::{fingerprint, DedupLedger, PassLedger};
use crate::poll::{bounded_poll, settle};
use crate::sink::writer::BatchWriter;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};

/// Enroll every fresh offer on the current page. Returns the number of
/// rows queued to the writer.
///
/// `stop` is the cooperative interrupt flag: the loop checks it between
/// offers and still runs its end-of-pass flush, so interrupting never
/// drops queued rows.
pub async fn enroll_all(
    dom: &dyn Dom,
    cfg: &Config,
    ledger: &mut DedupLedger,
    writer: &mut BatchWriter<'_>,
    today: NaiveDate,
    stop: &AtomicBool,
) -> usize {
    expand_page(dom, cfg).await;

    let tiles_appeared = bounded_poll(
        || async move { finder::add_offer_buttons().present(dom).await },
        cfg.poll_tick,
        cfg.tile_wait,
    )
    .await;
    if !tiles_appeared {
        tracing::info!("no offer tiles appeared within {:?}", cfg.tile_wait);
        return 0;
    }

    let mut attempted = PassLedger::new();
    let mut idle_cycles = 0u32;
    let mut clicks = 0u32;
    let mut added = 0usize;

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("interrupt observed, ending pass");
            break;
        }
        if clicks >= cfg.safety_click_cap {
            tracing::warn!("safety click cap ({}) reached, stopping pass", clicks);
            break;
        }

        let Some((node, facts)) = next_fresh_tile(dom, &mut attempted).await else {
            idle_cycles += 1;
            if idle_cycles >= cfg.idle_cycle_limit {
                tracing::info!("page drained after {idle_cycles} idle cycles");
                break;
            }
            settle(cfg.poll_tick).await;
            continue;
        };
        idle_cycles = 0;

        if !dom.click(node).await.unwrap_or(false) {
            // already marked attempted, so the tile won't be retried
            tracing::warn!("enroll click did not dispatch, skipping tile");
            let _ = dom.hide(node).await;
            continue;
        }
        clicks += 1;
        settle(cfg.click_delay).await;

        let outcome = confirm::confirm_enrollment(dom, cfg.confirm_wait, cfg.poll_tick).await;
        confirm::dismiss_enroll_error(dom).await;

        let row = match outcome {
            Confirmation::Detail => {
                let row = extract::row_from_detail(
                    dom,
                    &cfg.holder,
                    &cfg.card_name_default,
                    &facts,
                    today,
                )
                .await;
                if let Err(e) = dom.back().await {
                    tracing::warn!("back from detail view failed: {e}");
                }
                settle(cfg.back_wait).await;
                row
            }
            Confirmation::InPlace | Confirmation::TimedOut => {
                let _ = dom.hide(node).await;
                extract::row_from_tile(dom, &cfg.holder, &cfg.card_name_default, &facts, today)
                    .await
            }
        };

        if ledger.insert(&row) {
            tracing::info!("enrolled: {} — {}", row.brand, row.discount);
            if let Err(e) = writer.queue(row).await {
                // rows stay buffered, the end-of-pass flush retries
                tracing::warn!("append deferred: {e}");
            }
            added += 1;
        } else {
            tracing::debug!("duplicate suppressed: {} — {}", row.brand, row.discount);
        }
        settle(cfg.between_offers).await;
    }

    if let Err(e) = writer.flush().await {
        tracing::warn!("end-of-pass flush incomplete, {} rows pending: {e}", writer.pending());
    }
    added
}

/// Find the first visible enroll control whose tile has not been attempted
/// this pass, marking it attempted and capturing its facts.
async fn next_fresh_tile(
    dom: &dyn Dom,
    attempted: &mut PassLedger,
) -> Option<(NodeId, TileFacts)> {
    for node in finder::add_offer_buttons().find_visible(dom).await {
        let text = dom.tile_text(node).await.unwrap_or_default();
        let fp = fingerprint(&text);
        if attempted.contains(&fp) {
            // stale leftover from this pass, keep it out of later queries
            let _ = dom.hide(node).await;
            continue;
        }
        attempted.mark(&fp);
        let brand_guess = dom
            .tile_heading(node)
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        return Some((node, TileFacts { text, brand_guess }));
    }
    None
}

/// Expand the offer grid before the pass: click any "show more" controls
/// once and scroll the page end to end so lazy tiles mount.
async fn expand_page(dom: &dyn Dom, cfg: &Config) {
    for node in finder::show_more().find_visible(dom).await {
        if dom.click(node).await.unwrap_or(false) {
            settle(cfg.page_settle).await;
        }
    }
    if let Err(e) = dom.scroll_through().await {
        tracing::debug!("scroll-through failed: {e}");
    }
    settle(cfg.page_settle).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::MemorySink;
    use crate::testing::{FakeDetail, FakeDom};

    fn cfg() -> Config {
        Config {
            holder: "Andrew".into(),
            tile_wait: std::time::Duration::from_millis(500),
            ..Config::default()
        }
    }

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn go() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrolls_every_tile_once() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        dom.push_tile("Burger Barn\n$5 off", "Burger Barn");
        dom.push_tile("Tire World\n15% off", "Tire World");
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();

        let added = enroll_all(&dom, &cfg(), &mut ledger, &mut writer, jan1(), &go()).await;
        assert_eq!(added, 3);
        assert_eq!(dom.added_count(), 3);
        let brands: Vec<String> = sink.offer_rows().iter().map(|r| r.brand.clone()).collect();
        assert_eq!(brands, vec!["Coffee Shop", "Burger Barn", "Tire World"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_path_roundtrips_and_continues() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        dom.push_tile("Burger Barn\n$5 off", "Burger Barn");
        dom.set_click_navigates(
            0,
            FakeDetail {
                pay_with: "Pay with Freedom Flex (...4321)".into(),
                header_amount: "10% cash back".into(),
                header_limit: "Max savings $18".into(),
                terms: "Offer expires 01/31/2024. Max cash back $18.".into(),
                brand: "Coffee Shop".into(),
            },
        );
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();

        let added = enroll_all(&dom, &cfg(), &mut ledger, &mut writer, jan1(), &go()).await;
        assert_eq!(added, 2);
        let rows = sink.offer_rows();
        assert_eq!(rows[0].last_four, "4321");
        assert_eq!(rows[0].card_name, "Freedom Flex Card");
        assert_eq!(rows[0].expiration, "Jan 31, 2024");
        assert_eq!(rows[1].brand, "Burger Barn");
        assert_eq!(rows[1].last_four, "XXXX");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_ledger_gates_repeats() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee Shop\n10% cash back", "Coffee Shop");
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();
        let baseline = crate::sink::OfferRow {
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
        ledger.load_baseline([&baseline]);

        let added = enroll_all(&dom, &cfg(), &mut ledger, &mut writer, jan1(), &go()).await;
        // still clicked (enrollment is idempotent), but no row re-recorded
        assert_eq!(added, 0);
        assert_eq!(dom.added_count(), 1);
        assert!(sink.rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_click_skips_tile_and_finishes() {
        let dom = FakeDom::new();
        dom.push_tile("Broken Tile\n5% off", "Broken Tile");
        dom.push_tile("Good Tile\n$5 off", "Good Tile");
        dom.set_click_fails(0);
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();

        let added = enroll_all(&dom, &cfg(), &mut ledger, &mut writer, jan1(), &go()).await;
        assert_eq!(added, 1);
        assert_eq!(sink.offer_rows()[0].brand, "Good Tile");
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_cap_bounds_a_minting_page() {
        let dom = FakeDom::new();
        dom.push_tile("Seed Deal\n1% off", "Seed Deal");
        dom.respawn_tiles_on_add(true);
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();
        let cfg = Config {
            safety_click_cap: 10,
            ..cfg()
        };

        enroll_all(&dom, &cfg, &mut ledger, &mut writer, jan1(), &go()).await;
        assert_eq!(dom.clicks(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_yields_nothing() {
        let dom = FakeDom::new();
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(&sink, 400);
        let mut ledger = DedupLedger::new();

        let added = enroll_all(&dom, &cfg(), &mut ledger, &mut writer, jan1(), &go()).await;
        assert_eq!(added, 0);
        assert!(sink.rows().is_empty());
    }
}
