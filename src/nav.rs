//! Retrying, multi-strategy page navigation with readiness polling.
//!
//! Navigation never raises: direct navigation is tried first, then a
//! script-based fallback, each followed by a settle delay, for a small
//! fixed number of attempts. Failure is reported as a boolean and the
//! caller degrades to "skip this card".

use crate::browser::Dom;
use crate::finder::Locator;
use crate::poll::{bounded_poll, settle};
use std::time::Duration;

/// Navigate to `url`, direct first then script fallback, up to `tries`
/// rounds. `page_settle` follows every attempt that dispatched.
pub async fn goto_robust(
    dom: &dyn Dom,
    url: &str,
    tries: u32,
    page_settle: Duration,
    tick: Duration,
) -> bool {
    for attempt in 1..=tries.max(1) {
        match dom.navigate(url).await {
            Ok(()) => {
                settle(page_settle).await;
                tracing::debug!("nav direct ok (attempt {attempt}): {url}");
                return true;
            }
            Err(e) => {
                tracing::warn!("nav direct failed (attempt {attempt}): {e}");
                settle(tick).await;
            }
        }
        match dom.navigate_script(url).await {
            Ok(()) => {
                settle(page_settle).await;
                tracing::debug!("nav script ok (attempt {attempt}): {url}");
                return true;
            }
            Err(e) => {
                tracing::warn!("nav script failed (attempt {attempt}): {e}");
                settle(tick).await;
            }
        }
    }
    false
}

/// Poll until any one of the readiness locators matches a visible element.
/// Each locator is an independent structural probe; any single one is
/// sufficient, and any may be transiently absent.
pub async fn wait_ready(
    dom: &dyn Dom,
    probes: &[Locator],
    tick: Duration,
    timeout: Duration,
) -> bool {
    bounded_poll(
        || async move {
            for locator in probes {
                if locator.present(dom).await {
                    return true;
                }
            }
            false
        },
        tick,
        timeout,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder;
    use crate::testing::FakeDom;

    #[tokio::test(start_paused = true)]
    async fn test_goto_robust_reports_failure_as_bool() {
        let dom = FakeDom::new();
        dom.fail_navigation(true);
        let ok = goto_robust(
            &dom,
            "https://example.com/",
            2,
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .await;
        assert!(!ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_goto_robust_script_fallback() {
        let dom = FakeDom::new();
        dom.fail_direct_navigation_only(true);
        let ok = goto_robust(
            &dom,
            "https://example.com/",
            2,
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .await;
        assert!(ok);
        assert_eq!(dom.current_url().await.unwrap(), "https://example.com/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_any_probe_sufficient() {
        let dom = FakeDom::new();
        dom.push_tile("Tile\n$5 off", "Tile");
        let ready = wait_ready(
            &dom,
            &[finder::hub_shell(), finder::add_offer_buttons()],
            Duration::from_millis(50),
            Duration::from_secs(1),
        )
        .await;
        assert!(ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_times_out_quietly() {
        let dom = FakeDom::new();
        let ready = wait_ready(
            &dom,
            &[finder::hub_shell()],
            Duration::from_millis(50),
            Duration::from_millis(300),
        )
        .await;
        assert!(!ready);
    }
}
