//! Post-click confirmation detector.
//!
//! After the enroll trigger, the page either navigates to a detail view,
//! flips the tile to an in-place "added" state, or does neither within the
//! window. The timeout case is treated as best-effort success — the enroll
//! action is idempotent server-side, so an ambiguous state is never a hard
//! failure.

use crate::browser::Dom;
use crate::finder;
use crate::poll::{bounded_poll, settle};
use std::cell::Cell;
use std::time::Duration;

/// Classified effect of the enroll click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Page transitioned to the offer detail view: rich parse path.
    Detail,
    /// Tile flipped to "added" in place: tile-only parse path.
    InPlace,
    /// Neither observed within the window: assume success, parse the tile.
    TimedOut,
}

/// Poll for the click's effect within `wait`, checking every `tick`.
pub async fn confirm_enrollment(dom: &dyn Dom, wait: Duration, tick: Duration) -> Confirmation {
    let observed = Cell::new(Confirmation::TimedOut);
    let observed = &observed;
    bounded_poll(
        || async move {
            if finder::detail_marker().present(dom).await {
                observed.set(Confirmation::Detail);
                return true;
            }
            if finder::added_marker().present(dom).await {
                observed.set(Confirmation::InPlace);
                return true;
            }
            false
        },
        tick,
        wait,
    )
    .await;
    observed.get()
}

/// Dismiss the transient "unable to enroll" dialog if present. Does not
/// change the confirmation classification.
pub async fn dismiss_enroll_error(dom: &dyn Dom) {
    if !finder::enroll_error_dialog().present(dom).await {
        return;
    }
    tracing::debug!("dismissing enroll-error dialog");
    for node in finder::dialog_close().find_first(dom).await {
        if dom.click(node).await.unwrap_or(false) {
            settle(Duration::from_millis(250)).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDetail, FakeDom};

    #[tokio::test(start_paused = true)]
    async fn test_detail_transition_detected() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee\n10% off", "Coffee");
        dom.set_click_navigates(0, FakeDetail::default());
        let buttons = finder::add_offer_buttons().find_visible(&dom).await;
        dom.click(buttons[0]).await.unwrap();

        let outcome =
            confirm_enrollment(&dom, Duration::from_secs(2), Duration::from_millis(100)).await;
        assert_eq!(outcome, Confirmation::Detail);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_place_added_detected() {
        let dom = FakeDom::new();
        dom.push_tile("Coffee\n10% off", "Coffee");
        let buttons = finder::add_offer_buttons().find_visible(&dom).await;
        dom.click(buttons[0]).await.unwrap();

        let outcome =
            confirm_enrollment(&dom, Duration::from_secs(2), Duration::from_millis(100)).await;
        assert_eq!(outcome, Confirmation::InPlace);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_best_effort_success() {
        let dom = FakeDom::new();
        let outcome =
            confirm_enrollment(&dom, Duration::from_millis(500), Duration::from_millis(100)).await;
        assert_eq!(outcome, Confirmation::TimedOut);
    }
}
