//! Runtime configuration.
//!
//! Everything is environment-driven with typed defaults so a run can be
//! tuned without rebuilding. Variables use the `OFFERLOOP_` prefix.

use std::time::Duration;

/// Offer hub route on the issuer dashboard.
pub const DEFAULT_HOME_URL: &str = "https://www.chase.com/";
pub const DEFAULT_POST_LOGIN_URL: &str = "https://secure.chase.com/web/auth/dashboard#/";
pub const DEFAULT_OFFER_HUB_URL: &str =
    "https://secure.chase.com/web/auth/dashboard#/dashboard/merchantOffers/offer-hub";
/// URL fragment identifying the step-up authentication page.
pub const DEFAULT_MFA_FRAGMENT: &str = "recognizeUser/provideAuthenticationCode";
/// Hash-route template for a card's offer categories view.
pub const CATEGORIES_ROUTE: &str = "/dashboard/merchantOffers/offerCategoriesPage";

/// Optional credentials for the one-shot step-up password prefill.
/// Login itself stays human-driven; these only save retyping.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account ids, in the order their cards are processed.
    pub accounts: Vec<String>,
    /// Card holder label written into every row.
    pub holder: String,
    /// Default card name when the detail page yields none.
    pub card_name_default: String,

    pub home_url: String,
    pub post_login_url: String,
    pub offer_hub_url: String,
    pub mfa_fragment: String,

    /// Base polling interval.
    pub poll_tick: Duration,
    /// Settle delay after a page navigation.
    pub page_settle: Duration,
    /// Settle delay after clicking an enroll control.
    pub click_delay: Duration,
    /// Settle delay after navigating back from a detail view.
    pub back_wait: Duration,
    /// Pause between consecutive offers.
    pub between_offers: Duration,
    /// Settle delay after switching cards.
    pub card_settle: Duration,
    /// Upper bound on waiting for the human login/MFA flow.
    pub login_wait_max: Duration,
    /// Upper bound on waiting for offer tiles to appear.
    pub tile_wait: Duration,
    /// Readiness wait for the hub / categories shells.
    pub ready_wait: Duration,
    /// Post-click confirmation window.
    pub confirm_wait: Duration,

    /// Consecutive empty finder polls before a pass is considered done.
    pub idle_cycle_limit: u32,
    /// Hard cap on enroll clicks per pass, guarding a misbehaving page.
    pub safety_click_cap: u32,
    /// Rows per sink append call.
    pub append_chunk_size: usize,

    /// Spreadsheet id of the sink.
    pub sheet_id: String,
    /// OAuth bearer token for the sink API.
    pub sheet_token: String,

    /// Close the browser when the run finishes instead of holding the
    /// session open until interrupt.
    pub close_on_exit: bool,

    pub credentials: Option<Credentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            holder: String::new(),
            card_name_default: "Credit Card".to_string(),
            home_url: DEFAULT_HOME_URL.to_string(),
            post_login_url: DEFAULT_POST_LOGIN_URL.to_string(),
            offer_hub_url: DEFAULT_OFFER_HUB_URL.to_string(),
            mfa_fragment: DEFAULT_MFA_FRAGMENT.to_string(),
            poll_tick: Duration::from_millis(60),
            page_settle: Duration::from_millis(600),
            click_delay: Duration::from_millis(250),
            back_wait: Duration::from_millis(250),
            between_offers: Duration::from_millis(250),
            card_settle: Duration::from_millis(1400),
            login_wait_max: Duration::from_secs(420),
            tile_wait: Duration::from_secs(12),
            ready_wait: Duration::from_secs(8),
            confirm_wait: Duration::from_secs(2),
            idle_cycle_limit: 3,
            safety_click_cap: 200,
            append_chunk_size: 400,
            sheet_id: String::new(),
            sheet_token: String::new(),
            close_on_exit: false,
            credentials: None,
        }
    }
}

impl Config {
    /// Build the configuration from the environment.
    pub fn from_env() -> Self {
        let d = Config::default();
        let credentials = match (
            read_env_string("OFFERLOOP_USERNAME"),
            read_env_string("OFFERLOOP_PASSWORD"),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials { username, password })
            }
            _ => None,
        };

        Self {
            accounts: read_env_string("OFFERLOOP_ACCOUNT_IDS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            holder: read_env_string("OFFERLOOP_HOLDER").unwrap_or_default(),
            card_name_default: read_env_string("OFFERLOOP_CARD_NAME_DEFAULT")
                .unwrap_or(d.card_name_default),
            home_url: read_env_string("OFFERLOOP_HOME_URL").unwrap_or(d.home_url),
            post_login_url: read_env_string("OFFERLOOP_POST_LOGIN_URL").unwrap_or(d.post_login_url),
            offer_hub_url: read_env_string("OFFERLOOP_OFFER_HUB_URL").unwrap_or(d.offer_hub_url),
            mfa_fragment: read_env_string("OFFERLOOP_MFA_FRAGMENT").unwrap_or(d.mfa_fragment),
            poll_tick: read_env_millis("OFFERLOOP_POLL_TICK_MS", d.poll_tick),
            page_settle: read_env_millis("OFFERLOOP_PAGE_SETTLE_MS", d.page_settle),
            click_delay: read_env_millis("OFFERLOOP_CLICK_DELAY_MS", d.click_delay),
            back_wait: read_env_millis("OFFERLOOP_BACK_WAIT_MS", d.back_wait),
            between_offers: read_env_millis("OFFERLOOP_BETWEEN_OFFERS_MS", d.between_offers),
            card_settle: read_env_millis("OFFERLOOP_CARD_SETTLE_MS", d.card_settle),
            login_wait_max: read_env_secs("OFFERLOOP_LOGIN_WAIT_MAX_SECS", d.login_wait_max),
            tile_wait: read_env_secs("OFFERLOOP_TILE_WAIT_SECS", d.tile_wait),
            ready_wait: read_env_secs("OFFERLOOP_READY_WAIT_SECS", d.ready_wait),
            confirm_wait: read_env_secs("OFFERLOOP_CONFIRM_WAIT_SECS", d.confirm_wait),
            idle_cycle_limit: read_env_u32("OFFERLOOP_IDLE_CYCLE_LIMIT", d.idle_cycle_limit).max(1),
            safety_click_cap: read_env_u32("OFFERLOOP_SAFETY_CLICK_CAP", d.safety_click_cap).max(1),
            append_chunk_size: read_env_usize("OFFERLOOP_APPEND_CHUNK_SIZE", d.append_chunk_size)
                .max(1),
            sheet_id: read_env_string("OFFERLOOP_SHEET_ID").unwrap_or_default(),
            sheet_token: read_env_string("OFFERLOOP_SHEET_TOKEN").unwrap_or_default(),
            close_on_exit: read_env_bool("OFFERLOOP_CLOSE_ON_EXIT", d.close_on_exit),
            credentials,
        }
    }

    /// Hash route for a card's categories view, all categories expanded.
    pub fn categories_route(&self, account_id: &str) -> String {
        format!("{CATEGORIES_ROUTE}?accountId={account_id}&offerCategoryName=ALL")
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
}

fn read_env_millis(name: &str, default_value: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default_value)
}

fn read_env_secs(name: &str, default_value: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default_value)
}

fn read_env_bool(name: &str, default_value: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
        .unwrap_or(default_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.idle_cycle_limit, 3);
        assert_eq!(cfg.append_chunk_size, 400);
        assert_eq!(cfg.safety_click_cap, 200);
        assert!(cfg.confirm_wait >= Duration::from_secs(1));
    }

    #[test]
    fn test_categories_route_carries_account() {
        let cfg = Config::default();
        let route = cfg.categories_route("1091891200");
        assert!(route.contains("accountId=1091891200"));
        assert!(route.starts_with(CATEGORIES_ROUTE));
    }
}
