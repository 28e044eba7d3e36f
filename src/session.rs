//! Human-in-the-loop login session.
//!
//! Login is never automated. The engine opens the issuer home page and
//! waits, bounded, for the operator to sign in. The only automation allowed
//! here is prefill: when credentials are configured, the home login widget
//! gets username and password typed once at a human pace, and the step-up
//! page gets its password typed once when it appears. The operator submits
//! both.

use crate::browser::Dom;
use crate::config::Config;
use crate::finder;
use crate::poll::{bounded_poll, settle};
use std::time::Duration;

/// Minimum spacing between prefill attempts on the same field.
const PREFILL_RETRY_BACKOFF: Duration = Duration::from_secs(6);

/// Per-session login state. Tracks one prefill guard per surface so each
/// sensitive field is typed into at most once per appearance.
#[derive(Debug, Default)]
pub struct SessionState {
    home_prefilled: bool,
    last_home_attempt: Option<tokio::time::Instant>,
    mfa_prefilled: bool,
    last_mfa_attempt: Option<tokio::time::Instant>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn may_attempt_home(&self) -> bool {
        if self.home_prefilled {
            return false;
        }
        match self.last_home_attempt {
            Some(at) => at.elapsed() >= PREFILL_RETRY_BACKOFF,
            None => true,
        }
    }

    fn may_attempt_mfa(&self) -> bool {
        if self.mfa_prefilled {
            return false;
        }
        match self.last_mfa_attempt {
            Some(at) => at.elapsed() >= PREFILL_RETRY_BACKOFF,
            None => true,
        }
    }
}

/// Wait for the operator to finish logging in, up to `login_wait_max`.
///
/// Success means the current URL sits under the post-login dashboard
/// prefix. While waiting, the step-up page is watched for and prefilled
/// when credentials are available.
pub async fn wait_for_post_login(
    dom: &dyn Dom,
    cfg: &Config,
    state: &mut SessionState,
) -> bool {
    tracing::info!(
        "waiting up to {:?} for manual login at {}",
        cfg.login_wait_max,
        cfg.home_url
    );
    let deadline = tokio::time::Instant::now() + cfg.login_wait_max;
    loop {
        let url = dom.current_url().await.unwrap_or_default();
        if url.starts_with(&cfg.post_login_url) {
            tracing::info!("post-login dashboard reached");
            return true;
        }
        if url.contains(&cfg.mfa_fragment) {
            maybe_prefill_mfa(dom, cfg, state).await;
        } else {
            maybe_prefill_home_login(dom, cfg, state).await;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("login window expired without reaching the dashboard");
            return false;
        }
        settle(cfg.poll_tick.max(Duration::from_millis(250))).await;
    }
}

/// Type the configured username and password into the home login widget,
/// once. A username field the operator has already started filling marks
/// the widget handled; the password is best-effort on top of a verified
/// username.
async fn maybe_prefill_home_login(dom: &dyn Dom, cfg: &Config, state: &mut SessionState) {
    let Some(credentials) = &cfg.credentials else {
        return;
    };
    if !state.may_attempt_home() {
        return;
    }
    let fields = finder::home_username_input().find_first(dom).await;
    let Some(user_field) = fields.first().copied() else {
        return;
    };
    let current = dom.input_value(user_field).await.unwrap_or_default();
    if !current.is_empty() {
        state.home_prefilled = true;
        return;
    }

    state.last_home_attempt = Some(tokio::time::Instant::now());
    if let Err(e) = dom.type_text(user_field, &credentials.username).await {
        tracing::warn!("home login prefill failed: {e}");
        return;
    }
    let typed = dom.input_value(user_field).await.unwrap_or_default();
    if typed != credentials.username {
        tracing::warn!("home login prefill did not stick, will retry after backoff");
        return;
    }

    if let Some(pass_field) = finder::home_password_input()
        .find_first(dom)
        .await
        .first()
        .copied()
    {
        let current = dom.input_value(pass_field).await.unwrap_or_default();
        if current.is_empty() {
            if let Err(e) = dom.type_text(pass_field, &credentials.password).await {
                tracing::warn!("home password prefill failed: {e}");
            }
        }
    }
    tracing::info!("home login prefilled, waiting for operator to submit");
    state.home_prefilled = true;
}

/// Type the configured password into the step-up field, once. Re-attempts
/// are allowed only after a backoff and only while the field stays empty,
/// so a password the operator is editing is never clobbered.
async fn maybe_prefill_mfa(dom: &dyn Dom, cfg: &Config, state: &mut SessionState) {
    let Some(credentials) = &cfg.credentials else {
        return;
    };
    if !state.may_attempt_mfa() {
        return;
    }
    let fields = finder::mfa_password_input().find_first(dom).await;
    let Some(field) = fields.first().copied() else {
        return;
    };
    let current = dom.input_value(field).await.unwrap_or_default();
    if !current.is_empty() {
        state.mfa_prefilled = true;
        return;
    }

    state.last_mfa_attempt = Some(tokio::time::Instant::now());
    match dom.type_text(field, &credentials.password).await {
        Ok(()) => {
            let typed = dom.input_value(field).await.unwrap_or_default();
            if typed == credentials.password {
                tracing::info!("step-up password prefilled, waiting for operator to submit");
                state.mfa_prefilled = true;
            } else {
                tracing::warn!("step-up prefill did not stick, will retry after backoff");
            }
        }
        Err(e) => tracing::warn!("step-up prefill failed: {e}"),
    }
}

/// Open the issuer home page and run the bounded login wait.
pub async fn establish_session(dom: &dyn Dom, cfg: &Config) -> bool {
    let landed = crate::nav::goto_robust(dom, &cfg.home_url, 3, cfg.page_settle, cfg.poll_tick).await;
    if !landed {
        tracing::error!("could not open {}", cfg.home_url);
        return false;
    }
    let mut state = SessionState::new();
    wait_for_post_login(dom, cfg, &mut state).await
}

/// Poll until the URL leaves the step-up page, bounded by `timeout`.
pub async fn wait_past_mfa(dom: &dyn Dom, cfg: &Config, timeout: Duration) -> bool {
    bounded_poll(
        || async move {
            let url = dom.current_url().await.unwrap_or_default();
            !url.contains(&cfg.mfa_fragment)
        },
        cfg.poll_tick.max(Duration::from_millis(250)),
        timeout,
    )
    .await
}
