//! Chromium-backed [`Dom`] implementation using chromiumoxide.
//!
//! Element handles are indices into a per-page JS registry
//! (`window.__olNodes`). Handles go stale on navigation; the engine
//! re-queries at the top of every pass, so stale handles simply resolve to
//! no-ops.

use super::{Dom, NodeId, Probe};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;

/// Find the Chrome/Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("OFFERLOOP_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A visible Chrome window driven over CDP.
///
/// The window is headful on purpose: the human completes login and MFA in
/// it before the engine takes over.
pub struct ChromiumDom {
    browser: Browser,
    page: Page,
}

impl ChromiumDom {
    /// Launch Chrome and open the working tab.
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chrome not found. Set OFFERLOOP_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .with_head()
            .arg("--start-maximized")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chrome")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open working tab")?;

        Ok(Self { browser, page })
    }

    /// Close the browser process.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.page.close().await;
        self.browser.close().await.context("browser close failed")?;
        Ok(())
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl Dom for ChromiumDom {
    async fn navigate(&self, url: &str) -> Result<()> {
        tokio::time::timeout(Duration::from_secs(90), self.page.goto(url))
            .await
            .context("navigation timed out")?
            .context("navigation failed")?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    async fn navigate_script(&self, url: &str) -> Result<()> {
        let script = format!(
            "window.location.replace('{}'); true",
            escape_js(url)
        );
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn set_hash_route(&self, route: &str) -> Result<()> {
        let script = format!("window.location.hash = '{}'; true", escape_js(route));
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn query(&self, probe: &Probe) -> Result<Vec<NodeId>> {
        let (selector, fragment) = match probe {
            Probe::Css(css) => (css.as_str(), None),
            Probe::Text { css, contains } => (css.as_str(), Some(contains.as_str())),
        };
        let filter = match fragment {
            Some(f) => format!(
                ".filter(el => (el.textContent || '').toLowerCase().includes('{}'))",
                escape_js(&f.to_lowercase())
            ),
            None => String::new(),
        };
        let script = format!(
            r#"(() => {{
                const reg = window.__olNodes = window.__olNodes || [];
                let els;
                try {{ els = Array.from(document.querySelectorAll('{}')){}; }}
                catch (e) {{ return []; }}
                const out = [];
                for (const el of els) {{
                    let i = reg.indexOf(el);
                    if (i < 0) {{ i = reg.length; reg.push(el); }}
                    out.push(i);
                }}
                return out;
            }})()"#,
            escape_js(selector),
            filter
        );
        self.eval(&script).await
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (!el || !el.isConnected) return false;
                const r = el.getBoundingClientRect();
                return r.width > 0 && r.height > 0
                    && getComputedStyle(el).display !== 'none';
            }})()"#
        );
        self.eval(&script).await
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                return el ? (el.innerText || el.textContent || '') : '';
            }})()"#
        );
        self.eval(&script).await
    }

    async fn tile_text(&self, node: NodeId) -> Result<String> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (!el) return '';
                const tile = el.closest('div') || el;
                return tile.innerText || tile.textContent || '';
            }})()"#
        );
        self.eval(&script).await
    }

    async fn tile_heading(&self, node: NodeId) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (!el) return null;
                const tile = el.closest('div') || el;
                for (const h of tile.querySelectorAll('h1,h2,h3,[role="heading"]')) {{
                    const t = (h.innerText || '').trim();
                    if (t) return t;
                }}
                return null;
            }})()"#
        );
        self.eval(&script).await
    }

    async fn click(&self, node: NodeId) -> Result<bool> {
        // Climb to the nearest button-like ancestor so icon children still
        // dispatch the real control's handler.
        let script = format!(
            r#"(() => {{
                let el = (window.__olNodes || [])[{node}];
                if (!el || !el.isConnected) return false;
                let target = el;
                for (let i = 0; i < 5; i++) {{
                    if (target.tagName === 'BUTTON'
                        || target.getAttribute('role') === 'button') break;
                    if (!target.parentElement) break;
                    target = target.parentElement;
                }}
                if (target.tagName !== 'BUTTON'
                    && target.getAttribute('role') !== 'button') target = el;
                try {{
                    target.scrollIntoView({{ block: 'center' }});
                    target.click();
                    return true;
                }} catch (e) {{ return false; }}
            }})()"#
        );
        self.eval(&script).await
    }

    async fn hide(&self, node: NodeId) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (el) el.style.display = 'none';
                return true;
            }})()"#
        );
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        let focus = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (!el) return false;
                try {{ el.scrollIntoView({{ block: 'center' }}); el.click(); el.focus(); }}
                catch (e) {{}}
                el.value = '';
                return true;
            }})()"#
        );
        let _: bool = self.eval(&focus).await?;

        // Human-paced typing so client-side validation keeps up.
        for ch in text.chars() {
            let script = format!(
                r#"(() => {{
                    const el = (window.__olNodes || [])[{node}];
                    if (!el) return false;
                    el.value += '{}';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }})()"#,
                escape_js(&ch.to_string())
            );
            let _: bool = self.eval(&script).await?;
            let jitter = rand::thread_rng().gen_range(30..80);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        let flush = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                if (!el) return false;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#
        );
        let _: bool = self.eval(&flush).await?;
        Ok(())
    }

    async fn input_value(&self, node: NodeId) -> Result<String> {
        let script = format!(
            r#"(() => {{
                const el = (window.__olNodes || [])[{node}];
                return el ? (el.value || '') : '';
            }})()"#
        );
        self.eval(&script).await
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        self.eval(script).await
    }

    async fn body_text(&self, max_chars: usize) -> Result<String> {
        let script = format!(
            "(document.body ? (document.body.innerText || '') : '').slice(0, {max_chars})"
        );
        self.eval(&script).await
    }

    async fn scroll_through(&self) -> Result<()> {
        let script = r#"(async () => {
            const h = document.body.scrollHeight || document.documentElement.scrollHeight;
            for (let y = 0; y < h; y += 500) {
                window.scrollTo(0, y);
                await new Promise(r => setTimeout(r, 120));
            }
            window.scrollTo(0, 0);
            return true;
        })()"#;
        let _: bool = self.eval(script).await?;
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        let script = r#"(() => {
            const btn = document.querySelector("[aria-label='Back']");
            if (btn) { btn.click(); return true; }
            window.history.back();
            return true;
        })()"#;
        let _: bool = self.eval(script).await?;
        Ok(())
    }
}

/// Escape a string for safe injection into a JS single-quoted literal.
pub fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => {}
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_js_quotes() {
        assert_eq!(escape_js("it's"), "it\\'s");
        assert_eq!(escape_js("a\"b"), "a\\\"b");
        assert_eq!(escape_js("plain"), "plain");
    }

    #[test]
    fn test_escape_js_strips_nulls_and_tags() {
        assert_eq!(escape_js("a\0b"), "ab");
        let out = escape_js("</script>");
        assert!(!out.contains("</script>"));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_launch_query_and_click() {
        let dom = ChromiumDom::launch().await.expect("launch failed");
        dom.navigate("data:text/html,<div><h3>Coffee Shop</h3><button aria-label='Add offer'>Add</button></div>")
            .await
            .expect("navigation failed");

        let nodes = dom
            .query(&Probe::css("button[aria-label*='Add offer']"))
            .await
            .expect("query failed");
        assert_eq!(nodes.len(), 1);
        assert!(dom.is_visible(nodes[0]).await.unwrap());
        assert!(dom.click(nodes[0]).await.unwrap());

        let heading = dom.tile_heading(nodes[0]).await.unwrap();
        assert_eq!(heading.as_deref(), Some("Coffee Shop"));

        dom.close().await.expect("close failed");
    }
}
