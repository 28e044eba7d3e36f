//! Deterministic fakes for engine tests.
//!
//! [`FakeDom`] models just enough of the offers dashboard — a list of
//! tiles, an optional detail view, readiness shells, the transient error
//! dialog — to drive the finder, confirm, extract, enroll, and run layers
//! without a browser. Scripted per-tile click behaviors cover the three
//! confirmation outcomes plus click failure.

use crate::browser::{Dom, NodeId, Probe};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Detail view contents revealed by a navigating click.
#[derive(Debug, Clone, Default)]
pub struct FakeDetail {
    pub pay_with: String,
    pub header_amount: String,
    pub header_limit: String,
    pub terms: String,
    pub brand: String,
}

/// What a tile's enroll control does when clicked.
#[derive(Debug, Clone)]
pub enum ClickBehavior {
    /// Tile flips to "added" in place.
    InPlace,
    /// Page transitions to a detail view.
    Navigate(FakeDetail),
    /// The click never dispatches.
    Fail,
}

#[derive(Debug, Clone)]
struct Tile {
    text: String,
    heading: String,
    hidden: bool,
    added: bool,
    behavior: ClickBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeRef {
    TileButton(usize),
    AddedMarker(usize),
    DetailPayWith,
    DetailAmount,
    DetailLimit,
    DetailTerms,
    DetailBrand,
    DialogClose,
    HomeUserInput,
    HomePasswordInput,
    MfaInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum View {
    List,
    Detail(usize),
}

#[derive(Default)]
struct State {
    tiles: Vec<Tile>,
    view: Option<View>,
    detail: Option<FakeDetail>,
    url: String,
    nodes: Vec<NodeRef>,
    inputs: HashMap<NodeId, String>,
    fail_nav: bool,
    fail_direct_only: bool,
    error_dialog: bool,
    hub_ready: bool,
    categories_ready: bool,
    mfa_input: bool,
    home_login_inputs: bool,
    respawn_on_add: bool,
    respawn_counter: usize,
    clicks: usize,
    proximity_brand: String,
    eval_script_result: String,
}

/// Scripted in-memory page model implementing [`Dom`].
pub struct FakeDom {
    state: Mutex<State>,
}

impl Default for FakeDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDom {
    pub fn new() -> Self {
        let state = State {
            view: Some(View::List),
            eval_script_result: "ok".to_string(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Add a tile with an in-place add behavior.
    pub fn push_tile(&self, text: &str, heading: &str) -> usize {
        let mut s = self.state.lock().unwrap();
        s.tiles.push(Tile {
            text: text.to_string(),
            heading: heading.to_string(),
            hidden: false,
            added: false,
            behavior: ClickBehavior::InPlace,
        });
        s.tiles.len() - 1
    }

    pub fn set_click_navigates(&self, tile: usize, detail: FakeDetail) {
        self.state.lock().unwrap().tiles[tile].behavior = ClickBehavior::Navigate(detail);
    }

    pub fn set_click_fails(&self, tile: usize) {
        self.state.lock().unwrap().tiles[tile].behavior = ClickBehavior::Fail;
    }

    pub fn hide_tile(&self, tile: usize) {
        self.state.lock().unwrap().tiles[tile].hidden = true;
    }

    pub fn fail_navigation(&self, fail: bool) {
        self.state.lock().unwrap().fail_nav = fail;
    }

    pub fn fail_direct_navigation_only(&self, fail: bool) {
        self.state.lock().unwrap().fail_direct_only = fail;
    }

    pub fn set_error_dialog(&self, present: bool) {
        self.state.lock().unwrap().error_dialog = present;
    }

    pub fn set_hub_ready(&self, ready: bool) {
        self.state.lock().unwrap().hub_ready = ready;
    }

    pub fn set_categories_ready(&self, ready: bool) {
        self.state.lock().unwrap().categories_ready = ready;
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn set_mfa_input(&self, present: bool) {
        self.state.lock().unwrap().mfa_input = present;
    }

    pub fn set_home_login_inputs(&self, present: bool) {
        self.state.lock().unwrap().home_login_inputs = present;
    }

    pub fn set_proximity_brand(&self, brand: &str) {
        self.state.lock().unwrap().proximity_brand = brand.to_string();
    }

    /// Every in-place add spawns a fresh tile, simulating a page that
    /// never runs out of work.
    pub fn respawn_tiles_on_add(&self, on: bool) {
        self.state.lock().unwrap().respawn_on_add = on;
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    pub fn added_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .tiles
            .iter()
            .filter(|t| t.added)
            .count()
    }

    pub fn input_for_mfa(&self) -> Option<String> {
        self.input_for(NodeRef::MfaInput)
    }

    pub fn input_for_home_user(&self) -> Option<String> {
        self.input_for(NodeRef::HomeUserInput)
    }

    pub fn input_for_home_password(&self) -> Option<String> {
        self.input_for(NodeRef::HomePasswordInput)
    }

    fn input_for(&self, node: NodeRef) -> Option<String> {
        let s = self.state.lock().unwrap();
        let id = s.nodes.iter().position(|n| *n == node)?;
        s.inputs.get(&(id as NodeId)).cloned()
    }

    fn intern(s: &mut State, node: NodeRef) -> NodeId {
        if let Some(i) = s.nodes.iter().position(|n| *n == node) {
            return i as NodeId;
        }
        s.nodes.push(node);
        (s.nodes.len() - 1) as NodeId
    }

    fn resolve(s: &State, node: NodeId) -> Option<NodeRef> {
        s.nodes.get(node as usize).cloned()
    }
}

#[async_trait]
impl Dom for FakeDom {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_nav || s.fail_direct_only {
            bail!("navigation refused");
        }
        s.url = url.to_string();
        s.view = Some(View::List);
        Ok(())
    }

    async fn navigate_script(&self, url: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_nav {
            bail!("script navigation refused");
        }
        s.url = url.to_string();
        s.view = Some(View::List);
        Ok(())
    }

    async fn set_hash_route(&self, route: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_nav {
            bail!("hash route refused");
        }
        let base = s.url.split('#').next().unwrap_or("").to_string();
        s.url = format!("{base}#{route}");
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn query(&self, probe: &Probe) -> Result<Vec<NodeId>> {
        let mut s = self.state.lock().unwrap();
        let (css, fragment) = match probe {
            Probe::Css(css) => (css.clone(), None),
            Probe::Text { css, contains } => (css.clone(), Some(contains.to_lowercase())),
        };
        let frag = fragment.as_deref().unwrap_or("");

        let mut out = Vec::new();
        let is_add_button = css.contains("Add offer")
            || css.contains("addOfferButton")
            || css.contains("commerce-tile-button")
            || css.contains("aria-label^='Add ");
        if is_add_button && s.view == Some(View::List) {
            let idx: Vec<usize> = (0..s.tiles.len()).collect();
            for i in idx {
                out.push(Self::intern(&mut s, NodeRef::TileButton(i)));
            }
            return Ok(out);
        }
        if frag.contains("pay with") {
            if matches!(s.view, Some(View::Detail(_))) {
                out.push(Self::intern(&mut s, NodeRef::DetailPayWith));
            }
            return Ok(out);
        }
        if frag.contains("added to card") && css != "[role='dialog']" {
            let idx: Vec<usize> = s
                .tiles
                .iter()
                .enumerate()
                .filter(|(_, t)| t.added)
                .map(|(i, _)| i)
                .collect();
            for i in idx {
                out.push(Self::intern(&mut s, NodeRef::AddedMarker(i)));
            }
            return Ok(out);
        }
        if css.contains("offerAmount") {
            if s.detail.as_ref().is_some_and(|d| !d.header_amount.is_empty()) {
                out.push(Self::intern(&mut s, NodeRef::DetailAmount));
            }
            return Ok(out);
        }
        if css.contains("limitations") {
            if s.detail.as_ref().is_some_and(|d| !d.header_limit.is_empty()) {
                out.push(Self::intern(&mut s, NodeRef::DetailLimit));
            }
            return Ok(out);
        }
        if css.contains("offer-detail-text") {
            if s.detail.as_ref().is_some_and(|d| !d.terms.is_empty()) {
                out.push(Self::intern(&mut s, NodeRef::DetailTerms));
            }
            return Ok(out);
        }
        if css.contains("merchantName")
            || css.contains("brandName")
            || css.contains("merchant")
            || css.contains("brand")
        {
            if s.detail.as_ref().is_some_and(|d| !d.brand.is_empty()) {
                out.push(Self::intern(&mut s, NodeRef::DetailBrand));
            }
            return Ok(out);
        }
        if css.contains("select-credit-card-account") {
            if s.hub_ready {
                out.push(Self::intern(&mut s, NodeRef::DialogClose));
            }
            return Ok(out);
        }
        if css.contains("offerCategoriesPage") && !css.starts_with('a') {
            if s.categories_ready {
                out.push(Self::intern(&mut s, NodeRef::DialogClose));
            }
            return Ok(out);
        }
        if frag.contains("unable to enroll") {
            if s.error_dialog {
                out.push(Self::intern(&mut s, NodeRef::DialogClose));
            }
            return Ok(out);
        }
        if css.contains("[role='dialog']") || css.contains("modal") {
            if s.error_dialog {
                out.push(Self::intern(&mut s, NodeRef::DialogClose));
            }
            return Ok(out);
        }
        if css.contains("userId") {
            if s.home_login_inputs {
                out.push(Self::intern(&mut s, NodeRef::HomeUserInput));
            }
            return Ok(out);
        }
        if css.contains("password-text-input") || css.contains("name='password'") {
            if s.home_login_inputs {
                out.push(Self::intern(&mut s, NodeRef::HomePasswordInput));
            }
            return Ok(out);
        }
        if css.contains("password") {
            if s.mfa_input {
                out.push(Self::intern(&mut s, NodeRef::MfaInput));
            }
            return Ok(out);
        }
        Ok(out)
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool> {
        let s = self.state.lock().unwrap();
        let visible = match Self::resolve(&s, node) {
            Some(NodeRef::TileButton(i)) => {
                s.view == Some(View::List)
                    && s.tiles
                        .get(i)
                        .map(|t| !t.hidden && !t.added)
                        .unwrap_or(false)
            }
            Some(NodeRef::AddedMarker(i)) => {
                s.view == Some(View::List) && s.tiles.get(i).map(|t| t.added).unwrap_or(false)
            }
            Some(
                NodeRef::DetailPayWith
                | NodeRef::DetailAmount
                | NodeRef::DetailLimit
                | NodeRef::DetailTerms
                | NodeRef::DetailBrand,
            ) => matches!(s.view, Some(View::Detail(_))),
            Some(NodeRef::DialogClose) => true,
            Some(NodeRef::HomeUserInput | NodeRef::HomePasswordInput) => s.home_login_inputs,
            Some(NodeRef::MfaInput) => s.mfa_input,
            None => false,
        };
        Ok(visible)
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        let s = self.state.lock().unwrap();
        let text = match Self::resolve(&s, node) {
            Some(NodeRef::TileButton(_)) => "Add".to_string(),
            Some(NodeRef::AddedMarker(_)) => "Added to card".to_string(),
            Some(NodeRef::DetailPayWith) => {
                s.detail.as_ref().map(|d| d.pay_with.clone()).unwrap_or_default()
            }
            Some(NodeRef::DetailAmount) => {
                s.detail.as_ref().map(|d| d.header_amount.clone()).unwrap_or_default()
            }
            Some(NodeRef::DetailLimit) => {
                s.detail.as_ref().map(|d| d.header_limit.clone()).unwrap_or_default()
            }
            Some(NodeRef::DetailTerms) => {
                s.detail.as_ref().map(|d| d.terms.clone()).unwrap_or_default()
            }
            Some(NodeRef::DetailBrand) => {
                s.detail.as_ref().map(|d| d.brand.clone()).unwrap_or_default()
            }
            _ => String::new(),
        };
        Ok(text)
    }

    async fn tile_text(&self, node: NodeId) -> Result<String> {
        let s = self.state.lock().unwrap();
        let text = match Self::resolve(&s, node) {
            Some(NodeRef::TileButton(i) | NodeRef::AddedMarker(i)) => {
                s.tiles.get(i).map(|t| t.text.clone()).unwrap_or_default()
            }
            _ => String::new(),
        };
        Ok(text)
    }

    async fn tile_heading(&self, node: NodeId) -> Result<Option<String>> {
        let s = self.state.lock().unwrap();
        let heading = match Self::resolve(&s, node) {
            Some(NodeRef::TileButton(i) | NodeRef::AddedMarker(i)) => s
                .tiles
                .get(i)
                .map(|t| t.heading.clone())
                .filter(|h| !h.is_empty()),
            _ => None,
        };
        Ok(heading)
    }

    async fn click(&self, node: NodeId) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        match Self::resolve(&s, node) {
            Some(NodeRef::TileButton(i)) => {
                s.clicks += 1;
                let behavior = s.tiles[i].behavior.clone();
                match behavior {
                    ClickBehavior::Fail => Ok(false),
                    ClickBehavior::InPlace => {
                        s.tiles[i].added = true;
                        if s.respawn_on_add {
                            s.respawn_counter += 1;
                            let n = s.respawn_counter;
                            s.tiles.push(Tile {
                                text: format!("Respawned Deal {n}\n{n}% off"),
                                heading: format!("Respawned Deal {n}"),
                                hidden: false,
                                added: false,
                                behavior: ClickBehavior::InPlace,
                            });
                        }
                        Ok(true)
                    }
                    ClickBehavior::Navigate(detail) => {
                        s.tiles[i].added = true;
                        s.detail = Some(detail);
                        s.view = Some(View::Detail(i));
                        Ok(true)
                    }
                }
            }
            Some(NodeRef::DialogClose) => {
                s.error_dialog = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hide(&self, node: NodeId) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if let Some(NodeRef::TileButton(i)) = Self::resolve(&s, node) {
            if let Some(tile) = s.tiles.get_mut(i) {
                tile.hidden = true;
            }
        }
        Ok(())
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .inputs
            .insert(node, text.to_string());
        Ok(())
    }

    async fn input_value(&self, node: NodeId) -> Result<String> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .inputs
            .get(&node)
            .cloned()
            .unwrap_or_default())
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        let s = self.state.lock().unwrap();
        if script.contains("added to card") {
            return Ok(s.proximity_brand.clone());
        }
        Ok(s.eval_script_result.clone())
    }

    async fn body_text(&self, max_chars: usize) -> Result<String> {
        let s = self.state.lock().unwrap();
        let mut text = match (&s.view, &s.detail) {
            (Some(View::Detail(_)), Some(d)) => format!(
                "{}\n{}\n{}\n{}",
                d.pay_with, d.header_amount, d.header_limit, d.terms
            ),
            _ => s
                .tiles
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        crate::browser::truncate_chars(&mut text, max_chars);
        Ok(text)
    }

    async fn scroll_through(&self) -> Result<()> {
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.view = Some(View::List);
        s.detail = None;
        Ok(())
    }
}
