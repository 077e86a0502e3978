//! Mock browser session for testing
//!
//! An in-memory, scriptable DOM. Nodes are registered against the locators
//! that should find them, can be scoped to a route, appear after a delay and
//! carry click/Enter effects. Tables model an ng2-smart-table: per-column
//! substring filters, header sort cycling and a full re-render on every
//! change, so handles to discarded rows go stale exactly like in a browser.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::cdp::mock::MOCK_PNG_BASE64;
use crate::locator::Locator;
use crate::session::traits::{BrowserSession, ElementHandle, ElementState, Key};
use crate::sorting::SortOrder;
use crate::{Error, Result};

/// Side effect triggered by a click or an Enter key press
#[derive(Debug, Clone)]
pub enum Effect {
    /// Change the current URL immediately
    Navigate(String),
    /// Change the current URL once `Duration` has elapsed
    NavigateAfter(String, Duration),
    /// Make the keyed node present and visible
    Show(String),
    /// Make the keyed node present and visible once `Duration` has elapsed
    ShowAfter(String, Duration),
    /// Remove the keyed node from the document
    Hide(String),
    /// Replace the keyed node's text
    SetText(String, String),
    /// Open a JavaScript dialog with this message
    Dialog(String),
    /// Branch on the current value of the keyed input
    When {
        /// Input node key
        key: String,
        /// Expected value
        equals: String,
        /// Effects when the value matches
        then: Vec<Effect>,
        /// Effects otherwise
        otherwise: Vec<Effect>,
    },
}

/// Declarative description of one mock node
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    key: Option<String>,
    locators: Vec<Locator>,
    parent: Option<String>,
    route: Option<String>,
    text: String,
    properties: HashMap<String, String>,
    hidden: bool,
    detached: bool,
    disabled: bool,
    delay: Option<Duration>,
    on_click: Vec<Effect>,
    on_enter: Vec<Effect>,
    renders_markup: bool,
    discards_input: bool,
    filter: Option<(String, usize)>,
    sorts: Option<(String, usize)>,
}

impl NodeSpec {
    /// Node found by `locator`
    pub fn new(locator: Locator) -> Self {
        Self {
            locators: vec![locator],
            ..Default::default()
        }
    }

    /// Also found by `locator`
    pub fn also(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    /// Name used by effects and inspection helpers
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Nest below the keyed node
    pub fn parent(mut self, key: &str) -> Self {
        self.parent = Some(key.to_string());
        self
    }

    /// Only present while the current URL contains `route`
    pub fn route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }

    /// Rendered text
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// DOM property or attribute
    pub fn property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    /// Present but not displayed
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Not in the document until an effect shows it
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Displayed but disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Appears `delay` after being added
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Effects of a click
    pub fn on_click(mut self, effects: Vec<Effect>) -> Self {
        self.on_click = effects;
        self
    }

    /// Effects of pressing Enter
    pub fn on_enter(mut self, effects: Vec<Effect>) -> Self {
        self.on_enter = effects;
        self
    }

    /// Typed `<script>` payloads execute (an XSS sink)
    pub fn renders_markup(mut self) -> Self {
        self.renders_markup = true;
        self
    }

    /// Keystrokes never reach the value
    pub fn discards_input(mut self) -> Self {
        self.discards_input = true;
        self
    }

    /// Typing filters `table` on `column`
    pub fn filters(mut self, table: &str, column: usize) -> Self {
        self.filter = Some((table.to_string(), column));
        self
    }

    /// Clicking cycles the sort of `table` on `column`
    pub fn sorts(mut self, table: &str, column: usize) -> Self {
        self.sorts = Some((table.to_string(), column));
        self
    }
}

/// How a mock table column renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockColumn {
    /// Plain text cell
    Text,
    /// Edit and delete icons
    Actions,
    /// Checkbox whose checked state comes from [`MockRow::checked`]
    Checkbox,
}

/// Data row of a mock table
#[derive(Debug, Clone, Default)]
pub struct MockRow {
    /// Cell texts, one per column (ignored for non-text columns)
    pub cells: Vec<String>,
    /// Checkbox state
    pub checked: bool,
}

impl MockRow {
    /// Row from cell texts
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            checked: false,
        }
    }

    /// Set the checkbox state
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// Locators and layout of a mock smart table
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Table name used by filter and sort bindings
    pub key: String,
    /// Route the rows belong to
    pub route: Option<String>,
    /// Row locator
    pub row: Locator,
    /// Cell locator, relative to a row
    pub cell: Locator,
    /// Edit icon locator, relative to a cell
    pub edit: Locator,
    /// Delete icon locator, relative to a cell
    pub trash: Locator,
    /// Checkbox locator, relative to a cell
    pub checkbox: Locator,
    /// Column layout
    pub columns: Vec<MockColumn>,
    /// Node shown when no row survives the filters
    pub no_data_key: Option<String>,
}

#[derive(Debug)]
struct Node {
    id: String,
    key: Option<String>,
    locators: Vec<Locator>,
    parent: Option<usize>,
    route: Option<String>,
    text: String,
    properties: HashMap<String, String>,
    visible: bool,
    enabled: bool,
    attached: bool,
    appears_at: Option<Instant>,
    on_click: Vec<Effect>,
    on_enter: Vec<Effect>,
    renders_markup: bool,
    discards_input: bool,
    filter: Option<(String, usize)>,
    sorts: Option<(String, usize)>,
    /// Data row whose `checked` flag a click flips
    toggles: Option<(String, usize)>,
}

#[derive(Debug)]
struct Table {
    spec: TableSpec,
    rows: Vec<MockRow>,
    filters: BTreeMap<usize, String>,
    sort: Option<(usize, SortOrder)>,
    rendered: Vec<usize>,
}

#[derive(Debug, Default)]
struct DomState {
    url: String,
    titles: Vec<(String, String)>,
    nodes: Vec<Node>,
    keys: HashMap<String, usize>,
    ids: HashMap<String, usize>,
    tables: HashMap<String, Table>,
    dialogs: Vec<String>,
    pending_navigation: Vec<(Instant, String)>,
    navigations: Vec<String>,
    clicks: HashMap<usize, usize>,
    next_id: u64,
}

impl DomState {
    fn tick(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = self
            .pending_navigation
            .drain(..)
            .partition(|(at, _)| *at <= now);
        self.pending_navigation = later;
        for (_, url) in due {
            self.set_url(url);
        }
    }

    fn set_url(&mut self, url: String) {
        self.navigations.push(url.clone());
        self.url = url;
    }

    fn push_node(&mut self, mut node: Node) -> usize {
        self.next_id += 1;
        node.id = format!("mock-{}", self.next_id);
        let idx = self.nodes.len();
        self.ids.insert(node.id.clone(), idx);
        if let Some(key) = &node.key {
            self.keys.insert(key.clone(), idx);
        }
        self.nodes.push(node);
        idx
    }

    fn present(&self, idx: usize) -> bool {
        let node = &self.nodes[idx];
        if !node.attached {
            return false;
        }
        if let Some(at) = node.appears_at {
            if Instant::now() < at {
                return false;
            }
        }
        if let Some(route) = &node.route {
            if !self.url.contains(route.as_str()) {
                return false;
            }
        }
        match node.parent {
            Some(parent) => self.present(parent),
            None => true,
        }
    }

    fn is_within(&self, idx: usize, scope: usize) -> bool {
        let mut current = self.nodes[idx].parent;
        while let Some(parent) = current {
            if parent == scope {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    fn resolve(&self, element: &ElementHandle) -> Result<usize> {
        match self.ids.get(element.id()) {
            Some(&idx) if self.present(idx) => Ok(idx),
            _ => Err(Error::stale_element(element.id())),
        }
    }

    fn keyed(&self, key: &str) -> Option<usize> {
        self.keys.get(key).copied()
    }

    fn value(&self, idx: usize) -> String {
        self.nodes[idx]
            .properties
            .get("value")
            .cloned()
            .unwrap_or_default()
    }

    fn apply(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Navigate(url) => self.set_url(url.clone()),
                Effect::NavigateAfter(url, delay) => self
                    .pending_navigation
                    .push((Instant::now() + *delay, url.clone())),
                Effect::Show(key) => self.show(key, None),
                Effect::ShowAfter(key, delay) => self.show(key, Some(Instant::now() + *delay)),
                Effect::Hide(key) => {
                    if let Some(idx) = self.keyed(key) {
                        self.nodes[idx].attached = false;
                    }
                }
                Effect::SetText(key, text) => {
                    if let Some(idx) = self.keyed(key) {
                        self.nodes[idx].text = text.clone();
                    }
                }
                Effect::Dialog(message) => self.dialogs.push(message.clone()),
                Effect::When { key, equals, then, otherwise } => {
                    let matches = self
                        .keyed(key)
                        .map(|idx| self.value(idx) == *equals)
                        .unwrap_or(false);
                    self.apply(if matches { then } else { otherwise });
                }
            }
        }
    }

    fn show(&mut self, key: &str, at: Option<Instant>) {
        if let Some(idx) = self.keyed(key) {
            let node = &mut self.nodes[idx];
            node.attached = true;
            node.visible = true;
            node.appears_at = at;
        }
    }

    fn value_changed(&mut self, idx: usize) {
        if let Some((table, column)) = self.nodes[idx].filter.clone() {
            let value = self.value(idx);
            if let Some(t) = self.tables.get_mut(&table) {
                t.filters.insert(column, value);
            }
            self.render(&table);
        }
    }

    fn cycle_sort(&mut self, table: &str, column: usize) {
        if let Some(t) = self.tables.get_mut(table) {
            t.sort = match t.sort {
                Some((current, order)) if current == column => {
                    match order.next() {
                        SortOrder::Unsorted => None,
                        next => Some((column, next)),
                    }
                }
                _ => Some((column, SortOrder::Ascending)),
            };
        }
        self.render(table);
    }

    /// Reset inputs and table state, as a page load would
    fn reload(&mut self) {
        let bound: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.filter.is_some())
            .map(|(i, _)| i)
            .collect();
        for idx in bound {
            self.nodes[idx].properties.remove("value");
        }
        let tables: Vec<String> = self.tables.keys().cloned().collect();
        for key in tables {
            if let Some(t) = self.tables.get_mut(&key) {
                t.filters.clear();
                t.sort = None;
            }
            self.render(&key);
        }
    }

    fn render(&mut self, key: &str) {
        let Some(table) = self.tables.get_mut(key) else {
            return;
        };

        let mut visible: Vec<(usize, MockRow)> = table
            .rows
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, row)| {
                table.filters.iter().all(|(column, needle)| {
                    row.cells
                        .get(*column)
                        .map(|cell| cell.to_lowercase().contains(&needle.to_lowercase()))
                        .unwrap_or(needle.is_empty())
                })
            })
            .collect();

        if let Some((column, order)) = table.sort {
            visible.sort_by(|(_, a), (_, b)| {
                let ordering = compare_cells(
                    a.cells.get(column).map(String::as_str).unwrap_or(""),
                    b.cells.get(column).map(String::as_str).unwrap_or(""),
                );
                if order == SortOrder::Descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let spec = table.spec.clone();
        let sort = table.sort;
        let old = std::mem::take(&mut table.rendered);

        for idx in old {
            self.nodes[idx].attached = false;
        }

        let mut rendered = Vec::with_capacity(visible.len());
        for (data_idx, row) in &visible {
            let row_idx = self.push_node(plain_node(spec.row.clone(), None, spec.route.clone(), ""));
            for (column, kind) in spec.columns.iter().enumerate() {
                let text = match kind {
                    MockColumn::Text => row.cells.get(column).cloned().unwrap_or_default(),
                    _ => String::new(),
                };
                let cell_idx = self.push_node(plain_node(spec.cell.clone(), Some(row_idx), None, &text));
                match kind {
                    MockColumn::Text => {}
                    MockColumn::Actions => {
                        self.push_node(plain_node(spec.edit.clone(), Some(cell_idx), None, ""));
                        self.push_node(plain_node(spec.trash.clone(), Some(cell_idx), None, ""));
                    }
                    MockColumn::Checkbox => {
                        let mut checkbox = plain_node(spec.checkbox.clone(), Some(cell_idx), None, "");
                        checkbox
                            .properties
                            .insert("checked".to_string(), row.checked.to_string());
                        checkbox.toggles = Some((key.to_string(), *data_idx));
                        self.push_node(checkbox);
                    }
                }
            }
            rendered.push(row_idx);
        }

        if let Some(no_data) = spec.no_data_key.as_deref().and_then(|k| self.keyed(k)) {
            let node = &mut self.nodes[no_data];
            node.attached = rendered.is_empty();
            node.visible = rendered.is_empty();
        }

        for node in self.nodes.iter_mut() {
            if let Some((table_key, column)) = &node.sorts {
                if table_key == key {
                    let class = match sort {
                        Some((c, SortOrder::Ascending)) if c == *column => "ng2-smart-sort-link sort asc",
                        Some((c, SortOrder::Descending)) if c == *column => "ng2-smart-sort-link sort desc",
                        _ => "ng2-smart-sort-link sort",
                    };
                    node.properties.insert("className".to_string(), class.to_string());
                }
            }
        }

        if let Some(table) = self.tables.get_mut(key) {
            table.rendered = rendered;
        }
    }
}

fn plain_node(locator: Locator, parent: Option<usize>, route: Option<String>, text: &str) -> Node {
    Node {
        id: String::new(),
        key: None,
        locators: vec![locator],
        parent,
        route,
        text: text.to_string(),
        properties: HashMap::new(),
        visible: true,
        enabled: true,
        attached: true,
        appears_at: None,
        on_click: Vec::new(),
        on_enter: Vec::new(),
        renders_markup: false,
        discards_input: false,
        filter: None,
        sorts: None,
        toggles: None,
    }
}

fn compare_cells(a: &str, b: &str) -> CmpOrdering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Markup a rendering sink would run without user interaction
fn executes_markup(payload: &str) -> bool {
    let lower = payload.to_lowercase();
    lower.contains('<') && ["<script", "onerror=", "onload="].iter().any(|m| lower.contains(m))
}

fn alert_message(payload: &str) -> String {
    payload
        .find("alert(")
        .and_then(|start| {
            let rest = &payload[start + "alert(".len()..];
            rest.find(')').map(|end| rest[..end].trim_matches(|c: char| c == '\'' || c == '"').to_string())
        })
        .unwrap_or_else(|| payload.to_string())
}

/// In-memory browser session
#[derive(Debug)]
pub struct MockSession {
    id: String,
    state: Mutex<DomState>,
    closed: AtomicBool,
}

impl MockSession {
    /// Empty document at `url`
    pub fn new(url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: Mutex::new(DomState {
                url: url.to_string(),
                ..Default::default()
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, DomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_state(&self) -> Result<MutexGuard<'_, DomState>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::session_closed(format!("Mock session {} has been released", self.id)));
        }
        let mut state = self.state();
        state.tick();
        Ok(state)
    }

    /// Register a node
    pub fn add(&self, spec: NodeSpec) -> &Self {
        let mut state = self.state();
        let parent = spec.parent.as_deref().and_then(|k| state.keyed(k));
        let node = Node {
            id: String::new(),
            key: spec.key,
            locators: spec.locators,
            parent,
            route: spec.route,
            text: spec.text,
            properties: spec.properties,
            visible: !spec.hidden,
            enabled: !spec.disabled,
            attached: !spec.detached,
            appears_at: spec.delay.map(|d| Instant::now() + d),
            on_click: spec.on_click,
            on_enter: spec.on_enter,
            renders_markup: spec.renders_markup,
            discards_input: spec.discards_input,
            filter: spec.filter,
            sorts: spec.sorts,
            toggles: None,
        };
        state.push_node(node);
        self
    }

    /// Register a smart table with its data rows
    pub fn add_table(&self, spec: TableSpec, rows: Vec<MockRow>) -> &Self {
        let mut state = self.state();
        let key = spec.key.clone();
        state.tables.insert(
            key.clone(),
            Table {
                spec,
                rows,
                filters: BTreeMap::new(),
                sort: None,
                rendered: Vec::new(),
            },
        );
        state.render(&key);
        self
    }

    /// Document title while the URL contains `route`
    pub fn set_title(&self, route: &str, title: &str) -> &Self {
        self.state()
            .titles
            .push((route.to_string(), title.to_string()));
        self
    }

    /// Current URL, applying due delayed navigations
    pub fn url(&self) -> String {
        let mut state = self.state();
        state.tick();
        state.url.clone()
    }

    /// Every URL the session navigated to, in order
    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    /// Current value of the keyed input
    pub fn value_of(&self, key: &str) -> Option<String> {
        let state = self.state();
        state.keyed(key).map(|idx| state.value(idx))
    }

    /// Current text of the keyed node
    pub fn text_of(&self, key: &str) -> Option<String> {
        let state = self.state();
        state.keyed(key).map(|idx| state.nodes[idx].text.clone())
    }

    /// Number of clicks the keyed node received
    pub fn clicks_on(&self, key: &str) -> usize {
        let state = self.state();
        state
            .keyed(key)
            .and_then(|idx| state.clicks.get(&idx).copied())
            .unwrap_or(0)
    }

    /// Current sort of a table
    pub fn sort_of(&self, table: &str) -> Option<(usize, SortOrder)> {
        self.state().tables.get(table).and_then(|t| t.sort)
    }

    /// Whether the session has been released
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.live_state()?;
        state.set_url(url.to_string());
        state.reload();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.live_state()?.url.clone())
    }

    async fn title(&self) -> Result<String> {
        let state = self.live_state()?;
        Ok(state
            .titles
            .iter()
            .find(|(route, _)| state.url.contains(route.as_str()))
            .map(|(_, title)| title.clone())
            .unwrap_or_default())
    }

    async fn refresh(&self) -> Result<()> {
        self.live_state()?.reload();
        Ok(())
    }

    async fn query(&self, locator: &Locator, scope: Option<&ElementHandle>) -> Result<Vec<ElementHandle>> {
        let state = self.live_state()?;
        let scope = match scope {
            Some(handle) => Some(state.resolve(handle)?),
            None => None,
        };

        Ok((0..state.nodes.len())
            .filter(|&idx| state.nodes[idx].locators.contains(locator))
            .filter(|&idx| scope.map_or(true, |s| state.is_within(idx, s)))
            .filter(|&idx| state.present(idx))
            .map(|idx| ElementHandle::new(state.nodes[idx].id.clone()))
            .collect())
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState> {
        let state = self.live_state()?;
        let idx = state.resolve(element)?;
        let node = &state.nodes[idx];
        Ok(ElementState {
            displayed: node.visible,
            enabled: node.enabled,
        })
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.live_state()?;
        let idx = state.resolve(element)?;
        *state.clicks.entry(idx).or_insert(0) += 1;

        let effects = state.nodes[idx].on_click.clone();
        state.apply(&effects);

        if let Some((table, column)) = state.nodes[idx].sorts.clone() {
            state.cycle_sort(&table, column);
        }

        if let Some((table, row)) = state.nodes[idx].toggles.clone() {
            let checked = state
                .tables
                .get_mut(&table)
                .and_then(|t| t.rows.get_mut(row))
                .map(|r| {
                    r.checked = !r.checked;
                    r.checked
                });
            if let Some(checked) = checked {
                state.nodes[idx]
                    .properties
                    .insert("checked".to_string(), checked.to_string());
            }
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.live_state()?;
        let idx = state.resolve(element)?;
        state.nodes[idx].properties.remove("value");
        state.value_changed(idx);
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.live_state()?;
        let idx = state.resolve(element)?;
        if !state.nodes[idx].discards_input {
            let value = format!("{}{}", state.value(idx), text);
            state.nodes[idx].properties.insert("value".to_string(), value);
        }

        if state.nodes[idx].renders_markup && executes_markup(text) {
            state.dialogs.push(alert_message(text));
        }

        state.value_changed(idx);
        Ok(())
    }

    async fn press_key(&self, element: &ElementHandle, key: Key) -> Result<()> {
        let mut state = self.live_state()?;
        let idx = state.resolve(element)?;
        if key == Key::Enter {
            let effects = state.nodes[idx].on_enter.clone();
            state.apply(&effects);
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let state = self.live_state()?;
        let idx = state.resolve(element)?;
        Ok(state.nodes[idx].text.trim().to_string())
    }

    async fn property(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let state = self.live_state()?;
        let idx = state.resolve(element)?;
        let node = &state.nodes[idx];
        Ok(match name {
            "value" => Some(state.value(idx)),
            "textContent" | "innerText" => Some(node.text.clone()),
            // `class` attribute and `className` property mirror each other.
            "class" => node.properties.get("className").or_else(|| node.properties.get("class")).cloned(),
            "className" => node.properties.get("className").or_else(|| node.properties.get("class")).cloned(),
            _ => node.properties.get(name).cloned(),
        })
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        let state = self.live_state()?;
        state.resolve(element)?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let _state = self.live_state()?;
        BASE64
            .decode(MOCK_PNG_BASE64)
            .map_err(|e| Error::internal(format!("Invalid mock screenshot: {}", e)))
    }

    async fn take_dialogs(&self) -> Result<Vec<String>> {
        Ok(std::mem::take(&mut self.live_state()?.dialogs))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: Locator = Locator::css("tbody tr");
    const CELL: Locator = Locator::tag("td");
    const FILTER: Locator = Locator::css("input[placeholder='Name']");
    const HEADER: Locator = Locator::css("th.name a");

    fn table_session() -> MockSession {
        let session = MockSession::new("http://localhost/#/list");
        session
            .add(NodeSpec::new(FILTER).key("filter").filters("t", 1))
            .add(NodeSpec::new(HEADER).key("header").sorts("t", 1))
            .add(NodeSpec::new(Locator::css(".no-data")).key("empty").detached())
            .add_table(
                TableSpec {
                    key: "t".to_string(),
                    route: Some("#/list".to_string()),
                    row: ROW,
                    cell: CELL,
                    edit: Locator::css("i.nb-edit"),
                    trash: Locator::css("i.nb-trash"),
                    checkbox: Locator::css("input[type='checkbox']"),
                    columns: vec![MockColumn::Text, MockColumn::Text, MockColumn::Actions],
                    no_data_key: Some("empty".to_string()),
                },
                vec![
                    MockRow::new(["1", "nike"]),
                    MockRow::new(["2", "Adidas"]),
                    MockRow::new(["3", "Puma"]),
                ],
            );
        session
    }

    async fn column(session: &MockSession, index: usize) -> Vec<String> {
        let mut out = Vec::new();
        for row in session.query(&ROW, None).await.unwrap() {
            let cells = session.query(&CELL, Some(&row)).await.unwrap();
            out.push(session.text(&cells[index]).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_filter_rerenders_and_stales_old_rows() {
        let session = table_session();
        let before = session.query(&ROW, None).await.unwrap();
        assert_eq!(before.len(), 3);

        let filter = session.query(&FILTER, None).await.unwrap().remove(0);
        session.send_keys(&filter, "NIK").await.unwrap();

        assert_eq!(column(&session, 1).await, vec!["nike"]);
        let err = session.text(&before[0]).await.unwrap_err();
        assert!(matches!(err, Error::StaleElement(_)));
    }

    #[tokio::test]
    async fn test_no_data_marker_tracks_empty_table() {
        let session = table_session();
        let empty = Locator::css(".no-data");
        assert!(session.query(&empty, None).await.unwrap().is_empty());

        let filter = session.query(&FILTER, None).await.unwrap().remove(0);
        session.send_keys(&filter, "XYZNEVEREXISTS123").await.unwrap();
        assert_eq!(session.query(&empty, None).await.unwrap().len(), 1);

        session.clear(&filter).await.unwrap();
        assert!(session.query(&empty, None).await.unwrap().is_empty());
        assert_eq!(session.query(&ROW, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_header_click_cycles_sort() {
        let session = table_session();
        let header = session.query(&HEADER, None).await.unwrap().remove(0);

        session.click(&header).await.unwrap();
        assert_eq!(column(&session, 1).await, vec!["Adidas", "nike", "Puma"]);
        assert_eq!(
            session.property(&header, "className").await.unwrap().unwrap(),
            "ng2-smart-sort-link sort asc"
        );

        session.click(&header).await.unwrap();
        assert_eq!(column(&session, 1).await, vec!["Puma", "nike", "Adidas"]);

        session.click(&header).await.unwrap();
        assert_eq!(session.sort_of("t"), None);
    }

    #[tokio::test]
    async fn test_route_scoping_and_delayed_appearance() {
        let session = MockSession::new("http://localhost/#/auth");
        session
            .add(NodeSpec::new(Locator::css("form")).route("#/auth"))
            .add(
                NodeSpec::new(Locator::css("nb-layout-header"))
                    .route("#/pages")
                    .appears_after(Duration::from_millis(30)),
            );

        assert_eq!(session.query(&Locator::css("form"), None).await.unwrap().len(), 1);
        session.navigate("http://localhost/#/pages/home").await.unwrap();
        assert!(session.query(&Locator::css("form"), None).await.unwrap().is_empty());
        assert!(session
            .query(&Locator::css("nb-layout-header"), None)
            .await
            .unwrap()
            .is_empty());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            session.query(&Locator::css("nb-layout-header"), None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_conditional_click_effect() {
        let session = MockSession::new("http://localhost/#/auth");
        session
            .add(NodeSpec::new(Locator::name("username")).key("user"))
            .add(NodeSpec::new(Locator::css("button")).on_click(vec![Effect::When {
                key: "user".to_string(),
                equals: "admin".to_string(),
                then: vec![Effect::NavigateAfter("http://localhost/#/pages".to_string(), Duration::from_millis(10))],
                otherwise: vec![Effect::Dialog("denied".to_string())],
            }]));

        let button = session.query(&Locator::css("button"), None).await.unwrap().remove(0);
        session.click(&button).await.unwrap();
        assert_eq!(session.take_dialogs().await.unwrap(), vec!["denied"]);

        let user = session.query(&Locator::name("username"), None).await.unwrap().remove(0);
        session.send_keys(&user, "admin").await.unwrap();
        session.click(&button).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.url(), "http://localhost/#/pages");
    }

    #[tokio::test]
    async fn test_checkbox_click_flips_row_and_survives_rerender() {
        let session = MockSession::new("http://localhost/#/list");
        let checkbox = Locator::css("input[type='checkbox']");
        session
            .add(NodeSpec::new(FILTER).key("filter").filters("t", 0))
            .add_table(
                TableSpec {
                    key: "t".to_string(),
                    route: None,
                    row: ROW,
                    cell: CELL,
                    edit: Locator::css("i.nb-edit"),
                    trash: Locator::css("i.nb-trash"),
                    checkbox: checkbox.clone(),
                    columns: vec![MockColumn::Text, MockColumn::Checkbox],
                    no_data_key: None,
                },
                vec![MockRow::new(["a"]).checked(true), MockRow::new(["b"])],
            );

        let boxes = session.query(&checkbox, None).await.unwrap();
        session.click(&boxes[1]).await.unwrap();
        assert_eq!(
            session.property(&boxes[1], "checked").await.unwrap().as_deref(),
            Some("true")
        );

        let filter = session.query(&FILTER, None).await.unwrap().remove(0);
        session.send_keys(&filter, "b").await.unwrap();
        let boxes = session.query(&checkbox, None).await.unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(
            session.property(&boxes[0], "checked").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_markup_sink_raises_dialog() {
        let session = MockSession::new("http://localhost/");
        session.add(NodeSpec::new(FILTER).renders_markup());
        let input = session.query(&FILTER, None).await.unwrap().remove(0);
        session
            .send_keys(&input, "<script>alert('x')</script>")
            .await
            .unwrap();
        assert_eq!(session.take_dialogs().await.unwrap(), vec!["x"]);

        session.clear(&input).await.unwrap();
        session
            .send_keys(&input, "<img src=x onerror=alert('XSS')>")
            .await
            .unwrap();
        assert_eq!(session.take_dialogs().await.unwrap(), vec!["XSS"]);

        for inert in ["<b>bold</b>", "javascript:alert('XSS')", "' OR '1'='1"] {
            session.clear(&input).await.unwrap();
            session.send_keys(&input, inert).await.unwrap();
            assert!(session.take_dialogs().await.unwrap().is_empty(), "{}", inert);
        }
    }

    #[tokio::test]
    async fn test_closed_session_rejects_everything() {
        let session = table_session();
        session.close().await.unwrap();
        assert!(!session.is_active());
        assert!(matches!(
            session.query(&ROW, None).await.unwrap_err(),
            Error::SessionClosed(_)
        ));
    }
}
