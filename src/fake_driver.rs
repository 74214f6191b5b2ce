//! In-memory [`Driver`] used by unit tests.
//!
//! Models a document tree with iframes (each with its own document), open
//! shadow roots, element state and click handlers. Element handles are only
//! valid while the driver is switched into the document they belong to.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::Timing;
use crate::diagnostics::DiagnosticSink;
use crate::driver::{By, Driver, DriverError, DriverResult, Following};

/// Millisecond-scale waits so failing lookups finish quickly
pub fn fast_timing() -> Timing {
    Timing {
        lookup_timeout: Duration::from_millis(40),
        poll_interval: Duration::from_millis(5),
        action_retries: 3,
        retry_backoff: Duration::from_millis(1),
        settle_delay: Duration::from_millis(1),
        ready_timeout: Duration::from_millis(20),
    }
}

/// Sink that remembers file names instead of writing them
#[derive(Default)]
pub struct RecordingSink {
    pub names: Mutex<Vec<String>>,
}

impl DiagnosticSink for RecordingSink {
    fn persist(&self, file_name: &str, _png: &[u8]) -> anyhow::Result<PathBuf> {
        self.names.lock().unwrap().push(file_name.to_string());
        Ok(PathBuf::from(file_name))
    }
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.names.lock().unwrap().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

pub type ClickHandler = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    displayed: bool,
    enabled: bool,
    selected: bool,
    value: String,
    shadow_root: Option<NodeId>,
    content: Option<NodeId>,
    host: Option<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            displayed: true,
            enabled: true,
            selected: false,
            value: String::new(),
            shadow_root: None,
            content: None,
            host: None,
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn input_type(&self) -> &str {
        self.attr("type").unwrap_or("text")
    }
}

/// Element description used to build fake documents
#[derive(Debug, Clone)]
pub struct NodeSpec(Node);

pub fn el(tag: &str) -> NodeSpec {
    NodeSpec(Node::new(tag))
}

impl NodeSpec {
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.0.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.0.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.0.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.0.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.0.enabled = false;
        self
    }

    pub fn checked(mut self) -> Self {
        self.0.selected = true;
        self
    }
}

/// Arena-backed DOM made of documents, elements and shadow fragments
#[derive(Debug, Clone)]
pub struct FakeDom {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for FakeDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("#document")],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let mut node = spec.0;
        node.parent = Some(parent);
        let id = self.push(node);
        self.node_mut(parent).children.push(id);
        id
    }

    /// Attach an open shadow root to `host` and return the fragment to build into
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        let mut fragment = Node::new("#shadow-root");
        fragment.host = Some(host);
        let id = self.push(fragment);
        self.node_mut(host).shadow_root = Some(id);
        id
    }

    /// Give an iframe its own document and return it
    pub fn frame_document(&mut self, iframe: NodeId) -> NodeId {
        let id = self.push(Node::new("#document"));
        self.node_mut(iframe).content = Some(id);
        id
    }

    pub fn set_displayed(&mut self, id: NodeId, displayed: bool) {
        self.node_mut(id).displayed = displayed;
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        self.node_mut(id).enabled = enabled;
    }

    pub fn value_of(&self, id: NodeId) -> String {
        let node = self.node(id);
        if node.tag == "select" {
            return self
                .children_of_tag(id, "option")
                .into_iter()
                .find(|o| self.node(*o).selected)
                .map(|o| self.option_value(o))
                .unwrap_or_default();
        }
        node.value.clone()
    }

    pub fn is_checked(&self, id: NodeId) -> bool {
        self.node(id).selected
    }

    /// First element carrying this id anywhere in the tree, frames and shadow roots included
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .find(|n| self.node(*n).attr("id") == Some(id))
    }

    fn option_value(&self, option: NodeId) -> String {
        let node = self.node(option);
        node.attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| node.text.clone())
    }

    fn children_of_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.node(*n).tag == tag)
            .collect()
    }

    /// Light-DOM descendants in document order, not crossing frames or shadow roots
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(scope).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn tree_root(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.node(id).parent {
            id = parent;
        }
        id
    }

    /// Document an element lives in, looking through shadow hosts
    fn document_of(&self, id: NodeId) -> NodeId {
        let mut root = self.tree_root(id);
        while let Some(host) = self.node(root).host {
            root = self.tree_root(host);
        }
        root
    }

    fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.node(p).parent;
        }
        false
    }

    fn text_of(&self, id: NodeId) -> String {
        let node = self.node(id);
        let mut parts = Vec::new();
        if !node.text.trim().is_empty() {
            parts.push(node.text.trim().to_string());
        }
        for child in &node.children {
            let t = self.text_of(*child);
            if !t.is_empty() {
                parts.push(t);
            }
        }
        parts.join(" ")
    }

    fn matches(&self, id: NodeId, compound: &Compound) -> bool {
        let node = self.node(id);
        if node.tag.starts_with('#') {
            return false;
        }
        if let Some(tag) = &compound.tag
            && tag != "*"
            && !tag.eq_ignore_ascii_case(&node.tag)
        {
            return false;
        }
        compound.conds.iter().all(|(name, wanted)| match (node.attr(name), wanted) {
            (Some(actual), Some(wanted)) => actual == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    fn matches_any(&self, id: NodeId, selector: &[Compound]) -> bool {
        selector.iter().any(|c| self.matches(id, c))
    }

    /// Rough outerHTML of a subtree, enough for source scanning
    pub fn render(&self, id: NodeId) -> String {
        let node = self.node(id);
        let inner: String = std::iter::once(escape_text(&node.text))
            .chain(node.children.iter().map(|c| self.render(*c)))
            .collect();
        if node.tag.starts_with('#') {
            return inner;
        }
        let attrs: String = node
            .attrs
            .iter()
            .map(|(k, v)| format!(" {}=\"{}\"", k, v.replace('"', "&quot;")))
            .collect();
        format!("<{}{}>{}</{}>", node.tag, attrs, inner, node.tag)
    }

    fn click(&mut self, id: NodeId) {
        let (tag, input_type, name) = {
            let node = self.node(id);
            (
                node.tag.clone(),
                node.input_type().to_string(),
                node.attr("name").map(str::to_string),
            )
        };

        match (tag.as_str(), input_type.as_str()) {
            ("input", "checkbox") => {
                let node = self.node_mut(id);
                node.selected = !node.selected;
            }
            ("input", "radio") => {
                if let Some(name) = name {
                    let doc = self.document_of(id);
                    let group: Vec<NodeId> = (0..self.nodes.len())
                        .map(NodeId)
                        .filter(|n| {
                            self.node(*n).tag == "input"
                                && self.node(*n).input_type() == "radio"
                                && self.node(*n).attr("name") == Some(name.as_str())
                                && self.document_of(*n) == doc
                        })
                        .collect();
                    for other in group {
                        self.node_mut(other).selected = false;
                    }
                }
                self.node_mut(id).selected = true;
            }
            ("option", _) => {
                if let Some(select) = self.node(id).parent {
                    for sibling in self.children_of_tag(select, "option") {
                        self.node_mut(sibling).selected = false;
                    }
                }
                self.node_mut(id).selected = true;
            }
            _ => {}
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One comma-separated part of a CSS selector: optional tag plus attribute conditions
#[derive(Debug, Clone, PartialEq)]
struct Compound {
    tag: Option<String>,
    conds: Vec<(String, Option<String>)>,
}

fn parse_css(selector: &str) -> DriverResult<Vec<Compound>> {
    let unsupported = || DriverError::Unsupported(format!("fake selector '{}'", selector));
    let chars: Vec<char> = selector.chars().collect();
    let mut i = 0;
    let mut out = Vec::new();

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let mut compound = Compound {
            tag: None,
            conds: Vec::new(),
        };
        let tag = read_ident(&chars, &mut i);
        if !tag.is_empty() {
            compound.tag = Some(tag);
        }
        while i < chars.len() && chars[i] != ',' {
            match chars[i] {
                '#' => {
                    i += 1;
                    let id = read_ident(&chars, &mut i);
                    compound.conds.push(("id".to_string(), Some(id)));
                }
                '[' => {
                    i += 1;
                    let name = read_ident(&chars, &mut i);
                    if chars.get(i) == Some(&']') {
                        i += 1;
                        compound.conds.push((name, None));
                        continue;
                    }
                    if chars.get(i) != Some(&'=') {
                        return Err(unsupported());
                    }
                    i += 1;
                    let quote = *chars.get(i).ok_or_else(unsupported)?;
                    if quote != '\'' && quote != '"' {
                        return Err(unsupported());
                    }
                    i += 1;
                    let mut value = String::new();
                    while i < chars.len() && chars[i] != quote {
                        if chars[i] == '\\' {
                            i += 1;
                        }
                        if let Some(c) = chars.get(i) {
                            value.push(*c);
                        }
                        i += 1;
                    }
                    i += 1;
                    if chars.get(i) != Some(&']') {
                        return Err(unsupported());
                    }
                    i += 1;
                    compound.conds.push((name, Some(value)));
                }
                c if c.is_whitespace() => {
                    i += 1;
                    while i < chars.len() && chars[i].is_whitespace() {
                        i += 1;
                    }
                    if i < chars.len() && chars[i] != ',' {
                        // Descendant combinators are out of scope for the fake
                        return Err(unsupported());
                    }
                }
                _ => return Err(unsupported()),
            }
        }
        if compound.tag.is_none() && compound.conds.is_empty() {
            return Err(unsupported());
        }
        out.push(compound);
        if i >= chars.len() {
            return Ok(out);
        }
        i += 1;
    }
}

fn read_ident(chars: &[char], i: &mut usize) -> String {
    let mut ident = String::new();
    while *i < chars.len()
        && (chars[*i].is_alphanumeric() || chars[*i] == '-' || chars[*i] == '_' || chars[*i] == '*')
    {
        ident.push(chars[*i]);
        *i += 1;
    }
    ident
}

/// `//tag` or `//tag[@attr='value']`
fn parse_xpath(expr: &str) -> DriverResult<Compound> {
    let unsupported = || DriverError::Unsupported(format!("fake xpath '{}'", expr));
    let rest = expr.strip_prefix("//").ok_or_else(unsupported)?;
    let (tag, predicate) = match rest.find('[') {
        Some(pos) => (&rest[..pos], Some(&rest[pos..])),
        None => (rest, None),
    };
    let mut compound = Compound {
        tag: Some(tag.to_string()),
        conds: Vec::new(),
    };
    if let Some(predicate) = predicate {
        let inner = predicate
            .strip_prefix("[@")
            .and_then(|p| p.strip_suffix(']'))
            .ok_or_else(unsupported)?;
        let (name, value) = inner.split_once('=').ok_or_else(unsupported)?;
        let value = value.trim_matches(|c| c == '\'' || c == '"');
        compound
            .conds
            .push((name.to_string(), Some(value.to_string())));
    }
    Ok(compound)
}

struct FakeState {
    dom: FakeDom,
    current: NodeId,
    handlers: HashMap<NodeId, ClickHandler>,
    clicks: HashMap<NodeId, usize>,
    flaky: HashMap<NodeId, u32>,
    visited: Vec<String>,
    id_lookup_unsupported: bool,
    shadow_api_unsupported: bool,
    fail_screenshot: bool,
    screenshots: usize,
    page_source: Option<String>,
    ready_state: String,
}

/// Scriptable driver over a [`FakeDom`]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new(dom: FakeDom) -> Self {
        let current = dom.root();
        Self {
            state: Mutex::new(FakeState {
                dom,
                current,
                handlers: HashMap::new(),
                clicks: HashMap::new(),
                flaky: HashMap::new(),
                visited: Vec::new(),
                id_lookup_unsupported: false,
                shadow_api_unsupported: false,
                fail_screenshot: false,
                screenshots: 0,
                page_source: None,
                ready_state: "complete".to_string(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_dom<T>(&self, f: impl FnOnce(&mut FakeDom) -> T) -> T {
        f(&mut self.lock().dom)
    }

    pub fn on_click(&self, node: NodeId, handler: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.lock().handlers.insert(node, Arc::new(handler));
    }

    /// Make the next `failures` clicks on `node` fail as not interactable
    pub fn set_flaky(&self, node: NodeId, failures: u32) {
        self.lock().flaky.insert(node, failures);
    }

    pub fn click_count(&self, node: NodeId) -> usize {
        self.lock().clicks.get(&node).copied().unwrap_or(0)
    }

    pub fn total_clicks(&self) -> usize {
        self.lock().clicks.values().sum()
    }

    pub fn set_id_lookup_unsupported(&self, unsupported: bool) {
        self.lock().id_lookup_unsupported = unsupported;
    }

    pub fn set_shadow_api_unsupported(&self, unsupported: bool) {
        self.lock().shadow_api_unsupported = unsupported;
    }

    pub fn set_fail_screenshot(&self, fail: bool) {
        self.lock().fail_screenshot = fail;
    }

    pub fn screenshot_count(&self) -> usize {
        self.lock().screenshots
    }

    pub fn set_page_source(&self, source: Option<&str>) {
        self.lock().page_source = source.map(str::to_string);
    }

    pub fn set_ready_state(&self, state: &str) {
        self.lock().ready_state = state.to_string();
    }

    pub fn visited(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    /// Document the driver is currently switched into
    pub fn current_document(&self) -> NodeId {
        self.lock().current
    }

    pub fn element_by_id(&self, id: &str) -> NodeId {
        self.lock()
            .dom
            .element_by_id(id)
            .unwrap_or_else(|| panic!("no element with id '{}'", id))
    }

    pub fn value_of(&self, node: NodeId) -> String {
        self.lock().dom.value_of(node)
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.lock().dom.is_checked(node)
    }
}

impl FakeState {
    fn live(&self, id: NodeId) -> DriverResult<&Node> {
        if self.dom.document_of(id) != self.current {
            return Err(DriverError::StaleElement(format!(
                "{:?} is not in the current browsing context",
                id
            )));
        }
        Ok(self.dom.node(id))
    }

    fn search(&self, scope: NodeId, by: &By) -> DriverResult<Vec<NodeId>> {
        let selector = match by {
            By::Id(id) => {
                if self.id_lookup_unsupported {
                    return Err(DriverError::Unsupported("id lookup".to_string()));
                }
                vec![Compound {
                    tag: None,
                    conds: vec![("id".to_string(), Some(id.clone()))],
                }]
            }
            By::Name(name) => vec![Compound {
                tag: None,
                conds: vec![("name".to_string(), Some(name.clone()))],
            }],
            By::Css(css) => parse_css(css)?,
            By::XPath(xpath) => vec![parse_xpath(xpath)?],
        };
        Ok(self
            .dom
            .descendants(scope)
            .into_iter()
            .filter(|n| self.dom.matches_any(*n, &selector))
            .collect())
    }

    fn shadow_query(&self, scope: NodeId, css: &str) -> DriverResult<Option<NodeId>> {
        Ok(self.search(scope, &By::Css(css.to_string()))?.into_iter().next())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Element = NodeId;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.visited.push(url.to_string());
        state.current = state.dom.root();
        Ok(())
    }

    async fn find_all(&self, by: &By) -> DriverResult<Vec<NodeId>> {
        let state = self.lock();
        state.search(state.current, by)
    }

    async fn find_all_within(&self, scope: &NodeId, by: &By) -> DriverResult<Vec<NodeId>> {
        let state = self.lock();
        state.live(*scope)?;
        state.search(*scope, by)
    }

    async fn following(&self, origin: &NodeId, target: &Following) -> DriverResult<Option<NodeId>> {
        let state = self.lock();
        state.live(*origin)?;
        let selector = match target {
            Following::Matching(css) => Some(parse_css(css)?),
            Following::CustomElement => None,
        };
        let dom = &state.dom;
        let order = dom.descendants(dom.tree_root(*origin));
        Ok(order
            .into_iter()
            .skip_while(|n| n != origin)
            .skip(1)
            .filter(|n| !dom.is_descendant(*n, *origin))
            .find(|n| match &selector {
                Some(selector) => dom.matches_any(*n, selector),
                None => dom.node(*n).tag.contains('-'),
            }))
    }

    async fn parent(&self, element: &NodeId) -> DriverResult<Option<NodeId>> {
        let state = self.lock();
        let node = state.live(*element)?;
        Ok(node
            .parent
            .filter(|p| !state.dom.node(*p).tag.starts_with('#')))
    }

    async fn shadow_root_query(&self, host: &NodeId, css: &str) -> DriverResult<Option<NodeId>> {
        let state = self.lock();
        let node = state.live(*host)?;
        if state.shadow_api_unsupported {
            return Err(DriverError::Unsupported("shadow root API".to_string()));
        }
        match node.shadow_root {
            Some(fragment) => state.shadow_query(fragment, css),
            None => Err(DriverError::Unsupported(
                "host has no open shadow root".to_string(),
            )),
        }
    }

    async fn script_shadow_query(&self, host: &NodeId, css: &str) -> DriverResult<Option<NodeId>> {
        let state = self.lock();
        let node = state.live(*host)?;
        let scope = node.shadow_root.unwrap_or(*host);
        state.shadow_query(scope, css)
    }

    async fn text(&self, element: &NodeId) -> DriverResult<String> {
        let state = self.lock();
        state.live(*element)?;
        Ok(state.dom.text_of(*element))
    }

    async fn attribute(&self, element: &NodeId, name: &str) -> DriverResult<Option<String>> {
        let state = self.lock();
        Ok(state.live(*element)?.attr(name).map(str::to_string))
    }

    async fn value(&self, element: &NodeId) -> DriverResult<String> {
        let state = self.lock();
        state.live(*element)?;
        Ok(state.dom.value_of(*element))
    }

    async fn is_displayed(&self, element: &NodeId) -> DriverResult<bool> {
        Ok(self.lock().live(*element)?.displayed)
    }

    async fn is_enabled(&self, element: &NodeId) -> DriverResult<bool> {
        Ok(self.lock().live(*element)?.enabled)
    }

    async fn is_selected(&self, element: &NodeId) -> DriverResult<bool> {
        Ok(self.lock().live(*element)?.selected)
    }

    async fn click(&self, element: &NodeId) -> DriverResult<()> {
        let mut state = self.lock();
        let node = state.live(*element)?;
        if !node.displayed || !node.enabled {
            return Err(DriverError::NotInteractable(format!("{:?}", element)));
        }
        if let Some(remaining) = state.flaky.get_mut(element)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(DriverError::NotInteractable(format!(
                "{:?} is covered by another element",
                element
            )));
        }

        *state.clicks.entry(*element).or_insert(0) += 1;
        state.dom.click(*element);
        if let Some(handler) = state.handlers.get(element).cloned() {
            handler(&mut state.dom);
        }
        Ok(())
    }

    async fn clear(&self, element: &NodeId) -> DriverResult<()> {
        let mut state = self.lock();
        state.live(*element)?;
        state.dom.node_mut(*element).value.clear();
        Ok(())
    }

    async fn send_keys(&self, element: &NodeId, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let node = state.live(*element)?;
        if !node.enabled {
            return Err(DriverError::NotInteractable(format!("{:?}", element)));
        }
        let limit = node.attr("maxlength").and_then(|m| m.parse::<usize>().ok());
        let node = state.dom.node_mut(*element);
        node.value.push_str(text);
        if let Some(limit) = limit {
            node.value = node.value.chars().take(limit).collect();
        }
        Ok(())
    }

    async fn page_source(&self) -> DriverResult<String> {
        let state = self.lock();
        Ok(state
            .page_source
            .clone()
            .unwrap_or_else(|| state.dom.render(state.current)))
    }

    async fn switch_to_frame(&self, frame: &NodeId) -> DriverResult<()> {
        let mut state = self.lock();
        let node = state.live(*frame)?;
        let content = node
            .content
            .ok_or_else(|| DriverError::Command(format!("{:?} is not a frame", frame)))?;
        state.current = content;
        Ok(())
    }

    async fn switch_to_default(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.current = state.dom.root();
        Ok(())
    }

    async fn ready_state(&self) -> DriverResult<String> {
        Ok(self.lock().ready_state.clone())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let mut state = self.lock();
        if state.fail_screenshot {
            return Err(DriverError::Command("screenshot failed".to_string()));
        }
        state.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

pub use crate::scenarios::{IFRAME_WITHOUT_ID_HEADING, SHADOW_HEADING};

pub const IFRAME_WITH_ID_HEADING: &str = "Iframe with ID";

/// The registration page the form facade is written against.
///
/// The main form labels its controls with `for`; both iframe forms place
/// controls right after their labels without `for`; the shadow form only
/// carries ids, names and placeholders. Submitting the main form with terms
/// checked appends a "Submitted Data" heading and a JSON `<pre>`.
pub fn registration_page() -> FakeDriver {
    let mut dom = FakeDom::new();
    let root = dom.root();

    dom.append(root, el("h1").text("Registration Form"));
    let form = dom.append(root, el("form").id("mainForm"));
    for (id, label) in [
        ("firstName", "First Name *"),
        ("lastName", "Last Name *"),
        ("email", "Email *"),
    ] {
        dom.append(form, el("label").attr("for", id).text(label));
        dom.append(
            form,
            el("input").id(id).attr("name", id).attr("placeholder", label.trim_end_matches(" *")),
        );
    }
    dom.append(form, el("label").attr("for", "phone").text("Phone"));
    dom.append(
        form,
        el("input").id("phone").attr("name", "phone").attr("maxlength", "10"),
    );
    dom.append(form, el("label").attr("for", "state").text("State"));
    let state = dom.append(form, el("select").id("state").attr("name", "state"));
    append_state_options(&mut dom, state);
    dom.append(form, el("label").text("Gender"));
    for value in ["male", "female"] {
        dom.append(
            form,
            el("input").id(value).attr("type", "radio").attr("name", "gender").attr("value", value),
        );
        dom.append(form, el("label").attr("for", value).text(&capitalize(value)));
    }
    dom.append(
        form,
        el("input").id("terms").attr("type", "checkbox").attr("name", "terms"),
    );
    dom.append(form, el("label").attr("for", "terms").text("I agree to the terms"));
    dom.append(
        form,
        el("button").id("submitBtn").attr("type", "submit").text("Submit"),
    );

    dom.append(root, el("h2").text(IFRAME_WITH_ID_HEADING));
    let frame = dom.append(root, el("iframe").id("form-frame").attr("src", "/frame"));
    let frame_doc = dom.frame_document(frame);
    build_frame_form(&mut dom, frame_doc);

    dom.append(root, el("h2").text(IFRAME_WITHOUT_ID_HEADING));
    let anonymous = dom.append(root, el("iframe").attr("src", "/frame"));
    let anonymous_doc = dom.frame_document(anonymous);
    build_frame_form(&mut dom, anonymous_doc);

    dom.append(root, el("h2").text(SHADOW_HEADING));
    let host = dom.append(root, el("shadow-form"));
    let shadow = dom.attach_shadow(host);
    let shadow_form = dom.append(shadow, el("form"));
    for (id, name, placeholder) in [
        ("shadowFirstName", "firstName", "First Name"),
        ("shadowLastName", "lastName", "Last Name"),
        ("shadowEmail", "email", "Email"),
    ] {
        dom.append(
            shadow_form,
            el("input").id(id).attr("name", name).attr("placeholder", placeholder),
        );
    }
    let shadow_state = dom.append(
        shadow_form,
        el("select").id("shadowState").attr("name", "state"),
    );
    append_state_options(&mut dom, shadow_state);
    dom.append(
        shadow_form,
        el("button").id("shadowSubmit").attr("type", "submit").text("Submit"),
    );

    let submit = dom.element_by_id("submitBtn");
    let driver = FakeDriver::new(dom);
    if let Some(submit) = submit {
        driver.on_click(submit, echo_main_submission);
    }
    driver
}

fn append_state_options(dom: &mut FakeDom, select: NodeId) {
    dom.append(select, el("option").attr("value", "").text("Select a state").checked());
    for (value, text) in [
        ("US", "United States"),
        ("CA", "Canada"),
        ("UK", "United Kingdom"),
    ] {
        dom.append(select, el("option").attr("value", value).text(text));
    }
}

fn build_frame_form(dom: &mut FakeDom, doc: NodeId) {
    let form = dom.append(doc, el("form"));
    for (name, label) in [("fname", "First Name"), ("lname", "Last Name"), ("email", "Email")] {
        dom.append(form, el("label").text(label));
        dom.append(form, el("input").attr("name", name));
    }
    dom.append(form, el("label").text("State"));
    let state = dom.append(form, el("select").attr("name", "state"));
    append_state_options(dom, state);
    dom.append(form, el("input").attr("type", "checkbox").attr("name", "terms"));
    dom.append(form, el("label").text("I agree to the terms"));
    dom.append(form, el("button").attr("type", "submit").text("Submit"));
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn echo_main_submission(dom: &mut FakeDom) {
    let value = |dom: &FakeDom, id: &str| {
        dom.element_by_id(id)
            .map(|n| dom.value_of(n))
            .unwrap_or_default()
    };
    let Some(terms) = dom.element_by_id("terms") else {
        return;
    };
    if !dom.is_checked(terms) {
        return;
    }

    let gender = ["male", "female"]
        .into_iter()
        .find(|g| dom.element_by_id(g).is_some_and(|n| dom.is_checked(n)))
        .unwrap_or_default();
    let payload = serde_json::json!({
        "First Name": value(dom, "firstName"),
        "Last Name": value(dom, "lastName"),
        "Email": value(dom, "email"),
        "Phone": value(dom, "phone"),
        "State": value(dom, "state"),
        "Gender": gender,
        "Terms": "on",
    });

    let root = dom.root();
    dom.append(root, el("h2").text("Submitted Data"));
    dom.append(
        root,
        el("pre")
            .id("submitted-data")
            .text(&serde_json::to_string_pretty(&payload).unwrap()),
    );
}
