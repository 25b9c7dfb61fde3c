//! Open tabs of the detail view and the active tab pointer.
//!
//! Tabs are deduplicated on their component and inputs. A tab may carry a
//! removal trigger, a future that closes the tab when it resolves, such as
//! the end of a layer's change stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use geoweave_core::reactive::Subject;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

pub const MIN_TAB_WIDTH_PERCENTAGE: f64 = 10.0;
pub const MAX_TAB_WIDTH_PERCENTAGE: f64 = 50.0;

/// Identifies a kind of view, e.g. a data table or a plot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab_{}", self.0)
    }
}

pub type InputEquality = Arc<dyn Fn(&Arc<Value>, &Arc<Value>) -> bool + Send + Sync>;

/// Describes a tab to open
pub struct TabContent {
    pub component: ComponentId,
    pub name: String,
    pub inputs: Arc<Value>,
    equals: Option<InputEquality>,
    remove_trigger: Option<BoxFuture<'static, ()>>,
}

impl TabContent {
    pub fn new(component: impl Into<ComponentId>, name: impl Into<String>, inputs: Arc<Value>) -> Self {
        Self {
            component: component.into(),
            name: name.into(),
            inputs,
            equals: None,
            remove_trigger: None,
        }
    }

    /// Compare inputs with `equals` instead of by reference
    pub fn with_equality<F>(mut self, equals: F) -> Self
    where
        F: Fn(&Arc<Value>, &Arc<Value>) -> bool + Send + Sync + 'static,
    {
        self.equals = Some(Arc::new(equals));
        self
    }

    /// Close the tab once `trigger` resolves
    pub fn with_remove_trigger<F>(mut self, trigger: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.remove_trigger = Some(trigger.boxed());
        self
    }

    /// Close the tab once `stream` ends
    pub fn removed_when_ended<S>(self, stream: S) -> Self
    where
        S: Stream + Send + 'static,
    {
        self.with_remove_trigger(stream.for_each(|_| future::ready(())))
    }

    fn is_duplicate_of(&self, tab: &Tab) -> bool {
        if self.component != tab.component {
            return false;
        }
        match &self.equals {
            Some(equals) => equals(&tab.inputs, &self.inputs),
            None => Arc::ptr_eq(&tab.inputs, &self.inputs),
        }
    }
}

impl fmt::Debug for TabContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabContent")
            .field("component", &self.component)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// An open tab as seen by subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTab {
    pub id: TabId,
    pub component: ComponentId,
    pub name: String,
    pub inputs: Arc<Value>,
}

struct Tab {
    id: TabId,
    component: ComponentId,
    name: String,
    inputs: Arc<Value>,
    trigger: Option<AbortHandle>,
}

impl Tab {
    fn to_open_tab(&self) -> OpenTab {
        OpenTab {
            id: self.id,
            component: self.component.clone(),
            name: self.name.clone(),
            inputs: Arc::clone(&self.inputs),
        }
    }
}

#[derive(Default)]
struct TabsState {
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

pub struct TabsService {
    this: Weak<TabsService>,
    next_id: AtomicU64,
    state: Mutex<TabsState>,
    tabs: Subject<Vec<OpenTab>>,
    active: Subject<Option<TabId>>,
}

impl TabsService {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            next_id: AtomicU64::new(0),
            state: Mutex::new(TabsState::default()),
            tabs: Subject::new(Vec::new()),
            active: Subject::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TabsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &TabsState) {
        let tabs: Vec<OpenTab> = state.tabs.iter().map(Tab::to_open_tab).collect();
        if self.tabs.get().as_ref() != Some(&tabs) {
            self.tabs.next(tabs);
        }
        if self.active.get() != Some(state.active) {
            self.active.next(state.active);
        }
    }

    /// Open a tab and activate it, or activate the already open duplicate
    pub fn add_component(&self, content: TabContent) -> TabId {
        let mut state = self.lock();

        if let Some(existing) = state.tabs.iter().find(|tab| content.is_duplicate_of(tab)) {
            let id = existing.id;
            debug!(tab = %id, component = %content.component, "Activating existing tab");
            state.active = Some(id);
            self.publish(&state);
            return id;
        }

        let id = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let TabContent {
            component,
            name,
            inputs,
            remove_trigger,
            ..
        } = content;

        let trigger = remove_trigger.and_then(|trigger| self.spawn_remove_trigger(id, trigger));

        debug!(tab = %id, component = %component, "Opened tab");
        state.tabs.push(Tab {
            id,
            component,
            name,
            inputs,
            trigger,
        });
        state.active = Some(id);
        self.publish(&state);
        id
    }

    fn spawn_remove_trigger(
        &self,
        id: TabId,
        trigger: BoxFuture<'static, ()>,
    ) -> Option<AbortHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(tab = %id, "Tab removal trigger ignored outside a runtime: {}", e);
                return None;
            }
        };

        let service = self.this.clone();
        let task = runtime.spawn(async move {
            trigger.await;
            if let Some(service) = service.upgrade() {
                service.remove_component(id);
            }
        });
        Some(task.abort_handle())
    }

    /// Close a tab; closing an absent tab is a no-op
    pub fn remove_component(&self, id: TabId) {
        let mut state = self.lock();
        let Some(index) = state.tabs.iter().position(|tab| tab.id == id) else {
            return;
        };

        let tab = state.tabs.remove(index);
        if let Some(trigger) = tab.trigger {
            trigger.abort();
        }

        if state.active == Some(id) {
            state.active = if state.tabs.is_empty() {
                None
            } else {
                let next = index.min(state.tabs.len() - 1);
                Some(state.tabs[next].id)
            };
        }

        debug!(tab = %id, "Closed tab");
        self.publish(&state);
    }

    pub fn set_active_tab(&self, id: TabId) {
        let mut state = self.lock();
        if state.active == Some(id) {
            return;
        }
        if !state.tabs.iter().any(|tab| tab.id == id) {
            debug!(tab = %id, "Ignoring activation of a closed tab");
            return;
        }
        state.active = Some(id);
        self.publish(&state);
    }

    pub fn tabs(&self) -> Vec<OpenTab> {
        self.lock().tabs.iter().map(Tab::to_open_tab).collect()
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.lock().active
    }

    pub fn tabs_stream(&self) -> BoxStream<'static, Vec<OpenTab>> {
        self.tabs.subscribe().boxed()
    }

    pub fn active_tab_stream(&self) -> BoxStream<'static, Option<TabId>> {
        self.active.select(|active| *active)
    }

    /// Width of a single tab header in percent of the tab bar
    pub fn tab_width_percentage(&self) -> f64 {
        let count = self.lock().tabs.len();
        if count == 0 {
            return MAX_TAB_WIDTH_PERCENTAGE;
        }
        (100.0 / count as f64).clamp(MIN_TAB_WIDTH_PERCENTAGE, MAX_TAB_WIDTH_PERCENTAGE)
    }
}

impl Drop for TabsService {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for tab in &state.tabs {
            if let Some(trigger) = &tab.trigger {
                trigger.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Arc<Value> {
        Arc::new(value)
    }

    #[test]
    fn test_duplicate_by_reference_activates_existing() {
        let tabs = TabsService::new();
        let shared = inputs(json!({"x": 1}));

        let first = tabs.add_component(TabContent::new("table", "A", Arc::clone(&shared)));
        let other = tabs.add_component(TabContent::new("table", "B", inputs(json!({"x": 2}))));
        assert_eq!(tabs.active_tab(), Some(other));

        let again = tabs.add_component(TabContent::new("table", "A", shared));
        assert_eq!(again, first);
        assert_eq!(tabs.tabs().len(), 2);
        assert_eq!(tabs.active_tab(), Some(first));
    }

    #[test]
    fn test_equal_inputs_without_predicate_open_new_tab() {
        let tabs = TabsService::new();
        tabs.add_component(TabContent::new("table", "A", inputs(json!({"x": 1}))));
        tabs.add_component(TabContent::new("table", "A", inputs(json!({"x": 1}))));
        assert_eq!(tabs.tabs().len(), 2);
    }

    #[test]
    fn test_custom_equality_deduplicates_by_value() {
        let tabs = TabsService::new();
        let by_value = |a: &Arc<Value>, b: &Arc<Value>| a == b;

        let first = tabs.add_component(
            TabContent::new("table", "A", inputs(json!({"x": 1}))).with_equality(by_value),
        );
        let second = tabs.add_component(
            TabContent::new("table", "A", inputs(json!({"x": 1}))).with_equality(by_value),
        );
        let plot = tabs.add_component(
            TabContent::new("plot", "A", inputs(json!({"x": 1}))).with_equality(by_value),
        );

        assert_eq!(first, second);
        assert_ne!(first, plot);
        assert_eq!(tabs.tabs().len(), 2);
    }

    #[test]
    fn test_removing_active_tab_activates_neighbor() {
        let tabs = TabsService::new();
        let ids: Vec<TabId> = (0..3)
            .map(|i| tabs.add_component(TabContent::new("table", "t", inputs(json!(i)))))
            .collect();

        tabs.set_active_tab(ids[1]);
        tabs.remove_component(ids[1]);
        assert_eq!(tabs.active_tab(), Some(ids[2]));

        tabs.remove_component(ids[2]);
        assert_eq!(tabs.active_tab(), Some(ids[0]));

        tabs.remove_component(ids[2]);
        assert_eq!(tabs.tabs().len(), 1);

        tabs.remove_component(ids[0]);
        assert_eq!(tabs.active_tab(), None);
    }

    #[test]
    fn test_removing_inactive_tab_keeps_active() {
        let tabs = TabsService::new();
        let a = tabs.add_component(TabContent::new("table", "a", inputs(json!(1))));
        let b = tabs.add_component(TabContent::new("table", "b", inputs(json!(2))));

        tabs.remove_component(a);
        assert_eq!(tabs.active_tab(), Some(b));
    }

    #[test]
    fn test_tab_width_is_clamped() {
        let tabs = TabsService::new();
        assert_eq!(tabs.tab_width_percentage(), MAX_TAB_WIDTH_PERCENTAGE);
        for i in 0..4 {
            tabs.add_component(TabContent::new("table", "t", inputs(json!(i))));
        }
        assert_eq!(tabs.tab_width_percentage(), 25.0);
        for i in 0..20 {
            tabs.add_component(TabContent::new("plot", "t", inputs(json!(i))));
        }
        assert_eq!(tabs.tab_width_percentage(), MIN_TAB_WIDTH_PERCENTAGE);
    }

    #[tokio::test]
    async fn test_remove_trigger_closes_tab() {
        let tabs = TabsService::new();
        let (sender, receiver) = futures::channel::oneshot::channel::<()>();

        let id = tabs.add_component(
            TabContent::new("table", "t", inputs(json!(null)))
                .with_remove_trigger(async move {
                    let _ = receiver.await;
                }),
        );
        let mut open_tabs = tabs.tabs_stream();
        assert_eq!(open_tabs.next().await.map(|t| t.len()), Some(1));

        drop(sender);
        assert_eq!(open_tabs.next().await.map(|t| t.len()), Some(0));
        assert_eq!(tabs.active_tab(), None);
        assert!(!tabs.tabs().iter().any(|tab| tab.id == id));
    }

    #[tokio::test]
    async fn test_active_tab_stream_skips_reactivation() {
        let tabs = TabsService::new();
        let mut active = tabs.active_tab_stream();
        let a = tabs.add_component(TabContent::new("table", "a", inputs(json!(1))));
        tabs.set_active_tab(a);
        tabs.remove_component(a);

        assert_eq!(active.next().await, Some(None));
        assert_eq!(active.next().await, Some(Some(a)));
        assert_eq!(active.next().await, Some(None));
    }
}
