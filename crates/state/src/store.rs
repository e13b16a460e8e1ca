use std::collections::{BTreeMap, BTreeSet};

use foundation::Scalar;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action_log::ActionLog;
use crate::persistence::KeyValueStore;
use crate::selection_set::SelectionSet;

/// A value held in one store slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    Null,
    Scalar(Scalar),
    List(Vec<Scalar>),
    Selection(SelectionSet),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        match self {
            StateValue::Null => true,
            StateValue::List(v) => v.is_empty(),
            StateValue::Selection(s) => s.is_empty(),
            StateValue::Scalar(_) => false,
        }
    }

    /// The value a single-valued consumer should see: the scalar itself, the
    /// first list entry, or the first selected id.
    pub fn first(&self) -> Option<Scalar> {
        match self {
            StateValue::Null => None,
            StateValue::Scalar(s) => Some(s.clone()),
            StateValue::List(v) => v.first().cloned(),
            StateValue::Selection(s) => s.ids().next().map(|id| Scalar::Text(id.0.clone())),
        }
    }

    /// Every value, in order.
    pub fn all(&self) -> Vec<Scalar> {
        match self {
            StateValue::Null => Vec::new(),
            StateValue::Scalar(s) => vec![s.clone()],
            StateValue::List(v) => v.clone(),
            StateValue::Selection(s) => s.ids().map(|id| Scalar::Text(id.0.clone())).collect(),
        }
    }
}

impl From<Scalar> for StateValue {
    fn from(v: Scalar) -> Self {
        StateValue::Scalar(v)
    }
}

impl From<Vec<Scalar>> for StateValue {
    fn from(v: Vec<Scalar>) -> Self {
        StateValue::List(v)
    }
}

impl From<SelectionSet> for StateValue {
    fn from(v: SelectionSet) -> Self {
        StateValue::Selection(v)
    }
}

/// Declared mutations. Every write to the store goes through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetValue { key: String, value: StateValue },
    /// Restore `key` to its initialized default, or remove it.
    Reset { key: String },
    /// Declare defaults; durable keys are then restored from persistence.
    Initialize { defaults: BTreeMap<String, StateValue> },
}

impl Action {
    pub fn set(key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        Action::SetValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn reset(key: impl Into<String>) -> Self {
        Action::Reset { key: key.into() }
    }

    fn kind(&self) -> &'static str {
        match self {
            Action::SetValue { .. } => "set",
            Action::Reset { .. } => "reset",
            Action::Initialize { .. } => "initialize",
        }
    }
}

/// Notification delivered to subscribers after an action changed the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub revision: u64,
    pub keys: Vec<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Read access shared by the live store and its snapshots.
pub trait StateView {
    fn value(&self, key: &str) -> Option<&StateValue>;
}

/// Immutable copy of the store at one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub revision: u64,
    pub values: BTreeMap<String, StateValue>,
}

impl StateView for StateSnapshot {
    fn value(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }
}

type Listener = Box<dyn FnMut(&StateChange) + Send>;

struct Persistence {
    backend: Box<dyn KeyValueStore>,
    durable: BTreeSet<String>,
}

/// Keyed filter/selection state with a reducer, change notification and an
/// action log.
///
/// Writes are last-write-wins. Actions that leave every value unchanged do not
/// bump the revision and do not notify.
#[derive(Default)]
pub struct StateStore {
    values: BTreeMap<String, StateValue>,
    defaults: BTreeMap<String, StateValue>,
    revision: u64,
    log: ActionLog,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    persistence: Option<Persistence>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("values", &self.values)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a durable backend for the given keys.
    pub fn with_persistence(
        mut self,
        backend: Box<dyn KeyValueStore>,
        durable: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.persistence = Some(Persistence {
            backend,
            durable: durable.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    pub fn first(&self, key: &str) -> Option<Scalar> {
        self.values.get(key).and_then(StateValue::first)
    }

    pub fn selection(&self, key: &str) -> SelectionSet {
        match self.values.get(key) {
            Some(StateValue::Selection(s)) => s.clone(),
            _ => SelectionSet::new(),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            revision: self.revision,
            values: self.values.clone(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Option<StateChange> {
        self.dispatch(Action::set(key, value))
    }

    /// Apply `action`. Returns the change when anything actually changed.
    pub fn dispatch(&mut self, action: Action) -> Option<StateChange> {
        let kind = action.kind();
        let changed = match action {
            Action::SetValue { key, value } => self.write(key, Some(value)),
            Action::Reset { key } => {
                let default = self.defaults.get(&key).cloned();
                self.write(key, default)
            }
            Action::Initialize { defaults } => self.initialize(defaults),
        };

        if changed.is_empty() {
            return None;
        }

        self.revision += 1;
        self.log.record(self.revision, kind, changed.clone());
        debug!(revision = self.revision, kind, keys = ?changed, "state changed");

        let change = StateChange {
            revision: self.revision,
            keys: changed,
        };
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
        Some(change)
    }

    fn write(&mut self, key: String, value: Option<StateValue>) -> Vec<String> {
        if self.values.get(&key) == value.as_ref() {
            return Vec::new();
        }
        self.persist(&key, value.as_ref());
        match value {
            Some(v) => {
                self.values.insert(key.clone(), v);
            }
            None => {
                self.values.remove(&key);
            }
        }
        vec![key]
    }

    fn initialize(&mut self, defaults: BTreeMap<String, StateValue>) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, default) in defaults {
            let value = self.restore(&key).unwrap_or_else(|| default.clone());
            self.defaults.insert(key.clone(), default);
            if self.values.get(&key) != Some(&value) {
                self.values.insert(key.clone(), value);
                changed.push(key);
            }
        }
        changed
    }

    fn persist(&mut self, key: &str, value: Option<&StateValue>) {
        let Some(p) = self.persistence.as_mut() else {
            return;
        };
        if !p.durable.contains(key) {
            return;
        }
        let result = match value {
            Some(v) => match serde_json::to_value(v) {
                Ok(json) => p.backend.save(key, &json),
                Err(e) => {
                    warn!("cannot encode state for {key}: {e}");
                    return;
                }
            },
            None => p.backend.remove(key).map(|_| ()),
        };
        if let Err(e) = result {
            warn!("failed to persist {key}: {e}");
        }
    }

    fn restore(&self, key: &str) -> Option<StateValue> {
        let p = self.persistence.as_ref()?;
        if !p.durable.contains(key) {
            return None;
        }
        match p.backend.load(key) {
            Ok(Some(json)) => match serde_json::from_value(json) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("ignoring unreadable persisted value for {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("failed to load persisted {key}: {e}");
                None
            }
        }
    }
}

impl StateView for StateStore {
    fn value(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }
}
