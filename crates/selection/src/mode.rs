use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Inactive,
    /// Persists until explicitly deactivated.
    Pointer,
    /// Ends by itself after one committed rectangle.
    Rectangle,
}

/// Generic click handlers attached to a source, by name.
///
/// While suspended, `active` is empty. `restore` brings the suspended
/// handlers back exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickHandlers {
    active: Vec<String>,
    suspended: Option<Vec<String>>,
}

impl ClickHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `name` is already attached.
    pub fn register(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.active.contains(&name) || self.suspended.as_ref().is_some_and(|s| s.contains(&name)) {
            return false;
        }
        self.active.push(name);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|h| h != name);
        if let Some(suspended) = &mut self.suspended {
            suspended.retain(|h| h != name);
        }
        self.active.len() != before
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.is_some()
    }

    /// Detach every active handler. No-op when already suspended.
    pub fn suspend(&mut self) -> bool {
        if self.suspended.is_some() {
            return false;
        }
        self.suspended = Some(std::mem::take(&mut self.active));
        true
    }

    /// Reattach suspended handlers ahead of any added meanwhile.
    pub fn restore(&mut self) -> bool {
        let Some(mut restored) = self.suspended.take() else {
            return false;
        };
        for h in self.active.drain(..) {
            if !restored.contains(&h) {
                restored.push(h);
            }
        }
        self.active = restored;
        true
    }
}
