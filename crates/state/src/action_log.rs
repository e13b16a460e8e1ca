/// One applied store action, kept for traceability and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub revision: u64,
    pub kind: &'static str,
    pub keys: Vec<String>,
}

/// Bounded append-only log of applied actions.
///
/// Oldest entries are dropped once `capacity` is reached.
#[derive(Debug)]
pub struct ActionLog {
    records: Vec<ActionRecord>,
    capacity: usize,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl ActionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, revision: u64, kind: &'static str, keys: Vec<String>) {
        if self.records.len() >= self.capacity {
            self.records.remove(0);
        }
        self.records.push(ActionRecord {
            revision,
            kind,
            keys,
        });
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn drain(&mut self) -> Vec<ActionRecord> {
        std::mem::take(&mut self.records)
    }
}
