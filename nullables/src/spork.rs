//! Nullable spork view: toggled directly by tests.

use lmnode_chain::{SporkId, SporkView};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct NullSporks {
    active: Mutex<HashSet<SporkId>>,
}

impl NullSporks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, spork: SporkId, active: bool) {
        let mut set = self.active.lock().unwrap();
        if active {
            set.insert(spork);
        } else {
            set.remove(&spork);
        }
    }
}

impl SporkView for NullSporks {
    fn is_active(&self, spork: SporkId) -> bool {
        self.active.lock().unwrap().contains(&spork)
    }
}
