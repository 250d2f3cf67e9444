//! Named key bindings reported alongside each segment.
//!
//! A key code is bound to at most one name, and a name to at most one key.

use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct KeyBindings {
    entries: Mutex<Vec<(String, i32)>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key_code` to `name`, dropping every existing binding of the key.
    /// With `name == None` the key is only unbound.
    pub fn bind(&self, name: Option<&str>, key_code: i32) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(_, code)| *code != key_code);

        let Some(name) = name else {
            return;
        };
        entries.retain(|(existing, _)| existing != name);
        entries.push((name.to_string(), key_code));
    }

    pub fn key_for(&self, name: &str) -> Option<i32> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().find(|(n, _)| n == name).map(|(_, code)| *code)
    }

    pub fn is_bound(&self, key_code: i32) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().any(|(_, code)| *code == key_code)
    }

    /// `[name, key_code]` pairs in binding order.
    pub fn snapshot(&self) -> Vec<[String; 2]> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(name, code)| [name.clone(), code.to_string()])
            .collect()
    }
}
