// 📇 Name Registry - opponents and tournaments seen so far
//
// Append-only: names are added when a saved bout references them and are
// never removed. De-duplication is exact and case-sensitive ("Tanaka" and
// "tanaka" are two entries), order is first-seen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NameRegistry {
    names: Vec<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names(names: Vec<String>) -> Self {
        let mut registry = NameRegistry::new();
        for name in names {
            registry.add(&name);
        }
        registry
    }

    /// Add a name if it is non-blank and not already present.
    /// Returns true when the registry grew.
    pub fn add(&mut self, name: &str) -> bool {
        if name.trim().is_empty() || self.contains(name) {
            return false;
        }

        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names containing `fragment`, case-insensitive, in registry order
    pub fn suggest(&self, fragment: &str) -> Vec<&str> {
        let needle = fragment.to_lowercase();
        self.names
            .iter()
            .filter(|n| n.to_lowercase().contains(&needle))
            .map(|n| n.as_str())
            .collect()
    }
}

impl From<Vec<String>> for NameRegistry {
    fn from(names: Vec<String>) -> Self {
        NameRegistry::from_names(names)
    }
}

impl From<NameRegistry> for Vec<String> {
    fn from(registry: NameRegistry) -> Self {
        registry.names
    }
}
