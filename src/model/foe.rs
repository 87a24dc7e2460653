use serde::{Deserialize, Serialize};

/// The single active combat encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foe {
    pub name: String,
    pub hp: i32,
    pub hp_max: i32,
    pub armor_class: i32,
    /// Status-effect labels in the order they were applied.
    pub status: Vec<String>,
}

impl Foe {
    pub fn new(name: impl Into<String>, hp: i32, armor_class: i32) -> Self {
        Self {
            name: name.into(),
            hp,
            hp_max: hp,
            armor_class,
            status: Vec::new(),
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    pub fn add_status(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.status.iter().any(|s| s == label) {
            return false;
        }
        self.status.push(label.to_string());
        true
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} (HP {}/{}, AC {})",
            self.name, self.hp, self.hp_max, self.armor_class
        );
        if !self.status.is_empty() {
            line.push_str(&format!(" [{}]", self.status.join(", ")));
        }
        line
    }
}

/// Informational record of every creature encountered. Never read by combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestiaryEntry {
    pub name: String,
    pub hp_max: i32,
    pub armor_class: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bestiary {
    entries: Vec<BestiaryEntry>,
}

impl Bestiary {
    /// Registers a creature the first time its name is seen.
    pub fn register(&mut self, foe: &Foe) -> bool {
        if self.contains(&foe.name) {
            return false;
        }
        self.entries.push(BestiaryEntry {
            name: foe.name.clone(),
            hp_max: foe.hp_max,
            armor_class: foe.armor_class,
        });
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn entries(&self) -> &[BestiaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
