use serde::{Deserialize, Serialize};

/// A typed instruction extracted from one narrator reply. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    DamagePlayer { amount: u32 },
    HealPlayer { amount: u32 },
    DamageFoe { amount: u32 },
    GoldDelta { delta: i64 },
    XpGain { amount: u32 },
    ItemPickup { label: String },
    SpendSpellSlot { level: u8 },
    SpawnFoe { name: String, hp: i32, armor_class: i32 },
    FoeStatus { label: String },
    FoeDefeated,
    SceneDescription { text: String },
    LootRoll { rarity_or_item: String },
    JournalAppend { text: String },
}

impl Directive {
    pub fn short_name(&self) -> &'static str {
        match self {
            Directive::DamagePlayer { .. } => "DamagePlayer",
            Directive::HealPlayer { .. } => "HealPlayer",
            Directive::DamageFoe { .. } => "DamageFoe",
            Directive::GoldDelta { .. } => "GoldDelta",
            Directive::XpGain { .. } => "XpGain",
            Directive::ItemPickup { .. } => "ItemPickup",
            Directive::SpendSpellSlot { .. } => "SpendSpellSlot",
            Directive::SpawnFoe { .. } => "SpawnFoe",
            Directive::FoeStatus { .. } => "FoeStatus",
            Directive::FoeDefeated => "FoeDefeated",
            Directive::SceneDescription { .. } => "SceneDescription",
            Directive::LootRoll { .. } => "LootRoll",
            Directive::JournalAppend { .. } => "JournalAppend",
        }
    }
}
