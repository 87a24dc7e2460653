use serde::{Deserialize, Serialize};

use crate::model::character::Character;
use crate::model::foe::{Bestiary, Foe};
use crate::model::journal::Journal;
use crate::model::message::History;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
    pub description: String,
}

/// Everything one adventure owns. The host holds the single mutable instance
/// and lends it to the reducer and the compactor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub character: Character,
    pub foe: Option<Foe>,
    pub journal: Journal,
    pub bestiary: Bestiary,
    pub history: History,
    /// Newest first.
    pub gallery: Vec<GalleryImage>,
}

impl SessionState {
    pub fn new(character: Character) -> Self {
        let mut journal = Journal::default();
        journal.append(format!("{} sets out on an adventure.", character.name));
        Self {
            character,
            foe: None,
            journal,
            bestiary: Bestiary::default(),
            history: History::default(),
            gallery: Vec::new(),
        }
    }

    /// Records an image, skipping it when it repeats the newest entry.
    pub fn add_to_gallery(&mut self, url: &str, description: &str) {
        if self.gallery.first().is_some_and(|g| g.url == url) {
            return;
        }
        self.gallery.insert(
            0,
            GalleryImage {
                url: url.to_string(),
                description: description.to_string(),
            },
        );
    }
}

/// A read-only view handed to the host after every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: u32,
    pub xp: u32,
    pub next_level_xp: Option<u32>,
    pub hp: u32,
    pub hp_max: u32,
    pub armor_class: i32,
    pub proficiency_bonus: i32,
    pub hit_dice: (u32, u32),
    /// `(spell level, remaining, max)`
    pub spell_slots: Vec<(u8, u32, u32)>,
    pub gold: u32,
    pub inventory: Vec<String>,
    pub foe: Option<Foe>,
    pub journal: Vec<String>,
    pub bestiary: Vec<String>,
}

impl From<&SessionState> for GameStateSnapshot {
    fn from(state: &SessionState) -> Self {
        let c = &state.character;
        GameStateSnapshot {
            name: c.name.clone(),
            race: c.race.to_string(),
            class: c.class.to_string(),
            level: c.level,
            xp: c.xp,
            next_level_xp: crate::engine::rules::xp_threshold(c.level + 1),
            hp: c.hp,
            hp_max: c.hp_max,
            armor_class: c.armor_class(),
            proficiency_bonus: c.proficiency_bonus(),
            hit_dice: (c.hit_dice.current, c.hit_dice.max),
            spell_slots: c
                .spell_slots
                .levels()
                .map(|lvl| (lvl, c.spell_slots.remaining(lvl), c.spell_slots.max(lvl)))
                .collect(),
            gold: c.gold,
            inventory: c.inventory.clone(),
            foe: state.foe.clone(),
            journal: state.journal.iter().cloned().collect(),
            bestiary: state.bestiary.entries().iter().map(|e| e.name.clone()).collect(),
        }
    }
}
