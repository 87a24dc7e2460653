use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::dice::{ability_modifier, generate_ability_score, proficiency_bonus};
use crate::engine::rules;
use crate::model::event_result::RejectReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    /// Rolls all six scores with 4d6-drop-lowest.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            strength: generate_ability_score(rng),
            dexterity: generate_ability_score(rng),
            constitution: generate_ability_score(rng),
            intelligence: generate_ability_score(rng),
            wisdom: generate_ability_score(rng),
            charisma: generate_ability_score(rng),
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    pub const ALL: [Skill; 18] = [
        Skill::Athletics,
        Skill::Acrobatics,
        Skill::SleightOfHand,
        Skill::Stealth,
        Skill::Arcana,
        Skill::History,
        Skill::Investigation,
        Skill::Nature,
        Skill::Religion,
        Skill::AnimalHandling,
        Skill::Insight,
        Skill::Medicine,
        Skill::Perception,
        Skill::Survival,
        Skill::Deception,
        Skill::Intimidation,
        Skill::Performance,
        Skill::Persuasion,
    ];

    /// The ability a check with this skill is made with.
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Athletics => "Athletics",
            Skill::Acrobatics => "Acrobatics",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Arcana => "Arcana",
            Skill::History => "History",
            Skill::Investigation => "Investigation",
            Skill::Nature => "Nature",
            Skill::Religion => "Religion",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Insight => "Insight",
            Skill::Medicine => "Medicine",
            Skill::Perception => "Perception",
            Skill::Survival => "Survival",
            Skill::Deception => "Deception",
            Skill::Intimidation => "Intimidation",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Skill> {
        let name = name.trim();
        Skill::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Race {
    Human,
    Elf,
    Dwarf,
    Tiefling,
    HalfElf,
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Race::Human => "Human",
            Race::Elf => "Elf",
            Race::Dwarf => "Dwarf",
            Race::Tiefling => "Tiefling",
            Race::HalfElf => "Half-Elf",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Fighter,
    Wizard,
    Rogue,
    Ranger,
    Cleric,
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Wizard => "Wizard",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Cleric => "Cleric",
        };
        f.write_str(name)
    }
}

/// Spell slots per spell level. `used` never exceeds `max` for any level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots {
    max: BTreeMap<u8, u32>,
    used: BTreeMap<u8, u32>,
}

impl SpellSlots {
    pub fn from_max(max: BTreeMap<u8, u32>) -> Self {
        Self {
            max,
            used: BTreeMap::new(),
        }
    }

    pub fn max(&self, level: u8) -> u32 {
        self.max.get(&level).copied().unwrap_or(0)
    }

    pub fn used(&self, level: u8) -> u32 {
        self.used.get(&level).copied().unwrap_or(0)
    }

    pub fn remaining(&self, level: u8) -> u32 {
        self.max(level).saturating_sub(self.used(level))
    }

    /// Spell levels that have at least one slot, ascending.
    pub fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.max.iter().filter(|(_, &n)| n > 0).map(|(&lvl, _)| lvl)
    }

    pub fn is_empty(&self) -> bool {
        self.levels().next().is_none()
    }

    /// Marks one slot of `level` as used. Rejected, with no change, when every
    /// slot of that level is already spent.
    pub fn spend(&mut self, level: u8) -> Result<u32, RejectReason> {
        let max = self.max(level);
        let used = self.used(level);
        if used >= max {
            return Err(RejectReason::ResourceExhausted(format!(
                "no level {} spell slots remaining ({}/{})",
                level, used, max
            )));
        }
        self.used.insert(level, used + 1);
        Ok(max - used - 1)
    }

    /// Replaces the slot table with a new maximum and refills every slot.
    pub fn grow_to(&mut self, table: &BTreeMap<u8, u32>) {
        for (&level, &qty) in table {
            let entry = self.max.entry(level).or_insert(0);
            *entry = (*entry).max(qty);
        }
        self.used.clear();
    }

    pub fn restore_all(&mut self) {
        self.used.clear();
    }

    /// Pulls every used count back under its maximum.
    pub fn clamp_used(&mut self) {
        for (level, used) in self.used.iter_mut() {
            let max = self.max.get(level).copied().unwrap_or(0);
            *used = (*used).min(max);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDice {
    pub current: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub race: Race,
    pub class: CharacterClass,
    pub scores: AbilityScores,

    pub level: u32,
    pub xp: u32,
    pub hp: u32,
    pub hp_max: u32,
    pub hit_dice: HitDice,
    pub spell_slots: SpellSlots,

    /// Item labels in pickup order. Duplicates allowed only from starting gear.
    pub inventory: Vec<String>,
    pub gold: u32,

    pub proficiencies: Vec<Skill>,
    /// Known spells and cantrips, fixed at creation.
    pub spells: Vec<String>,
}

impl Character {
    /// Builds a level 1 character from rolled scores and the class tables.
    pub fn new(name: impl Into<String>, race: Race, class: CharacterClass, scores: AbilityScores) -> Self {
        let data = class.data();
        let con = scores.modifier(Ability::Constitution);
        let hp_max = (data.hit_die as i32 + con).max(1) as u32;

        Self {
            name: name.into(),
            race,
            class,
            scores,
            level: 1,
            xp: 0,
            hp: hp_max,
            hp_max,
            hit_dice: HitDice { current: 1, max: 1 },
            spell_slots: SpellSlots::from_max(rules::spell_slots_for(class, 1)),
            inventory: data.starting_equipment.iter().map(|s| s.to_string()).collect(),
            gold: rules::STARTING_GOLD,
            proficiencies: data.proficiencies.to_vec(),
            spells: data.starting_spells.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.scores.modifier(ability)
    }

    pub fn proficiency_bonus(&self) -> i32 {
        proficiency_bonus(self.level)
    }

    /// Always derived from the current scores and inventory.
    pub fn armor_class(&self) -> i32 {
        rules::armor_class(&self.scores, &self.inventory)
    }

    pub fn is_proficient(&self, skill: Skill) -> bool {
        self.proficiencies.contains(&skill)
    }

    pub fn skill_bonus(&self, skill: Skill) -> i32 {
        let base = self.modifier(skill.ability());
        if self.is_proficient(skill) {
            base + self.proficiency_bonus()
        } else {
            base
        }
    }

    /// Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.hp);
        self.hp -= taken;
        taken
    }

    /// Returns the hit points actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount).min(self.hp_max);
        self.hp - before
    }

    pub fn adjust_gold(&mut self, delta: i64) {
        let gold = (self.gold as i64 + delta).clamp(0, u32::MAX as i64);
        self.gold = gold as u32;
    }

    pub fn has_item(&self, label: &str) -> bool {
        self.inventory.iter().any(|i| i == label)
    }

    /// Adds an item unless one with the exact same label is already carried.
    pub fn add_item(&mut self, label: &str) -> bool {
        if self.has_item(label) {
            return false;
        }
        self.inventory.push(label.to_string());
        true
    }

    pub fn remove_item(&mut self, label: &str) -> bool {
        match self.inventory.iter().position(|i| i == label) {
            Some(idx) => {
                self.inventory.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.hp == 0
    }

    /// One line used in prompts and status bars.
    pub fn summary(&self) -> String {
        format!(
            "{} ({} {}, level {}) HP {}/{} AC {} XP {} Gold {}",
            self.name,
            self.race,
            self.class,
            self.level,
            self.hp,
            self.hp_max,
            self.armor_class(),
            self.xp,
            self.gold
        )
    }
}
