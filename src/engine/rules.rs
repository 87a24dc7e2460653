//! Fixed rule tables and derived-stat formulas.
//!
//! Everything here is a pure function of its inputs apart from the level-up
//! application, which mutates the character it is given.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use tracing::info;

use crate::model::character::{Ability, AbilityScores, Character, CharacterClass, Skill};

pub const STARTING_GOLD: u32 = 10;

/// Minimum cumulative xp for each level. No automatic level-up past the last entry.
pub const XP_THRESHOLDS: [(u32, u32); 5] = [(1, 0), (2, 300), (3, 900), (4, 2700), (5, 6500)];

static DICE_IN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d*d\d+(?:\s*[+-]\s*\d+)?)\b").expect("label dice pattern is valid")
});

pub struct ClassData {
    pub hit_die: u32,
    pub proficiencies: &'static [Skill],
    pub starting_equipment: &'static [&'static str],
    pub starting_spells: &'static [&'static str],
    pub casting: SpellProgression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellProgression {
    None,
    Full,
    Half,
}

impl CharacterClass {
    pub fn data(&self) -> ClassData {
        match self {
            CharacterClass::Fighter => ClassData {
                hit_die: 10,
                proficiencies: &[Skill::Athletics, Skill::Perception, Skill::Intimidation],
                starting_equipment: &[
                    "Chain Mail (AC 16)",
                    "Longsword (1d8)",
                    "Shield (+2 AC)",
                    "Longbow (1d8)",
                ],
                starting_spells: &[],
                casting: SpellProgression::None,
            },
            CharacterClass::Wizard => ClassData {
                hit_die: 6,
                proficiencies: &[Skill::Arcana, Skill::History, Skill::Investigation],
                starting_equipment: &[
                    "Arcane Staff (1d6)",
                    "Spellbook",
                    "Wizard Robes",
                    "Dagger (1d4)",
                ],
                starting_spells: &[
                    "Magic Missile",
                    "Mage Hand",
                    "Ray of Frost",
                    "Mage Armor",
                    "Shield",
                ],
                casting: SpellProgression::Full,
            },
            CharacterClass::Rogue => ClassData {
                hit_die: 8,
                proficiencies: &[
                    Skill::Stealth,
                    Skill::SleightOfHand,
                    Skill::Investigation,
                    Skill::Deception,
                ],
                starting_equipment: &[
                    "Dagger (1d4) x2",
                    "Shortbow (1d6)",
                    "Leather Armor (AC 11)",
                    "Thieves' Tools",
                ],
                starting_spells: &[],
                casting: SpellProgression::None,
            },
            CharacterClass::Ranger => ClassData {
                hit_die: 10,
                proficiencies: &[Skill::Survival, Skill::Perception, Skill::Nature],
                starting_equipment: &[
                    "Leather Armor (AC 11)",
                    "Shortsword (1d6) x2",
                    "Longbow (1d8)",
                ],
                starting_spells: &["Hunter's Mark"],
                casting: SpellProgression::Half,
            },
            CharacterClass::Cleric => ClassData {
                hit_die: 8,
                proficiencies: &[Skill::Religion, Skill::Insight, Skill::History],
                starting_equipment: &[
                    "Mace (1d6)",
                    "Shield (+2 AC)",
                    "Holy Symbol",
                    "Chain Mail (AC 16)",
                ],
                starting_spells: &[
                    "Guidance",
                    "Sacred Flame",
                    "Cure Wounds",
                    "Guiding Bolt",
                    "Bless",
                ],
                casting: SpellProgression::Full,
            },
        }
    }

    pub fn hit_die(&self) -> u32 {
        self.data().hit_die
    }

    pub fn is_spellcaster(&self) -> bool {
        self.data().casting != SpellProgression::None
    }
}

/// Cantrips cost no slot.
pub const CANTRIPS: [&str; 5] = [
    "Guidance",
    "Sacred Flame",
    "Ray of Frost",
    "Mage Hand",
    "Prestidigitation",
];

pub fn is_cantrip(spell: &str) -> bool {
    CANTRIPS.iter().any(|c| c.eq_ignore_ascii_case(spell.trim()))
}

/// Slot maxima for a class at a level, keyed by spell level.
pub fn spell_slots_for(class: CharacterClass, level: u32) -> BTreeMap<u8, u32> {
    let table: &[(u8, u32)] = match class.data().casting {
        SpellProgression::None => &[],
        SpellProgression::Full => match level {
            0 | 1 => &[(1, 2)],
            2 => &[(1, 3)],
            3 => &[(1, 4), (2, 2)],
            4 => &[(1, 4), (2, 3)],
            _ => &[(1, 4), (2, 3), (3, 2)],
        },
        SpellProgression::Half => match level {
            0 | 1 => &[],
            2 => &[(1, 2)],
            3 | 4 => &[(1, 3)],
            _ => &[(1, 4), (2, 2)],
        },
    };
    table.iter().copied().collect()
}

/// Minimum xp for `level`, or `None` past the table.
pub fn xp_threshold(level: u32) -> Option<u32> {
    XP_THRESHOLDS
        .iter()
        .find(|(lvl, _)| *lvl == level)
        .map(|(_, xp)| *xp)
}

/// True when `xp` meets the threshold for `level + 1`.
pub fn level_up_check(xp: u32, level: u32) -> bool {
    xp_threshold(level + 1).is_some_and(|needed| xp >= needed)
}

/// Average hit-die gain for a level (`die / 2 + 1`) plus the CON modifier, at least 1.
pub fn level_hp_gain(class: CharacterClass, con_modifier: i32) -> u32 {
    let average = (class.hit_die() / 2 + 1) as i32;
    (average + con_modifier).max(1) as u32
}

/// Advances exactly one level, fully healing and growing hit dice and slots.
pub fn level_up(character: &mut Character) {
    character.level += 1;
    let gain = level_hp_gain(character.class, character.modifier(Ability::Constitution));
    character.hp_max += gain;
    character.hp = character.hp_max;

    character.hit_dice.max = character.level;
    character.hit_dice.current = (character.hit_dice.current + 1).min(character.hit_dice.max);

    if character.class.is_spellcaster() {
        let table = spell_slots_for(character.class, character.level);
        character.spell_slots.grow_to(&table);
    }

    info!(
        name = %character.name,
        level = character.level,
        hp_max = character.hp_max,
        "level up"
    );
}

/// Applies every level-up the current xp has earned. Returns the levels gained.
pub fn apply_level_ups(character: &mut Character) -> Vec<u32> {
    let mut gained = Vec::new();
    while level_up_check(character.xp, character.level) {
        level_up(character);
        gained.push(character.level);
    }
    gained
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArmorTier {
    Light,
    Medium,
    Heavy,
}

/// Known armor, most specific names first so "Studded Leather" wins over "Leather".
const ARMOR_TABLE: [(&str, ArmorTier, i32); 12] = [
    ("studded leather", ArmorTier::Light, 12),
    ("leather", ArmorTier::Light, 11),
    ("padded", ArmorTier::Light, 11),
    ("chain shirt", ArmorTier::Medium, 13),
    ("scale mail", ArmorTier::Medium, 14),
    ("breastplate", ArmorTier::Medium, 14),
    ("half plate", ArmorTier::Medium, 15),
    ("hide armor", ArmorTier::Medium, 12),
    ("ring mail", ArmorTier::Heavy, 14),
    ("chain mail", ArmorTier::Heavy, 16),
    ("splint", ArmorTier::Heavy, 17),
    ("plate", ArmorTier::Heavy, 18),
];

pub fn armor_for(item: &str) -> Option<(ArmorTier, i32)> {
    let item = item.to_lowercase();
    ARMOR_TABLE
        .iter()
        .find(|(name, _, _)| item.contains(name))
        .map(|(_, tier, base)| (*tier, *base))
}

fn is_shield(item: &str) -> bool {
    item.to_lowercase().contains("shield")
}

fn is_ring_of_protection(item: &str) -> bool {
    item.to_lowercase().contains("ring of protection")
}

/// Armor class from scores and inventory.
///
/// Only the highest tier present counts (heavy > medium > light), using the best
/// base within that tier. Heavy ignores DEX, medium caps it at +2, light adds it
/// in full. A shield adds 2 and a Ring of Protection adds 1.
pub fn armor_class(scores: &AbilityScores, inventory: &[String]) -> i32 {
    let dex = scores.modifier(Ability::Dexterity);

    let best = inventory
        .iter()
        .filter_map(|item| armor_for(item))
        .max_by_key(|(tier, base)| (*tier, *base));

    let mut ac = match best {
        Some((ArmorTier::Heavy, base)) => base,
        Some((ArmorTier::Medium, base)) => base + dex.min(2),
        Some((ArmorTier::Light, base)) => base + dex,
        None => 10 + dex,
    };

    if inventory.iter().any(|i| is_shield(i)) {
        ac += 2;
    }
    if inventory.iter().any(|i| is_ring_of_protection(i)) {
        ac += 1;
    }
    ac
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponProfile {
    pub label: String,
    pub ability: Ability,
    pub damage: String,
}

const MELEE_WORDS: [&str; 7] = ["sword", "mace", "axe", "hammer", "staff", "club", "spear"];
const FINESSE_WORDS: [&str; 6] = ["bow", "dagger", "crossbow", "sling", "rapier", "dart"];

/// Recognises a weapon in an item label. Ranged and finesse weapons use DEX.
/// Damage dice are read from the label when present, e.g. `Longsword (1d8)`.
pub fn weapon_profile(item: &str) -> Option<WeaponProfile> {
    let lower = item.to_lowercase();
    let ability = if FINESSE_WORDS.iter().any(|w| lower.contains(w)) {
        Ability::Dexterity
    } else if MELEE_WORDS.iter().any(|w| lower.contains(w)) {
        Ability::Strength
    } else {
        return None;
    };

    let damage = DICE_IN_LABEL
        .captures(item)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "1d6".to_string());

    let label = item.split('(').next().unwrap_or(item).trim().to_string();

    Some(WeaponProfile {
        label,
        ability,
        damage,
    })
}

pub fn unarmed_strike() -> WeaponProfile {
    WeaponProfile {
        label: "Unarmed Strike".to_string(),
        ability: Ability::Strength,
        damage: "1d4".to_string(),
    }
}

/// Weapons carried, or an unarmed strike when there are none.
pub fn available_weapons(inventory: &[String]) -> Vec<WeaponProfile> {
    let weapons: Vec<_> = inventory.iter().filter_map(|i| weapon_profile(i)).collect();
    if weapons.is_empty() {
        vec![unarmed_strike()]
    } else {
        weapons
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
}

impl Rarity {
    pub fn parse(name: &str) -> Option<Rarity> {
        match name.trim().to_lowercase().as_str() {
            "common" | "comune" => Some(Rarity::Common),
            "uncommon" | "non comune" => Some(Rarity::Uncommon),
            "rare" | "raro" => Some(Rarity::Rare),
            _ => None,
        }
    }

    pub fn items(&self) -> &'static [&'static str] {
        match self {
            Rarity::Common => &[
                "Potion of Healing",
                "Scroll of Magic Missile",
                "Whetstone Oil",
                "Torch",
                "Rations",
                "Silk Rope",
            ],
            Rarity::Uncommon => &[
                "Longsword +1 (1d8)",
                "Ring of Protection",
                "Cloak of Elvenkind",
                "Bag of Holding",
                "Winged Boots",
            ],
            Rarity::Rare => &[
                "Plate Armor +1",
                "Wand of Fireballs",
                "Potion of Giant Strength",
            ],
        }
    }
}

/// A rarity bucket draws one item uniformly; anything else is a literal item name.
pub fn roll_loot<R: Rng + ?Sized>(rng: &mut R, rarity_or_item: &str) -> String {
    match Rarity::parse(rarity_or_item) {
        Some(rarity) => rarity
            .items()
            .choose(rng)
            .map(|s| s.to_string())
            .unwrap_or_else(|| rarity_or_item.trim().to_string()),
        None => rarity_or_item.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::character::Race;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dex(score: i32) -> AbilityScores {
        AbilityScores {
            dexterity: score,
            ..AbilityScores::default()
        }
    }

    fn inv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unarmored_ac() {
        assert_eq!(armor_class(&dex(14), &[]), 12);
        assert_eq!(armor_class(&dex(8), &[]), 9);
    }

    #[test]
    fn test_heavy_armor_ignores_dex() {
        assert_eq!(armor_class(&dex(18), &inv(&["Chain Mail (AC 16)"])), 16);
        assert_eq!(armor_class(&dex(6), &inv(&["Plate Armor +1"])), 18);
    }

    #[test]
    fn test_medium_armor_caps_dex() {
        assert_eq!(armor_class(&dex(18), &inv(&["Scale Mail"])), 16);
        assert_eq!(armor_class(&dex(8), &inv(&["Chain Shirt"])), 12);
    }

    #[test]
    fn test_light_armor_full_dex() {
        assert_eq!(armor_class(&dex(18), &inv(&["Leather Armor (AC 11)"])), 15);
        assert_eq!(armor_class(&dex(14), &inv(&["Studded Leather"])), 14);
    }

    #[test]
    fn test_highest_tier_wins() {
        let items = inv(&["Leather Armor (AC 11)", "Chain Shirt", "Ring Mail"]);
        assert_eq!(armor_class(&dex(18), &items), 14);
    }

    #[test]
    fn test_shield_and_ring() {
        let items = inv(&["Chain Mail (AC 16)", "Shield (+2 AC)", "Ring of Protection"]);
        assert_eq!(armor_class(&dex(10), &items), 19);
    }

    #[test]
    fn test_armor_class_add_then_remove_restores() {
        let scores = dex(16);
        let mut items = inv(&["Leather Armor (AC 11)"]);
        let before = armor_class(&scores, &items);
        assert_eq!(before, armor_class(&scores, &items));
        items.push("Shield (+2 AC)".to_string());
        assert_eq!(armor_class(&scores, &items), before + 2);
        items.pop();
        assert_eq!(armor_class(&scores, &items), before);
    }

    #[test]
    fn test_level_up_check() {
        assert!(!level_up_check(280, 1));
        assert!(level_up_check(300, 1));
        assert!(level_up_check(320, 1));
        assert!(!level_up_check(1_000_000, 5));
    }

    #[test]
    fn test_level_up_grows_hp_and_slots() {
        let mut c = Character::new("Elara", Race::Elf, CharacterClass::Wizard, dex(14));
        c.hp = 1;
        c.spell_slots.spend(1).unwrap();
        level_up(&mut c);
        assert_eq!(c.level, 2);
        assert_eq!(c.hp_max, 6 + 4);
        assert_eq!(c.hp, c.hp_max);
        assert_eq!(c.spell_slots.max(1), 3);
        assert_eq!(c.spell_slots.remaining(1), 3);
        assert_eq!(c.hit_dice.max, 2);
        assert_eq!(c.hit_dice.current, 2);
    }

    #[test]
    fn test_ranger_gets_slots_at_two() {
        let mut c = Character::new("Aran", Race::Human, CharacterClass::Ranger, dex(14));
        assert!(c.spell_slots.is_empty());
        level_up(&mut c);
        assert_eq!(c.spell_slots.max(1), 2);
    }

    #[test]
    fn test_level_ups_cascade() {
        let mut c = Character::new("Thorin", Race::Dwarf, CharacterClass::Fighter, dex(10));
        c.xp = 1000;
        assert_eq!(apply_level_ups(&mut c), vec![2, 3]);
        c.xp = 1_000_000;
        assert_eq!(apply_level_ups(&mut c), vec![4, 5]);
        assert_eq!(c.level, 5);
    }

    #[test]
    fn test_weapon_profiles() {
        let sword = weapon_profile("Longsword (1d8)").unwrap();
        assert_eq!(sword.ability, Ability::Strength);
        assert_eq!(sword.damage, "1d8");
        assert_eq!(sword.label, "Longsword");

        let bow = weapon_profile("Shortbow (1d6)").unwrap();
        assert_eq!(bow.ability, Ability::Dexterity);

        let club = weapon_profile("Warhammer").unwrap();
        assert_eq!(club.damage, "1d6");

        assert!(weapon_profile("Spellbook").is_none());
        assert_eq!(available_weapons(&inv(&["Torch"])), vec![unarmed_strike()]);
    }

    #[test]
    fn test_loot_rolls() {
        let mut rng = StdRng::seed_from_u64(3);
        let item = roll_loot(&mut rng, "Rare");
        assert!(Rarity::Rare.items().contains(&item.as_str()));
        assert_eq!(roll_loot(&mut rng, "Rusty Key"), "Rusty Key");
        let item = roll_loot(&mut rng, "non comune");
        assert!(Rarity::Uncommon.items().contains(&item.as_str()));
    }
}
