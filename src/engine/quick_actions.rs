//! Mechanics the player resolves locally before the narrator sees the action.
//!
//! Each action rolls its own dice, applies any local effect (rest healing, slot
//! spending) and returns the bracketed action string sent as player input.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::dice::{roll_die, roll_or_zero};
use crate::engine::rules::{self, is_cantrip};
use crate::model::character::{Ability, Skill};
use crate::model::event_result::RejectReason;
use crate::model::game_state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickAction {
    RollD20,
    /// Attack with the named weapon, or the first one carried.
    Attack { weapon: Option<String> },
    SkillCheck { skill: Skill },
    ShortRest,
    LongRest,
    /// Leveled spells use `slot_level`, or the lowest level with a free slot.
    CastSpell { spell: String, slot_level: Option<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Player input for the narrator.
    pub action_text: String,
    /// Short result line for the host to show next to the dice.
    pub roll_summary: String,
}

pub fn perform<R: Rng + ?Sized>(
    state: &mut SessionState,
    action: &QuickAction,
    rng: &mut R,
) -> Result<ActionResult, RejectReason> {
    let result = match action {
        QuickAction::RollD20 => {
            let roll = roll_die(rng, 20);
            ActionResult {
                action_text: format!("[PURE D20: {}]", roll),
                roll_summary: format!("d20: {}", roll),
            }
        }
        QuickAction::Attack { weapon } => attack(state, weapon.as_deref(), rng)?,
        QuickAction::SkillCheck { skill } => {
            let bonus = state.character.skill_bonus(*skill);
            let total = roll_die(rng, 20) as i32 + bonus;
            ActionResult {
                action_text: format!("[SKILL CHECK: {} | Total: {}]", skill.name(), total),
                roll_summary: format!("{}: {}", skill.name(), total),
            }
        }
        QuickAction::ShortRest => short_rest(state, rng)?,
        QuickAction::LongRest => long_rest(state),
        QuickAction::CastSpell { spell, slot_level } => cast_spell(state, spell, *slot_level)?,
    };

    debug!(action = %result.action_text, "quick action");
    Ok(result)
}

fn attack<R: Rng + ?Sized>(
    state: &SessionState,
    weapon: Option<&str>,
    rng: &mut R,
) -> Result<ActionResult, RejectReason> {
    let c = &state.character;
    let weapons = rules::available_weapons(&c.inventory);
    let chosen = match weapon {
        Some(name) => weapons
            .iter()
            .find(|w| w.label.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| RejectReason::Invalid(format!("not carrying a weapon named {}", name)))?,
        None => weapons
            .first()
            .ok_or_else(|| RejectReason::Invalid("no weapon available".to_string()))?,
    };

    let modifier = c.modifier(chosen.ability);
    let to_hit = roll_die(rng, 20) as i32 + modifier + c.proficiency_bonus();
    let damage = roll_or_zero(rng, &chosen.damage)
        .total
        .saturating_add(modifier)
        .max(1);

    Ok(ActionResult {
        action_text: format!(
            "[COMBAT ACTION: Attack with {} | To-hit: {} | Damage: {}]",
            chosen.label, to_hit, damage
        ),
        roll_summary: format!("Atk: {} | Dmg: {}", to_hit, damage),
    })
}

fn short_rest<R: Rng + ?Sized>(
    state: &mut SessionState,
    rng: &mut R,
) -> Result<ActionResult, RejectReason> {
    let c = &mut state.character;
    if c.hit_dice.current == 0 {
        return Err(RejectReason::ResourceExhausted(
            "no hit dice remaining".to_string(),
        ));
    }

    let roll = roll_die(rng, c.class.hit_die()) as i32;
    let heal = (roll + c.modifier(Ability::Constitution)).max(1) as u32;
    let healed = c.heal(heal);
    c.hit_dice.current -= 1;

    state
        .journal
        .append(format!("Short rest: recovered {} HP", healed));

    Ok(ActionResult {
        action_text: format!("[ACTION: Short rest, recovered {} HP]", healed),
        roll_summary: format!("Hit die: +{} HP", healed),
    })
}

fn long_rest(state: &mut SessionState) -> ActionResult {
    let c = &mut state.character;
    c.hp = c.hp_max;
    c.spell_slots.restore_all();
    let regained = (c.hit_dice.max / 2).max(1);
    c.hit_dice.current = (c.hit_dice.current + regained).min(c.hit_dice.max);

    state.journal.append("Long rest completed");

    ActionResult {
        action_text: "[ACTION: Long rest completed]".to_string(),
        roll_summary: "Fully rested".to_string(),
    }
}

fn cast_spell(
    state: &mut SessionState,
    spell: &str,
    slot_level: Option<u8>,
) -> Result<ActionResult, RejectReason> {
    let c = &mut state.character;
    let Some(known) = c
        .spells
        .iter()
        .find(|s| s.eq_ignore_ascii_case(spell.trim()))
        .cloned()
    else {
        return Err(RejectReason::Invalid(format!("{} does not know {}", c.name, spell)));
    };

    if is_cantrip(&known) {
        return Ok(ActionResult {
            action_text: format!("[CAST SPELL: {} (cantrip)]", known),
            roll_summary: known,
        });
    }

    let level = match slot_level {
        Some(level) => level,
        None => c
            .spell_slots
            .levels()
            .find(|&lvl| c.spell_slots.remaining(lvl) > 0)
            .ok_or_else(|| RejectReason::ResourceExhausted("no spell slots remaining".to_string()))?,
    };

    let remaining = c.spell_slots.spend(level)?;

    Ok(ActionResult {
        action_text: format!("[CAST SPELL: {} (level {} slot)]", known, level),
        roll_summary: format!("{}: {} level {} slots left", known, remaining, level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::character::{AbilityScores, Character, CharacterClass, Race};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(class: CharacterClass) -> SessionState {
        let scores = AbilityScores {
            strength: 16,
            constitution: 14,
            ..AbilityScores::default()
        };
        SessionState::new(Character::new("Brom", Race::Human, class, scores))
    }

    #[test]
    fn test_attack_text() {
        let mut state = session(CharacterClass::Fighter);
        let mut rng = StdRng::seed_from_u64(9);
        let result = perform(
            &mut state,
            &QuickAction::Attack {
                weapon: Some("longsword".to_string()),
            },
            &mut rng,
        )
        .unwrap();
        assert!(result.action_text.starts_with("[COMBAT ACTION: Attack with Longsword | To-hit: "));
    }

    #[test]
    fn test_attack_unknown_weapon() {
        let mut state = session(CharacterClass::Fighter);
        let mut rng = StdRng::seed_from_u64(9);
        let err = perform(
            &mut state,
            &QuickAction::Attack {
                weapon: Some("Halberd".to_string()),
            },
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, RejectReason::Invalid(_)));
    }

    #[test]
    fn test_attack_with_absurd_weapon_dice_falls_back() {
        let mut state = session(CharacterClass::Fighter);
        state.character.inventory = vec!["Greatsword (1d6+2147483647)".to_string()];
        let mut rng = StdRng::seed_from_u64(3);
        let result = perform(&mut state, &QuickAction::Attack { weapon: None }, &mut rng).unwrap();
        // Zero dice plus STR +3.
        assert!(result.action_text.ends_with("| Damage: 3]"));
    }

    #[test]
    fn test_short_rest_spends_hit_die() {
        let mut state = session(CharacterClass::Fighter);
        let mut rng = StdRng::seed_from_u64(2);
        state.character.hp = 1;
        perform(&mut state, &QuickAction::ShortRest, &mut rng).unwrap();
        assert!(state.character.hp > 1);
        assert!(state.character.hp <= state.character.hp_max);
        assert_eq!(state.character.hit_dice.current, 0);

        let err = perform(&mut state, &QuickAction::ShortRest, &mut rng).unwrap_err();
        assert!(err.is_resource_exhausted());
    }

    #[test]
    fn test_long_rest_restores_everything() {
        let mut state = session(CharacterClass::Wizard);
        let mut rng = StdRng::seed_from_u64(2);
        state.character.hp = 1;
        state.character.hit_dice.current = 0;
        state.character.spell_slots.spend(1).unwrap();

        perform(&mut state, &QuickAction::LongRest, &mut rng).unwrap();
        assert_eq!(state.character.hp, state.character.hp_max);
        assert_eq!(state.character.spell_slots.remaining(1), 2);
        assert_eq!(state.character.hit_dice.current, 1);
    }

    #[test]
    fn test_cast_spells() {
        let mut state = session(CharacterClass::Wizard);
        let mut rng = StdRng::seed_from_u64(4);
        let cast = |spell: &str| QuickAction::CastSpell {
            spell: spell.to_string(),
            slot_level: None,
        };

        let r = perform(&mut state, &cast("Ray of Frost"), &mut rng).unwrap();
        assert_eq!(r.action_text, "[CAST SPELL: Ray of Frost (cantrip)]");
        assert_eq!(state.character.spell_slots.used(1), 0);

        perform(&mut state, &cast("magic missile"), &mut rng).unwrap();
        perform(&mut state, &cast("Magic Missile"), &mut rng).unwrap();
        let err = perform(&mut state, &cast("Magic Missile"), &mut rng).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert_eq!(state.character.spell_slots.used(1), 2);

        let err = perform(&mut state, &cast("Fireball"), &mut rng).unwrap_err();
        assert!(matches!(err, RejectReason::Invalid(_)));
    }

    #[test]
    fn test_skill_check_and_d20() {
        let mut state = session(CharacterClass::Rogue);
        let mut rng = StdRng::seed_from_u64(4);
        let r = perform(
            &mut state,
            &QuickAction::SkillCheck {
                skill: Skill::Stealth,
            },
            &mut rng,
        )
        .unwrap();
        assert!(r.action_text.starts_with("[SKILL CHECK: Stealth | Total: "));

        let r = perform(&mut state, &QuickAction::RollD20, &mut rng).unwrap();
        assert!(r.action_text.starts_with("[PURE D20: "));
    }
}
