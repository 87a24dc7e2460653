use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::rules;
use crate::model::directive::Directive;
use crate::model::event_result::{EventResult, NarrativeApplyReport, RejectReason};
use crate::model::foe::Foe;
use crate::model::game_state::SessionState;

/// What a spawn directive does while another foe is still engaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPolicy {
    #[default]
    Replace,
    KeepActive,
}

/// Apply every directive of one reply in order. Each directive is independent:
/// a rejection never stops its siblings, and every clamp holds after each step.
pub fn apply_directives<R: Rng + ?Sized>(
    state: &mut SessionState,
    directives: &[Directive],
    policy: SpawnPolicy,
    rng: &mut R,
) -> NarrativeApplyReport {
    let mut report = NarrativeApplyReport::default();

    for directive in directives {
        let result = apply_directive(state, directive, policy, rng, &mut report);
        match &result {
            EventResult::Applied => debug!(directive = directive.short_name(), "applied"),
            EventResult::Rejected { reason } => info!(
                directive = directive.short_name(),
                reason = %reason.message(),
                "rejected"
            ),
        }
        report.results.push((directive.clone(), result));
    }

    report
}

/// Owned form of [`apply_directives`]: `(state, directives) -> (state', report)`.
pub fn reduce<R: Rng + ?Sized>(
    mut state: SessionState,
    directives: &[Directive],
    policy: SpawnPolicy,
    rng: &mut R,
) -> (SessionState, NarrativeApplyReport) {
    let report = apply_directives(&mut state, directives, policy, rng);
    (state, report)
}

pub fn apply_directive<R: Rng + ?Sized>(
    state: &mut SessionState,
    directive: &Directive,
    policy: SpawnPolicy,
    rng: &mut R,
    report: &mut NarrativeApplyReport,
) -> EventResult {
    match directive {
        Directive::DamagePlayer { amount } => {
            let taken = state.character.take_damage(*amount);
            state.journal.append(format!("Took {} damage", taken));
            if state.character.is_down() {
                state
                    .journal
                    .append(format!("{} falls unconscious", state.character.name));
            }
            EventResult::Applied
        }

        Directive::HealPlayer { amount } => {
            let healed = state.character.heal(*amount);
            if healed > 0 {
                state.journal.append(format!("Recovered {} HP", healed));
            }
            EventResult::Applied
        }

        Directive::DamageFoe { amount } => {
            let Some(foe) = state.foe.as_mut() else {
                return rejected(RejectReason::NoActiveFoe);
            };
            let damage = i32::try_from(*amount).unwrap_or(i32::MAX);
            foe.hp = foe.hp.saturating_sub(damage);
            if foe.is_defeated() {
                defeat_foe(state, report);
            }
            EventResult::Applied
        }

        Directive::FoeDefeated => {
            defeat_foe(state, report);
            EventResult::Applied
        }

        Directive::SpawnFoe {
            name,
            hp,
            armor_class,
        } => {
            if let Some(active) = &state.foe {
                match policy {
                    SpawnPolicy::KeepActive => {
                        return rejected(RejectReason::EncounterActive(active.name.clone()));
                    }
                    SpawnPolicy::Replace => {
                        info!(previous = %active.name, next = %name, "replacing active foe");
                    }
                }
            }
            let foe = Foe::new(name.clone(), *hp, *armor_class);
            state.bestiary.register(&foe);
            state.journal.append(format!("Encountered: {}", foe.name));
            state.foe = Some(foe);
            EventResult::Applied
        }

        Directive::FoeStatus { label } => {
            let Some(foe) = state.foe.as_mut() else {
                return rejected(RejectReason::NoActiveFoe);
            };
            if !foe.add_status(label) {
                return rejected(RejectReason::Duplicate(label.clone()));
            }
            EventResult::Applied
        }

        Directive::GoldDelta { delta } => {
            state.character.adjust_gold(*delta);
            match delta.signum() {
                1 => state.journal.append(format!("Gained {} gold", delta)),
                -1 => state.journal.append(format!("Spent {} gold", delta.unsigned_abs())),
                _ => {}
            }
            EventResult::Applied
        }

        Directive::XpGain { amount } => {
            let c = &mut state.character;
            c.xp = c.xp.saturating_add(*amount);
            state.journal.append(format!("+{} XP", amount));

            let gained = rules::apply_level_ups(&mut state.character);
            for level in &gained {
                state
                    .journal
                    .append(format!("Level up! Reached level {}", level));
            }
            report.levels_gained.extend(gained);
            EventResult::Applied
        }

        Directive::ItemPickup { label } => pick_up(state, label),

        Directive::LootRoll { rarity_or_item } => {
            let item = rules::roll_loot(rng, rarity_or_item);
            pick_up(state, &item)
        }

        Directive::SpendSpellSlot { level } => match state.character.spell_slots.spend(*level) {
            Ok(remaining) => {
                debug!(level, remaining, "spell slot spent");
                EventResult::Applied
            }
            Err(reason) => rejected(reason),
        },

        // One illustration per reply: a later scene replaces an earlier one.
        Directive::SceneDescription { text } => {
            if let Some(previous) = report.scene.replace(text.clone()) {
                debug!(%previous, next = %text, "scene superseded within reply");
            }
            EventResult::Applied
        }

        Directive::JournalAppend { text } => {
            state.journal.append(text.clone());
            EventResult::Applied
        }
    }
}

fn pick_up(state: &mut SessionState, label: &str) -> EventResult {
    if !state.character.add_item(label) {
        return rejected(RejectReason::Duplicate(label.to_string()));
    }
    state.journal.append(format!("Found item: {}", label));
    EventResult::Applied
}

fn defeat_foe(state: &mut SessionState, report: &mut NarrativeApplyReport) {
    if let Some(foe) = state.foe.take() {
        state.journal.append(format!("Defeated: {}", foe.name));
        report.foe_defeated = Some(foe.name);
    }
}

fn rejected(reason: RejectReason) -> EventResult {
    EventResult::Rejected { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::directive_parser::parse_reply;
    use crate::model::character::{AbilityScores, Character, CharacterClass, Race};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(class: CharacterClass) -> SessionState {
        SessionState::new(Character::new(
            "Elara",
            Race::Elf,
            class,
            AbilityScores::default(),
        ))
    }

    fn run(state: &mut SessionState, reply: &str) -> NarrativeApplyReport {
        let mut rng = StdRng::seed_from_u64(11);
        let parsed = parse_reply(reply);
        apply_directives(state, &parsed.directives, SpawnPolicy::Replace, &mut rng)
    }

    #[test]
    fn test_hp_stays_within_bounds() {
        let mut state = session(CharacterClass::Fighter);
        let max = state.character.hp_max;
        run(&mut state, "[[DANNO:3]] [[DANNO:500]] [[CURA:2]] [[CURA:9999]] [[DANNO:1]]");
        assert_eq!(state.character.hp, max - 1);
        assert!(state.character.hp <= state.character.hp_max);
    }

    #[test]
    fn test_spawn_then_kill_foe() {
        let mut state = session(CharacterClass::Fighter);
        run(&mut state, "[[NEMICO:Goblin|7|13]]");
        assert_eq!(state.foe, Some(Foe::new("Goblin", 7, 13)));
        assert!(state.bestiary.contains("Goblin"));

        let report = run(&mut state, "[[DANNO_NEMICO:9]]");
        assert_eq!(state.foe, None);
        assert_eq!(report.foe_defeated.as_deref(), Some("Goblin"));
        assert_eq!(state.journal.last().map(String::as_str), Some("Defeated: Goblin"));
    }

    #[test]
    fn test_damage_without_foe_is_rejected() {
        let mut state = session(CharacterClass::Fighter);
        let report = run(&mut state, "[[DANNO_NEMICO:4]] [[STATO_NEMICO:Prone]]");
        assert_eq!(report.rejected().count(), 2);
        assert_eq!(state.foe, None);
    }

    #[test]
    fn test_spawn_policy_keep_active() {
        let mut state = session(CharacterClass::Fighter);
        let mut rng = StdRng::seed_from_u64(1);
        let spawn = |name: &str| Directive::SpawnFoe {
            name: name.to_string(),
            hp: 10,
            armor_class: 12,
        };
        apply_directives(&mut state, &[spawn("Orc")], SpawnPolicy::KeepActive, &mut rng);
        let report =
            apply_directives(&mut state, &[spawn("Ogre")], SpawnPolicy::KeepActive, &mut rng);
        assert_eq!(state.foe.as_ref().map(|f| f.name.as_str()), Some("Orc"));
        assert!(matches!(
            report.rejected().next(),
            Some((_, RejectReason::EncounterActive(_)))
        ));

        apply_directives(&mut state, &[spawn("Ogre")], SpawnPolicy::Replace, &mut rng);
        assert_eq!(state.foe.as_ref().map(|f| f.name.as_str()), Some("Ogre"));
        assert_eq!(state.bestiary.len(), 2);
    }

    #[test]
    fn test_gold_never_negative() {
        let mut state = session(CharacterClass::Fighter);
        run(&mut state, "[[ORO:-50]] [[ORO:+7]]");
        assert_eq!(state.character.gold, 7);
    }

    #[test]
    fn test_xp_crossing_one_threshold_levels_once() {
        let mut state = session(CharacterClass::Fighter);
        state.character.xp = 280;
        state.character.hp = 1;
        let hp_max_before = state.character.hp_max;

        let report = run(&mut state, "[[XP:40]]");
        assert_eq!(state.character.level, 2);
        assert_eq!(report.levels_gained, vec![2]);
        assert!(state.character.hp_max > hp_max_before);
        assert_eq!(state.character.hp, state.character.hp_max);

        run(&mut state, "[[XP:10]]");
        assert_eq!(state.character.level, 2);
        assert_eq!(state.character.xp, 330);
    }

    #[test]
    fn test_spell_slot_exhaustion_is_rejected() {
        let mut state = session(CharacterClass::Wizard);
        let report = run(&mut state, "[[SLOT:1]] [[SLOT:1]] [[SLOT:1]]");
        assert_eq!(state.character.spell_slots.used(1), 2);
        assert_eq!(report.notices().len(), 1);
        assert!(state.character.spell_slots.used(1) <= state.character.spell_slots.max(1));
    }

    #[test]
    fn test_item_pickup_and_loot_suppress_duplicates() {
        let mut state = session(CharacterClass::Fighter);
        let before = state.character.inventory.len();
        let report = run(
            &mut state,
            "[[OGGETTO:Silver Key]] [[OGGETTO:Silver Key]] [[LOOT:Silver Key]] [[LOOT:Rope]]",
        );
        assert_eq!(state.character.inventory.len(), before + 2);
        assert_eq!(report.rejected().count(), 2);
    }

    #[test]
    fn test_scene_is_reported_not_applied() {
        let mut state = session(CharacterClass::Fighter);
        let before = state.clone();
        let report = run(&mut state, "[[LUOGO:A ruined chapel]]");
        assert_eq!(report.scene.as_deref(), Some("A ruined chapel"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_last_scene_of_a_reply_wins() {
        let mut state = session(CharacterClass::Fighter);
        let report = run(&mut state, "[[LUOGO:A city gate]] You pass through. [[LUOGO:A crowded market]]");
        assert_eq!(report.scene.as_deref(), Some("A crowded market"));
        assert_eq!(report.applied().count(), 2);
    }

    #[test]
    fn test_reduce_is_owned() {
        let state = session(CharacterClass::Fighter);
        let mut rng = StdRng::seed_from_u64(5);
        let (next, report) = reduce(
            state,
            &[Directive::JournalAppend {
                text: "Met the innkeeper Bram".to_string(),
            }],
            SpawnPolicy::Replace,
            &mut rng,
        );
        assert_eq!(report.applied().count(), 1);
        assert_eq!(next.journal.last().map(String::as_str), Some("Met the innkeeper Bram"));
    }
}
