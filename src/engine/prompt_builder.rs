use crate::engine::directive_parser::VOCABULARY_VERSION;
use crate::model::character::Character;
use crate::model::game_state::SessionState;
use crate::model::message::Turn;

/// Builds the prompts sent to the narrator.
/// Formatting only: no parsing, no networking, no state changes.
pub struct PromptBuilder;

impl PromptBuilder {
    /// The per-turn prompt: state, memory, directive rules, then the action.
    pub fn build(state: &SessionState, journal_lines: usize, player_input: &str) -> String {
        let mut prompt = String::new();

        push_system_prompt(&mut prompt);
        push_character_section(&mut prompt, &state.character);
        push_foe_section(&mut prompt, state);
        push_journal_section(&mut prompt, state, journal_lines);
        push_digest_section(&mut prompt, &state.history.digest);
        push_history_section(&mut prompt, &state.history.window, "RECENT HISTORY");
        push_directive_rules(&mut prompt);
        push_player_action(&mut prompt, player_input);
        push_reminder(&mut prompt);

        prompt
    }

    /// Opening scene for a freshly created character.
    pub fn intro(character: &Character) -> String {
        let mut prompt = String::new();

        push_system_prompt(&mut prompt);
        push_character_section(&mut prompt, character);
        push_directive_rules(&mut prompt);
        prompt.push_str(&format!(
            "TASK:\nBegin the adventure for {} the {} {}. Give an evocative opening scene \
and end with a [[LUOGO:...]] tag describing where it starts.\n",
            character.name, character.race, character.class
        ));

        prompt
    }

    /// One-shot request to condense evicted history.
    pub fn summary(transcript: &str) -> String {
        format!(
            "Summarise the following Dungeons & Dragons events in at most 3 concise sentences. \
Keep every name and key fact. Do not add directive tags.\n\n{}\n",
            transcript
        )
    }
}

fn push_system_prompt(prompt: &mut String) {
    prompt.push_str(
        "You are the Dungeon Master of a single-player D&D 5e adventure.\n\n\
Rules:\n\
- Narrate the world and every non-player character. Never act for the player.\n\
- You must never state numeric changes to the hero without the matching tag.\n\
- The engine tracks HP, gold, XP, items, spell slots and the current enemy.\n\
- Use the difficulty classes of 5e (easy 10, medium 15, hard 20) when resolving checks.\n\n",
    );
}

fn push_character_section(prompt: &mut String, character: &Character) {
    prompt.push_str("PLAYER CHARACTER:\n");
    prompt.push_str(&character.summary());
    prompt.push('\n');

    if !character.inventory.is_empty() {
        prompt.push_str(&format!("Inventory: {}\n", character.inventory.join(", ")));
    }

    if !character.spells.is_empty() {
        prompt.push_str(&format!("Spells: {}\n", character.spells.join(", ")));
        let slots: Vec<String> = character
            .spell_slots
            .levels()
            .map(|lvl| {
                format!(
                    "L{} {}/{}",
                    lvl,
                    character.spell_slots.remaining(lvl),
                    character.spell_slots.max(lvl)
                )
            })
            .collect();
        if !slots.is_empty() {
            prompt.push_str(&format!("Spell slots: {}\n", slots.join(", ")));
        }
    }
    prompt.push('\n');
}

fn push_foe_section(prompt: &mut String, state: &SessionState) {
    prompt.push_str("ACTIVE ENEMY:\n");
    match &state.foe {
        Some(foe) => prompt.push_str(&foe.summary()),
        None => prompt.push_str("None"),
    }
    prompt.push_str("\n\n");
}

fn push_journal_section(prompt: &mut String, state: &SessionState, lines: usize) {
    if state.journal.is_empty() || lines == 0 {
        return;
    }
    prompt.push_str("JOURNAL:\n");
    for entry in state.journal.recent(lines) {
        prompt.push_str(&format!("- {}\n", entry));
    }
    prompt.push('\n');
}

fn push_digest_section(prompt: &mut String, digest: &[String]) {
    if digest.is_empty() {
        return;
    }
    prompt.push_str("STORY SO FAR:\n");
    for summary in digest {
        prompt.push_str(summary.trim());
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn push_history_section(prompt: &mut String, history: &[Turn], label: &str) {
    if history.is_empty() {
        return;
    }

    prompt.push_str(label);
    prompt.push_str(":\n");
    for turn in history {
        prompt.push_str(&turn.transcript_line());
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn push_directive_rules(prompt: &mut String) {
    prompt.push_str(&format!(
        "DIRECTIVES (vocabulary v{}):\n\
Embed these tags inline in your narration whenever the game state changes.\n\
- [[DANNO:n]] the hero takes n damage\n\
- [[CURA:n]] the hero recovers n HP\n\
- [[NEMICO:name|hp|ac]] an enemy engages the hero\n\
- [[DANNO_NEMICO:n]] the active enemy takes n damage\n\
- [[STATO_NEMICO:effect]] the active enemy gains a condition\n\
- [[SCONFITTO]] the active enemy is defeated or flees\n\
- [[ORO:+n]] or [[ORO:-n]] gold gained or spent\n\
- [[XP:n]] experience awarded\n\
- [[OGGETTO:item name]] the hero picks up an item\n\
- [[LOOT:Common|Uncommon|Rare]] random treasure of that rarity\n\
- [[SLOT:level]] the hero spends a spell slot of that level\n\
- [[LUOGO:short visual description]] a new scene worth illustrating\n\
- [[DIARIO:text]] a fact worth remembering\n\n",
        VOCABULARY_VERSION
    ));
}

fn push_player_action(prompt: &mut String, player_input: &str) {
    prompt.push_str("PLAYER ACTION:\n");
    prompt.push_str(player_input);
    prompt.push_str("\n\n");
}

fn push_reminder(prompt: &mut String) {
    prompt.push_str(
        "REMINDER:\n\
- Reply as narration only, in the second person.\n\
- Numbers inside tags are plain integers.\n\
- Only one enemy can be active at a time.\n",
    );
}
