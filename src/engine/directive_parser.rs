//! Inline directive grammar.
//!
//! Narrator replies are prose with embedded tokens `[[KEYWORD:arg1|arg2]]` or
//! `[[KEYWORD]]`. Every token is scanned once, dispatched through a keyword
//! table, and decoded into a typed [`Directive`]. Unknown keywords are ignored
//! and malformed arguments drop only the offending token.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::directive::Directive;
use crate::model::event_result::SkippedDirective;

/// Bumped whenever a keyword is added, removed or changes arguments.
pub const VOCABULARY_VERSION: u32 = 1;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\[(.*?)\]\]").expect("token pattern is valid"));

/// A run of tokens separated only by whitespace is cleaned as one block.
static TOKEN_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[\[.*?\]\](?:\s*\[\[.*?\]\])*").expect("token run pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    DamagePlayer,
    HealPlayer,
    DamageFoe,
    Gold,
    Xp,
    Item,
    SpellSlot,
    SpawnFoe,
    FoeStatus,
    FoeDefeated,
    Scene,
    Loot,
    Journal,
}

/// Canonical tags first, then the aliases tolerated from drifting generators.
const KEYWORDS: [(&str, Keyword); 25] = [
    ("DANNO", Keyword::DamagePlayer),
    ("CURA", Keyword::HealPlayer),
    ("DANNO_NEMICO", Keyword::DamageFoe),
    ("ORO", Keyword::Gold),
    ("XP", Keyword::Xp),
    ("OGGETTO", Keyword::Item),
    ("SLOT", Keyword::SpellSlot),
    ("NEMICO", Keyword::SpawnFoe),
    ("STATO_NEMICO", Keyword::FoeStatus),
    ("SCONFITTO", Keyword::FoeDefeated),
    ("LUOGO", Keyword::Scene),
    ("LOOT", Keyword::Loot),
    ("DIARIO", Keyword::Journal),
    ("DAMAGE", Keyword::DamagePlayer),
    ("HEAL", Keyword::HealPlayer),
    ("FOE_DAMAGE", Keyword::DamageFoe),
    ("GOLD", Keyword::Gold),
    ("EXP", Keyword::Xp),
    ("ITEM", Keyword::Item),
    ("SPELL_SLOT", Keyword::SpellSlot),
    ("FOE", Keyword::SpawnFoe),
    ("FOE_STATUS", Keyword::FoeStatus),
    ("DEFEATED", Keyword::FoeDefeated),
    ("SCENE", Keyword::Scene),
    ("JOURNAL", Keyword::Journal),
];

impl Keyword {
    pub fn lookup(name: &str) -> Option<Keyword> {
        let name = name.trim();
        KEYWORDS
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, kw)| *kw)
    }

    /// The tag the narrator is instructed to emit.
    pub fn canonical(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| kw == self)
            .map(|(k, _)| *k)
            .unwrap_or("?")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("{keyword}: missing argument #{position}")]
    MissingArgument { keyword: &'static str, position: usize },
    #[error("{keyword}: '{value}' is not a valid number")]
    BadNumber { keyword: &'static str, value: String },
    #[error("{keyword}: {value} is out of range")]
    OutOfRange { keyword: &'static str, value: i64 },
}

/// One narrator reply split into its directives. The raw text is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub raw: String,
    pub directives: Vec<Directive>,
    pub skipped: Vec<SkippedDirective>,
    /// Bracket tokens whose keyword is not in the vocabulary.
    pub unknown: Vec<String>,
}

impl ParsedReply {
    /// Display copy with every `[[...]]` token removed.
    pub fn cleaned(&self) -> String {
        clean_narration(&self.raw)
    }
}

pub fn parse_reply(text: &str) -> ParsedReply {
    let mut reply = ParsedReply {
        raw: text.to_string(),
        ..ParsedReply::default()
    };

    for caps in TOKEN.captures_iter(text) {
        let token = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let (name, payload) = match body.split_once(':') {
            Some((name, payload)) => (name, Some(payload)),
            None => (body, None),
        };

        let Some(keyword) = Keyword::lookup(name) else {
            debug!(token, "ignoring unknown directive");
            reply.unknown.push(token.to_string());
            continue;
        };

        match decode(keyword, payload) {
            Ok(directive) => reply.directives.push(directive),
            Err(e) => {
                warn!(token, error = %e, "skipping malformed directive");
                reply.skipped.push(SkippedDirective {
                    token: token.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    reply
}

pub fn clean_narration(text: &str) -> String {
    TOKEN_RUN.replace_all(text, "").into_owned()
}

fn decode(keyword: Keyword, payload: Option<&str>) -> Result<Directive, DirectiveError> {
    let tag = keyword.canonical();
    let args: Vec<&str> = payload
        .map(|p| p.split('|').map(str::trim).collect())
        .unwrap_or_default();

    let directive = match keyword {
        Keyword::DamagePlayer => Directive::DamagePlayer {
            amount: unsigned(tag, &args, 0)?,
        },
        Keyword::HealPlayer => Directive::HealPlayer {
            amount: unsigned(tag, &args, 0)?,
        },
        Keyword::DamageFoe => Directive::DamageFoe {
            amount: unsigned(tag, &args, 0)?,
        },
        Keyword::Gold => Directive::GoldDelta {
            delta: signed(tag, &args, 0)?,
        },
        Keyword::Xp => Directive::XpGain {
            amount: unsigned(tag, &args, 0)?,
        },
        Keyword::SpellSlot => {
            let level = unsigned(tag, &args, 0)?;
            if !(1..=9).contains(&level) {
                return Err(DirectiveError::OutOfRange {
                    keyword: tag,
                    value: level as i64,
                });
            }
            Directive::SpendSpellSlot { level: level as u8 }
        }
        Keyword::SpawnFoe => {
            let name = text(tag, &args, 0)?;
            let hp = unsigned(tag, &args, 1)?;
            // Armor class falls back to 10 when the generator leaves it out.
            let armor_class = match args.get(2) {
                Some(ac) if !ac.is_empty() => unsigned(tag, &args, 2)?,
                _ => 10,
            };
            if hp == 0 {
                return Err(DirectiveError::OutOfRange { keyword: tag, value: 0 });
            }
            Directive::SpawnFoe {
                name,
                hp: stat(tag, hp)?,
                armor_class: stat(tag, armor_class)?,
            }
        }
        Keyword::FoeDefeated => Directive::FoeDefeated,
        // Free-text payloads keep any '|' they contain.
        Keyword::Item => Directive::ItemPickup {
            label: whole_text(tag, payload)?,
        },
        Keyword::FoeStatus => Directive::FoeStatus {
            label: whole_text(tag, payload)?,
        },
        Keyword::Scene => Directive::SceneDescription {
            text: whole_text(tag, payload)?,
        },
        Keyword::Loot => Directive::LootRoll {
            rarity_or_item: whole_text(tag, payload)?,
        },
        Keyword::Journal => Directive::JournalAppend {
            text: whole_text(tag, payload)?,
        },
    };

    Ok(directive)
}

fn arg<'a>(tag: &'static str, args: &[&'a str], position: usize) -> Result<&'a str, DirectiveError> {
    match args.get(position) {
        Some(a) if !a.is_empty() => Ok(*a),
        _ => Err(DirectiveError::MissingArgument {
            keyword: tag,
            position: position + 1,
        }),
    }
}

fn unsigned(tag: &'static str, args: &[&str], position: usize) -> Result<u32, DirectiveError> {
    let raw = arg(tag, args, position)?;
    raw.parse().map_err(|_| DirectiveError::BadNumber {
        keyword: tag,
        value: raw.to_string(),
    })
}

fn signed(tag: &'static str, args: &[&str], position: usize) -> Result<i64, DirectiveError> {
    let raw = arg(tag, args, position)?;
    raw.parse().map_err(|_| DirectiveError::BadNumber {
        keyword: tag,
        value: raw.to_string(),
    })
}

fn stat(tag: &'static str, value: u32) -> Result<i32, DirectiveError> {
    i32::try_from(value).map_err(|_| DirectiveError::OutOfRange {
        keyword: tag,
        value: value.into(),
    })
}

fn text(tag: &'static str, args: &[&str], position: usize) -> Result<String, DirectiveError> {
    arg(tag, args, position).map(str::to_string)
}

fn whole_text(tag: &'static str, payload: Option<&str>) -> Result<String, DirectiveError> {
    match payload.map(str::trim) {
        Some(p) if !p.is_empty() => Ok(p.to_string()),
        _ => Err(DirectiveError::MissingArgument {
            keyword: tag,
            position: 1,
        }),
    }
}
