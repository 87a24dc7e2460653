//! Dice rolling and the small pure formulas built on top of it.
//!
//! Formulas use the compact `NdF[+B|-B]` notation (`2d6+3`, `1d20`, `d8`).
//! A bare integer (`5`) is accepted as a flat value with no rolls.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

static FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<flat>-?\d+)$|^(?:(?P<count>\d*)d(?P<faces>\d+))?(?P<bonus>[+-]\d+)?$")
        .expect("dice formula pattern is valid")
});

/// Largest number of dice a single formula may roll.
const MAX_DICE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("empty dice formula")]
    Empty,
    #[error("malformed dice formula: {0}")]
    Malformed(String),
    #[error("die must have at least one face (in {0})")]
    NoFaces(String),
    #[error("too many dice in {0} (max 100)")]
    TooManyDice(String),
}

/// The result of rolling a formula: the signed total plus each individual die.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub total: i32,
    pub rolls: Vec<u32>,
}

/// Uniform integer in `[1, faces]`. A zero-faced die always rolls 1.
pub fn roll_die<R: Rng + ?Sized>(rng: &mut R, faces: u32) -> u32 {
    rng.gen_range(1..=faces.max(1))
}

pub fn roll_dice_formula<R: Rng + ?Sized>(
    rng: &mut R,
    formula: &str,
) -> Result<DiceRoll, FormulaError> {
    let compact: String = formula
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if compact.is_empty() {
        return Err(FormulaError::Empty);
    }

    let caps = FORMULA
        .captures(&compact)
        .ok_or_else(|| FormulaError::Malformed(formula.to_string()))?;

    if let Some(flat) = caps.name("flat") {
        let total = flat
            .as_str()
            .parse()
            .map_err(|_| FormulaError::Malformed(formula.to_string()))?;
        return Ok(DiceRoll { total, rolls: Vec::new() });
    }

    let Some(faces) = caps.name("faces") else {
        // Only a bonus like "+3" with no dice part.
        return Err(FormulaError::Malformed(formula.to_string()));
    };

    let faces: u32 = faces
        .as_str()
        .parse()
        .map_err(|_| FormulaError::Malformed(formula.to_string()))?;
    if faces == 0 {
        return Err(FormulaError::NoFaces(formula.to_string()));
    }

    let count: u32 = match caps.name("count").map(|m| m.as_str()) {
        None | Some("") => 1,
        Some(n) => n
            .parse()
            .map_err(|_| FormulaError::Malformed(formula.to_string()))?,
    };
    if count > MAX_DICE {
        return Err(FormulaError::TooManyDice(formula.to_string()));
    }

    let bonus: i32 = match caps.name("bonus") {
        Some(b) => b
            .as_str()
            .parse()
            .map_err(|_| FormulaError::Malformed(formula.to_string()))?,
        None => 0,
    };

    let rolls: Vec<u32> = (0..count).map(|_| roll_die(rng, faces)).collect();
    let sum: i64 = rolls.iter().map(|&r| i64::from(r)).sum();
    let total = i32::try_from(sum + i64::from(bonus))
        .map_err(|_| FormulaError::Malformed(formula.to_string()))?;

    Ok(DiceRoll { total, rolls })
}

/// Rolls a formula, falling back to a zero result with no rolls when the
/// formula is malformed. The failure is logged, never surfaced.
pub fn roll_or_zero<R: Rng + ?Sized>(rng: &mut R, formula: &str) -> DiceRoll {
    match roll_dice_formula(rng, formula) {
        Ok(roll) => roll,
        Err(e) => {
            warn!(formula, error = %e, "dice formula rejected, using zero");
            DiceRoll::default()
        }
    }
}

/// `floor((score - 10) / 2)`
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Classic 4d6, drop the lowest.
pub fn generate_ability_score<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    let mut dice: Vec<u32> = (0..4).map(|_| roll_die(rng, 6)).collect();
    dice.sort_unstable();
    dice[1..].iter().sum::<u32>() as i32
}

/// `2 + floor((level - 1) / 4)`
pub fn proficiency_bonus(level: u32) -> i32 {
    2 + (level.max(1) as i32 - 1) / 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_roll_die_in_range() {
        let mut rng = rng();
        for _ in 0..500 {
            let r = roll_die(&mut rng, 20);
            assert!((1..=20).contains(&r));
        }
    }

    #[test]
    fn test_formula_with_bonus() {
        let mut rng = rng();
        let roll = roll_dice_formula(&mut rng, "2d6+3").unwrap();
        assert_eq!(roll.rolls.len(), 2);
        assert!(roll.rolls.iter().all(|r| (1..=6).contains(r)));
        assert_eq!(roll.total, roll.rolls.iter().sum::<u32>() as i32 + 3);
    }

    #[test]
    fn test_formula_with_penalty_and_spaces() {
        let mut rng = rng();
        let roll = roll_dice_formula(&mut rng, " 1D4 - 2 ").unwrap();
        assert_eq!(roll.rolls.len(), 1);
        assert_eq!(roll.total, roll.rolls[0] as i32 - 2);
    }

    #[test]
    fn test_formula_implicit_count() {
        let mut rng = rng();
        let roll = roll_dice_formula(&mut rng, "d8").unwrap();
        assert_eq!(roll.rolls.len(), 1);
    }

    #[test]
    fn test_flat_formula() {
        let mut rng = rng();
        let roll = roll_dice_formula(&mut rng, "5").unwrap();
        assert_eq!(roll.total, 5);
        assert!(roll.rolls.is_empty());
    }

    #[test]
    fn test_malformed_formulas() {
        let mut rng = rng();
        assert_eq!(roll_dice_formula(&mut rng, ""), Err(FormulaError::Empty));
        assert!(matches!(
            roll_dice_formula(&mut rng, "fireball"),
            Err(FormulaError::Malformed(_))
        ));
        assert!(matches!(
            roll_dice_formula(&mut rng, "2d0"),
            Err(FormulaError::NoFaces(_))
        ));
        assert!(matches!(
            roll_dice_formula(&mut rng, "+3"),
            Err(FormulaError::Malformed(_))
        ));
        assert!(matches!(
            roll_dice_formula(&mut rng, "1000d6"),
            Err(FormulaError::TooManyDice(_))
        ));
    }

    #[test]
    fn test_totals_that_overflow_are_malformed() {
        let mut rng = rng();
        assert!(matches!(
            roll_dice_formula(&mut rng, "100d4294967295"),
            Err(FormulaError::Malformed(_))
        ));
        assert!(matches!(
            roll_dice_formula(&mut rng, "1d6+2147483647"),
            Err(FormulaError::Malformed(_))
        ));
        assert_eq!(roll_or_zero(&mut rng, "1d6+2147483647"), DiceRoll::default());

        let roll = roll_dice_formula(&mut rng, "1d1+2147483646").unwrap();
        assert_eq!(roll.total, i32::MAX);
    }

    #[test]
    fn test_roll_or_zero_fallback() {
        let mut rng = rng();
        assert_eq!(roll_or_zero(&mut rng, "2x6"), DiceRoll::default());
    }

    #[test]
    fn test_ability_modifier_boundaries() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(18), 4);
        assert_eq!(ability_modifier(3), -4);
        assert_eq!(ability_modifier(1), -5);
    }

    #[test]
    fn test_generate_ability_score_range() {
        let mut rng = rng();
        for _ in 0..200 {
            let s = generate_ability_score(&mut rng);
            assert!((3..=18).contains(&s));
        }
    }

    #[test]
    fn test_proficiency_bonus() {
        assert_eq!(proficiency_bonus(1), 2);
        assert_eq!(proficiency_bonus(4), 2);
        assert_eq!(proficiency_bonus(5), 3);
        assert_eq!(proficiency_bonus(9), 4);
    }
}
