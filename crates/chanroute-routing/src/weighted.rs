//! Cumulative-weight roulette pickers
//!
//! There are two variants and they are deliberately kept apart:
//!
//! - Cache path, over `Channel::weight`: an all-zero tier becomes uniform by
//!   giving every channel a flat bonus of 100; a tier whose average weight is
//!   below 10 has every weight scaled by 100 before the draw.
//! - Store path, over `Ability::weight`: every ability gets a flat bonus of
//!   10, unconditionally.
//!
//! The two do not yield the same distribution for the same nominal weights.

use chanroute_core::{Ability, Channel, ChannelId};
use std::sync::Arc;

use crate::error::SelectionError;
use crate::random::RandomSource;

/// Per-channel bonus when every weight in the tier is zero
pub const ZERO_WEIGHT_BONUS: u64 = 100;

/// Weight multiplier for low-average tiers
pub const SMOOTHING_FACTOR: u64 = 100;

/// Average weight below which smoothing applies
pub const SMOOTHING_THRESHOLD: u64 = 10;

/// Flat bonus added to every ability weight on the store path
pub const ABILITY_WEIGHT_BONUS: u64 = 10;

/// Effective draw parameters for a cache-path tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawPlan {
    factor: u64,
    bonus: u64,
    total: u64,
}

fn plan_cached_draw(len: u64, sum_weight: u64) -> DrawPlan {
    if sum_weight == 0 {
        DrawPlan {
            factor: 1,
            bonus: ZERO_WEIGHT_BONUS,
            total: len * ZERO_WEIGHT_BONUS,
        }
    } else if sum_weight / len < SMOOTHING_THRESHOLD {
        DrawPlan {
            factor: SMOOTHING_FACTOR,
            bonus: 0,
            total: sum_weight * SMOOTHING_FACTOR,
        }
    } else {
        DrawPlan {
            factor: 1,
            bonus: 0,
            total: sum_weight,
        }
    }
}

/// Pick a channel from a cache-path tier
///
/// `sum_weight` is the sum of `weight` over `tier`. The first channel whose
/// cumulative effective weight exceeds the draw wins.
///
/// # Errors
/// - `SelectionError::DrawExhausted` if the tier is empty or the walk ends
///   without a pick
pub fn pick_channel_weighted(
    tier: &[Arc<Channel>],
    sum_weight: u64,
    random: &dyn RandomSource,
) -> Result<Arc<Channel>, SelectionError> {
    if tier.is_empty() {
        return Err(SelectionError::DrawExhausted);
    }

    let plan = plan_cached_draw(tier.len() as u64, sum_weight);
    if plan.total == 0 {
        return Err(SelectionError::DrawExhausted);
    }

    let draw = random.next_below(plan.total);
    let mut cumulative = 0u64;
    for channel in tier {
        cumulative =
            cumulative.saturating_add(u64::from(channel.weight) * plan.factor + plan.bonus);
        if draw < cumulative {
            return Ok(Arc::clone(channel));
        }
    }

    Err(SelectionError::DrawExhausted)
}

/// Pick a channel id from store-path abilities, heaviest first
///
/// Each ability counts as `weight + 10`. Ties at a boundary go to the earlier
/// ability: a draw equal to the cumulative weight still selects it.
///
/// # Errors
/// - `SelectionError::DrawExhausted` if there is nothing to draw from
pub fn pick_ability_weighted(
    abilities: &[Ability],
    random: &dyn RandomSource,
) -> Result<ChannelId, SelectionError> {
    let total: u64 = abilities
        .iter()
        .map(|a| u64::from(a.weight) + ABILITY_WEIGHT_BONUS)
        .sum();
    if total == 0 {
        return Err(SelectionError::DrawExhausted);
    }

    let draw = random.next_below(total);
    let mut cumulative = 0u64;
    for ability in abilities {
        cumulative += u64::from(ability.weight) + ABILITY_WEIGHT_BONUS;
        if draw <= cumulative {
            return Ok(ability.channel_id);
        }
    }

    Err(SelectionError::DrawExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceRandom;
    use crate::test_support::{ability, openai_channel};
    use std::collections::HashMap;

    fn tier(weights: &[u32]) -> (Vec<Arc<Channel>>, u64) {
        let channels: Vec<Arc<Channel>> = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| Arc::new(openai_channel(i as i64 + 1, 0, w)))
            .collect();
        let sum = weights.iter().map(|&w| u64::from(w)).sum();
        (channels, sum)
    }

    /// Run the cache picker once for every possible draw
    fn cached_counts(weights: &[u32]) -> HashMap<ChannelId, u64> {
        let (channels, sum) = tier(weights);
        let total = plan_cached_draw(channels.len() as u64, sum).total;
        let mut counts = HashMap::new();
        for draw in 0..total {
            let random = SequenceRandom::fixed(draw);
            let picked = pick_channel_weighted(&channels, sum, &random).unwrap();
            *counts.entry(picked.id).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_plan_cached_draw() {
        assert_eq!(
            plan_cached_draw(3, 0),
            DrawPlan {
                factor: 1,
                bonus: 100,
                total: 300
            }
        );
        assert_eq!(
            plan_cached_draw(3, 5),
            DrawPlan {
                factor: 100,
                bonus: 0,
                total: 500
            }
        );
        assert_eq!(
            plan_cached_draw(2, 100),
            DrawPlan {
                factor: 1,
                bonus: 0,
                total: 100
            }
        );
        // 29 / 3 == 9 under integer division
        assert_eq!(plan_cached_draw(3, 29).factor, 100);
        assert_eq!(plan_cached_draw(3, 30).factor, 1);
    }

    #[test]
    fn test_cached_draw_is_proportional() {
        let counts = cached_counts(&[50, 30, 20]);
        assert_eq!(counts[&1], 50);
        assert_eq!(counts[&2], 30);
        assert_eq!(counts[&3], 20);
    }

    #[test]
    fn test_cached_all_zero_is_uniform() {
        let counts = cached_counts(&[0, 0, 0, 0]);
        for id in 1..=4 {
            assert_eq!(counts[&id], 100);
        }
    }

    #[test]
    fn test_cached_smoothing_keeps_proportions() {
        let counts = cached_counts(&[1, 2, 3]);
        assert_eq!(counts[&1], 100);
        assert_eq!(counts[&2], 200);
        assert_eq!(counts[&3], 300);
    }

    #[test]
    fn test_cached_zero_weight_in_mixed_tier() {
        // Sum 5 over three channels: smoothing applies, no zero-weight bonus
        let counts = cached_counts(&[0, 0, 5]);
        assert_eq!(counts.get(&1), None);
        assert_eq!(counts.get(&2), None);
        assert_eq!(counts[&3], 500);
    }

    #[test]
    fn test_cached_walk_boundaries() {
        let (channels, sum) = tier(&[60, 40]);
        let pick = |draw| {
            pick_channel_weighted(&channels, sum, &SequenceRandom::fixed(draw))
                .unwrap()
                .id
        };
        assert_eq!(pick(0), 1);
        assert_eq!(pick(59), 1);
        assert_eq!(pick(60), 2);
        assert_eq!(pick(99), 2);
    }

    #[test]
    fn test_cached_empty_tier() {
        let err = pick_channel_weighted(&[], 0, &SequenceRandom::fixed(0)).unwrap_err();
        assert!(matches!(err, SelectionError::DrawExhausted));
    }

    #[test]
    fn test_cached_understated_sum_exhausts() {
        // A sum larger than the tier's weights can leave the walk without a pick
        let (channels, _) = tier(&[10, 10]);
        let err = pick_channel_weighted(&channels, 40, &SequenceRandom::fixed(30)).unwrap_err();
        assert!(matches!(err, SelectionError::DrawExhausted));
    }

    #[test]
    fn test_ability_draw_counts() {
        let abilities = vec![ability(1, 0, 50), ability(2, 0, 0)];
        let mut counts: HashMap<ChannelId, u64> = HashMap::new();
        for draw in 0..70 {
            let id = pick_ability_weighted(&abilities, &SequenceRandom::fixed(draw)).unwrap();
            *counts.entry(id).or_insert(0) += 1;
        }
        // The first ability also takes the boundary draw at 60
        assert_eq!(counts[&1], 61);
        assert_eq!(counts[&2], 9);
    }

    #[test]
    fn test_ability_all_zero_weights_still_draw() {
        let abilities = vec![ability(1, 0, 0), ability(2, 0, 0)];
        assert_eq!(
            pick_ability_weighted(&abilities, &SequenceRandom::fixed(10)).unwrap(),
            1
        );
        assert_eq!(
            pick_ability_weighted(&abilities, &SequenceRandom::fixed(11)).unwrap(),
            2
        );
    }

    #[test]
    fn test_ability_empty_list() {
        let err = pick_ability_weighted(&[], &SequenceRandom::fixed(0)).unwrap_err();
        assert!(matches!(err, SelectionError::DrawExhausted));
    }
}
