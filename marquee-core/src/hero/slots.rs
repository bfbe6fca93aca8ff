use marquee_model::{HeroSlot, SlotCounts};

use crate::policy::SlotQuotas;

fn quota_fraction(quotas: &SlotQuotas, slot: HeroSlot) -> f64 {
    let raw = match slot {
        HeroSlot::New => quotas.new,
        HeroSlot::TopRated => quotas.top_rated,
        HeroSlot::OldButGold => quotas.old_but_gold,
        HeroSlot::Random => quotas.random,
    };
    if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 }
}

/// Split `pool_size` across the four slots.
///
/// Budgeted slots take `round(pool_size * quota)` in fill order, each
/// clamped to what is left; the random slot absorbs the remainder, so the
/// plan always sums to `pool_size`.
pub fn plan_slots(pool_size: usize, quotas: &SlotQuotas) -> SlotCounts {
    let mut plan = SlotCounts::default();
    let mut remaining = pool_size;

    for slot in HeroSlot::BUDGETED {
        let wanted =
            (pool_size as f64 * quota_fraction(quotas, slot)).round() as usize;
        let granted = wanted.min(remaining);
        *plan.get_mut(slot) = granted;
        remaining -= granted;
    }

    plan.random = remaining;
    plan
}
