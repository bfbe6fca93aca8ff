use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Named selection strategy a hero item was picked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum HeroSlot {
    /// Most recently added to the catalog
    New,
    /// Highest community rating
    TopRated,
    /// Older titles, oldest first
    OldButGold,
    /// Uniformly shuffled; absorbs any remaining budget
    Random,
}

impl HeroSlot {
    /// Fill order used by the selection engine.
    pub const ORDER: [HeroSlot; 4] = [
        HeroSlot::New,
        HeroSlot::TopRated,
        HeroSlot::OldButGold,
        HeroSlot::Random,
    ];

    /// Slots that receive an explicit quota; `Random` takes the remainder.
    pub const BUDGETED: [HeroSlot; 3] =
        [HeroSlot::New, HeroSlot::TopRated, HeroSlot::OldButGold];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeroSlot::New => "new",
            HeroSlot::TopRated => "topRated",
            HeroSlot::OldButGold => "oldButGold",
            HeroSlot::Random => "random",
        }
    }
}

impl Display for HeroSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeroSlot {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(HeroSlot::New),
            "topRated" | "top_rated" => Ok(HeroSlot::TopRated),
            "oldButGold" | "old_but_gold" => Ok(HeroSlot::OldButGold),
            "random" => Ok(HeroSlot::Random),
            other => Err(ModelError::UnknownSlot(other.to_string())),
        }
    }
}

/// Per-slot counters.
///
/// Used both for the planned allocation of a pool and for the summary of
/// what was actually selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct SlotCounts {
    pub new: usize,
    pub top_rated: usize,
    pub old_but_gold: usize,
    pub random: usize,
}

impl SlotCounts {
    pub fn get(&self, slot: HeroSlot) -> usize {
        match slot {
            HeroSlot::New => self.new,
            HeroSlot::TopRated => self.top_rated,
            HeroSlot::OldButGold => self.old_but_gold,
            HeroSlot::Random => self.random,
        }
    }

    pub fn get_mut(&mut self, slot: HeroSlot) -> &mut usize {
        match slot {
            HeroSlot::New => &mut self.new,
            HeroSlot::TopRated => &mut self.top_rated,
            HeroSlot::OldButGold => &mut self.old_but_gold,
            HeroSlot::Random => &mut self.random,
        }
    }

    pub fn increment(&mut self, slot: HeroSlot) {
        *self.get_mut(slot) += 1;
    }

    pub fn total(&self) -> usize {
        self.new + self.top_rated + self.old_but_gold + self.random
    }
}
