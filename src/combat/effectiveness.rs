//! Type-effectiveness table: attacker category → damage multiplier against a
//! defender category. Unlisted pairs are neutral.

use serde::{Deserialize, Serialize};

pub const NEUTRAL: f64 = 1.0;
pub const STRONG: f64 = 1.5;
pub const WEAK: f64 = 0.75;
pub const COUNTER: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Viral,
    Bacterial,
    Fungal,
    Physical,
    Chemical,
    Energy,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Viral,
        Self::Bacterial,
        Self::Fungal,
        Self::Physical,
        Self::Chemical,
        Self::Energy,
    ];

    pub const fn is_pathogen_type(self) -> bool {
        matches!(self, Self::Viral | Self::Bacterial | Self::Fungal)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Viral => "viral",
            Self::Bacterial => "bacterial",
            Self::Fungal => "fungal",
            Self::Physical => "physical",
            Self::Chemical => "chemical",
            Self::Energy => "energy",
        }
    }
}

/// Damage multiplier for `attacker` hitting `defender`.
pub const fn multiplier(attacker: Category, defender: Category) -> f64 {
    use Category::*;
    match (attacker, defender) {
        // pathogen triangle
        (Viral, Bacterial) | (Bacterial, Fungal) | (Fungal, Viral) => STRONG,
        (Bacterial, Viral) | (Fungal, Bacterial) | (Viral, Fungal) => WEAK,
        // antibody attack typing against pathogens
        (Energy, Viral) | (Physical, Bacterial) | (Chemical, Fungal) => STRONG,
        (Energy, Fungal) | (Physical, Viral) | (Chemical, Bacterial) => WEAK,
        // pathogens countering antibody typing
        (Viral, Physical) | (Bacterial, Chemical) | (Fungal, Energy) => COUNTER,
        _ => NEUTRAL,
    }
}

/// Mean multiplier of one attacker category against a whole defending roster.
/// The pool model has no per-unit target, so the attacker faces the mix.
pub fn side_multiplier<I>(attacker: Category, defenders: I) -> f64
where
    I: IntoIterator<Item = Category>,
{
    let (sum, count) = defenders
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), defender| {
            (sum + multiplier(attacker, defender), count + 1)
        });
    if count == 0 {
        NEUTRAL
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total_and_positive() {
        for attacker in Category::ALL {
            for defender in Category::ALL {
                let m = multiplier(attacker, defender);
                assert!(m > 0.0, "{attacker:?} vs {defender:?} gave {m}");
            }
        }
    }

    #[test]
    fn pathogen_triangle_is_rock_paper_scissors() {
        assert_eq!(multiplier(Category::Viral, Category::Bacterial), STRONG);
        assert_eq!(multiplier(Category::Bacterial, Category::Viral), WEAK);
        assert_eq!(multiplier(Category::Fungal, Category::Viral), STRONG);
        assert_eq!(multiplier(Category::Viral, Category::Viral), NEUTRAL);
    }

    #[test]
    fn unlisted_pairs_are_neutral() {
        assert_eq!(multiplier(Category::Physical, Category::Chemical), NEUTRAL);
        assert_eq!(multiplier(Category::Viral, Category::Energy), NEUTRAL);
    }

    #[test]
    fn side_multiplier_averages_the_roster() {
        let mixed = [Category::Viral, Category::Fungal];
        let m = side_multiplier(Category::Energy, mixed);
        assert!((m - (STRONG + WEAK) / 2.0).abs() < 1e-12);
        assert_eq!(side_multiplier(Category::Energy, Vec::<Category>::new()), NEUTRAL);
    }
}
