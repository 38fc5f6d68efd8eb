//! Growth profile registry
//!
//! Static lookup from crop variety name to its growth parameters. Unknown
//! names are not an error: they mean no maintenance schedule can be derived.

use rust_decimal::Decimal;

use crate::models::{CropCategory, CropGrowthProfile, SoilType, TemperatureRange};

/// Immutable set of known crop growth profiles
#[derive(Debug, Clone)]
pub struct GrowthProfileRegistry {
    profiles: Vec<CropGrowthProfile>,
}

impl GrowthProfileRegistry {
    pub fn new(profiles: Vec<CropGrowthProfile>) -> Self {
        Self { profiles }
    }

    /// Registry holding the bundled reference profiles
    pub fn builtin() -> Self {
        Self::new(builtin_profiles())
    }

    /// Find a profile by name: exact match first, then case-insensitive
    pub fn lookup(&self, name: &str) -> Option<&CropGrowthProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .or_else(|| {
                let wanted = name.to_lowercase();
                self.profiles
                    .iter()
                    .find(|p| p.name.to_lowercase() == wanted)
            })
    }

    pub fn profiles(&self) -> &[CropGrowthProfile] {
        &self.profiles
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }
}

impl Default for GrowthProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[allow(clippy::too_many_arguments)]
fn profile(
    name: &str,
    category: CropCategory,
    growth_days: i32,
    watering: i32,
    weeding: i32,
    fertilizer: &[i32],
    pest_control: i32,
    pesticides: &[&str],
    yield_kg_per_acre: i64,
    temp: (i32, i32),
    soils: &[SoilType],
) -> CropGrowthProfile {
    CropGrowthProfile {
        name: name.to_string(),
        category,
        growth_days,
        watering_frequency_days: watering,
        weeding_frequency_days: weeding,
        fertilizer_schedule_days: fertilizer.to_vec(),
        pest_control_frequency_days: pest_control,
        pesticides: pesticides.iter().map(|p| p.to_string()).collect(),
        yield_per_area: Decimal::from(yield_kg_per_acre),
        optimal_temp_range: TemperatureRange::new(temp.0, temp.1),
        compatible_soil_types: soils.to_vec(),
    }
}

fn builtin_profiles() -> Vec<CropGrowthProfile> {
    use SoilType::*;

    vec![
        profile(
            "Maize",
            CropCategory::Cereal,
            90,
            7,
            21,
            &[21, 42, 63],
            14,
            &["Duduthrin", "Belt"],
            2000,
            (18, 32),
            &[Loam, SandyLoam, ClayLoam],
        ),
        profile(
            "Beans",
            CropCategory::Legume,
            75,
            5,
            14,
            &[14, 35],
            10,
            &["Thunder", "Ridomil Gold"],
            800,
            (16, 28),
            &[Loam, SandyLoam],
        ),
        profile(
            "Tomatoes",
            CropCategory::Vegetable,
            100,
            3,
            14,
            &[14, 35, 56, 77],
            7,
            &["Ridomil Gold", "Coragen", "Mancozeb"],
            12000,
            (20, 30),
            &[Loam, SandyLoam],
        ),
        profile(
            "Cabbage",
            CropCategory::Vegetable,
            90,
            4,
            21,
            &[21, 42],
            10,
            &["Dimethoate", "Bacillus thuringiensis"],
            15000,
            (15, 24),
            &[Loam, ClayLoam],
        ),
        profile(
            "Kale",
            CropCategory::Vegetable,
            60,
            3,
            14,
            &[14, 35],
            10,
            &["Dimethoate"],
            6000,
            (15, 25),
            &[Loam, SandyLoam, ClayLoam],
        ),
        profile(
            "Potatoes",
            CropCategory::Tuber,
            110,
            7,
            21,
            &[0, 30, 60],
            14,
            &["Ridomil Gold", "Mancozeb"],
            8000,
            (15, 22),
            &[SandyLoam, Loam],
        ),
        profile(
            "Onions",
            CropCategory::Bulb,
            120,
            5,
            14,
            &[20, 50, 80],
            14,
            &["Mancozeb", "Karate"],
            10000,
            (13, 24),
            &[SandyLoam, Loam, Silt],
        ),
        profile(
            "Sorghum",
            CropCategory::Cereal,
            100,
            10,
            21,
            &[21, 45],
            21,
            &["Duduthrin"],
            1500,
            (25, 35),
            &[Loam, ClayLoam, Clay, Sandy],
        ),
        profile(
            "Wheat",
            CropCategory::Cereal,
            120,
            10,
            28,
            &[0, 28, 56],
            21,
            &["Folicur", "Karate"],
            1800,
            (12, 25),
            &[Loam, ClayLoam],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact() {
        let registry = GrowthProfileRegistry::builtin();
        let maize = registry.lookup("Maize").unwrap();
        assert_eq!(maize.growth_days, 90);
        assert_eq!(maize.fertilizer_schedule_days, vec![21, 42, 63]);
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let registry = GrowthProfileRegistry::builtin();
        assert_eq!(registry.lookup("maize").unwrap().name, "Maize");
        assert_eq!(registry.lookup("TOMATOES").unwrap().name, "Tomatoes");
    }

    #[test]
    fn test_lookup_prefers_exact_match() {
        let mut lower = builtin_profiles().remove(0);
        lower.name = "maize".to_string();
        lower.growth_days = 120;
        let mut profiles = builtin_profiles();
        profiles.push(lower);
        let registry = GrowthProfileRegistry::new(profiles);

        assert_eq!(registry.lookup("maize").unwrap().growth_days, 120);
        assert_eq!(registry.lookup("Maize").unwrap().growth_days, 90);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let registry = GrowthProfileRegistry::builtin();
        assert!(registry.lookup("Dragonfruit").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_builtin_profiles_are_well_formed() {
        let registry = GrowthProfileRegistry::builtin();
        for p in registry.profiles() {
            assert!(p.growth_days > 0, "{} has no growth period", p.name);
            assert!(p.optimal_temp_range.min_celsius < p.optimal_temp_range.max_celsius);
            assert!(p
                .fertilizer_schedule_days
                .iter()
                .all(|d| *d >= 0 && *d < p.growth_days));
        }
    }
}
