//! Crop growth profile models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Static growth parameters for one crop variety
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropGrowthProfile {
    pub name: String,
    pub category: CropCategory,
    /// Days from planting to harvest
    pub growth_days: i32,
    pub watering_frequency_days: i32,
    pub weeding_frequency_days: i32,
    /// Explicit day offsets after planting on which fertilizer is applied
    pub fertilizer_schedule_days: Vec<i32>,
    pub pest_control_frequency_days: i32,
    pub pesticides: Vec<String>,
    /// Expected yield in kg per acre
    pub yield_per_area: Decimal,
    pub optimal_temp_range: TemperatureRange,
    pub compatible_soil_types: Vec<SoilType>,
}

/// Broad crop family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CropCategory {
    Cereal,
    Legume,
    Vegetable,
    Tuber,
    Bulb,
}

impl std::fmt::Display for CropCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CropCategory::Cereal => write!(f, "Cereal"),
            CropCategory::Legume => write!(f, "Legume"),
            CropCategory::Vegetable => write!(f, "Vegetable"),
            CropCategory::Tuber => write!(f, "Tuber"),
            CropCategory::Bulb => write!(f, "Bulb"),
        }
    }
}

/// Optimal growing temperature in degrees Celsius
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemperatureRange {
    pub min_celsius: i32,
    pub max_celsius: i32,
}

impl TemperatureRange {
    pub fn new(min_celsius: i32, max_celsius: i32) -> Self {
        Self {
            min_celsius,
            max_celsius,
        }
    }

    pub fn contains(&self, celsius: i32) -> bool {
        celsius >= self.min_celsius && celsius <= self.max_celsius
    }
}

/// Soil texture classes a crop tolerates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    Loam,
    SandyLoam,
    ClayLoam,
    Clay,
    Sandy,
    Silt,
}
