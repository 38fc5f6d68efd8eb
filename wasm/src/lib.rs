//! WebAssembly module for the Farm Operations client
//!
//! Provides client-side computation for:
//! - Maintenance schedules and expected harvest dates
//! - Growth profile lookup
//! - Offline inventory and soil checks

use chrono::NaiveDate;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

use shared::{
    expected_harvest_date as harvest_date_for, generate, inventory_alert, soil_alerts,
    GrowthProfileRegistry, SoilHealth, SoilThresholds,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("farm-ops wasm loaded"));
}

fn to_js(err: String) -> JsValue {
    JsValue::from_str(&err)
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {}", value, e))
}

fn profile_for(crop_name: &str) -> Result<CropGrowthProfile, String> {
    GrowthProfileRegistry::builtin()
        .lookup(crop_name)
        .cloned()
        .ok_or_else(|| format!("Unknown crop '{}'", crop_name))
}

fn decimal(value: f64) -> Result<Decimal, String> {
    Decimal::try_from(value).map_err(|e| format!("Invalid number {}: {}", value, e))
}

fn schedule_json(crop_name: &str, planting_date: &str) -> Result<String, String> {
    let profile = profile_for(crop_name)?;
    let schedule = generate(parse_date(planting_date)?, &profile);
    serde_json::to_string(&schedule).map_err(|e| e.to_string())
}

fn harvest_date(crop_name: &str, planting_date: &str) -> Result<String, String> {
    let profile = profile_for(crop_name)?;
    Ok(harvest_date_for(parse_date(planting_date)?, &profile).to_string())
}

fn inventory_status(item_json: &str, default_threshold: f64) -> Result<Option<String>, String> {
    let item: InventoryItem =
        serde_json::from_str(item_json).map_err(|e| format!("Invalid item JSON: {}", e))?;
    let alert = inventory_alert(&item, decimal(default_threshold)?);
    Ok(alert.map(|kind| kind.type_tag().to_string()))
}

fn soil_status(ph: f64, moisture_percent: f64) -> Result<Vec<String>, String> {
    let mut farm = Farm::new("local");
    farm.soil_health = Some(SoilHealth {
        ph: decimal(ph)?,
        moisture_percent: decimal(moisture_percent)?,
        recorded_at: None,
    });
    Ok(soil_alerts(&farm, &SoilThresholds::default())
        .iter()
        .map(|kind| kind.type_tag().to_string())
        .collect())
}

/// Maintenance schedule of a crop as a JSON array
#[wasm_bindgen]
pub fn generate_schedule(crop_name: &str, planting_date: &str) -> Result<String, JsValue> {
    schedule_json(crop_name, planting_date).map_err(to_js)
}

/// Expected harvest date as YYYY-MM-DD
#[wasm_bindgen]
pub fn expected_harvest_date(crop_name: &str, planting_date: &str) -> Result<String, JsValue> {
    harvest_date(crop_name, planting_date).map_err(to_js)
}

fn profile_names() -> Vec<String> {
    GrowthProfileRegistry::builtin()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Names of the built-in growth profiles
#[wasm_bindgen]
pub fn list_profiles() -> js_sys::Array {
    profile_names()
        .into_iter()
        .map(|name| JsValue::from_str(&name))
        .collect()
}

/// Full growth profile as JSON
#[wasm_bindgen]
pub fn get_profile(crop_name: &str) -> Result<String, JsValue> {
    profile_for(crop_name)
        .and_then(|p| serde_json::to_string(&p).map_err(|e| e.to_string()))
        .map_err(to_js)
}

/// Alert type an inventory item would raise ("out_of_stock", "low_inventory"), if any
#[wasm_bindgen]
pub fn check_inventory_item(item_json: &str, default_threshold: f64) -> Result<Option<String>, JsValue> {
    inventory_status(item_json, default_threshold).map_err(to_js)
}

/// Alert types a soil reading would raise
#[wasm_bindgen]
pub fn check_soil(ph: f64, moisture_percent: f64) -> Result<Vec<String>, JsValue> {
    soil_status(ph, moisture_percent).map_err(to_js)
}
