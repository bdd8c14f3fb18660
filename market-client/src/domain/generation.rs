use serde::{Deserialize, Serialize};

/// One hour of national generation, broken down by fuel source.
///
/// `total` arrives from upstream as its own field and is stored as-is; it is
/// never recomputed from the per-source columns and the two may diverge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub date: String,
    pub hour: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub natural_gas: f64,
    #[serde(default)]
    pub dammed_hydro: f64,
    #[serde(default)]
    pub lignite: f64,
    #[serde(default)]
    pub river: f64,
    #[serde(default)]
    pub import_coal: f64,
    #[serde(default)]
    pub wind: f64,
    #[serde(default)]
    pub sun: f64,
    #[serde(default)]
    pub fuel_oil: f64,
    #[serde(default)]
    pub geothermal: f64,
    #[serde(default)]
    pub asphaltite_coal: f64,
    #[serde(default)]
    pub black_coal: f64,
    #[serde(default)]
    pub biomass: f64,
    #[serde(default)]
    pub naphta: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    pub import_export: f64,
    #[serde(default)]
    pub waste_heat: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_upstream_camel_case_payload() {
        let json = r#"{
            "date": "2024-10-12",
            "hour": "14:00",
            "total": 41250.5,
            "naturalGas": 8000.0,
            "dammedHydro": 5000.0,
            "importCoal": 7000.0,
            "wind": 4200.0,
            "sun": 3100.0,
            "wasteHeat": 120.0
        }"#;

        let record: GenerationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.hour, "14:00");
        assert_eq!(record.natural_gas, 8000.0);
        assert_eq!(record.dammed_hydro, 5000.0);
        assert_eq!(record.waste_heat, 120.0);
        // Fields absent from the payload default rather than fail.
        assert_eq!(record.lignite, 0.0);
        assert_eq!(record.import_export, 0.0);
    }
}
