use serde::{Deserialize, Serialize};

/// Hourly national consumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    pub date: String,
    /// Upstream keys this field as either `hour` or `time` depending on the
    /// endpoint version; both land here.
    #[serde(alias = "time", default)]
    pub hour: String,
    #[serde(default)]
    pub consumption: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_time_as_alias_for_hour() {
        let json = r#"{"date": "2024-10-12T00:00:00+03:00", "time": "05:00", "consumption": 31450.2}"#;
        let record: ConsumptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.hour, "05:00");
        assert_eq!(record.consumption, 31450.2);
    }

    #[test]
    fn accepts_hour_directly() {
        let json = r#"{"date": "2024-10-12T00:00:00+03:00", "hour": "05:00", "consumption": 31450.2}"#;
        let record: ConsumptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.hour, "05:00");
    }
}
