//! Situational-signal collaborators
//!
//! Weather and market-price clients feed the prompt with current conditions.
//! Both may fail or return nothing; the orchestrator treats either as "no
//! signal" and carries on.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

use crate::errors::Result;

/// Point-in-time weather reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub timestamp: DateTime<Utc>,
    pub temp_c: f64,
    pub rain_mm: f64,
    pub wind_kph: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

/// One market price record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub market: String,
    pub price: f64,
    pub unit: String,
    pub ts: DateTime<Utc>,
}

/// Current-and-forecast weather source
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Snapshot for a location descriptor (e.g. `{"region": "maharashtra"}`)
    async fn current_and_forecast(&self, location: &JsonValue) -> Result<JsonValue>;
}

/// Latest mandi price source
#[async_trait]
pub trait MarketPriceProvider: Send + Sync {
    /// Most recent quotes for a crop in a region; empty when none are known
    async fn latest_prices(&self, crop: &str, region: &str) -> Result<Vec<PriceQuote>>;
}

/// Mock-first weather client with a representative payload
#[derive(Debug, Default)]
pub struct StaticWeatherClient;

impl StaticWeatherClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WeatherProvider for StaticWeatherClient {
    async fn current_and_forecast(&self, location: &JsonValue) -> Result<JsonValue> {
        let now = Utc::now();
        let current = WeatherSnapshot {
            timestamp: now,
            temp_c: 30.2,
            rain_mm: 0.0,
            wind_kph: 9.0,
            alert: None,
        };
        let forecast = vec![
            WeatherSnapshot {
                timestamp: now + Duration::hours(6),
                temp_c: 29.0,
                rain_mm: 2.0,
                wind_kph: 8.0,
                alert: None,
            },
            WeatherSnapshot {
                timestamp: now + Duration::hours(12),
                temp_c: 27.5,
                rain_mm: 10.0,
                wind_kph: 12.0,
                alert: Some("rain".to_string()),
            },
        ];
        Ok(json!({
            "location": location,
            "current": current,
            "forecast": forecast,
        }))
    }
}

/// Mock-first mandi client over a fixed (crop, region) price table
#[derive(Debug, Default)]
pub struct StaticMandiClient {
    prices: HashMap<(String, String), Vec<PriceQuote>>,
}

impl StaticMandiClient {
    /// Client with one representative quote
    pub fn new() -> Self {
        let mut prices = HashMap::new();
        prices.insert(
            ("tomato".to_string(), "mumbai".to_string()),
            vec![PriceQuote {
                market: "Vashi APMC".to_string(),
                price: 1800.0,
                unit: "INR/quintal".to_string(),
                ts: Utc::now(),
            }],
        );
        Self { prices }
    }

    /// Add or replace quotes for a (crop, region) pair
    pub fn set_prices(&mut self, crop: &str, region: &str, quotes: Vec<PriceQuote>) {
        self.prices
            .insert((crop.to_lowercase(), region.to_lowercase()), quotes);
    }
}

#[async_trait]
impl MarketPriceProvider for StaticMandiClient {
    async fn latest_prices(&self, crop: &str, region: &str) -> Result<Vec<PriceQuote>> {
        let key = (crop.to_lowercase(), region.to_lowercase());
        Ok(self.prices.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_weather_payload_shape() {
        let client = StaticWeatherClient::new();
        let snapshot = client
            .current_and_forecast(&json!({"region": "maharashtra"}))
            .await
            .unwrap();
        assert_eq!(snapshot["location"]["region"], "maharashtra");
        assert!(snapshot["current"]["temp_c"].is_number());
        assert_eq!(snapshot["forecast"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["forecast"][1]["alert"], "rain");
    }

    #[tokio::test]
    async fn test_mandi_lookup_is_case_insensitive() {
        let client = StaticMandiClient::new();
        let quotes = client.latest_prices("Tomato", "MUMBAI").await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].market, "Vashi APMC");
    }

    #[tokio::test]
    async fn test_unknown_pair_is_empty_not_error() {
        let client = StaticMandiClient::new();
        let quotes = client.latest_prices("onion", "nashik").await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_set_prices_overrides() {
        let mut client = StaticMandiClient::new();
        client.set_prices(
            "wheat",
            "ludhiana",
            vec![PriceQuote {
                market: "Ludhiana Mandi".to_string(),
                price: 2200.0,
                unit: "INR/quintal".to_string(),
                ts: Utc::now(),
            }],
        );
        let quotes = client.latest_prices("wheat", "Ludhiana").await.unwrap();
        assert_eq!(quotes[0].price, 2200.0);
    }
}
