// grohe_exporter - Grohe Sense metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::api::Fetch;
use crate::collector::{ApplianceLabels, HierarchyCollector, Observation, ObservationSink};
use prometheus::{Encoder, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use std::error::Error;
use std::fmt;

const APPLIANCE_LABELS: &[&str] = &["location", "room", "appliance", "appliance_id"];
const NOTIFICATION_LABELS: &[&str] = &["location", "room", "appliance", "appliance_id", "category"];

/// Error exposing Prometheus metrics in the text exposition format.
#[derive(Debug)]
pub enum ExpositionError {
    Registration(&'static str, Box<dyn Error + Send + Sync + 'static>),
    Encoding(&'static str, Box<dyn Error + Send + Sync + 'static>),
}

impl fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpositionError::Registration(msg, ref e) => write!(f, "{}: {}", msg, e),
            ExpositionError::Encoding(msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ExpositionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExpositionError::Registration(_, ref e) => Some(e.as_ref()),
            ExpositionError::Encoding(_, ref e) => Some(e.as_ref()),
        }
    }
}

/// Prometheus metrics for the observations made during a single scrape.
///
/// A new instance (and registry) is created for every scrape so that appliances
/// or notification categories that have disappeared from the API don't linger.
pub struct ScrapeMetrics {
    registry: Registry,
    up: IntGauge,
    temperature: GaugeVec,
    humidity: GaugeVec,
    last_notification: GaugeVec,
}

impl ScrapeMetrics {
    pub fn new() -> Result<Self, ExpositionError> {
        let registry = Registry::new();
        let up = IntGauge::new("grohe_up", "Whether the list of locations could be fetched from the API")
            .map_err(|e| ExpositionError::Registration("unable to declare up gauge", Box::new(e)))?;

        let temperature = GaugeVec::new(
            Opts::new("grohe_temperature_degrees", "Temperature in celsius"),
            APPLIANCE_LABELS,
        )
        .map_err(|e| ExpositionError::Registration("unable to declare temperature gauge", Box::new(e)))?;

        let humidity = GaugeVec::new(
            Opts::new("grohe_relative_humidity", "Relative humidity (0-100)"),
            APPLIANCE_LABELS,
        )
        .map_err(|e| ExpositionError::Registration("unable to declare humidity gauge", Box::new(e)))?;

        let last_notification = GaugeVec::new(
            Opts::new(
                "grohe_last_notification_timestamp",
                "Timestamp of the most recent notification per category",
            ),
            NOTIFICATION_LABELS,
        )
        .map_err(|e| ExpositionError::Registration("unable to declare last notification gauge", Box::new(e)))?;

        registry
            .register(Box::new(up.clone()))
            .and_then(|_| registry.register(Box::new(temperature.clone())))
            .and_then(|_| registry.register(Box::new(humidity.clone())))
            .and_then(|_| registry.register(Box::new(last_notification.clone())))
            .map_err(|e| ExpositionError::Registration("unable to register metrics", Box::new(e)))?;

        Ok(Self {
            registry,
            up,
            temperature,
            humidity,
            last_notification,
        })
    }

    /// Encode all metrics in the Prometheus text exposition format.
    pub fn encoded_text(&self) -> Result<Vec<u8>, ExpositionError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        tracing::debug!(
            message = "encoding metric families to text exposition format",
            num_metrics = metric_families.len(),
        );

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| ExpositionError::Encoding("unable to encode Prometheus metrics", Box::new(e)))
            .map(|_| buffer)
    }
}

fn label_values(labels: &ApplianceLabels) -> [&str; 4] {
    [&labels.location, &labels.room, &labels.appliance, &labels.appliance_id]
}

impl ObservationSink for ScrapeMetrics {
    fn observe(&mut self, observation: Observation) {
        match observation {
            Observation::Up(up) => self.up.set(i64::from(up)),
            Observation::Temperature(labels, temp) => {
                self.temperature.with_label_values(&label_values(&labels)).set(temp.into());
            }
            Observation::Humidity(labels, humidity) => {
                self.humidity.with_label_values(&label_values(&labels)).set(humidity.into());
            }
            Observation::LastNotification(labels, category, timestamp) => {
                let category = category.to_string();
                let [location, room, appliance, appliance_id] = label_values(&labels);

                self.last_notification
                    .with_label_values(&[location, room, appliance, appliance_id, &category])
                    .set(timestamp as f64);
            }
        }
    }
}

/// Runs a scrape of the API for each request and exposes the results in the
/// Prometheus text exposition format.
#[derive(Debug)]
pub struct MetricsExposition<F> {
    collector: HierarchyCollector<F>,
}

impl<F> MetricsExposition<F>
where
    F: Fetch + Sync,
{
    pub fn new(collector: HierarchyCollector<F>) -> Self {
        Self { collector }
    }

    /// Scrape the API and encode the results, returning an error if metrics couldn't be
    /// created or encoded. Failures calling the API are never returned here, they result
    /// in missing metrics instead.
    pub async fn encoded_text(&self) -> Result<Vec<u8>, ExpositionError> {
        let mut metrics = ScrapeMetrics::new()?;
        self.collector.scrape(&mut metrics).await;
        metrics.encoded_text()
    }
}

#[cfg(test)]
mod test {
    use super::{MetricsExposition, ScrapeMetrics};
    use crate::api::test::MockApi;
    use crate::api::{
        appliances_path, data_path, notifications_path, rooms_path, Humidity, TemperatureCelsius, LOCATIONS_PATH,
    };
    use crate::collector::{ApplianceLabels, HierarchyCollector, Observation, ObservationSink};

    fn sense() -> ApplianceLabels {
        ApplianceLabels {
            location: "Home".to_owned(),
            room: "Bathroom".to_owned(),
            appliance: "Sense".to_owned(),
            appliance_id: "abc123".to_owned(),
        }
    }

    fn encode(observations: Vec<Observation>) -> String {
        let mut metrics = ScrapeMetrics::new().unwrap();
        for o in observations {
            metrics.observe(o);
        }

        String::from_utf8(metrics.encoded_text().unwrap()).unwrap()
    }

    /// Value of the sample line starting with `series` (name and labels) if present
    fn sample(text: &str, series: &str) -> Option<f64> {
        text.lines()
            .find_map(|l| l.strip_prefix(series))
            .and_then(|v| v.trim().parse().ok())
    }

    #[test]
    fn test_scrape_metrics_down() {
        let text = encode(vec![Observation::Up(false)]);

        assert_eq!(Some(0.0), sample(&text, "grohe_up "));
        assert!(!text.contains("grohe_temperature_degrees{"));
        assert!(!text.contains("grohe_last_notification_timestamp{"));
    }

    #[test]
    fn test_scrape_metrics_labels() {
        let text = encode(vec![
            Observation::Up(true),
            Observation::Temperature(sense(), TemperatureCelsius::from(20.5)),
            Observation::Humidity(sense(), Humidity::from(45.0)),
            Observation::LastNotification(sense(), 1, 1672653600),
        ]);

        assert_eq!(Some(1.0), sample(&text, "grohe_up "));
        assert_eq!(
            Some(20.5),
            sample(
                &text,
                r#"grohe_temperature_degrees{appliance="Sense",appliance_id="abc123",location="Home",room="Bathroom"} "#
            )
        );
        assert_eq!(
            Some(45.0),
            sample(
                &text,
                r#"grohe_relative_humidity{appliance="Sense",appliance_id="abc123",location="Home",room="Bathroom"} "#
            )
        );
        assert_eq!(
            Some(1672653600.0),
            sample(
                &text,
                r#"grohe_last_notification_timestamp{appliance="Sense",appliance_id="abc123",category="1",location="Home",room="Bathroom"} "#
            )
        );
    }

    #[test]
    fn test_scrape_metrics_one_series_per_category() {
        let text = encode(vec![
            Observation::Up(true),
            Observation::LastNotification(sense(), 1, 1672531200),
            Observation::LastNotification(sense(), 2, 1672653600),
        ]);

        assert_eq!(
            2,
            text.lines()
                .filter(|l| l.starts_with("grohe_last_notification_timestamp{"))
                .count()
        );
    }

    #[tokio::test]
    async fn test_exposition_fresh_registry_per_scrape() {
        let api = MockApi::new()
            .body(LOCATIONS_PATH, r#"[{"id": 1, "name": "Home"}]"#)
            .body(rooms_path(1), r#"[{"id": 2, "name": "Bathroom"}]"#)
            .body(
                appliances_path(1, 2),
                r#"[{"appliance_id": "abc123", "name": "Sense", "type": 101}]"#,
            )
            .body(data_path(1, 2, "abc123"), r#"[{"temperature": 20.5, "humidity": 45.0}]"#)
            .body(notifications_path(1, 2, "abc123"), "[]");

        let exposition = MetricsExposition::new(HierarchyCollector::new(api));
        let first = String::from_utf8(exposition.encoded_text().await.unwrap()).unwrap();
        let second = String::from_utf8(exposition.encoded_text().await.unwrap()).unwrap();

        assert_eq!(first, second);
        assert_eq!(Some(1.0), sample(&first, "grohe_up "));
        assert!(first.contains("grohe_temperature_degrees{"));
    }

    #[tokio::test]
    async fn test_exposition_api_down() {
        let api = MockApi::new().status(LOCATIONS_PATH, 401);
        let exposition = MetricsExposition::new(HierarchyCollector::new(api));
        let text = String::from_utf8(exposition.encoded_text().await.unwrap()).unwrap();

        assert_eq!(Some(0.0), sample(&text, "grohe_up "));
        assert!(!text.contains("grohe_relative_humidity{"));
    }
}
