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

use crate::api::{
    appliances_path, data_path, notifications_path, rooms_path, Appliance, Fetch, Humidity, Location, Measurement,
    Notification, Reading, Room, TemperatureCelsius, LOCATIONS_PATH,
};
use crate::notifications;
use tracing::{Instrument, Level};

/// Names identifying a single appliance, from the location down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplianceLabels {
    pub location: String,
    pub room: String,
    pub appliance: String,
    pub appliance_id: String,
}

impl ApplianceLabels {
    fn new(location: &Location, room: &Room, appliance: &Appliance) -> Self {
        ApplianceLabels {
            location: location.name.clone(),
            room: room.name.clone(),
            appliance: appliance.name.clone(),
            appliance_id: appliance.id.clone(),
        }
    }
}

/// Single data point emitted while walking the API during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Up(bool),
    Temperature(ApplianceLabels, TemperatureCelsius),
    Humidity(ApplianceLabels, Humidity),
    LastNotification(ApplianceLabels, i32, i64),
}

/// Destination for observations emitted during a scrape.
pub trait ObservationSink {
    fn observe(&mut self, observation: Observation);
}

impl ObservationSink for Vec<Observation> {
    fn observe(&mut self, observation: Observation) {
        self.push(observation);
    }
}

/// Walks locations, rooms, and appliances emitting readings and the latest
/// notification per category for each appliance.
///
/// The only failure that ends a scrape early is being unable to list locations.
/// Failures anywhere below that skip the affected location, room, or appliance
/// observation and move on to the next one. No state is kept between scrapes.
#[derive(Debug)]
pub struct HierarchyCollector<F> {
    api: F,
}

impl<F> HierarchyCollector<F>
where
    F: Fetch + Sync,
{
    pub fn new(api: F) -> Self {
        Self { api }
    }

    /// Run a single scrape, emitting observations to `sink` as they're made.
    pub async fn scrape<S>(&self, sink: &mut S)
    where
        S: ObservationSink + Send,
    {
        self.walk(sink).instrument(tracing::span!(Level::DEBUG, "grohe_scrape")).await
    }

    async fn walk<S>(&self, sink: &mut S)
    where
        S: ObservationSink + Send,
    {
        let locations = match self.api.fetch::<Location>(LOCATIONS_PATH).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(message = "unable to fetch locations", kind = e.kind().as_label(), error = %e);
                sink.observe(Observation::Up(false));
                return;
            }
        };

        tracing::debug!(message = "fetched locations", num_locations = locations.len());
        sink.observe(Observation::Up(true));

        for location in locations.iter() {
            self.visit_location(location, sink).await;
        }
    }

    async fn visit_location<S>(&self, location: &Location, sink: &mut S)
    where
        S: ObservationSink + Send,
    {
        let rooms = match self.api.fetch::<Room>(&rooms_path(location.id)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    message = "unable to fetch rooms",
                    location = %location.name,
                    kind = e.kind().as_label(),
                    error = %e,
                );
                return;
            }
        };

        for room in rooms.iter() {
            self.visit_room(location, room, sink).await;
        }
    }

    async fn visit_room<S>(&self, location: &Location, room: &Room, sink: &mut S)
    where
        S: ObservationSink + Send,
    {
        let appliances = match self.api.fetch::<Appliance>(&appliances_path(location.id, room.id)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    message = "unable to fetch appliances",
                    location = %location.name,
                    room = %room.name,
                    kind = e.kind().as_label(),
                    error = %e,
                );
                return;
            }
        };

        for appliance in appliances.iter() {
            self.visit_appliance(location, room, appliance, sink).await;
        }
    }

    async fn visit_appliance<S>(&self, location: &Location, room: &Room, appliance: &Appliance, sink: &mut S)
    where
        S: ObservationSink + Send,
    {
        let series_path = data_path(location.id, room.id, &appliance.id);
        let history_path = notifications_path(location.id, room.id, &appliance.id);

        // Both requests are made regardless of the other failing and emitted only once
        // both are done so the order of observations doesn't depend on timing.
        let (series, history) = futures_util::join!(
            self.api.fetch::<Measurement>(&series_path),
            self.api.fetch::<Notification>(&history_path),
        );

        let labels = ApplianceLabels::new(location, room, appliance);

        match series {
            Ok(series) => match Reading::from_series(&series) {
                Some(reading) => {
                    sink.observe(Observation::Temperature(labels.clone(), reading.temperature));
                    sink.observe(Observation::Humidity(labels.clone(), reading.humidity));
                }
                None => {
                    tracing::warn!(
                        message = "no measurements for appliance",
                        location = %labels.location,
                        room = %labels.room,
                        appliance = %labels.appliance_id,
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    message = "unable to fetch appliance data",
                    location = %labels.location,
                    room = %labels.room,
                    appliance = %labels.appliance_id,
                    kind = e.kind().as_label(),
                    error = %e,
                );
            }
        }

        match history {
            Ok(history) => {
                let summary = notifications::reduce(history.iter());
                tracing::debug!(
                    message = "reduced appliance notifications",
                    appliance = %labels.appliance_id,
                    num_notifications = history.len(),
                    num_categories = summary.len(),
                );

                for (category, timestamp) in summary.iter() {
                    sink.observe(Observation::LastNotification(
                        labels.clone(),
                        category,
                        timestamp.timestamp(),
                    ));
                }
            }
            Err(e) => {
                tracing::warn!(
                    message = "unable to fetch appliance notifications",
                    location = %labels.location,
                    room = %labels.room,
                    appliance = %labels.appliance_id,
                    kind = e.kind().as_label(),
                    error = %e,
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ApplianceLabels, HierarchyCollector, Observation};
    use crate::api::test::MockApi;
    use crate::api::{
        appliances_path, data_path, notifications_path, rooms_path, Humidity, TemperatureCelsius, LOCATIONS_PATH,
    };

    fn labels(location: &str, room: &str, appliance: &str, appliance_id: &str) -> ApplianceLabels {
        ApplianceLabels {
            location: location.to_owned(),
            room: room.to_owned(),
            appliance: appliance.to_owned(),
            appliance_id: appliance_id.to_owned(),
        }
    }

    async fn scrape(api: MockApi) -> (Vec<Observation>, MockApi) {
        let collector = HierarchyCollector::new(api);
        let mut observations = Vec::new();
        collector.scrape(&mut observations).await;
        (observations, collector.api)
    }

    fn home_bathroom_sense() -> MockApi {
        MockApi::new()
            .body(LOCATIONS_PATH, r#"[{"id": 1, "name": "Home"}]"#)
            .body(rooms_path(1), r#"[{"id": 2, "name": "Bathroom"}]"#)
            .body(
                appliances_path(1, 2),
                r#"[{"appliance_id": "abc123", "name": "Sense", "type": 101}]"#,
            )
    }

    #[tokio::test]
    async fn test_scrape_locations_failure() {
        let api = MockApi::new().status(LOCATIONS_PATH, 500);
        let (observations, api) = scrape(api).await;

        assert_eq!(vec![Observation::Up(false)], observations);
        assert_eq!(vec![LOCATIONS_PATH.to_owned()], api.requests());
    }

    #[tokio::test]
    async fn test_scrape_locations_decode_failure() {
        let api = MockApi::new().body(LOCATIONS_PATH, r#"{"error": "nope"}"#);
        let (observations, _) = scrape(api).await;

        assert_eq!(vec![Observation::Up(false)], observations);
    }

    #[tokio::test]
    async fn test_scrape_no_locations() {
        let api = MockApi::new().body(LOCATIONS_PATH, "[]");
        let (observations, _) = scrape(api).await;

        assert_eq!(vec![Observation::Up(true)], observations);
    }

    #[tokio::test]
    async fn test_scrape_end_to_end() {
        let api = home_bathroom_sense()
            .body(
                data_path(1, 2, "abc123"),
                r#"[{"temperature": 20.1, "humidity": 45.0}, {"temperature": 99.9, "humidity": 99.9}]"#,
            )
            .body(
                notifications_path(1, 2, "abc123"),
                r#"[
                    {"id": "n1", "category": 1, "type": 10, "timestamp": "2023-01-01T10:00:00Z"},
                    {"id": "n2", "category": 1, "type": 10, "timestamp": "2023-01-02T10:00:00Z"}
                ]"#,
            );

        let (observations, _) = scrape(api).await;
        let sense = labels("Home", "Bathroom", "Sense", "abc123");

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::Temperature(sense.clone(), TemperatureCelsius::from(20.1)),
                Observation::Humidity(sense.clone(), Humidity::from(45.0)),
                Observation::LastNotification(sense, 1, 1672653600),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_notification_categories_ascending() {
        let api = home_bathroom_sense().body(
            notifications_path(1, 2, "abc123"),
            r#"[
                {"id": "n1", "category": 30, "type": 1, "timestamp": "2023-01-01T00:00:00Z"},
                {"id": "n2", "category": 10, "type": 1, "timestamp": "2023-01-01T00:00:10Z"},
                {"id": "n3", "category": 20, "type": 1, "timestamp": "not a time"}
            ]"#,
        );

        let (observations, _) = scrape(api).await;
        let sense = labels("Home", "Bathroom", "Sense", "abc123");

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::LastNotification(sense.clone(), 10, 1672531210),
                Observation::LastNotification(sense, 30, 1672531200),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_rooms_failure_isolated_to_location() {
        let api = MockApi::new()
            .body(LOCATIONS_PATH, r#"[{"id": 1, "name": "Home"}, {"id": 5, "name": "Cabin"}]"#)
            .transport_error(rooms_path(1))
            .body(rooms_path(5), r#"[{"id": 6, "name": "Kitchen"}]"#)
            .body(
                appliances_path(5, 6),
                r#"[{"appliance_id": "def456", "name": "Sink", "type": 101}]"#,
            )
            .body(
                data_path(5, 6, "def456"),
                r#"[{"temperature": 18.5, "humidity": 60.0}]"#,
            )
            .body(notifications_path(5, 6, "def456"), "[]");

        let (observations, _) = scrape(api).await;
        let sink = labels("Cabin", "Kitchen", "Sink", "def456");

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::Temperature(sink.clone(), TemperatureCelsius::from(18.5)),
                Observation::Humidity(sink, Humidity::from(60.0)),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_appliances_failure_isolated_to_room() {
        let api = MockApi::new()
            .body(LOCATIONS_PATH, r#"[{"id": 1, "name": "Home"}]"#)
            .body(rooms_path(1), r#"[{"id": 2, "name": "Bathroom"}, {"id": 3, "name": "Basement"}]"#)
            .status(appliances_path(1, 2), 503)
            .body(
                appliances_path(1, 3),
                r#"[{"appliance_id": "ghi789", "name": "Guard", "type": 103}]"#,
            )
            .body(
                notifications_path(1, 3, "ghi789"),
                r#"[{"id": "n1", "category": 2, "type": 5, "timestamp": "2023-01-01T00:00:00Z"}]"#,
            );

        let (observations, api) = scrape(api).await;

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::LastNotification(labels("Home", "Basement", "Guard", "ghi789"), 2, 1672531200),
            ],
            observations
        );

        // Nothing is requested below the room that couldn't be listed
        assert!(api
            .requests()
            .iter()
            .all(|p| !p.starts_with(&format!("{}/", appliances_path(1, 2)))));
    }

    #[tokio::test]
    async fn test_scrape_data_failure_still_fetches_notifications() {
        let api = home_bathroom_sense().status(data_path(1, 2, "abc123"), 500).body(
            notifications_path(1, 2, "abc123"),
            r#"[{"id": "n1", "category": 1, "type": 10, "timestamp": "2023-01-02T10:00:00Z"}]"#,
        );

        let (observations, _) = scrape(api).await;

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::LastNotification(labels("Home", "Bathroom", "Sense", "abc123"), 1, 1672653600),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_notifications_failure_still_emits_reading() {
        let api = home_bathroom_sense()
            .body(
                data_path(1, 2, "abc123"),
                r#"[{"temperature": 21.0, "humidity": 50.5}]"#,
            )
            .body(notifications_path(1, 2, "abc123"), "this is not json");

        let (observations, _) = scrape(api).await;
        let sense = labels("Home", "Bathroom", "Sense", "abc123");

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::Temperature(sense.clone(), TemperatureCelsius::from(21.0)),
                Observation::Humidity(sense, Humidity::from(50.5)),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_empty_measurements_skips_reading() {
        let api = home_bathroom_sense()
            .body(data_path(1, 2, "abc123"), "[]")
            .body(notifications_path(1, 2, "abc123"), "[]");

        let (observations, _) = scrape(api).await;

        assert_eq!(vec![Observation::Up(true)], observations);
    }

    #[tokio::test]
    async fn test_scrape_appliance_failure_does_not_skip_siblings() {
        let api = MockApi::new()
            .body(LOCATIONS_PATH, r#"[{"id": 1, "name": "Home"}]"#)
            .body(rooms_path(1), r#"[{"id": 2, "name": "Bathroom"}]"#)
            .body(
                appliances_path(1, 2),
                r#"[
                    {"appliance_id": "a1", "name": "First", "type": 101},
                    {"appliance_id": "a2", "name": "Second", "type": 101}
                ]"#,
            )
            .transport_error(data_path(1, 2, "a1"))
            .transport_error(notifications_path(1, 2, "a1"))
            .body(data_path(1, 2, "a2"), r#"[{"temperature": 19.0, "humidity": 40.0}]"#)
            .body(notifications_path(1, 2, "a2"), "[]");

        let (observations, _) = scrape(api).await;
        let second = labels("Home", "Bathroom", "Second", "a2");

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::Temperature(second.clone(), TemperatureCelsius::from(19.0)),
                Observation::Humidity(second, Humidity::from(40.0)),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_null_timestamp_only_skips_that_notification() {
        let api = home_bathroom_sense().body(
            notifications_path(1, 2, "abc123"),
            r#"[
                {"id": "n1", "category": 1, "type": 10, "timestamp": "2023-01-02T10:00:00Z"},
                {"id": "n2", "category": 2, "type": 10, "timestamp": null},
                {"id": "n3", "category": 3, "type": 10}
            ]"#,
        );

        let (observations, _) = scrape(api).await;

        assert_eq!(
            vec![
                Observation::Up(true),
                Observation::LastNotification(labels("Home", "Bathroom", "Sense", "abc123"), 1, 1672653600),
            ],
            observations
        );
    }

    #[tokio::test]
    async fn test_scrape_no_state_between_scrapes() {
        let api = home_bathroom_sense().body(
            notifications_path(1, 2, "abc123"),
            r#"[{"id": "n1", "category": 1, "type": 10, "timestamp": "2023-01-02T10:00:00Z"}]"#,
        );

        let collector = HierarchyCollector::new(api);
        let mut first = Vec::new();
        let mut second = Vec::new();

        collector.scrape(&mut first).await;
        collector.scrape(&mut second).await;

        assert_eq!(first, second);
        assert_eq!(2, second.len());
    }
}
