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

//! Export Grohe Sense temperature, humidity, and notification data as Prometheus metrics.
//!
//! ## Features
//!
//! `grohe_exporter` logs in to the Grohe cloud API once at startup and, each time it is
//! scraped by Prometheus, walks every location, room, and appliance of the account to
//! emit the latest readings and notifications. Failing to fetch part of the hierarchy
//! only results in the metrics for that part being missing from the scrape.
//!
//! The following metrics are exported:
//!
//! * `grohe_up` - 1 if the list of locations could be fetched, 0 otherwise.
//! * `grohe_temperature_degrees{location, room, appliance, appliance_id}` - Degrees celsius
//!   of the most recent measurement of an appliance.
//! * `grohe_relative_humidity{location, room, appliance, appliance_id}` - Relative humidity
//!   (from 0 to 100) of the most recent measurement of an appliance.
//! * `grohe_last_notification_timestamp{location, room, appliance, appliance_id, category}` -
//!   UNIX timestamp of the most recent notification of each category for an appliance.
//!
//! ## Build
//!
//! `grohe_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! Credentials for the Grohe account can be given as flags or via the `GROHE_USERNAME`
//! and `GROHE_PASSWORD` environment variables.
//!
//! ```text
//! GROHE_USERNAME=me@example.com GROHE_PASSWORD=secret ./grohe_exporter
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9441` at `/metrics`. Each scrape makes several
//! requests to the Grohe API (two per appliance plus one per room and location) so scrape
//! intervals should be kept fairly long.
//!
//! ```yaml
//! # Sample config for Prometheus.
//!
//! global:
//!   scrape_interval:     5m
//!   evaluation_interval: 1m
//!   external_labels:
//!       monitor: 'my_prom'
//!
//! scrape_configs:
//!   - job_name: grohe_exporter
//!     scrape_timeout: 1m
//!     static_configs:
//!       - targets: ['example:9441']
//! ```
//!

pub mod api;
pub mod collector;
pub mod http;
pub mod metrics;
pub mod notifications;
