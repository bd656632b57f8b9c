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

mod client;
mod core;

pub use crate::api::client::{http_client, login, ApiClient, DEFAULT_API_URL};
pub use crate::api::core::{
    appliances_path, data_path, decode_list, notifications_path, rooms_path, Appliance, ClientError, ClientErrorKind,
    Credential, Fetch, Humidity, Location, Measurement, Notification, Reading, ResourceList, Room, TemperatureCelsius,
    LOCATIONS_PATH, LOGIN_PATH,
};
