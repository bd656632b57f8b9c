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

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::future::Future;

pub const LOGIN_PATH: &str = "/v2/iot/auth/users/login";
pub const LOCATIONS_PATH: &str = "/v2/iot/locations";

/// Path of the rooms belonging to a location
pub fn rooms_path(location: i64) -> String {
    format!("{}/{}/rooms", LOCATIONS_PATH, location)
}

/// Path of the appliances installed in a room of a location
pub fn appliances_path(location: i64, room: i64) -> String {
    format!("{}/{}/rooms/{}/appliances", LOCATIONS_PATH, location, room)
}

/// Path of the measurement series of an appliance
pub fn data_path(location: i64, room: i64, appliance: &str) -> String {
    format!("{}/{}/data", appliances_path(location, room), appliance)
}

/// Path of the notification history of an appliance
pub fn notifications_path(location: i64, room: i64, appliance: &str) -> String {
    format!("{}/{}/notifications", appliances_path(location, room), appliance)
}

/// Opaque token attached to every API request.
///
/// Obtained once at startup and never refreshed or modified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appliance {
    #[serde(rename = "appliance_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: i32,
}

/// Single sample from the measurement series of an appliance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Event raised by an appliance. The timestamp is kept as the raw string sent
/// by the API since it may be missing, `null`, or not valid, see `notifications::reduce`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    pub category: i32,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Collection of resources returned by a single API call.
///
/// The API returns bare JSON arrays for every resource. They're decoded through
/// this single field envelope so that every endpoint shares the same decode path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ResourceList<T> {
    items: Vec<T>,
}

impl<T> ResourceList<T> {
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<Vec<T>> for ResourceList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> IntoIterator for ResourceList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Decode the body of a successful response into a list of resources.
///
/// An empty array is a valid, empty, list. Anything that isn't an array of the
/// expected resource (including an empty body or `null`) is a decode error.
pub fn decode_list<T: DeserializeOwned>(body: &[u8]) -> Result<ResourceList<T>, ClientError> {
    serde_json::from_slice(body)
        .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to decode response body", Box::new(e)))
}

/// Temperature, in degrees celsius
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct TemperatureCelsius(f64);

impl From<TemperatureCelsius> for f64 {
    fn from(v: TemperatureCelsius) -> Self {
        v.0
    }
}

impl From<f64> for TemperatureCelsius {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// Relative humidity (from 0 to 100)
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Humidity(f64);

impl From<Humidity> for f64 {
    fn from(v: Humidity) -> Self {
        v.0
    }
}

impl From<f64> for Humidity {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// Temperature and humidity of an appliance at a single point in time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reading {
    pub temperature: TemperatureCelsius,
    pub humidity: Humidity,
}

impl Reading {
    /// Build a reading from the first (most recent) sample of a measurement series,
    /// ignoring the rest. Returns `None` if the series is empty.
    pub fn from_series(series: &ResourceList<Measurement>) -> Option<Self> {
        series.first().map(|m| Reading {
            temperature: TemperatureCelsius::from(m.temperature),
            humidity: Humidity::from(m.humidity),
        })
    }
}

/// Potential kinds of errors that can be encountered calling the API
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum ClientErrorKind {
    Initialization,
    Transport,
    Status,
    Decode,
}

impl ClientErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientErrorKind::Initialization => "initialization",
            ClientErrorKind::Transport => "transport",
            ClientErrorKind::Status => "status",
            ClientErrorKind::Decode => "decode",
        }
    }
}

/// Error making a request to the API or decoding its response
#[derive(Debug)]
pub enum ClientError {
    Status(String, u16),
    KindMsg(ClientErrorKind, &'static str),
    KindMsgCause(ClientErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            ClientError::Status(_, _) => ClientErrorKind::Status,
            ClientError::KindMsg(kind, _) => *kind,
            ClientError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Status(path, status) => write!(f, "unexpected status {} for {}", status, path),
            ClientError::KindMsg(_, msg) => msg.fmt(f),
            ClientError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Abstraction around fetching a list of resources from the API to allow for easier testing.
///
/// Implementations make a single attempt per call. Any failure (transport, unexpected
/// status, undecodable body) is returned as an error, never a panic.
pub trait Fetch {
    fn fetch<T>(&self, path: &str) -> impl Future<Output = Result<ResourceList<T>, ClientError>> + Send
    where
        T: DeserializeOwned + Send;
}
