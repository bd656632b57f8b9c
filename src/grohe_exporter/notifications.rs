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

use crate::api::Notification;
use chrono::{DateTime, Utc};
use std::collections::btree_map::{self, BTreeMap};

/// Most recent notification timestamp per category for a single appliance.
///
/// Categories are iterated in ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationSummary {
    latest: BTreeMap<i32, DateTime<Utc>>,
}

impl NotificationSummary {
    pub fn get(&self, category: i32) -> Option<DateTime<Utc>> {
        self.latest.get(&category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, DateTime<Utc>)> + '_ {
        self.latest.iter().map(|(&c, &t)| (c, t))
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    fn observe(&mut self, category: i32, timestamp: DateTime<Utc>) {
        match self.latest.entry(category) {
            btree_map::Entry::Vacant(e) => {
                e.insert(timestamp);
            }
            btree_map::Entry::Occupied(mut e) => {
                if timestamp > *e.get() {
                    e.insert(timestamp);
                }
            }
        }
    }
}

/// Reduce a notification history to the latest timestamp seen for each category.
///
/// Notifications without a timestamp or with one that isn't valid RFC 3339 are
/// skipped. The result doesn't depend on the order of the notifications.
pub fn reduce<'a, I>(notifications: I) -> NotificationSummary
where
    I: IntoIterator<Item = &'a Notification>,
{
    let mut summary = NotificationSummary::default();

    for n in notifications {
        let raw = match n.timestamp.as_deref() {
            Some(v) => v,
            None => {
                tracing::trace!(message = "skipping notification without timestamp", id = %n.id);
                continue;
            }
        };

        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => summary.observe(n.category, ts.with_timezone(&Utc)),
            Err(e) => {
                tracing::trace!(
                    message = "skipping notification with invalid timestamp",
                    id = %n.id,
                    timestamp = %raw,
                    error = %e,
                );
            }
        }
    }

    summary
}
