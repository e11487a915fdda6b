//! Comparators behind the sort bar. All sorts are stable; ties keep their prior order.

use std::cmp::Ordering;

use shared::{domain::RoutePoint, protocol::SortKey};

pub fn compare(key: SortKey, a: &RoutePoint, b: &RoutePoint) -> Ordering {
    match key {
        SortKey::Day => a.date_from.cmp(&b.date_from),
        SortKey::Time => a.duration().cmp(&b.duration()),
        SortKey::Price => b.base_price.cmp(&a.base_price),
    }
}

pub fn sort_points(points: &mut [RoutePoint], key: SortKey) {
    points.sort_by(|a, b| compare(key, a, b));
}
