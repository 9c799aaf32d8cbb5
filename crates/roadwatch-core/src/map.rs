//! In-memory map widget.
//!
//! [`HeadlessMap`] implements every map capability the controller needs and
//! simply records what a real widget would draw. The CLI renders from it and
//! tests assert against it.

use std::collections::{BTreeMap, BTreeSet};

use crate::controller::MapView;
use crate::model::{IssueId, LatLng};
use crate::picker::{ClickSource, ListenerId};
use crate::reconcile::{MarkerLayer, MarkerSpec};

/// Handle of a marker drawn on a [`HeadlessMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Operation counters, for asserting on minimal updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapCounters {
    pub placed: usize,
    pub removed: usize,
    pub listeners_registered: usize,
    pub listeners_unregistered: usize,
}

#[derive(Debug, Clone)]
pub struct HeadlessMap {
    center: LatLng,
    zoom: u8,
    next_handle: u64,
    next_listener: u64,
    markers: BTreeMap<MarkerHandle, MarkerSpec>,
    listeners: BTreeSet<ListenerId>,
    counters: MapCounters,
}

impl HeadlessMap {
    #[must_use]
    pub const fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            center,
            zoom,
            next_handle: 0,
            next_listener: 0,
            markers: BTreeMap::new(),
            listeners: BTreeSet::new(),
            counters: MapCounters {
                placed: 0,
                removed: 0,
                listeners_registered: 0,
                listeners_unregistered: 0,
            },
        }
    }

    pub const fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.center = center;
        self.zoom = zoom;
    }

    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Markers currently drawn, in placement order.
    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn marker_for(&self, id: &IssueId) -> Option<&MarkerSpec> {
        self.markers.values().find(|spec| &spec.id == id)
    }

    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub const fn counters(&self) -> MapCounters {
        self.counters
    }
}

impl MarkerLayer for HeadlessMap {
    type Handle = MarkerHandle;

    fn place(&mut self, spec: MarkerSpec) -> MarkerHandle {
        self.next_handle += 1;
        let handle = MarkerHandle(self.next_handle);
        self.markers.insert(handle, spec);
        self.counters.placed += 1;
        handle
    }

    fn remove(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle).is_some() {
            self.counters.removed += 1;
        }
    }
}

impl ClickSource for HeadlessMap {
    fn register_click_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(id);
        self.counters.listeners_registered += 1;
        id
    }

    fn unregister_click_listener(&mut self, listener: ListenerId) {
        if self.listeners.remove(&listener) {
            self.counters.listeners_unregistered += 1;
        }
    }
}

impl MapView for HeadlessMap {
    fn center(&self) -> LatLng {
        self.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueDraft, IssueRecord, IssueStatus};
    use crate::reconcile::ViewMode;
    use chrono::{TimeZone, Utc};

    #[test]
    fn place_and_remove_track_counters() {
        let mut map = HeadlessMap::new(LatLng::new(0.0, 0.0).unwrap(), 3);
        let record = IssueRecord::from_draft(
            IssueDraft::new("Other", LatLng::new(1.0, 1.0).unwrap()),
            IssueId::new_unchecked("r_1_aaaaaa"),
            Utc.timestamp_millis_opt(1).unwrap(),
        )
        .unwrap();

        let handle = map.place(MarkerSpec::for_record(&record, ViewMode::Citizen));
        assert_eq!(map.marker_count(), 1);
        assert_eq!(
            map.marker_for(&record.id).map(|m| m.popup.status),
            Some(IssueStatus::Received)
        );

        map.remove(handle);
        map.remove(handle);
        assert_eq!(map.marker_count(), 0);
        assert_eq!(map.counters().removed, 1);
    }
}
