//! Keep a map's marker layer in 1:1 correspondence with the issue collection.
//!
//! The reconciler owns only the derived `IssueId -> handle` mapping; the
//! records themselves always come from the store. Two entry points:
//!
//! - [`MarkerReconciler::apply_full_snapshot`] tears everything down and
//!   rebuilds from a list (initial load, view-mode switch).
//! - [`MarkerReconciler::apply_change_event`] applies one incremental delta
//!   from a store subscription.

pub mod popup;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{IssueId, IssueRecord, IssueStatus, LatLng};
use crate::store::{ChangeEvent, ChangeKind};

pub use popup::{PopupAction, PopupContent, StatusControl, escape_html, popup_content};

/// Session-local UI mode. Not an access-control boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Citizen,
    Authority,
}

impl ViewMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Citizen => Self::Authority,
            Self::Authority => Self::Citizen,
        }
    }

    /// Label of the control that switches away from this mode.
    #[must_use]
    pub const fn toggle_label(self) -> &'static str {
        match self {
            Self::Citizen => "Switch to Authority View",
            Self::Authority => "Switch to Citizen View",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Citizen => "citizen",
            Self::Authority => "authority",
        })
    }
}

/// Marker fill, a pure function of status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Green,
    Amber,
    Red,
}

impl MarkerColor {
    #[must_use]
    pub const fn for_status(status: IssueStatus) -> Self {
        match status {
            IssueStatus::Resolved => Self::Green,
            IssueStatus::InProgress => Self::Amber,
            IssueStatus::Received => Self::Red,
        }
    }

    #[must_use]
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Green => "#10b981",
            Self::Amber => "#f59e0b",
            Self::Red => "#c30000",
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hex())
    }
}

/// Circle marker geometry and paint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub radius: u32,
    pub stroke: &'static str,
    pub weight: u32,
    pub fill: MarkerColor,
    pub fill_opacity: f64,
}

impl MarkerStyle {
    #[must_use]
    pub const fn for_status(status: IssueStatus) -> Self {
        Self {
            radius: 8,
            stroke: "#fff",
            weight: 1,
            fill: MarkerColor::for_status(status),
            fill_opacity: 0.95,
        }
    }
}

/// Everything a map widget needs to draw one marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub id: IssueId,
    pub position: LatLng,
    pub style: MarkerStyle,
    pub popup: PopupContent,
}

impl MarkerSpec {
    #[must_use]
    pub fn for_record(record: &IssueRecord, mode: ViewMode) -> Self {
        Self {
            id: record.id.clone(),
            position: record.location,
            style: MarkerStyle::for_status(record.status),
            popup: popup_content(record, mode),
        }
    }
}

/// Externally-owned marker layer (the map widget).
pub trait MarkerLayer {
    type Handle;

    fn place(&mut self, spec: MarkerSpec) -> Self::Handle;

    fn remove(&mut self, handle: Self::Handle);
}

/// Counters for reconciliation work, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Full snapshots applied.
    pub snapshots: usize,
    /// Markers placed.
    pub placed: usize,
    /// Markers removed from the layer.
    pub removed: usize,
    /// `Removed` events for ids that were not tracked.
    pub untracked_removals: usize,
}

#[derive(Debug)]
pub struct MarkerReconciler<H> {
    markers: BTreeMap<IssueId, H>,
    stats: ReconcileStats,
}

impl<H> Default for MarkerReconciler<H> {
    fn default() -> Self {
        Self {
            markers: BTreeMap::new(),
            stats: ReconcileStats::default(),
        }
    }
}

impl<H> MarkerReconciler<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &IssueId) -> bool {
        self.markers.contains_key(id)
    }

    pub fn tracked_ids(&self) -> impl Iterator<Item = &IssueId> {
        self.markers.keys()
    }

    #[must_use]
    pub fn handle(&self, id: &IssueId) -> Option<&H> {
        self.markers.get(id)
    }

    #[must_use]
    pub const fn stats(&self) -> ReconcileStats {
        self.stats
    }

    fn remove_tracked<L>(&mut self, layer: &mut L, id: &IssueId) -> bool
    where
        L: MarkerLayer<Handle = H> + ?Sized,
    {
        match self.markers.remove(id) {
            Some(handle) => {
                layer.remove(handle);
                self.stats.removed += 1;
                true
            }
            None => false,
        }
    }

    fn place<L>(&mut self, layer: &mut L, record: &IssueRecord, mode: ViewMode)
    where
        L: MarkerLayer<Handle = H> + ?Sized,
    {
        let handle = layer.place(MarkerSpec::for_record(record, mode));
        self.markers.insert(record.id.clone(), handle);
        self.stats.placed += 1;
    }

    /// Remove every tracked marker, then place one per record.
    pub fn apply_full_snapshot<L>(&mut self, layer: &mut L, records: &[IssueRecord], mode: ViewMode)
    where
        L: MarkerLayer<Handle = H> + ?Sized,
    {
        let cleared = self.markers.len();
        for (_, handle) in std::mem::take(&mut self.markers) {
            layer.remove(handle);
        }
        self.stats.removed += cleared;

        for record in records {
            // A duplicate id in the input must not leak a marker.
            self.remove_tracked(layer, &record.id);
            self.place(layer, record, mode);
        }
        self.stats.snapshots += 1;
        tracing::debug!(cleared, placed = records.len(), %mode, "full marker snapshot applied");
    }

    /// Apply one delta. `Added`/`Modified` replace any existing marker for
    /// the id; `Removed` on an untracked id is a no-op.
    pub fn apply_change_event<L>(&mut self, layer: &mut L, event: &ChangeEvent, mode: ViewMode)
    where
        L: MarkerLayer<Handle = H> + ?Sized,
    {
        match (event.kind, &event.record) {
            (ChangeKind::Added | ChangeKind::Modified, Some(record)) => {
                let replaced = self.remove_tracked(layer, &event.id);
                self.place(layer, record, mode);
                tracing::debug!(kind = %event.kind, id = %event.id, replaced, "marker placed");
            }
            (ChangeKind::Added | ChangeKind::Modified, None) => {
                tracing::warn!(kind = %event.kind, id = %event.id, "change event without record ignored");
            }
            (ChangeKind::Removed, _) => {
                if self.remove_tracked(layer, &event.id) {
                    tracing::debug!(id = %event.id, "marker removed");
                } else {
                    self.stats.untracked_removals += 1;
                }
            }
        }
    }

    /// Remove every marker from the layer and forget the mapping.
    pub fn clear<L>(&mut self, layer: &mut L)
    where
        L: MarkerLayer<Handle = H> + ?Sized,
    {
        self.stats.removed += self.markers.len();
        for (_, handle) in std::mem::take(&mut self.markers) {
            layer.remove(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueDraft;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Layer {
        next: u32,
        live: BTreeMap<u32, MarkerSpec>,
    }

    impl MarkerLayer for Layer {
        type Handle = u32;

        fn place(&mut self, spec: MarkerSpec) -> u32 {
            self.next += 1;
            self.live.insert(self.next, spec);
            self.next
        }

        fn remove(&mut self, handle: u32) {
            assert!(self.live.remove(&handle).is_some(), "double remove of {handle}");
        }
    }

    fn record(id: &str, status: IssueStatus) -> IssueRecord {
        let mut rec = IssueRecord::from_draft(
            IssueDraft::new("Pothole", LatLng::new(19.05, 72.86).unwrap()),
            IssueId::new_unchecked(id),
            Utc.timestamp_millis_opt(1).unwrap(),
        )
        .unwrap();
        rec.status = status;
        rec
    }

    fn ids(reconciler: &MarkerReconciler<u32>) -> BTreeSet<String> {
        reconciler.tracked_ids().map(ToString::to_string).collect()
    }

    #[test]
    fn colors_follow_status() {
        assert_eq!(MarkerColor::for_status(IssueStatus::Resolved).hex(), "#10b981");
        assert_eq!(MarkerColor::for_status(IssueStatus::InProgress).hex(), "#f59e0b");
        assert_eq!(MarkerColor::for_status(IssueStatus::Received).hex(), "#c30000");
    }

    #[test]
    fn snapshot_replaces_layer_contents() {
        let mut layer = Layer::default();
        let mut rec = MarkerReconciler::new();
        rec.apply_full_snapshot(
            &mut layer,
            &[record("a", IssueStatus::Received), record("b", IssueStatus::Resolved)],
            ViewMode::Citizen,
        );
        assert_eq!(layer.live.len(), 2);

        rec.apply_full_snapshot(&mut layer, &[record("c", IssueStatus::Received)], ViewMode::Citizen);
        assert_eq!(layer.live.len(), 1);
        assert_eq!(ids(&rec), BTreeSet::from(["c".to_string()]));
        assert_eq!(rec.stats().snapshots, 2);
    }

    #[test]
    fn modified_replaces_marker_with_new_color() {
        let mut layer = Layer::default();
        let mut rec = MarkerReconciler::new();
        rec.apply_change_event(
            &mut layer,
            &ChangeEvent::added(record("a", IssueStatus::Received)),
            ViewMode::Citizen,
        );
        rec.apply_change_event(
            &mut layer,
            &ChangeEvent::modified(record("a", IssueStatus::Resolved)),
            ViewMode::Citizen,
        );

        assert_eq!(layer.live.len(), 1);
        let spec = layer.live.values().next().unwrap();
        assert_eq!(spec.style.fill, MarkerColor::Green);
    }

    #[test]
    fn modified_before_added_still_places() {
        let mut layer = Layer::default();
        let mut rec = MarkerReconciler::new();
        rec.apply_change_event(
            &mut layer,
            &ChangeEvent::modified(record("late", IssueStatus::InProgress)),
            ViewMode::Authority,
        );
        assert!(rec.contains(&IssueId::new_unchecked("late")));
        assert_eq!(layer.live.len(), 1);
    }

    #[test]
    fn removing_untracked_id_is_a_noop() {
        let mut layer = Layer::default();
        let mut rec: MarkerReconciler<u32> = MarkerReconciler::new();
        rec.apply_change_event(
            &mut layer,
            &ChangeEvent::removed(IssueId::new_unchecked("ghost")),
            ViewMode::Citizen,
        );
        assert!(rec.is_empty());
        assert_eq!(rec.stats().untracked_removals, 1);
    }

    #[test]
    fn duplicate_ids_in_snapshot_do_not_leak() {
        let mut layer = Layer::default();
        let mut rec = MarkerReconciler::new();
        let a = record("a", IssueStatus::Received);
        rec.apply_full_snapshot(&mut layer, &[a.clone(), a], ViewMode::Citizen);
        assert_eq!(layer.live.len(), 1);
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn popup_follows_view_mode() {
        let mut layer = Layer::default();
        let mut rec = MarkerReconciler::new();
        let records = [record("a", IssueStatus::Received)];
        rec.apply_full_snapshot(&mut layer, &records, ViewMode::Authority);
        assert!(layer.live.values().all(|s| s.popup.status_control.is_some()));

        rec.apply_full_snapshot(&mut layer, &records, ViewMode::Citizen);
        assert!(layer.live.values().all(|s| s.popup.status_control.is_none()));
    }

    #[test]
    fn toggle_labels_name_the_other_mode() {
        assert_eq!(ViewMode::Citizen.toggle_label(), "Switch to Authority View");
        assert_eq!(ViewMode::Citizen.toggled(), ViewMode::Authority);
        assert_eq!(ViewMode::Authority.toggled().toggle_label(), "Switch to Authority View");
    }
}
