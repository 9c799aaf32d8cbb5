//! One-shot "pick on map" interaction.
//!
//! The picker registers at most one click listener with the map at a time.
//! Starting a new pick always tears down the previous listener first, so a
//! single click can never be captured twice.

use crate::model::LatLng;

/// Prompt shown while idle.
pub const PICK_PROMPT: &str = "Pick on map";
/// Prompt shown while waiting for the click.
pub const AWAITING_PROMPT: &str = "Click on map...";

/// Token returned by a [`ClickSource`] for one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Map capability: one-shot click listeners yielding a coordinate.
pub trait ClickSource {
    fn register_click_listener(&mut self) -> ListenerId;

    fn unregister_click_listener(&mut self, listener: ListenerId);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PickerState {
    #[default]
    Idle,
    AwaitingMapClick { listener: ListenerId },
}

#[derive(Debug, Default)]
pub struct LocationPicker {
    state: PickerState,
}

impl LocationPicker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> PickerState {
        self.state
    }

    #[must_use]
    pub const fn is_awaiting(&self) -> bool {
        matches!(self.state, PickerState::AwaitingMapClick { .. })
    }

    #[must_use]
    pub const fn prompt(&self) -> &'static str {
        match self.state {
            PickerState::Idle => PICK_PROMPT,
            PickerState::AwaitingMapClick { .. } => AWAITING_PROMPT,
        }
    }

    /// Enter `AwaitingMapClick`, replacing any listener from an earlier pick.
    pub fn begin<M: ClickSource + ?Sized>(&mut self, map: &mut M) -> ListenerId {
        if let PickerState::AwaitingMapClick { listener } = self.state {
            map.unregister_click_listener(listener);
            tracing::debug!(listener = listener.0, "stale pick listener removed");
        }
        let listener = map.register_click_listener();
        self.state = PickerState::AwaitingMapClick { listener };
        listener
    }

    /// Deliver a click. Returns the coordinate when it belongs to the active
    /// listener; clicks for any other listener are ignored.
    pub fn on_map_click<M: ClickSource + ?Sized>(
        &mut self,
        map: &mut M,
        listener: ListenerId,
        coord: LatLng,
    ) -> Option<LatLng> {
        match self.state {
            PickerState::AwaitingMapClick { listener: active } if active == listener => {
                map.unregister_click_listener(active);
                self.state = PickerState::Idle;
                Some(coord)
            }
            _ => {
                tracing::debug!(listener = listener.0, "click for inactive listener ignored");
                None
            }
        }
    }

    /// Leave `AwaitingMapClick` without capturing. No-op when idle.
    pub fn cancel<M: ClickSource + ?Sized>(&mut self, map: &mut M) {
        if let PickerState::AwaitingMapClick { listener } = self.state {
            map.unregister_click_listener(listener);
            self.state = PickerState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Clicks {
        next: u64,
        live: BTreeSet<ListenerId>,
    }

    impl ClickSource for Clicks {
        fn register_click_listener(&mut self) -> ListenerId {
            self.next += 1;
            let id = ListenerId(self.next);
            self.live.insert(id);
            id
        }

        fn unregister_click_listener(&mut self, listener: ListenerId) {
            self.live.remove(&listener);
        }
    }

    fn here() -> LatLng {
        LatLng::new(19.1, 72.9).unwrap()
    }

    #[test]
    fn begin_twice_keeps_one_listener() {
        let mut map = Clicks::default();
        let mut picker = LocationPicker::new();
        let first = picker.begin(&mut map);
        let second = picker.begin(&mut map);

        assert_eq!(map.live.len(), 1);
        assert!(map.live.contains(&second));
        assert_eq!(picker.on_map_click(&mut map, first, here()), None);
        assert!(picker.is_awaiting());
    }

    #[test]
    fn click_captures_and_restores_prompt() {
        let mut map = Clicks::default();
        let mut picker = LocationPicker::new();
        let listener = picker.begin(&mut map);
        assert_eq!(picker.prompt(), AWAITING_PROMPT);

        assert_eq!(picker.on_map_click(&mut map, listener, here()), Some(here()));
        assert_eq!(picker.prompt(), PICK_PROMPT);
        assert!(map.live.is_empty());
        assert_eq!(picker.on_map_click(&mut map, listener, here()), None);
    }

    #[test]
    fn cancel_unregisters_without_capture() {
        let mut map = Clicks::default();
        let mut picker = LocationPicker::new();
        let listener = picker.begin(&mut map);
        picker.cancel(&mut map);

        assert!(map.live.is_empty());
        assert_eq!(picker.state(), PickerState::Idle);
        assert_eq!(picker.on_map_click(&mut map, listener, here()), None);
        picker.cancel(&mut map);
    }
}
