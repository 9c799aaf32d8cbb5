//! Glue between user actions, the issue store and the map.
//!
//! One [`IssueInteractionController`] owns everything a session mutates:
//! view mode, the report form, the location picker, the store subscription
//! and the marker mapping. Writes never touch markers directly; they come
//! back through the subscription and reach the map in [`pump_changes`].
//!
//! [`pump_changes`]: IssueInteractionController::pump_changes

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::config::ProjectConfig;
use crate::error::{EncodingError, ErrorCode, StoreError, ValidationError};
use crate::model::{IssueDraft, IssueId, IssueRecord, IssueStatus, LatLng, parse_lat_lng};
use crate::photo::{PhotoEncoder, PhotoFile};
use crate::picker::{ClickSource, ListenerId, LocationPicker};
use crate::reconcile::{
    MarkerLayer, MarkerReconciler, PopupAction, PopupContent, ViewMode, popup_content,
};
use crate::store::{ChangeEvent, ChangeKind, IssueStore, Subscription};

/// Map capability: the current view center.
pub trait MapView {
    fn center(&self) -> LatLng;
}

/// Values the report form starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefaults {
    pub issue_type: String,
    /// Reporter written on new records; `None` lets the store decide.
    pub reporter: Option<String>,
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self::from_config(&ProjectConfig::default(), None)
    }
}

impl ReportDefaults {
    #[must_use]
    pub fn from_config(config: &ProjectConfig, reporter: Option<String>) -> Self {
        Self {
            issue_type: config.report.default_type.clone(),
            reporter,
        }
    }
}

/// State of the "raise issue" modal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportForm {
    pub visible: bool,
    pub issue_type: String,
    pub description: String,
    pub location_text: String,
    pub photo: Option<PhotoFile>,
    /// Set while a submission is in flight; submit is disabled.
    pub submitting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Bad input or an unusable photo. Fix and resubmit.
    Error,
    /// The store was unreachable. Safe to retry as-is.
    Retry,
    /// The view was out of date and has been refreshed.
    Stale,
}

/// User-visible feedback produced by a failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ControllerError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SubmissionInFlight => ErrorCode::SubmissionInFlight,
            Self::Validation(err) => err.code(),
            Self::Encoding(err) => err.code(),
            Self::Store(err) => err.code(),
        }
    }

    fn notice(&self) -> Notice {
        let kind = match self {
            Self::Store(StoreError::Transient { .. }) => NoticeKind::Retry,
            Self::Store(StoreError::NotFound { .. }) => NoticeKind::Stale,
            _ => NoticeKind::Error,
        };
        Notice {
            kind,
            code: self.code(),
            message: self.to_string(),
        }
    }
}

pub struct IssueInteractionController<S, M, E>
where
    S: IssueStore,
    M: MarkerLayer + ClickSource + MapView,
    E: PhotoEncoder,
{
    store: S,
    map: M,
    encoder: E,
    reconciler: MarkerReconciler<M::Handle>,
    picker: LocationPicker,
    subscription: Option<Subscription>,
    view_mode: ViewMode,
    form: ReportForm,
    defaults: ReportDefaults,
    notices: Vec<Notice>,
    open_popup: Option<IssueId>,
}

impl<S, M, E> IssueInteractionController<S, M, E>
where
    S: IssueStore,
    M: MarkerLayer + ClickSource + MapView,
    E: PhotoEncoder,
{
    pub fn new(store: S, map: M, encoder: E, defaults: ReportDefaults) -> Self {
        Self {
            store,
            map,
            encoder,
            reconciler: MarkerReconciler::new(),
            picker: LocationPicker::new(),
            subscription: None,
            view_mode: ViewMode::Citizen,
            form: ReportForm::default(),
            defaults,
            notices: Vec::new(),
            open_popup: None,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn map(&self) -> &M {
        &self.map
    }

    pub const fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub const fn reconciler(&self) -> &MarkerReconciler<M::Handle> {
        &self.reconciler
    }

    pub const fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Label for the view-mode toggle control.
    pub const fn toggle_label(&self) -> &'static str {
        self.view_mode.toggle_label()
    }

    pub const fn form(&self) -> &ReportForm {
        &self.form
    }

    pub const fn form_mut(&mut self) -> &mut ReportForm {
        &mut self.form
    }

    pub const fn pick_prompt(&self) -> &'static str {
        self.picker.prompt()
    }

    pub const fn is_picking(&self) -> bool {
        self.picker.is_awaiting()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub const fn open_popup_id(&self) -> Option<&IssueId> {
        self.open_popup.as_ref()
    }

    fn report(&mut self, err: &ControllerError) {
        let notice = err.notice();
        tracing::warn!(code = %notice.code, kind = ?notice.kind, "{}", notice.message);
        self.notices.push(notice);
    }

    /// Subscribe to the store and draw the initial marker set.
    ///
    /// The replayed `Added` events are folded into one full snapshot.
    /// Returns the number of markers drawn.
    pub async fn start(&mut self) -> Result<usize, ControllerError> {
        let mut subscription = match self.store.subscribe().await {
            Ok(sub) => sub,
            Err(err) => {
                let err = ControllerError::from(err);
                self.report(&err);
                return Err(err);
            }
        };
        let records = fold_events(subscription.drain());
        self.subscription = Some(subscription);
        self.reconciler
            .apply_full_snapshot(&mut self.map, &records, self.view_mode);
        tracing::info!(markers = records.len(), mode = %self.view_mode, "controller started");
        Ok(records.len())
    }

    /// Rebuild every marker from `store.list()` in the current mode.
    pub async fn refresh(&mut self) -> Result<usize, ControllerError> {
        match self.store.list().await {
            Ok(records) => {
                self.reconciler
                    .apply_full_snapshot(&mut self.map, &records, self.view_mode);
                Ok(records.len())
            }
            Err(err) => {
                let err = ControllerError::from(err);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Flip citizen/authority mode and redraw every marker so popup
    /// controls match the new mode. The mode is restored if the redraw
    /// cannot read the store.
    pub async fn toggle_view_mode(&mut self) -> Result<ViewMode, ControllerError> {
        let previous = self.view_mode;
        self.view_mode = previous.toggled();
        self.open_popup = None;
        if let Err(err) = self.refresh().await {
            self.view_mode = previous;
            return Err(err);
        }
        tracing::info!(mode = %self.view_mode, "view mode switched");
        Ok(self.view_mode)
    }

    /// Show the report form, pre-filled from defaults and the map center.
    pub fn open_report_modal(&mut self) {
        self.picker.cancel(&mut self.map);
        self.form = ReportForm {
            visible: true,
            issue_type: self.defaults.issue_type.clone(),
            description: String::new(),
            location_text: self.map.center().to_string(),
            photo: None,
            submitting: false,
        };
    }

    /// Hide the form and abandon any pick in progress.
    pub fn close_report_modal(&mut self) {
        self.picker.cancel(&mut self.map);
        self.form.visible = false;
    }

    /// Start (or restart) picking the location from a map click.
    pub fn begin_pick(&mut self) -> ListenerId {
        self.picker.begin(&mut self.map)
    }

    /// Deliver a raw map click. Returns whether it filled the location field.
    pub fn handle_map_click(
        &mut self,
        listener: ListenerId,
        lat: f64,
        lng: f64,
    ) -> Result<bool, ValidationError> {
        let coord = LatLng::new(lat, lng)?;
        Ok(match self.picker.on_map_click(&mut self.map, listener, coord) {
            Some(coord) => {
                self.form.location_text = coord.to_string();
                true
            }
            None => false,
        })
    }

    /// Validate the form, encode the photo, and create the record.
    ///
    /// On success the modal closes. On any failure a notice is recorded, the
    /// modal stays open and nothing is written. A photo that cannot be
    /// encoded aborts the submission rather than dropping the photo.
    pub async fn submit_report(&mut self) -> Result<IssueRecord, ControllerError> {
        if self.form.submitting {
            let err = ControllerError::SubmissionInFlight;
            self.report(&err);
            return Err(err);
        }

        self.form.submitting = true;
        let outcome = self.run_submission().await;
        self.form.submitting = false;

        match outcome {
            Ok(record) => {
                self.picker.cancel(&mut self.map);
                self.form.visible = false;
                Ok(record)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    async fn run_submission(&self) -> Result<IssueRecord, ControllerError> {
        let location = parse_lat_lng(&self.form.location_text)?;

        let mut draft = IssueDraft::new(self.form.issue_type.clone(), location);
        if !self.form.description.trim().is_empty() {
            draft = draft.with_description(self.form.description.clone());
        }
        if let Some(reporter) = &self.defaults.reporter {
            draft = draft.reported_by(reporter.clone());
        }
        draft.validate()?;
        if let Some(file) = &self.form.photo {
            draft = draft.with_photo(self.encoder.encode(file).await?);
        }

        Ok(self.store.create(draft).await?)
    }

    /// Authority action from a marker popup. Closes the popup on success;
    /// the marker itself is refreshed by the resulting change event.
    pub async fn update_status(
        &mut self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<IssueRecord, ControllerError> {
        match self.store.update_status(id, status).await {
            Ok(record) => {
                if self.open_popup.as_ref() == Some(id) {
                    self.open_popup = None;
                }
                Ok(record)
            }
            Err(err) => {
                let stale = matches!(err, StoreError::NotFound { .. });
                let err = ControllerError::from(err);
                self.report(&err);
                if stale {
                    self.open_popup = None;
                    // Refresh failures are reported by `refresh` itself.
                    let _ = self.refresh().await;
                }
                Err(err)
            }
        }
    }

    /// Run the action carried by a popup's status control.
    pub async fn apply_popup_action(
        &mut self,
        action: &PopupAction,
        status: IssueStatus,
    ) -> Result<IssueRecord, ControllerError> {
        match action {
            PopupAction::UpdateStatus { id } => self.update_status(id, status).await,
        }
    }

    /// Open the info surface of a tracked marker.
    pub async fn open_popup(&mut self, id: &IssueId) -> Result<Option<PopupContent>, ControllerError> {
        if !self.reconciler.contains(id) {
            return Ok(None);
        }
        let record = self.store.get(id).await?;
        self.open_popup = record.as_ref().map(|r| r.id.clone());
        Ok(record.map(|r| popup_content(&r, self.view_mode)))
    }

    pub fn close_popup(&mut self) {
        self.open_popup = None;
    }

    fn apply(&mut self, event: &ChangeEvent) {
        if event.kind == ChangeKind::Removed && self.open_popup.as_ref() == Some(&event.id) {
            self.open_popup = None;
        }
        self.reconciler
            .apply_change_event(&mut self.map, event, self.view_mode);
    }

    /// Apply every change delivered so far. Returns how many were applied.
    pub fn pump_changes(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let events = subscription.drain();
        for event in &events {
            self.apply(event);
        }
        events.len()
    }

    /// Wait for the next change and apply it. `None` when not subscribed
    /// or the store has gone away.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        let event = self.subscription.as_mut()?.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Drop the subscription and clear the map.
    pub fn stop(&mut self) {
        self.subscription = None;
        self.picker.cancel(&mut self.map);
        self.reconciler.clear(&mut self.map);
    }
}

/// Collapse a replay into the collection it describes, keeping first-seen order.
fn fold_events(events: Vec<ChangeEvent>) -> Vec<IssueRecord> {
    let mut order: Vec<IssueId> = Vec::new();
    let mut latest: HashMap<IssueId, IssueRecord> = HashMap::new();
    for event in events {
        match (event.kind, event.record) {
            (ChangeKind::Removed, _) => {
                latest.remove(&event.id);
            }
            (_, Some(record)) => match latest.entry(event.id) {
                Entry::Occupied(mut slot) => {
                    slot.insert(record);
                }
                Entry::Vacant(slot) => {
                    order.push(slot.key().clone());
                    slot.insert(record);
                }
            },
            (_, None) => {}
        }
    }
    order.into_iter().filter_map(|id| latest.remove(&id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueId;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, status: IssueStatus) -> IssueRecord {
        let mut rec = IssueRecord::from_draft(
            IssueDraft::new("Pothole", LatLng::new(1.0, 2.0).unwrap()),
            IssueId::new_unchecked(id),
            Utc.timestamp_millis_opt(1).unwrap(),
        )
        .unwrap();
        rec.status = status;
        rec
    }

    #[test]
    fn fold_keeps_order_and_latest_state() {
        let events = vec![
            ChangeEvent::added(record("a", IssueStatus::Received)),
            ChangeEvent::added(record("b", IssueStatus::Received)),
            ChangeEvent::modified(record("a", IssueStatus::Resolved)),
            ChangeEvent::removed(IssueId::new_unchecked("b")),
        ];
        let folded = fold_events(events);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].id.as_str(), "a");
        assert_eq!(folded[0].status, IssueStatus::Resolved);
    }

    #[test]
    fn fold_keeps_first_seen_position_across_repeats() {
        let events = vec![
            ChangeEvent::added(record("a", IssueStatus::Received)),
            ChangeEvent::added(record("b", IssueStatus::Received)),
            ChangeEvent::added(record("a", IssueStatus::Received)),
            ChangeEvent::modified(record("b", IssueStatus::InProgress)),
            ChangeEvent::added(record("c", IssueStatus::Received)),
            ChangeEvent::modified(record("a", IssueStatus::Resolved)),
        ];
        let folded = fold_events(events);
        let ids: Vec<_> = folded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(folded[0].status, IssueStatus::Resolved);
        assert_eq!(folded[1].status, IssueStatus::InProgress);
    }

    #[test]
    fn transient_errors_become_retry_notices() {
        let err = ControllerError::Store(StoreError::Transient {
            reason: "offline".into(),
        });
        assert_eq!(err.notice().kind, NoticeKind::Retry);
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);

        let err = ControllerError::Validation(ValidationError::new("location", "x", "bad"));
        assert_eq!(err.notice().kind, NoticeKind::Error);
        assert_eq!(err.code(), ErrorCode::InvalidLocation);
    }
}
