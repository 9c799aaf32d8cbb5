//! Info-surface content attached to each marker.
//!
//! [`popup_content`] is pure: the same record and view mode always give the
//! same descriptor. Authority controls exist only in the descriptor built for
//! [`ViewMode::Authority`], so rebuilding a marker after a mode switch never
//! leaves stale controls behind.

use serde::Serialize;
use std::fmt::Write as _;

use super::ViewMode;
use crate::model::{ANONYMOUS, IssueId, IssueRecord, IssueStatus, PhotoPayload};

/// Action a popup control is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PopupAction {
    /// Calls `IssueStore::update_status(id, <selected>)`.
    UpdateStatus { id: IssueId },
}

/// Status selector shown to authority users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusControl {
    pub options: Vec<IssueStatus>,
    pub selected: IssueStatus,
    pub action: PopupAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupContent {
    pub id: IssueId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub reported_by: String,
    pub status: IssueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_control: Option<StatusControl>,
}

/// Derive the info-surface descriptor for `record` in `mode`.
#[must_use]
pub fn popup_content(record: &IssueRecord, mode: ViewMode) -> PopupContent {
    let reported_by = if record.reported_by.trim().is_empty() {
        ANONYMOUS.to_string()
    } else {
        record.reported_by.clone()
    };

    let status_control = (mode == ViewMode::Authority).then(|| StatusControl {
        options: IssueStatus::ALL.to_vec(),
        selected: record.status,
        action: PopupAction::UpdateStatus {
            id: record.id.clone(),
        },
    });

    PopupContent {
        id: record.id.clone(),
        title: record.issue_type.clone(),
        description: record.description.clone(),
        reported_by,
        status: record.status,
        photo: record.photo.clone(),
        status_control,
    }
}

/// Escape `& < > " '` for HTML text and attribute positions.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl PopupContent {
    /// Element id of the status selector, `status-select-<id>`.
    #[must_use]
    pub fn select_element_id(&self) -> String {
        format!("status-select-{}", self.id)
    }

    /// Element id of the update button, `update-btn-<id>`.
    #[must_use]
    pub fn button_element_id(&self) -> String {
        format!("update-btn-{}", self.id)
    }

    /// Render as the HTML fragment a map widget binds to the marker.
    /// Every user-supplied string is escaped, including the photo URL.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div style=\"min-width:200px\">\n");
        let _ = writeln!(
            html,
            "  <div style=\"font-weight:700;margin-bottom:6px\">{}</div>",
            escape_html(&self.title)
        );
        let _ = writeln!(
            html,
            "  <div style=\"font-size:13px;color:#333\">{}</div>",
            escape_html(self.description.as_deref().unwrap_or_default())
        );
        let _ = writeln!(
            html,
            "  <div style=\"font-size:12px;color:#666;margin-top:8px\">By: {}</div>",
            escape_html(&self.reported_by)
        );
        let _ = writeln!(
            html,
            "  <div style=\"font-size:12px;color:#666\">Status: <strong>{}</strong></div>",
            escape_html(self.status.as_str())
        );
        if let Some(photo) = &self.photo {
            let _ = writeln!(
                html,
                "  <img class=\"issue-photo\" src=\"{}\" alt=\"photo\">",
                escape_html(photo.as_str())
            );
        }
        if let Some(control) = &self.status_control {
            html.push_str("  <div style=\"margin-top:8px\">\n");
            html.push_str("    <label style=\"font-weight:600\">Update Status</label>\n");
            let _ = writeln!(
                html,
                "    <select id=\"{}\">",
                escape_html(&self.select_element_id())
            );
            for option in &control.options {
                let selected = if *option == control.selected {
                    " selected"
                } else {
                    ""
                };
                let _ = writeln!(html, "      <option{selected}>{}</option>", option.as_str());
            }
            html.push_str("    </select>\n");
            let _ = writeln!(
                html,
                "    <button id=\"{}\">Update</button>",
                escape_html(&self.button_element_id())
            );
            html.push_str("  </div>\n");
        }
        html.push_str("</div>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueDraft, LatLng};
    use chrono::{TimeZone, Utc};

    fn record() -> IssueRecord {
        let draft = IssueDraft::new("Pothole", LatLng::new(19.05, 72.86).unwrap())
            .with_description("<b>deep</b> & \"wide\"")
            .reported_by("O'Neil");
        IssueRecord::from_draft(
            draft,
            IssueId::new_unchecked("r_1_abcdef"),
            Utc.timestamp_millis_opt(1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn citizen_view_is_read_only() {
        let content = popup_content(&record(), ViewMode::Citizen);
        assert!(content.status_control.is_none());
        assert_eq!(content.title, "Pothole");
        assert_eq!(content.status, IssueStatus::Received);
        assert!(!content.to_html().contains("<select"));
    }

    #[test]
    fn authority_view_binds_update_action() {
        let mut rec = record();
        rec.status = IssueStatus::InProgress;
        let content = popup_content(&rec, ViewMode::Authority);
        let control = content.status_control.unwrap();
        assert_eq!(control.options, IssueStatus::ALL.to_vec());
        assert_eq!(control.selected, IssueStatus::InProgress);
        assert_eq!(
            control.action,
            PopupAction::UpdateStatus {
                id: IssueId::new_unchecked("r_1_abcdef")
            }
        );
    }

    #[test]
    fn html_escapes_user_text() {
        let html = popup_content(&record(), ViewMode::Citizen).to_html();
        assert!(html.contains("&lt;b&gt;deep&lt;/b&gt; &amp; &quot;wide&quot;"));
        assert!(html.contains("By: O&#39;Neil"));
        assert!(!html.contains("<b>deep"));
    }

    #[test]
    fn html_marks_current_status_selected() {
        let html = popup_content(&record(), ViewMode::Authority).to_html();
        assert!(html.contains("<option selected>Received</option>"));
        assert!(html.contains("<option>In Progress</option>"));
        assert!(html.contains("id=\"update-btn-r_1_abcdef\""));
    }

    #[test]
    fn photo_is_embedded_when_present() {
        let mut rec = record();
        rec.photo = Some(PhotoPayload::new("data:image/png;base64,AAAA"));
        let html = popup_content(&rec, ViewMode::Citizen).to_html();
        assert!(html.contains("src=\"data:image/png;base64,AAAA\""));
    }

    #[test]
    fn escape_handles_every_special_char() {
        assert_eq!(escape_html("&<>\"'x"), "&amp;&lt;&gt;&quot;&#39;x");
    }
}
