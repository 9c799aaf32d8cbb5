pub mod issue;
pub mod location;

pub use issue::{ANONYMOUS, IssueDraft, IssueId, IssueRecord, IssueStatus, PhotoPayload};
pub use location::{LatLng, parse_lat_lng};
