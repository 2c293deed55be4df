use serde::{Deserialize, Serialize};

use crate::{error::ErrorRecord, payload::Payload};

/// `{data, loading, error}` for one category. An error never clears `data`:
/// readers keep the last good value next to the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    pub data: Option<Payload>,
    pub loading: bool,
    pub error: Option<ErrorRecord>,
    pub updated_at_ms: Option<i64>,
}
