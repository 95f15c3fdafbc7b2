use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentType {
    Continue,
    Abort,
    ExecuteJob,
    Finalize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// The intent to perform an operation, written before it begins and cleared
/// once the corresponding state change is durable. Exactly one may exist
/// per repository at a time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub status: IntentStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub expected_state_before: Option<String>,
    pub context: Option<String>,
    pub error: Option<String>,
}
