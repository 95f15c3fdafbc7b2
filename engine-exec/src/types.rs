use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushOutcome {
    pub branch: String,
    pub pushed: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Completed { pushed: Vec<PushOutcome> },
    Paused { conflicts: Vec<String>, execution_path: PathBuf },
    Failed { error: String },
}
