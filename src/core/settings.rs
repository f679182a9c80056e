use serde::{Deserialize, Serialize};

/// Json struct for instance-independent settings
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    pub web_port: Option<u16>,

    /// Base URL of the document sync service backing the community vote.
    /// Absence, or a failure to reach it at startup, selects offline mode
    /// for the life of the process.
    pub sync_url: Option<String>,
}
