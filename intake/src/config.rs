use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Maximum number of events held while waiting for parents.
    #[serde(default = "default_max_orphans")]
    pub max_orphans: usize,
}

fn default_max_orphans() -> usize {
    10_000
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_orphans: default_max_orphans(),
        }
    }
}
