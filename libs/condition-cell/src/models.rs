use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health condition a patient can select when booking. The category drives
/// the appointment reason type ("Mental Health" maps to a mental-health
/// visit, everything else is physical).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCondition {
    pub id: Uuid,
    pub name: String,
    pub category: String,
}

impl HealthCondition {
    pub fn is_mental_health(&self) -> bool {
        self.category == "Mental Health"
    }
}
