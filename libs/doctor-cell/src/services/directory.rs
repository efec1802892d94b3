use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::DoctorProfile;

/// Read-only doctor lookup for the appointment core.
pub struct DoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl DoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Resolve a doctor profile by its profile id. Returns `None` when the
    /// id does not exist; storage errors propagate.
    pub async fn find_by_id(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<DoctorProfile>, SupabaseError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let Some(row) = result.into_iter().next() else {
            return Ok(None);
        };

        let doctor: DoctorProfile = serde_json::from_value(row)
            .map_err(|e| SupabaseError::Decode(format!("Failed to parse doctor profile: {}", e)))?;

        Ok(Some(doctor))
    }
}
