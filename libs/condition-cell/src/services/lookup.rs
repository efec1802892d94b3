use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::HealthCondition;

pub struct ConditionLookup {
    supabase: Arc<SupabaseClient>,
}

impl ConditionLookup {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Resolve a set of condition ids. Unknown ids are simply absent from
    /// the result; order follows the store's response.
    pub async fn find_by_ids(
        &self,
        ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<HealthCondition>, SupabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        debug!("Resolving {} health condition(s)", ids.len());

        let id_list = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/health_conditions?id=in.({})", id_list);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let conditions = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<HealthCondition>, _>>()
            .map_err(|e| SupabaseError::Decode(format!("Failed to parse conditions: {}", e)))?;

        Ok(conditions)
    }
}
