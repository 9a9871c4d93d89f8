use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::query::filter_term;
use crate::models::forms::ProfileUpdate;
use crate::models::{AuthorSummary, Profile};
use std::collections::HashMap;
use uuid::Uuid;

pub const PEOPLE_SEARCH_LIMIT: usize = 20;
const AUTHOR_COLUMNS: &str = "id,username,full_name,avatar_url";

pub async fn fetch_profile(
    client: &BaasClient,
    token: Option<&str>,
    user_id: Uuid,
) -> Result<Option<Profile>, BaasError> {
    client
        .table("profiles", token)
        .select("*")
        .eq("id", user_id)
        .fetch_optional()
        .await
}

/// Case-insensitive match on username or full name. A blank term returns nothing.
pub async fn search_profiles(
    client: &BaasClient,
    token: Option<&str>,
    term: &str,
) -> Result<Vec<Profile>, BaasError> {
    let term = filter_term(term);
    if term.is_empty() {
        return Ok(Vec::new());
    }
    client
        .table("profiles", token)
        .select("*")
        .or(&format!("username.ilike.*{0}*,full_name.ilike.*{0}*", term))
        .limit(PEOPLE_SEARCH_LIMIT)
        .fetch()
        .await
}

pub async fn update_profile(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    update: &ProfileUpdate,
) -> Result<(), BaasError> {
    client
        .table("profiles", Some(token))
        .eq("id", user_id)
        .update(&update.normalized())
        .await
}

/// Author summaries for a set of user ids, keyed by id. Ids without a profile
/// row are simply absent.
pub async fn fetch_author_map(
    client: &BaasClient,
    token: Option<&str>,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, AuthorSummary>, BaasError> {
    let mut ids: Vec<Uuid> = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let authors: Vec<AuthorSummary> = client
        .table("profiles", token)
        .select(AUTHOR_COLUMNS)
        .in_list("id", ids)
        .fetch()
        .await?;

    Ok(authors
        .into_iter()
        .filter_map(|author| author.id.map(|id| (id, author)))
        .collect())
}
