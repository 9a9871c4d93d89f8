use crate::models::db_operations::baas_client::{expect_success, read_json, BaasClient, BaasError};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// Builder for one PostgREST call against `/rest/v1/{table}`.
///
/// Filters are accumulated as query parameters (`col=eq.value`, `or=(...)`)
/// and the terminal method decides the HTTP verb.
#[derive(Debug)]
pub struct TableQuery<'a> {
    client: &'a BaasClient,
    table: String,
    token: Option<String>,
    params: Vec<(String, String)>,
}

/// Removes characters that carry meaning inside PostgREST filter expressions.
pub fn filter_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

impl<'a> TableQuery<'a> {
    pub(crate) fn new(client: &'a BaasClient, table: &str, token: Option<&str>) -> Self {
        Self {
            client,
            table: table.to_string(),
            token: token.map(str::to_string),
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.retain(|(k, _)| k != "select");
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("neq.{}", value))
    }

    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        self.filter(column, format!("in.({})", joined))
    }

    /// Raw `or` group, e.g. `user1_id.eq.a,user2_id.eq.a`.
    pub fn or(mut self, expression: &str) -> Self {
        self.params.push(("or".to_string(), format!("({})", expression)));
        self
    }

    /// Case-insensitive substring match.
    pub fn ilike(self, column: &str, term: &str) -> Self {
        self.filter(column, format!("ilike.*{}*", filter_term(term)))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc.nullslast" };
        self.params.push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.params.retain(|(k, _)| k != "limit");
        self.params.push(("limit".to_string(), count.to_string()));
        self
    }

    fn filter(mut self, column: &str, expression: String) -> Self {
        self.params.push((column.to_string(), expression));
        self
    }

    fn has_row_filter(&self) -> bool {
        self.params.iter().any(|(k, _)| !matches!(k.as_str(), "select" | "order" | "limit" | "on_conflict"))
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn path(&self) -> String {
        format!("rest/v1/{}", self.table)
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.path(), self.token.as_deref())
            .query(&self.params)
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BaasError> {
        let response = self.request(Method::GET).send().await?;
        read_json(response).await
    }

    /// First matching row, or `None` when nothing matches.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, BaasError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one row (or a JSON array of rows) and returns what was stored.
    pub async fn insert<B, T>(self, body: &B) -> Result<Vec<T>, BaasError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Insert that only needs to know it worked.
    pub async fn insert_only<B: Serialize + ?Sized>(self, body: &B) -> Result<(), BaasError> {
        let response = self
            .request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        expect_success(response).await
    }

    pub async fn update<B: Serialize + ?Sized>(self, body: &B) -> Result<(), BaasError> {
        if !self.has_row_filter() {
            return Err(BaasError::Unfiltered("update"));
        }
        let response = self
            .request(Method::PATCH)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        expect_success(response).await
    }

    /// Insert-or-merge keyed on the `on_conflict` columns.
    pub async fn upsert<B: Serialize + ?Sized>(mut self, body: &B, on_conflict: &str) -> Result<(), BaasError> {
        self.params.push(("on_conflict".to_string(), on_conflict.to_string()));
        let response = self
            .request(Method::POST)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await?;
        expect_success(response).await
    }

    pub async fn delete(self) -> Result<(), BaasError> {
        if !self.has_row_filter() {
            return Err(BaasError::Unfiltered("delete"));
        }
        let response = self.request(Method::DELETE).send().await?;
        expect_success(response).await
    }
}

/// First row of an insert response.
pub fn first_row<T>(rows: Vec<T>) -> Result<T, BaasError> {
    rows.into_iter().next().ok_or(BaasError::NoRows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn client() -> BaasClient {
        BaasClient::new("http://localhost:54321", "anon").unwrap()
    }

    #[test]
    fn filters_become_postgrest_params() {
        let client = client();
        let id = Uuid::nil();
        let query = client
            .table("posts", None)
            .select("*")
            .eq("user_id", id)
            .order("created_at", false)
            .limit(5);
        assert_eq!(
            query.params(),
            &[
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), format!("eq.{}", id)),
                ("order".to_string(), "created_at.desc.nullslast".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn in_list_and_or_groups() {
        let client = client();
        let query = client
            .table("profiles", None)
            .in_list("id", ["a", "b"])
            .or("username.ilike.*ann*,full_name.ilike.*ann*");
        assert_eq!(query.params()[0], ("id".to_string(), "in.(a,b)".to_string()));
        assert_eq!(query.params()[1], ("or".to_string(), "(username.ilike.*ann*,full_name.ilike.*ann*)".to_string()));
    }

    #[test]
    fn ilike_strips_filter_syntax() {
        let client = client();
        let query = client.table("profiles", None).ilike("username", " a,b(c)*% ");
        assert_eq!(query.params()[0].1, "ilike.*abc*");
    }

    #[test]
    fn select_and_limit_are_replaced_not_repeated() {
        let client = client();
        let query = client.table("posts", None).select("id").select("*").limit(1).limit(2);
        assert_eq!(query.params().len(), 2);
        assert_eq!(query.params()[0].1, "*");
        assert_eq!(query.params()[1].1, "2");
    }

    #[actix_web::test]
    async fn unfiltered_writes_are_refused_before_any_request() {
        let client = client();
        let err = client.table("posts", None).order("id", true).delete().await.unwrap_err();
        assert!(matches!(err, BaasError::Unfiltered("delete")));
        let err = client.table("posts", None).update(&serde_json::json!({"title": "x"})).await.unwrap_err();
        assert!(matches!(err, BaasError::Unfiltered("update")));
    }

    #[test]
    fn first_row_of_empty_insert_is_an_error() {
        assert!(matches!(first_row::<u8>(vec![]), Err(BaasError::NoRows)));
        assert_eq!(first_row(vec![1, 2]).unwrap(), 1);
    }
}
