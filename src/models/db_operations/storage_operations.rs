use crate::models::db_operations::baas_client::{expect_success, BaasClient, BaasError};
use reqwest::Method;

pub const UPLOADS_BUCKET: &str = "uploads";

/// Stores an object without overwriting; an existing path is an error.
pub async fn upload_object(
    client: &BaasClient,
    access_token: &str,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<(), BaasError> {
    let response = client
        .request(Method::POST, &format!("storage/v1/object/{}/{}", bucket, path), Some(access_token))
        .header("content-type", content_type)
        .header("cache-control", "max-age=3600")
        .header("x-upsert", "false")
        .body(bytes)
        .send()
        .await?;
    expect_success(response).await
}

pub fn public_url(client: &BaasClient, bucket: &str, path: &str) -> String {
    client.endpoint(&format!("storage/v1/object/public/{}/{}", bucket, path.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_points_at_the_public_object_route() {
        let client = BaasClient::new("https://project.example.co", "anon").unwrap();
        assert_eq!(
            public_url(&client, UPLOADS_BUCKET, "u1/1700000000000-ab12.png"),
            "https://project.example.co/storage/v1/object/public/uploads/u1/1700000000000-ab12.png"
        );
    }
}
