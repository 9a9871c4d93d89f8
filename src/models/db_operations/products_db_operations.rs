use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::profiles_db_operations;
use crate::models::db_operations::query::first_row;
use crate::models::forms::NewProduct;
use crate::models::{AuthorSummary, Product, ProductImage, ProductListing};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// All products, newest first, with the seller's name. A failed profile lookup
/// only costs the seller names.
pub async fn fetch_listings(
    client: &BaasClient,
    token: Option<&str>,
) -> Result<Vec<ProductListing>, BaasError> {
    let products: Vec<Product> = client
        .table("products", token)
        .select("*")
        .order("created_at", false)
        .fetch()
        .await?;

    let seller_ids: Vec<Uuid> = products.iter().map(|p| p.user_id).collect();
    let sellers = profiles_db_operations::fetch_author_map(client, token, &seller_ids)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to fetch seller profiles: {}", e);
            HashMap::new()
        });

    Ok(attach_sellers(products, &sellers))
}

pub fn attach_sellers(products: Vec<Product>, sellers: &HashMap<Uuid, AuthorSummary>) -> Vec<ProductListing> {
    products
        .into_iter()
        .map(|product| ProductListing {
            seller: sellers.get(&product.user_id).cloned().unwrap_or_default(),
            product,
        })
        .collect()
}

pub async fn fetch_product(
    client: &BaasClient,
    token: Option<&str>,
    product_id: Uuid,
) -> Result<Option<Product>, BaasError> {
    client
        .table("products", token)
        .select("*")
        .eq("id", product_id)
        .fetch_optional()
        .await
}

pub async fn fetch_images(
    client: &BaasClient,
    token: Option<&str>,
    product_id: Uuid,
) -> Result<Vec<ProductImage>, BaasError> {
    client
        .table("product_images", token)
        .select("*")
        .eq("product_id", product_id)
        .order("order_index", true)
        .fetch()
        .await
}

/// Creates the product and records every image URL in the gallery, in order.
pub async fn create_product(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    product: &NewProduct,
    image_urls: &[String],
) -> Result<Product, BaasError> {
    let rows: Vec<Product> = client
        .table("products", Some(token))
        .insert(&json!({
            "title": product.title,
            "description": product.description,
            "price": product.price,
            "image_url": product.image_url,
            "category": product.category,
            "condition": product.condition,
            "location": product.location,
            "user_id": user_id,
        }))
        .await?;
    let created = first_row(rows)?;

    let gallery: Vec<_> = image_urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .enumerate()
        .map(|(index, url)| json!({ "product_id": created.id, "image_url": url, "order_index": index }))
        .collect();
    if !gallery.is_empty() {
        client
            .table("product_images", Some(token))
            .insert_only(&gallery)
            .await?;
    }

    Ok(created)
}

/// Appends an image at the end of the gallery.
pub async fn add_image(
    client: &BaasClient,
    token: &str,
    product_id: Uuid,
    image_url: &str,
    order_index: usize,
) -> Result<ProductImage, BaasError> {
    let rows: Vec<ProductImage> = client
        .table("product_images", Some(token))
        .insert(&json!({
            "product_id": product_id,
            "image_url": image_url.trim(),
            "order_index": order_index,
        }))
        .await?;
    first_row(rows)
}

pub async fn remove_image(
    client: &BaasClient,
    token: &str,
    product_id: Uuid,
    image_id: Uuid,
) -> Result<(), BaasError> {
    client
        .table("product_images", Some(token))
        .eq("id", image_id)
        .eq("product_id", product_id)
        .delete()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn listings_fall_back_to_anonymous_seller() {
        let known = Uuid::new_v4();
        let product = |user_id| Product {
            id: Uuid::new_v4(),
            user_id,
            title: "Basket".into(),
            description: None,
            price: 20.0,
            image_url: None,
            category: None,
            condition: None,
            location: None,
            created_at: Utc::now(),
        };
        let mut sellers = HashMap::new();
        sellers.insert(known, AuthorSummary { full_name: Some("Lena".into()), ..Default::default() });

        let listings = attach_sellers(vec![product(known), product(Uuid::new_v4())], &sellers);
        assert_eq!(listings[0].seller.display_name(), "Lena");
        assert_eq!(listings[1].seller.display_name(), "Anonymous User");
    }
}
