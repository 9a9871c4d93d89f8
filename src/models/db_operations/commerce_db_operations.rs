use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::{CartItem, WishlistItem};
use serde_json::json;
use uuid::Uuid;

const CART_COLUMNS: &str = "id,quantity,product:products(id,title,price,image_url,description)";
const WISHLIST_COLUMNS: &str = "id,product:products(id,title,price,image_url,description)";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CartChange {
    Updated,
    Removed,
}

pub fn cart_total(items: &[CartItem]) -> f64 {
    items.iter().map(CartItem::line_total).sum()
}

pub async fn fetch_cart(client: &BaasClient, token: &str, user_id: Uuid) -> Result<Vec<CartItem>, BaasError> {
    client
        .table("cart_items", Some(token))
        .select(CART_COLUMNS)
        .eq("user_id", user_id)
        .fetch()
        .await
}

/// Puts the product in the cart with quantity 1, replacing an existing line.
pub async fn add_to_cart(client: &BaasClient, token: &str, user_id: Uuid, product_id: Uuid) -> Result<(), BaasError> {
    client
        .table("cart_items", Some(token))
        .upsert(
            &json!({ "user_id": user_id, "product_id": product_id, "quantity": 1 }),
            "user_id,product_id",
        )
        .await
}

/// A quantity of zero or less removes the line.
pub async fn set_cart_quantity(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> Result<CartChange, BaasError> {
    if quantity <= 0 {
        remove_cart_item(client, token, user_id, item_id).await?;
        return Ok(CartChange::Removed);
    }
    client
        .table("cart_items", Some(token))
        .eq("id", item_id)
        .eq("user_id", user_id)
        .update(&json!({ "quantity": quantity }))
        .await?;
    Ok(CartChange::Updated)
}

pub async fn remove_cart_item(client: &BaasClient, token: &str, user_id: Uuid, item_id: Uuid) -> Result<(), BaasError> {
    client
        .table("cart_items", Some(token))
        .eq("id", item_id)
        .eq("user_id", user_id)
        .delete()
        .await
}

pub async fn fetch_wishlist(client: &BaasClient, token: &str, user_id: Uuid) -> Result<Vec<WishlistItem>, BaasError> {
    client
        .table("wishlist_items", Some(token))
        .select(WISHLIST_COLUMNS)
        .eq("user_id", user_id)
        .fetch()
        .await
}

/// Saving the same product twice keeps a single row.
pub async fn add_to_wishlist(client: &BaasClient, token: &str, user_id: Uuid, product_id: Uuid) -> Result<(), BaasError> {
    client
        .table("wishlist_items", Some(token))
        .upsert(&json!({ "user_id": user_id, "product_id": product_id }), "user_id,product_id")
        .await
}

pub async fn remove_wishlist_item(client: &BaasClient, token: &str, user_id: Uuid, item_id: Uuid) -> Result<(), BaasError> {
    client
        .table("wishlist_items", Some(token))
        .eq("id", item_id)
        .eq("user_id", user_id)
        .delete()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductSummary;
    use serde_json::json;

    #[test]
    fn total_sums_price_times_quantity() {
        let item = |price: f64, quantity: i32| CartItem {
            id: Uuid::new_v4(),
            quantity,
            product: ProductSummary { id: Uuid::new_v4(), title: "x".into(), price, image_url: None, description: None },
        };
        let items = vec![item(10.0, 2), item(4.5, 1)];
        assert!((cart_total(&items) - 24.5).abs() < 1e-9);
        assert_eq!(cart_total(&[]), 0.0);
    }

    #[test]
    fn cart_row_parses_embedded_product() {
        let row = json!({
            "id": "7f1c5a5e-2a9b-4b6e-9a53-0c4f3f3d8a11",
            "quantity": 2,
            "product": {
                "id": "0b5b2c1e-7b5e-4f0c-8f4b-8f9a1d2c3e4f",
                "title": "Clay vase",
                "price": 35,
                "image_url": null,
                "description": "Wheel thrown"
            }
        });
        let item: CartItem = serde_json::from_value(row).unwrap();
        assert!((item.line_total() - 70.0).abs() < 1e-9);
    }
}
