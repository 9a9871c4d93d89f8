use crate::config::Config;
use crate::helper::form_helpers::read_multipart;
use crate::helper::notification_helpers::{self, error_redirect, local_target, redirect, success_redirect};
use crate::helper::sanitization_helpers::safe_image_url;
use crate::helper::template_helpers;
use crate::helper::upload_helpers::{self, UploadRules};
use crate::middleware::{AuthenticatedUser, CurrentSettings, MaybeUser};
use crate::models::db_operations::commerce_db_operations::{self, CartChange};
use crate::models::db_operations::{products_db_operations, profiles_db_operations};
use crate::models::forms::{ImageUrlForm, PaymentDetails, ProductFields, ProductRefForm, QuantityForm};
use crate::models::{Notification, Product};
use crate::AppState;
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use std::time::Duration;
use tera::Tera;
use uuid::Uuid;

pub fn config_store(cfg: &mut web::ServiceConfig) {
    cfg.route("/store", web::get().to(show_store))
        .route("/store/{id}", web::get().to(show_product))
        .route("/store/{id}/images", web::post().to(add_image_action))
        .route("/store/{id}/images/{image_id}/delete", web::post().to(remove_image_action))
        .route("/create-product", web::get().to(show_create_product))
        .route("/create-product", web::post().to(create_product_action));
}

pub fn config_cart(cfg: &mut web::ServiceConfig) {
    cfg.route("/cart", web::get().to(show_cart))
        .route("/cart/add", web::post().to(add_to_cart_action))
        .route("/cart/{item_id}/quantity", web::post().to(update_quantity_action))
        .route("/cart/{item_id}/remove", web::post().to(remove_cart_item_action))
        .route("/checkout", web::get().to(show_checkout))
        .route("/checkout", web::post().to(checkout_action))
        .route("/wishlist", web::get().to(show_wishlist))
        .route("/wishlist/add", web::post().to(add_to_wishlist_action))
        .route("/wishlist/{item_id}/remove", web::post().to(remove_wishlist_item_action))
        .route("/wishlist/move-to-cart", web::post().to(move_to_cart_action));
}

// --- Store ---

async fn show_store(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let listings = match products_db_operations::fetch_listings(&state.baas, user.token()).await {
        Ok(listings) => listings,
        Err(e) => {
            log::error!("Failed to load products: {}", e);
            notification_helpers::flash(&session, Notification::error("Error loading products", e.to_string()));
            Vec::new()
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("listings", &listings);
    template_helpers::render(&tera, "store/list.html", &ctx)
}

async fn show_product(
    path: web::Path<Uuid>,
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> impl Responder {
    let product_id = path.into_inner();
    let product = match products_db_operations::fetch_product(&state.baas, user.token(), product_id).await {
        Ok(Some(product)) => product,
        Ok(None) => return error_redirect(&session, "Product not found", "This product is no longer listed.", "/store"),
        Err(e) => {
            log::error!("Failed to load product {}: {}", product_id, e);
            return error_redirect(&session, "Error loading product", e.to_string(), "/store");
        }
    };
    let images = products_db_operations::fetch_images(&state.baas, user.token(), product_id)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load images of {}: {}", product_id, e);
            notification_helpers::flash(&session, Notification::error("Error loading images", e.to_string()));
            Vec::new()
        });
    let seller = profiles_db_operations::fetch_author_map(&state.baas, user.token(), &[product.user_id])
        .await
        .map(|mut sellers| sellers.remove(&product.user_id).unwrap_or_default())
        .unwrap_or_else(|e| {
            log::warn!("Seller lookup for {} failed: {}", product_id, e);
            Default::default()
        });

    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("is_owner", &(user.id() == Some(product.user_id)));
    ctx.insert("can_add_image", &(images.len() < config.max_product_images));
    ctx.insert("product", &product);
    ctx.insert("images", &images);
    ctx.insert("seller", &seller);
    template_helpers::render(&tera, "store/detail.html", &ctx)
}

/// The product when `user` owns it, otherwise the response to send instead.
async fn owned_product(
    state: &AppState,
    user: &AuthenticatedUser,
    session: &Session,
    product_id: Uuid,
) -> Result<Product, HttpResponse> {
    let back = format!("/store/{}", product_id);
    match products_db_operations::fetch_product(&state.baas, Some(user.token()), product_id).await {
        Ok(Some(product)) if product.user_id == user.id() => Ok(product),
        Ok(_) => Err(error_redirect(session, "Not allowed", "You can only change your own listings.", &back)),
        Err(e) => {
            log::error!("Failed to load product {}: {}", product_id, e);
            Err(error_redirect(session, "Error loading product", e.to_string(), &back))
        }
    }
}

async fn add_image_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<ImageUrlForm>,
) -> impl Responder {
    let product_id = path.into_inner();
    let back = format!("/store/{}", product_id);
    if let Err(response) = owned_product(&state, &user, &session, product_id).await {
        return response;
    }
    let Some(image_url) = safe_image_url(&form.image_url) else {
        return error_redirect(&session, "Error adding image", "Image URLs must start with http:// or https://.", &back);
    };

    let existing = match products_db_operations::fetch_images(&state.baas, Some(user.token()), product_id).await {
        Ok(images) => images,
        Err(e) => return error_redirect(&session, "Error adding image", e.to_string(), &back),
    };
    if let Err(e) = upload_helpers::check_image_count(existing.len(), 1, config.max_product_images) {
        return error_redirect(&session, "Error adding image", e.to_string(), &back);
    }

    match products_db_operations::add_image(&state.baas, user.token(), product_id, &image_url, existing.len()).await {
        Ok(_) => success_redirect(&session, "Image added", "Product image has been added successfully.", &back),
        Err(e) => {
            log::error!("Failed to add image to {}: {}", product_id, e);
            error_redirect(&session, "Error adding image", e.to_string(), &back)
        }
    }
}

async fn remove_image_action(
    path: web::Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
) -> impl Responder {
    let (product_id, image_id) = path.into_inner();
    let back = format!("/store/{}", product_id);
    if let Err(response) = owned_product(&state, &user, &session, product_id).await {
        return response;
    }
    match products_db_operations::remove_image(&state.baas, user.token(), product_id, image_id).await {
        Ok(()) => success_redirect(&session, "Image removed", "Product image has been removed successfully.", &back),
        Err(e) => {
            log::error!("Failed to remove image {} from {}: {}", image_id, product_id, e);
            error_redirect(&session, "Error removing image", e.to_string(), &back)
        }
    }
}

async fn show_create_product(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> impl Responder {
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("max_product_images", &config.max_product_images);
    ctx.insert("max_upload_size_mb", &config.max_upload_size_mb);
    ctx.insert("allowed_mime_types", &config.allowed_mime_types);
    template_helpers::render(&tera, "store/create.html", &ctx)
}

/// Typed image URLs come first in the gallery, uploaded files after them.
async fn create_product_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let form = match read_multipart(payload, &UploadRules::from_config(&config)).await {
        Ok(form) => form,
        Err(e) => return error_redirect(&session, "Upload failed", e.to_string(), "/create-product"),
    };

    let fields = ProductFields {
        title: form.text("title").to_string(),
        description: form.text("description").to_string(),
        price: form.text("price").to_string(),
        category: form.text("category").to_string(),
        condition: form.text("condition").to_string(),
        location: form.text("location").to_string(),
        image_urls: form.texts("image_urls").to_vec(),
    };
    let (mut product, mut gallery) = match fields.validate().and_then(|p| Ok((p, fields.gallery_urls()?))) {
        Ok(validated) => validated,
        Err(e) => return error_redirect(&session, "Missing required fields", e.to_string(), "/create-product"),
    };

    let files = form.into_files("images");
    if let Err(e) = upload_helpers::check_image_count(gallery.len(), files.len(), config.max_product_images) {
        return error_redirect(&session, "Too many images", e.to_string(), "/create-product");
    }
    match upload_helpers::store_files(&state.baas, user.token(), user.id(), files).await {
        Ok(urls) => gallery.extend(urls),
        Err(e) => {
            log::error!("Product image upload for {} failed: {}", user.id(), e);
            return error_redirect(&session, "Upload failed", e.to_string(), "/create-product");
        }
    }
    if product.image_url.is_none() {
        product.image_url = gallery.first().cloned();
    }

    match products_db_operations::create_product(&state.baas, user.token(), user.id(), &product, &gallery).await {
        Ok(created) => {
            log::info!("User {} listed product {} with {} image(s)", user.id(), created.id, gallery.len());
            success_redirect(&session, "Product listed successfully!", "Your product has been added to the store.", "/store")
        }
        Err(e) => {
            log::error!("Failed to create product for {}: {}", user.id(), e);
            error_redirect(&session, "Error creating product", e.to_string(), "/create-product")
        }
    }
}

// --- Cart & checkout ---

async fn show_cart(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let items = match commerce_db_operations::fetch_cart(&state.baas, user.token(), user.id()).await {
        Ok(items) => items,
        Err(e) => {
            log::error!("Failed to load cart of {}: {}", user.id(), e);
            notification_helpers::flash(&session, Notification::error("Error loading cart", e.to_string()));
            Vec::new()
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("total", &commerce_db_operations::cart_total(&items));
    ctx.insert("items", &items);
    template_helpers::render(&tera, "store/cart.html", &ctx)
}

async fn add_to_cart_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ProductRefForm>,
) -> impl Responder {
    let back = local_target(form.return_to.as_deref(), "/store");
    match commerce_db_operations::add_to_cart(&state.baas, user.token(), user.id(), form.product_id).await {
        Ok(()) => success_redirect(&session, "Added to cart!", "Item has been added to your cart", &back),
        Err(e) => {
            log::error!("Failed to add {} to cart of {}: {}", form.product_id, user.id(), e);
            error_redirect(&session, "Error adding to cart", e.to_string(), &back)
        }
    }
}

async fn update_quantity_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<QuantityForm>,
) -> impl Responder {
    let item_id = path.into_inner();
    match commerce_db_operations::set_cart_quantity(&state.baas, user.token(), user.id(), item_id, form.quantity).await {
        Ok(CartChange::Updated) => redirect("/cart"),
        Ok(CartChange::Removed) => success_redirect(&session, "Item removed", "Item has been removed from your cart", "/cart"),
        Err(e) => {
            log::error!("Failed to update cart item {}: {}", item_id, e);
            error_redirect(&session, "Error updating quantity", e.to_string(), "/cart")
        }
    }
}

async fn remove_cart_item_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
) -> impl Responder {
    let item_id = path.into_inner();
    match commerce_db_operations::remove_cart_item(&state.baas, user.token(), user.id(), item_id).await {
        Ok(()) => success_redirect(&session, "Item removed", "Item has been removed from your cart", "/cart"),
        Err(e) => {
            log::error!("Failed to remove cart item {}: {}", item_id, e);
            error_redirect(&session, "Error removing item", e.to_string(), "/cart")
        }
    }
}

async fn show_checkout(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let items = match commerce_db_operations::fetch_cart(&state.baas, user.token(), user.id()).await {
        Ok(items) => items,
        Err(e) => {
            log::error!("Failed to load cart of {} for checkout: {}", user.id(), e);
            return error_redirect(&session, "Error loading cart", e.to_string(), "/cart");
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("total", &commerce_db_operations::cart_total(&items));
    ctx.insert("items", &items);
    template_helpers::render(&tera, "store/checkout.html", &ctx)
}

/// Simulated payment: no provider is called, the order is confirmed after a
/// fixed delay.
async fn checkout_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<PaymentDetails>,
) -> impl Responder {
    if let Err(e) = form.validate() {
        return error_redirect(&session, "Missing payment details", e.to_string(), "/checkout");
    }
    match commerce_db_operations::fetch_cart(&state.baas, user.token(), user.id()).await {
        Ok(items) if items.is_empty() => {
            return error_redirect(&session, "No Items to Checkout", "Your cart is empty.", "/cart");
        }
        Ok(items) => log::info!(
            "Processing simulated payment of ${:.2} for {}",
            commerce_db_operations::cart_total(&items),
            user.id()
        ),
        Err(e) => {
            log::error!("Failed to load cart of {} for payment: {}", user.id(), e);
            return error_redirect(&session, "Error loading cart", e.to_string(), "/checkout");
        }
    }

    tokio::time::sleep(Duration::from_millis(config.checkout_delay_ms)).await;
    success_redirect(&session, "Payment Successful!", "Your order has been placed successfully.", "/store")
}

// --- Wishlist ---

async fn show_wishlist(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let items = match commerce_db_operations::fetch_wishlist(&state.baas, user.token(), user.id()).await {
        Ok(items) => items,
        Err(e) => {
            log::error!("Failed to load wishlist of {}: {}", user.id(), e);
            notification_helpers::flash(&session, Notification::error("Error loading wishlist", e.to_string()));
            Vec::new()
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("items", &items);
    template_helpers::render(&tera, "store/wishlist.html", &ctx)
}

async fn add_to_wishlist_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ProductRefForm>,
) -> impl Responder {
    let back = local_target(form.return_to.as_deref(), "/store");
    match commerce_db_operations::add_to_wishlist(&state.baas, user.token(), user.id(), form.product_id).await {
        Ok(()) => success_redirect(&session, "Saved to wishlist", "Item has been added to your wishlist", &back),
        Err(e) => {
            log::error!("Failed to add {} to wishlist of {}: {}", form.product_id, user.id(), e);
            error_redirect(&session, "Error saving item", e.to_string(), &back)
        }
    }
}

async fn remove_wishlist_item_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
) -> impl Responder {
    let item_id = path.into_inner();
    match commerce_db_operations::remove_wishlist_item(&state.baas, user.token(), user.id(), item_id).await {
        Ok(()) => success_redirect(&session, "Removed from wishlist", "Item has been removed from your wishlist", "/wishlist"),
        Err(e) => {
            log::error!("Failed to remove wishlist item {}: {}", item_id, e);
            error_redirect(&session, "Error removing item", e.to_string(), "/wishlist")
        }
    }
}

/// Copies the product into the cart; the wishlist entry stays.
async fn move_to_cart_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ProductRefForm>,
) -> impl Responder {
    match commerce_db_operations::add_to_cart(&state.baas, user.token(), user.id(), form.product_id).await {
        Ok(()) => success_redirect(&session, "Added to cart!", "Item has been added to your cart", "/wishlist"),
        Err(e) => {
            log::error!("Failed to move {} to cart of {}: {}", form.product_id, user.id(), e);
            error_redirect(&session, "Error adding to cart", e.to_string(), "/wishlist")
        }
    }
}
