use crate::helper::sanitization_helpers::{safe_image_url, strip_all_html};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Please fill in the {0}.")]
    Missing(&'static str),
    #[error("{0}")]
    Invalid(String),
}

fn required(value: &str, name: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing(name));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn optional_image_url(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match optional(value) {
        None => Ok(None),
        Some(raw) => safe_image_url(&raw).map(Some).ok_or_else(|| {
            ValidationError::Invalid("Image URLs must start with http:// or https://.".to_string())
        }),
    }
}

// --- Auth forms ---

#[derive(Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub username: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required(&self.email, "email")?;
        validate_password_length(&self.password)
    }
}

#[derive(Deserialize)]
pub struct EmailForm {
    pub email: String,
}

#[derive(Deserialize)]
pub struct NewPasswordForm {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::Invalid("Passwords don't match.".to_string()));
    }
    validate_password_length(password)
}

pub fn validate_password_length(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::Invalid(format!(
            "Password must be at least {} characters long.", MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// --- Posts ---

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
}

impl NewPost {
    pub fn validate(title: &str, content: &str, image_url: Option<&str>) -> Result<Self, ValidationError> {
        let title = strip_all_html(&required(title, "title")?);
        if title.trim().is_empty() {
            return Err(ValidationError::Missing("title"));
        }
        Ok(Self {
            title,
            content: required(content, "content")?,
            image_url: optional_image_url(image_url)?,
        })
    }
}

#[derive(Deserialize)]
pub struct PostEditForm {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub content: String,
}

// --- Products ---

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
}

/// Raw text fields of the listing form before validation.
#[derive(Debug, Default, Clone)]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub condition: String,
    pub location: String,
    pub image_urls: Vec<String>,
}

impl ProductFields {
    pub fn validate(&self) -> Result<NewProduct, ValidationError> {
        if self.title.trim().is_empty() || self.price.trim().is_empty() {
            return Err(ValidationError::Missing("title and price"));
        }
        let price = parse_price(&self.price)?;
        let image_urls = self.gallery_urls()?;
        Ok(NewProduct {
            title: strip_all_html(self.title.trim()),
            description: optional(Some(&self.description)),
            price,
            image_url: image_urls.into_iter().next(),
            category: optional(Some(&self.category)),
            condition: optional(Some(&self.condition)),
            location: optional(Some(&self.location)),
        })
    }

    /// Non-blank image URLs in form order, each checked.
    pub fn gallery_urls(&self) -> Result<Vec<String>, ValidationError> {
        self.image_urls
            .iter()
            .filter_map(|u| optional(Some(u)))
            .map(|u| optional_image_url(Some(&u)).map(|v| v.unwrap_or_default()))
            .collect()
    }
}

pub fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok((price * 100.0).round() / 100.0),
        _ => Err(ValidationError::Invalid("Price must be a number of 0 or more.".to_string())),
    }
}

#[derive(Deserialize)]
pub struct ImageUrlForm {
    pub image_url: String,
}

#[derive(Deserialize)]
pub struct QuantityForm {
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct ProductRefForm {
    pub product_id: Uuid,
    /// Page to come back to after the action.
    pub return_to: Option<String>,
}

// --- Checkout ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PaymentDetails {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub cardholder_name: String,
    pub billing_address: String,
    pub city: String,
    pub zip_code: String,
}

impl PaymentDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required(&self.card_number, "card number")?;
        required(&self.expiry_date, "expiry date")?;
        required(&self.cvv, "CVV")?;
        required(&self.cardholder_name, "cardholder name")?;
        required(&self.billing_address, "billing address")?;
        required(&self.city, "city")?;
        required(&self.zip_code, "ZIP code")?;
        Ok(())
    }
}

// --- Profile & people ---

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Blank fields are stored as null.
    pub fn normalized(&self) -> Self {
        Self {
            username: optional(self.username.as_deref()).map(|s| strip_all_html(&s)),
            full_name: optional(self.full_name.as_deref()).map(|s| strip_all_html(&s)),
            bio: optional(self.bio.as_deref()),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

// --- Messages ---

#[derive(Deserialize)]
pub struct StartConversationForm {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct MessageForm {
    pub content: String,
}

// --- Settings ---

#[derive(Deserialize)]
pub struct SettingsForm {
    pub language: String,
    pub theme: String,
}
