pub mod form_helpers;
pub mod notification_helpers;
pub mod sanitization_helpers;
pub mod settings_helpers;
pub mod template_helpers;
pub mod upload_helpers;
pub mod video_embed;
