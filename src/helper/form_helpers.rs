use crate::helper::upload_helpers::{mime_to_safe_extension, UploadError, UploadRules};
use actix_multipart::Multipart;
use actix_web::web::BytesMut;
use futures_util::StreamExt;
use std::collections::HashMap;

/// A file part that already passed the type and size checks.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_filename: String,
    pub content_type: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// First value of a text field, or an empty string.
    pub fn text(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn texts(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn optional_text(&self, name: &str) -> Option<&str> {
        Some(self.text(name).trim()).filter(|s| !s.is_empty())
    }

    pub fn files<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field_name == name)
    }

    pub fn into_files(self, name: &str) -> Vec<UploadedFile> {
        self.files.into_iter().filter(|f| f.field_name == name).collect()
    }

    pub fn into_all_files(self) -> Vec<UploadedFile> {
        self.files
    }

    pub fn push_text(&mut self, name: &str, value: String) {
        self.fields.entry(name.to_string()).or_default().push(value);
    }

    pub fn push_file(&mut self, file: UploadedFile) {
        self.files.push(file);
    }
}

/// Reads the whole multipart body. File parts are checked against `rules`
/// before and while their bytes are read; empty file inputs are skipped.
pub async fn read_multipart(mut payload: Multipart, rules: &UploadRules) -> Result<MultipartForm, UploadError> {
    let mut form = MultipartForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| UploadError::Multipart(e.to_string()))?;
        let disposition = field.content_disposition();
        let field_name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);

        match filename {
            Some(original_filename) => {
                if original_filename.is_empty() {
                    // Browsers send an unnamed empty part for an untouched file input.
                    while let Some(chunk) = field.next().await {
                        chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
                    }
                    continue;
                }

                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();
                rules.check_type(&content_type)?;
                let extension = mime_to_safe_extension(&content_type)
                    .ok_or_else(|| UploadError::DisallowedType(content_type.clone()))?;

                let mut data = BytesMut::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
                    rules.check_size((data.len() + chunk.len()) as u64)?;
                    data.extend_from_slice(&chunk);
                }

                form.push_file(UploadedFile {
                    field_name,
                    original_filename,
                    content_type,
                    extension,
                    bytes: data.to_vec(),
                });
            }
            None => {
                let mut data = BytesMut::new();
                while let Some(chunk) = field.next().await {
                    data.extend_from_slice(&chunk.map_err(|e| UploadError::Multipart(e.to_string()))?);
                }
                let value = String::from_utf8(data.to_vec())
                    .map_err(|_| UploadError::Multipart("Invalid UTF-8 in form field.".to_string()))?;
                form.push_text(&field_name, value);
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            field_name: name.to_string(),
            original_filename: "a.png".to_string(),
            content_type: "image/png".to_string(),
            extension: "png",
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn text_accessors() {
        let mut form = MultipartForm::default();
        form.push_text("title", "  Loom  ".to_string());
        form.push_text("image_urls", "https://a".to_string());
        form.push_text("image_urls", "https://b".to_string());
        form.push_text("blank", "   ".to_string());

        assert_eq!(form.text("title"), "  Loom  ");
        assert_eq!(form.optional_text("title"), Some("Loom"));
        assert_eq!(form.optional_text("blank"), None);
        assert_eq!(form.text("missing"), "");
        assert_eq!(form.texts("image_urls").len(), 2);
    }

    #[test]
    fn files_are_grouped_by_field() {
        let mut form = MultipartForm::default();
        form.push_file(file("images"));
        form.push_file(file("image"));
        form.push_file(file("images"));
        assert_eq!(form.files("images").count(), 2);
        assert_eq!(form.into_files("image").len(), 1);
    }
}
