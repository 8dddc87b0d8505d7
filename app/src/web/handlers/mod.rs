// shopfront_app/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod auth_handlers;
pub mod catalog_handlers;
pub mod checkout_handlers;
pub mod order_handlers;
pub mod realtime_handlers;
pub mod service_handlers;
pub mod storage_handlers;

use serde::Deserialize;
use shopfront::Upload;

use crate::errors::AppError;

/// A file sent inline in a JSON body.
#[derive(Deserialize)]
pub struct UploadPayload {
  pub file_name: String,
  #[serde(default = "default_content_type")]
  pub content_type: String,
  pub data_hex: String,
}

fn default_content_type() -> String {
  "application/octet-stream".to_string()
}

impl std::fmt::Debug for UploadPayload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UploadPayload")
      .field("file_name", &self.file_name)
      .field("content_type", &self.content_type)
      .field("hex_len", &self.data_hex.len())
      .finish()
  }
}

impl UploadPayload {
  pub fn into_upload(self) -> Result<Upload, AppError> {
    let bytes = hex::decode(self.data_hex.trim())
      .map_err(|e| AppError::Validation(format!("File '{}' is not valid hex: {}", self.file_name, e)))?;
    if bytes.is_empty() {
      return Err(AppError::Validation(format!("File '{}' is empty.", self.file_name)));
    }
    Ok(Upload::new(self.file_name, self.content_type, bytes))
  }
}

pub(crate) fn decode_optional(file: Option<UploadPayload>) -> Result<Option<Upload>, AppError> {
  file.map(UploadPayload::into_upload).transpose()
}
