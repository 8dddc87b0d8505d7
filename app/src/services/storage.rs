// shopfront_app/src/services/storage.rs

//! Object store on the local filesystem: `<root>/<bucket>/<key>`, served
//! back under `<public_base_url>/storage/<bucket>/<key>`.

use async_trait::async_trait;
use shopfront::backend::BUCKETS;
use shopfront::{ObjectStore, ShopError, ShopResult, Upload};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{event, instrument, Level};

pub struct DiskObjectStore {
  root: PathBuf,
  public_base_url: String,
}

/// Content type served for a stored key, by extension.
pub fn content_type_for(key: &str) -> &'static str {
  let ext = Path::new(key)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase());
  match ext.as_deref() {
    Some("png") => "image/png",
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("webp") => "image/webp",
    Some("gif") => "image/gif",
    Some("heic") => "image/heic",
    _ => "application/octet-stream",
  }
}

impl DiskObjectStore {
  pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
    Self {
      root: root.into(),
      public_base_url: public_base_url.into(),
    }
  }

  /// Resolves `bucket/key` to a path under the root. Unknown buckets and
  /// keys that could leave the bucket directory are refused.
  fn object_path(&self, bucket: &str, key: &str) -> ShopResult<PathBuf> {
    if !BUCKETS.contains(&bucket) {
      return Err(ShopError::not_found("bucket", bucket));
    }
    let valid = !key.is_empty()
      && !key.starts_with('.')
      && key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
      return Err(ShopError::Validation(format!("invalid object key '{}'", key)));
    }
    Ok(self.root.join(bucket).join(key))
  }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
  #[instrument(name = "DiskObjectStore::upload", skip(self, file), fields(len = file.bytes.len()), err(Display))]
  async fn upload(&self, bucket: &str, key: &str, file: Upload) -> ShopResult<String> {
    let path = self
      .object_path(bucket, key)
      .map_err(|e| ShopError::upload(bucket, e.to_string()))?;
    let dir = self.root.join(bucket);
    tokio::fs::create_dir_all(&dir)
      .await
      .map_err(|e| ShopError::upload(bucket, e.to_string()))?;

    let mut out = tokio::fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .await
      .map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => ShopError::upload(bucket, format!("object '{}' already exists", key)),
        _ => ShopError::upload(bucket, e.to_string()),
      })?;
    out
      .write_all(&file.bytes)
      .await
      .map_err(|e| ShopError::upload(bucket, e.to_string()))?;
    out.flush().await.map_err(|e| ShopError::upload(bucket, e.to_string()))?;
    Ok(self.public_url(bucket, key))
  }

  async fn download(&self, bucket: &str, key: &str) -> ShopResult<Upload> {
    let path = self.object_path(bucket, key)?;
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(Upload::new(key, content_type_for(key), bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => Err(ShopError::not_found("object", format!("{}/{}", bucket, key))),
      Err(e) => Err(ShopError::Store { source: e.into() }),
    }
  }

  async fn remove(&self, bucket: &str, keys: &[String]) -> ShopResult<()> {
    for key in keys {
      let path = self.object_path(bucket, key)?;
      match tokio::fs::remove_file(&path).await {
        Ok(()) => event!(Level::DEBUG, bucket, %key, "Object removed."),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(ShopError::Store { source: e.into() }),
      }
    }
    Ok(())
  }

  fn public_url(&self, bucket: &str, key: &str) -> String {
    format!("{}/storage/{}/{}", self.public_base_url, bucket, key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use shopfront::backend::PAYMENT_PROOFS_BUCKET;

  fn temp_store() -> (DiskObjectStore, PathBuf) {
    let root = std::env::temp_dir().join(format!("shopfront-objects-{}", uuid::Uuid::new_v4()));
    (DiskObjectStore::new(&root, "http://localhost:8080"), root)
  }

  #[tokio::test]
  async fn upload_download_remove() {
    let (store, root) = temp_store();
    let file = Upload::new("shot.PNG", "image/png", vec![1, 2, 3]);

    let url = store.upload(PAYMENT_PROOFS_BUCKET, "proof_1_abc.png", file).await.unwrap();
    assert_eq!(url, "http://localhost:8080/storage/payment-proofs/proof_1_abc.png");
    assert_eq!(store.key_from_url(PAYMENT_PROOFS_BUCKET, &url).as_deref(), Some("proof_1_abc.png"));

    let back = store.download(PAYMENT_PROOFS_BUCKET, "proof_1_abc.png").await.unwrap();
    assert_eq!(back.bytes, vec![1, 2, 3]);
    assert_eq!(back.content_type, "image/png");

    store
      .remove(PAYMENT_PROOFS_BUCKET, &["proof_1_abc.png".to_string()])
      .await
      .unwrap();
    assert!(matches!(
      store.download(PAYMENT_PROOFS_BUCKET, "proof_1_abc.png").await,
      Err(ShopError::NotFound { .. })
    ));
    // Removing twice is fine.
    store
      .remove(PAYMENT_PROOFS_BUCKET, &["proof_1_abc.png".to_string()])
      .await
      .unwrap();

    let _ = std::fs::remove_dir_all(root);
  }

  #[tokio::test]
  async fn existing_keys_are_not_overwritten() {
    let (store, root) = temp_store();
    let file = Upload::new("a.jpg", "image/jpeg", vec![9]);
    store.upload("banners", "a.jpg", file.clone()).await.unwrap();
    let err = store.upload("banners", "a.jpg", file).await.unwrap_err();
    assert!(matches!(err, ShopError::Upload { .. }));
    let _ = std::fs::remove_dir_all(root);
  }

  #[tokio::test]
  async fn traversal_and_unknown_buckets_are_refused() {
    let (store, _root) = temp_store();
    let file = Upload::new("a.jpg", "image/jpeg", vec![9]);
    assert!(store.upload("banners", "../escape.jpg", file.clone()).await.is_err());
    assert!(store.upload("secrets", "a.jpg", file).await.is_err());
    assert!(matches!(
      store.download("banners", "..").await,
      Err(ShopError::Validation(_))
    ));
  }
}
