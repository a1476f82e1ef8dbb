//! On-disk package storage for the embedded registry
//!
//! Layout: `<root>/<name>/package.json` plus the tarballs next to it. Scoped
//! packages live under `<root>/@scope/<name>/`.

use crate::http::errors::{HttpError, HttpResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::info;

static PACKAGE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(?:@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9][a-z0-9._~-]*$")
        .expect("Invalid package name regex")
});

const DOCUMENT_FILE: &str = "package.json";

/// Check an npm package name; rejects anything that could escape the storage root
pub fn validate_package_name(name: &str) -> HttpResult<()> {
    if name.len() > 214 || !PACKAGE_NAME_REGEX.is_match(name) {
        return Err(HttpError::BadRequest(format!(
            "invalid package name '{}'",
            name
        )));
    }
    Ok(())
}

fn validate_file_name(file: &str) -> HttpResult<()> {
    if file.is_empty()
        || file.starts_with('.')
        || file.contains('/')
        || file.contains('\\')
        || file == DOCUMENT_FILE
    {
        return Err(HttpError::BadRequest(format!("invalid file name '{}'", file)));
    }
    Ok(())
}

/// Summary of an accepted publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub versions: Vec<String>,
    pub files: usize,
}

#[derive(Debug)]
pub struct PackageStorage {
    root: PathBuf,
    // Serializes read-modify-write of package documents
    write_lock: Mutex<()>,
}

impl PackageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        // Validated names use '/' only as the scope separator
        name.split('/').fold(self.root.clone(), |dir, part| dir.join(part))
    }

    /// Stored package document, without attachments
    pub async fn read_document(&self, name: &str) -> HttpResult<Value> {
        validate_package_name(name)?;
        let path = self.package_dir(name).join(DOCUMENT_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HttpError::NotFound(
                format!("package '{}' not found", name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw tarball bytes
    pub async fn read_tarball(&self, name: &str, file: &str) -> HttpResult<Vec<u8>> {
        validate_package_name(name)?;
        validate_file_name(file)?;
        let path = self.package_dir(name).join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HttpError::NotFound(
                format!("file '{}' not found for package '{}'", file, name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge the versions of an npm publish document into storage.
    ///
    /// Already published versions are rejected; attachments are decoded and
    /// written beside the package document.
    pub async fn publish(
        &self,
        name: &str,
        mut incoming: Value,
        user: &str,
    ) -> HttpResult<PublishOutcome> {
        validate_package_name(name)?;

        let document_name = incoming.get("name").and_then(Value::as_str);
        if document_name != Some(name) {
            return Err(HttpError::BadRequest(format!(
                "document name {:?} does not match package '{}'",
                document_name, name
            )));
        }

        let incoming_obj = incoming.as_object_mut().ok_or_else(|| {
            HttpError::BadRequest("publish body must be an object".to_string())
        })?;
        let new_versions = match incoming_obj.remove("versions") {
            Some(Value::Object(versions)) if !versions.is_empty() => versions,
            _ => {
                return Err(HttpError::BadRequest(
                    "publish body has no versions".to_string(),
                ))
            }
        };
        let attachments = match incoming_obj.remove("_attachments") {
            Some(Value::Object(attachments)) => attachments,
            None => Map::new(),
            Some(_) => {
                return Err(HttpError::BadRequest(
                    "_attachments must be an object".to_string(),
                ))
            }
        };
        let incoming_tags = match incoming_obj.remove("dist-tags") {
            Some(Value::Object(tags)) => tags,
            _ => Map::new(),
        };

        let decoded = decode_attachments(&attachments)?;

        let _guard = self.write_lock.lock().await;
        let dir = self.package_dir(name);
        let document_path = dir.join(DOCUMENT_FILE);

        let mut document = match tokio::fs::read_to_string(&document_path).await {
            Ok(content) => serde_json::from_str::<Value>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => new_document(name),
            Err(e) => return Err(e.into()),
        };

        let now = chrono::Utc::now().to_rfc3339();
        let document_obj = document.as_object_mut().ok_or_else(|| {
            HttpError::InternalServerError("corrupt package document".to_string())
        })?;

        let mut published = Vec::new();
        let mut versions = take_object(document_obj, "versions");
        for (version, manifest) in new_versions {
            if versions.contains_key(&version) {
                return Err(HttpError::Conflict(format!(
                    "cannot publish over the previously published version {} of {}",
                    version, name
                )));
            }
            versions.insert(version.clone(), manifest);
            published.push(version);
        }
        document_obj.insert("versions".to_string(), Value::Object(versions));

        let mut tags = take_object(document_obj, "dist-tags");
        tags.extend(incoming_tags);
        if !tags.contains_key("latest") {
            if let Some(last) = published.last() {
                tags.insert("latest".to_string(), Value::String(last.clone()));
            }
        }
        document_obj.insert("dist-tags".to_string(), Value::Object(tags));

        let mut time = take_object(document_obj, "time");
        time.entry("created".to_string())
            .or_insert_with(|| Value::String(now.clone()));
        time.insert("modified".to_string(), Value::String(now.clone()));
        for version in &published {
            time.insert(version.clone(), Value::String(now.clone()));
        }
        document_obj.insert("time".to_string(), Value::Object(time));
        for key in ["description", "readme", "maintainers"] {
            if let Some(value) = incoming_obj.remove(key) {
                document_obj.insert(key.to_string(), value);
            }
        }

        tokio::fs::create_dir_all(&dir).await?;
        for (file, bytes) in &decoded {
            tokio::fs::write(dir.join(file), bytes).await?;
        }
        tokio::fs::write(&document_path, serde_json::to_vec_pretty(&document)?).await?;

        info!(
            "{} published {}@{} ({} files)",
            user,
            name,
            published.join(","),
            decoded.len()
        );
        Ok(PublishOutcome {
            versions: published,
            files: decoded.len(),
        })
    }
}

fn new_document(name: &str) -> Value {
    serde_json::json!({
        "_id": name,
        "name": name,
        "versions": {},
        "dist-tags": {},
        "time": {},
    })
}

/// Remove `key` from `object`; anything but an object yields an empty map
fn take_object(object: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match object.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn decode_attachments(attachments: &Map<String, Value>) -> HttpResult<Vec<(String, Vec<u8>)>> {
    let mut decoded = Vec::with_capacity(attachments.len());
    for (file, attachment) in attachments {
        validate_file_name(file)?;
        let data = attachment
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HttpError::BadRequest(format!("attachment '{}' has no data", file))
            })?;
        let bytes = STANDARD.decode(data).map_err(|e| {
            HttpError::BadRequest(format!("attachment '{}' is not base64: {}", file, e))
        })?;
        if let Some(length) = attachment.get("length").and_then(Value::as_u64) {
            if length != bytes.len() as u64 {
                return Err(HttpError::BadRequest(format!(
                    "attachment '{}' length mismatch ({} != {})",
                    file,
                    length,
                    bytes.len()
                )));
            }
        }
        decoded.push((file.clone(), bytes));
    }
    Ok(decoded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn publish_body(name: &str, version: &str, tarball: &[u8]) -> Value {
        let file = format!("{}-{}.tgz", name.rsplit('/').next().unwrap(), version);
        json!({
            "_id": name,
            "name": name,
            "description": "test package",
            "dist-tags": { "latest": version },
            "versions": {
                version: { "name": name, "version": version }
            },
            "_attachments": {
                file: {
                    "content_type": "application/octet-stream",
                    "data": STANDARD.encode(tarball),
                    "length": tarball.len()
                }
            }
        })
    }

    #[test]
    fn test_package_names() {
        assert!(validate_package_name("my-private-package").is_ok());
        assert!(validate_package_name("@acme/widgets").is_ok());
        assert!(validate_package_name("..").is_err());
        assert!(validate_package_name("@acme/../x").is_err());
        assert!(validate_package_name("a/b").is_err());
        assert!(validate_package_name("Upper").is_err());
    }

    #[tokio::test]
    async fn test_publish_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PackageStorage::new(temp_dir.path());

        let outcome = storage
            .publish(
                "my-private-package",
                publish_body("my-private-package", "1.0.0", b"tgz"),
                "u1",
            )
            .await
            .unwrap();
        assert_eq!(outcome.versions, vec!["1.0.0".to_string()]);
        assert_eq!(outcome.files, 1);

        let document = storage.read_document("my-private-package").await.unwrap();
        assert_eq!(document["dist-tags"]["latest"], "1.0.0");
        assert!(document["versions"]["1.0.0"].is_object());
        assert!(document.get("_attachments").is_none());

        let tarball = storage
            .read_tarball("my-private-package", "my-private-package-1.0.0.tgz")
            .await
            .unwrap();
        assert_eq!(tarball, b"tgz");
    }

    #[tokio::test]
    async fn test_second_version_merges_and_duplicate_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PackageStorage::new(temp_dir.path());

        storage
            .publish("@acme/widgets", publish_body("@acme/widgets", "1.0.0", b"a"), "u1")
            .await
            .unwrap();
        storage
            .publish("@acme/widgets", publish_body("@acme/widgets", "1.1.0", b"b"), "u1")
            .await
            .unwrap();

        let document = storage.read_document("@acme/widgets").await.unwrap();
        assert!(document["versions"]["1.0.0"].is_object());
        assert!(document["versions"]["1.1.0"].is_object());
        assert_eq!(document["dist-tags"]["latest"], "1.1.0");
        assert!(temp_dir.path().join("@acme/widgets/widgets-1.1.0.tgz").is_file());

        let err = storage
            .publish("@acme/widgets", publish_body("@acme/widgets", "1.0.0", b"c"), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stored_document_with_non_object_sections() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PackageStorage::new(temp_dir.path());
        let dir = temp_dir.path().join("pkg");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(DOCUMENT_FILE),
            r#"{"name": "pkg", "versions": "oops", "dist-tags": [1], "time": null}"#,
        )
        .unwrap();

        let outcome = storage
            .publish("pkg", publish_body("pkg", "2.0.0", b"z"), "u1")
            .await
            .unwrap();
        assert_eq!(outcome.versions, vec!["2.0.0".to_string()]);

        let document = storage.read_document("pkg").await.unwrap();
        assert!(document["versions"]["2.0.0"].is_object());
        assert_eq!(document["dist-tags"]["latest"], "2.0.0");
        assert!(document["time"]["2.0.0"].is_string());
    }

    #[tokio::test]
    async fn test_rejects_malformed_documents() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PackageStorage::new(temp_dir.path());

        let mismatched = publish_body("other", "1.0.0", b"x");
        assert!(matches!(
            storage.publish("pkg", mismatched, "u1").await,
            Err(HttpError::BadRequest(_))
        ));

        let no_versions = json!({ "name": "pkg", "versions": {} });
        assert!(storage.publish("pkg", no_versions, "u1").await.is_err());

        let mut bad_length = publish_body("pkg", "1.0.0", b"abc");
        bad_length["_attachments"]["pkg-1.0.0.tgz"]["length"] = json!(99);
        assert!(storage.publish("pkg", bad_length, "u1").await.is_err());

        assert!(matches!(
            storage.read_document("pkg").await,
            Err(HttpError::NotFound(_))
        ));
    }
}
