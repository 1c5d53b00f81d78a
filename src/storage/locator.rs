use super::StorageError;
use url::Url;

/// A parsed blob address: the bucket holding the object plus the object's
/// full name within it.
///
/// Records store their blob locator as an opaque string in one of two forms:
///
/// - `gs://{bucket}/{object}`
/// - `https://firebasestorage.googleapis.com/v0/b/{bucket}/o/{object}?...`
///   (the download-URL form handed out at upload time; the object name is
///   percent-encoded in the path)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocator {
    pub bucket: String,
    pub object: String,
}

impl BlobLocator {
    pub fn parse(locator: &str) -> Result<Self, StorageError> {
        if let Some(rest) = locator.strip_prefix("gs://") {
            if let Some((bucket, object)) = rest.split_once('/') {
                if !bucket.is_empty() && !object.is_empty() {
                    return Ok(Self {
                        bucket: bucket.to_string(),
                        object: object.to_string(),
                    });
                }
            }
            return Err(StorageError::InvalidLocator(locator.to_string()));
        }

        let url =
            Url::parse(locator).map_err(|_| StorageError::InvalidLocator(locator.to_string()))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["v0", "b", bucket, "o", object] if !bucket.is_empty() && !object.is_empty() => {
                Ok(Self {
                    bucket: (*bucket).to_string(),
                    object: percent_decode(object),
                })
            }
            _ => Err(StorageError::InvalidLocator(locator.to_string())),
        }
    }
}

/// Decodes `%XX` escapes; invalid escapes pass through verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &input[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
