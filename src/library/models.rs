use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One uploaded PDF ("book") as stored under the `Books` collection.
///
/// Every field defaults when absent, mirroring how records were written by
/// the original upload flow. `views_count` is monotonically non-decreasing
/// and mutated only by `LibraryService::increment_view_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    /// Opaque blob locator for the PDF itself.
    pub url: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    pub views_count: i64,
}

/// One category under the `Categories` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: String,
    /// Display name.
    pub category: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Creator's user id.
    pub uid: String,
}

/// The text a record is matched against when filtering.
pub trait Searchable {
    fn search_text(&self) -> &str;
}

impl Searchable for BookRecord {
    fn search_text(&self) -> &str {
        &self.title
    }
}

impl Searchable for CategoryRecord {
    fn search_text(&self) -> &str {
        &self.category
    }
}

/// Decodes every child of a collection snapshot into records, in backend
/// key order.
///
/// Children that fail to decode are skipped with a warning rather than
/// failing the whole list; a malformed record never takes the rest of the
/// collection down with it.
pub fn decode_children<T: DeserializeOwned>(snapshot: &Value) -> Vec<T> {
    let Some(children) = snapshot.as_object() else {
        return Vec::new();
    };

    let mut records = Vec::with_capacity(children.len());
    for (key, child) in children {
        match serde_json::from_value(child.clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping child that failed to decode");
            }
        }
    }
    records
}
