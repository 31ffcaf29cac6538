/// Entity models and document conversion
///
/// Models use the public JSON field names on the wire. Stored documents use
/// the same names except for the primary key, which is `_id` in storage and
/// `id` everywhere else.
///
/// # Models
///
/// - `user`: accounts and the [`user::Role`] hierarchy
/// - `project`: projects and the member-expanded [`project::ProjectDetail`]
/// - `task`: tasks and [`task::TaskStatus`]
///
/// # Example
///
/// ```
/// use taskboard_shared::models::{from_document, task::Task};
/// use serde_json::json;
///
/// let doc = json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}, "title": "Fix bug"});
/// let task: Task = from_document(doc.as_object().cloned().unwrap()).unwrap();
/// assert_eq!(task.id, "507f1f77bcf86cd799439011");
/// ```

pub mod project;
pub mod task;
pub mod user;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::identifier::public_id_value;
use crate::store::{Document, StoreError, ID_FIELD};

/// Public name of the primary key
pub const PUBLIC_ID_FIELD: &str = "id";

/// Rewrites a stored document into its public shape
///
/// `_id` becomes `id` (an `id` exposed by a pipeline wins), object ids are
/// rendered as hex, and embedded documents in array fields get the same
/// treatment.
pub fn normalize(mut doc: Document) -> Document {
    let stored = doc.remove(ID_FIELD);
    let exposed = doc.remove(PUBLIC_ID_FIELD);
    if let Some(id) = exposed.or(stored) {
        doc.insert(PUBLIC_ID_FIELD.to_string(), public_id_value(id));
    }

    for value in doc.values_mut() {
        if let Value::Array(items) = value {
            for item in items.iter_mut() {
                if let Value::Object(embedded) = item {
                    *embedded = normalize(std::mem::take(embedded));
                }
            }
        }
    }
    doc
}

/// Decodes a stored document into a model
///
/// # Errors
///
/// Returns `StoreError::Decode` if the document does not fit `T`.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(normalize(doc)))
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// Encodes a model for storage
///
/// An empty `id` is dropped so the store generates one.
///
/// # Errors
///
/// Returns `StoreError::Decode` if `value` does not serialize to an object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    let mut doc = match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => doc,
        Ok(other) => {
            return Err(StoreError::Decode(format!(
                "expected an object, found {other}"
            )))
        }
        Err(e) => return Err(StoreError::Decode(e.to_string())),
    };

    match doc.remove(PUBLIC_ID_FIELD) {
        Some(Value::String(id)) if id.is_empty() => {}
        Some(Value::Null) | None => {}
        Some(id) => {
            doc.insert(ID_FIELD.to_string(), id);
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_renames_and_renders_object_ids() {
        let d = normalize(doc(json!({
            "_id": {"$oid": "507f1f77bcf86cd799439011"},
            "members": [{"_id": "u1", "name": "Ada"}],
            "memberIds": ["u1"],
        })));
        assert_eq!(d["id"], "507f1f77bcf86cd799439011");
        assert!(!d.contains_key("_id"));
        assert_eq!(d["members"][0]["id"], "u1");
        assert_eq!(d["memberIds"], json!(["u1"]));
    }

    #[test]
    fn test_normalize_prefers_exposed_id() {
        let d = normalize(doc(json!({"_id": "a", "id": "a"})));
        assert_eq!(d["id"], "a");
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_to_document_moves_id() {
        #[derive(Serialize)]
        struct Thing {
            id: String,
            name: &'static str,
        }

        let d = to_document(&Thing {
            id: "0001".into(),
            name: "x",
        })
        .unwrap();
        assert_eq!(d["_id"], "0001");
        assert!(!d.contains_key("id"));

        let d = to_document(&Thing {
            id: String::new(),
            name: "x",
        })
        .unwrap();
        assert!(!d.contains_key("_id"));
    }
}
