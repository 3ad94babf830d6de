//! Response view: what a caller gets to see of an object.

use serde_json::Value;

use super::managed::ManagedObject;
use crate::schema::ObjectType;

/// Renders objects for responses, dropping `drop_from_response` fields.
pub struct ResponseView;

impl ResponseView {
    /// Flattened object without hidden fields.
    ///
    /// A hidden field named after a system attribute hides that attribute.
    pub fn render(object_type: &ObjectType, object: &ManagedObject) -> Value {
        let mut map = object.to_json();
        for name in object_type.hidden_fields() {
            map.remove(name);
        }
        Value::Object(map)
    }
}
