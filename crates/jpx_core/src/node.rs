//! Selected nodes paired with their normalized paths

use crate::path::NormalizedPath;
use serde::Serialize;
use serde_json::Value;

/// A selected value together with its location in the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node<'a> {
    pub path: NormalizedPath,
    pub value: &'a Value,
}

impl<'a> Node<'a> {
    pub fn new(path: NormalizedPath, value: &'a Value) -> Self {
        Self { path, value }
    }

    /// Detach from the document by cloning the value
    pub fn to_owned_value(&self) -> Value {
        self.value.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::path::PathElement;
    use serde_json::json;

    #[test]
    fn test_serialize_path_and_value() {
        let value = json!([1, 2]);
        let path: NormalizedPath = [PathElement::Name("a".to_string())].into_iter().collect();
        let node = Node::new(path, &value);
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({"path": "$['a']", "value": [1, 2]})
        );
    }
}
