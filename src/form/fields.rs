//! In-memory form fields

use bytes::Bytes;

/// A single form value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain text field
    Text(String),
    /// Binary part, optionally presented as a file
    Blob {
        data: Bytes,
        filename: Option<String>,
        content_type: Option<String>,
    },
}

impl FieldValue {
    /// Binary part without file metadata
    pub fn blob(data: impl Into<Bytes>) -> Self {
        Self::Blob {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    /// Binary part sent as a named file
    pub fn file(data: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self::Blob {
            data: data.into(),
            filename: Some(filename.into()),
            content_type: None,
        }
    }

    /// Set the part content type (no-op on text values)
    pub fn with_content_type(self, mime: impl Into<String>) -> Self {
        match self {
            Self::Blob { data, filename, .. } => Self::Blob {
                data,
                filename,
                content_type: Some(mime.into()),
            },
            text => text,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Blob { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn to_bytes(&self) -> Bytes {
        match self {
            Self::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Self::Blob { data, .. } => data.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::blob(value)
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        Self::blob(value)
    }
}

/// Flat field map that keeps insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    entries: Vec<(String, FieldValue)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Re-setting a name replaces its value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Chaining variant of [`FormFields::insert`]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormFields
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut fields = FormFields::new();
        fields.insert("b", "1");
        fields.insert("a", "2");
        fields.insert("b", "3");

        let names: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(fields.get("b"), Some(&FieldValue::Text("3".to_string())));
    }

    #[test]
    fn test_content_type_ignored_on_text() {
        let value = FieldValue::from("plain").with_content_type("image/png");
        assert_eq!(value, FieldValue::Text("plain".to_string()));
    }
}
