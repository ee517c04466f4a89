use super::ExportError;

/// Serialize any value as pretty-printed JSON
pub fn to_pretty_json<T: serde::Serialize>(data: &T) -> Result<String, ExportError> {
    serde_json::to_string_pretty(data).map_err(|e| ExportError::SerializationError(e.to_string()))
}
