use crate::error::{Error, Result};

/// Default key expression prefix for everything the bridge publishes.
pub const KEY_PREFIX: &str = "adlar";

/// Builder for the bridge's key expressions.
///
/// Per-device metadata lives under `<prefix>/<entry_id>/@/<topic>`.
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl Default for KeyExprBuilder {
    fn default() -> Self {
        Self::new(KEY_PREFIX)
    }
}

impl KeyExprBuilder {
    /// Create a builder with a custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Build the device descriptor key (`<prefix>/<entry_id>/@/device`).
    ///
    /// # Example
    /// ```
    /// use adlar_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::default();
    /// let key = builder.device_key("hp1").unwrap();
    /// assert_eq!(key, "adlar/hp1/@/device");
    /// ```
    pub fn device_key(&self, entry_id: &str) -> Result<String> {
        self.meta_key(entry_id, "device")
    }

    /// Build the per-device status key (`<prefix>/<entry_id>/@/status`).
    pub fn device_status_key(&self, entry_id: &str) -> Result<String> {
        self.meta_key(entry_id, "status")
    }

    /// Build the bridge-wide status key (`<prefix>/@/status`).
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    fn meta_key(&self, entry_id: &str, topic: &str) -> Result<String> {
        check_chunk(entry_id)?;
        Ok(format!("{}/{}/@/{}", self.prefix, entry_id, topic))
    }
}

/// Reject chunks that would change the shape of a key expression.
fn check_chunk(chunk: &str) -> Result<()> {
    if chunk.is_empty() {
        return Err(Error::KeyExpr("empty key chunk".to_string()));
    }
    if chunk.contains(['/', '*', '$', '?', '#', '@']) {
        return Err(Error::KeyExpr(format!(
            "'{}' contains a reserved character",
            chunk
        )));
    }
    Ok(())
}
