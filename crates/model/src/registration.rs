use serde::{Deserialize, Serialize};

/// Notification permission status for the current agent session.
///
/// The permission collaborator sets this once per launch. Registration
/// proceeds only from [PermissionState::Granted].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

/// Notification authorization options requested from the permission
/// service.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PermissionOptions {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Invalid platform token hex encoding")]
pub struct PlatformTokenParseError;

/// Device token issued by the platform push transport.
///
/// Opaque bytes. The wire representation is lowercase hex.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct PlatformToken {
    token: Vec<u8>,
}

impl PlatformToken {
    pub fn new(token: Vec<u8>) -> Self {
        Self { token }
    }

    pub fn from_hex(token: &str) -> Result<Self, PlatformTokenParseError> {
        let token =
            base16ct::mixed::decode_vec(token).map_err(|_| PlatformTokenParseError)?;
        Ok(Self { token })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.token
    }

    pub fn to_hex(&self) -> String {
        base16ct::lower::encode_string(&self.token)
    }
}

/// Messaging backend token targeting this device for push delivery.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MessagingToken {
    token: String,
}

impl MessagingToken {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use crate::{PermissionState, PlatformToken};

    #[test]
    fn platform_token_hex_encoding_is_lowercase() {
        let token = PlatformToken::new(vec![0xab, 0x01, 0xff]);
        assert_eq!(token.to_hex(), "ab01ff");
    }

    #[test]
    fn platform_token_parsing_accepts_uppercase_hex() {
        let token = PlatformToken::from_hex("AB01FF").unwrap();
        assert_eq!(token.as_bytes(), &[0xab, 0x01, 0xff]);
    }

    #[test]
    fn platform_token_parsing_rejects_invalid_hex() {
        assert!(PlatformToken::from_hex("not hex").is_err());
        assert!(PlatformToken::from_hex("abc").is_err());
    }

    #[test]
    fn permission_state_default_is_unknown() {
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
    }

    #[test]
    fn permission_state_serializes_as_snake_case() {
        let value = serde_json::to_string(&PermissionState::Granted).unwrap();
        assert_eq!(value, "\"granted\"");
        let parsed: PermissionState = serde_json::from_str("\"denied\"").unwrap();
        assert_eq!(parsed, PermissionState::Denied);
    }
}
