use std::{fmt, str::FromStr};

use thiserror::Error;

use super::{VERSION_FIELD_LEN, VERSION_NAME_LEN};

/// Fixed-width firmware version field.
///
/// The field is stored exactly as received; trailing NUL padding and any
/// bytes after the first NUL are ignored when the version is rendered.
///
/// # Examples
///
/// ```
/// use coredump_recv::frame::FirmwareVersion;
///
/// let version: FirmwareVersion = "v2.1.2-rc1".parse().expect("fits in 20 bytes");
/// assert_eq!(version.text(), "v2.1.2-rc1");
/// assert_eq!(version.short_name(), "v2.1.2");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FirmwareVersion([u8; VERSION_FIELD_LEN]);

impl FirmwareVersion {
    /// Wrap the raw field bytes.
    #[must_use]
    pub const fn from_raw(bytes: [u8; VERSION_FIELD_LEN]) -> Self { Self(bytes) }

    /// Return the raw field bytes, padding included.
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; VERSION_FIELD_LEN] { &self.0 }

    /// Version text up to the first NUL, lossily decoded as UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(VERSION_FIELD_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    /// Filesystem-safe name built from the first six significant characters.
    ///
    /// Characters outside `[A-Za-z0-9._-]` become `_`; an empty version
    /// renders as `unknown`.
    #[must_use]
    pub fn short_name(&self) -> String {
        let name: String = self
            .text()
            .chars()
            .take(VERSION_NAME_LEN)
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name.is_empty() {
            "unknown".to_owned()
        } else {
            name
        }
    }
}

impl fmt::Debug for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FirmwareVersion").field(&self.text()).finish()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text()) }
}

/// Version text does not fit the 20-byte header field.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("firmware version is {len} bytes; the header field holds {VERSION_FIELD_LEN}")]
pub struct VersionTooLong {
    /// Length of the rejected text in bytes.
    pub len: usize,
}

impl FromStr for FirmwareVersion {
    type Err = VersionTooLong;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() > VERSION_FIELD_LEN {
            return Err(VersionTooLong { len: bytes.len() });
        }
        let mut field = [0u8; VERSION_FIELD_LEN];
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(field))
    }
}
