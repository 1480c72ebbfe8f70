use std::{fmt, str::FromStr};

use thiserror::Error;

use super::DEVICE_ID_LEN;

/// Six-byte hardware identifier carried in every frame header.
///
/// Displays as colon-separated lowercase hex (`aa:bb:cc:dd:ee:ff`).
///
/// # Examples
///
/// ```
/// use coredump_recv::frame::DeviceId;
///
/// let id: DeviceId = "aa:bb:cc:dd:ee:ff".parse().expect("valid identifier");
/// assert_eq!(id.to_string(), "aa:bb:cc:dd:ee:ff");
/// assert_eq!(id.to_hex(), "aabbccddeeff");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId([u8; DEVICE_ID_LEN]);

impl DeviceId {
    /// Wrap raw identifier bytes.
    #[must_use]
    pub const fn new(bytes: [u8; DEVICE_ID_LEN]) -> Self { Self(bytes) }

    /// Return the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DEVICE_ID_LEN] { &self.0 }

    /// Render the identifier as twelve hex digits without separators.
    #[must_use]
    pub fn to_hex(&self) -> String {
        use fmt::Write as _;

        self.0
            .iter()
            .fold(String::with_capacity(DEVICE_ID_LEN * 2), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }
}

impl From<[u8; DEVICE_ID_LEN]> for DeviceId {
    fn from(bytes: [u8; DEVICE_ID_LEN]) -> Self { Self(bytes) }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Error returned when parsing a [`DeviceId`] from text fails.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid device identifier {input:?}: expected six hex octets")]
pub struct ParseDeviceIdError {
    input: String,
}

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDeviceIdError {
            input: s.to_owned(),
        };
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != DEVICE_ID_LEN * 2 || !digits.is_ascii() {
            return Err(err());
        }

        let mut bytes = [0u8; DEVICE_ID_LEN];
        for (slot, pair) in bytes.iter_mut().zip(digits.as_bytes().chunks_exact(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| err())?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}
