//! BIP32-style derivation paths.
//!
//! A path is an ordered list of `(index, hardened)` pairs. The
//! canonical string form is `m/44'/60'/0'/0/0`; a trailing `'` (or
//! `h`) marks a hardened step. The leading `m` segment is optional
//! and ignored for equality. Indices are stored as raw 31-bit values;
//! the 2^31 hardened offset is applied by the BIP32 layer when the
//! canonical string is handed to the derivation engine.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::KeystoreError;

/// Largest valid child index: indices occupy 31 bits.
pub const MAX_INDEX: u32 = (1 << 31) - 1;

/// One step in a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index {
    value: u32,
    hardened: bool,
}

impl Index {
    /// Creates an index, rejecting values that do not fit in 31 bits.
    pub fn new(value: u32, hardened: bool) -> Result<Self, KeystoreError> {
        if value > MAX_INDEX {
            return Err(KeystoreError::MalformedPath(format!(
                "index {value} exceeds 31 bits"
            )));
        }
        Ok(Self { value, hardened })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// An ordered sequence of child indices selecting one key in an HD
/// hierarchy.
///
/// Equality and hashing compare only the index sequence, so
/// `m/44'/60'/0'/0/0` and `44'/60'/0'/0/0` are the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    indices: Vec<Index>,
}

impl DerivationPath {
    pub fn new(indices: Vec<Index>) -> Self {
        Self { indices }
    }

    /// Builds the standard 5-level BIP44 path
    /// `m/purpose'/coin_type'/account'/change/address_index`.
    pub fn bip44(
        purpose: u32,
        coin_type: u32,
        account: u32,
        change: u32,
        address_index: u32,
    ) -> Result<Self, KeystoreError> {
        Ok(Self::new(vec![
            Index::new(purpose, true)?,
            Index::new(coin_type, true)?,
            Index::new(account, true)?,
            Index::new(change, false)?,
            Index::new(address_index, false)?,
        ]))
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    /// First component of the 5-level shape, if present.
    pub fn purpose(&self) -> Option<Index> {
        self.indices.first().copied()
    }

    pub fn coin_type(&self) -> Option<Index> {
        self.indices.get(1).copied()
    }

    pub fn account(&self) -> Option<Index> {
        self.indices.get(2).copied()
    }

    pub fn change(&self) -> Option<Index> {
        self.indices.get(3).copied()
    }

    pub fn address_index(&self) -> Option<Index> {
        self.indices.get(4).copied()
    }
}

impl FromStr for DerivationPath {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('/').peekable();
        if segments.peek() == Some(&"m") {
            segments.next();
        }
        let mut indices = Vec::new();
        for segment in segments {
            let (digits, hardened) = match segment.strip_suffix('\'') {
                Some(rest) => (rest, true),
                None => match segment.strip_suffix('h') {
                    Some(rest) => (rest, true),
                    None => (segment, false),
                },
            };
            let value: u32 = digits.parse().map_err(|_| {
                KeystoreError::MalformedPath(format!("invalid path component: {segment:?}"))
            })?;
            indices.push(Index::new(value, hardened)?);
        }
        Ok(Self::new(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.indices {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH_PATH: &str = "m/44'/60'/0'/0/0";

    #[test]
    fn test_parse_canonical() {
        let path: DerivationPath = ETH_PATH.parse().unwrap();
        assert_eq!(path.indices().len(), 5);
        assert_eq!(path.purpose(), Some(Index::new(44, true).unwrap()));
        assert_eq!(path.coin_type(), Some(Index::new(60, true).unwrap()));
        assert_eq!(path.account(), Some(Index::new(0, true).unwrap()));
        assert_eq!(path.change(), Some(Index::new(0, false).unwrap()));
        assert_eq!(path.address_index(), Some(Index::new(0, false).unwrap()));
    }

    #[test]
    fn test_leading_m_ignored_for_equality() {
        let with_m: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        let without_m: DerivationPath = "44'/60'/0'/0/0".parse().unwrap();
        assert_eq!(with_m, without_m);
    }

    #[test]
    fn test_h_suffix_marks_hardened() {
        let quote: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        let h: DerivationPath = "m/44h/60h/0h/0/0".parse().unwrap();
        assert_eq!(quote, h);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            "a/b/c".parse::<DerivationPath>(),
            Err(KeystoreError::MalformedPath(_))
        ));
        assert!(matches!(
            "m/44'/60''/".parse::<DerivationPath>(),
            Err(KeystoreError::MalformedPath(_))
        ));
        // Out of range: 2^31 does not fit in 31 bits.
        assert!(matches!(
            "m/2147483648".parse::<DerivationPath>(),
            Err(KeystoreError::MalformedPath(_))
        ));
        assert!("m/2147483647".parse::<DerivationPath>().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let path = DerivationPath::bip44(44, 60, 0, 0, 0).unwrap();
        assert_eq!(path.to_string(), ETH_PATH);
        assert_eq!(ETH_PATH.parse::<DerivationPath>().unwrap(), path);
    }

    #[test]
    fn test_longer_than_five_levels() {
        let path: DerivationPath = "m/44'/60'/0'/0/0/7".parse().unwrap();
        assert_eq!(path.indices().len(), 6);
        assert_eq!(path.address_index(), Some(Index::new(0, false).unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let path: DerivationPath = ETH_PATH.parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, format!("\"{ETH_PATH}\""));
        let back: DerivationPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
