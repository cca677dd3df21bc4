use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use idna::AsciiDenyList;

/// A validated domain name.
/// Names are stored lower-cased and without the trailing root dot, so comparisons are case-insensitive.
/// The root itself is stored as `"."`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct DomainName(Arc<str>);

impl DomainName {
    /// The root domain.
    pub fn root() -> Self {
        Self(Arc::from("."))
    }

    /// Create a new DomainName from an ASCII string, validating it according to RFC 1035.
    ///
    /// NOTE: This does not perform IDNA conversion, use [`DomainName::from_user`] for user input.
    pub fn from_ascii(s: impl AsRef<str>) -> anyhow::Result<Self> {
        let trimmed = s.as_ref().trim();

        if trimmed == "." || trimmed.is_empty() {
            return Ok(Self::root());
        }

        let name = trimmed.strip_suffix('.').unwrap_or(trimmed);

        if name.len() > 253 {
            anyhow::bail!("domain name too long: {}", name);
        }

        for label in name.split('.') {
            if label.is_empty() {
                anyhow::bail!("empty domain label in: {}", name);
            }

            if label.len() > 63 {
                anyhow::bail!("domain label too long: {}", label);
            }
        }

        Ok(Self(Arc::from(name.to_ascii_lowercase())))
    }

    /// Create a new DomainName from user input.
    /// Unicode names are converted to their ASCII (punycode) form.
    pub fn from_user(s: impl AsRef<str>) -> anyhow::Result<Self> {
        let input = s.as_ref().trim();

        if input == "." {
            return Ok(Self::root());
        }

        let name = input.strip_suffix('.').unwrap_or(input);

        let ascii = idna::domain_to_ascii_cow(name.as_bytes(), AsciiDenyList::URL)
            .map_err(|_| anyhow::anyhow!("invalid IDNA domain: {}", input))?;

        Self::from_ascii(ascii)
    }

    /// Whether this is the root domain.
    pub fn is_root(&self) -> bool {
        &*self.0 == "."
    }

    /// Get the string representation of the DomainName.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for DomainName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
