//! Blob addresses: `az://account/container/path` and the full HTTPS form.

use crate::{BlobError, Result};
use std::fmt;
use std::str::FromStr;

/// Scheme of the canonical short form.
pub const SCHEME: &str = "az";

/// DNS suffix of storage account endpoints.
pub const STORAGE_DOMAIN: &str = "blob.core.windows.net";

/// Points to a blob (or a prefix of blobs) in an Azure storage account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobAddress {
    /// Storage account name
    pub account: String,
    /// Container within the account
    pub container: String,
    /// Blob path within the container, empty for the container itself
    pub path: String,
}

impl BlobAddress {
    /// Parse `az://account/container[/path]` or
    /// `https://account.blob.core.windows.net/container[/path]`.
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_short(s)
            .or_else(|| Self::parse_url(s))
            .ok_or_else(|| BlobError::Parse(s.to_string()))
    }

    fn parse_short(s: &str) -> Option<Self> {
        let rest = s.strip_prefix(SCHEME)?.strip_prefix("://")?;
        let (account, rest) = rest.split_once('/')?;
        Self::from_parts(account, rest)
    }

    fn parse_url(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("https://")?;
        let (host, rest) = rest.split_once('/')?;
        let account = host.strip_suffix(STORAGE_DOMAIN)?.strip_suffix('.')?;
        Self::from_parts(account, rest)
    }

    /// `rest` is everything after the account's trailing slash.
    fn from_parts(account: &str, rest: &str) -> Option<Self> {
        let (container, path) = rest.split_once('/').unwrap_or((rest, ""));
        if account.is_empty() || container.is_empty() {
            return None;
        }
        // Line breaks never match in either form.
        if [account, container, path].iter().any(|p| p.contains('\n')) {
            return None;
        }
        Some(BlobAddress {
            account: account.to_string(),
            container: container.to_string(),
            path: path.to_string(),
        })
    }

    /// Final path segment, or the container name when the path is empty.
    ///
    /// Only used for display and naming in [`ObjectInfo`](crate::ObjectInfo).
    pub fn base(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            if self.path.is_empty() {
                return &self.container;
            }
            return "/";
        }
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Base URL of the storage account endpoint.
    pub fn account_url(&self) -> String {
        format!("https://{}.{}", self.account, STORAGE_DOMAIN)
    }
}

impl fmt::Display for BlobAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}://{}/{}", SCHEME, self.account, self.container)
        } else {
            write!(
                f,
                "{}://{}/{}/{}",
                SCHEME, self.account, self.container, self.path
            )
        }
    }
}

impl FromStr for BlobAddress {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self> {
        BlobAddress::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_form() {
        let addr = BlobAddress::parse("az://openaipublic/diffusion/dec-2021/v1.pdf").unwrap();
        assert_eq!(addr.account, "openaipublic");
        assert_eq!(addr.container, "diffusion");
        assert_eq!(addr.path, "dec-2021/v1.pdf");
    }

    #[test]
    fn test_parse_https_form() {
        let addr = BlobAddress::parse(
            "https://openaipublic.blob.core.windows.net/diffusion/dec-2021/upsample.pt",
        )
        .unwrap();
        assert_eq!(addr.account, "openaipublic");
        assert_eq!(addr.container, "diffusion");
        assert_eq!(addr.path, "dec-2021/upsample.pt");
        assert_eq!(
            addr.to_string(),
            "az://openaipublic/diffusion/dec-2021/upsample.pt"
        );
    }

    #[test]
    fn test_parse_container_only() {
        let addr = BlobAddress::parse("az://acct/cont").unwrap();
        assert_eq!(addr.path, "");
        assert_eq!(addr.to_string(), "az://acct/cont");

        let addr = BlobAddress::parse("https://acct.blob.core.windows.net/cont").unwrap();
        assert_eq!(addr.container, "cont");
        assert_eq!(addr.path, "");

        // A trailing slash after the container still addresses the container.
        let addr = BlobAddress::parse("az://acct/cont/").unwrap();
        assert_eq!(addr.path, "");
    }

    #[test]
    fn test_invalid_paths() {
        for s in [
            "",
            "az://",
            "az://acct",
            "az://acct/",
            "az:///cont/path",
            "s3://bucket/path",
            "http://acct.blob.core.windows.net/cont/x",
            "https://acct.example.com/cont/x",
            "https://blob.core.windows.net/cont/x",
            "https://acct.blob.core.windows.net",
            " az://acct/cont",
            "/local/path/file",
        ] {
            let err = BlobAddress::parse(s).unwrap_err();
            assert!(matches!(err, BlobError::Parse(_)), "{s:?} should not parse");
        }
    }

    #[test]
    fn test_round_trip() {
        for s in [
            "az://acct/cont",
            "az://acct/cont/file",
            "az://acct/cont/deep/nested/dir/file.tar.gz",
            "az://acct/cont/dir/",
            "az://my.acct/cont/with spaces/and%20escapes",
        ] {
            let addr: BlobAddress = s.parse().unwrap();
            assert_eq!(addr.to_string(), s);
            assert_eq!(BlobAddress::parse(&addr.to_string()).unwrap(), addr);
        }
    }

    #[test]
    fn test_base() {
        let addr = BlobAddress::parse("az://acct/cont/dir/file.bin").unwrap();
        assert_eq!(addr.base(), "file.bin");
        let addr = BlobAddress::parse("az://acct/cont/dir/sub/").unwrap();
        assert_eq!(addr.base(), "sub");
        let addr = BlobAddress::parse("az://acct/cont").unwrap();
        assert_eq!(addr.base(), "cont");
    }

    #[test]
    fn test_account_url() {
        let addr = BlobAddress::parse("az://acct/cont/dir/").unwrap();
        assert_eq!(addr.account_url(), "https://acct.blob.core.windows.net");
    }
}
