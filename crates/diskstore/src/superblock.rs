//! The store superblock: one distinguished record identifying the file.

use crate::error::StoreError;
use std::ffi::CStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key of the superblock record. Consumers never address it; cursor
/// traversal skips it.
pub const SUPERBLOCK_KEY: &str = "__superblock__";

/// Magic string opening every store file's superblock.
pub const MAGIC: &str = "ringstore";

/// On-disk format version this build reads and writes.
pub const VERSION: u32 = 1;

/// Identity of a store file: magic, version, creation time and the
/// originating host and operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version: u32,
    /// Creation time, epoch seconds.
    pub created: u64,
    /// OS name (`uname` sysname).
    pub os: String,
    /// Host name (`uname` nodename).
    pub node: String,
    /// OS release.
    pub release: String,
    /// OS version string.
    pub os_version: String,
    /// Machine architecture.
    pub machine: String,
}

impl Superblock {
    /// Builds a fresh superblock for this host, stamped now.
    pub fn for_this_host() -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let u = uname_fields();
        Self {
            version: VERSION,
            created,
            os: u.0,
            node: u.1,
            release: u.2,
            os_version: u.3,
            machine: u.4,
        }
    }

    /// Serializes to the on-disk `|`-delimited record, null-terminated.
    pub fn encode(&self) -> Vec<u8> {
        let text = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            MAGIC,
            self.version,
            self.created,
            self.os,
            self.node,
            self.release,
            self.os_version,
            self.machine
        );
        let mut bytes = text.into_bytes();
        bytes.push(0);
        bytes
    }

    /// Parses an on-disk superblock record, checking magic and version.
    pub fn decode(path: &str, value: &[u8]) -> Result<Self, StoreError> {
        let text = value.strip_suffix(&[0]).unwrap_or(value);
        let text =
            std::str::from_utf8(text).map_err(|_| StoreError::BadMagic(path.to_string()))?;
        let mut fields = text.split('|');

        let magic = fields.next().unwrap_or("");
        if magic != MAGIC {
            return Err(StoreError::BadMagic(path.to_string()));
        }
        let version: u32 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| StoreError::Corrupt("superblock version".to_string()))?;
        if version != VERSION {
            return Err(StoreError::VersionMismatch {
                path: path.to_string(),
                found: version,
                want: VERSION,
            });
        }
        let created: u64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| StoreError::Corrupt("superblock creation time".to_string()))?;
        let mut take = || fields.next().unwrap_or("").to_string();
        Ok(Self {
            version,
            created,
            os: take(),
            node: take(),
            release: take(),
            os_version: take(),
            machine: take(),
        })
    }
}

/// (sysname, nodename, release, version, machine) from `uname(2)`,
/// empty strings if the call fails.
fn uname_fields() -> (String, String, String, String, String) {
    let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut buf) } != 0 {
        return Default::default();
    }
    let field = |raw: &[libc::c_char]| -> String {
        unsafe { CStr::from_ptr(raw.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    };
    (
        field(&buf.sysname),
        field(&buf.nodename),
        field(&buf.release),
        field(&buf.version),
        field(&buf.machine),
    )
}

/// The short host name of this machine (up to the first dot).
pub fn short_hostname() -> String {
    let full = uname_fields().1;
    full.split('.').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let sb = Superblock {
            version: VERSION,
            created: 123_456,
            os: "Linux".to_string(),
            node: "ash".to_string(),
            release: "6.1".to_string(),
            os_version: "#1 SMP".to_string(),
            machine: "x86_64".to_string(),
        };
        let bytes = sb.encode();
        assert_eq!(*bytes.last().unwrap(), 0);
        let back = Superblock::decode("t.dat", &bytes).unwrap();
        assert_eq!(back, sb);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = Superblock::decode("t.dat", b"gdbmfile|1|0|a|b|c|d|e\0");
        assert!(matches!(err, Err(StoreError::BadMagic(_))));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let err = Superblock::decode("t.dat", b"ringstore|999|0|a|b|c|d|e\0");
        assert!(matches!(
            err,
            Err(StoreError::VersionMismatch { found: 999, .. })
        ));
    }

    #[test]
    fn test_this_host_identity_present() {
        let sb = Superblock::for_this_host();
        assert_eq!(sb.version, VERSION);
        // uname on any test host yields a sysname
        assert!(!sb.os.is_empty());
    }
}
