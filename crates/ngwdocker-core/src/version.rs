use std::cmp::Ordering;
use std::fmt;

/// Package version read from a `VERSION` file.
///
/// Only the numeric release segment takes part in comparisons, so
/// `3.2.0.dev0` and `3.2.0` both satisfy `>= 3.2.0`. That is enough to
/// gate features on a minimum release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    raw: String,
    release: Vec<u64>,
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_owned();
        let release = raw
            .split('.')
            .map_while(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                part.bytes().try_fold(0u64, |acc, b| {
                    acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
                })
            })
            .collect();
        Self { raw, release }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compare release segments, padding the shorter one with zeros.
    pub fn cmp_release(&self, other: &[u64]) -> Ordering {
        let len = self.release.len().max(other.len());
        for idx in 0..len {
            let a = self.release.get(idx).map_or(0, |n| *n);
            let b = other.get(idx).map_or(0, |n| *n);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    pub fn at_least(&self, release: &[u64]) -> bool {
        self.cmp_release(release) != Ordering::Less
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_release_counts_as_release() {
        assert!(PackageVersion::parse("3.2.0.dev0").at_least(&[3, 2, 0]));
        assert!(PackageVersion::parse("3.2.0").at_least(&[3, 2, 0]));
        assert!(PackageVersion::parse("3.10").at_least(&[3, 2, 0]));
    }

    #[test]
    fn older_release_is_below() {
        assert!(!PackageVersion::parse("3.1.9").at_least(&[3, 2, 0]));
        assert!(!PackageVersion::parse("3.1.0.dev5").at_least(&[3, 2, 0]));
    }

    #[test]
    fn trailing_suffix_stops_release() {
        let version = PackageVersion::parse("4.0.0rc1\n");
        assert_eq!(version.as_str(), "4.0.0rc1");
        assert!(version.at_least(&[4]));
        assert!(!version.at_least(&[4, 0, 1]));
    }
}
