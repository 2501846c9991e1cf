//! The crate version.

/// The major version of this crate.
#[must_use]
pub const fn version_major() -> u32 {
    const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
    parse(VERSION_MAJOR)
}

/// The minor version of this crate.
#[must_use]
pub const fn version_minor() -> u32 {
    const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
    parse(VERSION_MINOR)
}

/// The patch version of this crate.
#[must_use]
pub const fn version_patch() -> u32 {
    const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
    parse(VERSION_PATCH)
}

const fn parse(version: &str) -> u32 {
    let bytes = version.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_components() {
        assert_eq!(version_major(), 0);
        assert!(version_minor() > 0 || version_patch() > 0 || version_major() > 0);
    }
}
