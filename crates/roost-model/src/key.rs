//! Component identity types.

use std::fmt;

/// A launcher profile (user). `0` is the primary profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Uniquely names one launchable activity for one profile.
///
/// At most one catalog entry exists per key at any time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub package: String,
    pub class: String,
    pub user: UserId,
}

impl ComponentKey {
    pub fn new(package: impl Into<String>, class: impl Into<String>, user: UserId) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
            user,
        }
    }

    /// `package/class#user` form, used in logs and cache keys.
    pub fn flatten(&self) -> String {
        format!("{}/{}#{}", self.package, self.class, self.user)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_includes_user() {
        let key = ComponentKey::new("org.example.mail", "org.example.mail.Inbox", UserId(10));
        assert_eq!(key.flatten(), "org.example.mail/org.example.mail.Inbox#u10");
    }
}
