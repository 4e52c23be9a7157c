use std::collections::BTreeSet;

/// Literal allow-list of paths that bypass authentication.
///
/// Matching is exact: `/auth/login` does not cover `/auth/login/` or
/// `/auth/login/extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicPaths(BTreeSet<String>);

impl PublicPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Parse a comma separated list, ignoring blanks.
    #[must_use]
    pub fn parse(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        )
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
