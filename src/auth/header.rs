//! The `Authorization` wire convention: a single header value carrying
//! `"<access> <refresh>"`, space-joined.

pub const AUTHORIZATION: &str = "Authorization";

/// Token components as presented by a client. Either side may be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentedPair<'a> {
    pub access: &'a str,
    pub refresh: &'a str,
}

impl<'a> PresentedPair<'a> {
    /// Splits a header value into its access and refresh components.
    ///
    /// A leading `Bearer` scheme is tolerated. Missing components come back
    /// empty rather than as errors; callers decide which side is required.
    pub fn parse(value: &'a str) -> Self {
        let mut parts = value.split_whitespace().peekable();
        if parts
            .peek()
            .is_some_and(|first| first.eq_ignore_ascii_case("bearer"))
        {
            parts.next();
        }

        Self {
            access: parts.next().unwrap_or_default(),
            refresh: parts.next().unwrap_or_default(),
        }
    }
}

/// A freshly issued or reissued pair, ready to be written back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn header_value(&self) -> String {
        format!("{} {}", self.access_token, self.refresh_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_access_and_refresh() {
        let pair = PresentedPair::parse("aaa.bbb.ccc ddd.eee.fff");
        assert_eq!(pair.access, "aaa.bbb.ccc");
        assert_eq!(pair.refresh, "ddd.eee.fff");
    }

    #[test]
    fn missing_refresh_is_empty() {
        assert_eq!(PresentedPair::parse("aaa").refresh, "");
        assert_eq!(PresentedPair::parse("aaa ").refresh, "");
        assert_eq!(PresentedPair::parse(""), PresentedPair::default());
    }

    #[test]
    fn tolerates_bearer_scheme() {
        let pair = PresentedPair::parse("Bearer aaa bbb");
        assert_eq!(pair.access, "aaa");
        assert_eq!(pair.refresh, "bbb");
    }

    #[test]
    fn header_value_is_space_joined() {
        let pair = TokenPair {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        };
        assert_eq!(pair.header_value(), "access refresh");
        assert_eq!(
            PresentedPair::parse(&pair.header_value()),
            PresentedPair {
                access: "access",
                refresh: "refresh"
            }
        );
    }
}
