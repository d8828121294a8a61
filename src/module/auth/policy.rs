use crate::domain::FileAccessRequest;
use crate::library::helpers::split_into_two;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decides whether a session may read a file
#[async_trait]
pub trait AccessPolicy: Send + Sync + 'static {
    /// Evaluates a single access request
    async fn is_allowed(&self, request: &FileAccessRequest) -> bool;
}

/// Matcher for one side of a [`Grant`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches everything, written as `*`
    Any,
    /// Matches exactly the contained value
    Exact(String),
}

impl Pattern {
    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(expected) => expected == value,
        }
    }
}

impl From<&str> for Pattern {
    fn from(raw: &str) -> Self {
        match raw {
            "*" => Pattern::Any,
            exact => Pattern::Exact(exact.to_owned()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => write!(f, "*"),
            Pattern::Exact(value) => write!(f, "{}", value),
        }
    }
}

/// Error returned when parsing a [`Grant`] fails
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GrantParseError {
    /// Separator between session and file is missing
    #[error("grant '{0}' is not of the form SESSION:FILE")]
    MissingSeparator(String),
    /// One of the two sides is empty
    #[error("grant '{0}' has an empty session or file")]
    EmptyPattern(String),
}

/// Permission for sessions matching a pattern to read files matching another pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Sessions the grant applies to
    pub session: Pattern,
    /// Files the grant applies to
    pub file: Pattern,
}

impl Grant {
    fn covers(&self, request: &FileAccessRequest) -> bool {
        self.session.matches(&request.session_id) && self.file.matches(&request.file_id)
    }
}

impl FromStr for Grant {
    type Err = GrantParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (session, file) = split_into_two(raw.trim(), ":")
            .ok_or_else(|| GrantParseError::MissingSeparator(raw.to_owned()))?;

        if session.is_empty() || file.is_empty() {
            return Err(GrantParseError::EmptyPattern(raw.to_owned()));
        }

        Ok(Self {
            session: Pattern::from(session.as_str()),
            file: Pattern::from(file.as_str()),
        })
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.file)
    }
}

/// Static list of grants, denying everything not explicitly granted
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: Vec<Grant>,
}

impl GrantTable {
    /// Creates a new table from a list of grants
    pub fn new(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    /// Number of grants in the table
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether no grants exist and thus every request is denied
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[async_trait]
impl AccessPolicy for GrantTable {
    async fn is_allowed(&self, request: &FileAccessRequest) -> bool {
        self.grants.iter().any(|grant| grant.covers(request))
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(session: &str, file: &str) -> FileAccessRequest {
        FileAccessRequest {
            session_id: session.into(),
            file_id: file.into(),
        }
    }

    #[test]
    fn parse_grants() {
        assert_eq!(
            "s1:f1".parse::<Grant>().unwrap(),
            Grant {
                session: Pattern::Exact("s1".into()),
                file: Pattern::Exact("f1".into()),
            }
        );
        assert_eq!(
            "*:f1".parse::<Grant>().unwrap().session,
            Pattern::Any
        );
        assert_eq!("s1:*".parse::<Grant>().unwrap().to_string().as_str(), "s1:*");
    }

    #[test]
    fn reject_malformed_grants() {
        assert_eq!(
            "s1".parse::<Grant>(),
            Err(GrantParseError::MissingSeparator("s1".into()))
        );
        assert_eq!(
            ":f1".parse::<Grant>(),
            Err(GrantParseError::EmptyPattern(":f1".into()))
        );
    }

    #[tokio::test]
    async fn allow_only_granted_access() {
        let table = GrantTable::new(vec![
            "s1:f1".parse().unwrap(),
            "admin:*".parse().unwrap(),
            "*:public".parse().unwrap(),
        ]);

        assert!(table.is_allowed(&request("s1", "f1")).await);
        assert!(table.is_allowed(&request("admin", "f2")).await);
        assert!(table.is_allowed(&request("s2", "public")).await);
        assert!(!table.is_allowed(&request("s1", "f2")).await);
        assert!(!table.is_allowed(&request("s2", "f1")).await);
    }

    #[tokio::test]
    async fn deny_everything_without_grants() {
        let table = GrantTable::default();

        assert!(table.is_empty());
        assert!(!table.is_allowed(&request("s1", "f1")).await);
    }
}
