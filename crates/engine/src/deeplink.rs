//! Flow entry through a deep link carrying the session token.

use std::fmt;

use reqwest::Url;
use thiserror::Error;

const TOKEN_PARAM: &str = "token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeepLinkError {
    #[error("invalid link: {0}")]
    InvalidUrl(String),
    #[error("the link does not carry a token")]
    MissingToken,
}

/// Opaque single-use session token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are bearer credentials, keep them out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub token: Token,
    /// The link with the token removed, safe to show or reload.
    pub stripped: Url,
}

pub fn parse(link: &str) -> Result<DeepLink, DeepLinkError> {
    let mut url = Url::parse(link.trim()).map_err(|err| DeepLinkError::InvalidUrl(err.to_string()))?;

    let mut token = None;
    let mut kept: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == TOKEN_PARAM {
            token = token.or_else(|| Token::new(&value));
        } else {
            kept.push((key.into_owned(), value.into_owned()));
        }
    }
    let token = token.ok_or(DeepLinkError::MissingToken)?;

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(DeepLink {
        token,
        stripped: url,
    })
}
