//! Inbound authorization parameters and redirect composition.

use super::{error::RequestError, pkce::ChallengeMethod};
use url::Url;

/// Parameters of one login attempt, parsed once and never mutated.
///
/// `redirect_uri` is validated as an absolute URL but kept exactly as the
/// client sent it; the server matches it byte for byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: ChallengeMethod,
}

impl AuthorizationRequest {
    /// Parse from decoded query pairs. The first occurrence of a key wins and
    /// empty values count as missing.
    ///
    /// # Errors
    /// Returns `RequestError` when a required field is missing, `redirect_uri`
    /// is not an absolute URL, or the challenge method is not `S256`.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut client_id = None;
        let mut redirect_uri = None;
        let mut state = None;
        let mut code_challenge = None;
        let mut code_challenge_method = None;

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "client_id" => &mut client_id,
                "redirect_uri" => &mut redirect_uri,
                "state" => &mut state,
                "code_challenge" => &mut code_challenge,
                "code_challenge_method" => &mut code_challenge_method,
                _ => continue,
            };
            if slot.is_none() && !value.as_ref().is_empty() {
                *slot = Some(value.as_ref().to_string());
            }
        }

        let client_id = client_id.ok_or(RequestError::Missing("client_id"))?;
        let redirect_uri = redirect_uri.ok_or(RequestError::Missing("redirect_uri"))?;
        validate_redirect_uri(&redirect_uri)?;
        let state = state.ok_or(RequestError::Missing("state"))?;
        let code_challenge = code_challenge.ok_or(RequestError::Missing("code_challenge"))?;
        let code_challenge_method = match code_challenge_method {
            None => ChallengeMethod::default(),
            Some(method) => ChallengeMethod::parse(&method)
                .ok_or(RequestError::UnsupportedChallengeMethod(method))?,
        };

        Ok(Self {
            client_id,
            redirect_uri,
            state,
            code_challenge,
            code_challenge_method,
        })
    }

    /// Parse a raw query string, with or without the leading `?`.
    ///
    /// # Errors
    /// See [`AuthorizationRequest::from_pairs`].
    pub fn from_query(query: &str) -> Result<Self, RequestError> {
        let query = query.trim().trim_start_matches('?');
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Parse either a full authorize URL or a bare query string.
    ///
    /// # Errors
    /// See [`AuthorizationRequest::from_pairs`].
    pub fn from_entry(entry: &str) -> Result<Self, RequestError> {
        match Url::parse(entry.trim()) {
            Ok(url) => Self::from_pairs(url.query_pairs()),
            Err(_) => Self::from_query(entry),
        }
    }

    /// `redirect_uri` with `code` and the original `state` appended.
    #[must_use]
    pub fn redirect_target(&self, code: &str) -> String {
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("code", code)
            .append_pair("state", &self.state)
            .finish();

        let separator = match self.redirect_uri.find('?') {
            None => "?",
            Some(_) if self.redirect_uri.ends_with(['?', '&']) => "",
            Some(_) => "&",
        };
        format!("{}{separator}{params}", self.redirect_uri)
    }
}

fn validate_redirect_uri(value: &str) -> Result<(), RequestError> {
    let url = Url::parse(value).map_err(|err| RequestError::InvalidRedirectUri(err.to_string()))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(RequestError::InvalidRedirectUri(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }

    if url.fragment().is_some() {
        return Err(RequestError::InvalidRedirectUri(
            "fragment not allowed".to_string(),
        ));
    }

    Ok(())
}
