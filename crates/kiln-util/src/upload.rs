//! HTTP uploads to remote Maven repositories.

use base64::Engine;

use crate::error::UtilError;

/// Username/password pair sent as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    /// The value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// Upload `body` to `url` with an HTTP `PUT`.
///
/// Any non-2xx response is an error.
///
/// # Errors
/// Returns `UtilError::Upload` if the request cannot be sent or the server
/// rejects it.
pub fn put(url: &str, body: &[u8], auth: Option<&BasicAuth>) -> Result<(), UtilError> {
    let agent = ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_connect(Some(std::time::Duration::from_secs(30)))
            .timeout_global(Some(std::time::Duration::from_secs(600)))
            .build(),
    );

    let mut request = agent.put(url);
    if let Some(auth) = auth {
        request = request.header("Authorization", auth.header_value());
    }

    tracing::debug!(%url, bytes = body.len(), "uploading");
    request.send(body).map_err(|e| UtilError::Upload {
        url: url.to_owned(),
        message: e.to_string(),
    })?;
    Ok(())
}
