use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Request metadata captured for the audit trail.
#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Deployments sit behind a reverse proxy, so the client address comes
        // from X-Forwarded-For when present.
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());

        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(Self {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            ip,
            user_agent,
        })
    }
}
