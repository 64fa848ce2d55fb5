use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::{UserContext, UserRole};

/// Axum extractor for UserContext from request headers
///
/// This extractor looks for user information in request headers:
/// - X-User-Name: user identifier; without it the request is anonymous
/// - X-User-Real-Name: Optional display name
/// - X-User-Role: Optional role (visitor, member, editor, moderator, manager, admin)
///
/// Authentication itself happens in front of this service.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let Some(user_name) = extract_header_value(headers, "x-user-name") else {
            return Ok(UserContext::default_user());
        };

        let role = match extract_header_value(headers, "x-user-role") {
            Some(value) => UserRole::parse(&value).ok_or(StatusCode::BAD_REQUEST)?,
            None => UserRole::Member,
        };
        let real_name = extract_header_value(headers, "x-user-real-name");

        Ok(UserContext::with_details(user_name, real_name, role))
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<UserContext, StatusCode> {
        let (mut parts, _) = request.into_parts();
        UserContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_user_context_extraction() {
        let request = Request::builder()
            .header("x-user-name", "jdoe")
            .header("x-user-real-name", "Jane Doe")
            .header("x-user-role", "moderator")
            .body(())
            .unwrap();

        let user = extract(request).await.unwrap();
        assert_eq!(user.user_name, "jdoe");
        assert_eq!(user.real_name.as_deref(), Some("Jane Doe"));
        assert_eq!(user.role, UserRole::Moderator);
    }

    #[tokio::test]
    async fn test_anonymous_and_invalid_role() {
        let anonymous = extract(Request::builder().body(()).unwrap()).await.unwrap();
        assert_eq!(anonymous, UserContext::default_user());

        let invalid = Request::builder()
            .header("x-user-name", "jdoe")
            .header("x-user-role", "superuser")
            .body(())
            .unwrap();
        assert_eq!(extract(invalid).await.unwrap_err(), StatusCode::BAD_REQUEST);
    }
}
