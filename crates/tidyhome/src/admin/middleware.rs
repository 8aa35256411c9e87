use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

use super::gate::{AdminGate, GateDecision, GateRequest, ROOT_PATH};
use super::profiles::ProfileStore;
use super::session::{IdentityProvider, SessionCookie, SessionCookies};

/// Axum middleware guarding the admin area.
///
/// ```ignore
/// let gate = AdminGate::new(identity, profiles);
/// let app = admin_quote_router(cache)
///     .layer(axum::middleware::from_fn_with_state(gate, admin_gate::<I, P>));
/// ```
pub async fn admin_gate<I, P>(
    State(gate): State<AdminGate<I, P>>,
    request: Request,
    next: Next,
) -> Response
where
    I: IdentityProvider + ?Sized + 'static,
    P: ProfileStore + ?Sized + 'static,
{
    let cookies = SessionCookies::from_headers(request.headers());
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let decision = gate
        .authorize(GateRequest {
            path_and_query: &path_and_query,
            cookies: &cookies,
        })
        .await;

    match decision {
        GateDecision::Allow { cookies } => {
            let response = next.run(request).await;
            with_cookies(response, &cookies)
        }
        redirect => {
            let location = redirect.location().unwrap_or_else(|| ROOT_PATH.to_string());
            Redirect::temporary(&location).into_response()
        }
    }
}

fn with_cookies(mut response: Response, cookies: &[SessionCookie]) -> Response {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(cookie = %cookie.name, error = %err, "dropping unencodable cookie"),
        }
    }
    response
}
