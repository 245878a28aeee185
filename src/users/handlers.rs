use axum::{
    extract::State,
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::cookie::{extract_remember_token, remember_cookie},
    state::AppState,
    users::{
        dto::{LoginForm, SignupForm},
        error::UserError,
        repo_types::User,
    },
    views::{self, layout, Alert},
};

const AFTER_SIGN_IN: &str = "/cookietest";

pub fn signup_routes() -> Router<AppState> {
    Router::new().route("/signup", get(new_user).post(create))
}

pub fn login_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/cookietest", get(cookie_test))
}

fn signup_view(status: StatusCode, alert: Option<Alert>, form: &SignupForm) -> Response {
    (
        status,
        layout(
            "Sign Up",
            alert.as_ref(),
            &views::signup_form(&form.name, &form.email),
        ),
    )
        .into_response()
}

fn login_view(status: StatusCode, alert: Option<Alert>, email: &str) -> Response {
    (
        status,
        layout("Log In", alert.as_ref(), &views::login_form(email)),
    )
        .into_response()
}

pub async fn new_user() -> Response {
    signup_view(StatusCode::OK, None, &SignupForm::default())
}

pub async fn login_page() -> Response {
    login_view(StatusCode::OK, None, "")
}

/// Makes sure the user carries a plaintext remember token (issuing and
/// persisting a fresh one if needed) and builds the cookie for it.
async fn sign_in(state: &AppState, mut user: User) -> Result<HeaderValue, UserError> {
    if user.remember.is_empty() {
        user = state.users.rotate_remember(user).await?;
    }
    remember_cookie(&user.remember, state.config.cookie_secure)
        .map_err(|e| UserError::Internal(e.into()))
}

fn signed_in_redirect(cookie: HeaderValue) -> Response {
    (
        StatusCode::FOUND,
        [
            (SET_COOKIE, cookie),
            (LOCATION, HeaderValue::from_static(AFTER_SIGN_IN)),
        ],
    )
        .into_response()
}

#[instrument(skip(state, form))]
pub async fn create(State(state): State<AppState>, Form(mut form): Form<SignupForm>) -> Response {
    let password = std::mem::take(&mut form.password);
    let user = User::new(form.name.clone(), form.email.clone(), password);

    let user = match state.users.create(user).await {
        Ok(u) => u,
        Err(e) => {
            let status = match e {
                UserError::Validation(_) => StatusCode::BAD_REQUEST,
                UserError::EmailTaken => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let alert = if e.is_user_facing() {
                warn!(error = %e, "signup rejected");
                Alert::error(e.to_string())
            } else {
                error!(error = %e, "create user failed");
                Alert::generic()
            };
            return signup_view(status, Some(alert), &form);
        }
    };

    match sign_in(&state, user).await {
        Ok(cookie) => signed_in_redirect(cookie),
        Err(e) => {
            error!(error = %e, "sign in after signup failed");
            signup_view(StatusCode::INTERNAL_SERVER_ERROR, Some(Alert::generic()), &form)
        }
    }
}

#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let user = match state.users.authenticate(&form.email, &form.password).await {
        Ok(u) => u,
        // Same answer for both so the form does not reveal which emails exist.
        Err(UserError::NotFound | UserError::InvalidPassword) => {
            return login_view(
                StatusCode::UNAUTHORIZED,
                Some(Alert::error("Invalid email address or password.")),
                &form.email,
            );
        }
        Err(e) => {
            error!(error = %e, "authenticate failed");
            return login_view(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(Alert::generic()),
                &form.email,
            );
        }
    };

    match sign_in(&state, user).await {
        Ok(cookie) => {
            info!("user logged in");
            signed_in_redirect(cookie)
        }
        Err(e) => {
            error!(error = %e, "sign in failed");
            login_view(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(Alert::generic()),
                &form.email,
            )
        }
    }
}

#[instrument(skip_all)]
pub async fn cookie_test(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(presented) = extract_remember_token(&headers) else {
        return Redirect::to("/login").into_response();
    };
    match state.users.by_remember(&presented).await {
        Ok(user) => layout(
            "Cookie Test",
            None,
            &format!(
                "<h1>Hello, {}!</h1>\n    <p>You are signed in as {}.</p>",
                views::escape(&user.name),
                views::escape(&user.email)
            ),
        )
        .into_response(),
        Err(UserError::NotFound) => {
            warn!("unknown remember token");
            Redirect::to("/login").into_response()
        }
        Err(e) => {
            error!(error = %e, "remember lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                layout("Error", Some(&Alert::generic()), ""),
            )
                .into_response()
        }
    }
}
