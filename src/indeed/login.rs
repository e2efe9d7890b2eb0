//! Portal login.
//!
//! Discovery is tolerant throughout: every selector miss falls through to
//! the next candidate, then to a generic fallback, and is logged rather than
//! raised. The only hard error is failing to open the login page at all.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::browser::{Page, Selector};
use crate::config::ActorConfig;

use super::{LOGIN_BUTTON_SELECTORS, PASSWORD_SELECTORS, USERNAME_SELECTORS};

/// Controls that only render for an authenticated session.
const LOGGED_IN_MARKERS: &[Selector] = &[
    Selector::Text("Download"),
    Selector::Text("Export"),
    Selector::Text("Export CSV"),
];

/// How long to wait for the page to settle after submitting the form.
const POST_LOGIN_SETTLE: Duration = Duration::from_secs(20);

/// Try each selector in order until one matches and fills.
pub async fn try_fill(page: &Page, selectors: &[Selector], value: &str) -> bool {
    for selector in selectors {
        match page.fill(selector, value).await {
            Ok(true) => return true,
            Ok(false) => continue,
            Err(e) => {
                debug!(selector = %selector, err = %e, "fill attempt failed");
                continue;
            }
        }
    }
    false
}

/// Try each selector in order until one matches and clicks.
pub async fn try_click(page: &Page, selectors: &[Selector]) -> bool {
    for selector in selectors {
        match page.click(selector).await {
            Ok(true) => return true,
            Ok(false) => continue,
            Err(e) => {
                debug!(selector = %selector, err = %e, "click attempt failed");
                continue;
            }
        }
    }
    false
}

/// Whether the page already shows authenticated-only download controls.
pub async fn check_login_status(page: &Page) -> bool {
    for marker in LOGGED_IN_MARKERS {
        match page.exists(marker).await {
            Ok(true) => {
                info!("detected download controls without fresh login — using existing cookies");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                debug!(err = %e, "login status check failed; will proceed with login flow");
                return false;
            }
        }
    }
    debug!("download controls not detected on page (may require login)");
    false
}

/// Drive the login form: open the login page, fill credentials, submit,
/// then wait for the portal to settle.
pub async fn perform_login(page: &Page, config: &ActorConfig) -> Result<()> {
    info!("performing login flow");
    page.goto(&config.input.login_url, config.nav_timeout)
        .await
        .context("opening login page")?;

    let filled_user = try_fill(page, USERNAME_SELECTORS, &config.input.indeed_username).await;
    if !filled_user {
        warn!("could not find username/email field using common selectors — trying generic input");
        match page
            .fill(&Selector::Css("input"), &config.input.indeed_username)
            .await
        {
            Ok(true) => {}
            _ => error!("unable to autofill username field; login may fail"),
        }
    }

    let filled_pass = try_fill(page, PASSWORD_SELECTORS, &config.input.indeed_password).await;
    if !filled_pass {
        warn!("could not find password field using common selectors — trying generic input");
        match page
            .fill(
                &Selector::Css(r#"input[type="password"]"#),
                &config.input.indeed_password,
            )
            .await
        {
            Ok(true) => {}
            _ => error!("unable to autofill password field; login may fail"),
        }
    }

    let clicked = try_click(page, LOGIN_BUTTON_SELECTORS).await;
    if !clicked && !matches!(page.click(&Selector::Text("Sign in")).await, Ok(true)) {
        warn!("could not click login button automatically; selectors may need updating");
    }

    page.settle_after_action(POST_LOGIN_SETTLE).await;
    Ok(())
}
