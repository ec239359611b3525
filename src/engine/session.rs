//! Login and environment resolution.

use super::console::{
    self, ENVIRONMENT_ITEMS, ENVIRONMENT_MAPPER, HOME_LANDMARK, LOGIN_PASSWORD, LOGIN_SUBMIT,
    LOGIN_USERNAME,
};
use super::decode;
use crate::browser::{NavigateOptions, Page, WaitOptions};
use crate::error::RedeployError;
use crate::model::{Environment, RunConfig};
use crate::retry::with_retry;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    name: String,
    dashboard: String,
}

/// Open the console, log in, and resolve the configured environment.
pub(crate) async fn bootstrap(
    page: &dyn Page,
    cfg: &RunConfig,
) -> Result<Environment, RedeployError> {
    with_retry("open console", &cfg.retry, || open_console(page, cfg)).await?;
    with_retry("login", &cfg.retry, || login(page, cfg)).await?;
    tracing::info!("Logged in as {}", cfg.username);

    let environments =
        with_retry("fetch environments", &cfg.retry, || list_environments(page)).await?;
    tracing::info!("Found {} environment(s)", environments.len());

    let env = select_environment(&environments, &cfg.environment)?;
    tracing::info!(environment = %env.name, stacks_link = %env.stacks_link, "Environment resolved");
    Ok(env)
}

async fn open_console(page: &dyn Page, cfg: &RunConfig) -> Result<(), RedeployError> {
    page.goto(&cfg.base_url, NavigateOptions::default())
        .await
        .map_err(RedeployError::ui("open console"))
}

/// Submit credentials and wait for the home page. A slow page and a rejected
/// login look the same here, so the whole sequence is the retry unit.
async fn login(page: &dyn Page, cfg: &RunConfig) -> Result<(), RedeployError> {
    page.type_text(LOGIN_USERNAME, &cfg.username)
        .await
        .map_err(RedeployError::ui("login: username"))?;
    page.type_text(LOGIN_PASSWORD, cfg.password.expose())
        .await
        .map_err(RedeployError::ui("login: password"))?;
    page.click(LOGIN_SUBMIT)
        .await
        .map_err(RedeployError::ui("login: submit"))?;
    page.wait_for_selector(HOME_LANDMARK, WaitOptions::visible())
        .await
        .map_err(RedeployError::ui("login: home page"))
}

async fn list_environments(page: &dyn Page) -> Result<Vec<Environment>, RedeployError> {
    let value = page
        .eval_all(ENVIRONMENT_ITEMS, ENVIRONMENT_MAPPER)
        .await
        .map_err(RedeployError::ui("fetch environments"))?;
    let entries: Vec<EnvironmentEntry> = decode("fetch environments", value)?;
    Ok(entries
        .into_iter()
        .map(|e| Environment {
            stacks_link: console::stacks_link(&e.dashboard),
            name: e.name,
            dashboard_link: e.dashboard,
        })
        .collect())
}

/// Exact, case-sensitive name match. Not retried: the list is already complete.
pub(crate) fn select_environment(
    environments: &[Environment],
    name: &str,
) -> Result<Environment, RedeployError> {
    environments
        .iter()
        .find(|e| e.name == name)
        .cloned()
        .ok_or_else(|| RedeployError::EnvironmentNotFound(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, Call, FakePage};
    use serde_json::json;

    fn env(name: &str) -> Environment {
        Environment {
            name: name.into(),
            dashboard_link: format!("http://p/#!/{name}/docker/dashboard"),
            stacks_link: format!("http://p/#!/{name}/docker/stacks"),
        }
    }

    #[test]
    fn select_environment_matches_exact_name() {
        let envs = vec![env("prod-east"), env("prod")];
        assert_eq!(select_environment(&envs, "prod").unwrap().name, "prod");
    }

    #[test]
    fn select_environment_is_case_sensitive_and_names_the_target() {
        let envs = vec![env("Prod")];
        let err = select_environment(&envs, "prod").unwrap_err();
        assert!(matches!(err, RedeployError::EnvironmentNotFound(ref n) if n == "prod"));
        assert_eq!(err.to_string(), "Environment prod not found");
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_logs_in_and_derives_stacks_link() {
        let page = FakePage::portainer(&["web"]);
        let cfg = config(&["web"]);

        let env = bootstrap(&page, &cfg).await.unwrap();

        assert_eq!(env.name, "local");
        assert_eq!(env.stacks_link, "http://portainer.test/#!/3/docker/stacks");
        let calls = page.calls();
        assert_eq!(calls[0], Call::Goto(cfg.base_url.clone()));
        assert_eq!(calls[1], Call::Type(LOGIN_USERNAME.into(), "admin".into()));
        assert_eq!(calls[2], Call::Type(LOGIN_PASSWORD.into(), "s3cret".into()));
        assert_eq!(calls[3], Call::Click(LOGIN_SUBMIT.into()));
        assert_eq!(calls[4], Call::Wait(HOME_LANDMARK.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_is_retried_with_credentials_resubmitted() {
        let page = FakePage::portainer(&["web"]);
        let cfg = config(&["web"]);
        page.fail_wait(&cfg.base_url, HOME_LANDMARK, 1);

        bootstrap(&page, &cfg).await.unwrap();

        let submits = page
            .calls()
            .iter()
            .filter(|c| **c == Call::Click(LOGIN_SUBMIT.into()))
            .count();
        assert_eq!(submits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_environment_is_not_retried() {
        let page = FakePage::portainer(&["web"]);
        page.respond(
            ENVIRONMENT_MAPPER,
            json!([{ "name": "other", "dashboard": "http://p/#!/9/docker/dashboard" }]),
        );
        let cfg = config(&["web"]);

        let err = bootstrap(&page, &cfg).await.unwrap_err();

        assert!(matches!(err, RedeployError::EnvironmentNotFound(ref n) if n == "local"));
        assert_eq!(page.eval_count(ENVIRONMENT_MAPPER), 1);
    }
}
