//! End-to-end scenarios runnable against a live form page.

use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::actions::ActionOutcome;
use crate::catalog::Field;
use crate::config::HarnessConfig;
use crate::context::FormContext;
use crate::diagnostics::{DiagnosticSink, FileSink, NullSink, capture_failure};
use crate::driver::Driver;
use crate::form::FormPage;
use crate::types::ScenarioReport;
use crate::webdriver::WebDriverSession;

pub const IFRAME_ID: &str = "form-frame";
pub const IFRAME_WITHOUT_ID_HEADING: &str = "Iframe without ID";
pub const SHADOW_HEADING: &str = "Shadow DOM Form";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Main,
    Iframe,
    Shadow,
    Validation,
    Submission,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Main => "main",
            Category::Iframe => "iframe",
            Category::Shadow => "shadow",
            Category::Validation => "validation",
            Category::Submission => "submission",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioId {
    MainSubmission,
    TermsRequired,
    PhoneMaxLength,
    CheckboxIdempotence,
    IframeById,
    IframeWithoutId,
    FrameExcursion,
    ShadowRoundTrip,
    ShadowTermsOptional,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 9] = [
        ScenarioId::MainSubmission,
        ScenarioId::TermsRequired,
        ScenarioId::PhoneMaxLength,
        ScenarioId::CheckboxIdempotence,
        ScenarioId::IframeById,
        ScenarioId::IframeWithoutId,
        ScenarioId::FrameExcursion,
        ScenarioId::ShadowRoundTrip,
        ScenarioId::ShadowTermsOptional,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::MainSubmission => "main-submission",
            ScenarioId::TermsRequired => "terms-required",
            ScenarioId::PhoneMaxLength => "phone-max-length",
            ScenarioId::CheckboxIdempotence => "checkbox-idempotence",
            ScenarioId::IframeById => "iframe-by-id",
            ScenarioId::IframeWithoutId => "iframe-without-id",
            ScenarioId::FrameExcursion => "frame-excursion",
            ScenarioId::ShadowRoundTrip => "shadow-round-trip",
            ScenarioId::ShadowTermsOptional => "shadow-terms-optional",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::MainSubmission => {
                "Fill and submit the main form, read the echoed data back"
            }
            ScenarioId::TermsRequired => "Submitting without accepting terms is not confirmed",
            ScenarioId::PhoneMaxLength => "Phone input keeps only ten digits",
            ScenarioId::CheckboxIdempotence => "Checking twice stays checked, unchecking clears",
            ScenarioId::IframeById => "Fill the iframe form located by its id",
            ScenarioId::IframeWithoutId => "Fill the iframe form located by its heading",
            ScenarioId::FrameExcursion => "Editing the iframe leaves the main form untouched",
            ScenarioId::ShadowRoundTrip => "Shadow form value reads back exactly",
            ScenarioId::ShadowTermsOptional => "Absent shadow terms checkbox is skipped",
        }
    }

    pub fn categories(&self) -> &'static [Category] {
        match self {
            ScenarioId::MainSubmission => &[Category::Main, Category::Submission],
            ScenarioId::TermsRequired => {
                &[Category::Main, Category::Validation, Category::Submission]
            }
            ScenarioId::PhoneMaxLength => &[Category::Main, Category::Validation],
            ScenarioId::CheckboxIdempotence => &[Category::Main],
            ScenarioId::IframeById => &[Category::Iframe],
            ScenarioId::IframeWithoutId => &[Category::Iframe],
            ScenarioId::FrameExcursion => &[Category::Iframe, Category::Main],
            ScenarioId::ShadowRoundTrip => &[Category::Shadow],
            ScenarioId::ShadowTermsOptional => &[Category::Shadow, Category::Validation],
        }
    }

    /// Drive an already opened form page through the scenario
    pub async fn run<D: Driver>(&self, page: &mut FormPage<D>) -> Result<()> {
        let main = FormContext::Main;
        let framed = FormContext::iframe_by_id(IFRAME_ID);
        let anonymous = FormContext::iframe_after(IFRAME_WITHOUT_ID_HEADING);
        let shadow = FormContext::shadow(SHADOW_HEADING);

        match self {
            ScenarioId::MainSubmission => {
                page.enter_first_name(&main, "John").await?;
                page.enter_last_name(&main, "Doe").await?;
                page.enter_email(&main, "john.doe@example.com").await?;
                page.select_state(&main, "United States").await?;
                page.check_terms(&main).await?;
                page.submit(&main).await?;

                let data = page.submission_data().await?;
                ensure!(
                    data.contains("First Name", "John"),
                    "expected First Name -> John, got {:?}",
                    data
                );
                ensure!(
                    data.contains("Email", "john.doe@example.com"),
                    "expected Email -> john.doe@example.com, got {:?}",
                    data
                );
                ensure!(
                    page.is_submission_confirmed().await?,
                    "submission was not confirmed"
                );
            }
            ScenarioId::TermsRequired => {
                page.enter_first_name(&main, "John").await?;
                page.enter_last_name(&main, "Doe").await?;
                page.enter_email(&main, "john.doe@example.com").await?;
                page.enter_phone(&main, "5551234567").await?;
                page.select_state(&main, "United States").await?;
                page.choose_radio(&main, Field::Gender, "Male").await?;
                page.uncheck_terms(&main).await?;
                page.submit(&main).await?;
                ensure!(
                    !page.is_submission_confirmed().await?,
                    "submission confirmed without accepting terms"
                );
            }
            ScenarioId::PhoneMaxLength => {
                page.enter_phone(&main, "555123456789").await?;
                let phone = page.get_value(&main, Field::Phone).await?;
                ensure!(phone == "5551234567", "phone kept '{}'", phone);
            }
            ScenarioId::CheckboxIdempotence => {
                page.check_terms(&main).await?;
                let second = page.check_terms(&main).await?;
                ensure!(
                    second == ActionOutcome::Unchanged,
                    "second check was not a no-op: {:?}",
                    second
                );
                ensure!(page.is_checked(&main, Field::Terms).await?, "terms not checked");
                page.uncheck_terms(&main).await?;
                ensure!(!page.is_checked(&main, Field::Terms).await?, "terms still checked");
            }
            ScenarioId::IframeById => {
                page.enter_first_name(&framed, "Frame").await?;
                page.enter_email(&framed, "frame@example.com").await?;
                page.select_state(&framed, "Canada").await?;
                let first = page.first_name(&framed).await?;
                ensure!(first == "Frame", "iframe first name read back '{}'", first);
                let state = page.get_value(&framed, Field::State).await?;
                ensure!(state == "CA", "iframe state read back '{}'", state);
            }
            ScenarioId::IframeWithoutId => {
                page.enter_first_name(&anonymous, "Anonymous").await?;
                let first = page.first_name(&anonymous).await?;
                ensure!(first == "Anonymous", "anonymous iframe read back '{}'", first);
            }
            ScenarioId::FrameExcursion => {
                page.enter_email(&main, "main@example.com").await?;
                page.enter_email(&framed, "frame@example.com").await?;
                let main_email = page.email(&main).await?;
                ensure!(
                    main_email == "main@example.com",
                    "main email changed to '{}' after iframe edit",
                    main_email
                );
            }
            ScenarioId::ShadowRoundTrip => {
                page.enter_first_name(&shadow, "ShadowFirst").await?;
                let first = page.first_name(&shadow).await?;
                ensure!(first == "ShadowFirst", "shadow first name read back '{}'", first);
            }
            ScenarioId::ShadowTermsOptional => {
                page.check_terms(&shadow).await?;
                page.enter_email(&shadow, "shadow@example.com").await?;
                let email = page.email(&shadow).await?;
                ensure!(email == "shadow@example.com", "shadow email read back '{}'", email);
            }
        }
        Ok(())
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scenarios matching any requested category or name; everything when both are empty
pub fn select(categories: &[Category], names: &[ScenarioId]) -> Vec<ScenarioId> {
    if categories.is_empty() && names.is_empty() {
        return ScenarioId::ALL.to_vec();
    }
    ScenarioId::ALL
        .into_iter()
        .filter(|id| {
            names.contains(id) || id.categories().iter().any(|c| categories.contains(c))
        })
        .collect()
}

pub fn diagnostic_sink(config: &HarnessConfig) -> Arc<dyn DiagnosticSink> {
    match &config.screenshot_dir {
        Some(dir) => Arc::new(FileSink::new(dir.clone())),
        None => Arc::new(NullSink),
    }
}

/// Run one scenario in its own WebDriver session
pub async fn run_scenario(config: &HarnessConfig, id: ScenarioId) -> ScenarioReport {
    let started = Instant::now();
    info!("Running scenario {}", id);

    let (error, screenshot) = match run_in_session(config, id).await {
        Ok(()) => (None, None),
        Err((e, screenshot)) => {
            error!("Scenario {} failed: {:#}", id, e);
            (Some(format!("{:#}", e)), screenshot)
        }
    };

    ScenarioReport {
        scenario: id.name().to_string(),
        categories: id.categories().iter().map(|c| c.to_string()).collect(),
        passed: error.is_none(),
        error,
        screenshot: screenshot.map(|p| p.display().to_string()),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn run_in_session(
    config: &HarnessConfig,
    id: ScenarioId,
) -> std::result::Result<(), (anyhow::Error, Option<PathBuf>)> {
    let session = WebDriverSession::connect(config)
        .await
        .context("Failed to start WebDriver session")
        .map_err(|e| (e, None))?;
    let sink = diagnostic_sink(config);
    let mut page = FormPage::new(session, config.clone(), sink.clone());

    let outcome = match page.open().await {
        Ok(()) => id.run(&mut page).await,
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to open {}", config.base_url))),
    };

    let screenshot = match &outcome {
        Ok(()) => None,
        Err(_) => capture_failure(page.driver(), sink.as_ref(), id.name()).await,
    };

    if let Err(e) = page.into_driver().close().await {
        warn!("Failed to close session for {}: {:#}", id, e);
    }

    outcome.map_err(|e| (e, screenshot))
}

#[cfg(test)]
#[path = "scenarios_test.rs"]
mod scenarios_test;
