//! Semantic operations on the registration form.
//!
//! Every operation names a [`Field`] and the [`FormContext`] it lives in. The
//! facade enters the context, resolves the field with its catalog chain, acts,
//! and returns to the top-level document whether or not the operation worked.

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::actions::{ActionOutcome, Actions};
use crate::catalog::{Field, FieldCatalog, FieldDescriptor, FieldRole};
use crate::config::HarnessConfig;
use crate::context::{ContextNavigator, FormContext};
use crate::diagnostics::{DiagnosticSink, capture_failure};
use crate::driver::Driver;
use crate::errors::{ProbeError, ProbeResult, StrategyAttempt};
use crate::resolver::ElementResolver;
use crate::response::{ResponseInterpreter, SubmissionData};
use crate::strategy::{LocatorStrategy, StrategyChain, css_attr};

#[derive(Debug, Clone, Copy)]
enum FieldOp<'s> {
    Type(&'s str),
    Read,
    Clear,
    Select(&'s str),
    Check(bool),
    IsChecked,
    Choose(&'s str),
    Click,
}

#[derive(Debug)]
enum FieldOutcome {
    Action(ActionOutcome),
    Value(String),
    Checked(bool),
    /// Optional field was not present
    Skipped,
}

pub struct FormPage<D: Driver> {
    navigator: ContextNavigator<D>,
    config: HarnessConfig,
    sink: Arc<dyn DiagnosticSink>,
    catalog: FieldCatalog,
}

impl<D: Driver> FormPage<D> {
    pub fn new(driver: D, config: HarnessConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let navigator = ContextNavigator::new(driver, config.timing());
        Self {
            navigator,
            config,
            sink,
            catalog: FieldCatalog::standard(),
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: FieldCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn driver(&self) -> &D {
        self.navigator.driver()
    }

    pub fn into_driver(self) -> D {
        self.navigator.into_driver()
    }

    pub fn navigator(&self) -> &ContextNavigator<D> {
        &self.navigator
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Load the configured form page
    pub async fn open(&mut self) -> ProbeResult<()> {
        let url = self.config.base_url.clone();
        self.navigate(&url).await
    }

    pub async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.navigator.driver().goto(url).await?;
        self.navigator.return_to_top_level().await
    }

    /// Type into a text field; the outcome tells whether the read-back matched
    pub async fn enter_text(
        &mut self,
        context: &FormContext,
        field: Field,
        text: &str,
    ) -> ProbeResult<ActionOutcome> {
        match self.perform(context, field, FieldOp::Type(text)).await? {
            FieldOutcome::Action(outcome) => Ok(outcome),
            _ => Ok(ActionOutcome::Unchanged),
        }
    }

    /// Current value of a field, `""` for a skipped optional field
    pub async fn get_value(&mut self, context: &FormContext, field: Field) -> ProbeResult<String> {
        match self.perform(context, field, FieldOp::Read).await? {
            FieldOutcome::Value(value) => Ok(value),
            _ => Ok(String::new()),
        }
    }

    pub async fn clear_field(&mut self, context: &FormContext, field: Field) -> ProbeResult<()> {
        self.perform(context, field, FieldOp::Clear).await.map(|_| ())
    }

    /// Select a dropdown option by visible text, falling back to its value
    pub async fn select_option(
        &mut self,
        context: &FormContext,
        field: Field,
        option: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.perform(context, field, FieldOp::Select(option))
            .await
            .map(action_outcome)
    }

    /// Idempotent checkbox toggle; clicks only when the state differs
    pub async fn set_checkbox(
        &mut self,
        context: &FormContext,
        field: Field,
        checked: bool,
    ) -> ProbeResult<ActionOutcome> {
        self.perform(context, field, FieldOp::Check(checked))
            .await
            .map(action_outcome)
    }

    pub async fn is_checked(&mut self, context: &FormContext, field: Field) -> ProbeResult<bool> {
        match self.perform(context, field, FieldOp::IsChecked).await? {
            FieldOutcome::Checked(checked) => Ok(checked),
            _ => Ok(false),
        }
    }

    /// Pick the radio button of a group whose label or value is `option`
    pub async fn choose_radio(
        &mut self,
        context: &FormContext,
        field: Field,
        option: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.perform(context, field, FieldOp::Choose(option))
            .await
            .map(action_outcome)
    }

    pub async fn click(
        &mut self,
        context: &FormContext,
        field: Field,
    ) -> ProbeResult<ActionOutcome> {
        self.perform(context, field, FieldOp::Click)
            .await
            .map(action_outcome)
    }

    /// Click the section's submit button and let the page settle
    pub async fn submit(&mut self, context: &FormContext) -> ProbeResult<ActionOutcome> {
        let outcome = self.click(context, Field::Submit).await?;
        sleep(self.config.timing().settle_delay).await;
        Ok(outcome)
    }

    pub async fn enter_first_name(
        &mut self,
        context: &FormContext,
        value: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.enter_text(context, Field::FirstName, value).await
    }

    pub async fn enter_last_name(
        &mut self,
        context: &FormContext,
        value: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.enter_text(context, Field::LastName, value).await
    }

    pub async fn enter_email(
        &mut self,
        context: &FormContext,
        value: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.enter_text(context, Field::Email, value).await
    }

    pub async fn enter_phone(
        &mut self,
        context: &FormContext,
        value: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.enter_text(context, Field::Phone, value).await
    }

    pub async fn first_name(&mut self, context: &FormContext) -> ProbeResult<String> {
        self.get_value(context, Field::FirstName).await
    }

    pub async fn email(&mut self, context: &FormContext) -> ProbeResult<String> {
        self.get_value(context, Field::Email).await
    }

    pub async fn select_state(
        &mut self,
        context: &FormContext,
        state: &str,
    ) -> ProbeResult<ActionOutcome> {
        self.select_option(context, Field::State, state).await
    }

    pub async fn check_terms(&mut self, context: &FormContext) -> ProbeResult<ActionOutcome> {
        self.set_checkbox(context, Field::Terms, true).await
    }

    pub async fn uncheck_terms(&mut self, context: &FormContext) -> ProbeResult<ActionOutcome> {
        self.set_checkbox(context, Field::Terms, false).await
    }

    /// Key/value pairs the result page reports, possibly empty
    pub async fn submission_data(&mut self) -> ProbeResult<SubmissionData> {
        self.navigator.return_to_top_level().await?;
        Ok(self.interpreter().extract_submission_data().await)
    }

    pub async fn is_submission_confirmed(&mut self) -> ProbeResult<bool> {
        self.navigator.return_to_top_level().await?;
        Ok(self.interpreter().is_submission_confirmed().await)
    }

    fn interpreter(&self) -> ResponseInterpreter<'_, D> {
        ResponseInterpreter::new(
            self.navigator.driver(),
            &self.config.submission_heading,
            &self.config.expected_keys,
            self.config.timing().settle_delay,
        )
    }

    async fn perform(
        &mut self,
        context: &FormContext,
        field: Field,
        op: FieldOp<'_>,
    ) -> ProbeResult<FieldOutcome> {
        let descriptor = self.catalog.get(field, context.section())?.clone();
        debug!("{:?} on {} in {}", op, descriptor.target(), context);

        let outcome = match self.navigator.enter(context).await {
            Ok(()) => self.apply(context, &descriptor, op).await,
            Err(e) => Err(e),
        };
        self.navigator.leave(context, outcome).await
    }

    async fn apply(
        &self,
        context: &FormContext,
        descriptor: &FieldDescriptor,
        op: FieldOp<'_>,
    ) -> ProbeResult<FieldOutcome> {
        let chain = match op {
            FieldOp::Choose(option) => radio_chain(descriptor, option),
            _ => descriptor.chain.clone(),
        };

        let element = match self
            .locate(context, &descriptor.target(), &chain, descriptor.optional)
            .await
        {
            Ok(element) => element,
            Err(e) if descriptor.optional && e.is_not_found() => {
                info!("{} is not present, skipping", descriptor.target());
                return Ok(FieldOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let driver = self.navigator.driver();
        let actions = Actions::new(driver, self.config.timing());
        let outcome = match op {
            FieldOp::Type(text) => {
                FieldOutcome::Action(actions.type_and_verify(&element, text).await)
            }
            FieldOp::Read => FieldOutcome::Value(driver.value(&element).await?),
            FieldOp::Clear => {
                driver.clear(&element).await?;
                FieldOutcome::Action(ActionOutcome::Completed)
            }
            FieldOp::Select(option) => {
                if descriptor.role != FieldRole::Select {
                    debug!("{} is a {:?}, selecting anyway", descriptor.target(), descriptor.role);
                }
                FieldOutcome::Action(actions.select_option(&element, option).await)
            }
            FieldOp::Check(desired) => {
                FieldOutcome::Action(actions.set_checked(&element, desired).await)
            }
            FieldOp::IsChecked => FieldOutcome::Checked(driver.is_selected(&element).await?),
            FieldOp::Choose(_) => FieldOutcome::Action(actions.set_checked(&element, true).await),
            FieldOp::Click => FieldOutcome::Action(actions.click(&element).await),
        };
        Ok(outcome)
    }

    /// Resolve a chain in the current context; shadow sections go through the
    /// host's shadow root using each strategy's selector form
    async fn locate(
        &self,
        context: &FormContext,
        target: &str,
        chain: &StrategyChain,
        optional: bool,
    ) -> ProbeResult<D::Element> {
        let driver = self.navigator.driver();
        let FormContext::Shadow { heading } = context else {
            return ElementResolver::new(driver, self.sink.as_ref(), self.config.timing())
                .resolve(target, chain)
                .await
                .map(|resolved| resolved.element);
        };

        let mut attempts = Vec::with_capacity(chain.len());
        for strategy in chain {
            let Some(selector) = strategy.to_css() else {
                attempts.push(StrategyAttempt::new(
                    strategy.description(),
                    "no selector form inside a shadow root",
                ));
                continue;
            };
            match self.navigator.wait_in_shadow(heading, &selector).await {
                Ok(element) => {
                    info!("Resolved {} via {} in shadow root", target, strategy);
                    return Ok(element);
                }
                Err(ProbeError::ShadowNotFound { attempts: inner, .. }) => {
                    let reasons: Vec<String> = inner
                        .iter()
                        .map(|a| format!("{}: {}", a.strategy, a.error))
                        .collect();
                    attempts.push(StrategyAttempt::new(strategy.description(), reasons.join("; ")));
                }
                Err(e) => return Err(e),
            }
        }

        if !optional {
            capture_failure(driver, self.sink.as_ref(), &format!("shadow {}", target)).await;
        }
        Err(ProbeError::ShadowNotFound {
            host: heading.clone(),
            attempts,
        })
    }
}

fn action_outcome(outcome: FieldOutcome) -> ActionOutcome {
    match outcome {
        FieldOutcome::Action(outcome) => outcome,
        _ => ActionOutcome::Unchanged,
    }
}

/// Chain for one radio option: its label, an id equal to the value, then the
/// group member carrying that value
fn radio_chain(group: &FieldDescriptor, option: &str) -> StrategyChain {
    let value = option.to_lowercase();
    let mut chain = StrategyChain::starting_with(LocatorStrategy::label(option))
        .then(LocatorStrategy::id(value.clone()));
    for strategy in &group.chain {
        if let Some(selector) = strategy.to_css() {
            chain = chain.then(
                LocatorStrategy::css(format!("{}{}", selector, css_attr("value", &value)))
                    .described(format!("{} with value '{}'", strategy, value)),
            );
        }
    }
    chain
}

#[cfg(test)]
#[path = "form_test.rs"]
mod form_test;
