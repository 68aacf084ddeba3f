//! Declarative acceptance test runner.
//!
//! A [`TestCase`] is a list of [`Step`]s run against one or more
//! [`Provider`]s. Each apply step refreshes recorded state, plans every
//! configured resource, applies the plan, runs its checks, and then
//! requires the follow-up plan to be empty. Whatever is left in state is
//! destroyed at the end, also when a step failed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ferroform_core::attrs::flatten;
use ferroform_provider::{
    Connections, InstanceState, OperationContext, PlanAction, Provider, ProviderConfig,
    ProviderError, ResourceAddr,
};
use serde_json::Value;

use crate::check::Check;
use crate::error::HarnessError;

/// One `resource "<type>" "<name>" { ... }` block.
#[derive(Debug, Clone)]
pub struct ResourceBlock {
    pub addr: ResourceAddr,
    /// Provider alias; `None` is the default provider.
    pub provider: Option<String>,
    pub body: Value,
}

/// The configuration applied by one step, in dependency order.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub resources: Vec<ResourceBlock>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(self, resource_type: &str, name: &str, body: Value) -> Self {
        self.push(resource_type, name, None, body)
    }

    /// A resource managed through the provider registered as `alias`.
    pub fn resource_with_provider(
        self,
        resource_type: &str,
        name: &str,
        alias: &str,
        body: Value,
    ) -> Self {
        self.push(resource_type, name, Some(alias.to_string()), body)
    }

    fn push(
        mut self,
        resource_type: &str,
        name: &str,
        provider: Option<String>,
        body: Value,
    ) -> Self {
        self.resources.push(ResourceBlock {
            addr: ResourceAddr::new(resource_type, name),
            provider,
            body,
        });
        self
    }
}

pub enum Step {
    Apply {
        config: Config,
        checks: Vec<Check>,
        expect_non_empty_plan: bool,
    },
    /// Import by the recorded id and compare with recorded state.
    Import {
        address: String,
        verify_ignore: Vec<String>,
    },
    /// Delete the remote entity behind the harness's back; the next plan
    /// must want to recreate it.
    Disappear { address: String },
}

impl Step {
    pub fn apply(config: Config, checks: Vec<Check>) -> Self {
        Step::Apply {
            config,
            checks,
            expect_non_empty_plan: false,
        }
    }

    pub fn import(address: &str) -> Self {
        Self::import_ignoring(address, &[])
    }

    pub fn import_ignoring(address: &str, verify_ignore: &[&str]) -> Self {
        Step::Import {
            address: address.to_string(),
            verify_ignore: verify_ignore.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn disappear(address: &str) -> Self {
        Step::Disappear {
            address: address.to_string(),
        }
    }
}

pub struct TestCase {
    pub steps: Vec<Step>,
    /// After the final destroy, every destroyed instance must read as gone.
    pub check_destroy: bool,
    /// Errors whose message contains one of these skip the case instead of
    /// failing it.
    pub skip_messages: Vec<String>,
}

impl TestCase {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            check_destroy: true,
            skip_messages: Vec::new(),
        }
    }

    pub fn skip_on_message(mut self, message: &str) -> Self {
        self.skip_messages.push(message.to_string());
        self
    }
}

/// How a case ended when it didn't fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct Tracked {
    pub addr: ResourceAddr,
    pub provider: Option<String>,
    pub state: InstanceState,
}

/// Recorded instance state, in creation order.
#[derive(Debug, Clone, Default)]
pub struct State {
    resources: Vec<Tracked>,
}

impl State {
    pub fn get(&self, address: &str) -> Result<&InstanceState, HarnessError> {
        self.tracked(address).map(|t| &t.state)
    }

    pub fn tracked(&self, address: &str) -> Result<&Tracked, HarnessError> {
        self.resources
            .iter()
            .find(|t| t.addr.to_string() == address)
            .ok_or_else(|| HarnessError::NotInState(address.to_string()))
    }

    pub fn addresses(&self) -> impl Iterator<Item = String> + '_ {
        self.resources.iter().map(|t| t.addr.to_string())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn upsert(&mut self, tracked: Tracked) {
        match self.resources.iter_mut().find(|t| t.addr == tracked.addr) {
            Some(slot) => *slot = tracked,
            None => self.resources.push(tracked),
        }
    }

    fn remove(&mut self, addr: &ResourceAddr) -> Option<Tracked> {
        let idx = self.resources.iter().position(|t| &t.addr == addr)?;
        Some(self.resources.remove(idx))
    }
}

fn select<'a>(
    default: &'a Provider,
    aliases: &'a BTreeMap<String, Provider>,
    alias: Option<&str>,
) -> Result<&'a Provider, HarnessError> {
    match alias {
        None => Ok(default),
        Some(alias) => aliases
            .get(alias)
            .ok_or_else(|| HarnessError::UnknownProvider(alias.to_string())),
    }
}

pub struct Harness {
    conns: Arc<dyn Connections>,
    default: Provider,
    aliases: BTreeMap<String, Provider>,
    state: State,
    last_config: Option<Config>,
    ctx: OperationContext,
}

impl Harness {
    pub fn new(config: ProviderConfig, conns: Arc<dyn Connections>) -> Self {
        Self {
            default: Provider::new(config, conns.clone()),
            conns,
            aliases: BTreeMap::new(),
            state: State::default(),
            last_config: None,
            ctx: OperationContext::new(),
        }
    }

    /// Register an aliased provider sharing the same connections, e.g. one
    /// per region for multi-Region resources.
    pub fn with_provider(mut self, alias: &str, config: ProviderConfig) -> Self {
        self.aliases
            .insert(alias.to_string(), Provider::new(config, self.conns.clone()));
        self
    }

    pub fn provider(&self, alias: Option<&str>) -> Result<&Provider, HarnessError> {
        select(&self.default, &self.aliases, alias)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    pub async fn run(&mut self, case: TestCase) -> Result<RunOutcome, HarnessError> {
        let mut result = Ok(());
        for (i, step) in case.steps.iter().enumerate() {
            let step_no = i + 1;
            tracing::debug!(step = step_no, "running step");
            if let Err(e) = self.run_step(step).await {
                result = Err(e.in_step(step_no));
                break;
            }
        }

        let destroyed = self.destroy().await;

        if let Err(e) = result {
            if let Err(destroy_err) = &destroyed {
                tracing::warn!(error = %destroy_err, "destroy after failed step also failed");
            }
            let chain = ferroform_provider::error::format_err_chain(&e);
            if let Some(msg) = case.skip_messages.iter().find(|m| chain.contains(m.as_str())) {
                tracing::warn!(reason = %msg, "skipping test case");
                return Ok(RunOutcome::Skipped(msg.clone()));
            }
            return Err(e);
        }

        let destroyed = destroyed?;
        if case.check_destroy {
            self.check_destroyed(&destroyed).await?;
        }
        Ok(RunOutcome::Passed)
    }

    async fn run_step(&mut self, step: &Step) -> Result<(), HarnessError> {
        match step {
            Step::Apply {
                config,
                checks,
                expect_non_empty_plan,
            } => {
                self.apply(config).await?;
                for check in checks {
                    check.evaluate(&self.state)?;
                }

                self.refresh().await?;
                let pending = self.pending_changes(config)?;
                match (pending.is_empty(), *expect_non_empty_plan) {
                    (false, false) => Err(HarnessError::NonEmptyPlan(pending.join(", "))),
                    (true, true) => Err(HarnessError::EmptyPlan),
                    _ => Ok(()),
                }
            }
            Step::Import {
                address,
                verify_ignore,
            } => self.import_verify(address, verify_ignore).await,
            Step::Disappear { address } => self.disappear(address).await,
        }
    }

    /// Refresh every recorded instance, dropping the ones that are gone.
    /// Returns the addresses that disappeared.
    pub async fn refresh(&mut self) -> Result<Vec<String>, HarnessError> {
        let mut gone = Vec::new();
        for tracked in self.state.resources.clone() {
            let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
            match provider.read(&self.ctx, &tracked.state).await? {
                Some(state) => self.state.upsert(Tracked { state, ..tracked }),
                None => {
                    tracing::debug!(address = %tracked.addr, "instance gone on refresh");
                    self.state.remove(&tracked.addr);
                    gone.push(tracked.addr.to_string());
                }
            }
        }
        Ok(gone)
    }

    /// Describe what applying `config` would change, one entry per address.
    pub fn pending_changes(&self, config: &Config) -> Result<Vec<String>, HarnessError> {
        let mut pending = Vec::new();
        let wanted: BTreeSet<&ResourceAddr> = config.resources.iter().map(|b| &b.addr).collect();

        for tracked in &self.state.resources {
            if !wanted.contains(&tracked.addr) {
                pending.push(format!("{} (destroy)", tracked.addr));
            }
        }
        for block in &config.resources {
            let provider = select(&self.default, &self.aliases, block.provider.as_deref())?;
            let prior = self.state.get(&block.addr.to_string()).ok();
            let planned = provider.plan(&block.addr.resource_type, prior, &block.body)?;
            if planned.has_changes() {
                let fields: Vec<&str> = planned.delta.fields().collect();
                pending.push(format!("{} ({:?} {})", block.addr, planned.action, fields.join(",")));
            }
        }
        Ok(pending)
    }

    /// Bring recorded state in line with `config`.
    pub async fn apply(&mut self, config: &Config) -> Result<(), HarnessError> {
        self.refresh().await?;
        self.last_config = Some(config.clone());

        let wanted: BTreeSet<&ResourceAddr> = config.resources.iter().map(|b| &b.addr).collect();
        let orphans: Vec<Tracked> = self
            .state
            .resources
            .iter()
            .rev()
            .filter(|t| !wanted.contains(&t.addr))
            .cloned()
            .collect();
        for tracked in orphans {
            let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
            provider.delete(&self.ctx, &tracked.state).await?;
            self.state.remove(&tracked.addr);
        }

        for block in &config.resources {
            let provider = select(&self.default, &self.aliases, block.provider.as_deref())?;
            let resource_type = block.addr.resource_type.as_str();
            let prior = self.state.get(&block.addr.to_string()).ok().cloned();
            let planned = provider.plan(resource_type, prior.as_ref(), &block.body)?;

            let applied = match (planned.action, prior) {
                (PlanAction::NoOp, _) => continue,
                (PlanAction::Create, _) | (_, None) => {
                    provider.create(&self.ctx, resource_type, &block.body).await
                }
                (PlanAction::Update, Some(prior)) => {
                    provider.update(&self.ctx, &prior, &block.body).await
                }
                (PlanAction::Replace, Some(prior)) => {
                    tracing::debug!(address = %block.addr, "replacing");
                    provider.delete(&self.ctx, &prior).await?;
                    self.state.remove(&block.addr);
                    provider.create(&self.ctx, resource_type, &block.body).await
                }
            };

            let state = match applied {
                Ok(state) => state,
                Err(e) => {
                    // The remote entity exists; keep it in state so it gets
                    // destroyed.
                    if let ProviderError::IncompleteCreate { state, .. } = &e {
                        tracing::warn!(address = %block.addr, id = %state.id, "recorded tainted");
                        self.state.upsert(Tracked {
                            addr: block.addr.clone(),
                            provider: block.provider.clone(),
                            state: (**state).clone(),
                        });
                    }
                    return Err(e.into());
                }
            };
            tracing::debug!(
                address = %block.addr,
                id = %state.id,
                action = ?planned.action,
                "applied"
            );
            self.state.upsert(Tracked {
                addr: block.addr.clone(),
                provider: block.provider.clone(),
                state,
            });
        }
        Ok(())
    }

    async fn import_verify(
        &mut self,
        address: &str,
        verify_ignore: &[String],
    ) -> Result<(), HarnessError> {
        let tracked = self.state.tracked(address)?.clone();
        let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
        let imported = provider
            .import(&self.ctx, &tracked.addr.resource_type, &tracked.state.id)
            .await?;

        let ignored = |key: &str| {
            verify_ignore
                .iter()
                .any(|ig| key == ig || key.starts_with(&format!("{ig}.")))
        };
        let recorded = flatten(&tracked.state.attributes);
        let got = flatten(&imported.attributes);

        let keys: BTreeSet<&String> = recorded.keys().chain(got.keys()).collect();
        let diffs: Vec<String> = keys
            .into_iter()
            .filter(|k| !ignored(k))
            .filter(|k| recorded.get(*k) != got.get(*k))
            .map(|k| format!("{k}: state={:?} imported={:?}", recorded.get(k), got.get(k)))
            .collect();

        if diffs.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::ImportMismatch {
                address: address.to_string(),
                diffs: diffs.join("; "),
            })
        }
    }

    async fn disappear(&mut self, address: &str) -> Result<(), HarnessError> {
        let tracked = self.state.tracked(address)?.clone();
        let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
        provider.delete(&self.ctx, &tracked.state).await?;

        let gone = self.refresh().await?;
        if !gone.iter().any(|a| a == address) {
            return Err(HarnessError::Check(format!(
                "{address} still readable after it was deleted"
            )));
        }

        let config = self.last_config.clone().unwrap_or_default();
        if self.pending_changes(&config)?.is_empty() {
            return Err(HarnessError::EmptyPlan);
        }
        Ok(())
    }

    /// Delete everything still in state, newest first.
    pub async fn destroy(&mut self) -> Result<Vec<Tracked>, HarnessError> {
        let mut destroyed = Vec::new();
        while let Some(tracked) = self.state.resources.pop() {
            let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
            if let Err(e) = provider.delete(&self.ctx, &tracked.state).await {
                self.state.resources.push(tracked);
                return Err(e.into());
            }
            tracing::debug!(address = %tracked.addr, id = %tracked.state.id, "destroyed");
            destroyed.push(tracked);
        }
        Ok(destroyed)
    }

    async fn check_destroyed(&self, destroyed: &[Tracked]) -> Result<(), HarnessError> {
        for tracked in destroyed {
            let provider = select(&self.default, &self.aliases, tracked.provider.as_deref())?;
            if provider.read(&self.ctx, &tracked.state).await?.is_some() {
                return Err(HarnessError::StillExists(format!(
                    "{} ({})",
                    tracked.addr, tracked.state.id
                )));
            }
        }
        Ok(())
    }
}
