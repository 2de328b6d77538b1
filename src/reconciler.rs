//! Reconciler for computing the actions that converge desired state.
//!
//! This module reads every configured application through the convergent
//! reader, compares it with its spec, and reports what must happen to each
//! one. It never mutates the control plane beyond resource uploads.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{ApplicationSpec, ConvergeConfig};
use crate::controlplane::ControlPlane;
use crate::error::Result;
use crate::planner::{ApplicationDiff, DiffEngine, ReconcileAction};
use crate::reader::{ApplicationReader, CallContext, ResourceView};
use crate::resources::{Filesystem, PendingResourceUpload, upload_pending_resources};

/// Reconciler for one model.
pub struct Reconciler<'a, C: ControlPlane + ?Sized> {
    /// Configuration.
    config: &'a ConvergeConfig,
    /// Control plane client.
    client: &'a C,
    /// Diff engine.
    diff_engine: DiffEngine,
}

/// Planned actions for every configured application.
#[derive(Debug, Serialize)]
pub struct ReconcilePlan {
    /// Model the plan applies to.
    pub model: String,
    /// Per application diffs, in configuration order.
    pub diffs: Vec<ApplicationDiff>,
}

impl<'a, C: ControlPlane + ?Sized> Reconciler<'a, C> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(config: &'a ConvergeConfig, client: &'a C) -> Self {
        Self {
            config,
            client,
            diff_engine: DiffEngine::new(),
        }
    }

    /// Builds a fresh context carrying the configured read deadline.
    #[must_use]
    pub fn context(&self) -> CallContext {
        match self.config.retry.deadline() {
            Some(deadline) => CallContext::new().with_timeout(deadline),
            None => CallContext::new(),
        }
    }

    /// Reads one application. An application that never became visible is
    /// reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns any read failure other than an exhausted not-found budget.
    pub async fn observe(&self, ctx: &CallContext, name: &str) -> Result<Option<ResourceView>> {
        let reader = ApplicationReader::new(self.client, self.config.retry.budget());

        match reader
            .read_application(ctx, &self.config.controller.model, name)
            .await
        {
            Ok(view) => Ok(Some(view)),
            Err(err) if err.is_not_found() => {
                warn!("Application {name} not found: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Computes the diff for one application spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the desired state cannot be compared.
    pub async fn diff(&self, ctx: &CallContext, spec: &ApplicationSpec) -> Result<ApplicationDiff> {
        let observed = self.observe(ctx, &spec.name).await?;
        self.diff_engine.compute(spec, observed.as_ref())
    }

    /// Plans every configured application, in configuration order.
    ///
    /// Each application gets a fresh context so one slow read does not eat
    /// the deadline of the next.
    ///
    /// # Errors
    ///
    /// Returns the first failing read or comparison.
    pub async fn plan(&self) -> Result<ReconcilePlan> {
        info!(
            "Planning {} application(s) in model {}",
            self.config.applications.len(),
            self.config.controller.model
        );

        let mut diffs = Vec::with_capacity(self.config.applications.len());
        for spec in &self.config.applications {
            let ctx = self.context();
            match self.diff(&ctx, spec).await {
                Ok(diff) => {
                    info!("{diff}");
                    diffs.push(diff);
                }
                Err(err) => {
                    error!("Failed to plan {}: {err}", spec.name);
                    return Err(err);
                }
            }
        }

        Ok(ReconcilePlan {
            model: self.config.controller.model.clone(),
            diffs,
        })
    }

    /// Uploads local resources for `application`.
    ///
    /// # Errors
    ///
    /// Returns the first upload failure.
    pub async fn upload_resources<F: Filesystem + ?Sized>(
        &self,
        application: &str,
        pending: &[PendingResourceUpload],
        filesystem: &F,
    ) -> Result<()> {
        let ctx = self.context();
        upload_pending_resources(
            &ctx,
            self.client,
            &self.config.controller.model,
            application,
            pending,
            filesystem,
        )
        .await
    }
}

impl ReconcilePlan {
    /// Returns true if any application needs action.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(ApplicationDiff::has_changes)
    }

    /// Counts applications planned for `action`.
    #[must_use]
    pub fn count(&self, action: ReconcileAction) -> usize {
        self.diffs.iter().filter(|d| d.action == action).count()
    }
}

impl std::fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plan for model {}:", self.model)?;
        writeln!(f, "  Create: {}", self.count(ReconcileAction::Create))?;
        writeln!(f, "  Update: {}", self.count(ReconcileAction::Update))?;
        writeln!(f, "  Replace: {}", self.count(ReconcileAction::Replace))?;
        writeln!(f, "  Unchanged: {}", self.count(ReconcileAction::NoOp))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::controlplane::{
        ApiError, ApplicationResult, Base, ConfigResult, InfoResult, MockControlPlane,
        StatusSnapshot,
    };
    use crate::error::{ControlPlaneError, ConvergeError, RemoteCall};

    fn config() -> ConvergeConfig {
        ConfigParser::new()
            .parse_yaml(
                r"
controller:
  url: https://c.example
  model: testmodel
retry:
  max_attempts: 2
  initial_delay_ms: 1
  max_delay_ms: 1
applications:
  - name: present
    charm: {name: testcharm, base: ubuntu@22.04}
    units: 0
  - name: absent
    charm: {name: othercharm}
",
                None,
            )
            .unwrap()
    }

    fn info(name: &str) -> InfoResult {
        InfoResult {
            result: Some(ApplicationResult {
                tag: format!("application-{name}"),
                charm: String::from("ch:amd64/jammy/testcharm-5"),
                base: Base::parse("ubuntu@22.04").unwrap(),
                channel: String::from("stable"),
                principal: true,
                ..ApplicationResult::default()
            }),
            error: None,
        }
    }

    fn not_found() -> InfoResult {
        InfoResult {
            result: None,
            error: Some(ApiError {
                message: String::from("not found"),
                code: String::from("not found"),
            }),
        }
    }

    #[tokio::test]
    async fn test_plan_maps_not_found_to_create() {
        let mut client = MockControlPlane::new();
        client.expect_open_session().times(2).returning(|_| Ok(()));
        client.expect_close_session().times(2).return_const(());
        client
            .expect_application_info()
            .returning(|_, tags| {
                if tags[0] == "application-present" {
                    Ok(vec![info("present")])
                } else {
                    Ok(vec![not_found()])
                }
            });
        client
            .expect_status()
            .times(1)
            .returning(|_| Ok(StatusSnapshot::default()));
        client.expect_application_config().times(1).returning(|_, app| {
            Ok(ConfigResult {
                application: app.to_string(),
                ..ConfigResult::default()
            })
        });

        let config = config();
        let plan = Reconciler::new(&config, &client).plan().await.unwrap();

        assert_eq!(plan.diffs.len(), 2);
        assert_eq!(plan.diffs[0].action, ReconcileAction::NoOp);
        assert_eq!(plan.diffs[1].action, ReconcileAction::Create);
        assert!(plan.has_changes());
        assert_eq!(plan.count(ReconcileAction::Create), 1);
    }

    #[tokio::test]
    async fn test_plan_stops_on_hard_error() {
        let mut client = MockControlPlane::new();
        client.expect_open_session().times(1).returning(|_| Ok(()));
        client.expect_close_session().times(1).return_const(());
        client.expect_application_info().times(1).returning(|_, _| {
            Err(ControlPlaneError::Authentication {
                call: RemoteCall::ApplicationInfo,
                message: String::from("Invalid API token"),
            }
            .into())
        });

        let config = config();
        let err = Reconciler::new(&config, &client).plan().await.unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::ControlPlane(ControlPlaneError::Authentication { .. })
        ));
    }

    #[test]
    fn test_context_without_deadline() {
        let client = MockControlPlane::new();
        let config = config();
        assert!(Reconciler::new(&config, &client).context().deadline().is_none());
    }
}
