//! Merges info, status and config lookups into a [`ResourceView`].

use chrono::Utc;
use tracing::{debug, warn};

use crate::controlplane::{
    ApplicationResult, ConfigResult, ControlPlane, StatusSnapshot, parse_application_tag,
};
use crate::error::{ControlPlaneError, RemoteCall, Result};

use super::context::CallContext;
use super::view::{CharmRef, ResourceView, UnitPlacement};

/// Builds views from the info result of a convergent read.
#[derive(Debug)]
pub struct ViewAssembler<'a, C: ControlPlane + ?Sized> {
    client: &'a C,
}

impl<'a, C: ControlPlane + ?Sized> ViewAssembler<'a, C> {
    /// Creates an assembler over `client`.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Fetches status and config for `application` and merges them with `info`.
    ///
    /// # Errors
    ///
    /// Returns the first failing lookup's error, an invalid response error if
    /// `info` does not describe `application`, or an interrupt error.
    pub async fn assemble(
        &self,
        ctx: &CallContext,
        model: &str,
        application: &str,
        info: ApplicationResult,
    ) -> Result<ResourceView> {
        check_identity(&info, application)?;

        let status = ctx
            .run(self.client.status(model))
            .await
            .map_err(|i| i.into_read_error(application, 0))??;

        let config = ctx
            .run(self.client.application_config(model, application))
            .await
            .map_err(|i| i.into_read_error(application, 0))??;

        merge(model, application, info, &status, config)
    }
}

fn check_identity(info: &ApplicationResult, application: &str) -> Result<()> {
    match info.name() {
        Some(name) if name == application => Ok(()),
        _ => Err(ControlPlaneError::invalid_response(
            RemoteCall::ApplicationInfo,
            format!("tag {:?} does not name application {application}", info.tag),
        )
        .into()),
    }
}

fn merge(
    model: &str,
    application: &str,
    info: ApplicationResult,
    status: &StatusSnapshot,
    config: ConfigResult,
) -> Result<ResourceView> {
    let charm = CharmRef::parse(&info.charm).ok_or_else(|| {
        ControlPlaneError::invalid_response(
            RemoteCall::ApplicationInfo,
            format!("unparseable charm URL {:?}", info.charm),
        )
    })?;

    if !config.charm.is_empty() && config.charm != info.charm {
        debug!(
            "Charm skew for {application}: info reports {}, config reports {}",
            info.charm, config.charm
        );
    }
    if !config.base.is_empty() && config.base != info.base {
        debug!(
            "Base skew for {application}: info reports {}, config reports {}",
            info.base, config.base
        );
    }

    let (units, status_exposed) = match status.application(application) {
        Some(app_status) => (
            app_status
                .units
                .iter()
                .map(|(unit, unit_status)| UnitPlacement {
                    unit: unit.clone(),
                    machine: unit_status.machine.clone(),
                })
                .collect(),
            app_status.exposed,
        ),
        None => {
            warn!("Application {application} missing from status of model {model}");
            (Vec::new(), false)
        }
    };

    let mut composed = config.charm_config;
    composed.extend(config.application_config);

    Ok(ResourceView {
        model: model.to_string(),
        name: application.to_string(),
        constraints: info.constraints.merged_with(&config.constraints),
        tag: info.tag,
        charm,
        base: info.base,
        channel: info.channel,
        principal: info.principal,
        exposed: info.exposed || status_exposed,
        units,
        config: composed,
        endpoint_bindings: config.endpoint_bindings,
        storage: config.storage,
        resources: config.resources,
        observed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{
        ApplicationStatus, Base, Constraints, MockControlPlane, StorageDirective, UnitStatus,
    };
    use crate::error::{ConvergeError, ReadError};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn info() -> ApplicationResult {
        ApplicationResult {
            tag: String::from("application-testapplication"),
            charm: String::from("ch:amd64/jammy/testcharm-5"),
            base: Base::parse("ubuntu@22.04").unwrap(),
            channel: String::from("stable"),
            constraints: Constraints::parse("arch=amd64").unwrap(),
            principal: true,
            exposed: false,
        }
    }

    fn status() -> StatusSnapshot {
        let mut units = BTreeMap::new();
        units.insert(
            String::from("testapplication/0"),
            UnitStatus {
                machine: String::from("0"),
            },
        );
        let mut applications = BTreeMap::new();
        applications.insert(
            String::from("testapplication"),
            ApplicationStatus {
                charm: String::from("ch:amd64/jammy/testcharm-5"),
                exposed: true,
                units,
            },
        );
        StatusSnapshot {
            model: String::from("testmodel"),
            applications,
        }
    }

    fn config() -> ConfigResult {
        let mut storage = BTreeMap::new();
        storage.insert(
            String::from("runner"),
            StorageDirective {
                size: String::from("10G"),
                pool: String::from("rootfs"),
                count: 1,
            },
        );
        ConfigResult {
            application: String::from("testapplication"),
            charm: String::from("ch:amd64/jammy/testcharm-7"),
            base: Base::parse("ubuntu@24.04").unwrap(),
            channel: String::from("edge"),
            constraints: Constraints::parse("arch=arm64 mem=4G").unwrap(),
            charm_config: BTreeMap::from([
                (String::from("log-level"), json!("info")),
                (String::from("port"), json!(8080)),
            ]),
            application_config: BTreeMap::from([(String::from("log-level"), json!("debug"))]),
            endpoint_bindings: BTreeMap::from([(String::new(), String::from("alpha"))]),
            storage,
            resources: BTreeMap::from([(String::from("image"), String::from("nginx:1.25"))]),
        }
    }

    fn client_with(status: StatusSnapshot, config: ConfigResult) -> MockControlPlane {
        let mut client = MockControlPlane::new();
        client
            .expect_status()
            .times(1)
            .return_once(move |_| Ok(status));
        client
            .expect_application_config()
            .withf(|model, app| model == "testmodel" && app == "testapplication")
            .times(1)
            .return_once(move |_, _| Ok(config));
        client
    }

    #[tokio::test]
    async fn test_info_wins_on_disagreement() {
        let client = client_with(status(), config());
        let view = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", info())
            .await
            .unwrap();

        assert_eq!(view.name, "testapplication");
        assert_eq!(view.charm.revision, Some(5));
        assert_eq!(view.base.channel, "22.04");
        assert_eq!(view.channel, "stable");
        assert_eq!(view.constraints.arch.as_deref(), Some("amd64"));
        assert_eq!(view.constraints.mem, Some(4096));
        assert!(view.exposed);
    }

    #[tokio::test]
    async fn test_units_and_config_sources() {
        let client = client_with(status(), config());
        let view = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", info())
            .await
            .unwrap();

        assert_eq!(view.placement(), "0");
        assert_eq!(view.units[0].unit, "testapplication/0");
        assert_eq!(view.config["log-level"], json!("debug"));
        assert_eq!(view.config["port"], json!(8080));
        assert_eq!(view.storage["runner"].size, "10G");
        assert_eq!(view.endpoint_bindings[""], "alpha");
        assert_eq!(view.resources["image"], "nginx:1.25");
    }

    #[tokio::test]
    async fn test_missing_status_entry_yields_no_units() {
        let client = client_with(StatusSnapshot::default(), config());
        let view = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", info())
            .await
            .unwrap();

        assert!(view.units.is_empty());
        assert!(!view.exposed);
    }

    #[tokio::test]
    async fn test_status_failure_is_tagged() {
        let mut client = MockControlPlane::new();
        client.expect_status().times(1).returning(|_| {
            Err(ControlPlaneError::network(RemoteCall::Status, "connection reset").into())
        });
        client.expect_application_config().never();

        let err = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", info())
            .await
            .unwrap_err();

        match err {
            ConvergeError::ControlPlane(e) => assert_eq!(e.call(), RemoteCall::Status),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_config_failure_is_tagged_and_not_retried() {
        let mut client = MockControlPlane::new();
        client.expect_status().times(1).returning(|_| Ok(status()));
        client.expect_application_config().times(1).returning(|_, _| {
            Err(ControlPlaneError::Remote {
                call: RemoteCall::ApplicationConfig,
                code: String::from("500"),
                message: String::from("config unavailable"),
            }
            .into())
        });

        let err = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", info())
            .await
            .unwrap_err();

        match err {
            ConvergeError::ControlPlane(e) => assert_eq!(e.call(), RemoteCall::ApplicationConfig),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_zero_attempts() {
        let mut client = MockControlPlane::new();
        client.expect_status().never();
        client.expect_application_config().never();

        let ctx = CallContext::new().with_deadline(tokio::time::Instant::now());
        let err = ViewAssembler::new(&client)
            .assemble(&ctx, "testmodel", "testapplication", info())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::Read(ReadError::DeadlineExceeded { attempts: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_mismatched_tag_is_invalid_response() {
        let mut client = MockControlPlane::new();
        client.expect_status().never();

        let mut other = info();
        other.tag = String::from("application-otherapp");

        let err = ViewAssembler::new(&client)
            .assemble(&CallContext::new(), "testmodel", "testapplication", other)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::ControlPlane(ControlPlaneError::InvalidResponse {
                call: RemoteCall::ApplicationInfo,
                ..
            })
        ));
    }
}
