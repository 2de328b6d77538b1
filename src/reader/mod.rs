//! Convergent application reads.
//!
//! This module turns an application name into a fresh [`ResourceView`]. A
//! read holds one control plane session, waits out the window in which a
//! freshly written application is still invisible, then merges the status
//! and config lookups into the view.

mod assembler;
mod context;
mod convergent;
mod retry;
mod view;

pub use assembler::ViewAssembler;
pub use context::{CallContext, Interrupt};
pub use convergent::ConvergentReader;
pub use retry::{
    DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, LookupOutcome, ReadState,
    RetryBudget,
};
pub use view::{CharmRef, ResourceView, UnitPlacement};

use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::controlplane::{ControlPlane, Session};
use crate::error::{ConvergeError, Result};

/// Reads applications into views.
#[derive(Debug)]
pub struct ApplicationReader<'a, C: ControlPlane + ?Sized> {
    client: &'a C,
    budget: RetryBudget,
}

impl<'a, C: ControlPlane + ?Sized> ApplicationReader<'a, C> {
    /// Creates a reader over `client`.
    #[must_use]
    pub const fn new(client: &'a C, budget: RetryBudget) -> Self {
        Self { client, budget }
    }

    /// Reads `application` from `model`.
    ///
    /// The session is released on every exit path, including when the
    /// returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ReadError::NotFound`] if the application never
    /// became visible within the budget, or the first hard failure.
    pub async fn read_application(
        &self,
        ctx: &CallContext,
        model: &str,
        application: &str,
    ) -> Result<ResourceView> {
        let read_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "read_application",
            read_id = %&read_id[..8],
            model,
            application
        );

        async {
            let session = ctx
                .run(Session::open(self.client, model))
                .await
                .map_err(|i| i.into_read_error(application, 0))??;

            let info = ConvergentReader::new(session.client(), self.budget)
                .read_by_name(ctx, model, application)
                .await?;

            let view = ViewAssembler::new(session.client())
                .assemble(ctx, model, application, info)
                .await?;

            info!(
                "Read {application}: {} unit(s), charm {}",
                view.unit_count(),
                view.charm
            );
            Ok::<_, ConvergeError>(view)
        }
        .instrument(span)
        .await
    }
}
