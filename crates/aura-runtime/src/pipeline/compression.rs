//! Background compression cycles.
//!
//! A cycle is started by the append that claimed it and runs in its own task.
//! After a committed cycle, if the items that arrived meanwhile still reach
//! the budget, the task claims and runs one more; otherwise it exits.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use aura_core::constants::COMPRESSION_FAILED_MESSAGE;
use aura_core::events::EventPayload;

use super::PipelineDeps;

pub(crate) fn spawn_cycle(deps: Arc<PipelineDeps>) {
    drop(tokio::spawn(async move { run_cycles(&deps).await }));
}

#[instrument(skip_all, fields(session_id = %deps.session_id))]
async fn run_cycles(deps: &PipelineDeps) {
    loop {
        deps.notify(EventPayload::CompressionStarted);
        match deps
            .engine
            .run_cycle(&deps.session_id, deps.context.buffer(), &*deps.store)
            .await
        {
            Ok(Some(segment)) => deps.notify(EventPayload::CompressionComplete {
                method: segment.method,
                segment_num: segment.sequence,
            }),
            Ok(None) => debug!("buffer emptied before capture"),
            Err(e) => {
                error!(category = e.category(), error = %e, "compression cycle abandoned");
                deps.notify(EventPayload::Error {
                    message: COMPRESSION_FAILED_MESSAGE.into(),
                    command_id: None,
                });
                return;
            }
        }

        if !deps.context.buffer().lock().claim_if_due() {
            return;
        }
        debug!("items still over budget, compressing again");
    }
}
