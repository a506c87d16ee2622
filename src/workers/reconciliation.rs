//! Reconciliation sweep.
//!
//! Webhook delivery is best-effort, so the ledger can drift from the
//! gateway in two ways:
//!
//! 1. A payment stuck in `approved`: the process crashed between the
//!    pending -> approved transition and the account credit. The sweep
//!    finishes the credit.
//! 2. A payment stuck in `pending`: the gateway reached a final status
//!    but the webhook never arrived. The sweep polls the gateway and
//!    drives the payment through the same approve/reject path a
//!    webhook would.
//!
//! A single bad payment must not abort the cycle; per-payment failures
//! are logged and the sweep moves on.

use crate::config::WorkerConfig;
use crate::database::payment_repository::Payment;
use crate::database::repository::{ApprovalOutcome, PaymentStore};
use crate::gateway::{GatewayError, GatewayPaymentStatus, PaymentGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct ReconciliationWorker {
    config: WorkerConfig,
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentStore>,
}

impl ReconciliationWorker {
    pub fn new(
        config: WorkerConfig,
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            payments,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.config.sweep_interval_secs,
            approved_resume_after_secs = self.config.approved_resume_after_secs,
            pending_poll_after_secs = self.config.pending_poll_after_secs,
            "reconciliation worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciliation worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.sweep_interval_secs)) => {
                    self.run_cycle().await;
                }
            }
        }

        info!("reconciliation worker stopped");
    }

    /// Run a single sweep outside the interval loop.
    pub async fn run_once(&self) {
        self.run_cycle().await;
    }

    async fn run_cycle(&self) {
        if let Err(e) = self.resume_stuck_approved().await {
            warn!(error = %e, "failed to sweep approved payments");
        }
        if let Err(e) = self.poll_stale_pending().await {
            warn!(error = %e, "failed to poll stale pending payments");
        }
    }

    /// Finish the credit step for payments that won the approval CAS but
    /// never reached `credited`.
    async fn resume_stuck_approved(&self) -> anyhow::Result<()> {
        let stuck = self
            .payments
            .find_stuck_approved(self.config.approved_resume_after_secs as i64)
            .await?;

        for payment in stuck {
            // Re-verify with the gateway before touching the balance; the
            // local `approved` mark alone is not grounds to move money.
            if let Some(gateway_payment_id) = payment.gateway_payment_id.as_deref() {
                match self.gateway.fetch_status(gateway_payment_id).await {
                    Ok(view) if view.status == GatewayPaymentStatus::Approved => {}
                    Ok(view) => {
                        error!(
                            payment_id = %payment.payment_id,
                            gateway_status = ?view.status,
                            "approved payment no longer approved at gateway, skipping"
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!(
                            payment_id = %payment.payment_id,
                            error = %e,
                            "could not re-verify approved payment, will retry next cycle"
                        );
                        continue;
                    }
                }
            }

            info!(
                payment_id = %payment.payment_id,
                approved_at = ?payment.approved_at,
                "resuming interrupted credit"
            );

            match self.payments.credit_approved(payment.payment_id).await {
                Ok(applied) => {
                    info!(
                        payment_id = %payment.payment_id,
                        account_id = %applied.account_id,
                        credits = applied.credits,
                        new_balance = applied.new_balance,
                        "resumed payment credited"
                    );
                }
                Err(e) => {
                    warn!(
                        payment_id = %payment.payment_id,
                        error = %e,
                        "failed to credit resumed payment, will retry next cycle"
                    );
                }
            }
        }

        Ok(())
    }

    /// Poll the gateway for pending payments that have gone quiet.
    async fn poll_stale_pending(&self) -> anyhow::Result<()> {
        let stale = self
            .payments
            .find_stale_pending(self.config.pending_poll_after_secs as i64)
            .await?;

        for payment in stale {
            // find_stale_pending only returns rows with a gateway id
            let gateway_payment_id = match payment.gateway_payment_id.as_deref() {
                Some(id) => id,
                None => continue,
            };

            match self.gateway.fetch_status(gateway_payment_id).await {
                Ok(view) => {
                    if let Err(e) = self.apply_gateway_status(&payment, view.status).await {
                        warn!(
                            payment_id = %payment.payment_id,
                            error = %e,
                            "failed to apply polled gateway status"
                        );
                    }
                }
                Err(GatewayError::NotFound { .. }) => {
                    // The ledger references a payment the gateway has no
                    // record of. Needs operator attention, not retries.
                    error!(
                        payment_id = %payment.payment_id,
                        gateway_payment_id,
                        "gateway has no record of referenced payment"
                    );
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        payment_id = %payment.payment_id,
                        error = %e,
                        "gateway unavailable while polling, will retry next cycle"
                    );
                }
                Err(e) => {
                    error!(
                        payment_id = %payment.payment_id,
                        error = %e,
                        "gateway error while polling"
                    );
                }
            }
        }

        Ok(())
    }

    async fn apply_gateway_status(
        &self,
        payment: &Payment,
        status: GatewayPaymentStatus,
    ) -> anyhow::Result<()> {
        match status {
            GatewayPaymentStatus::Approved => {
                match self
                    .payments
                    .try_transition_to_approved(payment.payment_id)
                    .await?
                {
                    ApprovalOutcome::Approved => {
                        let applied = self.payments.credit_approved(payment.payment_id).await?;
                        info!(
                            payment_id = %payment.payment_id,
                            credits = applied.credits,
                            new_balance = applied.new_balance,
                            "stale pending payment credited via polling"
                        );
                    }
                    ApprovalOutcome::AlreadyDone => {}
                    ApprovalOutcome::Conflict => {
                        warn!(
                            payment_id = %payment.payment_id,
                            "polled approval conflicts with local payment state"
                        );
                    }
                }
            }
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                let reason = match status {
                    GatewayPaymentStatus::Cancelled => "cancelled",
                    _ => "rejected",
                };
                self.payments
                    .mark_rejected(payment.payment_id, reason)
                    .await?;
                info!(
                    payment_id = %payment.payment_id,
                    reason,
                    "stale pending payment rejected via polling"
                );
            }
            GatewayPaymentStatus::Pending
            | GatewayPaymentStatus::InProcess
            | GatewayPaymentStatus::Unknown => {
                // Still settling; leave it for a later cycle.
            }
        }

        Ok(())
    }
}
