// Resource purchase sub-flow: buy more of the exhausted resource, then re-enter.
use super::clock::Clock;
use super::engine::StepEngine;
use super::poll::PollOutcome;
use super::types::{PurchaseOutcome, RunState};
use crate::adb::AdbClient;
use crate::config::ResourceCheckStep;
use crate::template_matching::{TemplateId, TemplateLocator};
use log::warn;

impl<D, L, C> StepEngine<D, L, C>
where
    D: AdbClient,
    L: TemplateLocator,
    C: Clock,
{
    /// Never lets `resource_purchases` pass the limit. Gives up
    /// (`LimitExceeded`) when no attempt gets back into the stage, or when
    /// the run is cancelled mid-flow.
    pub async fn attempt_purchase(
        &self,
        state: &mut RunState,
        check: &ResourceCheckStep,
        start: Option<&TemplateId>,
    ) -> PurchaseOutcome {
        let attempts = self.config.purchase_attempts;
        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return PurchaseOutcome::LimitExceeded;
            }
            if state.purchases_exhausted() {
                self.status.progress(format!(
                    "Resource purchase limit reached ({}/{})",
                    state.resource_purchases, state.resource_purchase_limit
                ));
                return PurchaseOutcome::LimitExceeded;
            }

            let confirm = check.purchase_template();
            let Some(found) = self.find(confirm).await else {
                warn!("purchase attempt {attempt}/{attempts}: template {confirm} not visible");
                self.backoff(attempt, attempts).await;
                continue;
            };
            if !self.tap(&found).await {
                self.backoff(attempt, attempts).await;
                continue;
            }

            self.sleep(self.config.purchase_settle).await;
            // Not counted: completion was never confirmed.
            if self.cancel.is_cancelled() {
                return PurchaseOutcome::LimitExceeded;
            }
            self.sleep(self.config.purchase_complete).await;
            state.resource_purchases += 1;
            self.status.progress(format!(
                "Resource purchased ({}/{})",
                state.resource_purchases, state.resource_purchase_limit
            ));

            let Some(start) = start else {
                return PurchaseOutcome::Continue;
            };
            match self.tap_with_retry(start).await {
                PollOutcome::Found(_) => return PurchaseOutcome::Continue,
                PollOutcome::Cancelled => return PurchaseOutcome::LimitExceeded,
                PollOutcome::Exhausted => {
                    warn!("purchase attempt {attempt}/{attempts}: start template {start} not found");
                    self.backoff(attempt, attempts).await;
                }
            }
        }
        self.status.progress(format!(
            "Resource purchase failed after {attempts} attempts"
        ));
        PurchaseOutcome::LimitExceeded
    }

    async fn backoff(&self, attempt: u32, attempts: u32) {
        if attempt < attempts {
            self.sleep(self.config.purchase_backoff).await;
        }
    }
}
