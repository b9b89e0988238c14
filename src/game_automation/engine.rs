//! Step engine: walks a stage's typed steps against one device.
//!
//! Enter once, then loop battle → end → restart → resource check until a
//! limit is reached, entry fails, or the cancel token is set. Capture and
//! match failures never abort the loop; they read as "template not visible".

use super::cancel::CancelToken;
use super::channels::StatusSender;
use super::clock::Clock;
use super::poll::{PollOutcome, poll_bounded, poll_until};
use super::types::{PurchaseOutcome, RunState, RunSummary, TerminationReason};
use crate::adb::{AdbClient, CaptureService};
use crate::config::{Action, BattleStep, Outcome, ResourceCheckStep, StageConfig, Step};
use crate::template_matching::{DEFAULT_THRESHOLD, Match, TemplateId, TemplateLocator};
use log::{debug, info, warn};
use std::ops::ControlFlow;
use std::time::Duration;

pub(crate) type Flow = ControlFlow<TerminationReason>;

/// Retry and delay constants for one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Correlation a template must reach to count as visible.
    pub threshold: f32,
    /// Locate attempts per tap before the tap counts as failed.
    pub tap_attempts: u32,
    pub tap_retry_delay: Duration,
    pub purchase_attempts: u32,
    pub purchase_backoff: Duration,
    /// After tapping the purchase confirmation.
    pub purchase_settle: Duration,
    /// After the settle delay, before counting the purchase.
    pub purchase_complete: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threshold: DEFAULT_THRESHOLD,
            tap_attempts: 3,
            tap_retry_delay: Duration::from_secs(1),
            purchase_attempts: 3,
            purchase_backoff: Duration::from_secs(1),
            purchase_settle: Duration::from_secs(2),
            purchase_complete: Duration::from_secs(3),
        }
    }
}

pub struct StepEngine<D, L, C> {
    pub(crate) capture: CaptureService<D>,
    pub(crate) locator: L,
    pub(crate) clock: C,
    pub(crate) status: StatusSender,
    pub(crate) cancel: CancelToken,
    pub(crate) config: EngineConfig,
}

impl<D, L, C> StepEngine<D, L, C>
where
    D: AdbClient,
    L: TemplateLocator,
    C: Clock,
{
    pub fn new(device: D, locator: L, clock: C, status: StatusSender, cancel: CancelToken) -> Self {
        StepEngine {
            capture: CaptureService::new(device),
            locator,
            clock,
            status,
            cancel,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capture_service(&self) -> &CaptureService<D> {
        &self.capture
    }

    /// Run `stage` until a limit, an entry failure or cancellation.
    /// `battle_limit` 0 means unbounded. Always emits a final summary.
    pub async fn run(&self, stage: &StageConfig, battle_limit: u32, purchase_limit: u32) -> RunSummary {
        let mut state = RunState::new(battle_limit, purchase_limit);
        let reason = match self.drive(stage, &mut state).await {
            ControlFlow::Break(reason) => reason,
            ControlFlow::Continue(()) => TerminationReason::BattleLimitReached,
        };
        state.cancelled = reason == TerminationReason::Cancelled;

        let summary = RunSummary {
            stage: stage.name.clone(),
            reason,
            battles_completed: state.battles_completed,
            resource_purchases: state.resource_purchases,
        };
        info!("{summary}");
        self.status.finished(&summary);
        summary
    }

    async fn drive(&self, stage: &StageConfig, state: &mut RunState) -> Flow {
        let Some(battle) = stage.battle() else {
            warn!("stage '{}' has no battle step", stage.name);
            return ControlFlow::Break(TerminationReason::EnterFailed);
        };

        self.status.progress(format!("Entering stage '{}'", stage.name));
        self.enter(stage.enter_actions()).await?;

        state.battles_completed = 1;
        self.status
            .progress(format!("Battle {} started", state.battle_progress()));
        if let Some(check) = stage.resource_check() {
            self.resource_check(stage, check, state).await?;
        }

        loop {
            self.check_cancel()?;
            if state.battle_limit_reached() {
                return ControlFlow::Break(TerminationReason::BattleLimitReached);
            }

            self.battle(battle).await?;

            for step in stage.post_battle_steps() {
                self.check_cancel()?;
                match step {
                    Step::End { actions } | Step::Restart { actions } => {
                        self.tap_visible(step.kind(), actions).await?;
                    }
                    Step::ResourceCheck(check) => self.resource_check(stage, check, state).await?,
                    Step::Enter { .. } | Step::Battle(_) => {}
                }
            }

            state.battles_completed += 1;
            self.status
                .progress(format!("Battle {} started", state.battle_progress()));
        }
    }

    pub(crate) fn check_cancel(&self) -> Flow {
        if self.cancel.is_cancelled() {
            ControlFlow::Break(TerminationReason::Cancelled)
        } else {
            ControlFlow::Continue(())
        }
    }

    pub(crate) async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            self.clock.sleep(duration).await;
        }
    }

    /// Tap each entry template in order. Any template that never shows up
    /// aborts the run.
    async fn enter(&self, actions: &[Action]) -> Flow {
        for action in actions {
            self.check_cancel()?;
            match self.tap_with_retry(&action.template).await {
                PollOutcome::Found(_) => self.sleep(action.wait()).await,
                PollOutcome::Exhausted => {
                    self.status.progress(format!(
                        "Could not find template {} while entering the stage",
                        action.template
                    ));
                    return ControlFlow::Break(TerminationReason::EnterFailed);
                }
                PollOutcome::Cancelled => return ControlFlow::Break(TerminationReason::Cancelled),
            }
        }
        ControlFlow::Continue(())
    }

    /// Poll until one outcome is visible, then play its actions best-effort.
    async fn battle(&self, battle: &BattleStep) -> Flow {
        self.status.progress("Waiting for the battle to finish");
        let outcome = match poll_until(&self.clock, &self.cancel, battle.interval(), move || {
            self.match_outcome(battle)
        })
        .await
        {
            PollOutcome::Found(outcome) => outcome,
            PollOutcome::Exhausted | PollOutcome::Cancelled => {
                return ControlFlow::Break(TerminationReason::Cancelled);
            }
        };

        self.status
            .progress(format!("Battle result: {}", outcome.label()));
        self.sleep(outcome.wait_after_check()).await;

        for action in &outcome.actions {
            self.check_cancel()?;
            match self.tap_with_retry(&action.template).await {
                PollOutcome::Found(_) => {}
                PollOutcome::Exhausted => {
                    warn!("'{}' action: template {} not found, skipping", outcome.label(), action.template);
                }
                PollOutcome::Cancelled => return ControlFlow::Break(TerminationReason::Cancelled),
            }
            self.sleep(action.wait()).await;
        }
        ControlFlow::Continue(())
    }

    /// One capture, checks in declared order; the first visible outcome wins.
    async fn match_outcome<'a>(&self, battle: &'a BattleStep) -> Option<&'a Outcome> {
        let screen = self.capture_screen().await?;
        let found = battle
            .outcomes
            .iter()
            .find(|outcome| self.locate(&screen, &outcome.template).is_some());
        if found.is_none() {
            debug!("no battle outcome visible yet");
        }
        found
    }

    /// End/restart semantics: tap what is visible, skip what is not.
    async fn tap_visible(&self, kind: &str, actions: &[Action]) -> Flow {
        for action in actions {
            self.check_cancel()?;
            let Some(found) = self.find(&action.template).await else {
                debug!("{kind}: template {} not visible, skipped", action.template);
                continue;
            };
            if self.tap(&found).await {
                self.sleep(action.wait()).await;
            }
        }
        ControlFlow::Continue(())
    }

    async fn resource_check(
        &self,
        stage: &StageConfig,
        check: &ResourceCheckStep,
        state: &mut RunState,
    ) -> Flow {
        self.check_cancel()?;
        if self.find(&check.template).await.is_none() {
            return ControlFlow::Continue(());
        }
        self.status.progress(format!(
            "Resource prompt detected (purchases {}/{})",
            state.resource_purchases, state.resource_purchase_limit
        ));
        let start = stage.start_template(check);
        let outcome = self.attempt_purchase(state, check, start).await;
        // The purchase loop bails out early on cancel; report that, not the limit.
        self.check_cancel()?;
        match outcome {
            PurchaseOutcome::Continue => ControlFlow::Continue(()),
            PurchaseOutcome::LimitExceeded => {
                ControlFlow::Break(TerminationReason::ResourceLimitReached)
            }
        }
    }

    pub(crate) async fn capture_screen(&self) -> Option<image::GrayImage> {
        match self.capture.capture().await {
            Ok(screen) => Some(screen),
            Err(e) => {
                if e.is_disconnect() {
                    warn!("capture failed, device may be disconnected: {e}");
                } else {
                    warn!("capture failed: {e}");
                }
                None
            }
        }
    }

    pub(crate) fn locate(&self, screen: &image::GrayImage, template: &TemplateId) -> Option<Match> {
        match self.locator.locate(screen, template, self.config.threshold) {
            Ok(found) => found,
            Err(e) => {
                warn!("template {template}: {e}");
                None
            }
        }
    }

    /// Fresh capture, single locate.
    pub(crate) async fn find(&self, template: &TemplateId) -> Option<Match> {
        let screen = self.capture_screen().await?;
        self.locate(&screen, template)
    }

    pub(crate) async fn tap(&self, at: &Match) -> bool {
        match self.capture.device().tap(at.x, at.y).await {
            Ok(()) => {
                debug!("tapped ({},{}) score {:.3}", at.x, at.y, at.correlation);
                true
            }
            Err(e) => {
                warn!("tap at ({},{}) failed: {e}", at.x, at.y);
                false
            }
        }
    }

    async fn find_and_tap(&self, template: &TemplateId) -> Option<Match> {
        let found = self.find(template).await?;
        self.tap(&found).await.then_some(found)
    }

    /// Locate-and-tap with the configured retry budget.
    pub(crate) async fn tap_with_retry(&self, template: &TemplateId) -> PollOutcome<Match> {
        poll_bounded(
            &self.clock,
            &self.cancel,
            self.config.tap_attempts,
            self.config.tap_retry_delay,
            move || self.find_and_tap(template),
        )
        .await
    }
}
