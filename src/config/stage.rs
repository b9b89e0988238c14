//! Stage configuration model.
//!
//! The JSON layout is kept loose on disk (numbers or names for templates,
//! single or multi-outcome battle checks) and normalized into typed steps
//! while loading. Anything the engine could not execute is rejected here.

use super::{ConfigError, ConfigResult};
use crate::template_matching::TemplateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const DEFAULT_ACTION_WAIT_SECS: f64 = 1.0;
pub const DEFAULT_WAIT_AFTER_CHECK_SECS: f64 = 2.0;
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 5.0;

/// Label reported when a single-form battle check fires.
pub const SINGLE_OUTCOME_LABEL: &str = "battle finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Tap,
}

/// Tap a template, then wait.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub operation: Operation,
    pub template: TemplateId,
    pub wait_secs: f64,
}

impl Action {
    pub fn tap(template: impl Into<TemplateId>, wait_secs: f64) -> Self {
        Action {
            operation: Operation::Tap,
            template: template.into(),
            wait_secs,
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs_f64(self.wait_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckForm {
    Single,
    Multi,
}

/// One possible battle result: the template that identifies it and what to do next.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub label: Option<String>,
    pub template: TemplateId,
    pub wait_after_check_secs: f64,
    pub actions: Vec<Action>,
}

impl Outcome {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(SINGLE_OUTCOME_LABEL)
    }

    pub fn wait_after_check(&self) -> Duration {
        Duration::from_secs_f64(self.wait_after_check_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleStep {
    pub form: CheckForm,
    pub interval_secs: f64,
    /// Checked in this order; the first visible one wins.
    pub outcomes: Vec<Outcome>,
}

impl BattleStep {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        interval(self.interval_secs)?;
        match self.form {
            CheckForm::Single => {
                if self.outcomes.len() != 1 || self.outcomes.iter().any(|o| o.label.is_some()) {
                    return Err(ConfigError::SingleOutcomeShape {
                        found: self.outcomes.len(),
                    });
                }
            }
            CheckForm::Multi => {
                if self.outcomes.is_empty() {
                    return Err(ConfigError::EmptyBattleCheck);
                }
                let mut seen = BTreeSet::new();
                for outcome in &self.outcomes {
                    let Some(label) = outcome.label.as_deref() else {
                        return Err(ConfigError::UnlabeledOutcome);
                    };
                    if !seen.insert(label) {
                        return Err(ConfigError::DuplicateOutcome {
                            label: label.to_string(),
                        });
                    }
                }
            }
        }
        for outcome in &self.outcomes {
            seconds("wait_after_check", outcome.wait_after_check_secs)?;
            validate_actions(&outcome.actions)?;
        }
        Ok(())
    }

    /// Single form on disk only when there is exactly one unlabeled outcome.
    fn writes_single(&self) -> bool {
        self.form == CheckForm::Single
            && self.outcomes.len() == 1
            && self.outcomes.iter().all(|o| o.label.is_none())
    }
}

/// Detects the "out of resource" prompt and says how to buy more.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCheckStep {
    pub template: TemplateId,
    /// Confirmation button; the prompt template itself when unset.
    pub purchase_template: Option<TemplateId>,
    /// Button that restarts the stage after buying; last enter template when unset.
    pub start_template: Option<TemplateId>,
}

impl ResourceCheckStep {
    pub fn purchase_template(&self) -> &TemplateId {
        self.purchase_template.as_ref().unwrap_or(&self.template)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Enter { actions: Vec<Action> },
    Battle(BattleStep),
    End { actions: Vec<Action> },
    Restart { actions: Vec<Action> },
    ResourceCheck(ResourceCheckStep),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Enter { .. } => "enter",
            Step::Battle(_) => "battle",
            Step::End { .. } => "end",
            Step::Restart { .. } => "restart",
            Step::ResourceCheck(_) => "energy",
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        match self {
            Step::Enter { actions } | Step::End { actions } | Step::Restart { actions } => {
                validate_actions(actions)
            }
            Step::Battle(battle) => battle.validate(),
            Step::ResourceCheck(_) => Ok(()),
        }
    }

    /// Every template this step may look for.
    pub fn template_ids(&self) -> Vec<&TemplateId> {
        match self {
            Step::Enter { actions } | Step::End { actions } | Step::Restart { actions } => {
                actions.iter().map(|a| &a.template).collect()
            }
            Step::Battle(battle) => battle
                .outcomes
                .iter()
                .flat_map(|o| std::iter::once(&o.template).chain(o.actions.iter().map(|a| &a.template)))
                .collect(),
            Step::ResourceCheck(check) => std::iter::once(&check.template)
                .chain(check.purchase_template.as_ref())
                .chain(check.start_template.as_ref())
                .collect(),
        }
    }
}

/// A validated stage: exactly one enter step and one battle step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStageConfig", into = "RawStageConfig")]
pub struct StageConfig {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl StageConfig {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<Step>,
    ) -> ConfigResult<Self> {
        let mut stage = StageConfig::try_from(RawStageConfig {
            description: description.into(),
            steps,
        })?;
        stage.name = name.into();
        Ok(stage)
    }

    pub fn enter_actions(&self) -> &[Action] {
        self.steps
            .iter()
            .find_map(|s| match s {
                Step::Enter { actions } => Some(actions.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn battle(&self) -> Option<&BattleStep> {
        self.steps.iter().find_map(|s| match s {
            Step::Battle(b) => Some(b),
            _ => None,
        })
    }

    /// End, restart and resource steps in declared order.
    pub fn post_battle_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::End { .. } | Step::Restart { .. } | Step::ResourceCheck(_)))
    }

    pub fn resource_check(&self) -> Option<&ResourceCheckStep> {
        self.steps.iter().find_map(|s| match s {
            Step::ResourceCheck(r) => Some(r),
            _ => None,
        })
    }

    /// Template tapped to re-enter after a purchase.
    pub fn start_template<'a>(&'a self, check: &'a ResourceCheckStep) -> Option<&'a TemplateId> {
        check
            .start_template
            .as_ref()
            .or_else(|| self.enter_actions().last().map(|a| &a.template))
    }

    pub fn template_ids(&self) -> Vec<&TemplateId> {
        self.steps.iter().flat_map(Step::template_ids).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStageConfig {
    #[serde(default)]
    description: String,
    steps: Vec<Step>,
}

impl TryFrom<RawStageConfig> for StageConfig {
    type Error = ConfigError;

    fn try_from(raw: RawStageConfig) -> ConfigResult<Self> {
        for kind in ["enter", "battle"] {
            let found = raw.steps.iter().filter(|s| s.kind() == kind).count();
            if found != 1 {
                return Err(ConfigError::StepCount { kind, found });
            }
        }
        if raw.steps.iter().any(|s| matches!(s, Step::Enter { actions } if actions.is_empty())) {
            return Err(ConfigError::EmptyEnter);
        }
        for step in &raw.steps {
            step.validate()?;
        }
        Ok(StageConfig {
            name: String::new(),
            description: raw.description,
            steps: raw.steps,
        })
    }
}

impl From<StageConfig> for RawStageConfig {
    fn from(stage: StageConfig) -> Self {
        RawStageConfig {
            description: stage.description,
            steps: stage.steps,
        }
    }
}

// ---- on-disk step layout ----

fn default_action_wait() -> f64 {
    DEFAULT_ACTION_WAIT_SECS
}

fn default_wait_after_check() -> f64 {
    DEFAULT_WAIT_AFTER_CHECK_SECS
}

fn default_interval() -> f64 {
    DEFAULT_POLL_INTERVAL_SECS
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawOperation {
    Click,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawResourceOperation {
    HandleEnergy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    action: RawOperation,
    image: TemplateId,
    #[serde(default = "default_action_wait")]
    wait: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawResourceAction {
    action: RawResourceOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawOutcomeCheck {
    image: TemplateId,
    #[serde(rename = "type")]
    label: String,
    #[serde(default = "default_wait_after_check")]
    wait_after_check: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawBattleCheck {
    Multi {
        images: Vec<RawOutcomeCheck>,
        #[serde(default = "default_interval")]
        interval: f64,
    },
    Single {
        image: TemplateId,
        #[serde(default = "default_wait_after_check")]
        wait_after_check: f64,
        #[serde(default = "default_interval")]
        interval: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawBattleActions {
    Sequence(Vec<RawAction>),
    ByOutcome(BTreeMap<String, Vec<RawAction>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawImageCheck {
    image: TemplateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawStep {
    Enter {
        actions: Vec<RawAction>,
    },
    Battle {
        check: RawBattleCheck,
        #[serde(default = "empty_sequence")]
        actions: RawBattleActions,
    },
    End {
        actions: Vec<RawAction>,
    },
    Restart {
        actions: Vec<RawAction>,
    },
    Energy {
        check: RawImageCheck,
        #[serde(default)]
        actions: Vec<RawResourceAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        purchase_image: Option<TemplateId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_image: Option<TemplateId>,
    },
}

fn empty_sequence() -> RawBattleActions {
    RawBattleActions::Sequence(Vec::new())
}

fn seconds(field: &'static str, value: f64) -> ConfigResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSeconds { field, value })
    }
}

fn interval(value: f64) -> ConfigResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSeconds {
            field: "interval",
            value,
        })
    }
}

fn validate_actions(actions: &[Action]) -> ConfigResult<()> {
    for action in actions {
        seconds("wait", action.wait_secs)?;
    }
    Ok(())
}

fn actions_from_raw(raw: Vec<RawAction>) -> ConfigResult<Vec<Action>> {
    raw.into_iter()
        .map(|a| {
            let operation = match a.action {
                RawOperation::Click => Operation::Tap,
            };
            Ok(Action {
                operation,
                template: a.image,
                wait_secs: seconds("wait", a.wait)?,
            })
        })
        .collect()
}

fn actions_to_raw(actions: Vec<Action>) -> Vec<RawAction> {
    actions
        .into_iter()
        .map(|a| RawAction {
            action: match a.operation {
                Operation::Tap => RawOperation::Click,
            },
            image: a.template,
            wait: a.wait_secs,
        })
        .collect()
}

fn battle_from_raw(check: RawBattleCheck, actions: RawBattleActions) -> ConfigResult<BattleStep> {
    match (check, actions) {
        (
            RawBattleCheck::Single {
                image,
                wait_after_check,
                interval: secs,
            },
            actions,
        ) => {
            let actions = match actions {
                RawBattleActions::Sequence(list) => list,
                RawBattleActions::ByOutcome(map) if map.is_empty() => Vec::new(),
                RawBattleActions::ByOutcome(_) => {
                    return Err(ConfigError::BattleActionsMismatch {
                        form: "single-outcome",
                    });
                }
            };
            Ok(BattleStep {
                form: CheckForm::Single,
                interval_secs: interval(secs)?,
                outcomes: vec![Outcome {
                    label: None,
                    template: image,
                    wait_after_check_secs: seconds("wait_after_check", wait_after_check)?,
                    actions: actions_from_raw(actions)?,
                }],
            })
        }
        (RawBattleCheck::Multi { images, interval: secs }, actions) => {
            if images.is_empty() {
                return Err(ConfigError::EmptyBattleCheck);
            }
            let mut by_label = match actions {
                RawBattleActions::ByOutcome(map) => map,
                // An empty list is how "no actions" serializes for either form.
                RawBattleActions::Sequence(list) if list.is_empty() => BTreeMap::new(),
                RawBattleActions::Sequence(_) => {
                    return Err(ConfigError::BattleActionsMismatch {
                        form: "multi-outcome",
                    });
                }
            };
            let mut outcomes: Vec<Outcome> = Vec::with_capacity(images.len());
            for check in images {
                if outcomes.iter().any(|o| o.label.as_deref() == Some(check.label.as_str())) {
                    return Err(ConfigError::DuplicateOutcome { label: check.label });
                }
                let actions = by_label.remove(&check.label).unwrap_or_default();
                outcomes.push(Outcome {
                    template: check.image,
                    wait_after_check_secs: seconds("wait_after_check", check.wait_after_check)?,
                    actions: actions_from_raw(actions)?,
                    label: Some(check.label),
                });
            }
            if let Some(label) = by_label.into_keys().next() {
                return Err(ConfigError::UnknownOutcome { label });
            }
            Ok(BattleStep {
                form: CheckForm::Multi,
                interval_secs: interval(secs)?,
                outcomes,
            })
        }
    }
}

impl TryFrom<RawStep> for Step {
    type Error = ConfigError;

    fn try_from(raw: RawStep) -> ConfigResult<Self> {
        Ok(match raw {
            RawStep::Enter { actions } => Step::Enter {
                actions: actions_from_raw(actions)?,
            },
            RawStep::Battle { check, actions } => Step::Battle(battle_from_raw(check, actions)?),
            RawStep::End { actions } => Step::End {
                actions: actions_from_raw(actions)?,
            },
            RawStep::Restart { actions } => Step::Restart {
                actions: actions_from_raw(actions)?,
            },
            RawStep::Energy {
                check,
                actions: _,
                purchase_image,
                start_image,
            } => Step::ResourceCheck(ResourceCheckStep {
                template: check.image,
                purchase_template: purchase_image,
                start_template: start_image,
            }),
        })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        match step {
            Step::Enter { actions } => RawStep::Enter {
                actions: actions_to_raw(actions),
            },
            Step::Battle(battle) => {
                let (check, actions) = if battle.writes_single() {
                    let interval = battle.interval_secs;
                    let mut outcomes = battle.outcomes;
                    let o = outcomes.remove(0);
                    (
                        RawBattleCheck::Single {
                            image: o.template,
                            wait_after_check: o.wait_after_check_secs,
                            interval,
                        },
                        RawBattleActions::Sequence(actions_to_raw(o.actions)),
                    )
                } else {
                    let mut images = Vec::with_capacity(battle.outcomes.len());
                    let mut by_label = BTreeMap::new();
                    for o in battle.outcomes {
                        let label = o.label().to_string();
                        by_label.insert(label.clone(), actions_to_raw(o.actions));
                        images.push(RawOutcomeCheck {
                            image: o.template,
                            label,
                            wait_after_check: o.wait_after_check_secs,
                        });
                    }
                    (
                        RawBattleCheck::Multi {
                            images,
                            interval: battle.interval_secs,
                        },
                        RawBattleActions::ByOutcome(by_label),
                    )
                };
                RawStep::Battle { check, actions }
            }
            Step::End { actions } => RawStep::End {
                actions: actions_to_raw(actions),
            },
            Step::Restart { actions } => RawStep::Restart {
                actions: actions_to_raw(actions),
            },
            Step::ResourceCheck(check) => RawStep::Energy {
                check: RawImageCheck {
                    image: check.template,
                },
                actions: vec![RawResourceAction {
                    action: RawResourceOperation::HandleEnergy,
                }],
                purchase_image: check.purchase_template,
                start_image: check.start_template,
            },
        }
    }
}

// Step (de)serializes through RawStep so validation runs on every load.
impl Serialize for Step {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawStep::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawStep::deserialize(deserializer)?;
        Step::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// The layout `new-stage` writes: a six-tap entry, single battle check,
/// result/restart taps and a resource prompt check.
pub fn default_stage(name: &str, description: &str) -> ConfigResult<StageConfig> {
    let enter = (1..=6).map(|n| Action::tap(n, 2.0)).collect();
    StageConfig::new(
        name,
        description,
        vec![
            Step::Enter { actions: enter },
            Step::Battle(BattleStep {
                form: CheckForm::Single,
                interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                outcomes: vec![Outcome {
                    label: None,
                    template: TemplateId::Number(7),
                    wait_after_check_secs: DEFAULT_WAIT_AFTER_CHECK_SECS,
                    actions: vec![Action::tap(7, 1.0), Action::tap(8, 1.0)],
                }],
            }),
            Step::End {
                actions: vec![Action::tap(9, 1.0), Action::tap(10, 1.0)],
            },
            Step::Restart {
                actions: vec![Action::tap(11, 2.0), Action::tap(5, 2.0), Action::tap(6, 3.0)],
            },
            Step::ResourceCheck(ResourceCheckStep {
                template: TemplateId::Number(12),
                purchase_template: None,
                start_template: None,
            }),
        ],
    )
}
