// Types for a stage run
use std::fmt;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// An entry template never became visible.
    EnterFailed,
    BattleLimitReached,
    /// Purchase cap hit, or the purchase flow gave up.
    ResourceLimitReached,
    Cancelled,
}

impl TerminationReason {
    /// Only a failed entry means the stage could not be run at all.
    pub fn is_failure(&self) -> bool {
        matches!(self, TerminationReason::EnterFailed)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::EnterFailed => "could not enter the stage",
            TerminationReason::BattleLimitReached => "battle limit reached",
            TerminationReason::ResourceLimitReached => "resource purchase limit reached",
            TerminationReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Continue,
    LimitExceeded,
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub battles_completed: u32,
    /// 0 means unlimited.
    pub battle_limit: u32,
    pub resource_purchases: u32,
    pub resource_purchase_limit: u32,
    pub cancelled: bool,
}

impl RunState {
    pub fn new(battle_limit: u32, resource_purchase_limit: u32) -> Self {
        RunState {
            battles_completed: 0,
            battle_limit,
            resource_purchases: 0,
            resource_purchase_limit,
            cancelled: false,
        }
    }

    pub fn battle_limit_reached(&self) -> bool {
        self.battle_limit > 0 && self.battles_completed >= self.battle_limit
    }

    pub fn purchases_exhausted(&self) -> bool {
        self.resource_purchases >= self.resource_purchase_limit
    }

    pub fn battle_progress(&self) -> String {
        if self.battle_limit > 0 {
            format!("{}/{}", self.battles_completed, self.battle_limit)
        } else {
            self.battles_completed.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stage: String,
    pub reason: TerminationReason,
    pub battles_completed: u32,
    pub resource_purchases: u32,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stage '{}' stopped: {} (battles: {}, purchases: {})",
            self.stage, self.reason, self.battles_completed, self.resource_purchases
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Progress(String),
    Finished(RunSummary),
}
