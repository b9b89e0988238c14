// Stage file parsing, validation and round trips.

use super::*;
use crate::template_matching::TemplateId;
use std::path::Path;

const STAGE_FILE: &str = r#"{
  "hunt": {
    "description": "Wyvern hunt",
    "steps": [
      {"type": "enter", "actions": [
        {"action": "click", "image": 1, "wait": 2},
        {"action": "click", "image": 2, "wait": 2}
      ]},
      {"type": "battle",
       "check": {"image": 7, "wait_after_check": 2, "interval": 5},
       "actions": [{"action": "click", "image": 7}, {"action": "click", "image": 8, "wait": 1.5}]},
      {"type": "end", "actions": [{"action": "click", "image": 9, "wait": 1}]},
      {"type": "restart", "actions": [{"action": "click", "image": 11, "wait": 2}]},
      {"type": "energy", "check": {"image": 12}, "actions": [{"action": "handle_energy"}]}
    ]
  },
  "raid": {
    "description": "Raid with win/lose screens",
    "steps": [
      {"type": "enter", "actions": [{"action": "click", "image": "raid_start"}]},
      {"type": "battle",
       "check": {"images": [
          {"image": "victory", "type": "win", "wait_after_check": 3},
          {"image": "defeat", "type": "lose"}
       ], "interval": 4},
       "actions": {"win": [{"action": "click", "image": "confirm", "wait": 1}]}}
    ]
  }
}"#;

fn parse(json: &str) -> ConfigResult<StageConfigs> {
    StageConfigs::from_json(Path::new("test.json"), json)
}

fn stage_json(steps: &str) -> String {
    format!(r#"{{"s": {{"description": "", "steps": {steps}}}}}"#)
}

const ENTER: &str = r#"{"type": "enter", "actions": [{"action": "click", "image": 1}]}"#;
const BATTLE: &str = r#"{"type": "battle", "check": {"image": 7}, "actions": []}"#;

#[test]
fn parses_single_outcome_stage() {
    let stages = parse(STAGE_FILE).unwrap();
    let hunt = stages.get("hunt").unwrap();
    assert_eq!(hunt.name, "hunt");
    assert_eq!(hunt.enter_actions().len(), 2);
    assert_eq!(hunt.enter_actions()[0].wait_secs, 2.0);

    let battle = hunt.battle().unwrap();
    assert_eq!(battle.form, CheckForm::Single);
    assert_eq!(battle.interval_secs, 5.0);
    assert_eq!(battle.outcomes.len(), 1);
    let outcome = &battle.outcomes[0];
    assert_eq!(outcome.label(), "battle finished");
    assert_eq!(outcome.template, TemplateId::Number(7));
    // Missing wait falls back to one second.
    assert_eq!(outcome.actions[0].wait_secs, 1.0);
    assert_eq!(outcome.actions[1].wait_secs, 1.5);

    let kinds: Vec<&str> = hunt.post_battle_steps().map(Step::kind).collect();
    assert_eq!(kinds, vec!["end", "restart", "energy"]);

    let check = hunt.resource_check().unwrap();
    assert_eq!(check.purchase_template(), &TemplateId::Number(12));
    assert_eq!(hunt.start_template(check), Some(&TemplateId::Number(2)));
}

#[test]
fn parses_multi_outcome_stage_in_declared_order() {
    let stages = parse(STAGE_FILE).unwrap();
    let raid = stages.get("raid").unwrap();
    let battle = raid.battle().unwrap();
    assert_eq!(battle.form, CheckForm::Multi);
    assert_eq!(battle.interval_secs, 4.0);

    let labels: Vec<&str> = battle.outcomes.iter().map(Outcome::label).collect();
    assert_eq!(labels, vec!["win", "lose"]);
    assert_eq!(battle.outcomes[0].wait_after_check_secs, 3.0);
    assert_eq!(battle.outcomes[1].wait_after_check_secs, 2.0);
    assert_eq!(battle.outcomes[0].actions.len(), 1);
    // Outcomes without an entry in the action map do nothing.
    assert!(battle.outcomes[1].actions.is_empty());
    assert!(raid.resource_check().is_none());
}

#[test]
fn save_then_load_preserves_stages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stages.json");
    let stages = parse(STAGE_FILE).unwrap();
    stages.save(&path).unwrap();
    assert_eq!(StageConfigs::load(&path).unwrap(), stages);
}

#[test]
fn default_stage_matches_stock_layout() {
    let stage = default_stage("daily", "Daily dungeon").unwrap();
    assert_eq!(stage.name, "daily");
    let enter: Vec<TemplateId> = stage
        .enter_actions()
        .iter()
        .map(|a| a.template.clone())
        .collect();
    assert_eq!(enter, (1..=6).map(TemplateId::Number).collect::<Vec<_>>());
    let check = stage.resource_check().unwrap();
    assert_eq!(check.template, TemplateId::Number(12));
    assert_eq!(stage.start_template(check), Some(&TemplateId::Number(6)));

    let mut stages = StageConfigs::default();
    stages.insert(stage.clone()).unwrap();
    assert!(matches!(
        stages.insert(stage),
        Err(ConfigError::StageExists { name }) if name == "daily"
    ));
}

#[test]
fn energy_overrides_are_kept() {
    let json = stage_json(&format!(
        r#"[{ENTER}, {BATTLE}, {{"type": "energy", "check": {{"image": 12}}, "purchase_image": 13, "start_image": "go"}}]"#
    ));
    let stages = parse(&json).unwrap();
    let stage = stages.get("s").unwrap();
    let check = stage.resource_check().unwrap();
    assert_eq!(check.purchase_template(), &TemplateId::Number(13));
    assert_eq!(stage.start_template(check), Some(&TemplateId::Name("go".into())));
}

#[test]
fn missing_load_file_is_an_error_but_load_or_empty_is_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(StageConfigs::load(&path), Err(ConfigError::Read { .. })));
    assert!(StageConfigs::load_or_empty(&path).unwrap().is_empty());
}

#[test]
fn unknown_stage_name() {
    let stages = parse(STAGE_FILE).unwrap();
    assert!(matches!(
        stages.get("nope"),
        Err(ConfigError::UnknownStage { .. })
    ));
}

fn rejects(steps: &str, needle: &str) {
    let err = parse(&stage_json(steps)).unwrap_err().to_string();
    assert!(err.contains(needle), "expected '{needle}' in: {err}");
}

#[test]
fn rejects_missing_or_duplicate_enter() {
    rejects(&format!("[{BATTLE}]"), "exactly one 'enter' step, found 0");
    rejects(&format!("[{ENTER}, {ENTER}, {BATTLE}]"), "exactly one 'enter' step, found 2");
}

#[test]
fn rejects_missing_battle() {
    rejects(&format!("[{ENTER}]"), "exactly one 'battle' step, found 0");
}

#[test]
fn rejects_empty_enter() {
    rejects(
        &format!(r#"[{{"type": "enter", "actions": []}}, {BATTLE}]"#),
        "enter step has no actions",
    );
}

#[test]
fn rejects_negative_wait() {
    rejects(
        &format!(
            r#"[{{"type": "enter", "actions": [{{"action": "click", "image": 1, "wait": -1}}]}}, {BATTLE}]"#
        ),
        "'wait' must be a non-negative number of seconds",
    );
}

#[test]
fn rejects_zero_interval() {
    rejects(
        &format!(r#"[{ENTER}, {{"type": "battle", "check": {{"image": 7, "interval": 0}}}}]"#),
        "'interval'",
    );
}

#[test]
fn rejects_unknown_action() {
    rejects(
        r#"[{"type": "enter", "actions": [{"action": "swipe", "image": 1}]}]"#,
        "unknown variant `swipe`",
    );
}

#[test]
fn rejects_duplicate_outcome_labels() {
    rejects(
        &format!(
            r#"[{ENTER}, {{"type": "battle", "check": {{"images": [{{"image": 1, "type": "win"}}, {{"image": 2, "type": "win"}}]}}, "actions": {{}}}}]"#
        ),
        "'win' is declared twice",
    );
}

#[test]
fn rejects_actions_for_undeclared_outcome() {
    rejects(
        &format!(
            r#"[{ENTER}, {{"type": "battle", "check": {{"images": [{{"image": 1, "type": "win"}}]}}, "actions": {{"lose": []}}}}]"#
        ),
        "undeclared outcome 'lose'",
    );
}

#[test]
fn rejects_mismatched_action_shape() {
    rejects(
        &format!(
            r#"[{ENTER}, {{"type": "battle", "check": {{"image": 7}}, "actions": {{"win": []}}}}]"#
        ),
        "single-outcome",
    );
    rejects(
        &format!(
            r#"[{ENTER}, {{"type": "battle", "check": {{"images": [{{"image": 1, "type": "win"}}]}}, "actions": [{{"action": "click", "image": 1}}]}}]"#
        ),
        "multi-outcome",
    );
}

#[test]
fn rejects_empty_multi_check() {
    rejects(
        &format!(r#"[{ENTER}, {{"type": "battle", "check": {{"images": []}}, "actions": {{}}}}]"#),
        "lists no images",
    );
}

#[test]
fn template_ids_cover_every_step() {
    let stages = parse(STAGE_FILE).unwrap();
    let ids = stages.get("hunt").unwrap().template_ids();
    for n in [1, 2, 7, 8, 9, 11, 12] {
        assert!(ids.contains(&&TemplateId::Number(n)), "missing {n}");
    }
}

fn outcome(label: Option<&str>, template: u32) -> Outcome {
    Outcome {
        label: label.map(str::to_string),
        template: TemplateId::Number(template),
        wait_after_check_secs: 2.0,
        actions: vec![Action::tap(template, 1.0)],
    }
}

fn built_stage(battle: BattleStep) -> ConfigResult<StageConfig> {
    StageConfig::new(
        "built",
        "",
        vec![
            Step::Enter {
                actions: vec![Action::tap(1, 1.0)],
            },
            Step::Battle(battle),
        ],
    )
}

#[test]
fn constructor_applies_battle_checks() {
    let err = built_stage(BattleStep {
        form: CheckForm::Single,
        interval_secs: 0.0,
        outcomes: vec![outcome(None, 7)],
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSeconds { field: "interval", .. }));

    let err = built_stage(BattleStep {
        form: CheckForm::Single,
        interval_secs: 5.0,
        outcomes: vec![outcome(Some("win"), 7), outcome(Some("lose"), 8)],
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::SingleOutcomeShape { found: 2 }));

    let err = built_stage(BattleStep {
        form: CheckForm::Multi,
        interval_secs: 5.0,
        outcomes: vec![outcome(Some("win"), 7), outcome(None, 8)],
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnlabeledOutcome));

    let err = built_stage(BattleStep {
        form: CheckForm::Multi,
        interval_secs: 5.0,
        outcomes: vec![outcome(Some("win"), 7), outcome(Some("win"), 8)],
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateOutcome { .. }));

    let mut bad_wait = outcome(None, 7);
    bad_wait.actions[0].wait_secs = f64::NAN;
    let err = built_stage(BattleStep {
        form: CheckForm::Single,
        interval_secs: 5.0,
        outcomes: vec![bad_wait],
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSeconds { field: "wait", .. }));
}

#[test]
fn constructed_stages_survive_a_json_round_trip() {
    for battle in [
        BattleStep {
            form: CheckForm::Single,
            interval_secs: 3.0,
            outcomes: vec![outcome(None, 7)],
        },
        BattleStep {
            form: CheckForm::Multi,
            interval_secs: 4.0,
            outcomes: vec![outcome(Some("win"), 7), outcome(Some("lose"), 8)],
        },
    ] {
        let mut stages = StageConfigs::default();
        stages.insert(built_stage(battle).unwrap()).unwrap();
        let json = serde_json::to_string(&stages).unwrap();
        assert_eq!(parse(&json).unwrap(), stages);
    }
}
