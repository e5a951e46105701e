// ABOUTME: Integration tests for task group runs using the built-in shell executor
// ABOUTME: Covers sequencing, result sharing, compensation, identity checks, output and fallback

use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

mod common;
use common::{catalog_with, TestEnvironment, TestPlanBuilder};

use rungroup::engine::ExecutionError;
use rungroup::{DefaultExecutorFactory, TaskGroupRunner, Values};

#[tokio::test]
async fn test_successful_group_produces_output() {
    let env = TestEnvironment::new();
    let work = env.work_dir();

    let plan = TestPlanBuilder::new("create")
        .with_value("Volume", json!({"size": "1Gi"}))
        .add_mkdir_task("first", &work, "vol-a")
        .add_mkdir_task("second", &work, "vol-b")
        .with_output(
            "out",
            "id: out",
            r#"path: "{{TaskResult.first.result.path}}"
size: "{{Volume.size}}"
objects: "{{TaskResult.first.objectName}},{{TaskResult.second.objectName}}"
"#,
        )
        .build();

    let catalog = catalog_with(vec![plan]);
    let mut values = Values::new();
    let bytes = catalog.run_plan("create", &mut values).await.unwrap();

    let output: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(output["path"], format!("{}/vol-a", work.display()));
    assert_eq!(output["size"], "1Gi");
    assert_eq!(output["objects"], "vol-a,vol-b");

    assert!(work.join("vol-a").is_dir());
    assert!(work.join("vol-b").is_dir());
    assert!(values.is_json_result_redacted());
    assert!(env.rollback_log().is_empty());
}

#[tokio::test]
async fn test_group_without_output_returns_empty_bytes() {
    let env = TestEnvironment::new();
    let plan = TestPlanBuilder::new("no-output")
        .add_mkdir_task("only", &env.work_dir(), "vol-a")
        .build();

    let factory = Arc::new(DefaultExecutorFactory::new().unwrap());
    let runner = TaskGroupRunner::from_plan(&plan, factory).unwrap();

    let bytes = runner.run(&mut Values::new()).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_failure_compensates_in_reverse_order() {
    let env = TestEnvironment::new();
    let work = env.work_dir();

    let plan = TestPlanBuilder::new("partial")
        .add_mkdir_task("first", &work, "vol-a")
        .add_mkdir_task("second", &work, "vol-b")
        .add_failing_task("third")
        .add_mkdir_task("fourth", &work, "vol-d")
        .build();

    let catalog = catalog_with(vec![plan]);
    let mut values = Values::new();
    let err = catalog.run_plan("partial", &mut values).await.unwrap_err();

    match err {
        ExecutionError::TaskFailed { task_id, message } => {
            assert_eq!(task_id, "third");
            assert!(message.contains("disk full"));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(env.rollback_log(), vec!["vol-b", "vol-a"]);
    assert!(!work.join("vol-a").exists());
    assert!(!work.join("vol-b").exists());
    assert!(!work.join("vol-d").exists());
    assert!(values.is_json_result_redacted());
}

#[tokio::test]
async fn test_object_names_reported_by_task_output() {
    let env = TestEnvironment::new();
    let work = env.work_dir();
    let body = format!(
        r#"working_dir: '{dir}'
script: |
  mkdir x1 x2 && echo '{{"objectName": "x1, x2"}}'
rollback:
  working_dir: '{dir}'
  script: |
    rmdir "$OBJECT_NAME" && echo "$OBJECT_NAME" >> rollback.log
"#,
        dir = work.display()
    );

    let plan = TestPlanBuilder::new("multi")
        .with_task("pair", "id: pair\naction: put", &body)
        .add_failing_task("boom")
        .build();

    let catalog = catalog_with(vec![plan]);
    catalog.run_plan("multi", &mut Values::new()).await.unwrap_err();

    assert_eq!(env.rollback_log(), vec!["x2", "x1"]);
}

#[tokio::test]
async fn test_duplicate_identity_stops_before_execution() {
    let env = TestEnvironment::new();
    let work = env.work_dir();
    let marker = work.join("marker");

    let plan = TestPlanBuilder::new("dup")
        .add_mkdir_task("Vol-Create", &work, "vol-a")
        .with_task(
            "again",
            "id: vol-create\naction: put",
            &format!("command: touch\nargs: ['{}']", marker.display()),
        )
        .build();

    let catalog = catalog_with(vec![plan]);
    let err = catalog.run_plan("dup", &mut Values::new()).await.unwrap_err();

    assert!(matches!(err, ExecutionError::DuplicateIdentity { ref id } if id == "vol-create"));
    assert!(!marker.exists());
    assert_eq!(env.rollback_log(), vec!["vol-a"]);
}

#[tokio::test]
async fn test_unresolved_meta_reference_aborts_group() {
    let env = TestEnvironment::new();
    let work = env.work_dir();

    let plan = TestPlanBuilder::new("unresolved")
        .add_mkdir_task("first", &work, "vol-a")
        .with_task("broken", "id: \"{{Missing.value}}\"", "result: {}")
        .build();

    let catalog = catalog_with(vec![plan]);
    let err = catalog
        .run_plan("unresolved", &mut Values::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidMeta { .. }));
    assert_eq!(env.rollback_log(), vec!["vol-a"]);
}

#[tokio::test]
async fn test_output_failure_keeps_created_objects() {
    let env = TestEnvironment::new();
    let work = env.work_dir();

    let plan = TestPlanBuilder::new("bad-output")
        .add_mkdir_task("first", &work, "vol-a")
        .with_output("out", "id: out", "name: \"{{TaskResult.nope.result}}\"")
        .build();

    let catalog = catalog_with(vec![plan]);
    let err = catalog
        .run_plan("bad-output", &mut Values::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::OutputFailed { .. }));
    assert!(work.join("vol-a").is_dir());
    assert!(env.rollback_log().is_empty());
}

fn versioned_plans(work: &std::path::Path, with_fallback: bool) -> Vec<rungroup::TaskGroupPlan> {
    let mut v2 = TestPlanBuilder::new("create-v2")
        .with_value("Config", json!({"version": "1"}))
        .add_mkdir_task("v2-create", work, "v2-obj")
        .with_task(
            "v2-check",
            "{{verify_version Config.version \"2\"}}\nid: v2-check",
            "result: {}",
        );
    if with_fallback {
        v2 = v2.with_fallback("create-v1");
    }

    let v1 = TestPlanBuilder::new("create-v1")
        .add_mkdir_task("v1-create", work, "v1-obj")
        .with_output(
            "out",
            "id: out",
            "plan: v1\nversion: \"{{Config.version}}\"\nobject: \"{{TaskResult.v1-create.objectName}}\"",
        );

    vec![v2.build(), v1.build()]
}

#[tokio::test]
async fn test_version_mismatch_falls_back() {
    let env = TestEnvironment::new();
    let work = env.work_dir();
    let catalog = catalog_with(versioned_plans(&work, true));

    let mut values = Values::new();
    let bytes = catalog.run_plan("create-v2", &mut values).await.unwrap();

    let output: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        output,
        json!({"plan": "v1", "version": "1", "object": "v1-obj"})
    );
    assert_eq!(env.rollback_log(), vec!["v2-obj"]);
    assert!(!work.join("v2-obj").exists());
    assert!(work.join("v1-obj").is_dir());

    // the fallback saw the context the failed run left behind
    assert_eq!(values.object_names("v2-create"), Some("v2-obj"));
}

#[tokio::test]
async fn test_version_mismatch_without_fallback_fails() {
    let env = TestEnvironment::new();
    let work = env.work_dir();
    let catalog = catalog_with(versioned_plans(&work, false));

    let err = catalog
        .run_plan("create-v2", &mut Values::new())
        .await
        .unwrap_err();

    assert!(err.is_version_mismatch());
    assert!(!work.join("v1-obj").exists());
    assert_eq!(env.rollback_log(), vec!["v2-obj"]);
}

#[tokio::test]
async fn test_fallback_to_unknown_plan() {
    let env = TestEnvironment::new();
    let mut plans = versioned_plans(&env.work_dir(), true);
    plans.truncate(1);
    let catalog = catalog_with(plans);

    let err = catalog
        .run_plan("create-v2", &mut Values::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::FallbackNotFound { ref plan } if plan == "create-v1"));
}

#[tokio::test]
async fn test_variables_reach_templates() {
    let plan = TestPlanBuilder::new("vars")
        .with_task(
            "greet",
            "id: \"greet-{{Variables.env}}\"",
            "command: echo\nargs: [\"{{upper Variables.env}}\"]",
        )
        .with_output(
            "out",
            "id: out",
            "greeting: \"{{TaskResult.greet-prod.result}}\"",
        )
        .build();

    let mut vars = HashMap::new();
    vars.insert("env".to_string(), "prod".to_string());
    let mut values = Values::new();
    values.merge_variables(&vars);

    let catalog = catalog_with(vec![plan]);
    let bytes = catalog.run_plan("vars", &mut values).await.unwrap();
    let output: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(output["greeting"], "PROD");
}

#[tokio::test]
async fn test_retry_and_timeout_from_meta() {
    let env = TestEnvironment::new();
    let work = env.work_dir();
    let marker = work.join("attempted");

    let plan = TestPlanBuilder::new("flaky")
        .with_task(
            "flaky",
            "id: flaky\nretry:\n  max_attempts: 3\n  initial_delay: 10ms",
            &format!(
                "script: |\n  if [ -f '{0}' ]; then echo ok; else touch '{0}'; exit 1; fi\n",
                marker.display()
            ),
        )
        .add_mkdir_task("create", &work, "vol-a")
        .with_task("slow", "id: slow\ntimeout: 100ms", "command: sleep\nargs: ['5']")
        .build();

    let catalog = catalog_with(vec![plan]);
    let mut values = Values::new();
    let err = catalog.run_plan("flaky", &mut values).await.unwrap_err();

    assert!(matches!(err, ExecutionError::TaskTimeout { ref task_id, .. } if task_id == "slow"));
    assert_eq!(
        values.nested_str(&["TaskResult", "flaky", "result"]),
        Some("ok")
    );
    assert_eq!(env.rollback_log(), vec!["vol-a"]);
}
