use std::sync::Arc;

use dxflow::context::keys;
use dxflow::dialect::DialectRegistry;
use dxflow::errors::{ConfigError, EngineError};
use dxflow::{
    ComponentFactory, DatabaseContext, FieldValue, JobConfig, RunStatus, TransformContext,
    TransformEngine,
};

fn job_toml(dir: &std::path::Path) -> String {
    format!(
        r#"
[job]
name = "etl-demo"
job_dir = '{dir}'
work_dir = '{dir}/work'

[job.symbols]
region = "emea"

[context]
url = 'sqlite://{dir}/context.db'

[reader]
type = "JsonLinesReader"
source = "input.jsonl"

[[filter]]
type = "Reject"
field = "status"
pattern = "^deleted$"

[[validate]]
type = "NotEmpty"
field = "name"

[[transform]]
type = "Set"
field = "source"
value = "[#$jobname#]-[#$region#]"

[mapper]
type = "DefaultMapper"
fields = ["id", {{ source = "name", target = "full_name" }}, "source"]

[[writer]]
type = "JsonLinesWriter"
target = "out.jsonl"

[[post_process]]
type = "SetSymbol"
symbol = "lastRun"
value = "done"
"#,
        dir = dir.display()
    )
}

#[tokio::test]
async fn test_job_runs_end_to_end_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("input.jsonl"),
        concat!(
            "{\"id\": 1, \"name\": \"Ada\"}\n",
            "{\"id\": 2, \"name\": \"Bob\", \"status\": \"deleted\"}\n",
            "{\"id\": 3, \"name\": \"\"}\n",
        ),
    )
    .unwrap();

    let config = JobConfig::from_toml(&job_toml(dir.path())).unwrap();
    let mut engine = TransformEngine::from_config(&config, &ComponentFactory::default()).unwrap();
    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.counters.frames_read, 3);
    assert_eq!(outcome.counters.frames_dropped, 1);
    assert_eq!(outcome.counters.validation_failures, 1);
    assert_eq!(outcome.counters.frames_written, 2);

    let written = std::fs::read_to_string(dir.path().join("work").join("out.jsonl")).unwrap();
    assert_eq!(
        written,
        concat!(
            "{\"id\":1,\"full_name\":\"Ada\",\"source\":\"etl-demo-emea\"}\n",
            "{\"id\":3,\"full_name\":\"\",\"source\":\"etl-demo-emea\"}\n",
        )
    );

    let section = config.context.as_ref().unwrap();
    let registry = Arc::new(DialectRegistry::standard().unwrap());
    let store = DatabaseContext::from_config("etl-demo", section, registry).unwrap();
    let mut context = TransformContext::new("etl-demo").with_store(Box::new(store));
    context.open().await.unwrap();
    assert_eq!(context.symbol("lastRun"), Some(&FieldValue::from("done")));
    assert_eq!(context.symbol("region"), Some(&FieldValue::from("emea")));
    assert_eq!(
        context.symbol(keys::RUN_COUNT).and_then(FieldValue::as_i64),
        Some(2)
    );
    context.close().await.unwrap();
}

#[test]
fn test_unknown_component_type_fails_the_build() {
    let config = JobConfig::from_toml(
        r#"
[job]
name = "broken"

[[writer]]
type = "ParquetWriter"
target = "out.parquet"
"#,
    )
    .unwrap();

    let result = TransformEngine::from_config(&config, &ComponentFactory::default());

    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::UnknownComponent { .. }))
    ));
}

#[test]
fn test_missing_mandatory_attribute_fails_the_build() {
    let config = JobConfig::from_toml(
        r#"
[[validate]]
type = "NotNull"
"#,
    )
    .unwrap();

    let result = TransformEngine::from_config(&config, &ComponentFactory::default());

    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::Missing { .. }))
    ));
}
