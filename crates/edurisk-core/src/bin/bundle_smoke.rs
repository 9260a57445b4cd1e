use edurisk_core::{bundle::ModelBundle, config::Config, pipeline::AppCore};
use std::path::PathBuf;

/// Usage: bundle_smoke [BUNDLE_PATH] [RECORD_JSON]
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);

    // 1) bundle path
    let cfg = Config {
        bundle_path: args
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| Config::default().bundle_path),
        ..Config::default()
    };

    // 2) load + validate (risk class, class count, feature schema)
    let bundle = ModelBundle::load_from_path(&cfg.bundle_path, &cfg.risk_class)?;
    println!("classes={:?} risk_class={}", bundle.classes(), bundle.risk_class());

    // 3) record: feature columns it lacks come back as a schema mismatch
    let record = match args.next() {
        Some(s) => serde_json::from_str::<serde_json::Value>(&s)?,
        None => serde_json::json!({
            "sem1_enrolled": 6,
            "sem1_approved": 5,
            "sem1_evaluations": 7,
            "sem1_without_eval": 0
        }),
    };
    let record = record
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("record must be a JSON object"))?;

    // 4) score
    let core = AppCore::with_bundle(cfg, bundle);
    let resp = core.predict_record(&record)?;
    println!("{}", serde_json::to_string_pretty(&resp)?);

    Ok(())
}
