//! Developer tasks for the promguard workspace.
//!
//! Today this is schema upkeep: the JSON files under `schemas/` are
//! generated from the Rust types, and CI runs `cargo xtask check` so
//! they cannot drift from the code.

use anyhow::{bail, Context};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

type SchemaFn = fn() -> anyhow::Result<String>;

/// Schema id -> generator. The id doubles as the file stem under
/// `schemas/`.
fn schemas() -> BTreeMap<&'static str, SchemaFn> {
    let mut m: BTreeMap<&'static str, SchemaFn> = BTreeMap::new();
    m.insert("promguard.report.v1", report_schema);
    m.insert("promguard.config.v1", config_schema);
    m
}

fn report_schema() -> anyhow::Result<String> {
    render(schemars::schema_for!(promguard_types::PromguardReport))
}

fn config_schema() -> anyhow::Result<String> {
    render(schemars::schema_for!(promguard_settings::PromguardConfigV1))
}

fn render(schema: schemars::schema::RootSchema) -> anyhow::Result<String> {
    let mut out = serde_json::to_string_pretty(&schema).context("render schema JSON")?;
    out.push('\n');
    Ok(out)
}

/// xtask always runs from its own manifest dir, one level below the
/// workspace root.
fn schemas_dir() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop();
    dir.join("schemas")
}

fn gen() -> anyhow::Result<()> {
    let dir = schemas_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("create {}", dir.display()))?;

    for (id, build) in schemas() {
        let path = dir.join(format!("{id}.json"));
        fs::write(&path, build()?).with_context(|| format!("write {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn check() -> anyhow::Result<()> {
    let dir = schemas_dir();
    let mut stale = Vec::new();

    for (id, build) in schemas() {
        let path = dir.join(format!("{id}.json"));
        let want = build()?;
        match fs::read_to_string(&path) {
            Ok(have) if have == want => {}
            Ok(_) => stale.push(format!("{id} (out of date)")),
            Err(_) => stale.push(format!("{id} (missing)")),
        }
    }

    if stale.is_empty() {
        println!("schemas are up to date");
        return Ok(());
    }
    for entry in &stale {
        eprintln!("stale schema: {entry}");
    }
    bail!("run `cargo xtask gen` and commit the result")
}

fn show(id: &str) -> anyhow::Result<()> {
    match schemas().get(id) {
        Some(build) => {
            print!("{}", build()?);
            Ok(())
        }
        None => bail!("unknown schema id: {id} (try `cargo xtask list`)"),
    }
}

fn list() {
    for id in schemas().keys() {
        println!("{id}");
    }
}

fn usage() {
    eprintln!("usage: cargo xtask <command>");
    eprintln!();
    eprintln!("  gen         regenerate schemas/*.json from the Rust types");
    eprintln!("  check       fail if schemas/ is out of date (for CI)");
    eprintln!("  show <id>   print one generated schema to stdout");
    eprintln!("  list        print known schema ids");
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("help") | Some("--help") | Some("-h") => {
            usage();
            Ok(())
        }
        Some("gen") => gen(),
        Some("check") => check(),
        Some("show") => {
            let id = args.next().context("show needs a schema id")?;
            show(&id)
        }
        Some("list") => {
            list();
            Ok(())
        }
        Some(other) => {
            usage();
            bail!("unknown xtask command: {other}")
        }
    }
}
