use std::io::Read;

use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use stojo_store::{ObjectStore, StoreConfig};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli)?;
    let result = match cli.command {
        Command::Init => cmd_init(&store).await,
        Command::Put(args) => cmd_put(&store, args).await,
        Command::Get(args) => cmd_get(&store, args).await,
        Command::Has(args) => cmd_has(&store, args).await,
    };
    // Report the command's failure ahead of any close failure.
    let closed = store.close().await;
    result?;
    closed.context("closing database")
}

fn open_store(cli: &Cli) -> anyhow::Result<ObjectStore> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(file) = &cli.file {
        config.location = file.clone();
    }
    tracing::debug!(location = %config.location.display(), "opening store");
    Ok(ObjectStore::builder().config(config).build()?)
}

async fn cmd_init(store: &ObjectStore) -> anyhow::Result<()> {
    store.init().await?;
    println!("{} Object table ready", "✓".green().bold());
    Ok(())
}

async fn cmd_put(store: &ObjectStore, args: PutArgs) -> anyhow::Result<()> {
    let text = match args.value {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading value from stdin")?;
            buf
        }
    };
    let value: Value = serde_json::from_str(&text).context("value is not valid JSON")?;
    store.store(&args.name, &value).await?;
    println!("{} Stored {}", "✓".green().bold(), args.name.yellow());
    Ok(())
}

async fn cmd_get(store: &ObjectStore, args: GetArgs) -> anyhow::Result<()> {
    let value = store.fetch_value(&args.name).await?.unwrap_or(Value::Null);
    let text = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{text}");
    Ok(())
}

async fn cmd_has(store: &ObjectStore, args: HasArgs) -> anyhow::Result<()> {
    if store.contains(&args.name).await? {
        println!("{} {}", args.name.yellow(), "exists".green());
    } else {
        println!("{} {}", args.name.yellow(), "not found".red());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    fn cli(db: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["stojo", "--file", db.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");

        run_command(cli(&db, &["init"])).await.unwrap();
        run_command(cli(&db, &["put", "test.foo", r#"{"foo":"foo"}"#])).await.unwrap();
        run_command(cli(&db, &["get", "test.foo"])).await.unwrap();
        run_command(cli(&db, &["has", "test.foo"])).await.unwrap();

        let store = ObjectStore::open(StoreConfig::at(&db));
        assert_eq!(
            store.fetch_value("test.foo").await.unwrap(),
            Some(serde_json::json!({ "foo": "foo" }))
        );
    }

    #[tokio::test]
    async fn put_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");
        let err = run_command(cli(&db, &["put", "k", "{oops"])).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn config_file_sets_location() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("from-config.sqlite3");
        let config = dir.path().join("stojo.toml");
        std::fs::write(&config, format!("location = {:?}\n", db.to_str().unwrap())).unwrap();

        let args = Cli::try_parse_from([
            "stojo",
            "--config",
            config.to_str().unwrap(),
            "put",
            "k",
            "1",
        ])
        .unwrap();
        run_command(args).await.unwrap();
        assert!(db.exists());
    }

    #[tokio::test]
    async fn unreachable_database_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing/dir/cli.sqlite3");
        assert!(run_command(cli(&db, &["get", "k"])).await.is_err());
    }
}
