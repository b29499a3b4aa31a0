#[macro_use]
extern crate log;

mod models;
mod opt;

use anyhow::Result;
use mortar_datastore::exec::SqlxExecutor;
use mortar_datastore::migrate::MigrationEngine;
use mortar_datastore::schema::Dialect;
use opt::{Command, Opt};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut opt = Opt::from_args();
    if let Some(config) = opt.config.clone().or_else(Opt::default_config_path) {
        opt = Opt::from_file(&config).await?;
    }

    if opt.show_config {
        println!("{}", serde_json::to_string_pretty(&opt)?);
        return Ok(());
    }

    let engine = MigrationEngine::new(&opt.app_dir)?;
    match opt.command {
        Command::Plan => plan(&opt, &engine).await,
        Command::Migrate => migrate(&opt, &engine).await,
        Command::History => history(&engine),
    }
}

async fn plan(opt: &Opt, engine: &MigrationEngine) -> Result<()> {
    let models = models::load(&opt.models_path()).await?;
    let migration = engine.get_changes(&models)?;
    if migration.is_empty() {
        println!("Schema is up to date");
        return Ok(());
    }
    let dialect = Dialect::from_uri(&opt.db_uri)?;
    println!("-- {}", engine.file_manager().next_path()?.display());
    println!("{}", migration.to_sql(dialect)?);
    println!("{}", migration.to_json()?);
    Ok(())
}

async fn migrate(opt: &Opt, engine: &MigrationEngine) -> Result<()> {
    let models = models::load(&opt.models_path()).await?;
    let mut executor = SqlxExecutor::connect(&opt.db_uri, opt.nr_connections).await?;
    match engine.migrate(&models, &mut executor).await? {
        Some(path) => println!("Applied {}", path.display()),
        None => println!("Schema is up to date"),
    }
    Ok(())
}

fn history(engine: &MigrationEngine) -> Result<()> {
    let file_manager = engine.file_manager();
    let files = file_manager.files()?;
    debug!("Found {} migration file(s) in {}", files.len(), file_manager.dir().display());
    for path in files.iter() {
        match file_manager.load(path)? {
            Some(migration) => println!("{}: {} operation(s)", path.display(), migration.operations().len()),
            None => println!("{}: empty", path.display()),
        }
    }
    Ok(())
}
