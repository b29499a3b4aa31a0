use mortar_snapshot::schema::ModelProvider;
use mortar_snapshot::state::State;
use std::path::{Path, PathBuf};
use crate::error::Result;
use crate::exec::Executor;

pub mod entry;
mod history;
mod migration;
pub mod operation;
mod plan;

pub use self::history::{MIGRATIONS_DIR, MigrationFileManager};
pub use self::migration::Migration;
pub use self::operation::{Operation, OperationKind, SubOperation};
pub use self::plan::compare;

/// Rebuilds the schema snapshot by replaying `history` from the empty state.
pub fn replay(history: &[Migration]) -> Result<State> {
    let mut state = State::new();
    for (idx, migration) in history.iter().enumerate() {
        migration.apply_to_state(&mut state)
            .map_err(|e| e.context(format!("could not replay migration {}", idx + 1)))?;
    }
    Ok(state)
}

/// Plans, applies and records migrations of one application.
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    file_manager: MigrationFileManager,
}

impl MigrationEngine {
    /// Opens the migration history in `<app_dir>/migrations`.
    pub fn new(app_dir: &Path) -> Result<Self> {
        let file_manager = MigrationFileManager::for_app(app_dir)?;
        Ok(Self { file_manager })
    }

    pub fn file_manager(&self) -> &MigrationFileManager {
        &self.file_manager
    }

    /// State of the schema as recorded by the migration history.
    pub fn baseline(&self) -> Result<State> {
        replay(&self.file_manager.load_history()?)
    }

    /// Migration from the recorded history to the declared models.
    pub fn get_changes(&self, provider: &dyn ModelProvider) -> Result<Migration> {
        let baseline = self.baseline()?;
        let target = State::from_provider(provider);
        Ok(compare(&baseline, &target))
    }

    /// Applies the pending changes to the database and records them in the history.
    ///
    /// The migration is only committed to the history once the database accepted it. Returns the
    /// path of the new migration file, or `None` when there was nothing to migrate.
    pub async fn migrate(
        &self,
        provider: &dyn ModelProvider,
        executor: &mut dyn Executor,
    ) -> Result<Option<PathBuf>> {
        let migration = self.get_changes(provider)?;
        if migration.is_empty() {
            info!("Schema is up to date");
            return Ok(None);
        }
        migration.apply(executor).await?;
        self.file_manager.commit(&migration)
    }
}
