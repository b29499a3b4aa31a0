//! Model manifest: the explicit list of models an application declares.
//!
//! ```toml
//! [[model]]
//! name = "post"
//! [[model.field]]
//! name = "id"
//! type = "PK"
//! [[model.field]]
//! name = "tags"
//! type = "M2M(tag)"
//! ```

use anyhow::{Context, Result, ensure};
use mortar_snapshot::schema::ModelDef;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(rename = "model", default)]
    models: Vec<ModelDef>,
}

pub async fn load(path: &Path) -> Result<Vec<ModelDef>> {
    let content = tokio::fs::read_to_string(path).await
        .with_context(|| format!("could not read model manifest {}", path.display()))?;
    parse(&content)
        .with_context(|| format!("could not parse model manifest {}", path.display()))
}

pub fn parse(content: &str) -> Result<Vec<ModelDef>> {
    let manifest: Manifest = toml::from_str(content)?;

    let mut model_names = HashSet::new();
    for model in manifest.models.iter() {
        ensure!(model_names.insert(model.name.as_str()), "model {:?} is declared twice", model.name);
        let mut field_names = HashSet::new();
        for field in model.fields.iter() {
            ensure!(
                field_names.insert(field.name.as_str()),
                "field {:?} of model {:?} is declared twice",
                field.name, model.name
            );
        }
    }
    Ok(manifest.models)
}
