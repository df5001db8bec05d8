use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::path::Path;
use crate::dsl::Diagram;

pub fn load_diagram_from_yaml(file_path: impl AsRef<Path>) -> Result<Diagram> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    parse_diagram(&yaml_content)
        .with_context(|| format!("Failed to deserialize YAML content from {}", file_path.display()))
}

pub fn parse_diagram(yaml_content: &str) -> Result<Diagram> {
    let diagram: Diagram = serde_yaml::from_str(yaml_content)?;
    Ok(diagram)
}

/// Loads every `.yaml`/`.yml` diagram in a directory, sorted by file name.
pub fn load_diagrams_from_dir(dir: impl AsRef<Path>) -> Result<Vec<Diagram>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if ext == "yaml" || ext == "yml" {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.iter().map(load_diagram_from_yaml).collect()
}
