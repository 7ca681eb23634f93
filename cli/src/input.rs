// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File inputs: embeddings are JSON arrays of numbers, skill drafts are JSON
//! or YAML documents shaped like [`NewSkill`].

use anyhow::{Context, Result};
use std::path::Path;

use skill_cortex::domain::skill::{validate_embedding, NewSkill};

pub fn read_embedding(path: &Path) -> Result<Vec<f32>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read embedding file {:?}", path))?;
    let embedding: Vec<f32> = serde_json::from_str(&raw)
        .with_context(|| format!("Embedding file {:?} is not a JSON array of numbers", path))?;
    validate_embedding(&embedding).with_context(|| format!("Invalid embedding in {:?}", path))?;
    Ok(embedding)
}

pub fn read_new_skill(path: &Path) -> Result<NewSkill> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read skill file {:?}", path))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let draft = if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid skill YAML in {:?}", path))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("Invalid skill JSON in {:?}", path))?
    };
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_cortex::domain::skill::EMBEDDING_DIM;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_embedding() {
        let values = vec![0.25f32; EMBEDDING_DIM];
        let file = write_temp(".json", &serde_json::to_string(&values).unwrap());
        assert_eq!(read_embedding(file.path()).unwrap(), values);
    }

    #[test]
    fn test_read_embedding_rejects_wrong_length() {
        let file = write_temp(".json", "[0.1, 0.2, 0.3]");
        let err = read_embedding(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("768"));
    }

    #[test]
    fn test_read_embedding_rejects_non_array() {
        let file = write_temp(".json", r#"{"embedding": []}"#);
        assert!(read_embedding(file.path()).is_err());
    }

    #[test]
    fn test_read_new_skill_yaml() {
        let file = write_temp(
            ".yaml",
            "title: Printer offline\nproblem: Printer shows offline\nresolution: Restart spooler\nembedding: [0.1, 0.2]\nkeywords: [printer]\n",
        );
        let draft = read_new_skill(file.path()).unwrap();
        assert_eq!(draft.title, "Printer offline");
        assert_eq!(draft.keywords, vec!["printer"]);
        assert!(draft.confidence.is_none());
    }
}
