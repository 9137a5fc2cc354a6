use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Replaces `path` with `content`; an existing file is first copied to `<name>.bak`.
pub fn write_with_backup(path: &Path, content: &str) -> std::io::Result<()> {
    if path.is_file() {
        std::fs::copy(path, path.with_extension("bak"))?;
    }
    std::fs::write(path, content)
}

/// Settings persisted as one pretty-printed JSON document.
pub trait JsonFile: Serialize + DeserializeOwned {
    fn read_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        write_with_backup(path, &text).with_context(|| format!("writing {}", path.display()))
    }

    /// Reads `path`, seeding it with the defaults when nothing is there yet.
    fn read_or_seed(path: &Path) -> anyhow::Result<Self>
    where
        Self: Default,
    {
        if path.is_file() {
            return Self::read_from(path);
        }
        let seeded = Self::default();
        seeded.write_to(path)?;
        Ok(seeded)
    }
}
