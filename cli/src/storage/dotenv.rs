//! `.env` file parsing

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;

pub const DEFAULT_ENV_FILE: &str = ".env";

/// Load `KEY=VALUE` pairs from the env file.
///
/// The default `.env` is optional; an explicitly named file must exist.
pub async fn load_env_file(
    working_dir: &Path,
    env_file: Option<&str>,
) -> Result<BTreeMap<String, String>, DeployError> {
    let file = File::new(working_dir.join(env_file.unwrap_or(DEFAULT_ENV_FILE)));

    if !file.exists().await {
        if env_file.is_some() {
            return Err(DeployError::Validation(format!(
                "Env file not found at {}",
                file.path().display()
            )));
        }
        return Ok(BTreeMap::new());
    }

    let vars = parse_env(&file.read_string().await?);
    debug!(path = %file.path().display(), count = vars.len(), "Loaded env file");
    Ok(vars)
}

/// Parse dotenv syntax: comments, blank lines, `export` prefixes and quoted values
pub fn parse_env(contents: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        vars.insert(key.to_string(), unquote(value.trim()));
    }

    vars
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            return if quote == '"' {
                inner.replace("\\n", "\n")
            } else {
                inner.to_string()
            };
        }
    }

    // Unquoted values end at an inline comment
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}
