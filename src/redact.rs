use crate::error::{Error, Result};
use crate::registry::Project;
use regex::Regex;
use std::fs;
use std::io;
use std::sync::OnceLock;

/// Fixed masking token; value width never leaks the secret's length.
const MASK: &str = "**********";

fn secret_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)TOKEN|KEY|SECRET|PASSWORD").unwrap())
}

/// Read the project's active env file with secret-shaped values masked.
pub fn read_masked(project: &Project) -> Result<String> {
    let path = project.env_file();
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::EnvFileNotFound(path))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(mask_env_text(&text))
}

/// Mask the value of every line whose key portion (before the first `=`)
/// contains TOKEN, KEY, SECRET or PASSWORD, case-insensitive. All other
/// lines pass through untouched — including lines without `=`, even when
/// they contain one of the words (no split point, no mask).
pub fn mask_env_text(text: &str) -> String {
    text.split('\n')
        .map(|line| match line.split_once('=') {
            Some((key, _)) if secret_key_re().is_match(key) => format!("{key}={MASK}"),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
