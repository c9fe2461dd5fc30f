//! Minimal ~/.ssh/config reader
//!
//! Only `Host` aliases and their `HostName` are of interest; every other
//! keyword is skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
struct HostBlock {
    aliases: Vec<String>,
    hostname: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

/// `~/.ssh/config`, if a home directory is known
pub fn default_ssh_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("config"))
}

impl SshConfig {
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Option<HostBlock> = None;

        for line in content.lines() {
            let Some((keyword, value)) = split_keyword(line) else {
                continue;
            };

            if keyword.eq_ignore_ascii_case("host") {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                let aliases = value
                    .split_whitespace()
                    .map(unquote)
                    .filter(|pattern| !is_pattern(pattern))
                    .map(str::to_string)
                    .collect();
                current = Some(HostBlock {
                    aliases,
                    hostname: None,
                });
            } else if keyword.eq_ignore_ascii_case("match") {
                // Match blocks are not aliases; close the running Host block.
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            } else if keyword.eq_ignore_ascii_case("hostname") {
                if let Some(block) = current.as_mut() {
                    // first value wins, as with ssh itself
                    if block.hostname.is_none() {
                        block.hostname = Some(unquote(value).to_string());
                    }
                }
            }
        }

        if let Some(block) = current {
            blocks.push(block);
        }

        Self { blocks }
    }

    /// `HostName` configured for `alias`, taken from the first block that
    /// names the alias and sets one.
    pub fn hostname(&self, alias: &str) -> Option<&str> {
        self.blocks
            .iter()
            .filter(|block| block.aliases.iter().any(|a| a == alias))
            .find_map(|block| block.hostname.as_deref())
    }
}

/// Split `Keyword value` or `Keyword=value`, ignoring blanks and comments.
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(split_at);
    let value = rest
        .trim_start()
        .strip_prefix('=')
        .unwrap_or(rest.trim_start())
        .trim();

    if value.is_empty() {
        None
    } else {
        Some((keyword, value))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn is_pattern(host: &str) -> bool {
    host.starts_with('!') || host.contains('*') || host.contains('?')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
# work machines
Host bastion jump
    HostName bastion.example.com
    User deploy

Host db
    ProxyJump bastion
    HostName=10.20.0.4

Host *.internal !secret
    User admin

Host quoted
    HostName "quoted.example.com"

Match host foo
    HostName ignored.example.com
"#;

    #[test]
    fn test_patterns_are_not_aliases() {
        let config = SshConfig::parse("Host *.internal !secret app?
  HostName app.example.com
");
        assert_eq!(config.hostname("*.internal"), None);
        assert_eq!(config.hostname("!secret"), None);
        assert_eq!(config.hostname("secret"), None);
        assert_eq!(config.hostname("app?"), None);
    }

    #[test]
    fn test_concrete_alias_next_to_pattern() {
        let config = SshConfig::parse("Host *.internal app
  HostName app.example.com
");
        assert_eq!(config.hostname("app"), Some("app.example.com"));
    }

    #[test]
    fn test_hostname_lookup() {
        let config = SshConfig::parse(SAMPLE);
        assert_eq!(config.hostname("bastion"), Some("bastion.example.com"));
        assert_eq!(config.hostname("jump"), Some("bastion.example.com"));
        assert_eq!(config.hostname("db"), Some("10.20.0.4"));
        assert_eq!(config.hostname("quoted"), Some("quoted.example.com"));
        assert_eq!(config.hostname("unknown"), None);
    }

    #[test]
    fn test_match_block_not_attached_to_previous_host() {
        let config = SshConfig::parse(SAMPLE);
        assert_ne!(config.hostname("quoted"), Some("ignored.example.com"));
    }

    #[test]
    fn test_first_hostname_wins() {
        let config = SshConfig::parse(
            "Host a\n  HostName first.example.com\n  HostName second.example.com\n\
             Host a\n  HostName third.example.com\n",
        );
        assert_eq!(config.hostname("a"), Some("first.example.com"));
    }

    #[test]
    fn test_alias_without_hostname() {
        let config = SshConfig::parse("Host lonely\n  User me\nHost other\n  HostName other.example.com\n");
        assert_eq!(config.hostname("lonely"), None);
        assert_eq!(config.hostname("other"), Some("other.example.com"));
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let config = SshConfig::parse("HOST box\n  hostname box.example.com\n");
        assert_eq!(config.hostname("box"), Some("box.example.com"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config");
        fs::write(&path, SAMPLE).unwrap();

        let config = SshConfig::load(&path).unwrap();
        assert_eq!(config.hostname("db"), Some("10.20.0.4"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = SshConfig::load(&temp_dir.path().join("missing"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
