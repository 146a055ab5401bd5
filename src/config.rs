use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::git;
use crate::polecat::{Preference, UnknownPreference};

/// Default pool of polecat names, handed out in order.
const DEFAULT_NAMES: &[&str] = &[
    "furiosa", "nux", "slit", "rictus", "toast", "capable", "cheedo", "dag", "angharad", "ace",
    "keeper", "valkyrie",
];

/// Per-rig settings.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct RigConfig {
    /// Path to the rig's repository. `~/` is expanded.
    #[serde(default)]
    pub repo: Option<String>,

    /// Where polecat worktrees are created (defaults to `<repo>/../<repo name>__polecats`)
    #[serde(default)]
    pub polecat_dir: Option<String>,

    /// Branch fresh polecats are cut from (defaults to the repo's default branch)
    #[serde(default)]
    pub base_branch: Option<String>,
}

/// Configuration for polecats, read from `.polecats.yaml` and the global config
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Directory holding the registry and event log (defaults to the XDG state dir)
    #[serde(default)]
    pub state_dir: Option<String>,

    /// Prefix for tmux session names (defaults to "pc-")
    #[serde(default)]
    pub session_prefix: Option<String>,

    /// Command typed into every new session (e.g. "claude")
    #[serde(default)]
    pub agent: Option<String>,

    /// Ranking used by `sling --reuse` when `--prefer` is not given
    #[serde(default)]
    pub default_preference: Option<String>,

    /// Names handed out to fresh polecats, first unused wins
    #[serde(default)]
    pub names: Option<Vec<String>>,

    /// Known rigs
    #[serde(default)]
    pub rigs: BTreeMap<String, RigConfig>,
}

/// Find the nearest `.polecats.yaml` by walking up from start_dir to the repo root.
pub fn find_project_config(start_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let config_names = [".polecats.yaml", ".polecats.yml"];

    let repo_root = match git::get_repo_root_for(start_dir) {
        Ok(root) => root,
        Err(_) => return Ok(None),
    };

    // Canonicalize both paths to handle symlinks and ensure consistent comparison
    let repo_root = repo_root.canonicalize().unwrap_or(repo_root);
    let mut dir = start_dir
        .canonicalize()
        .unwrap_or_else(|_| start_dir.to_path_buf());

    if !dir.starts_with(&repo_root) {
        return Ok(None);
    }

    loop {
        for name in &config_names {
            let candidate = dir.join(name);
            if candidate.exists() {
                debug!(path = %candidate.display(), "config:found project config");
                return Ok(Some(candidate));
            }
        }
        if dir == repo_root || !dir.pop() {
            break;
        }
    }

    Ok(None)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = home::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

impl Config {
    /// Load and merge global and project configurations.
    pub fn load() -> anyhow::Result<Self> {
        debug!("config:loading");
        let global_config = Self::load_global()?.unwrap_or_default();
        let start_dir = std::env::current_dir().unwrap_or_default();
        let project_config = match find_project_config(&start_dir)? {
            Some(path) => Self::load_from_path(&path)?.unwrap_or_default(),
            None => Self::default(),
        };

        let config = global_config.merge(project_config);
        debug!(
            rigs = config.rigs.len(),
            state_dir = ?config.state_dir,
            "config:loaded"
        );
        Ok(config)
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "config:reading file");
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config at {}: {}", path.display(), e))?;
        Ok(Some(config))
    }

    /// Load the global configuration file from ~/.config/polecats.
    fn load_global() -> anyhow::Result<Option<Self>> {
        if let Some(home_dir) = home::home_dir() {
            for name in ["config.yaml", "config.yml"] {
                let path = home_dir.join(".config/polecats").join(name);
                if path.exists() {
                    return Self::load_from_path(&path);
                }
            }
        }
        Ok(None)
    }

    /// Merge a project config into a global config. Project config takes precedence.
    /// For `names`, a "<global>" entry expands to the global list at that position.
    fn merge(self, project: Self) -> Self {
        fn merge_names(
            global: Option<Vec<String>>,
            project: Option<Vec<String>>,
        ) -> Option<Vec<String>> {
            match (global, project) {
                (Some(global_items), Some(project_items)) => Some(
                    project_items
                        .into_iter()
                        .flat_map(|item| {
                            if item == "<global>" {
                                global_items.clone()
                            } else {
                                vec![item]
                            }
                        })
                        .collect(),
                ),
                (global, project) => project.or(global),
            }
        }

        macro_rules! merge_options {
            ($global:expr, $project:expr, $($field:ident),+ $(,)?) => {
                Self {
                    $($field: $project.$field.or($global.$field),)+
                    ..Default::default()
                }
            };
        }

        let mut merged = merge_options!(
            self,
            project,
            state_dir,
            session_prefix,
            agent,
            default_preference,
        );

        merged.names = merge_names(self.names, project.names);

        // Rigs: union, project overrides per field
        let mut rigs = self.rigs;
        for (name, rig) in project.rigs {
            let entry = rigs.entry(name).or_default();
            *entry = RigConfig {
                repo: rig.repo.or(entry.repo.take()),
                polecat_dir: rig.polecat_dir.or(entry.polecat_dir.take()),
                base_branch: rig.base_branch.or(entry.base_branch.take()),
            };
        }
        merged.rigs = rigs;

        merged
    }

    pub fn session_prefix(&self) -> &str {
        self.session_prefix.as_deref().unwrap_or("pc-")
    }

    /// Preference used when none is given on the command line.
    pub fn default_preference(&self) -> Result<Preference, UnknownPreference> {
        match self.default_preference.as_deref() {
            Some(value) => value.parse(),
            None => Ok(Preference::Any),
        }
    }

    /// Names for fresh polecats, slugified and de-duplicated in order.
    pub fn name_pool(&self) -> Vec<String> {
        let raw: Vec<String> = match &self.names {
            Some(names) if !names.is_empty() => names.clone(),
            _ => DEFAULT_NAMES.iter().map(|s| s.to_string()).collect(),
        };

        let mut pool: Vec<String> = Vec::with_capacity(raw.len());
        for name in raw.iter().map(|n| slug::slugify(n)) {
            if !name.is_empty() && !pool.contains(&name) {
                pool.push(name);
            }
        }
        pool
    }

    pub fn rig(&self, name: &str) -> Option<&RigConfig> {
        self.rigs.get(name)
    }

    /// Create an example .polecats.yaml configuration file
    pub fn init() -> anyhow::Result<()> {
        let config_path = PathBuf::from(".polecats.yaml");

        if config_path.exists() {
            return Err(anyhow::anyhow!(
                ".polecats.yaml already exists. Remove it first if you want to regenerate it."
            ));
        }

        let example_config = r#"# polecats project configuration
# For global settings, edit ~/.config/polecats/config.yaml

# Where the registry and event log live.
# state_dir: ~/.local/state/polecats

# Prefix for tmux session names.
# session_prefix: "pc-"

# Command typed into every new polecat session.
# agent: claude

# Ranking for `sling --reuse` when --prefer is not given.
# Options: any (default), newest, oldest, cleanest
# default_preference: any

# Names handed out to fresh polecats. "<global>" expands to the global list.
# names:
#   - "<global>"
#   - slit

rigs:
  # gastown:
  #   repo: ~/src/gastown
  #   polecat_dir: ~/src/gastown__polecats
  #   base_branch: main
"#;

        fs::write(&config_path, example_config)?;

        println!("✓ Created .polecats.yaml");
        println!("\nAdd your rigs under 'rigs:' and run 'polecats sling <rig>'.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.session_prefix(), "pc-");
        assert_eq!(config.default_preference(), Ok(Preference::Any));
        assert_eq!(config.name_pool().first().map(String::as_str), Some("furiosa"));
        assert!(config.rig("gastown").is_none());
    }

    #[test]
    fn default_preference_is_validated() {
        let config = Config {
            default_preference: Some("Cleanest".to_string()),
            ..Default::default()
        };
        assert_eq!(config.default_preference(), Ok(Preference::Cleanest));

        let bad = Config {
            default_preference: Some("shiniest".to_string()),
            ..Default::default()
        };
        assert!(bad.default_preference().is_err());
    }

    #[test]
    fn merge_prefers_project_values() {
        let global = Config {
            session_prefix: Some("g-".to_string()),
            agent: Some("claude".to_string()),
            ..Default::default()
        };
        let project = Config {
            session_prefix: Some("p-".to_string()),
            ..Default::default()
        };
        let merged = global.merge(project);
        assert_eq!(merged.session_prefix(), "p-");
        assert_eq!(merged.agent.as_deref(), Some("claude"));
    }

    #[test]
    fn merge_names_expands_global_placeholder() {
        let global = Config {
            names: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        let project = Config {
            names: Some(vec!["x".to_string(), "<global>".to_string()]),
            ..Default::default()
        };
        let merged = global.merge(project);
        assert_eq!(merged.name_pool(), vec!["x", "a", "b"]);
    }

    #[test]
    fn name_pool_is_slugified_and_unique() {
        let config = Config {
            names: Some(vec![
                "Max Rockatansky".to_string(),
                "nux".to_string(),
                "NUX".to_string(),
                "!!".to_string(),
            ]),
            ..Default::default()
        };
        assert_eq!(config.name_pool(), vec!["max-rockatansky", "nux"]);
    }

    #[test]
    fn merge_rigs_per_field() {
        let global: Config = serde_yaml::from_str(
            "rigs:\n  gastown:\n    repo: /src/gastown\n    base_branch: main\n  beads:\n    repo: /src/beads\n",
        )
        .unwrap();
        let project: Config =
            serde_yaml::from_str("rigs:\n  gastown:\n    base_branch: develop\n").unwrap();

        let merged = global.merge(project);
        let gastown = merged.rig("gastown").unwrap();
        assert_eq!(gastown.repo.as_deref(), Some("/src/gastown"));
        assert_eq!(gastown.base_branch.as_deref(), Some("develop"));
        assert!(merged.rig("beads").is_some());
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/src/gastown"), PathBuf::from("/src/gastown"));
        if let Some(home) = home::home_dir() {
            assert_eq!(expand_home("~/src"), home.join("src"));
        }
    }

    #[test]
    fn find_project_config_from_subdir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        std::process::Command::new("git")
            .args(["init"])
            .current_dir(root)
            .output()
            .unwrap();

        fs::write(root.join(".polecats.yaml"), "session_prefix: t-").unwrap();
        let nested = root.join("crates").join("core");
        fs::create_dir_all(&nested).unwrap();

        let found = find_project_config(&nested).unwrap().unwrap();
        assert!(found.ends_with(".polecats.yaml"));
        let config = Config::load_from_path(&found).unwrap().unwrap();
        assert_eq!(config.session_prefix(), "t-");
    }

    #[test]
    fn find_project_config_outside_repo_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(find_project_config(temp.path()).unwrap().is_none());
    }
}
