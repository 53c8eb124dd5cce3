use anyhow::{anyhow, Context, Result};
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PROJECT_FILE: &str = ".tweetcountrc";
const MAX_ALIAS_DEPTH: usize = 10;

/// Defaults and aliases read from `.tweetcountrc` style files
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub aliases: HashMap<String, String>,
}

impl ConfigFile {
    /// Walk up from `start` looking for a project `.tweetcountrc`
    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        Self::find_project_config_from(&cwd)
    }

    /// User config locations, most preferred first
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("tweetcount").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_FILE));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });
            paths.push(xdg_config.join("tweetcount").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_FILE));
            }
        }

        paths
    }

    /// Load user then project configuration; project entries win
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths().into_iter().find(|p| p.is_file()) {
            config = config.merged_with(Self::load_from_path(&path)?);
        }

        if let Some(path) = Self::find_project_config() {
            config = config.merged_with(Self::load_from_path(&path)?);
        }

        Ok(config)
    }

    /// Load an explicit file if given, otherwise the usual locations
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(Self::parse(&content))
    }

    /// Parse the INI-like format. Unknown keys and sections are ignored.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut section = String::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match section.as_str() {
                "" if key == "defaults" => config.defaults = Some(value.to_string()),
                "aliases" => {
                    config.aliases.insert(key.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        config
    }

    /// Combine with `overlay`, whose entries take precedence
    pub fn merged_with(self, overlay: Self) -> Self {
        let mut aliases = self.aliases;
        aliases.extend(overlay.aliases);
        Self {
            defaults: overlay.defaults.or(self.defaults),
            aliases,
        }
    }

    /// Expand one alias into arguments, following nested `-a` references
    pub fn resolve_alias(&self, name: &str, seen: &mut HashSet<String>, depth: usize) -> Result<Vec<String>> {
        if depth > MAX_ALIAS_DEPTH {
            return Err(anyhow!("Alias chain too deep: {} levels", depth));
        }
        if !seen.insert(name.to_string()) {
            return Err(anyhow!("Circular dependency detected in alias: {}", name));
        }

        let value = self
            .aliases
            .get(name)
            .ok_or_else(|| anyhow!("Unknown alias: {}", name))?;
        let args = shell_words::split(value)
            .with_context(|| format!("Invalid alias '{}': failed to parse arguments", name))?;

        let resolved = self.expand(args, |config, inner| {
            config.resolve_alias(inner, &mut seen.clone(), depth + 1)
        })?;

        seen.remove(name);
        Ok(resolved)
    }

    fn expand<F>(&self, args: Vec<String>, mut resolve: F) -> Result<Vec<String>>
    where
        F: FnMut(&Self, &str) -> Result<Vec<String>>,
    {
        let mut out = Vec::with_capacity(args.len());
        let mut iter = args.into_iter().peekable();

        while let Some(arg) = iter.next() {
            if (arg == "-a" || arg == "--alias") && iter.peek().is_some() {
                if let Some(name) = iter.next() {
                    out.extend(resolve(self, &name)?);
                }
            } else {
                out.push(arg);
            }
        }

        Ok(out)
    }

    /// Prepend configured defaults (after the program name) and expand aliases
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let args = match &self.defaults {
            Some(defaults) => {
                let default_args = shell_words::split(defaults)
                    .context("Invalid defaults: failed to parse arguments")?;
                let mut iter = args.into_iter();
                iter.next()
                    .into_iter()
                    .chain(default_args)
                    .chain(iter)
                    .collect()
            }
            None => args,
        };

        self.expand(args, |config, name| {
            config.resolve_alias(name, &mut HashSet::new(), 0)
        })
    }

    /// Describe where configuration comes from and what is active
    pub fn describe(&self, project: Option<&Path>, user_paths: &[PathBuf]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Configuration precedence: CLI > project {} > user config > defaults\n",
            PROJECT_FILE
        );

        let user = user_paths.iter().find(|p| p.is_file());
        match (project, user) {
            (None, None) => {
                let _ = writeln!(out, "No configuration files found. Using defaults.");
            }
            _ => {
                let _ = writeln!(out, "Configuration loaded from:");
                if let Some(path) = project {
                    let _ = writeln!(out, "  Project: {}", path.display());
                }
                if let Some(path) = user {
                    let _ = writeln!(out, "  User: {}", path.display());
                }
            }
        }

        if let Some(defaults) = &self.defaults {
            let _ = writeln!(out, "\nActive defaults:\n  defaults = {}", defaults);
        }

        if !self.aliases.is_empty() {
            let _ = writeln!(out, "\nActive aliases:");
            let mut sorted: Vec<_> = self.aliases.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                let _ = writeln!(out, "  {} = {}", key, value);
            }
        }

        let _ = writeln!(out, "\nConfiguration search locations (in precedence order):");
        match project {
            Some(path) => {
                let _ = writeln!(out, "  1. Project: {} (found)", path.display());
            }
            None => {
                let _ = writeln!(
                    out,
                    "  1. Project: {} (searched up directory tree, not found)",
                    PROJECT_FILE
                );
            }
        }
        for (i, path) in user_paths.iter().enumerate() {
            let status = if path.is_file() { "(found)" } else { "(not found)" };
            let _ = writeln!(out, "  {}. User: {} {}", i + 2, path.display(), status);
        }

        if project.is_none() && user.is_none() {
            let _ = writeln!(out, "\nExample configuration file ({}):\n", PROJECT_FILE);
            let _ = writeln!(out, "# Arguments applied to every tweetcount command");
            let _ = writeln!(out, "defaults = --workers 4 --field value");
            let _ = writeln!(out, "\n[aliases]");
            let _ = writeln!(out, "tags = --topics --top 20");
            let _ = writeln!(out, "rust = --search rust --ignore-case");
        }

        out
    }

    /// Print the active configuration to stdout
    pub fn show_config() -> Result<()> {
        let config = Self::load()?;
        print!(
            "{}",
            config.describe(
                Self::find_project_config().as_deref(),
                &Self::get_user_config_paths()
            )
        );
        Ok(())
    }
}
