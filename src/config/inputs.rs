use crate::cli::CliOptions;
use crate::config::snippets;
use failure::{Fallible, ResultExt};
use std::path::{Path, PathBuf};

/// Runtime configuration holding environmental inputs.
#[derive(Debug, Default, Serialize)]
pub(crate) struct ConfigInput {
    pub(crate) client: ClientInput,
    pub(crate) fleet: FleetInput,
    pub(crate) setting: SettingInput,
}

impl ConfigInput {
    /// Read config snippets and merge them into a single config.
    ///
    /// Snippets are `*.toml` files, read in lexical order within each
    /// directory; later values override earlier ones. `extra` is
    /// applied last.
    pub(crate) fn read_configs(dirs: &[&str], extra: Option<&Path>) -> Fallible<Self> {
        let mut paths = vec![];
        for dir in dirs {
            paths.extend(list_snippets(Path::new(dir))?);
        }
        if let Some(p) = extra {
            paths.push(p.to_path_buf());
        }

        let mut snips = vec![];
        for path in paths {
            snips.push(read_snippet(&path)?);
        }
        let cfg = Self::merge_snippets(snips);
        debug!(
            "configuration input:\n{}",
            toml::to_string_pretty(&cfg).unwrap_or_default()
        );

        Ok(cfg)
    }

    /// Merge multiple snippets into a single configuration.
    fn merge_snippets(snippets: Vec<snippets::ConfigSnippet>) -> Self {
        let mut clients = vec![];
        let mut fleets = vec![];
        let mut settings = vec![];

        for snip in snippets {
            if let Some(c) = snip.client {
                clients.push(c);
            }
            if let Some(f) = snip.fleet {
                fleets.push(f);
            }
            if let Some(s) = snip.setting {
                settings.push(s);
            }
        }

        Self {
            client: ClientInput::from_snippets(clients),
            fleet: FleetInput::from_snippets(fleets),
            setting: SettingInput::from_snippets(settings),
        }
    }

    /// Apply command-line overrides on top of merged snippets.
    pub(crate) fn override_with(&mut self, cli: &CliOptions) {
        if let Some(n) = cli.concurrency {
            self.fleet.concurrency = Some(n);
        }
        if !cli.services.is_empty() {
            self.fleet.services = Some(cli.services.clone());
        }

        let setting = &mut self.setting;
        let overrides = vec![
            (&cli.setting_name, &mut setting.name),
            (&cli.workspace_id, &mut setting.workspace_id),
            (&cli.storage_account_id, &mut setting.storage_account_id),
            (&cli.event_hub_rule_id, &mut setting.event_hub_authorization_rule_id),
            (&cli.event_hub_name, &mut setting.event_hub_name),
        ];
        for (value, field) in overrides {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
    }
}

/// List `*.toml` files in a directory, sorted by name.
///
/// A missing directory is not an error.
fn list_snippets(dir: &Path) -> Fallible<Vec<PathBuf>> {
    if !dir.is_dir() {
        trace!("skipping missing config directory {:?}", dir);
        return Ok(vec![]);
    }

    let mut paths = vec![];
    let entries =
        std::fs::read_dir(dir).context(format!("failed to list '{}'", dir.display()))?;
    for entry in entries {
        let path = entry
            .context(format!("failed to list '{}'", dir.display()))?
            .path();
        let is_toml = path.extension().map(|e| e == "toml").unwrap_or(false);
        if is_toml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_snippet(path: &Path) -> Fallible<snippets::ConfigSnippet> {
    use std::io::Read;
    trace!("reading config snippet from {:?}", path);

    let fp = std::fs::File::open(path)
        .context(format!("failed to open file '{}'", path.display()))?;
    let mut bufrd = std::io::BufReader::new(fp);
    let mut content = vec![];
    bufrd
        .read_to_end(&mut content)
        .context("failed to read file content")?;
    let snippet: snippets::ConfigSnippet = toml::from_slice(&content)
        .context(format!("failed to parse TOML in '{}'", path.display()))?;

    Ok(snippet)
}

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct ClientInput {
    pub(crate) endpoint: String,
    pub(crate) api_version: String,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) token_source: String,
    pub(crate) token_env: String,
}

impl ClientInput {
    fn from_snippets(snippets: Vec<snippets::ClientSnippet>) -> Self {
        let mut cfg = Self::default();

        for snip in snippets {
            if let Some(e) = snip.endpoint {
                cfg.endpoint = e;
            }
            if let Some(v) = snip.api_version {
                cfg.api_version = v;
            }
            if let Some(t) = snip.timeout_secs {
                cfg.timeout_secs = Some(t);
            }
            if let Some(s) = snip.token_source {
                cfg.token_source = s;
            }
            if let Some(e) = snip.token_env {
                cfg.token_env = e;
            }
        }

        cfg
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct FleetInput {
    pub(crate) concurrency: Option<usize>,
    pub(crate) services: Option<Vec<String>>,
}

impl FleetInput {
    fn from_snippets(snippets: Vec<snippets::FleetSnippet>) -> Self {
        let mut cfg = Self::default();

        for snip in snippets {
            if let Some(c) = snip.concurrency {
                cfg.concurrency = Some(c);
            }
            if let Some(s) = snip.services {
                cfg.services = Some(s);
            }
        }

        cfg
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct SettingInput {
    pub(crate) name: String,
    pub(crate) workspace_id: String,
    pub(crate) storage_account_id: String,
    pub(crate) event_hub_authorization_rule_id: String,
    pub(crate) event_hub_name: String,
    pub(crate) logs: Option<Vec<String>>,
    pub(crate) metrics: Option<Vec<String>>,
}

impl SettingInput {
    fn from_snippets(snippets: Vec<snippets::SettingSnippet>) -> Self {
        let mut cfg = Self::default();

        for snip in snippets {
            if let Some(n) = snip.name {
                cfg.name = n;
            }
            if let Some(w) = snip.workspace_id {
                cfg.workspace_id = w;
            }
            if let Some(s) = snip.storage_account_id {
                cfg.storage_account_id = s;
            }
            if let Some(r) = snip.event_hub_authorization_rule_id {
                cfg.event_hub_authorization_rule_id = r;
            }
            if let Some(h) = snip.event_hub_name {
                cfg.event_hub_name = h;
            }
            if let Some(l) = snip.logs {
                cfg.logs = Some(l);
            }
            if let Some(m) = snip.metrics {
                cfg.metrics = Some(m);
            }
        }

        cfg
    }
}
