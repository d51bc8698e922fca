use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    /// Language the detector looks for and the provider translates from.
    pub source_lang: String,
    pub target_lang: String,
    /// Overrides the public translation endpoint; used by tests.
    pub translate_base_url: Option<String>,
    pub server_addr: String,
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "zh-CN".to_string(),
            target_lang: "en".to_string(),
            translate_base_url: None,
            server_addr: "0.0.0.0:8000".to_string(),
            download_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translate: Option<TranslateSettings>,
    server: Option<ServerSettings>,
    download: Option<DownloadSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    source: Option<String>,
    target: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadSettings {
    timeout: Option<u64>,
}

/// Loads layered settings: working-directory files, then the home directory,
/// then an explicit extra file, each overriding what came before.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translate) = incoming.translate {
            if let Some(source) = translate.source {
                if !source.trim().is_empty() {
                    self.source_lang = source;
                }
            }
            if let Some(target) = translate.target {
                if !target.trim().is_empty() {
                    self.target_lang = target;
                }
            }
            if let Some(base_url) = translate.base_url {
                if !base_url.trim().is_empty() {
                    self.translate_base_url = Some(base_url);
                }
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr;
                }
            }
        }
        if let Some(download) = incoming.download {
            if let Some(timeout) = download.timeout {
                if timeout > 0 {
                    self.download_timeout_secs = timeout;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pdf-catalogue-translator"))
        }
    })
}
