use anyhow::{Context, Result};
use directories::BaseDirs;
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

pub const DEFAULT_OUTPUT_NAME: &str = "_out";

const KEY_EXE_OLD: &str = "exe_old";
const KEY_EXE_NEW: &str = "exe_new";
const KEY_OUTPUT_NAME: &str = "output_name";

#[derive(Debug, Clone)]
pub struct Config {
    pub exe_old: String,
    pub exe_new: String,
    pub output_name: String,
    // unknown keys survive a load/save cycle untouched, in order
    extra: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exe_old: String::new(),
            exe_new: String::new(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            extra: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).context("read config")?;
        let mut config = Self::default();
        for line in raw.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').to_string();
            match key {
                KEY_EXE_OLD => config.exe_old = value,
                KEY_EXE_NEW => config.exe_new = value,
                KEY_OUTPUT_NAME => {
                    if !value.is_empty() {
                        config.output_name = value;
                    }
                }
                _ => config.extra.push((key.to_string(), value)),
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config dir")?;
        }
        let mut out = String::new();
        out.push_str(&format!("{KEY_EXE_OLD} = {}\n", self.exe_old));
        out.push_str(&format!("{KEY_EXE_NEW} = {}\n", self.exe_new));
        out.push_str(&format!("{KEY_OUTPUT_NAME} = {}\n", self.output_name));
        for (key, value) in &self.extra {
            out.push_str(&format!("{key} = {value}\n"));
        }
        fs::write(path, out).context("write config")?;
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("pmmpath").join("config.txt"))
}

pub fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|meta| meta.modified().ok())
}
