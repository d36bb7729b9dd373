//! # bnsconfig - configuration de BounceNSend
//!
//! Un fichier `config.yaml` par poste, fusionné avec les valeurs par défaut
//! embarquées (`bouncensend.yaml`). Les variables d'environnement priment :
//! `BNS_CONFIG__MASV__API_KEY=...` remplace `masv.api_key`, et les variables
//! plates des anciens `.env` (`MASV_API_KEY`, `PROTOOLS_PORT`, ...) sont
//! encore reconnues. Ces surcharges restent en mémoire et ne sont jamais
//! réécrites sur disque.
//!
//! Les secrets (`masv.api_key`, `masv.portal_password`) peuvent être stockés
//! sous la forme `encrypted:...` (voir [`encryption`]).
//!
//! Les réglages Pro Tools et MASV sont exposés par les traits d'extension de
//! `bnsprotools` et `bnsmasv`; ce module ne connaît que les chemins YAML.
//!
//! ```no_run
//! use bnsconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! let bounce_dir = config.get_managed_dir(&["bounce", "directory"], "bounces")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};
use tracing::{debug, info};

pub mod encryption;

const DEFAULT_CONFIG: &str = include_str!("bouncensend.yaml");

static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

const ENV_CONFIG_DIR: &str = "BNS_CONFIG";
const ENV_PREFIX: &str = "BNS_CONFIG__";
const CONFIG_DIR_NAME: &str = ".bouncensend";

/// Variables plates reconnues pour les `.env` de l'ancienne installation
/// en shell. Les surcharges `BNS_CONFIG__` imbriquées priment.
const LEGACY_ENV_VARS: &[(&str, &[&str])] = &[
    ("MASV_API_KEY", &["masv", "api_key"]),
    ("MASV_TEAM_ID", &["masv", "team_id"]),
    ("PROTOOLS_HOST", &["protools", "host"]),
    ("PROTOOLS_PORT", &["protools", "port"]),
    ("DEFAULT_BOUNCE_FORMAT", &["bounce", "file_type"]),
    ("DEFAULT_BIT_DEPTH", &["bounce", "bit_depth"]),
    ("DEFAULT_SAMPLE_RATE", &["bounce", "sample_rate"]),
];

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Deux arbres YAML : `stored` reflète `config.yaml`, `effective` y ajoute
/// les surcharges d'environnement. Seul `stored` est écrit sur disque.
#[derive(Debug, Clone)]
struct ConfigData {
    stored: Value,
    effective: Value,
}

impl ConfigData {
    fn new(stored: Value) -> Self {
        let effective = Config::with_env_overrides(stored.clone());
        Self { stored, effective }
    }
}

/// Configuration chargée depuis un répertoire
///
/// L'arbre YAML est partagé derrière un `Mutex`; chaque `set_*` réécrit
/// `config.yaml` immédiatement.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<ConfigData>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Premier candidat retenu : argument, `BNS_CONFIG`, `./.bouncensend`,
    /// `~/.bouncensend`. À défaut, `./.bouncensend` sera créé.
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            debug!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory taken from environment");
            return from_env;
        }

        let home_candidate = home_dir().map(|home| home.join(CONFIG_DIR_NAME));
        [Some(PathBuf::from(CONFIG_DIR_NAME)), home_candidate]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
            .map(|dir| dir.to_string_lossy().to_string())
            .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
    }

    /// Crée le répertoire au besoin et vérifie qu'il est inscriptible
    fn validate_config_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(anyhow!("Config path {} is not a directory", path.display()));
        }

        let probe = path.join(".bns_write_probe");
        fs::write(&probe, b"ok")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|e| anyhow!("Config directory {} is not writable: {}", path.display(), e))
    }

    /// Résout puis prépare le répertoire de configuration (voir
    /// `find_config_dir` pour l'ordre de recherche)
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir))?;
        Ok(dir)
    }

    /// Charge `config.yaml` depuis `directory` (vide = recherche par défaut).
    ///
    /// Le résultat de la fusion avec les défauts est réécrit sur disque.
    /// Les variables d'environnement ne s'appliquent qu'à la vue en mémoire :
    /// un secret passé par l'environnement n'atterrit jamais dans le fichier,
    /// même après un `set_value` ultérieur.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .to_string();
        info!(config_dir = %config_dir, "Using config directory");

        // Clés en minuscules des deux côtés avant fusion, sinon `Bounce:`
        // écraserait toute la section `bounce` par défaut
        let mut merged = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        match fs::read(&path) {
            Ok(bytes) => {
                // Un fichier vide est parsé comme Null : on garde alors les défauts
                let local: Value = serde_yaml::from_slice(&bytes)?;
                merge_yaml(&mut merged, &Self::lower_keys_value(local));
                info!(config_file = %path, "Loaded config file");
            }
            Err(_) => info!(config_file = %path, "No config.yaml yet, writing defaults"),
        }

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(ConfigData::new(merged)),
        };

        config.save()?;
        Ok(config)
    }

    /// Chemin du fichier `config.yaml`
    pub fn file_path(&self) -> &str {
        &self.path
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, ConfigData> {
        // Un panic pendant une écriture ne laisse pas le Value incohérent
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Écrit la configuration fichier (sans les surcharges d'environnement)
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&self.lock_data().stored)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Modifie une valeur puis sauvegarde
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin de clés (ex. `&["protools", "port"]`)
    /// * `value` - Valeur YAML à écrire
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock_data();
            Self::set_value_internal(&mut data.stored, path, value)?;
            // L'environnement garde la priorité sur la valeur écrite
            data.effective = Self::with_env_overrides(data.stored.clone());
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Lit la valeur effective (environnement compris) au chemin donné
    ///
    /// Erreur si le chemin n'existe pas.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data();
        Self::get_value_internal(&data.effective, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Lit une chaîne; nombres et booléens sont convertis.
    ///
    /// `None` si le chemin manque, vaut null ou une chaîne vide.
    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path).ok()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Lit un entier non signé, y compris sous forme de chaîne (environnement).
    pub fn get_usize(&self, path: &[&str]) -> Option<usize> {
        match self.get_value(path).ok()? {
            Value::Number(n) => n.as_u64().map(|v| v as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lit un booléen, y compris `"true"` / `"false"` en chaîne.
    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        match self.get_value(path).ok()? {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lit une liste de chaînes; une chaîne seule est découpée sur les espaces.
    pub fn get_string_list(&self, path: &[&str]) -> Option<Vec<String>> {
        match self.get_value(path).ok()? {
            Value::Sequence(seq) => Some(
                seq.into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::String(s) if !s.trim().is_empty() => {
                Some(s.split_whitespace().map(str::to_string).collect())
            }
            _ => None,
        }
    }

    /// Lit un secret, déchiffré s'il est stocké en `encrypted:...`.
    ///
    /// `Ok(None)` si le secret n'est pas configuré.
    pub fn get_secret(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_string(path) {
            Some(value) => Ok(Some(encryption::get_secret(&value)?)),
            None => Ok(None),
        }
    }

    /// Stocke un secret chiffré avec la clé du poste.
    pub fn set_secret(&self, path: &[&str], secret: &str) -> Result<()> {
        let encrypted = encryption::encrypt_secret(secret)?;
        self.set_value(path, Value::String(encrypted))
    }

    fn with_env_overrides(mut config: Value) -> Value {
        Self::apply_legacy_env_overrides(&mut config);
        Self::apply_env_overrides(&mut config);
        config
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                debug!(env_var=%key, "Applying config override from environment");
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn apply_legacy_env_overrides(config: &mut Value) {
        for (var, path) in LEGACY_ENV_VARS {
            if let Ok(value) = env::var(var) {
                if value.trim().is_empty() {
                    continue;
                }
                debug!(env_var=%var, "Applying legacy config override from environment");
                let _ = Self::set_value_internal(config, path, Self::convert_env_value(&value));
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Résout un chemin (`~`, relatif ou absolu) et crée le répertoire si nécessaire
    ///
    /// Les chemins relatifs sont résolus par rapport au répertoire de configuration.
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<PathBuf> {
        let expanded = expand_home(dir_path);

        let absolute_path = if expanded.is_absolute() {
            expanded
        } else {
            Path::new(&self.config_dir).join(expanded)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory=%absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path)
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Le répertoire peut être absolu, relatif au répertoire de configuration
    /// ou commencer par `~`. Il est créé s'il n'existe pas. Si la clé est
    /// absente, `default` est persisté puis utilisé.
    ///
    /// ```no_run
    /// use bnsconfig::get_config;
    ///
    /// let config = get_config();
    /// let dir = config.get_managed_dir(&["bounce", "directory"], "bounces")?;
    /// println!("Bounce directory: {}", dir.display());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let dir_path = match self.get_string(path) {
            Some(s) => s,
            None => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    /// Définit un répertoire géré par la configuration
    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    /// Sortie console des logs (`host.logger.enable_console`, vrai par défaut)
    pub fn get_log_enable_console(&self) -> Result<bool> {
        Ok(self
            .get_bool(&["host", "logger", "enable_console"])
            .unwrap_or(DEFAULT_LOG_ENABLE_CONSOLE))
    }

    pub fn set_log_enable_console(&self, enabled: bool) -> Result<()> {
        self.set_value(&["host", "logger", "enable_console"], Value::Bool(enabled))
    }

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_string(&["host", "logger", "min_level"])
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Remplace un `~` initial par le répertoire de l'utilisateur.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Charge la configuration globale depuis `directory` (vide = recherche par défaut).
///
/// N'a d'effet qu'avant le premier [`get_config`]; les appels suivants
/// retournent l'instance déjà initialisée.
pub fn init_config(directory: &str) -> Result<Arc<Config>> {
    if let Some(config) = CONFIG.get() {
        return Ok(config.clone());
    }
    let config = Arc::new(Config::load_config(directory)?);
    Ok(CONFIG.get_or_init(|| config).clone())
}

/// Instance globale de la configuration
///
/// Chargée au premier accès avec la recherche de répertoire par défaut.
///
/// # Panics
///
/// Si le répertoire ne peut être créé ou si le YAML est invalide.
pub fn get_config() -> Arc<Config> {
    CONFIG
        .get_or_init(|| {
            Arc::new(
                Config::load_config("").expect("Failed to load BounceNSend configuration"),
            )
        })
        .clone()
}

/// Fusionne la configuration externe dans les valeurs par défaut
///
/// - les mappings sont fusionnés clé par clé
/// - scalaires et séquences externes remplacent ceux par défaut
/// - un document externe null laisse les défauts intacts
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (_, Value::Null) => {}
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_yaml_keeps_defaults() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let external: Value = serde_yaml::from_str("b:\n  c: 20\ne: 5\n").unwrap();
        merge_yaml(&mut default, &external);

        assert_eq!(default["a"], Value::from(1));
        assert_eq!(default["b"]["c"], Value::from(20));
        assert_eq!(default["b"]["d"], Value::from(3));
        assert_eq!(default["e"], Value::from(5));
    }

    #[test]
    fn test_merge_yaml_null_external() {
        let mut default: Value = serde_yaml::from_str("a: 1").unwrap();
        merge_yaml(&mut default, &Value::Null);
        assert_eq!(default["a"], Value::from(1));
    }

    #[test]
    fn test_lower_keys() {
        let value: Value = serde_yaml::from_str("MASV:\n  API_KEY: x\n").unwrap();
        let lowered = Config::lower_keys_value(value);
        assert_eq!(lowered["masv"]["api_key"], Value::from("x"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        if let Some(home) = home_dir() {
            assert_eq!(expand_home("~/Desktop"), home.join("Desktop"));
        }
    }

    #[test]
    fn test_convert_env_value() {
        assert_eq!(Config::convert_env_value("42"), Value::from(42));
        assert_eq!(Config::convert_env_value("true"), Value::from(true));
        assert_eq!(Config::convert_env_value("abc"), Value::from("abc"));
    }
}
