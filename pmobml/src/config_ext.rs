//! Extension de pmoconfig pour le bridge
//!
//! Le trait `BridgeConfigExt` regroupe les réglages du contrôleur en une
//! seule valeur `BridgeSettings`, construite à partir de `pmoconfig::Config`.

use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;

use crate::nvram::FileNvram;

pub const DEFAULT_API_BASE_URL: &str = "https://databroadcasting-api.invalid";

/// Tunables of the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeSettings {
    pub network_enabled: bool,
    pub api_base_url: String,
    /// Remote-control indicator idle timeout.
    pub indicator_timeout: Duration,
    /// Offset subtracted from the PCR clock before it reaches the caption renderer.
    pub caption_latency: Duration,
    /// Stream/wall clock gap beyond which the content is considered played back.
    pub record_threshold: Duration,
    pub one_seg_width: u32,
    pub one_seg_height: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            network_enabled: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            indicator_timeout: Duration::from_millis(60_000),
            caption_latency: Duration::from_millis(450),
            record_threshold: Duration::from_millis(5 * 60 * 1000),
            one_seg_width: 240,
            one_seg_height: 480,
        }
    }
}

/// Trait d'extension de `pmoconfig::Config`
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmobml::BridgeConfigExt;
///
/// let settings = get_config().bridge_settings()?;
/// ```
pub trait BridgeConfigExt {
    /// Lit tous les réglages du contrôleur
    fn bridge_settings(&self) -> Result<BridgeSettings>;

    /// Ouvre le stockage NVRAM dans le répertoire géré par la configuration
    fn nvram_store(&self) -> Result<FileNvram>;
}

impl BridgeConfigExt for Config {
    fn bridge_settings(&self) -> Result<BridgeSettings> {
        Ok(BridgeSettings {
            network_enabled: self.get_network_enabled()?,
            api_base_url: self.get_api_base_url()?,
            indicator_timeout: Duration::from_millis(self.get_indicator_timeout_ms()?),
            caption_latency: Duration::from_millis(self.get_caption_latency_ms()?),
            record_threshold: Duration::from_millis(self.get_record_threshold_ms()?),
            one_seg_width: u32::try_from(self.get_one_seg_width()?)?,
            one_seg_height: u32::try_from(self.get_one_seg_height()?)?,
        })
    }

    fn nvram_store(&self) -> Result<FileNvram> {
        Ok(FileNvram::new(self.get_nvram_dir()?)?)
    }
}
