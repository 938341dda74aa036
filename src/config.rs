//! Reader configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::cache::CACHE_CAPACITY_BYTES;
use crate::layout::{FlowOptions, PageGeometry};
use crate::Size;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Byte budget of the rendered page cache
    pub cache_capacity_bytes: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub font_size: f32,
    /// Typesetting for reflowable text documents
    pub flow: FlowOptions,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: CACHE_CAPACITY_BYTES,
            page_width: 600.0,
            page_height: 800.0,
            font_size: 16.0,
            flow: FlowOptions::default(),
        }
    }
}

impl ReaderConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults overridden by `FOLIO_CACHE_BYTES`, `FOLIO_PAGE_WIDTH`,
    /// `FOLIO_PAGE_HEIGHT` and `FOLIO_FONT_SIZE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_capacity_bytes: env_or("FOLIO_CACHE_BYTES", defaults.cache_capacity_bytes),
            page_width: env_or("FOLIO_PAGE_WIDTH", defaults.page_width),
            page_height: env_or("FOLIO_PAGE_HEIGHT", defaults.page_height),
            font_size: env_or("FOLIO_FONT_SIZE", defaults.font_size),
            flow: defaults.flow,
        }
    }

    /// Initial geometry for newly opened documents
    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::new(Size::new(self.page_width, self.page_height), self.font_size)
    }
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Ignoring unparsable config value");
            default
        }),
        Err(_) => default,
    }
}
