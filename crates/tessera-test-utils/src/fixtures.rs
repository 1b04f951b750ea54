// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Descriptor and configuration fixtures.

use serde_json::Value;
use tessera_core::{ConfigMap, PluginDescriptor, PluginType};

/// A valid descriptor for `id` with API range 1..=1.
pub fn descriptor(id: &str, plugin_type: PluginType) -> PluginDescriptor {
    let mut descriptor = PluginDescriptor::new(id, plugin_type);
    descriptor.description = format!("test plugin {id}");
    descriptor.author = "Tessera Contributors".to_string();
    descriptor
}

/// Build a configuration map from key/value pairs.
pub fn config(pairs: &[(&str, Value)]) -> ConfigMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A minimal `plugin.toml` document.
pub fn manifest_toml(id: &str, plugin_type: PluginType, min_api: u32, max_api: u32) -> String {
    format!(
        r#"[plugin]
id = "{id}"
name = "{id}"
version = "0.1.0"
description = "test plugin {id}"
type = "{plugin_type}"

[plugin.api]
min = {min_api}
max = {max_api}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_valid() {
        assert!(descriptor("a", PluginType::Theme).validate().is_ok());
        let cfg = config(&[("lang", Value::from("eng"))]);
        assert_eq!(cfg["lang"], "eng");
        assert!(manifest_toml("a", PluginType::Ocr, 1, 2).contains("type = \"OCR\""));
    }
}
