//! The module catalog shipped with the system.
//!
//! Seeded at startup by [`seed_all`](crate::seeding::seed_all). Module
//! logic itself lives in the worker's executors; this only declares what
//! exists and what input each module accepts.

use serde_json::json;

use crate::modules::{ModuleScope, ModuleType};
use crate::seeding::ModuleSeed;

fn entry(
    module_key: &str,
    module_type: ModuleType,
    scope: ModuleScope,
    config_schema: serde_json::Value,
) -> ModuleSeed {
    ModuleSeed {
        module_key: module_key.to_string(),
        module_type,
        scope,
        version: "v1".to_string(),
        config_schema,
        is_enabled: true,
    }
}

pub fn default_catalog() -> Vec<ModuleSeed> {
    use ModuleScope::{PersonLevel, ProjectLevel};
    use ModuleType::{Composer, Connector, Enricher};

    vec![
        // --- Connectors ---
        entry(
            "linkedin-profile-connector",
            Connector,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "profile_url": { "type": "string", "format": "uri" }
                },
                "required": ["profile_url"]
            }),
        ),
        entry(
            "linkedin-posts-connector",
            Connector,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "max_posts": { "type": "integer", "minimum": 1, "maximum": 200 },
                    "since_days": { "type": "integer", "minimum": 1 }
                }
            }),
        ),
        entry(
            "lead-list-import-connector",
            Connector,
            ProjectLevel,
            json!({
                "type": "object",
                "properties": {
                    "source_url": { "type": "string", "format": "uri" },
                    "column_mapping": { "type": "object" }
                },
                "required": ["source_url"]
            }),
        ),
        // --- Enrichers ---
        entry(
            "profile-facts-enricher",
            Enricher,
            PersonLevel,
            json!({ "type": "object", "properties": {} }),
        ),
        entry(
            "post-topics-enricher",
            Enricher,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "max_topics": { "type": "integer", "minimum": 1, "maximum": 20 }
                }
            }),
        ),
        entry(
            "buying-intent-enricher",
            Enricher,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "product_description": { "type": "string" }
                },
                "required": ["product_description"]
            }),
        ),
        // --- Composers ---
        entry(
            "revenue-signal-composer",
            Composer,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "min_confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            }),
        ),
        entry(
            "outreach-angle-composer",
            Composer,
            PersonLevel,
            json!({
                "type": "object",
                "properties": {
                    "tone": { "type": "string", "enum": ["formal", "casual", "direct"] }
                }
            }),
        ),
        entry(
            "project-signal-digest-composer",
            Composer,
            ProjectLevel,
            json!({
                "type": "object",
                "properties": {
                    "top_n": { "type": "integer", "minimum": 1, "maximum": 100 }
                }
            }),
        ),
    ]
}
