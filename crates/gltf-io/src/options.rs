use crate::hooks::Hooks;
use crate::traits::FetchOptions;

/// Generator whose exported texture coordinates already match engine
/// convention.
pub const DEFAULT_FLIP_V_EXEMPT_GENERATOR: &str = "PlayCanvas";

/// Configuration for one parse.
pub struct LoadOptions {
    /// Base that relative external URIs are joined to.
    pub base_path: String,
    /// Prefix stripped from resolved URLs before they reach the fetcher.
    pub registry_prefix: Option<String>,
    /// Whether the target device can draw with 32-bit indices.
    pub supports_u32_indices: bool,
    /// `asset.generator` values whose UVs are not V-flipped.
    pub flip_v_exempt_generators: Vec<String>,
    pub fetch: FetchOptions,
    pub hooks: Hooks,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            registry_prefix: None,
            supports_u32_indices: true,
            flip_v_exempt_generators: vec![DEFAULT_FLIP_V_EXEMPT_GENERATOR.to_string()],
            fetch: FetchOptions::default(),
            hooks: Hooks::default(),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_registry_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry_prefix = Some(prefix.into());
        self
    }

    pub fn with_u32_indices(mut self, supported: bool) -> Self {
        self.supports_u32_indices = supported;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Whether texture V coordinates should be flipped for a document
    /// produced by `generator`.
    pub fn flip_v(&self, generator: Option<&str>) -> bool {
        match generator {
            Some(g) => !self.flip_v_exempt_generators.iter().any(|e| e == g),
            None => true,
        }
    }
}
