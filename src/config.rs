//! Configuration types for the two pipeline stages.
//!
//! [`ConvertConfig`] controls backend selection for the document→Markdown
//! stage; [`ExtractConfig`] controls the structured-extraction stage. Both
//! are built through builders so callers set only what they care about and
//! rely on documented defaults for the rest.

use crate::error::SiftError;

/// Configuration for document-to-Markdown conversion.
///
/// # Example
/// ```rust
/// use docsift::ConvertConfig;
///
/// let config = ConvertConfig::builder()
///     .render_url("http://localhost:8765")
///     .force_render(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Route every input to the render backend, bypassing extension routing.
    /// Checked before the extension table. Default: false.
    pub force_render: bool,

    /// Path or name of the pandoc executable. Default: "pandoc" (resolved
    /// via PATH).
    pub pandoc_path: String,

    /// Base URL of the rendering service for PDFs and images.
    /// Default: "http://localhost:8765".
    pub render_url: String,

    /// Per-request timeout for the rendering service, in seconds.
    /// Rendering a large scanned PDF can legitimately take minutes.
    /// Default: 600.
    pub render_timeout_secs: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            force_render: false,
            pandoc_path: "pandoc".to_string(),
            render_url: "http://localhost:8765".to_string(),
            render_timeout_secs: 600,
        }
    }
}

impl ConvertConfig {
    pub fn builder() -> ConvertConfigBuilder {
        ConvertConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConvertConfig`].
#[derive(Debug)]
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    pub fn force_render(mut self, v: bool) -> Self {
        self.config.force_render = v;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<String>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn render_url(mut self, url: impl Into<String>) -> Self {
        self.config.render_url = url.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<ConvertConfig, SiftError> {
        if self.config.render_url.is_empty() {
            return Err(SiftError::InvalidConfig("render_url must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Configuration for structured extraction.
///
/// # Example
/// ```rust
/// use docsift::ExtractConfig;
///
/// let config = ExtractConfig::builder()
///     .model("gpt-4o-mini")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Model identifier sent to the chat-completions endpoint.
    /// Default: "gpt-4o-mini".
    pub model: String,

    /// Base URL of an OpenAI-compatible API. Default:
    /// "https://api.openai.com/v1".
    pub base_url: String,

    /// API key. When None, `OPENAI_API_KEY` is read from the environment at
    /// client construction time.
    pub api_key: Option<String>,

    /// Sampling temperature. Extraction wants determinism, so the default
    /// is 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per extraction. Default: 4096.
    pub max_tokens: usize,

    /// Retry budget for one extraction call: the request is attempted
    /// `max_retries + 1` times on API failure or a non-conformant response.
    /// Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt.
    /// Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom extraction prompt prepended to the document text instead of
    /// the built-in one.
    pub custom_prompt: Option<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            custom_prompt: None,
        }
    }
}

impl ExtractConfig {
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<ExtractConfig, SiftError> {
        let c = &self.config;
        if c.model.is_empty() {
            return Err(SiftError::InvalidConfig("model must not be empty".into()));
        }
        if c.base_url.is_empty() {
            return Err(SiftError::InvalidConfig("base_url must not be empty".into()));
        }
        Ok(self.config)
    }
}
