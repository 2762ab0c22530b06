use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 50;
pub const DEFAULT_MAX_QUESTION_LENGTH: usize = 4000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Content categories the provider classifies and may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];

    /// Name used by the Gemini API.
    pub fn api_name(&self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }

    /// Suffix of the environment variable that overrides this category.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARASSMENT",
            HarmCategory::HateSpeech => "HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "DANGEROUS_CONTENT",
        }
    }
}

/// How eagerly the provider blocks content in a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyThreshold {
    BlockLow,
    BlockMedium,
    #[default]
    BlockHigh,
    BlockNone,
}

impl SafetyThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyThreshold::BlockLow => "block-low",
            SafetyThreshold::BlockMedium => "block-medium",
            SafetyThreshold::BlockHigh => "block-high",
            SafetyThreshold::BlockNone => "block-none",
        }
    }

    /// Name used by the Gemini API.
    pub fn api_name(&self) -> &'static str {
        match self {
            SafetyThreshold::BlockLow => "BLOCK_LOW_AND_ABOVE",
            SafetyThreshold::BlockMedium => "BLOCK_MEDIUM_AND_ABOVE",
            SafetyThreshold::BlockHigh => "BLOCK_ONLY_HIGH",
            SafetyThreshold::BlockNone => "BLOCK_NONE",
        }
    }

    /// Accepts the short names as well as the Gemini API names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "block-low" | "block-low-and-above" => Some(SafetyThreshold::BlockLow),
            "block-medium" | "block-medium-and-above" => Some(SafetyThreshold::BlockMedium),
            "block-high" | "block-only-high" => Some(SafetyThreshold::BlockHigh),
            "block-none" => Some(SafetyThreshold::BlockNone),
            _ => None,
        }
    }
}

/// Thresholds for the four harm categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafetySettings {
    pub harassment: SafetyThreshold,
    pub hate_speech: SafetyThreshold,
    pub sexually_explicit: SafetyThreshold,
    pub dangerous_content: SafetyThreshold,
}

impl SafetySettings {
    pub fn threshold(&self, category: HarmCategory) -> SafetyThreshold {
        match category {
            HarmCategory::Harassment => self.harassment,
            HarmCategory::HateSpeech => self.hate_speech,
            HarmCategory::SexuallyExplicit => self.sexually_explicit,
            HarmCategory::DangerousContent => self.dangerous_content,
        }
    }

    pub fn with_threshold(mut self, category: HarmCategory, threshold: SafetyThreshold) -> Self {
        match category {
            HarmCategory::Harassment => self.harassment = threshold,
            HarmCategory::HateSpeech => self.hate_speech = threshold,
            HarmCategory::SexuallyExplicit => self.sexually_explicit = threshold,
            HarmCategory::DangerousContent => self.dangerous_content = threshold,
        }
        self
    }

    /// Category/threshold pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (HarmCategory, SafetyThreshold)> + '_ {
        HarmCategory::ALL.into_iter().map(|c| (c, self.threshold(c)))
    }
}

/// Immutable provider connection parameters, assembled once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    model: String,
    api_base_url: String,
    safety: SafetySettings,
    max_history_length: usize,
    max_question_length: usize,
    request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            safety: SafetySettings::default(),
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            max_question_length: DEFAULT_MAX_QUESTION_LENGTH,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_safety(mut self, safety: SafetySettings) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_max_history_length(mut self, max: usize) -> Self {
        self.max_history_length = max;
        self
    }

    pub fn with_max_question_length(mut self, max: usize) -> Self {
        self.max_question_length = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn safety(&self) -> &SafetySettings {
        &self.safety
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length
    }

    pub fn max_question_length(&self) -> usize {
        self.max_question_length
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}
