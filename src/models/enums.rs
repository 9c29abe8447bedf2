use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the serde representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Declaration order is rank order: LOW < MEDIUM < HIGH < CRITICAL.
str_enum!(Severity {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Map a secondary analyzer urgency label onto a severity.
    /// Unknown or missing labels map to LOW.
    pub fn from_urgency(urgency: &str) -> Self {
        urgency
            .trim()
            .to_ascii_uppercase()
            .parse()
            .unwrap_or(Self::Low)
    }

    pub fn requires_immediate_attention(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

str_enum!(Recommendation {
    Approve => "APPROVE",
    Review => "REVIEW",
    Flag => "FLAG",
    Escalate => "ESCALATE",
});

impl Recommendation {
    /// Lenient parse for labels coming back from the secondary analyzer.
    pub fn from_label(label: &str) -> Option<Self> {
        label.trim().to_ascii_uppercase().parse().ok()
    }

    /// Whether this recommendation means the content needs human attention.
    pub fn is_flagging(self) -> bool {
        !matches!(self, Self::Approve)
    }
}

str_enum!(ModerationStatus {
    Pending => "pending",
    Processing => "processing",
    Flagged => "flagged",
    Approved => "approved",
    Retry => "retry",
    FailedProcessing => "failed_processing",
});

str_enum!(DecisionMethod {
    LibrariesOnly => "libraries_only",
    CombinedAnalysis => "combined_analysis",
    AiOnly => "ai_only",
    AiErrorFallback => "ai_error_fallback",
});

str_enum!(TriggeredMethod {
    MlProfanity => "ML_PROFANITY",
    DictionaryProfanity => "DICTIONARY_PROFANITY",
    StrongNegativeSentiment => "STRONG_NEGATIVE_SENTIMENT",
    ModerateNegativeSentiment => "MODERATE_NEGATIVE_SENTIMENT",
    ExcessiveCaps => "EXCESSIVE_CAPS",
});

str_enum!(SentimentLabel {
    Positive => "POSITIVE",
    Negative => "NEGATIVE",
    Neutral => "NEUTRAL",
});

/// Selection rank for a complaint priority label (urgent first).
pub fn priority_rank(priority: &str) -> u8 {
    match priority {
        "urgent" => 1,
        "high" => 2,
        "normal" => 3,
        _ => 4,
    }
}
