//! Announcements: what to say when a customer is called, and which
//! platform voice to say it with.
//!
//! Nothing here touches the store. The consumer decides when to announce
//! (typically right after a successful call) and hands the text to an
//! [`Announcer`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::CustomerRecord;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The message read out when a customer's device is ready.
pub fn call_message(record: &CustomerRecord) -> String {
    format!(
        "{}, owner of {}, your device is ready.",
        record.name, record.device
    )
}

/// Normalise text for speech: a space after each `.`, `,`, `:` and `;` so
/// synthesizers pause there, then collapse whitespace and trim.
pub fn speech_text(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        spaced.push(ch);
        if matches!(ch, '.' | ',' | ':' | ';') {
            spaced.push(' ');
        }
    }
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Speech output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub enabled: bool,
    /// 0.0..=1.0
    pub volume: f32,
    /// 0.1..=10.0
    pub rate: f32,
    /// 0.0..=2.0
    pub pitch: f32,
    /// Exact voice name, or "auto" to let the picker choose.
    pub voice: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.9,
            rate: 0.85,
            pitch: 1.1,
            voice: AUTO_VOICE.to_string(),
        }
    }
}

/// `voice` value that defers to the picker.
pub const AUTO_VOICE: &str = "auto";

impl VoiceSettings {
    /// Clamp numeric settings into the ranges speech engines accept.
    pub fn clamped(mut self) -> Self {
        self.volume = clamp_or(self.volume, 0.0, 1.0, 0.9);
        self.rate = clamp_or(self.rate, 0.1, 10.0, 0.85);
        self.pitch = clamp_or(self.pitch, 0.0, 2.0, 1.1);
        self
    }

    /// The explicitly requested voice, if not "auto".
    pub fn requested_voice(&self) -> Option<&str> {
        let voice = self.voice.trim();
        if voice.is_empty() || voice.eq_ignore_ascii_case(AUTO_VOICE) {
            None
        } else {
            Some(voice)
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

// ---------------------------------------------------------------------------
// Voice selection
// ---------------------------------------------------------------------------

/// A voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceOption {
    pub name: String,
    /// BCP 47 tag, e.g. "en-GB".
    pub lang: String,
}

impl VoiceOption {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    fn lang_normalized(&self) -> String {
        self.lang.replace('_', "-").to_ascii_lowercase()
    }
}

impl std::str::FromStr for VoiceOption {
    type Err = crate::error::Error;

    /// Parse `name:lang`. The split is on the last colon.
    fn from_str(s: &str) -> crate::error::Result<Self> {
        let (name, lang) = s.rsplit_once(':').ok_or_else(|| {
            crate::error::Error::Other(format!("expected name:lang, got {s:?}"))
        })?;
        Ok(Self::new(name.trim(), lang.trim()))
    }
}

const PREFERRED_VOICES: &[&str] = &[
    "Samantha",
    "Victoria",
    "Karen",
    "Moira",
    "Google UK English Female",
    "Google US English Female",
    "Microsoft Hazel Desktop",
    "Microsoft Zira Desktop",
    "Fiona",
    "Kate",
    "Serena",
    "Ava",
    "Allison",
    "UK English Female",
];

const MALE_INDICATORS: &[&str] = &[
    "male",
    "man",
    "david",
    "mark",
    "alex",
    "daniel",
    "tom",
    "mike",
    "john",
    "james",
    "robert",
    "william",
    "richard",
    "christopher",
    "matthew",
    "anthony",
];

/// Does the voice name suggest a male voice?
///
/// Note "female" contains "male", so names are checked for "female" first.
pub fn is_male_voice(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.contains("female") {
        let without = lower.replace("female", "");
        return MALE_INDICATORS.iter().any(|m| without.contains(m));
    }
    MALE_INDICATORS.iter().any(|m| lower.contains(m))
}

/// One step of the preference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceRule {
    /// Name equals this exactly.
    ExactName(String),
    /// Name contains this text.
    NameContains(String),
    /// Structural match on language and name.
    Matching {
        /// Language must start with one of these (lowercase, `-` separated).
        lang_prefixes: Vec<String>,
        /// Name must contain one of these (empty means no constraint).
        vendors: Vec<String>,
        /// Name must not contain any of these (case-insensitive).
        excluded_terms: Vec<String>,
        /// Skip voices whose name looks male.
        exclude_male: bool,
    },
}

impl VoiceRule {
    pub fn matches(&self, voice: &VoiceOption) -> bool {
        match self {
            VoiceRule::ExactName(name) => voice.name == *name,
            VoiceRule::NameContains(part) => voice.name.contains(part.as_str()),
            VoiceRule::Matching {
                lang_prefixes,
                vendors,
                excluded_terms,
                exclude_male,
            } => {
                let lang = voice.lang_normalized();
                let name_lower = voice.name.to_lowercase();
                lang_prefixes.iter().any(|p| lang.starts_with(p.as_str()))
                    && (vendors.is_empty() || vendors.iter().any(|v| voice.name.contains(v.as_str())))
                    && !excluded_terms
                        .iter()
                        .any(|t| name_lower.contains(t.as_str()))
                    && !(*exclude_male && is_male_voice(&voice.name))
            }
        }
    }
}

/// Ranked voice matcher. Rules are tried top to bottom; the first rule with
/// any matching voice wins, taking the first such voice in platform order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePicker {
    rules: Vec<VoiceRule>,
}

impl Default for VoicePicker {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut rules: Vec<VoiceRule> = PREFERRED_VOICES
            .iter()
            .map(|n| VoiceRule::NameContains(n.to_string()))
            .collect();
        rules.push(VoiceRule::Matching {
            lang_prefixes: strings(&["en-gb", "en-uk"]),
            vendors: Vec::new(),
            excluded_terms: strings(&["compact", "enhanced"]),
            exclude_male: true,
        });
        rules.push(VoiceRule::Matching {
            lang_prefixes: strings(&["en"]),
            vendors: strings(&["Google", "Microsoft", "System"]),
            excluded_terms: strings(&["compact"]),
            exclude_male: true,
        });
        rules.push(VoiceRule::Matching {
            lang_prefixes: strings(&["en"]),
            vendors: Vec::new(),
            excluded_terms: Vec::new(),
            exclude_male: true,
        });
        Self { rules }
    }
}

impl VoicePicker {
    pub fn new(rules: Vec<VoiceRule>) -> Self {
        Self { rules }
    }

    /// Default rules, preceded by an exact-name rule for the voice the
    /// settings ask for (unless "auto").
    pub fn for_settings(settings: &VoiceSettings) -> Self {
        let mut picker = Self::default();
        if let Some(name) = settings.requested_voice() {
            picker.rules.insert(0, VoiceRule::ExactName(name.to_string()));
        }
        picker
    }

    /// Pick a voice, or `None` to fall back to the platform default.
    pub fn pick<'a>(&self, voices: &'a [VoiceOption]) -> Option<&'a VoiceOption> {
        for rule in &self.rules {
            if let Some(voice) = voices.iter().find(|v| rule.matches(v)) {
                debug!(voice = %voice.name, lang = %voice.lang, ?rule, "voice selected");
                return Some(voice);
            }
        }
        debug!(available = voices.len(), "no suitable voice; using platform default");
        None
    }
}

// ---------------------------------------------------------------------------
// Announcer
// ---------------------------------------------------------------------------

/// A fully prepared announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<VoiceOption>,
    pub volume: f32,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    /// Normalise `text` and resolve the voice from `settings`.
    pub fn prepare(text: &str, settings: &VoiceSettings, voices: &[VoiceOption]) -> Self {
        let settings = settings.clone().clamped();
        let voice = VoicePicker::for_settings(&settings).pick(voices).cloned();
        Self {
            text: speech_text(text),
            voice,
            volume: settings.volume,
            rate: settings.rate,
            pitch: settings.pitch,
        }
    }
}

/// Something that can announce a message.
pub trait Announcer {
    /// Announce `text`. Returns the utterance actually produced, or `None`
    /// when announcements are disabled.
    fn announce(&mut self, text: &str) -> Option<Utterance>;
}

/// Announcer that renders utterances to the log instead of a speaker.
#[derive(Debug, Clone, Default)]
pub struct LogAnnouncer {
    settings: VoiceSettings,
    voices: Vec<VoiceOption>,
}

impl LogAnnouncer {
    pub fn new(settings: VoiceSettings, voices: Vec<VoiceOption>) -> Self {
        Self { settings, voices }
    }
}

impl Announcer for LogAnnouncer {
    fn announce(&mut self, text: &str) -> Option<Utterance> {
        if !self.settings.enabled {
            debug!("announcement skipped: voice disabled");
            return None;
        }
        let utterance = Utterance::prepare(text, &self.settings, &self.voices);
        info!(
            text = %utterance.text,
            voice = utterance.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default"),
            "announcement"
        );
        Some(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn female_names_are_not_male() {
        assert!(!is_male_voice("Google UK English Female"));
        assert!(is_male_voice("Google UK English Male"));
        assert!(is_male_voice("Microsoft David Desktop"));
    }

    #[test]
    fn clamped_replaces_nan() {
        let settings = VoiceSettings {
            volume: f32::NAN,
            rate: 50.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(settings.volume, 0.9);
        assert_eq!(settings.rate, 10.0);
    }
}
