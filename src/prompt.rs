//! Prompt composition for the stone-bench walkthrough clip.

use serde::Deserialize;

/// Reference image the default scene is modelled on.
pub const DEFAULT_REFERENCE_IMAGE_URL: &str =
    "https://storage.googleapis.com/kieai-assets/reference/bench-speaker.jpg";

const DEFAULT_SPEECH_TEXT: &str = "Ich laufe um die Bank, während ich ruhig erkläre, \
    wie sich jeder Schritt nach vorne wie ein neues Kapitel anfühlt. Die Steinmauer \
    hinter mir bleibt stark, und meine Stimme trägt über den Platz.";

const DEFAULT_STAGE_DIRECTION: &str = "Die Person erhebt sich von einer Steinbank und \
    beginnt langsam, den Rahmen zu umkreisen. Die Kamera bleibt hochkant, folgt jedem \
    Schritt sanft und betont den Kontrast zwischen bewegter Figur und ruhiger Steinmauer.";

const DEFAULT_OUTRO_DESCRIPTION: &str = "Zum Schluss bleibt die Person kurz stehen, legt \
    die Hand auf die Banklehne und lächelt zuversichtlich in die Kamera, bevor sie aus dem \
    Bild nach links verschwindet.";

/// Text fragments the prompt is assembled from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptTemplate {
    pub stage_direction: String,
    pub speech_text: String,
    pub outro_description: String,
    pub reference_url: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            stage_direction: DEFAULT_STAGE_DIRECTION.to_string(),
            speech_text: DEFAULT_SPEECH_TEXT.to_string(),
            outro_description: DEFAULT_OUTRO_DESCRIPTION.to_string(),
            reference_url: DEFAULT_REFERENCE_IMAGE_URL.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = url.into();
        self
    }
}

/// Compose stage direction, spoken text, outro and the visual reference
/// paragraph into one trimmed prompt.
pub fn build_prompt(template: &PromptTemplate) -> String {
    let prompt = format!(
        "{stage}\n\n\
         Gesprochener Text (Deutsch): \"{speech}\"\n\n\
         Outro: {outro}\n\n\
         Visuelle Referenz: Die Szene beginnt mit einer Person, die auf einer Steinbank vor einer \
         rauen Steinmauer sitzt. Nutze die Referenzaufnahme ({reference}) für Kleidung, Licht und \
         Textur. Die Person soll im Video aufstehen, um die Bank herumgehen und währenddessen den \
         obigen Text sprechen.",
        stage = template.stage_direction.trim(),
        speech = template.speech_text.trim(),
        outro = template.outro_description.trim(),
        reference = template.reference_url.trim(),
    );
    prompt.trim().to_string()
}
