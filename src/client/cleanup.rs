//! Display cleanup for streamed agent text

use regex::Regex;
use std::sync::LazyLock;

static ACTION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<action>.*?</action>").expect("static regex is valid"));
static BOT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bot:\s*").expect("static regex is valid"));
static ANSWER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?answer>").expect("static regex is valid"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex is valid"));

/// Shown instead of any generic crisis reply
pub const CRISIS_RESOURCES: &str = "I'm really sorry you're feeling like this. You're not alone, and help is available right now.

📞 Línea 192 – Option 4 (Colombia): free and confidential emotional support, 24 hours a day.
📞 Línea 106 (Bogotá): crisis and suicide-prevention line.
💬 You can also send a WhatsApp message to +57 316 893 2673 for confidential chat support.

If you are in immediate danger, please reach out to someone you trust or go to the nearest emergency room.";

fn is_generic_crisis_reply(text: &str) -> bool {
    text.contains("{PHONE}") || (text.contains("Suicide") && text.contains("Hotline"))
}

/// Strip agent markup from text before display.
///
/// Removes `<action>..</action>` spans, `Bot:` prefixes and `<answer>` tags,
/// collapses blank-line runs and trims. Generic crisis replies (a `{PHONE}`
/// placeholder, or a "Suicide ... Hotline" mention) are replaced by
/// [`CRISIS_RESOURCES`].
pub fn clean_text(raw: &str) -> String {
    let text = ACTION_TAG.replace_all(raw, "");
    let text = BOT_PREFIX.replace_all(&text, "");
    let text = ANSWER_TAG.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n");
    let text = text.trim();

    if is_generic_crisis_reply(text) {
        return CRISIS_RESOURCES.to_string();
    }
    text.to_string()
}
