// Shared prompt constants for the model backend.
// Feature modules keep their own generation prompts next to them (see interview::prompts).

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for free-text completions. Output is post-processed, so it must be bare text.
pub const COMPLETION_SYSTEM: &str = "You are a concise professional communication assistant. \
    Reply with the requested text only. \
    No preamble, no quotation marks, no markdown.";

/// Zero-shot classification. Fill `{labels_json}` and `{text}`.
pub const CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify the TEXT against each candidate label.

CANDIDATE LABELS:
{labels_json}

TEXT:
{text}

Return a JSON object with this EXACT schema:
{"labels": ["label", ...], "scores": [0.0, ...]}

RULES:
1. Include every candidate label exactly once, sorted by score descending.
2. scores[i] is the probability (0.0 to 1.0) that labels[i] applies; scores sum to 1.0.
3. Return ONLY the JSON object."#;

/// Binary sentiment. Fill `{text}`.
pub const SENTIMENT_PROMPT_TEMPLATE: &str = r#"Classify the sentiment of the TEXT.

TEXT:
{text}

Return a JSON object with this EXACT schema:
{"label": "POSITIVE" | "NEGATIVE", "score": 0.0}

score is your confidence in the label, from 0.0 to 1.0. Return ONLY the JSON object."#;

/// Substitutes `{name}` placeholders in one left-to-right pass.
///
/// Values are copied verbatim and never rescanned, so user text that happens
/// to contain `{topic}` stays as typed. Braces that do not name a known
/// placeholder (JSON examples in the templates) are left alone.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match known {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_substitutes_each_placeholder() {
        let filled = fill("{a} and {b}, then {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(filled, "x and y, then x");
    }

    #[test]
    fn test_fill_does_not_expand_placeholders_inside_values() {
        let filled = fill(
            "Last: {last_message}. Phase: {phase}",
            &[("last_message", "see {phase} docs"), ("phase", "closing")],
        );
        assert_eq!(filled, "Last: see {phase} docs. Phase: closing");
    }

    #[test]
    fn test_fill_keeps_json_braces_in_templates() {
        let filled = fill(SENTIMENT_PROMPT_TEMPLATE, &[("text", "{\"label\": 1}")]);
        assert!(filled.contains("{\"label\": \"POSITIVE\" | \"NEGATIVE\", \"score\": 0.0}"));
        assert!(filled.contains("TEXT:\n{\"label\": 1}"));
    }

    #[test]
    fn test_fill_leaves_unclosed_brace() {
        assert_eq!(fill("{a} {oops", &[("a", "1")]), "1 {oops");
    }
}
