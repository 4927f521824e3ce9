use crate::protocol::{ModelEntry, Pricing};

const MAX_MODEL_LIST_ENTRIES: usize = 30;

const PER_MILLION_TOKENS: f64 = 1_000_000.0;

/// Token-usage breakdown block body, with a usage bar sized to the host
/// terminal width.
pub fn format_context_info(
    system: u64,
    tools: u64,
    user: u64,
    assistant: u64,
    tool_results: u64,
    context_window: u64,
    columns: u16,
) -> String {
    let used = system + tools + user + assistant + tool_results;
    let percent = if context_window > 0 {
        (used * 100) / context_window
    } else {
        0
    };

    let bar_width = usize::from(columns).clamp(20, 60).saturating_sub(10);
    let filled = (bar_width * usize::try_from(percent.min(100)).unwrap_or(100)) / 100;
    let bar: String = (0..bar_width)
        .map(|i| if i < filled { '#' } else { '.' })
        .collect();

    let mut out = String::from("context usage\n");
    out.push_str(&format!("  system:       {system}\n"));
    out.push_str(&format!("  tools:        {tools}\n"));
    out.push_str(&format!("  user:         {user}\n"));
    out.push_str(&format!("  assistant:    {assistant}\n"));
    out.push_str(&format!("  tool results: {tool_results}\n"));
    out.push_str(&format!(
        "  total:        {used} / {context_window} ({percent}%)\n"
    ));
    out.push_str(&format!("  [{bar}]"));
    out
}

pub fn format_model_list(
    models: &[ModelEntry],
    current: &str,
    reasoning_effort: Option<&str>,
) -> String {
    let mut out = format!("available models ({})\n", models.len());
    for entry in models.iter().take(MAX_MODEL_LIST_ENTRIES) {
        let marker = if entry.id == current { '*' } else { ' ' };
        match entry.name.as_deref().filter(|name| *name != entry.id) {
            Some(name) => out.push_str(&format!("{marker} {} ({name})\n", entry.id)),
            None => out.push_str(&format!("{marker} {}\n", entry.id)),
        }
    }
    if models.len() > MAX_MODEL_LIST_ENTRIES {
        out.push_str(&format!(
            "... ({} more)\n",
            models.len() - MAX_MODEL_LIST_ENTRIES
        ));
    }
    match reasoning_effort {
        Some(effort) => out.push_str(&format!("reasoning effort: {effort}")),
        None => {
            out.pop();
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
pub fn format_model_info(
    model: &str,
    name: Option<&str>,
    description: Option<&str>,
    context_length: Option<u64>,
    pricing: &Pricing,
    max_completion_tokens: Option<u64>,
) -> String {
    let mut out = format!("model: {model}\n");
    if let Some(name) = name {
        out.push_str(&format!("name: {name}\n"));
    }
    if let Some(description) = description {
        let first_line = description.lines().next().unwrap_or_default();
        out.push_str(&format!("description: {first_line}\n"));
    }
    if let Some(context_length) = context_length {
        out.push_str(&format!("context window: {context_length} tokens\n"));
    }
    out.push_str(&format!(
        "prompt cost: {} per 1M tokens\n",
        per_million(pricing.prompt)
    ));
    out.push_str(&format!(
        "completion cost: {} per 1M tokens\n",
        per_million(pricing.completion)
    ));
    if let Some(max_completion_tokens) = max_completion_tokens {
        out.push_str(&format!("max completion tokens: {max_completion_tokens}\n"));
    }
    out.pop();
    out
}

pub fn format_compaction_summary(summary: &str, tokens_before: u64) -> String {
    let trimmed = summary.trim();
    if trimmed.is_empty() {
        return "[context compacted]".to_string();
    }
    format!("[context compacted: {tokens_before} tokens before]\n{trimmed}")
}

fn per_million(price_per_token: Option<f64>) -> String {
    match price_per_token {
        Some(price) => format!("${:.2}", price * PER_MILLION_TOKENS),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_info_totals_and_percent() {
        let out = format_context_info(100, 50, 200, 400, 250, 2000, 80);
        assert!(out.contains("total:        1000 / 2000 (50%)"));
        assert!(out.contains("system:       100"));
        let bar_line = out.lines().last().unwrap();
        let filled = bar_line.matches('#').count();
        let empty = bar_line.matches('.').count();
        assert_eq!(filled, empty);
    }

    #[test]
    fn test_context_info_zero_window_does_not_divide() {
        let out = format_context_info(1, 1, 1, 1, 1, 0, 80);
        assert!(out.contains("(0%)"));
    }

    #[test]
    fn test_model_list_marks_current_and_caps_entries() {
        let models: Vec<ModelEntry> = (0..40)
            .map(|i| ModelEntry {
                id: format!("vendor/model-{i}"),
                name: None,
            })
            .collect();
        let out = format_model_list(&models, "vendor/model-3", Some("high"));
        assert!(out.contains("* vendor/model-3"));
        assert!(out.contains("... (10 more)"));
        assert!(out.ends_with("reasoning effort: high"));
    }

    #[test]
    fn test_model_info_prices_per_million() {
        let pricing = Pricing {
            prompt: Some(0.000_003),
            completion: Some(0.000_015),
        };
        let out = format_model_info("vendor/m", Some("M"), None, Some(200_000), &pricing, None);
        assert!(out.contains("prompt cost: $3.00 per 1M tokens"));
        assert!(out.contains("completion cost: $15.00 per 1M tokens"));
        assert!(out.contains("context window: 200000 tokens"));
    }

    #[test]
    fn test_compaction_summary_handles_empty_summary() {
        assert_eq!(format_compaction_summary("  ", 0), "[context compacted]");
        let out = format_compaction_summary("Key points.", 12345);
        assert_eq!(out, "[context compacted: 12345 tokens before]\nKey points.");
    }
}
