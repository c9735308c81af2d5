//! Crosscheck prompts: ask each service to review the others' answers.
//!
//! The template is a minijinja template whose `{{OTHER_RESPONSES}}`
//! variable receives the other services' latest replies, each under a
//! heading with the service's display name.

use minijinja::{Environment, context};
use polyview_core::error::{PolyviewError, Result};
use polyview_core::preferences::OTHER_RESPONSES_PLACEHOLDER;
use polyview_core::service::{ServiceKey, ServiceRegistry};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Renders `template` with `other_responses` substituted.
///
/// A template minijinja cannot parse still gets a literal placeholder
/// substitution, since user templates are free text.
pub fn render_template(template: &str, other_responses: &str) -> String {
    match render_strict(template, other_responses) {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(error = %err, "Crosscheck template did not render, substituting literally");
            template.replace(OTHER_RESPONSES_PLACEHOLDER, other_responses)
        }
    }
}

fn render_strict(template: &str, other_responses: &str) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("crosscheck", template)
        .map_err(|e| PolyviewError::template(e.to_string()))?;
    env.get_template("crosscheck")
        .map_err(|e| PolyviewError::template(e.to_string()))?
        .render(context! { OTHER_RESPONSES => other_responses })
        .map_err(|e| PolyviewError::template(e.to_string()))
}

/// Formats replies as `### Name` sections separated by blank lines.
pub fn format_other_responses(responses: &[(String, &str)]) -> String {
    responses
        .iter()
        .map(|(name, text)| format!("### {name}\n{}", text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One crosscheck prompt per service in `selected` that has at least one
/// other service's reply to review. Services in `selected` order.
pub fn build_prompts(
    template: &str,
    selected: &[ServiceKey],
    latest: &BTreeMap<ServiceKey, String>,
    registry: &ServiceRegistry,
) -> Vec<(ServiceKey, String)> {
    selected
        .iter()
        .filter_map(|target| {
            let others: Vec<(String, &str)> = selected
                .iter()
                .filter(|other| *other != target)
                .filter_map(|other| {
                    latest
                        .get(other)
                        .map(|text| (registry.display_name(other), text.as_str()))
                })
                .collect();
            if others.is_empty() {
                debug!(service = %target, "No other responses to crosscheck");
                return None;
            }
            let prompt = render_template(template, &format_other_responses(&others));
            Some((target.clone(), prompt))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyview_core::preferences::DEFAULT_CROSSCHECK_TEMPLATE;
    use polyview_core::service::ServiceConfig;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new()
            .with("claude", ServiceConfig::new("Claude", "https://claude.ai"))
            .with("chatgpt", ServiceConfig::new("ChatGPT", "https://chatgpt.com"))
            .with("gemini", ServiceConfig::new("Gemini", "https://gemini.google.com"))
    }

    #[test]
    fn test_render_substitutes_placeholder() {
        let rendered = render_template("Review:\n{{OTHER_RESPONSES}}\nThanks", "### A\nyes");
        assert_eq!(rendered, "Review:\n### A\nyes\nThanks");
    }

    #[test]
    fn test_unparseable_template_falls_back_to_literal() {
        let rendered = render_template("{% broken {{OTHER_RESPONSES}}", "X");
        assert_eq!(rendered, "{% broken X");
    }

    #[test]
    fn test_each_service_sees_only_others() {
        let selected = vec![
            ServiceKey::new("claude"),
            ServiceKey::new("chatgpt"),
            ServiceKey::new("gemini"),
        ];
        let mut latest = BTreeMap::new();
        latest.insert(ServiceKey::new("claude"), "Paris".to_string());
        latest.insert(ServiceKey::new("chatgpt"), "Paris, France".to_string());

        let prompts = build_prompts(DEFAULT_CROSSCHECK_TEMPLATE, &selected, &latest, &registry());
        assert_eq!(prompts.len(), 3);

        let (service, claude_prompt) = &prompts[0];
        assert_eq!(service, &ServiceKey::new("claude"));
        assert!(claude_prompt.contains("### ChatGPT\nParis, France"));
        assert!(!claude_prompt.contains("### Claude"));

        let gemini_prompt = &prompts[2].1;
        assert!(gemini_prompt.contains("### Claude\nParis\n\n### ChatGPT"));
    }

    #[test]
    fn test_lone_responder_gets_no_prompt() {
        let selected = vec![ServiceKey::new("claude"), ServiceKey::new("chatgpt")];
        let mut latest = BTreeMap::new();
        latest.insert(ServiceKey::new("claude"), "only me".to_string());

        let prompts = build_prompts("{{OTHER_RESPONSES}}", &selected, &latest, &registry());
        assert_eq!(prompts, vec![(ServiceKey::new("chatgpt"), "### Claude\nonly me".to_string())]);
    }
}
