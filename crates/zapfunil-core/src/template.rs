// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Placeholder substitution for administrator-configured message templates.
//!
//! Templates use `{{chave}}` placeholders over a fixed set of named values.
//! Unknown placeholders are left verbatim -- nothing is ever evaluated.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid regex literal"));

/// Render a template against a set of named values.
///
/// Each `{{chave}}` whose key is present in `vars` is replaced with its
/// value; placeholders with no matching key stay untouched.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match vars.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Build the variable set for a single collected answer plus everything
/// collected before it. The just-collected value is also exposed as
/// `resposta` so confirmations can reference it without knowing their key.
pub fn answer_vars(
    answers: &serde_json::Map<String, serde_json::Value>,
    just_collected: Option<&str>,
) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = answers
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();
    if let Some(value) = just_collected {
        vars.insert("resposta".to_string(), value.to_string());
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_placeholders() {
        let out = render(
            "Perfeito, {{nome}}! Festa em {{mes}}.",
            &vars(&[("nome", "João"), ("mes", "março")]),
        );
        assert_eq!(out, "Perfeito, João! Festa em março.");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let out = render("Olá {{nome}}, código {{codigo}}", &vars(&[("nome", "Ana")]));
        assert_eq!(out, "Olá Ana, código {{codigo}}");
    }

    #[test]
    fn tolerates_inner_whitespace() {
        let out = render("{{ nome }}", &vars(&[("nome", "Ana")]));
        assert_eq!(out, "Ana");
    }

    #[test]
    fn no_placeholders_is_identity() {
        let out = render("sem placeholders", &HashMap::new());
        assert_eq!(out, "sem placeholders");
    }

    #[test]
    fn answer_vars_exposes_resposta() {
        let mut answers = serde_json::Map::new();
        answers.insert("nome".into(), serde_json::Value::String("João".into()));
        let v = answer_vars(&answers, Some("João"));
        assert_eq!(v.get("nome").map(String::as_str), Some("João"));
        assert_eq!(v.get("resposta").map(String::as_str), Some("João"));
    }
}
