//! Named-placeholder substitution for catalog templates.
//!
//! Templates reference variables as `{{.name}}`. Whitespace inside the braces
//! is tolerated (`{{ .name }}`). Anything else between double braces is left
//! untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Rendered in place of a variable that was not supplied.
pub const NO_VALUE: &str = "<no value>";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder pattern")
});

/// Substitute `vars` into `template`.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| NO_VALUE.to_string())
        })
        .into_owned()
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
    fn test_render_substitutes_named_placeholder() {
        let rendered = render("{{.name}} record not found!", &vars(&[("name", "User")]));
        assert_eq!(rendered, "User record not found!");
    }

    #[test]
    fn test_render_missing_variable_is_visible() {
        let rendered = render("Registro de {{.name}} no encontrado!", &HashMap::new());
        assert_eq!(rendered, "Registro de <no value> no encontrado!");
    }

    #[test]
    fn test_render_tolerates_inner_whitespace() {
        let rendered = render("hello {{ .who }}", &vars(&[("who", "world")]));
        assert_eq!(rendered, "hello world");
    }

    #[test]
    fn test_render_leaves_other_actions_alone() {
        let template = "{{if .x}}yes{{end}} and {{.x}}";
        let rendered = render(template, &vars(&[("x", "1")]));
        assert_eq!(rendered, "{{if .x}}yes{{end}} and 1");
    }

    #[test]
    fn test_render_repeated_variable() {
        let rendered = render("{{.a}}-{{.a}}", &vars(&[("a", "z")]));
        assert_eq!(rendered, "z-z");
    }
}
