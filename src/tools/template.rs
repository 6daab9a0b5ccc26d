//! Parameter Substitution
//!
//! Fills `{{name}}` placeholders in a resolved template. Substitution is a
//! single left-to-right scan: inserted values are never rescanned, so a value
//! that itself contains `{{other}}` lands in the command literally.

use crate::catalog::ParameterSpec;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid");
}

/// Replace every declared placeholder with its supplied value
///
/// Declared parameters without a value are replaced by the empty string.
/// Placeholders with no matching declaration are left untouched.
pub fn substitute(
    template: &str,
    params: &[ParameterSpec],
    values: &HashMap<String, String>,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if params.iter().any(|p| p.name == name) {
                values.get(name).cloned().unwrap_or_default()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Names of all `{{...}}` tokens present in a command string, in order of appearance
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Problems that make a substituted command incomplete
///
/// Returns the names of required parameters supplied empty or not at all,
/// followed by any placeholders left in `final_text`. An empty list means the
/// command is complete.
pub fn incomplete_parameters(
    final_text: &str,
    params: &[ParameterSpec],
    values: &HashMap<String, String>,
) -> Vec<String> {
    let mut missing: Vec<String> = params
        .iter()
        .filter(|p| p.required)
        .filter(|p| !values.get(&p.name).is_some_and(|v| !v.trim().is_empty()))
        .map(|p| p.name.clone())
        .collect();

    for name in placeholders(final_text) {
        if !missing.contains(&name) {
            missing.push(name);
        }
    }
    missing
}
