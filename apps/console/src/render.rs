//! Plain-text views of the session for a terminal.

use std::fmt::Write as _;

use client_core::{ConnectionState, FormState, SessionState};

pub fn render_connection(state: ConnectionState, error: Option<&str>) -> String {
    match error {
        Some(error) => format!("[{state}] {error}"),
        None => format!("[{state}]"),
    }
}

pub fn render_state(state: &SessionState) -> String {
    let mut out = render_connection(state.connection(), state.last_error());
    if state.connection() == ConnectionState::Connected {
        out.push('\n');
        out.push_str(&render_form(state.form()));
    }
    out
}

/// Declared fields in order, then any stored values the form never declared.
pub fn render_form(form: &FormState) -> String {
    let Some(definition) = form.definition() else {
        return if form.values().is_empty() {
            "(no form open)".to_string()
        } else {
            render_rows(form.values().iter().map(|(k, v)| (k.as_str(), v.as_str())))
        };
    };

    let declared = definition
        .fields()
        .iter()
        .map(|field| (field.label.as_str(), form.value(&field.name).unwrap_or("")));
    let extra = form
        .values()
        .iter()
        .filter(|(name, _)| !definition.contains(name.as_str()))
        .map(|(name, value)| (name.as_str(), value.as_str()));

    let body = render_rows(declared.chain(extra));
    if body.is_empty() {
        "(empty form)".to_string()
    } else {
        body
    }
}

fn render_rows<'a>(rows: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let rows: Vec<_> = rows.collect();
    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (i, (label, value)) in rows.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "  {label:<width$} : {value}");
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
