//! Canonical RFML rendering.
//!
//! `render` is the inverse of `parser::parse_str` for any definition the
//! parser can produce: parsing the rendered text with the same
//! `ParseOptions` gives back an equal `TestDefinition` (apart from
//! `source_location`, which never appears in the text).
//!
//! Header order is fixed: identity, title, start_uri, site_id, feature_id,
//! tags, browsers, state, priority, execute, description. Every step is
//! preceded by a blank line; a `# redirect:` directive is written only for
//! steps whose redirect differs from the default.

use std::fmt::Write;

use crate::parser::ParseOptions;
use crate::protocol::{FeatureId, Step, TestDefinition, TestState};

pub fn render(test: &TestDefinition, options: &ParseOptions) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_test(&mut out, test, options);
    out
}

fn write_test(out: &mut String, test: &TestDefinition, options: &ParseOptions) -> std::fmt::Result {
    writeln!(out, "#! {}", test.id)?;
    if !test.title.is_empty() {
        writeln!(out, "# title: {}", test.title)?;
    }
    write_line(out, "# start_uri:", &test.start_uri)?;

    if let Some(site_id) = test.site_id {
        writeln!(out, "# site_id: {}", site_id)?;
    }
    match test.feature_id {
        Some(FeatureId::Assigned(id)) => writeln!(out, "# feature_id: {}", id)?,
        Some(FeatureId::Cleared) => writeln!(out, "# feature_id:")?,
        None => {}
    }
    if !test.tags.is_empty() {
        writeln!(out, "# tags: {}", test.tags.join(", "))?;
    }
    if !test.browsers.is_empty() {
        writeln!(out, "# browsers: {}", test.browsers.join(", "))?;
    }
    if test.state != TestState::Enabled {
        writeln!(out, "# state: {}", test.state)?;
    }
    if let Some(priority) = test.priority {
        writeln!(out, "# priority: {}", priority)?;
    }
    if !test.execute {
        writeln!(out, "# execute: false")?;
    }

    for line in test.description.split_terminator('\n') {
        if line.is_empty() {
            writeln!(out, "#")?;
        } else {
            writeln!(out, "# {}", line)?;
        }
    }

    for step in &test.steps {
        writeln!(out)?;
        if step.redirect() != options.redirect_default {
            writeln!(out, "# redirect: {}", step.redirect())?;
        }
        match step {
            Step::Instruction(instruction) => {
                writeln!(out, "{}", single_line(&instruction.action))?;
                writeln!(out, "{}", single_line(&instruction.response))?;
            }
            Step::Embed(embed) => write_line(out, "-", &embed.target_id)?,
        }
    }

    Ok(())
}

/// `prefix value`, or just `prefix` when the value is empty, so no line
/// ends in whitespace.
fn write_line(out: &mut String, prefix: &str, value: &str) -> std::fmt::Result {
    if value.is_empty() {
        writeln!(out, "{}", prefix)
    } else {
        writeln!(out, "{} {}", prefix, value)
    }
}

/// Step text must stay on one line.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
