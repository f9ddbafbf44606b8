//! The generated Python entry point.
//!
//! The script is a fixed, versioned template. Caller data reaches it only
//! through the named slots below, each rendered as a Python literal:
//!
//! | slot          | value                                         |
//! |---------------|-----------------------------------------------|
//! | `VERSION`     | [`ENTRYPOINT_VERSION`]                        |
//! | `INPUT_FILES` | list of input basenames, in load order        |
//! | `OUTPUT_NAME` | the caller's output file name                 |
//! | `RESULT_VAR`  | name of the binding the snippet must set      |
//! | `SNIPPET`     | the caller's code, compiled and run by `exec` |
//!
//! Substitution is a single pass, so text inside a slot value is never
//! re-scanned for placeholders.

use serde_json::Value;

pub const ENTRYPOINT_VERSION: u32 = 1;

/// File name of the generated script inside the workspace.
pub const ENTRYPOINT_FILE: &str = "_scriptbox_entry.py";

/// Binding the snippet sets to hand back its output.
pub const RESULT_VARIABLE: &str = "result";

const TEMPLATE: &str = r#"# scriptbox entry point v{{VERSION}}
import json
import os
import sys

import numpy as np
import pandas as pd

input_files = {{INPUT_FILES}}
output_filename = {{OUTPUT_NAME}}

dataframes = {}
for _name in input_files:
    dataframes[_name] = pd.read_csv(_name)

_scope = {
    "__name__": "__main__",
    "json": json,
    "os": os,
    "sys": sys,
    "np": np,
    "pd": pd,
    "dataframes": dataframes,
    "input_files": input_files,
    "output_filename": output_filename,
}
exec(compile({{SNIPPET}}, "<snippet>", "exec"), _scope)

if {{RESULT_VAR}} in _scope:
    _scope[{{RESULT_VAR}}].to_csv(output_filename, index=False)
    print(f"Output saved to {output_filename}")
else:
    if os.path.exists(output_filename):
        os.remove(output_filename)
    print("No 'result' DataFrame found. Please assign your final DataFrame to a variable named 'result'")
"#;

/// Values for one rendering of the entry point.
#[derive(Debug, Clone)]
pub struct EntryPoint<'a> {
    pub input_files: &'a [String],
    pub output_name: &'a str,
    pub snippet: &'a str,
}

impl<'a> EntryPoint<'a> {
    pub fn new(input_files: &'a [String], output_name: &'a str, snippet: &'a str) -> Self {
        Self {
            input_files,
            output_name,
            snippet,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(TEMPLATE.len() + self.snippet.len() * 2);
        let mut rest = TEMPLATE;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let name = &after[..end];
            match self.slot(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }

    fn slot(&self, name: &str) -> Option<String> {
        // JSON string and array literals are valid Python literals
        let value = match name {
            "VERSION" => ENTRYPOINT_VERSION.to_string(),
            "INPUT_FILES" => Value::from(self.input_files.to_vec()).to_string(),
            "OUTPUT_NAME" => Value::from(self.output_name).to_string(),
            "RESULT_VAR" => Value::from(RESULT_VARIABLE).to_string(),
            "SNIPPET" => Value::from(self.snippet).to_string(),
            _ => return None,
        };
        Some(value)
    }
}
