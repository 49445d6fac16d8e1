use argbind::Parsed;
use argbind_metadata::Catalog;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ParseOutput {
    pub command: Vec<String>,
    /// Declaration label -> bound value, globals first, each signature in
    /// declaration order.
    pub bindings: IndexMap<String, Value>,
    pub positional: Vec<String>,
}

pub fn render_parsed(parsed: &Parsed<'_>, catalog: &Catalog) -> ParseOutput {
    let mut bindings = IndexMap::new();
    for signature in parsed.signatures() {
        for id in signature.ids() {
            let (Some(handle), Some(label)) = (catalog.get(id), signature.label(id)) else {
                continue;
            };
            bindings.insert(label.to_string(), handle.render(&parsed.bindings));
        }
    }

    ParseOutput {
        command: parsed.path.iter().map(|s| s.to_string()).collect(),
        bindings,
        positional: parsed.positional.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argbind_metadata::GroupManifest;
    use serde_json::json;

    #[test]
    fn bindings_follow_declaration_order() {
        let manifest = GroupManifest::from_json(
            r#"{
  "name": "tool",
  "options": [{ "kind": "counter", "keys": ["-v"] }],
  "commands": [{
    "name": "cp",
    "options": [
      { "kind": "flag", "keys": ["-r", "--recursive"] },
      { "kind": "key", "keys": ["--mode"], "validators": [{ "one-of": ["fast", "safe"] }] }
    ],
    "params": [{ "name": "src" }, { "name": "dst", "kind": "optional" }]
  }]
}"#,
        )
        .unwrap();
        let (group, catalog) = manifest.build().unwrap();
        let parsed = argbind::parse(&group, ["-vv", "cp", "a", "-r", "b"]).unwrap();
        let output = render_parsed(&parsed, &catalog);

        assert_eq!(output.command, vec!["cp"]);
        let labels: Vec<&str> = output.bindings.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["-v", "--recursive", "--mode", "src", "dst"]);
        assert_eq!(output.bindings["-v"], json!(2));
        assert_eq!(output.bindings["--recursive"], json!(true));
        assert_eq!(output.bindings["--mode"], Value::Null);
        assert_eq!(output.bindings["dst"], json!("b"));
        assert_eq!(output.positional, vec!["a", "b"]);
    }
}
