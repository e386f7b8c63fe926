use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(value)),
        OutputFormat::Toml => println!("{}", to_toml(value)),
        OutputFormat::Table => println!("{}", render_table(value)),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn to_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// TOML has no null, so null fields are left out. Non-object values are
/// printed as JSON.
pub fn to_toml(value: &Value) -> String {
    let stripped = strip_nulls(value);
    if !stripped.is_object() {
        return to_json(&stripped);
    }
    toml::to_string_pretty(&stripped).unwrap_or_else(|_| to_json(&stripped))
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Objects become a two column field/value table; anything else is printed
/// as JSON.
pub fn render_table(value: &Value) -> String {
    let Value::Object(fields) = value else {
        return to_json(value);
    };

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, field) in fields {
        builder.push_record([key.clone(), cell(field)]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_table_lists_fields() {
        let table = render_table(&json!({
            "id": "aud-1",
            "token_period": 3600,
            "client_id": "",
        }));
        assert!(table.contains("Field"));
        assert!(table.contains("aud-1"));
        assert!(table.contains("3600"));
        assert!(table.contains("client_id"));
        assert!(table.contains('╭'));
    }

    #[test]
    fn test_to_toml_drops_nulls() {
        let rendered = to_toml(&json!({
            "token_period": 3600,
            "cookie_domain": null,
            "store": { "name": "redis", "config": null },
        }));
        assert!(rendered.contains("token_period = 3600"));
        assert!(rendered.contains("[store]"));
        assert!(rendered.contains("name = \"redis\""));
        assert!(!rendered.contains("cookie_domain"));
        assert!(!rendered.contains("config"));
    }

    #[test]
    fn test_render_table_falls_back_to_json() {
        assert_eq!(render_table(&json!(3)), "3");
        assert!(render_table(&json!(["a"])).contains("\"a\""));
    }
}
