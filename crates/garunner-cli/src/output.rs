/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
///
/// Reports and other results go to stdout; errors and warnings go to stderr
/// so that `garunner --json query ... > report.json` stays parseable.
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Renders a batchGet response as short human-readable lines.
///
/// One header line per report (row count, dimension and metric names),
/// followed by one line per row. Bodies that do not look like a batchGet
/// response produce a single explanatory line.
pub fn summarize_report(report: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    fn strings(value: Option<&Value>) -> Vec<&str> {
        value
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    let Some(reports) = report.get("reports").and_then(Value::as_array) else {
        return vec!["Response contains no reports".to_string()];
    };

    let mut lines = Vec::new();
    for (index, entry) in reports.iter().enumerate() {
        let dimensions = strings(entry.pointer("/columnHeader/dimensions"));
        let metrics: Vec<&str> = entry
            .pointer("/columnHeader/metricHeader/metricHeaderEntries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let rows = entry
            .pointer("/data/rows")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let row_count = entry
            .pointer("/data/rowCount")
            .and_then(Value::as_u64)
            .unwrap_or(rows.len() as u64);

        lines.push(format!(
            "Report {}: {} row{} [{}] x [{}]",
            index + 1,
            row_count,
            if row_count == 1 { "" } else { "s" },
            dimensions.join(", "),
            metrics.join(", ")
        ));
        for row in rows {
            lines.push(format!(
                "  {} => {}",
                strings(row.get("dimensions")).join(", "),
                strings(row.pointer("/metrics/0/values")).join(", ")
            ));
        }
    }
    lines
}
