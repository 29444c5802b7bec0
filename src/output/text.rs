//! Human-readable text output

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

/// Print the computed value on its own line
///
/// This is the only thing written to stdout, so the output can be piped.
pub fn print_result(value: &impl Display) {
    println!("{}", value);
}

/// Print a per-node breakdown of a distributed run to stderr
pub fn print_master_summary(total_items: usize, per_node_completed: &BTreeMap<String, usize>, elapsed: Duration) {
    eprint!("{}", format_master_summary(total_items, per_node_completed, elapsed));
}

pub fn format_master_summary(
    total_items: usize,
    per_node_completed: &BTreeMap<String, usize>,
    elapsed: Duration,
) -> String {
    let mut out = format!("{} items in {:.3}s\n", total_items, elapsed.as_secs_f64());

    let width = per_node_completed.keys().map(String::len).max().unwrap_or(0);
    for (node, completed) in per_node_completed {
        let share = if total_items > 0 {
            *completed as f64 / total_items as f64 * 100.0
        } else {
            0.0
        };
        out.push_str(&format!("  {:<width$}  {:>6}  ({:5.1}%)\n", node, completed, share, width = width));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_master_summary() {
        let mut per_node = BTreeMap::new();
        per_node.insert("alpha-1".to_string(), 3);
        per_node.insert("b-2".to_string(), 1);

        let text = format_master_summary(4, &per_node, Duration::from_millis(1500));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "4 items in 1.500s");
        assert_eq!(lines[1], "  alpha-1       3  ( 75.0%)");
        assert_eq!(lines[2], "  b-2           1  ( 25.0%)");
    }

    #[test]
    fn test_format_master_summary_empty() {
        let text = format_master_summary(0, &BTreeMap::new(), Duration::ZERO);
        assert_eq!(text, "0 items in 0.000s\n");
    }
}
