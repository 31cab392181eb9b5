use migrator_protocol::SymbolMatch;
use migrator_rules::{Rule, When};
use migrator_search::MigrationTask;

const HEADERS: [&str; 3] = ["Rule ID", "Found", "Information Details"];

struct Row {
    cells: [Vec<String>; 3],
}

impl Row {
    fn height(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(1).max(1)
    }
}

/// Renders the results table: one block per rule, one row per match.
pub fn render_table(tasks: &[MigrationTask]) -> String {
    let mut groups: Vec<Vec<Row>> = Vec::with_capacity(tasks.len());
    for task in tasks {
        if task.results.is_empty() {
            groups.push(vec![Row {
                cells: [
                    vec![task.rule_id().to_string()],
                    vec!["No".to_string()],
                    vec!["No symbols found".to_string()],
                ],
            }]);
            continue;
        }
        let rows = task
            .results
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let (id, found) = if i == 0 {
                    (task.rule_id().to_string(), "Yes".to_string())
                } else {
                    (String::new(), String::new())
                };
                Row {
                    cells: [vec![id], vec![found], vec![describe(m), m.location.uri.clone()]],
                }
            })
            .collect();
        groups.push(rows);
    }

    let mut widths = HEADERS.map(str::len);
    for row in groups.iter().flatten() {
        for (col, lines) in row.cells.iter().enumerate() {
            for line in lines {
                widths[col] = widths[col].max(line.chars().count());
            }
        }
    }

    let rule = {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s.push('\n');
        s
    };
    let header = Row {
        cells: HEADERS.map(|h| vec![h.to_string()]),
    };

    let mut out = String::new();
    out.push_str(&rule);
    push_row(&mut out, &header, &widths, true);
    out.push_str(&rule);
    for group in &groups {
        for row in group {
            push_row(&mut out, row, &widths, false);
        }
        out.push_str(&rule);
    }
    out
}

fn describe(m: &SymbolMatch) -> String {
    let range = &m.location.range;
    format!(
        "Found {} at line {}, char: {} - {}",
        m.name,
        range.start.line + 1,
        range.start.character,
        range.end.character
    )
}

fn push_row(out: &mut String, row: &Row, widths: &[usize; 3], center_all: bool) {
    for line_idx in 0..row.height() {
        out.push('|');
        for (col, lines) in row.cells.iter().enumerate() {
            let text = lines.get(line_idx).map(String::as_str).unwrap_or("");
            let width = widths[col];
            let cell = if center_all || col == 1 {
                format!("{text:^width$}")
            } else {
                format!("{text:<width$}")
            };
            out.push(' ');
            out.push_str(&cell);
            out.push_str(" |");
        }
        out.push('\n');
    }
}

/// One line per rule: id, shape, and how many conditions it carries.
pub fn render_rules(rules: &[Rule]) -> String {
    let mut out = String::new();
    for rule in rules {
        let conditions = match &rule.when {
            When::Single(_) => 1,
            When::Any(c) | When::All(c) => c.len(),
        };
        let queries = rule.when.referenced_leaves().len();
        out.push_str(&format!(
            "{}\t{}\t{conditions} condition(s), {queries} query(ies)",
            rule.rule_id,
            rule.when.shape()
        ));
        if let Some(message) = rule.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            let first = message.lines().next().unwrap_or(message);
            out.push('\t');
            out.push_str(first);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_rules::JavaReferenced;
    use migrator_protocol::{Location, Position, Range};
    use pretty_assertions::assert_eq;

    fn rule(id: &str) -> Rule {
        Rule {
            rule_id: id.to_string(),
            category: None,
            description: None,
            message: Some("Replace it\nwith something else".to_string()),
            effort: 1,
            labels: Vec::new(),
            links: Vec::new(),
            custom_variables: Vec::new(),
            ls_cmd: None,
            when: When::Single(JavaReferenced {
                location: "ANNOTATION".to_string(),
                pattern: "X".to_string(),
                ..Default::default()
            }),
            actions: Vec::new(),
            instructions: Vec::new(),
        }
    }

    fn symbol(name: &str, uri: &str) -> SymbolMatch {
        SymbolMatch {
            name: name.to_string(),
            kind: None,
            location: Location {
                uri: uri.to_string(),
                range: Range {
                    start: Position { line: 4, character: 2 },
                    end: Position { line: 4, character: 9 },
                },
            },
            container_name: None,
        }
    }

    #[test]
    fn table_lists_each_match_with_its_own_file() {
        let tasks = vec![
            MigrationTask::new(
                rule("with-hits"),
                vec![symbol("A", "file:///a/A.java"), symbol("B", "file:///a/B.java")],
            ),
            MigrationTask::new(rule("empty"), Vec::new()),
        ];
        let table = render_table(&tasks);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[1].contains("Rule ID") && lines[1].contains("Information Details"));
        assert!(table.contains("Found A at line 5, char: 2 - 9"));
        assert!(table.contains("file:///a/A.java"));
        assert!(table.contains("file:///a/B.java"));
        assert!(table.contains("No symbols found"));
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "ragged table:\n{table}");
    }

    #[test]
    fn rules_listing_shows_shape_and_first_message_line() {
        let listing = render_rules(&[rule("r1")]);
        assert_eq!(
            listing,
            "r1\tsingle\t1 condition(s), 1 query(ies)\tReplace it\n"
        );
    }
}
