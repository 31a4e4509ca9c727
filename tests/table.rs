use report_consolidator::table::render_table;

#[test]
fn render_table_aligns_columns() {
    let headers = vec!["CPF".to_string(), "Nome".to_string()];
    let rows = vec![
        vec!["12345678901".to_string(), "Maria".to_string()],
        vec![String::new(), "João".to_string()],
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "CPF          Nome",
            "-----------  -----",
            "12345678901  Maria",
            "             João",
        ]
    );
}

#[test]
fn render_table_normalizes_control_characters() {
    let headers = vec!["Observação".to_string()];
    let rows = vec![vec!["linha1\nlinha2\tvalor".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "linha1 linha2 valor");
}

#[test]
fn render_table_counts_characters_not_bytes() {
    let headers = vec!["Ausência".to_string(), "Status".to_string()];
    let rows = vec![vec!["Sim".to_string(), "\u{1b}[31mERR\u{1b}[0m".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "Ausência  Status");
    assert_eq!(lines[2], "Sim       \u{1b}[31mERR\u{1b}[0m");
}
