mod common;

use common::{TestWorkspace, permissive_settings, read_output};
use report_consolidator::{
    backfill::backfill,
    catalog::{DirectoryCatalog, FileCatalog, SourceFile},
    data::Value,
    engine::Consolidator,
    export::{DEFAULT_OUTPUT_FILE, export_table},
};

fn list(ws: &TestWorkspace) -> Vec<SourceFile> {
    DirectoryCatalog::new(ws.path(), &["csv", "xlsx", "xls"])
        .excluding(DEFAULT_OUTPUT_FILE)
        .list_files()
        .expect("list files")
}

#[test]
fn same_id_across_origins_merges_with_date_and_provenance() {
    let ws = TestWorkspace::new();
    ws.write(
        "A/a.csv",
        "CPF,Nome,Equipe,Dia\n12345678901,Maria,Vendas,\"Seg, 01/10/2025\"\n",
    );
    ws.write(
        "B/b.csv",
        "CPF,Nome,Equipe,Status\n123.456.789-01,Maria,Vendas,Aprovado\n",
    );

    let report = Consolidator::new(permissive_settings()).consolidate(&list(&ws), None);
    assert!(!report.is_empty());
    let table = &report.table;
    assert_eq!(
        table.headers,
        ["CPF", "Nome", "Equipe", "Data", "Arquivo_A", "Arquivo_B", "_source_files", "Status_B"]
    );
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.value(0, "CPF"), Some(&Value::text("12345678901")));
    assert_eq!(table.value(0, "Nome"), Some(&Value::text("Maria")));
    assert_eq!(table.value(0, "Equipe"), Some(&Value::text("Vendas")));
    assert_eq!(table.value(0, "Data"), Some(&Value::text("Seg, 01/10/2025")));
    assert_eq!(table.value(0, "Status_B"), Some(&Value::text("Aprovado")));
    assert_eq!(table.value(0, "_source_files"), Some(&Value::text("A; B")));
    assert_eq!(table.value(0, "Arquivo_A"), Some(&Value::text("a.csv")));

    let path = export_table(table, ws.path(), DEFAULT_OUTPUT_FILE).expect("export");
    let (headers, rows) = read_output(&path);
    assert_eq!(headers, table.headers);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][3], "Seg, 01/10/2025");
}

#[test]
fn colliding_fields_are_suffixed_by_origin() {
    let ws = TestWorkspace::new();
    ws.write("Faltas/f.csv", "CPF;Nome;Status;Turno\n12345678901;Maria;Pendente;Manhã\n");
    ws.write("Solicitações/s.csv", "CPF;Nome;Status;Cargo\n12345678901;Maria;Aprovado;Analista\n");

    let report = Consolidator::new(permissive_settings()).consolidate(&list(&ws), None);
    let table = &report.table;
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.value(0, "Status_Faltas"), Some(&Value::text("Pendente")));
    assert_eq!(table.value(0, "Status_Solicitações"), Some(&Value::text("Aprovado")));
    assert_eq!(table.value(0, "Turno_Faltas"), Some(&Value::text("Manhã")));
    assert_eq!(table.value(0, "Cargo_Solicitações"), Some(&Value::text("Analista")));
    assert_eq!(table.value(0, "Equipe"), None);
}

#[test]
fn rows_without_id_collapse_on_name_and_team() {
    let ws = TestWorkspace::new();
    ws.write("Faltas/f.csv", "Nome,Equipe,Motivo\nJoão,TI,Atestado\n");
    ws.write("Jornada/j.csv", "Nome,Equipe,Turno\n joão ,ti,Manhã\n");

    let report = Consolidator::new(permissive_settings()).consolidate(&list(&ws), None);
    let table = &report.table;
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.value(0, "Nome"), Some(&Value::text("João")));
    assert_eq!(table.value(0, "CPF"), None);
    assert_eq!(table.value(0, "Turno_Jornada"), Some(&Value::text("Manhã")));
    assert_eq!(table.value(0, "Motivo_Faltas"), Some(&Value::text("Atestado")));
    assert_eq!(table.value(0, "_source_files"), Some(&Value::text("Faltas; Jornada")));
}

#[test]
fn garbage_rows_are_filtered_to_one_record() {
    let ws = TestWorkspace::new();
    ws.write(
        "Absenteísmo/abs.csv",
        "Nome,Equipe,Ausência\nTOTAL,,10\n123,TI,1\n,TI,2\nMaria,Vendas,3\n",
    );

    let report = Consolidator::new(permissive_settings()).consolidate(&list(&ws), None);
    assert_eq!(report.table.row_count(), 1);
    assert_eq!(report.table.value(0, "Nome"), Some(&Value::text("Maria")));
    let origin = &report.summary.origins[0];
    assert_eq!(origin.stats.rows_read, 4);
    assert_eq!(origin.stats.rows_dropped, 3);
    assert_eq!(origin.rows_merged, 1);
}

#[test]
fn root_files_use_root_label_and_plain_columns() {
    let ws = TestWorkspace::new();
    ws.write("colaboradores.csv", "Nome,Equipe,Cargo\nAna,RH,Gerente\n");

    let report = Consolidator::new(permissive_settings()).consolidate(&list(&ws), None);
    let table = &report.table;
    assert_eq!(table.headers, ["CPF", "Nome", "Equipe", "_source_files", "Cargo"]);
    assert_eq!(table.value(0, "_source_files"), Some(&Value::text("Raiz")));
}

#[test]
fn backfill_shares_values_between_id_and_composite_records() {
    let ws = TestWorkspace::new();
    ws.write(
        "Colaboradores/c.csv",
        "CPF,Nome,Equipe,Cargo\n12345678901,Ana,RH,Gerente\n",
    );
    ws.write("Faltas/f.csv", "Nome,Equipe,Motivo\nAna,RH,Atestado\n");

    let consolidator = Consolidator::new(permissive_settings());
    let mut report = consolidator.consolidate(&list(&ws), None);
    let table = &mut report.table;
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.value(1, "Cargo_Colaboradores"), Some(&Value::text("Gerente")));
    assert_eq!(table.value(0, "Motivo_Faltas"), Some(&Value::text("Atestado")));
    assert_eq!(table.value(1, "CPF"), None);
    assert!(report.summary.cells_backfilled >= 2);

    let before = table.clone();
    assert_eq!(backfill(table, &consolidator.layout()), 0);
    assert_eq!(*table, before);
}

#[test]
fn progress_reports_each_phase() {
    let ws = TestWorkspace::new();
    ws.write("A/a.csv", "Nome,Equipe\nAna,TI\n");
    ws.write("B/b.csv", "Nome,Equipe\nTOTAL,\n");
    ws.write("C/c.csv", "Nome,Equipe\nBia,TI\n");

    let mut messages = Vec::new();
    let mut collect = |message: &str| messages.push(message.to_string());
    let report =
        Consolidator::new(permissive_settings()).consolidate(&list(&ws), Some(&mut collect));
    assert_eq!(report.table.row_count(), 2);
    assert_eq!(
        messages,
        [
            "Merging origin 1/3: A",
            "Merging origin 2/3: B",
            "Merging origin 3/3: C",
            "Consolidating origin 1/2: A",
            "Consolidating origin 2/2: C",
        ]
    );
    assert_eq!(report.summary.origins[1].rows_merged, 0);
}

#[test]
fn unreadable_inputs_produce_an_empty_report() {
    let ws = TestWorkspace::new();
    ws.write("A/tiny.csv", "Nome,Equipe\nAna,TI\n");
    ws.write("B/lixo.csv", &"x".repeat(300));

    let report = Consolidator::new(Default::default()).consolidate(&list(&ws), None);
    assert!(report.is_empty());
    assert_eq!(report.summary.records, 0);
    assert_eq!(report.summary.unreadable_files(), 2);
}

#[test]
fn separate_runs_share_no_state() {
    let ws = TestWorkspace::new();
    ws.write("A/a.csv", "Nome,Equipe\nAna,TI\n");
    let consolidator = Consolidator::new(permissive_settings());
    let first = consolidator.consolidate(&list(&ws), None);
    let second = consolidator.consolidate(&list(&ws), None);
    assert_eq!(first.table, second.table);
    assert_eq!(second.table.row_count(), 1);
}
