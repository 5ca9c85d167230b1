use anyhow::Result;
use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use ship_emissions::constants::LogicalField;
use ship_emissions::error::PipelineError;
use ship_emissions::pipeline::normalize::DropReason;
use ship_emissions::pipeline::{read_interchange, write_drop_log, Pipeline, SourceReader};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// One report line; `None` leaves the cell blank
struct Line<'a> {
    name: &'a str,
    ship_type: &'a str,
    period: Value<'a>,
    issue: &'a str,
    expiry: &'a str,
    annual: Value<'a>,
    total: Option<f64>,
    efficiency: &'a str,
}

#[derive(Clone, Copy)]
enum Value<'a> {
    Num(f64),
    Text(&'a str),
}

fn line<'a>(name: &'a str, efficiency: &'a str) -> Line<'a> {
    Line {
        name,
        ship_type: "Bulk carrier",
        period: Value::Num(2019.0),
        issue: "01/07/2020",
        expiry: "30/06/2021",
        annual: Value::Num(211.47),
        total: Some(10431.25),
        efficiency,
    }
}

/// Write a report spreadsheet laid out like the published ones: a title
/// row, a blank row, headers on row 2, data after.
fn write_report(path: &Path, lines: &[Line<'_>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "CO₂ emission report")?;

    // An extra column the projector must ignore, placed first
    sheet.write_string(2, 0, "IMO Number")?;
    for (i, field) in LogicalField::ALL.iter().enumerate() {
        sheet.write_string(2, i as u16 + 1, field.source_label())?;
    }

    for (r, l) in lines.iter().enumerate() {
        let row = 3 + r as u32;
        sheet.write_number(row, 0, 9_000_000.0 + r as f64)?;
        sheet.write_string(row, 1, l.name)?;
        sheet.write_string(row, 2, l.ship_type)?;
        write_value(sheet, row, 3, l.period)?;
        if !l.issue.is_empty() {
            sheet.write_string(row, 4, l.issue)?;
        }
        sheet.write_string(row, 5, l.expiry)?;
        write_value(sheet, row, 6, l.annual)?;
        if let Some(total) = l.total {
            sheet.write_number(row, 7, total)?;
        }
        sheet.write_string(row, 8, l.efficiency)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_value(sheet: &mut rust_xlsxwriter::Worksheet, row: u32, col: u16, value: Value<'_>) -> Result<()> {
    match value {
        Value::Num(n) => sheet.write_number(row, col, n)?,
        Value::Text(s) => sheet.write_string(row, col, s)?,
    };
    Ok(())
}

fn pipeline() -> Pipeline {
    Pipeline::new(SourceReader::new("xlsx", 2))
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

#[test]
fn normalizes_report_rows_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let data = dir.path().join("data");
    fs::create_dir(&data)?;

    write_report(
        &data.join("2018.xlsx"),
        &[
            // Example 2 and example 4
            Line {
                period: Value::Text("2015"),
                ..line("AURORA", "EEDI (12.34 gCO₂/t·nm)")
            },
            // Example 1
            line("ZERO", "EIV (0.00 gCO₂/t·nm)"),
            // Example 3
            Line {
                annual: Value::Text("Division by zero!"),
                ..line("SENTINEL", "EIV (5.60 gCO₂/t·nm)")
            },
            line("NOT-APPLICABLE", "Not Applicable"),
        ],
    )?;
    write_report(
        &data.join("2019.xlsx"),
        &[
            // Example 5: shape passes, calendar does not
            Line {
                issue: "15/13/2020",
                total: None,
                ..line("BOREAS", "EIV (7.25 gCO₂/t·nm)")
            },
            Line {
                issue: "2020-07-01",
                ..line("ISO-ISSUE", "EIV (3.10 gCO₂/t·nm)")
            },
            Line {
                issue: "",
                ..line("NO-ISSUE", "EIV (3.10 gCO₂/t·nm)")
            },
            Line {
                period: Value::Text("n/a"),
                ..line("NO-PERIOD", "EIV (3.10 gCO₂/t·nm)")
            },
        ],
    )?;
    // Files with other extensions are not sources
    fs::write(data.join("notes.txt"), "ignored")?;

    let output = dir.path().join("out").join("output.csv");
    let report = pipeline().run(&data, &output)?;

    assert_eq!(report.files_read, 2);
    assert_eq!(report.rows_read, 8);
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.drop_counts[&DropReason::ZeroEfficiency], 1);
    assert_eq!(report.drop_counts[&DropReason::EfficiencyNotFound], 1);
    assert_eq!(report.drop_counts[&DropReason::DivisionByZero], 1);
    assert_eq!(report.drop_counts[&DropReason::MalformedIssueDate], 2);
    assert_eq!(report.drop_counts[&DropReason::UndefinedPeriod], 1);
    assert_eq!(report.missing_dates, 1);

    let rows = read_interchange(&output)?;
    assert_eq!(rows.len(), 2);

    let aurora = &rows[0];
    assert_eq!(aurora.name, "AURORA");
    assert_eq!(aurora.technical_efficiency, 12.34);
    assert_eq!(aurora.reporting_period, date(2015, 12, 31));
    assert_eq!(aurora.doc_issue_date, date(2020, 7, 1));
    assert_eq!(aurora.doc_expiry_date, date(2021, 6, 30));
    assert_eq!(aurora.annual_average_co2_emissions, 211.47);
    assert_eq!(aurora.total_co2_emissions, Some(10431.25));

    let boreas = &rows[1];
    assert_eq!(boreas.name, "BOREAS");
    assert_eq!(boreas.reporting_period, date(2019, 12, 31));
    assert_eq!(boreas.doc_issue_date, None);
    assert_eq!(boreas.total_co2_emissions, None);

    for row in &rows {
        assert!(row.technical_efficiency > 0.0);
    }

    let text = fs::read_to_string(&output)?;
    assert!(text.starts_with("name,ship_type,reporting_period,doc_issue_date,doc_expiry_date,"));
    assert!(text.contains("AURORA,Bulk carrier,2015-12-31,2020-07-01,2021-06-30,211.47,10431.25,12.34"));
    Ok(())
}

#[test]
fn rerun_is_byte_identical() -> Result<()> {
    let dir = tempdir()?;
    write_report(
        &dir.path().join("2020.xlsx"),
        &[
            line("A", "EEDI (1.10 gCO₂/t·nm)"),
            line("B", "EEDI (2.20 gCO₂/t·nm)"),
        ],
    )?;
    let output = dir.path().join("output.csv");

    let first = pipeline().run(dir.path(), &output)?;
    let first_bytes = fs::read(&output)?;
    let second = pipeline().run(dir.path(), &output)?;

    assert_eq!(first_bytes, fs::read(&output)?);
    assert_eq!(first.checksum, second.checksum);
    assert_ne!(first.run_id, second.run_id);
    Ok(())
}

#[test]
fn missing_source_column_aborts_without_output() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("2020.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (i, field) in LogicalField::ALL.iter().enumerate() {
        if *field != LogicalField::TechnicalEfficiency {
            sheet.write_string(2, i as u16, field.source_label())?;
        }
    }
    sheet.write_string(3, 0, "A")?;
    workbook.save(&path)?;

    let output = dir.path().join("output.csv");
    let err = pipeline().run(dir.path(), &output).unwrap_err();
    match err {
        PipelineError::Schema { file, label } => {
            assert_eq!(file, "2020.xlsx");
            assert_eq!(label, "Technical efficiency");
        }
        other => panic!("expected schema error, got {other}"),
    }
    assert!(!output.exists());
    Ok(())
}

#[test]
fn coercion_failure_leaves_previous_output_untouched() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("output.csv");
    fs::write(&output, "previous run\n")?;

    write_report(
        &dir.path().join("2020.xlsx"),
        &[Line {
            annual: Value::Text("n/a"),
            ..line("A", "EEDI (1.10 gCO₂/t·nm)")
        }],
    )?;

    let err = pipeline().run(dir.path(), &output).unwrap_err();
    assert!(matches!(err, PipelineError::Coercion { field: "annual_average_co2_emissions", .. }));
    assert_eq!(fs::read_to_string(&output)?, "previous run\n");
    Ok(())
}

#[test]
fn drop_log_records_origins() -> Result<()> {
    let dir = tempdir()?;
    write_report(
        &dir.path().join("2020.xlsx"),
        &[
            line("KEEP", "EEDI (1.10 gCO₂/t·nm)"),
            line("DROP", "EIV (0.00 gCO₂/t·nm)"),
        ],
    )?;
    let report = pipeline().run(dir.path(), &dir.path().join("output.csv"))?;
    let log = dir.path().join("drops.csv");
    write_drop_log(&report.dropped, &log)?;

    assert_eq!(
        fs::read_to_string(&log)?,
        "file,row,reason\n2020.xlsx,4,zero_efficiency\n"
    );
    Ok(())
}
