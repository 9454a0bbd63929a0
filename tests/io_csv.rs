//! Delimited-text codec: tokenizing, reading, writing.

use anyhow::Result;
use rowflow::io::{CsvFile, RowCallback, Tokenizer};
use rowflow::testing::*;
use rowflow::*;
use std::fs;

fn tokens(sep: &str, line: &str) -> Result<Vec<String>> {
    Ok(Tokenizer::new(sep)?.tokenize(line))
}

#[test]
fn tokenizer_splits_plain_fields() -> Result<()> {
    assert_eq!(tokens(",", "a,b,c")?, ["a", "b", "c"]);
    assert_eq!(tokens(",", "a,,c")?, ["a", "", "c"]);
    assert_eq!(tokens(",", "a,b,")?, ["a", "b", ""]);
    assert_eq!(tokens(",", " a , b")?, [" a ", " b"]);
    Ok(())
}

#[test]
fn tokenizer_handles_quotes_and_escapes() -> Result<()> {
    assert_eq!(tokens(",", r#""x,y",z"#)?, ["x,y", "z"]);
    assert_eq!(
        tokens(",", r#""say \"hi\"","one\ntwo""#)?,
        ["say \"hi\"", "one\ntwo"]
    );
    assert_eq!(tokens(",", r#""","""#)?, ["", ""]);
    // A quote that does not close the field is taken verbatim.
    assert_eq!(tokens(",", r#""a"b,c"#)?, [r#""a"b"#, "c"]);
    Ok(())
}

#[test]
fn tokenizer_accepts_multi_character_and_regex_separators() -> Result<()> {
    assert_eq!(tokens("||", "a||b||")?, ["a", "b", ""]);
    assert_eq!(tokens("|", "a|b")?, ["a", "b"]);
    assert_eq!(tokens(".*", r#""1.5".*2"#)?, ["1.5", "2"]);
    Ok(())
}

#[test]
fn tokenizer_rejects_bad_separators() {
    assert!(matches!(Tokenizer::new(""), Err(EtlError::Separator(_))));
    assert!(matches!(Tokenizer::new("\n"), Err(EtlError::Separator(_))));
}

#[test]
fn reader_skips_blank_lines_and_nulls_missing_fields() -> Result<()> {
    let (_dir, path) = temp_file("in.csv", "id,name\r\n\r\n1,Bill\r\n  \n2\n")?;
    let rows = read_csv(&path, CsvOptions::default())?;
    assert_rows_equal(
        &rows,
        &[
            row! { "id" => "1", "name" => "Bill" },
            row! { "id" => "2", "name" => Value::Null },
        ],
    );
    Ok(())
}

#[test]
fn explicit_headers_with_and_without_header_line() -> Result<()> {
    let (_dir, path) = temp_file("in.csv", "x,y\n1,2\n")?;

    let rows = read_csv(&path, CsvOptions::default().headers(["a", "b"]))?;
    assert_rows_equal(&rows, &[row! { "a" => "1", "b" => "2" }]);

    let rows = read_csv(&path, CsvOptions::default().headers(["a", "b"]).has_header(false))?;
    assert_rows_equal(
        &rows,
        &[row! { "a" => "x", "b" => "y" }, row! { "a" => "1", "b" => "2" }],
    );
    Ok(())
}

#[test]
fn missing_headers_is_a_header_error() -> Result<()> {
    let (_dir, path) = temp_file("in.csv", "1,2\n")?;
    let err = read_csv(&path, CsvOptions::default().has_header(false)).expect_err("no headers");
    assert!(matches!(err, EtlError::Header { line: 0, .. }));
    Ok(())
}

#[test]
fn extra_fields_report_physical_line() -> Result<()> {
    let (_dir, path) = temp_file("in.csv", "a,b\n\n1,2\n1,2,3\n")?;
    let err = read_csv(&path, CsvOptions::default()).expect_err("too many fields");
    assert!(matches!(err, EtlError::Parse { line: 4, .. }));
    assert_eq!(err.to_string(), "Could not parse line 4: 1,2,3");
    Ok(())
}

#[test]
fn callback_sees_headers_lines_and_can_stop() -> Result<()> {
    #[derive(Default)]
    struct Record {
        headers: Vec<String>,
        lines: Vec<usize>,
        finished: bool,
    }

    impl RowCallback for Record {
        fn process_headers(&mut self, headers: &[String]) -> rowflow::Result<()> {
            self.headers = headers.to_vec();
            Ok(())
        }

        fn process_row(&mut self, line: usize, _headers: &[String], _fields: Vec<String>) -> rowflow::Result<bool> {
            self.lines.push(line);
            Ok(self.lines.len() == 2)
        }

        fn after_processing(&mut self) {
            self.finished = true;
        }
    }

    let text = "h1;h2\n\nA;B\nC;D\nE;F\n";
    let mut record = Record::default();
    let consumed = CsvFile::new(CsvOptions::default().separator(";"))?
        .parse(text.as_bytes(), &mut record)?;
    assert_eq!(record.headers, ["h1", "h2"]);
    assert_eq!(record.lines, [3, 4]);
    assert_eq!(consumed, 3);
    assert!(record.finished);
    Ok(())
}

#[test]
fn byte_order_marks_are_detected() -> Result<()> {
    let text = "id,name\n1,Zoë\n";
    let expected = [row! { "id" => "1", "name" => "Zoë" }];

    let mut utf8 = vec![0xEF, 0xBB, 0xBF];
    utf8.extend_from_slice(text.as_bytes());
    let (_dir, path) = temp_file("utf8.csv", utf8)?;
    assert_rows_equal(&read_csv(&path, CsvOptions::default())?, &expected);

    let mut le = vec![0xFF, 0xFE];
    let mut be = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        le.extend_from_slice(&unit.to_le_bytes());
        be.extend_from_slice(&unit.to_be_bytes());
    }
    let (_le_dir, le_path) = temp_file("le.csv", le)?;
    let (_be_dir, be_path) = temp_file("be.csv", be)?;
    assert_rows_equal(&read_csv(&le_path, CsvOptions::default())?, &expected);
    assert_rows_equal(&read_csv(&be_path, CsvOptions::default())?, &expected);
    Ok(())
}

#[test]
fn writer_quotes_every_field() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out.csv");
    let rows = [
        row! { "id" => 1, "note" => "say \"hi\"" },
        row! { "id" => 2, "note" => Value::Null },
        row! { "note" => "two\nlines", "id" => 3 },
    ];
    assert_eq!(write_csv(&path, CsvOptions::default(), &rows)?, 3);
    let expected = r#""id","note"
"1","say \"hi\""
"2",""
"3","two\nlines"
"#;
    assert_eq!(fs::read_to_string(&path)?, expected);
    Ok(())
}

#[test]
fn writer_drops_duplicates_when_asked() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out.csv");
    let rows = [row! { "a" => 1 }, row! { "a" => 1 }, row! { "a" => 2 }];
    let options = CsvOptions::default().allow_duplicate_rows(false);
    assert_eq!(write_csv(&path, options, &rows)?, 2);
    assert_eq!(fs::read_to_string(&path)?, "\"a\"\n\"1\"\n\"2\"\n");
    Ok(())
}

#[test]
fn writer_creates_file_on_close() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let with_headers = dir.path().join("nested/deeper/headers.csv");
    let mut writer = CsvWriter::create(&with_headers, CsvOptions::default().headers(["a", "b"]))?;
    assert!(!with_headers.exists());
    writer.close()?;
    writer.close()?;
    assert_eq!(fs::read_to_string(&with_headers)?, "\"a\",\"b\"\n");
    assert!(writer.write_row(&row! { "a" => 1 }).is_err());

    let empty = dir.path().join("empty.csv");
    CsvWriter::create(&empty, CsvOptions::default())?.close()?;
    assert_eq!(fs::read_to_string(&empty)?, "");
    Ok(())
}

#[test]
fn written_files_read_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("round.txt");
    let options = CsvOptions::default().separator("|~|");
    write_csv(
        &path,
        options.clone(),
        &[
            row! { "k" => "a|~|b", "v" => "x\ny" },
            row! { "k" => Value::Null, "v" => "\"quoted\"" },
        ],
    )?;
    let rows = read_csv(&path, options)?;
    assert_rows_equal(
        &rows,
        &[
            row! { "k" => "a|~|b", "v" => "x\ny" },
            row! { "k" => "", "v" => "\"quoted\"" },
        ],
    );
    Ok(())
}

#[test]
fn backslashes_survive_a_write_and_read() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("paths.csv");
    let rows = [
        row! { "v" => r"C:\dir\" },
        row! { "v" => r"literal \n, not a newline" },
        row! { "v" => r#"ends \""# },
    ];
    write_csv(&path, CsvOptions::default(), &rows)?;

    let text = fs::read_to_string(&path)?;
    assert!(text.contains(r#""C:\\dir\\""#), "{text}");
    assert_rows_equal(&read_csv(&path, CsvOptions::default())?, &rows);
    Ok(())
}

#[test]
fn unknown_escapes_read_verbatim() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("odd.csv");
    fs::write(&path, "v\n\"a\\tb\"\n")?;
    assert_rows_equal(
        &read_csv(&path, CsvOptions::default())?,
        &[row! { "v" => r"a\tb" }],
    );
    Ok(())
}
