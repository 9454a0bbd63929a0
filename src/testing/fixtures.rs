//! Ready-made datasets and scratch files.

use crate::row::Row;
use crate::row;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Four people with text-typed fields, as a delimited file would deliver them.
#[must_use]
pub fn people() -> Vec<Row> {
    vec![
        row! { "id" => "1", "name" => "Bill Rhodes", "age" => "41", "gender" => "male" },
        row! { "id" => "2", "name" => "Cheryl Lipscome", "age" => "32", "gender" => "female" },
        row! { "id" => "3", "name" => "Diana Rogers", "age" => "25", "gender" => "female" },
        row! { "id" => "4", "name" => "Jack Lowland", "age" => "30", "gender" => "male" },
    ]
}

/// [`people`] as comma-separated text with a header line.
pub const PEOPLE_CSV: &str = "id,name,age,gender\n\
1,Bill Rhodes,41,male\n\
2,Cheryl Lipscome,32,female\n\
3,Diana Rogers,25,female\n\
4,Jack Lowland,30,male\n";

/// Hobbies keyed by person id, several per person.
#[must_use]
pub fn hobbies() -> Vec<Row> {
    vec![
        row! { "id" => "1", "hobby" => "Stamp Collecting" },
        row! { "id" => "1", "hobby" => "Bird Watching" },
        row! { "id" => "2", "hobby" => "Biking" },
        row! { "id" => "4", "hobby" => "Rock Climbing" },
        row! { "id" => "4", "hobby" => "Sky Diving" },
    ]
}

/// Write `contents` to `name` inside a fresh temporary directory. The file
/// lives as long as the returned [`TempDir`].
pub fn temp_file(name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok((dir, path))
}
