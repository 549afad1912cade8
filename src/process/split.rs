// src/process/split.rs
use std::collections::BTreeSet;
use std::io::Read;
use tracing::{debug, instrument, warn};

use super::archive::ArchiveHandle;
use crate::error::{ArchiveOpenCause, EntryError};
use crate::schema::{TableId, YearSchema};
use crate::survey::EntryNaming;

/// One archive member, buffered and matched to a schema table.
#[derive(Debug)]
pub struct TableEntry {
    pub entry_name: String,
    pub table_id: TableId,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Split {
    pub entries: Vec<TableEntry>,
    pub failures: Vec<EntryError>,
}

/// Map an entry name to its table id: drop everything from the first dot of
/// the file name and, for nested layouts, the leading directory.
pub fn derive_table_id(entry_name: &str, naming: EntryNaming) -> Option<TableId> {
    let name = entry_name.replace('\\', "/");
    let name = name.trim_start_matches('/');

    let rest = match naming {
        EntryNaming::Flat => name,
        EntryNaming::Nested => name.split_once('/').map_or(name, |(_, rest)| rest),
    };

    let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
    let id = match rest[last_slash..].find('.') {
        Some(dot) => &rest[..last_slash + dot],
        None => rest,
    };

    if id.is_empty() || id.ends_with('/') {
        None
    } else {
        Some(id.to_string())
    }
}

/// Walk every entry of `handle`, buffering the ones that name a table of
/// `year`. Unmatched or unreadable entries are recorded, not fatal. The
/// handle is consumed and closed before returning.
#[instrument(level = "info", skip_all, fields(archive = %handle.origin()))]
pub fn split_archive(mut handle: ArchiveHandle, year: &YearSchema, naming: EntryNaming) -> Split {
    let mut out = Split::default();
    let mut seen: BTreeSet<TableId> = BTreeSet::new();
    let archive = handle.archive_mut();

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                let entry_name = format!("#{}", i);
                warn!(entry = %entry_name, error = %e, "unreadable entry");
                out.failures.push(EntryError::Unreadable {
                    entry_name,
                    cause: ArchiveOpenCause::Zip(e),
                });
                continue;
            }
        };
        let entry_name = entry.name().to_string();

        if entry.is_dir() {
            debug!(entry = %entry_name, "skipping directory");
            continue;
        }

        let table_id = derive_table_id(&entry_name, naming).unwrap_or_default();
        if year.table(&table_id).is_none() {
            warn!(entry = %entry_name, table = %table_id, "no layout for table");
            out.failures.push(EntryError::UnknownTable {
                entry_name,
                table_id,
            });
            continue;
        }
        if seen.contains(&table_id) {
            warn!(entry = %entry_name, table = %table_id, "table already provided by another entry");
            out.failures.push(EntryError::DuplicateTable {
                entry_name,
                table_id,
            });
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut data) {
            warn!(entry = %entry_name, error = %e, "failed to read entry");
            out.failures.push(EntryError::Unreadable {
                entry_name,
                cause: ArchiveOpenCause::Io(e),
            });
            continue;
        }

        debug!(entry = %entry_name, table = %table_id, bytes = data.len(), "buffered entry");
        seen.insert(table_id.clone());
        out.entries.push(TableEntry {
            entry_name,
            table_id,
            data,
        });
    }

    // drop the archive (and its file handle) now that we've buffered everything
    drop(handle);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArchiveLocator, TableSchema};
    use crate::testutil::zip_bytes;
    use std::collections::BTreeMap;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn year_with(tables: &[&str]) -> YearSchema {
        let tables: BTreeMap<_, _> = tables
            .iter()
            .map(|t| {
                (
                    t.to_string(),
                    TableSchema::new(vec![1], vec!["c".into()]).unwrap(),
                )
            })
            .collect();
        YearSchema {
            locator: ArchiveLocator {
                filename: "x.zip".into(),
            },
            tables,
        }
    }

    fn handle(entries: &[(&str, &str)], dirs: &[&str]) -> ArchiveHandle {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for d in dirs {
                zip.add_directory(*d, options).unwrap();
            }
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        ArchiveHandle::from_bytes("test", buf).unwrap()
    }

    #[test]
    fn flat_names_lose_only_the_extension() {
        assert_eq!(
            derive_table_id("MORADOR.txt", EntryNaming::Flat).as_deref(),
            Some("MORADOR")
        );
        assert_eq!(
            derive_table_id("CADERNETA_COLETIVA", EntryNaming::Flat).as_deref(),
            Some("CADERNETA_COLETIVA")
        );
        assert_eq!(
            derive_table_id("v1.2/DESPESA.TXT", EntryNaming::Flat).as_deref(),
            Some("v1.2/DESPESA")
        );
    }

    #[test]
    fn everything_after_the_first_dot_is_extension() {
        assert_eq!(
            derive_table_id("MORADOR.v2.txt", EntryNaming::Flat).as_deref(),
            Some("MORADOR")
        );
        assert_eq!(
            derive_table_id("Dados/DOM2015.txt.bak", EntryNaming::Nested).as_deref(),
            Some("DOM2015")
        );
    }

    #[test]
    fn nested_names_lose_the_leading_directory() {
        assert_eq!(
            derive_table_id("Dados/DOM2015.txt", EntryNaming::Nested).as_deref(),
            Some("DOM2015")
        );
        assert_eq!(
            derive_table_id("Dados\\PES2015.TXT", EntryNaming::Nested).as_deref(),
            Some("PES2015")
        );
        assert_eq!(
            derive_table_id("PES2015.txt", EntryNaming::Nested).as_deref(),
            Some("PES2015")
        );
        assert_eq!(derive_table_id("Dados/", EntryNaming::Nested), None);
        assert_eq!(derive_table_id(".txt", EntryNaming::Flat), None);
    }

    #[test]
    fn unknown_entries_are_recorded_and_skipped() {
        let h = handle(
            &[
                ("Dados/DOM2015.txt", "1\n"),
                ("Dados/LEIAME.txt", "read me\n"),
                ("Dados/PES2015.txt", "2\n"),
            ],
            &["Dados/"],
        );
        let split = split_archive(h, &year_with(&["DOM2015", "PES2015"]), EntryNaming::Nested);

        let ids: Vec<_> = split.entries.iter().map(|e| e.table_id.as_str()).collect();
        assert_eq!(ids, vec!["DOM2015", "PES2015"]);
        assert_eq!(split.entries[1].data, b"2\n");

        assert_eq!(split.failures.len(), 1);
        match &split.failures[0] {
            EntryError::UnknownTable {
                entry_name,
                table_id,
            } => {
                assert_eq!(entry_name, "Dados/LEIAME.txt");
                assert_eq!(table_id, "LEIAME");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn damaged_entry_is_unreadable_and_others_survive() {
        let mut buf = zip_bytes(&[("A.txt", "damaged body\n"), ("B.txt", "2\n")]);
        let at = buf
            .windows(b"damaged".len())
            .position(|w| w == b"damaged")
            .unwrap();
        buf[at] = b'D';
        let h = ArchiveHandle::from_bytes("test", buf).unwrap();

        let split = split_archive(h, &year_with(&["A", "B"]), EntryNaming::Flat);
        assert_eq!(split.entries.len(), 1);
        assert_eq!(split.entries[0].table_id, "B");
        assert_eq!(split.entries[0].data, b"2\n");
        assert!(matches!(
            &split.failures[..],
            [EntryError::Unreadable { entry_name, .. }] if entry_name == "A.txt"
        ));
    }

    #[test]
    fn second_entry_for_a_table_is_a_duplicate() {
        let h = handle(&[("A.txt", "1\n"), ("A.dat", "2\n")], &[]);
        let split = split_archive(h, &year_with(&["A"]), EntryNaming::Flat);
        assert_eq!(split.entries.len(), 1);
        assert_eq!(split.entries[0].entry_name, "A.txt");
        assert!(matches!(
            &split.failures[..],
            [EntryError::DuplicateTable { entry_name, .. }] if entry_name == "A.dat"
        ));
    }
}
