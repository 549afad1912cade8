use std::{
    fs::File,
    io::{Cursor, Read, Seek},
    path::Path,
};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use crate::error::{ArchiveOpenCause, IngestError};
use crate::fetch::Fetcher;

pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// An open ZIP container, backed by a file or an in-memory buffer.
/// Dropping the handle releases the underlying source.
pub struct ArchiveHandle {
    origin: String,
    archive: ZipArchive<Box<dyn ReadSeek>>,
}

impl ArchiveHandle {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|e| IngestError::ArchiveOpen {
            origin: origin.clone(),
            cause: e.into(),
        })?;
        Self::from_reader(origin, Box::new(file))
    }

    pub fn from_bytes(origin: impl Into<String>, bytes: Vec<u8>) -> Result<Self, IngestError> {
        Self::from_reader(origin.into(), Box::new(Cursor::new(bytes)))
    }

    fn from_reader(origin: String, reader: Box<dyn ReadSeek>) -> Result<Self, IngestError> {
        let archive = ZipArchive::new(reader).map_err(|e| IngestError::ArchiveOpen {
            origin: origin.clone(),
            cause: ArchiveOpenCause::Zip(e),
        })?;
        debug!(%origin, entries = archive.len(), "archive opened");
        Ok(Self { origin, archive })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Entry names in archive order.
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub(crate) fn archive_mut(&mut self) -> &mut ZipArchive<Box<dyn ReadSeek>> {
        &mut self.archive
    }
}

/// Open the caller's local archive, or fetch `address` when no path is given.
/// One source is never substituted for the other.
#[instrument(level = "info", skip(fetcher))]
pub fn resolve(
    local_path: Option<&Path>,
    address: &str,
    fetcher: &dyn Fetcher,
) -> Result<ArchiveHandle, IngestError> {
    match local_path {
        Some(path) => ArchiveHandle::open_path(path),
        None => {
            info!("retrieving archive from remote source");
            let bytes = fetcher
                .fetch(address)
                .map_err(|cause| IngestError::ArchiveFetch {
                    address: address.to_string(),
                    cause,
                })?;
            ArchiveHandle::from_bytes(address, bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testutil::zip_bytes;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn never_called(_: &str) -> Result<Vec<u8>, FetchError> {
        panic!("fetch must not run when a local path is given")
    }

    #[test]
    fn opens_local_archives() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&zip_bytes(&[("A.txt", "07abc\n")])).unwrap();

        let handle = resolve(Some(tmp.path()), "http://unused/", &never_called).unwrap();
        assert_eq!(handle.entry_names(), vec!["A.txt"]);
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn missing_local_file_is_an_open_error() {
        let err = resolve(
            Some(Path::new("/no/such/archive.zip")),
            "http://unused/",
            &never_called,
        )
        .err()
        .unwrap();
        match err {
            IngestError::ArchiveOpen { origin, cause } => {
                assert_eq!(origin, "/no/such/archive.zip");
                assert!(matches!(cause, ArchiveOpenCause::Io(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn corrupt_local_file_is_an_open_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"this is not a zip").unwrap();
        let err = resolve(Some(tmp.path()), "http://unused/", &never_called)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            IngestError::ArchiveOpen {
                cause: ArchiveOpenCause::Zip(_),
                ..
            }
        ));
    }

    #[test]
    fn remote_bytes_are_opened_in_memory() {
        let body = zip_bytes(&[("X.txt", "1\n")]);
        let fetcher = move |addr: &str| -> Result<Vec<u8>, FetchError> {
            assert_eq!(addr, "http://host/x.zip");
            Ok(body.clone())
        };
        let handle = resolve(None, "http://host/x.zip", &fetcher).unwrap();
        assert_eq!(handle.origin(), "http://host/x.zip");
        assert_eq!(handle.entry_names(), vec!["X.txt"]);
    }

    #[test]
    fn fetch_failures_carry_the_address() {
        let fetcher = |_: &str| -> Result<Vec<u8>, FetchError> { Err(FetchError::Status(404)) };
        match resolve(None, "http://host/x.zip", &fetcher).err().unwrap() {
            IngestError::ArchiveFetch { address, cause } => {
                assert_eq!(address, "http://host/x.zip");
                assert!(matches!(cause, FetchError::Status(404)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn corrupt_remote_bytes_are_an_open_error() {
        let fetcher = |_: &str| -> Result<Vec<u8>, FetchError> { Ok(b"garbage".to_vec()) };
        assert!(matches!(
            resolve(None, "http://host/x.zip", &fetcher).err().unwrap(),
            IngestError::ArchiveOpen { .. }
        ));
    }
}
