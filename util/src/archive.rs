//! CSV archiving functionality
//!
//! Archives are CSV files created inside the session's `arch` directory. Rows
//! are either serde records (`serialise`) or raw numeric rows under an
//! explicit header (`write_header` and `write_row`).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::File;
use csv::WriterBuilder;
pub use csv::Writer;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("The archiver has not been initialised")]
    NotInitialised,

    #[error("Could not write to the archive: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a csv.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self, archiver: &mut Archiver) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::from_file_path(session.arch_root.join(path))
    }

    /// Create a new archiver writing to the given file, truncating it.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::create(path).map_err(ArchiveError::CreateError)?;

        // Headers are written explicitly by `write_header`, or by the first
        // call to `serialise` for struct records.
        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: Some(w)
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: serde::Serialize>(
        &mut self, record: T
    ) -> Result<(), ArchiveError> {
        let w = self.writer.as_mut().ok_or(ArchiveError::NotInitialised)?;
        w.serialize(record)?;
        w.flush().map_err(ArchiveError::FlushError)
    }

    /// Write a header row of column names.
    pub fn write_header<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ArchiveError> {
        let w = self.writer.as_mut().ok_or(ArchiveError::NotInitialised)?;
        w.write_record(names.iter().map(|n| n.as_ref()))?;
        Ok(())
    }

    /// Write a row of numeric values.
    pub fn write_row(&mut self, values: &[f64]) -> Result<(), ArchiveError> {
        let w = self.writer.as_mut().ok_or(ArchiveError::NotInitialised)?;
        w.write_record(values.iter().map(|v| v.to_string()))?;
        Ok(())
    }

    /// Flush any buffered rows to disk.
    pub fn flush(&mut self) -> Result<(), ArchiveError> {
        let w = self.writer.as_mut().ok_or(ArchiveError::NotInitialised)?;
        w.flush().map_err(ArchiveError::FlushError)
    }
}
